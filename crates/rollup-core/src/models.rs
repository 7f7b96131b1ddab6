use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Longest country code (in UTF-16 code units) accepted into an aggregate key.
pub const MAX_COUNTRY_CODE_LEN: usize = 2;

/// A single monetized click read from the clicks feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Click {
    /// Identifier of the impression this click occurred on.
    #[serde(alias = "impressionId")]
    pub impression_id: String,
    /// Revenue earned by the click. Absent or `null` counts as zero.
    #[serde(default)]
    pub revenue: Option<f64>,
}

impl Click {
    /// Revenue with a missing value treated as zero.
    pub fn revenue_or_zero(&self) -> f64 {
        self.revenue.unwrap_or(0.0)
    }
}

/// A single ad impression read from the impressions feed.
///
/// Identity is the `id` alone: two impressions with the same id compare
/// equal and hash identically whatever their other fields hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Impression {
    /// Opaque impression identifier.
    pub id: String,
    /// Application the ad was shown in.
    #[serde(default, alias = "appId")]
    pub app_id: Option<i64>,
    /// Country the ad was shown in, as reported by the feed.
    #[serde(default, alias = "countryCode")]
    pub country_code: Option<String>,
    /// Advertiser that bought the impression. Not used for grouping.
    #[serde(default, alias = "advertiserId")]
    pub advertiser_id: Option<i64>,
}

impl PartialEq for Impression {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Impression {}

impl Hash for Impression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Grouping key of an [`Aggregate`]: application id plus normalized country
/// code. Ordering is by app id, then country code, which gives the output
/// its stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub app_id: i64,
    pub country_code: String,
}

impl AggregateKey {
    pub fn new(app_id: i64, country_code: impl Into<String>) -> Self {
        Self {
            app_id,
            country_code: country_code.into(),
        }
    }
}

impl std::fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.app_id, self.country_code)
    }
}

/// Per-(application, country) rollup written to the output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub app_id: i64,
    pub country_code: String,
    /// Number of clicked impressions grouped under this key.
    pub impressions: u64,
    /// Number of clicks attributed to those impressions.
    pub clicks: u64,
    /// Sum of the revenue of those clicks.
    pub revenue: f64,
}

impl Aggregate {
    /// The grouping key this aggregate was built under.
    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(self.app_id, self.country_code.clone())
    }
}

/// Normalize a raw country code: `None` or blank becomes the empty string,
/// anything else is kept verbatim (no trimming, no case folding).
///
/// Blank means every character is whitespace, where the no-break spaces
/// (U+00A0, U+2007, U+202F) and NEL (U+0085) count as content.
pub fn normalize_country_code(raw: Option<&str>) -> &str {
    match raw {
        Some(code) if !code.chars().all(is_blank_char) => code,
        _ => "",
    }
}

/// Whether a normalized country code fits in an aggregate key.
///
/// Length is measured in UTF-16 code units, so a character outside the
/// Basic Multilingual Plane counts twice.
pub fn is_valid_country_code(code: &str) -> bool {
    code.encode_utf16().count() <= MAX_COUNTRY_CODE_LEN
}

fn is_blank_char(c: char) -> bool {
    match c {
        '\u{1C}'..='\u{1F}' => true,
        '\u{85}' | '\u{A0}' | '\u{2007}' | '\u{202F}' => false,
        c => c.is_whitespace(),
    }
}
