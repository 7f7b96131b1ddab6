//! Regression test over the bundled fixture feeds.
//!
//! `FIXTURE_REVENUE` is the revenue total of the clicks that land in an
//! aggregate for this exact fixture; it is not a general property.

use std::path::PathBuf;

use rollup_core::models::AggregateKey;
use rollup_core::strategy::ExecutionStrategy;
use rollup_data::aggregator::{ClickAggregator, DropReason};
use rollup_data::consistency::{ConsistencyChecker, ConsistencyIssue};
use rollup_data::equivalence::compare_aggregates;
use rollup_data::reader::{load_clicks, load_impressions, total_revenue};
use rollup_data::writer::{read_aggregates, write_aggregates};

const FIXTURE_REVENUE: f64 = 7.625;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_fixture_loads() {
    let clicks = load_clicks(&fixture("clicks.json")).unwrap();
    let impressions = load_impressions(&fixture("impressions.json")).unwrap();

    assert_eq!(clicks.len(), 10);
    assert_eq!(impressions.len(), 9, "duplicate imp-01 must collapse");
    assert!((total_revenue(&clicks) - 87.625).abs() < 1e-12);

    let first = &impressions[0];
    assert_eq!(first.id, "imp-01");
    assert_eq!(first.app_id, Some(32));
}

#[test]
fn test_fixture_aggregates() {
    let clicks = load_clicks(&fixture("clicks.json")).unwrap();
    let impressions = load_impressions(&fixture("impressions.json")).unwrap();

    let result =
        ClickAggregator::aggregate(&clicks, &impressions, ExecutionStrategy::Sequential).unwrap();

    let summary: Vec<(String, u64, u64, f64)> = result
        .aggregates
        .iter()
        .map(|a| (a.key().to_string(), a.impressions, a.clicks, a.revenue))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("7.".to_string(), 2, 2, 3.75),
            ("32.UK".to_string(), 2, 3, 3.75),
            ("32.US".to_string(), 1, 1, 0.0),
            ("32.uk".to_string(), 1, 1, 0.125),
        ]
    );

    assert_eq!(result.impressions_with_no_click(), 1);
    let reasons: Vec<&DropReason> = result.diagnostics.dropped.iter().map(|d| &d.reason).collect();
    assert_eq!(
        reasons,
        vec![
            &DropReason::MissingAppId,
            &DropReason::InvalidCountryCode {
                country_code: "DEU".to_string()
            },
        ]
    );
    assert!(result.get(&AggregateKey::new(99, "FR")).is_none());
}

#[test]
fn test_fixture_consistency_report() {
    let clicks = load_clicks(&fixture("clicks.json")).unwrap();
    let impressions = load_impressions(&fixture("impressions.json")).unwrap();
    let result =
        ClickAggregator::aggregate(&clicks, &impressions, ExecutionStrategy::Sequential).unwrap();

    let report = ConsistencyChecker::new(Some(FIXTURE_REVENUE)).check(&result, impressions.len());

    // The two malformed impressions are in neither bucket, so the count
    // check is expected to flag them; the revenue total matches.
    assert_eq!(
        report.issues,
        vec![ConsistencyIssue::ImpressionCount {
            aggregated: 6,
            with_no_click: 1,
            total: 9,
        }]
    );
    assert_eq!(report.sum_revenue, FIXTURE_REVENUE);
}

#[test]
fn test_fixture_strategies_agree() {
    let clicks = load_clicks(&fixture("clicks.json")).unwrap();
    let impressions = load_impressions(&fixture("impressions.json")).unwrap();

    let seq =
        ClickAggregator::aggregate(&clicks, &impressions, ExecutionStrategy::Sequential).unwrap();
    let par = ClickAggregator::aggregate(
        &clicks,
        &impressions,
        ExecutionStrategy::Parallel { threads: 3 },
    )
    .unwrap();

    assert!(compare_aggregates(&seq.aggregates, &par.aggregates).is_equivalent());
    assert_eq!(
        seq.impressions_with_no_click(),
        par.impressions_with_no_click()
    );
}

#[test]
fn test_fixture_output_round_trips() {
    let clicks = load_clicks(&fixture("clicks.json")).unwrap();
    let impressions = load_impressions(&fixture("impressions.json")).unwrap();
    let result =
        ClickAggregator::aggregate(&clicks, &impressions, ExecutionStrategy::Sequential).unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("output.json");
    write_aggregates(&path, &result.aggregates).unwrap();

    assert_eq!(read_aggregates(&path).unwrap(), result.aggregates);
}
