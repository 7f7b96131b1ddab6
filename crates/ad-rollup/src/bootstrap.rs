use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` value onto a tracing filter directive.
///
/// Unrecognised values fall back to `"info"`.
pub fn log_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::new(log_directive(log_level));

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directive_maps_level_names() {
        assert_eq!(log_directive("DEBUG"), "debug");
        assert_eq!(log_directive("CRITICAL"), "error");
        assert_eq!(log_directive("info"), "info");
        assert_eq!(log_directive("WARNING"), "warn");
        assert_eq!(log_directive("ERROR"), "error");
    }

    #[test]
    fn test_log_directive_unknown_falls_back_to_info() {
        assert_eq!(log_directive("rollup_data=trace"), "info");
        assert_eq!(log_directive(""), "info");
    }

    #[test]
    fn test_setup_logging_twice_fails_second_time() {
        // Only one global subscriber may be installed per process.
        let _ = setup_logging("ERROR");
        assert!(setup_logging("ERROR").is_err());
    }
}
