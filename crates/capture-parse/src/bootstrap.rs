use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a CLI level name (`DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL`) to an
/// [`EnvFilter`] directive. Unrecognised names pass through unchanged.
pub fn filter_directive(log_level: &str) -> String {
    let upper = log_level.to_uppercase();
    match upper.as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber on stderr, keeping stdout for
/// parse output. `RUST_LOG` takes precedence over `log_level` when set.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(log_level)))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    tracing_subscriber::registry().with(filter).with(layer).try_init()?;

    Ok(())
}
