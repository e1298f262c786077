mod bootstrap;
mod cli;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use capture_core::models::ParseOutcome;
use capture_data::{scan_directory, CaptureParser};
use clap::Parser;

use cli::Settings;

fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(settings.effective_log_level())?;
    tracing::info!("capture-parse v{} starting", env!("CARGO_PKG_VERSION"));

    let config = settings.parser_config();
    config.validate()?;
    tracing::debug!("Parser config: {:?}", config);
    if let Some(path) = &settings.save_config {
        config
            .save_to(path)
            .with_context(|| format!("saving config to {}", path.display()))?;
        tracing::info!("Saved parser config to {}", path.display());
    }

    let parser = CaptureParser::new(config);
    let outcomes = parse_paths(&parser, &settings.paths)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if settings.wants_json() {
        report::write_json(&mut out, &outcomes)?;
    } else {
        report::write_summary(&mut out, &outcomes)?;
    }

    Ok(())
}

/// Scan directories and parse files, in argument order.
fn parse_paths(parser: &CaptureParser, paths: &[PathBuf]) -> Result<Vec<ParseOutcome>> {
    let mut outcomes = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = scan_directory(parser, path)
                .with_context(|| format!("scanning {}", path.display()))?;
            outcomes.extend(found);
        } else {
            let outcome = parser
                .parse(path, None)
                .with_context(|| format!("parsing {}", path.display()))?;
            outcomes.push(outcome);
        }
    }
    Ok(outcomes)
}
