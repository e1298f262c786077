use capture_core::config::{ParsePolicy, ParserConfig};
use clap::Parser;
use std::path::PathBuf;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Parse wearable capture files into the canonical capture model
#[derive(Parser, Debug, Clone)]
#[command(
    name = "capture-parse",
    about = "Parse wearable capture files into the canonical capture model",
    version
)]
pub struct Settings {
    /// Capture files or directories to scan
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Fail on unknown or malformed files instead of skipping them
    #[arg(long)]
    pub strict: bool,

    /// Output format
    #[arg(long, default_value = "summary", value_parser = ["summary", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Parser config file (JSON)
    #[arg(long, env = "CAPTURE_PARSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the effective parser config to this file before parsing
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,

    /// Default capture window in seconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub window_secs: Option<u32>,

    /// Report skipped files (-v) and raise the log level (-vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Settings {
    /// Config file values with command-line overrides applied.
    pub fn parser_config(&self) -> ParserConfig {
        let mut config = self
            .config
            .as_deref()
            .map(ParserConfig::load_from)
            .unwrap_or_default();

        if self.strict {
            config.policy = ParsePolicy::Strict;
        }
        if let Some(secs) = self.window_secs {
            config.default_window_secs = secs;
        }
        if self.verbose > 0 {
            config.verbosity = self.verbose;
        }
        config
    }

    /// `-v` lifts the level to INFO and `-vv` to DEBUG.
    pub fn effective_log_level(&self) -> &str {
        match self.verbose {
            0 => self.log_level.as_str(),
            1 if self.log_level == "DEBUG" => "DEBUG",
            1 => "INFO",
            _ => "DEBUG",
        }
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Settings {
        Settings::try_parse_from(std::iter::once("capture-parse").chain(args.iter().copied()))
            .expect("valid args")
    }

    #[test]
    fn test_defaults() {
        let settings = parse(&["a.csv"]);
        assert_eq!(settings.paths, vec![PathBuf::from("a.csv")]);
        assert!(!settings.strict);
        assert!(!settings.wants_json());
        assert_eq!(settings.effective_log_level(), "WARNING");
        assert_eq!(settings.parser_config(), ParserConfig::default());
    }

    #[test]
    fn test_paths_are_required() {
        assert!(Settings::try_parse_from(["capture-parse"]).is_err());
    }

    #[test]
    fn test_rejects_zero_window_and_bad_format() {
        assert!(Settings::try_parse_from(["capture-parse", "--window-secs", "0", "a.csv"]).is_err());
        assert!(Settings::try_parse_from(["capture-parse", "--format", "xml", "a.csv"]).is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["-v", "a.csv"]).effective_log_level(), "INFO");
        assert_eq!(parse(&["-vv", "a.csv"]).effective_log_level(), "DEBUG");
        assert_eq!(parse(&["-vv", "a.csv"]).parser_config().verbosity, 2);
    }

    #[test]
    fn test_save_config_path() {
        assert_eq!(parse(&["a.csv"]).save_config, None);
        let settings = parse(&["--save-config", "out/parser.json", "a.csv"]);
        assert_eq!(settings.save_config, Some(PathBuf::from("out/parser.json")));
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("parser.json");
        let stored = ParserConfig {
            default_window_secs: 45,
            default_device: "Wrist".to_string(),
            ..ParserConfig::default()
        };
        stored.save_to(&path).expect("save config");

        let config = parse(&["--config", path.to_str().unwrap(), "a.csv"]).parser_config();
        assert_eq!(config.default_window_secs, 45);
        assert_eq!(config.default_device, "Wrist");
        assert!(!config.is_strict());

        let config = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--strict",
            "--window-secs",
            "10",
            "a.csv",
        ])
        .parser_config();
        assert_eq!(config.default_window_secs, 10);
        assert_eq!(config.default_device, "Wrist");
        assert!(config.is_strict());
    }
}
