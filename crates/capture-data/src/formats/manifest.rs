//! Plain-text manifests listing one capture file path per line.
//!
//! Listed files are read from disk and decoded in order. Paths are used as
//! written, so relative entries resolve against the working directory. A
//! manifest reached again through its own listing is skipped.

use std::path::Path;

use capture_core::error::{ParseError, Result};
use tracing::debug;

use super::Decoded;
use crate::context::ParseContext;
use crate::parser::CaptureParser;

pub fn decode(
    parser: &CaptureParser,
    path: &Path,
    content: &[u8],
    ctx: &ParseContext,
) -> Result<Decoded> {
    let text = std::str::from_utf8(content)
        .map_err(|e| ParseError::malformed(format!("{} is not UTF-8: {}", path.display(), e)))?;

    let ctx = &ctx.enter_manifest(path)?;
    let mut decoded = Decoded::default();
    for listed in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        ctx.check_cancelled()?;

        let listed = Path::new(listed);
        match parser.load(listed, None, ctx) {
            Ok(entry) => {
                debug!("{}: {} yielded {} captures", path.display(), listed.display(), entry.captures.len());
                decoded.captures.extend(entry.captures);
            }
            Err(ParseError::Cancelled) => return Err(ParseError::Cancelled),
            Err(e) => parser.report_skipped(listed, &e),
        }
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_core::config::ParserConfig;
    use capture_core::models::{SensorRecord, DEFAULT_DEVICE};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_csvs(dir: &TempDir) -> Vec<PathBuf> {
        ["one.csv", "two.csv", "three.csv"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let path = dir.path().join(name);
                fs::write(&path, format!("{},0,0\n", i + 1)).unwrap();
                path
            })
            .collect()
    }

    fn manifest_for(paths: &[PathBuf]) -> String {
        paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_listed_order_is_kept() {
        let dir = TempDir::new().unwrap();
        let mut paths = write_csvs(&dir);
        paths.reverse();

        let parser = CaptureParser::new(ParserConfig::default());
        let decoded = decode(
            &parser,
            &PathBuf::from("runs.lst"),
            manifest_for(&paths).as_bytes(),
            &ParseContext::default(),
        )
        .unwrap();

        let xs: Vec<_> = decoded
            .captures
            .iter()
            .map(|c| c.session.get(DEFAULT_DEVICE).unwrap().sensors[0].clone())
            .collect();
        assert_eq!(
            xs,
            vec![
                SensorRecord::Accelerometer { x: 3, y: 0, z: 0 },
                SensorRecord::Accelerometer { x: 2, y: 0, z: 0 },
                SensorRecord::Accelerometer { x: 1, y: 0, z: 0 },
            ]
        );
        assert!(decoded.label_override.is_none());
    }

    #[test]
    fn test_missing_and_blank_entries_are_skipped() {
        let dir = TempDir::new().unwrap();
        let paths = write_csvs(&dir);
        let content = format!(
            "{}\n\n{}\n   \n{}\n",
            paths[0].display(),
            dir.path().join("gone.csv").display(),
            paths[2].display()
        );

        let parser = CaptureParser::new(ParserConfig::strict());
        let decoded = decode(
            &parser,
            &PathBuf::from("runs.lst"),
            content.as_bytes(),
            &ParseContext::default(),
        )
        .unwrap();
        assert_eq!(decoded.captures.len(), 2);
    }

    #[test]
    fn test_self_listing_manifest_is_skipped() {
        let dir = TempDir::new().unwrap();
        let paths = write_csvs(&dir);
        let lst = dir.path().join("loop.lst");
        fs::write(&lst, format!("{}\n{}\n", lst.display(), paths[0].display())).unwrap();

        let outcome = CaptureParser::default().parse(&lst, None).unwrap();
        assert_eq!(outcome.captures.len(), 1);
    }

    #[test]
    fn test_mutually_listing_manifests_terminate() {
        let dir = TempDir::new().unwrap();
        let paths = write_csvs(&dir);
        let a = dir.path().join("a.lst");
        let b = dir.path().join("b.lst");
        fs::write(&a, format!("{}\n{}\n", b.display(), paths[0].display())).unwrap();
        fs::write(&b, format!("{}\n{}\n", a.display(), paths[1].display())).unwrap();

        for parser in [CaptureParser::default(), CaptureParser::new(ParserConfig::strict())] {
            let outcome = parser.parse(&a, None).unwrap();
            let xs: Vec<_> = outcome
                .captures
                .iter()
                .map(|c| c.session.get(DEFAULT_DEVICE).unwrap().sensors[0].clone())
                .collect();
            assert_eq!(
                xs,
                vec![
                    SensorRecord::Accelerometer { x: 2, y: 0, z: 0 },
                    SensorRecord::Accelerometer { x: 1, y: 0, z: 0 },
                ]
            );
        }
    }

    #[test]
    fn test_cancel_stops_manifest() {
        let dir = TempDir::new().unwrap();
        let paths = write_csvs(&dir);
        let ctx = ParseContext::default().with_cancel_flag(Arc::new(AtomicBool::new(true)));

        let parser = CaptureParser::new(ParserConfig::default());
        let result = decode(
            &parser,
            &PathBuf::from("runs.lst"),
            manifest_for(&paths).as_bytes(),
            &ctx,
        );
        assert!(matches!(result, Err(ParseError::Cancelled)));
    }
}
