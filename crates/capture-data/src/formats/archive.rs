//! ZIP archives of capture files.
//!
//! Each file entry is decoded as if it had been passed to the parser on its
//! own, with the entry's modification time as creation time. An entry that
//! fails to decode is skipped; the rest of the archive still loads.

use std::io::{Cursor, Read};
use std::path::Path;

use capture_core::error::{ParseError, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::debug;
use zip::ZipArchive;

use super::Decoded;
use crate::context::ParseContext;
use crate::parser::CaptureParser;

pub fn decode(
    parser: &CaptureParser,
    path: &Path,
    content: &[u8],
    ctx: &ParseContext,
) -> Result<Decoded> {
    let ctx = &ctx.enter_archive(path)?;
    let mut archive = ZipArchive::new(Cursor::new(content))?;
    let mut decoded = Decoded::default();

    for i in 0..archive.len() {
        ctx.check_cancelled()?;

        let (name, modified, bytes) = {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    parser.report_skipped(path, &ParseError::from(e));
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_string();
            let modified: Option<zip::DateTime> = entry.last_modified().into();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            if let Err(e) = entry.read_to_end(&mut bytes) {
                parser.report_skipped(Path::new(&name), &ParseError::malformed(e.to_string()));
                continue;
            }
            (name, modified, bytes)
        };

        let entry_time = modified
            .and_then(to_utc)
            .unwrap_or(ctx.creation_time);
        let entry_ctx = ctx.with_creation_time(entry_time);
        let entry_path = Path::new(&name);

        match parser.load(entry_path, Some(&bytes), &entry_ctx) {
            Ok(entry) => {
                debug!("{}: {} yielded {} captures", path.display(), name, entry.captures.len());
                decoded.captures.extend(entry.captures);
                if decoded.label_override.is_none() {
                    decoded.label_override = entry.label_override;
                }
            }
            Err(ParseError::Cancelled) => return Err(ParseError::Cancelled),
            Err(e) => parser.report_skipped(entry_path, &e),
        }
    }

    Ok(decoded)
}

/// Archive timestamps carry no zone; they are read as UTC.
fn to_utc(stamp: zip::DateTime) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(
        i32::from(stamp.year()),
        u32::from(stamp.month()),
        u32::from(stamp.day()),
    )?
    .and_hms_opt(
        u32::from(stamp.hour()),
        u32::from(stamp.minute()),
        u32::from(stamp.second()),
    )?;
    Some(Utc.from_utc_datetime(&naive))
}
