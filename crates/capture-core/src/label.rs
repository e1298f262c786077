//! Capture labels derived from file names.
//!
//! Reference captures are named `<LABEL>_REF[_<comment>].<ext>`; the label
//! groups captures of the same activity across devices and sessions.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Label: letters, digits and hyphens (no underscore), then the literal
/// `_REF`, then an optional `_comment`.
const LABEL_PATTERN: &str = r"(?i)^(?P<label>(?:[^\W_]|-)+)_REF(?:_\w*)?";

fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LABEL_PATTERN).expect("regex is valid"))
}

/// Resolve the canonical label of a file base name.
///
/// Returns the captured label lowercased on a match, otherwise the base name
/// unchanged.
///
/// # Examples
///
/// ```
/// use capture_core::label::extract_label;
///
/// assert_eq!(extract_label("Walking-Fast_REF_left.csv"), "walking-fast");
/// assert_eq!(extract_label("session.log"), "session.log");
/// ```
pub fn extract_label(base_name: &str) -> String {
    match label_regex().captures(base_name) {
        Some(caps) => caps["label"].to_lowercase(),
        None => base_name.to_string(),
    }
}

/// Label of a full path, using only its final component.
pub fn label_for_path(path: &Path) -> String {
    extract_label(&base_name(path))
}

/// Final path component as a string.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_label_with_comment() {
        assert_eq!(extract_label("RUN_REF_morning.json"), "run");
    }

    #[test]
    fn test_label_without_comment() {
        assert_eq!(extract_label("stairs-up_REF.zip"), "stairs-up");
    }

    #[test]
    fn test_label_case_insensitive_ref() {
        assert_eq!(extract_label("Cycling_ref.csv"), "cycling");
    }

    #[test]
    fn test_underscore_in_label_does_not_match() {
        assert_eq!(extract_label("my_walk_REF.csv"), "my_walk_REF.csv");
    }

    #[test]
    fn test_no_ref_keeps_base_name() {
        assert_eq!(extract_label("Log_2014-03-01.log"), "Log_2014-03-01.log");
    }

    #[test]
    fn test_label_for_nested_path() {
        let path = PathBuf::from("captures/2014/Jump_REF_x.log");
        assert_eq!(label_for_path(&path), "jump");
    }
}
