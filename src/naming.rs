//! Name and path conventions shared by the catalog and the export stage.
//!
//! ## Dataset keys
//!
//! A dataset key doubles as a folder name under the datasets root, so user
//! supplied names go through [`sanitize_key`] before touching the filesystem:
//! - `"My Dataset!"` → `"My-Dataset"`
//! - `"  ../etc  "` → `"etc"`
//! - `"???"` → fallback key
//!
//! ## Row paths
//!
//! Row paths are relative to the dataset root and always use `/`, whatever
//! the CSV that declared them used. The class of an exported image is the
//! segment right after `images/`: `images/plastic/009.jpg` → `plastic`.

/// Longest key [`sanitize_key`] will produce.
pub const MAX_KEY_LEN: usize = 60;

/// Class used when a path is too short to carry one.
pub const UNKNOWN_CLASS: &str = "unknown";

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Turn a free-form name into a filesystem-safe dataset key.
///
/// Keeps alphanumerics, `-`, `_` and `.`; everything else becomes `-`.
/// Leading/trailing separators are trimmed and the result is capped at
/// [`MAX_KEY_LEN`] characters. An empty result yields `fallback`.
pub fn sanitize_key(name: &str, fallback: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if is_key_char(c) { c } else { '-' })
        .collect();
    let trimmed = replaced.trim_matches(|c| matches!(c, '-' | '_' | '.'));
    let capped: String = trimmed.chars().take(MAX_KEY_LEN).collect();
    if capped.is_empty() {
        fallback.to_string()
    } else {
        capped
    }
}

/// Normalize a declared row path to forward slashes.
pub fn normalize_rel_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}

/// Infer the class label from a row path (`images/<class>/<file>`).
pub fn class_from_path(rel: &str) -> &str {
    let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 3 {
        segments[1]
    } else {
        UNKNOWN_CLASS
    }
}

/// Final path segment of a row path.
pub fn file_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_key("mnist_v2.1-small", "processed"), "mnist_v2.1-small");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_key("My Dataset!", "processed"), "My-Dataset");
        assert_eq!(sanitize_key("a/b\\c", "processed"), "a-b-c");
    }

    #[test]
    fn sanitize_trims_separators() {
        assert_eq!(sanitize_key("  ../etc  ", "processed"), "etc");
        assert_eq!(sanitize_key("__demo__", "processed"), "demo");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_key(&long, "processed").len(), MAX_KEY_LEN);
    }

    #[test]
    fn sanitize_empty_falls_back() {
        assert_eq!(sanitize_key("???", "processed"), "processed");
        assert_eq!(sanitize_key("", "processed"), "processed");
    }

    #[test]
    fn sanitize_keeps_unicode_alphanumerics() {
        assert_eq!(sanitize_key("déchets", "processed"), "déchets");
    }

    #[test]
    fn normalize_backslashes() {
        assert_eq!(
            normalize_rel_path("images\\glass\\001.jpg"),
            "images/glass/001.jpg"
        );
    }

    #[test]
    fn class_is_second_segment() {
        assert_eq!(class_from_path("images/plastic/009.jpg"), "plastic");
        assert_eq!(class_from_path("images/plastic/deep/009.jpg"), "plastic");
    }

    #[test]
    fn class_unknown_for_short_paths() {
        assert_eq!(class_from_path("images/009.jpg"), UNKNOWN_CLASS);
        assert_eq!(class_from_path("009.jpg"), UNKNOWN_CLASS);
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(file_name("images/plastic/009.jpg"), "009.jpg");
        assert_eq!(file_name("009.jpg"), "009.jpg");
    }
}
