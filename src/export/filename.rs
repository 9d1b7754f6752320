//! Output File Names
//!
//! Derives the base name of an exported file from a user-supplied name,
//! usually the Markdown file's name. The transformation is fixed so the same
//! input always lands on the same file:
//!
//! 1. strip one trailing `.md` / `.markdown` (any case)
//! 2. replace every character outside `[A-Za-z0-9_-]` with `_`
//! 3. collapse runs of `_`
//! 4. trim `_` from both ends
//! 5. fall back to `document` when nothing is left

use regex::Regex;
use std::sync::OnceLock;

/// Base name used when sanitizing leaves nothing.
pub const FALLBACK_FILE_NAME: &str = "document";

fn markdown_extension() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\.(md|markdown)$").expect("valid regex"))
}

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid regex"))
}

fn underscore_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_+").expect("valid regex"))
}

/// Turn an arbitrary name into a safe file base name (no extension).
pub fn sanitize_file_name(name: &str) -> String {
    let stem = markdown_extension().replace(name, "");
    let replaced = disallowed().replace_all(&stem, "_");
    let collapsed = underscore_runs().replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<sanitized>.<extension>`
pub fn export_file_name(name: &str, extension: &str) -> String {
    format!("{}.{}", sanitize_file_name(name), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markdown_extension() {
        assert_eq!(sanitize_file_name("notes.md"), "notes");
        assert_eq!(sanitize_file_name("Notes.MARKDOWN"), "Notes");
        assert_eq!(sanitize_file_name("notes.md.md"), "notes_md");
        assert_eq!(sanitize_file_name("notes.txt"), "notes_txt");
    }

    #[test]
    fn test_replaces_and_collapses() {
        assert_eq!(sanitize_file_name("My Report (final).md"), "My_Report_final");
        assert_eq!(sanitize_file_name("a  --  b"), "a_--_b");
        assert_eq!(sanitize_file_name("__x__y__"), "x_y");
    }

    #[test]
    fn test_non_ascii_is_replaced_per_char() {
        assert_eq!(sanitize_file_name("Über Straße.md"), "ber_Stra_e");
        assert_eq!(sanitize_file_name("日本語"), "document");
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(sanitize_file_name(""), "document");
        assert_eq!(sanitize_file_name(".md"), "document");
        assert_eq!(sanitize_file_name("???"), "document");
    }

    #[test]
    fn test_idempotent() {
        for name in ["My Report (final).md", "x", "a.b.c", "  spaced  "] {
            let once = sanitize_file_name(name);
            assert_eq!(sanitize_file_name(&once), once);
        }
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("Plan 2024.md", "pdf"), "Plan_2024.pdf");
    }
}
