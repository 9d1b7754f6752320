//! Theme State Management
//!
//! The live document carries its theme in three global markers: the class
//! lists of `<html>` and `<body>` (a `dark` token) and the `data-theme`
//! attribute on `<html>`. Exports force these to light while they measure
//! computed styles, and must put them back exactly as they were.
//!
//! # Usage
//!
//! ```ignore
//! use crate::theme::ThemeGuard;
//!
//! let guard = ThemeGuard::acquire(&live);
//! // ... read computed styles, build the export ...
//! drop(guard); // markers restored, also on early return or panic
//! ```

use log::debug;

use crate::dom::{self, LiveDocument};
use kuchiki::NodeRef;

/// Class token that switches the preview to its dark variant.
const DARK_CLASS: &str = "dark";

/// Attribute naming the active theme on `<html>`.
const THEME_ATTRIBUTE: &str = "data-theme";

// ─────────────────────────────────────────────────────────────────────────────
// Theme State
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of the live document's global theme markers.
///
/// `None` means the attribute was absent, which is restored as absent
/// rather than as an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThemeState {
    pub html_class: Option<String>,
    pub body_class: Option<String>,
    pub data_theme: Option<String>,
}

impl ThemeState {
    /// Record the current markers.
    pub fn capture(doc: &LiveDocument) -> Self {
        let html = doc.html_element();
        let body = doc.body_element();
        Self {
            html_class: html.as_ref().and_then(|n| dom::get_attr(n, "class")),
            body_class: body.as_ref().and_then(|n| dom::get_attr(n, "class")),
            data_theme: html.as_ref().and_then(|n| dom::get_attr(n, THEME_ATTRIBUTE)),
        }
    }

    /// Write these markers back onto the document.
    pub fn apply(&self, doc: &LiveDocument) {
        if let Some(html) = doc.html_element() {
            write_optional(&html, "class", self.html_class.as_deref());
            write_optional(&html, THEME_ATTRIBUTE, self.data_theme.as_deref());
        }
        if let Some(body) = doc.body_element() {
            write_optional(&body, "class", self.body_class.as_deref());
        }
    }

    /// Whether these markers put the document in its dark variant.
    pub fn is_dark(&self) -> bool {
        let has_dark = |class: &Option<String>| {
            class
                .as_deref()
                .is_some_and(|c| c.split_whitespace().any(|t| t == DARK_CLASS))
        };
        has_dark(&self.html_class)
            || has_dark(&self.body_class)
            || self.data_theme.as_deref() == Some(DARK_CLASS)
    }
}

fn write_optional(node: &NodeRef, name: &str, value: Option<&str>) {
    match value {
        Some(value) => dom::set_attr(node, name, value),
        None => dom::remove_attr(node, name),
    }
}

/// Remove the dark markers and declare the light theme.
pub fn force_light(doc: &LiveDocument) {
    for element in [doc.html_element(), doc.body_element()].into_iter().flatten() {
        if dom::has_class(&element, DARK_CLASS) {
            let kept: Vec<String> = dom::class_tokens(&element)
                .into_iter()
                .filter(|t| t != DARK_CLASS)
                .collect();
            dom::set_class_tokens(&element, &kept);
        }
    }
    if let Some(html) = doc.html_element() {
        dom::set_attr(&html, THEME_ATTRIBUTE, "light");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Theme Guard
// ─────────────────────────────────────────────────────────────────────────────

/// Scoped light-theme acquisition.
///
/// Acquiring records the current markers and forces light; dropping the
/// guard restores the recorded markers on every exit path.
#[derive(Debug)]
pub struct ThemeGuard<'a> {
    doc: &'a LiveDocument,
    saved: ThemeState,
}

impl<'a> ThemeGuard<'a> {
    pub fn acquire(doc: &'a LiveDocument) -> Self {
        let saved = ThemeState::capture(doc);
        debug!(
            "Forcing light theme for export (was {})",
            if saved.is_dark() { "dark" } else { "light" }
        );
        force_light(doc);
        Self { doc, saved }
    }

    /// The markers that will be restored.
    pub fn saved_state(&self) -> &ThemeState {
        &self.saved
    }
}

impl Drop for ThemeGuard<'_> {
    fn drop(&mut self) {
        self.saved.apply(self.doc);
        debug!("Restored live theme state");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_page() -> LiveDocument {
        LiveDocument::parse(
            r#"<html class="h-full dark" data-theme="dark"><body class="dark antialiased"><p>x</p></body></html>"#,
        )
    }

    #[test]
    fn test_capture_reads_markers() {
        let state = ThemeState::capture(&dark_page());
        assert_eq!(state.html_class.as_deref(), Some("h-full dark"));
        assert_eq!(state.body_class.as_deref(), Some("dark antialiased"));
        assert_eq!(state.data_theme.as_deref(), Some("dark"));
        assert!(state.is_dark());
    }

    #[test]
    fn test_capture_absent_markers() {
        let doc = LiveDocument::parse("<p>plain</p>");
        let state = ThemeState::capture(&doc);
        assert_eq!(state, ThemeState::default());
        assert!(!state.is_dark());
    }

    #[test]
    fn test_force_light() {
        let doc = dark_page();
        force_light(&doc);

        let state = ThemeState::capture(&doc);
        assert_eq!(state.html_class.as_deref(), Some("h-full"));
        assert_eq!(state.body_class.as_deref(), Some("antialiased"));
        assert_eq!(state.data_theme.as_deref(), Some("light"));
        assert!(!state.is_dark());
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let doc = dark_page();
        let before = ThemeState::capture(&doc);
        {
            let guard = ThemeGuard::acquire(&doc);
            assert_eq!(guard.saved_state(), &before);
            assert!(!ThemeState::capture(&doc).is_dark());
        }
        assert_eq!(ThemeState::capture(&doc), before);
    }

    #[test]
    fn test_guard_restores_absent_attributes() {
        let doc = LiveDocument::parse("<p>plain</p>");
        {
            let _guard = ThemeGuard::acquire(&doc);
            let html = doc.html_element().unwrap();
            assert_eq!(dom::get_attr(&html, "data-theme").as_deref(), Some("light"));
        }
        let html = doc.html_element().unwrap();
        assert!(dom::get_attr(&html, "data-theme").is_none());
        assert!(dom::get_attr(&html, "class").is_none());
    }

    #[test]
    fn test_guard_restores_after_early_return() {
        fn failing_step(doc: &LiveDocument) -> Result<(), String> {
            let _guard = ThemeGuard::acquire(doc);
            Err("stage failed".to_string())
        }

        let doc = dark_page();
        let before = ThemeState::capture(&doc);
        assert!(failing_step(&doc).is_err());
        assert_eq!(ThemeState::capture(&doc), before);
    }
}
