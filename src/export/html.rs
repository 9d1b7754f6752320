//! HTML Snapshot Generation
//!
//! Wraps a prepared export clone into a standalone HTML document. The
//! clone keeps its markup and classes; the flattener's stylesheet-mode
//! rules are embedded so the page renders without the preview's CSS.

use kuchiki::NodeRef;

use crate::theme::ExportPalette;

/// Title used when the document has none.
pub const DEFAULT_TITLE: &str = "Exported Document";

// ─────────────────────────────────────────────────────────────────────────────
// HTML Generation
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a complete HTML document around `root`.
///
/// # Arguments
///
/// * `root` - The prepared (normalized, sanitized) clone
/// * `stylesheet` - Rules produced by the flattener in stylesheet mode
/// * `title` - Optional document title
/// * `palette` - Light colors for the page itself
pub fn generate_html_document(
    root: &NodeRef,
    stylesheet: &str,
    title: Option<&str>,
    palette: &ExportPalette,
) -> String {
    let doc_title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="generator" content="mdexport">
    <title>{title}</title>
    <style>
{base_css}
body {{
    background-color: {background};
    color: {text};
}}

{stylesheet}
    </style>
</head>
<body>
{body}
</body>
</html>"#,
        title = html_escape(doc_title),
        base_css = BASE_CSS,
        background = palette.background.to_hex(),
        text = palette.text.to_hex(),
        stylesheet = stylesheet.trim_end(),
        body = root.to_string(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// CSS
// ─────────────────────────────────────────────────────────────────────────────

/// Base CSS for the page (layout, typography). Everything element-specific
/// comes from the flattened rules.
const BASE_CSS: &str = r#"
*, *::before, *::after {
    box-sizing: border-box;
    border-width: 0;
    border-style: solid;
}

body {
    margin: 0;
    padding: 0;
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Noto Sans', Helvetica, Arial, sans-serif;
    font-size: 16px;
    line-height: 1.6;
}

body > * {
    max-width: 900px;
    margin-left: auto;
    margin-right: auto;
}

img {
    max-width: 100%;
    height: auto;
}

table {
    border-collapse: collapse;
}
"#;

/// HTML-escape a string.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;

    fn article() -> NodeRef {
        dom::parse_fragment(r#"<article class="prose"><h1 class="text-4xl">Test</h1><p>Paragraph text.</p></article>"#)
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn test_generate_html_document() {
        let html = generate_html_document(
            &article(),
            "h1.text-4xl { font-size: 36px; }\n",
            Some("Test Doc"),
            &ExportPalette::light(),
        );

        // Check document structure
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("<title>Test Doc</title>"));
        assert!(html.contains(r#"<article class="prose">"#));
        assert!(html.contains("</article>"));

        // Check content and rules
        assert!(html.contains(r#"<h1 class="text-4xl">Test</h1>"#));
        assert!(html.contains("h1.text-4xl { font-size: 36px; }"));
    }

    #[test]
    fn test_blank_title_uses_default() {
        let html = generate_html_document(&article(), "", Some("  "), &ExportPalette::light());
        assert!(html.contains(&format!("<title>{}</title>", DEFAULT_TITLE)));
    }

    #[test]
    fn test_page_uses_light_palette() {
        let palette = ExportPalette::light();
        let html = generate_html_document(&article(), "", None, &palette);
        assert!(html.contains(&format!("background-color: {};", palette.background.to_hex())));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("Hello"), "Hello");
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape("\"quoted\""), "&quot;quoted&quot;");
    }
}
