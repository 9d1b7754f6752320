//! Markdown parser implementation using comrak
//!
//! This module wraps comrak's rendering functions and splits off the YAML
//! front matter block so its metadata can label the exported document.

use comrak::{markdown_to_html, Options};
use log::warn;
use serde::Deserialize;

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration options for markdown rendering.
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Enable GitHub Flavored Markdown tables
    pub tables: bool,
    /// Enable strikethrough syntax (~~text~~)
    pub strikethrough: bool,
    /// Enable autolink URLs and emails
    pub autolink: bool,
    /// Enable task lists (- [ ] and - [x])
    pub tasklist: bool,
    /// Enable footnotes
    pub footnotes: bool,
    /// Pass raw HTML through; the export sanitizer strips what cannot be kept
    pub raw_html: bool,
    /// Generate GitHub-style heading IDs
    pub header_ids: Option<String>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            autolink: true,
            tasklist: true,
            footnotes: true,
            raw_html: true,
            header_ids: Some(String::new()),
        }
    }
}

impl MarkdownOptions {
    /// Convert to comrak Options.
    fn to_comrak_options(&self) -> Options {
        let mut options = Options::default();

        // Extension options
        options.extension.strikethrough = self.strikethrough;
        options.extension.table = self.tables;
        options.extension.autolink = self.autolink;
        options.extension.tasklist = self.tasklist;
        options.extension.footnotes = self.footnotes;
        options.extension.header_ids = self.header_ids.clone();

        // Render options
        options.render.unsafe_ = self.raw_html;

        options
    }
}

/// Metadata read from a leading YAML block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub author: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Render markdown to an HTML fragment with the default options.
pub fn render_to_html(markdown: &str) -> String {
    render_to_html_with_options(markdown, &MarkdownOptions::default())
}

/// Render markdown to an HTML fragment.
pub fn render_to_html_with_options(markdown: &str, options: &MarkdownOptions) -> String {
    markdown_to_html(markdown, &options.to_comrak_options())
}

/// Split a leading `---` YAML block off the document.
///
/// Returns the parsed metadata (if the block was valid YAML) and the
/// remaining markdown. An unterminated block is treated as content.
pub fn split_front_matter(markdown: &str) -> (Option<FrontMatter>, &str) {
    let body = markdown.strip_prefix('\u{feff}').unwrap_or(markdown);
    let Some(after_open) = body
        .strip_prefix("---\n")
        .or_else(|| body.strip_prefix("---\r\n"))
    else {
        return (None, markdown);
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &after_open[..offset];
            let rest = &after_open[offset + line.len()..];
            let front_matter = if yaml.trim().is_empty() {
                Some(FrontMatter::default())
            } else {
                match serde_yaml::from_str::<FrontMatter>(yaml) {
                    Ok(front_matter) => Some(front_matter),
                    Err(e) => {
                        warn!("Ignoring unreadable front matter: {}", e);
                        None
                    }
                }
            };
            return (front_matter, rest);
        }
        offset += line.len();
    }
    (None, markdown)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_render_heading_and_paragraph() {
        let html = render_to_html("# Hello\n\nWorld");
        assert!(html.contains("<h1"));
        assert!(html.contains("Hello"));
        assert!(html.contains("<p>World</p>"));
    }

    #[test]
    fn test_render_table() {
        let html = render_to_html("| A | B |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>A</th>"));
        assert!(html.contains("<td>2</td>"));
    }

    #[test]
    fn test_render_strikethrough_and_tasks() {
        let html = render_to_html("~~gone~~\n\n- [x] done");
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("type=\"checkbox\""));
    }

    #[test]
    fn test_render_fenced_code_keeps_language() {
        let html = render_to_html("```mermaid\ngraph TD\n```");
        assert!(html.contains("class=\"language-mermaid\""));
    }

    #[test]
    fn test_raw_html_passes_through() {
        let html = render_to_html("<div class=\"note\">x</div>");
        assert!(html.contains("<div class=\"note\">"));

        let options = MarkdownOptions {
            raw_html: false,
            ..Default::default()
        };
        let html = render_to_html_with_options("<div class=\"note\">x</div>", &options);
        assert!(!html.contains("<div class=\"note\">"));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Front Matter Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_front_matter_title() {
        let (front_matter, rest) =
            split_front_matter("---\ntitle: Quarterly Report\ntags: [a, b]\n---\n# Body\n");
        assert_eq!(
            front_matter.unwrap().title.as_deref(),
            Some("Quarterly Report")
        );
        assert_eq!(rest, "# Body\n");
    }

    #[test]
    fn test_no_front_matter() {
        let (front_matter, rest) = split_front_matter("# Title\n---\n");
        assert!(front_matter.is_none());
        assert_eq!(rest, "# Title\n---\n");
    }

    #[test]
    fn test_unterminated_front_matter_is_content() {
        let source = "---\ntitle: x\n";
        let (front_matter, rest) = split_front_matter(source);
        assert!(front_matter.is_none());
        assert_eq!(rest, source);
    }

    #[test]
    fn test_invalid_yaml_is_stripped() {
        let (front_matter, rest) = split_front_matter("---\n: : [\n---\ntext");
        assert!(front_matter.is_none());
        assert_eq!(rest, "text");
    }

    #[test]
    fn test_crlf_front_matter() {
        let (front_matter, rest) = split_front_matter("---\r\ntitle: Win\r\n---\r\nbody");
        assert_eq!(front_matter.unwrap().title.as_deref(), Some("Win"));
        assert_eq!(rest, "body");
    }
}
