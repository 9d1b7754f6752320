//! Preview Rendering
//!
//! Builds the live preview page an export starts from: the Markdown is
//! rendered with comrak, every element gets the preview's utility classes
//! (light values plus their `dark:` variants), fenced `mermaid` blocks
//! become diagram containers, and the result sits inside a page shell that
//! carries the global theme markers.

use kuchiki::NodeRef;
use log::debug;

use super::parser::{render_to_html, split_front_matter};
use crate::config::{Settings, Theme};
use crate::dom::{self, LiveDocument};

// ─────────────────────────────────────────────────────────────────────────────
// Element Classes
// ─────────────────────────────────────────────────────────────────────────────

const H1: &str = "text-4xl font-bold mt-8 mb-6 pb-3 border-b-2 border-gray-300 dark:border-gray-600 text-gray-900 dark:text-gray-100";
const H2: &str = "text-3xl font-semibold mt-8 mb-4 text-gray-800 dark:text-gray-200";
const H3: &str = "text-2xl font-semibold mt-6 mb-3 text-gray-800 dark:text-gray-200";
const PARAGRAPH: &str = "text-base leading-7 mb-4 text-gray-700 dark:text-gray-300";
const TABLE_WRAPPER: &str = "my-6 overflow-x-auto";
const TABLE: &str = "min-w-full border-collapse border-2 border-gray-300 dark:border-gray-600 shadow-sm";
const THEAD: &str = "bg-gray-100 dark:bg-gray-700";
const TH: &str = "border border-gray-300 dark:border-gray-600 px-4 py-3 text-left font-semibold text-gray-900 dark:text-gray-100";
const TD: &str = "border border-gray-300 dark:border-gray-600 px-4 py-3 text-gray-700 dark:text-gray-300";
const BLOCKQUOTE: &str = "border-l-4 border-blue-500 dark:border-blue-400 pl-6 py-3 my-6 italic bg-blue-50 dark:bg-blue-900/20 text-gray-700 dark:text-gray-300 rounded-r";
const UL: &str = "list-disc list-outside ml-6 mb-4 space-y-2 text-gray-700 dark:text-gray-300";
const OL: &str = "list-decimal list-outside ml-6 mb-4 space-y-2 text-gray-700 dark:text-gray-300";
const LINK: &str = "text-blue-600 dark:text-blue-400 hover:text-blue-800 dark:hover:text-blue-300 underline";
const HR: &str = "my-8 border-t-2 border-gray-300 dark:border-gray-600";
const IMG: &str = "max-w-full h-auto rounded-lg shadow-md my-6";
const INLINE_CODE: &str = "bg-gray-100 dark:bg-gray-700 text-pink-600 dark:text-pink-400 px-2 py-0.5 rounded text-sm font-mono";
const CODE_BLOCK: &str = "my-6 p-4 rounded-lg overflow-hidden shadow-sm bg-gray-50 dark:bg-gray-800 text-gray-800 dark:text-gray-200 text-sm font-mono code-block-container";
const MERMAID_CONTAINER: &str = "my-8 p-6 bg-gray-50 dark:bg-gray-800 rounded-lg border-2 border-gray-200 dark:border-gray-700 mermaid-container";

const BODY_LIGHT: &str = "bg-gray-100 text-gray-900 antialiased";
const PAGE: &str = "mx-auto px-4 py-8";
const SURFACE: &str = "bg-white dark:bg-gray-900 p-8 rounded-lg shadow-sm";
const ARTICLE: &str = "markdown-body";

/// Rendered preview page, ready to be exported.
#[derive(Debug, Clone)]
pub struct Preview {
    pub document: LiveDocument,
    /// Front matter title, else the first heading
    pub title: Option<String>,
}

impl Preview {
    /// The element holding the rendered Markdown.
    pub fn content_root(&self, settings: &Settings) -> Option<NodeRef> {
        self.document.element_by_id(&settings.content_root_id)
    }
}

/// Render `markdown` into a preview page in the given theme.
pub fn render_preview(markdown: &str, theme: Theme, content_root_id: &str) -> Preview {
    let (front_matter, body) = split_front_matter(markdown);
    let html = render_to_html(body);
    let front_title = front_matter
        .and_then(|fm| fm.title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let shell = page_shell(theme, content_root_id, front_title.as_deref());
    let document = LiveDocument::parse(&shell);

    let mut title = front_title;
    if let Some(article) = document.element_by_id(content_root_id) {
        for node in dom::parse_fragment(&html) {
            article.append(node);
        }
        let decorated = decorate(&article);
        debug!("Decorated {} preview elements", decorated);

        if title.is_none() {
            title = article
                .descendants()
                .find(|n| dom::is_tag(n, &["h1"]))
                .map(|h1| dom::normalized_text(&h1))
                .filter(|t| !t.is_empty());
            if let Some(text) = &title {
                set_page_title(&document, text);
            }
        }
    }

    Preview { document, title }
}

/// Preview page from an existing HTML file. The page is used as-is; only
/// a missing content root is added around the body's children.
pub fn load_html_page(html: &str, content_root_id: &str) -> Preview {
    let document = LiveDocument::parse(html);
    if document.element_by_id(content_root_id).is_none() {
        if let Some(body) = document.body_element() {
            let wrapper = new_element(&format!(r#"<article id="{}"></article>"#, content_root_id));
            let children: Vec<NodeRef> = body.children().collect();
            for child in children {
                wrapper.append(child);
            }
            body.append(wrapper);
        }
    }
    let title = document.title();
    Preview { document, title }
}

fn set_page_title(document: &LiveDocument, title: &str) {
    let head = document
        .document()
        .descendants()
        .find(|n| dom::is_tag(n, &["head"]));
    if let Some(head) = head {
        let element = new_element("<title></title>");
        element.append(NodeRef::new_text(title));
        head.append(element);
    }
}

fn page_shell(theme: Theme, content_root_id: &str, title: Option<&str>) -> String {
    let (html_class, body_class) = if theme.is_dark() {
        ("dark", format!("dark {}", BODY_LIGHT))
    } else {
        ("", BODY_LIGHT.to_string())
    };
    let title = title
        .map(|t| format!("<title>{}</title>", escape_text(t)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html><html lang="en" class="{html_class}" data-theme="{theme}"><head><meta charset="UTF-8">{title}</head><body class="{body_class}"><main class="{page}"><div class="{surface}"><article id="{id}" class="{article}"></article></div></main></body></html>"#,
        html_class = html_class,
        theme = theme.as_str(),
        title = title,
        body_class = body_class,
        page = PAGE,
        surface = SURFACE,
        id = escape_text(content_root_id),
        article = ARTICLE,
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoration
// ─────────────────────────────────────────────────────────────────────────────

/// Add the preview classes below `root`. Returns the number of elements
/// touched.
fn decorate(root: &NodeRef) -> usize {
    // Collected first; the walk replaces and wraps nodes.
    let elements: Vec<NodeRef> = root
        .descendants()
        .filter(|n| n.as_element().is_some())
        .collect();

    let mut count = 0;
    for element in elements {
        let Some(tag) = dom::tag_name(&element).map(str::to_string) else {
            continue;
        };
        let classes = match tag.as_str() {
            "h1" => H1,
            "h2" => H2,
            "h3" => H3,
            "p" => PARAGRAPH,
            "table" => {
                wrap(&element, TABLE_WRAPPER);
                TABLE
            }
            "thead" => THEAD,
            "th" => TH,
            "td" => TD,
            "blockquote" => BLOCKQUOTE,
            "ul" => UL,
            "ol" => OL,
            "a" if dom::get_attr(&element, "href").is_some() => LINK,
            "hr" => HR,
            "img" => IMG,
            "pre" => {
                if let Some(source) = mermaid_source(&element) {
                    replace_with_diagram(&element, &source);
                    count += 1;
                    continue;
                }
                CODE_BLOCK
            }
            "code" if !inside_pre(&element) => INLINE_CODE,
            _ => continue,
        };
        add_classes(&element, classes);
        count += 1;
    }
    count
}

fn add_classes(element: &NodeRef, classes: &str) {
    let mut tokens = dom::class_tokens(element);
    for class in classes.split_whitespace() {
        if !tokens.iter().any(|t| t == class) {
            tokens.push(class.to_string());
        }
    }
    dom::set_class_tokens(element, &tokens);
}

fn inside_pre(element: &NodeRef) -> bool {
    dom::element_ancestors(element).any(|a| dom::is_tag(&a, &["pre"]))
}

/// Source of a fenced `mermaid` block rendered as `<pre><code>`.
fn mermaid_source(pre: &NodeRef) -> Option<String> {
    let code = dom::element_children(pre).find(|c| dom::is_tag(c, &["code"]))?;
    dom::has_class(&code, "language-mermaid")
        .then(|| code.text_contents().trim_end_matches('\n').to_string())
}

fn replace_with_diagram(pre: &NodeRef, source: &str) {
    let container = new_element(&format!(
        r#"<div class="{}"><div class="mermaid-code"></div></div>"#,
        MERMAID_CONTAINER
    ));
    if let Some(code) = dom::element_children(&container).next() {
        code.append(NodeRef::new_text(source));
    }
    pre.insert_before(container);
    pre.detach();
}

fn wrap(element: &NodeRef, classes: &str) {
    let wrapper = new_element(&format!(r#"<div class="{}"></div>"#, classes));
    element.insert_before(wrapper.clone());
    wrapper.append(element.clone());
}

fn new_element(html: &str) -> NodeRef {
    dom::parse_fragment(html)
        .into_iter()
        .find(|n| n.as_element().is_some())
        .unwrap_or_else(|| NodeRef::new_text(""))
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeState;

    const ROOT: &str = Settings::DEFAULT_CONTENT_ROOT_ID;

    fn first(preview: &Preview, tag: &str) -> NodeRef {
        preview
            .document
            .document()
            .descendants()
            .find(|n| dom::is_tag(n, &[tag]))
            .unwrap()
    }

    #[test]
    fn test_dark_shell_markers() {
        let preview = render_preview("# Hi", Theme::Dark, ROOT);
        let state = ThemeState::capture(&preview.document);
        assert!(state.is_dark());
        assert_eq!(state.data_theme.as_deref(), Some("dark"));

        let light = render_preview("# Hi", Theme::Light, ROOT);
        assert!(!ThemeState::capture(&light.document).is_dark());
    }

    #[test]
    fn test_content_root_holds_rendered_markdown() {
        let preview = render_preview("# Hi\n\nText", Theme::Light, ROOT);
        let root = preview.content_root(&Settings::default()).unwrap();
        assert!(dom::has_class(&root, "markdown-body"));
        assert_eq!(
            dom::element_children(&root)
                .filter_map(|n| dom::tag_name(&n).map(str::to_string))
                .collect::<Vec<_>>(),
            vec!["h1", "p"]
        );
    }

    #[test]
    fn test_elements_get_utility_classes() {
        let preview = render_preview("# Title\n\n> quote\n\nUse `x`", Theme::Dark, ROOT);
        let h1 = first(&preview, "h1");
        assert!(dom::has_class(&h1, "text-4xl"));
        assert!(dom::has_class(&h1, "dark:text-gray-100"));
        assert!(dom::has_class(&first(&preview, "blockquote"), "dark:bg-blue-900/20"));
        assert!(dom::has_class(&first(&preview, "code"), "font-mono"));
    }

    #[test]
    fn test_table_is_wrapped() {
        let preview = render_preview("| A |\n|---|\n| 1 |", Theme::Light, ROOT);
        let table = first(&preview, "table");
        let parent = table.parent().unwrap();
        assert!(dom::has_class(&parent, "overflow-x-auto"));
        assert!(dom::has_class(&first(&preview, "th"), "font-semibold"));
    }

    #[test]
    fn test_mermaid_fence_becomes_container() {
        let preview = render_preview("```mermaid\ngraph TD\n  A-->B\n```\n", Theme::Light, ROOT);
        let root = preview.content_root(&Settings::default()).unwrap();
        let container = dom::element_children(&root).next().unwrap();
        assert!(dom::has_class(&container, "mermaid-container"));
        assert!(container.text_contents().contains("A-->B"));
        assert!(!root.descendants().any(|n| dom::is_tag(&n, &["pre"])));
    }

    #[test]
    fn test_code_block_classes() {
        let preview = render_preview("```rust\nfn main() {}\n```\n", Theme::Light, ROOT);
        let pre = first(&preview, "pre");
        assert!(dom::has_class(&pre, "code-block-container"));
        let code = first(&preview, "code");
        assert!(!dom::has_class(&code, "text-pink-600"));
    }

    #[test]
    fn test_title_from_front_matter_or_heading() {
        let preview = render_preview("---\ntitle: From YAML\n---\n# Heading", Theme::Light, ROOT);
        assert_eq!(preview.title.as_deref(), Some("From YAML"));
        assert_eq!(preview.document.title().as_deref(), Some("From YAML"));

        let preview = render_preview("Intro\n\n# Heading  One", Theme::Light, ROOT);
        assert_eq!(preview.title.as_deref(), Some("Heading One"));
        assert_eq!(preview.document.title().as_deref(), Some("Heading One"));
    }

    #[test]
    fn test_load_html_page_adds_missing_root() {
        let preview = load_html_page(
            "<html><head><title>Page</title></head><body><p>a</p><p>b</p></body></html>",
            ROOT,
        );
        let root = preview.content_root(&Settings::default()).unwrap();
        assert_eq!(dom::element_children(&root).count(), 2);
        assert_eq!(preview.title.as_deref(), Some("Page"));
    }
}
