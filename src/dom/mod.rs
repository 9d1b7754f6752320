//! Document tree access
//!
//! A thin layer over kuchiki's reference-counted HTML tree. `LiveDocument`
//! stands for the attached, rendered preview; export passes never mutate it
//! except for the global theme markers owned by `theme::ThemeGuard`, and
//! work on detached copies made with [`deep_clone`].

use kuchiki::traits::*;
use kuchiki::{NodeData, NodeRef};

// ─────────────────────────────────────────────────────────────────────────────
// Live Document
// ─────────────────────────────────────────────────────────────────────────────

/// The attached document the preview was rendered into.
#[derive(Debug, Clone)]
pub struct LiveDocument {
    document: NodeRef,
}

impl LiveDocument {
    /// Parse a complete HTML page. The parser always yields `html`, `head`
    /// and `body` elements, even for fragments.
    pub fn parse(html: &str) -> Self {
        Self {
            document: kuchiki::parse_html().one(html),
        }
    }

    /// The document node.
    pub fn document(&self) -> &NodeRef {
        &self.document
    }

    /// The root `<html>` element.
    pub fn html_element(&self) -> Option<NodeRef> {
        first_element(&self.document, "html")
    }

    /// The `<body>` element.
    pub fn body_element(&self) -> Option<NodeRef> {
        first_element(&self.document, "body")
    }

    /// First element in document order whose `id` equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeRef> {
        element_by_id(&self.document, id)
    }

    /// Document title from `<title>`, if present and non-blank.
    pub fn title(&self) -> Option<String> {
        let title = first_element(&self.document, "title")?;
        let text = title.text_contents().trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.document.to_string()
    }
}

fn first_element(root: &NodeRef, tag: &str) -> Option<NodeRef> {
    root.inclusive_descendants()
        .find(|node| tag_name(node) == Some(tag))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Recursively copy a subtree into new, detached nodes.
///
/// kuchiki's `NodeRef::clone` only clones the reference; this copies every
/// node so the result shares nothing with the source tree.
pub fn deep_clone(node: &NodeRef) -> NodeRef {
    let copy = match node.data() {
        NodeData::Element(element) => NodeRef::new_element(
            element.name.clone(),
            element.attributes.borrow().map.clone(),
        ),
        NodeData::Text(text) => NodeRef::new_text(text.borrow().clone()),
        NodeData::Comment(text) => NodeRef::new_comment(text.borrow().clone()),
        NodeData::Document(_) => NodeRef::new_document(),
        // Doctypes, processing instructions and fragments never occur
        // inside a rendered subtree; keep the shapes parallel anyway.
        _ => NodeRef::new_comment(String::new()),
    };
    for child in node.children() {
        copy.append(deep_clone(&child));
    }
    copy
}

/// Lowercase local tag name of an element node.
pub fn tag_name(node: &NodeRef) -> Option<&str> {
    node.as_element().map(|element| &*element.name.local)
}

/// Whether `node` is an element with one of the given tag names.
pub fn is_tag(node: &NodeRef, tags: &[&str]) -> bool {
    tag_name(node).is_some_and(|tag| tags.contains(&tag))
}

pub fn get_attr(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|element| element.attributes.borrow().get(name).map(str::to_string))
}

pub fn set_attr(node: &NodeRef, name: &str, value: impl Into<String>) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().insert(name, value.into());
    }
}

pub fn remove_attr(node: &NodeRef, name: &str) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().remove(name);
    }
}

/// Whitespace-separated tokens of the `class` attribute.
pub fn class_tokens(node: &NodeRef) -> Vec<String> {
    get_attr(node, "class")
        .map(|class| class.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(node: &NodeRef, class: &str) -> bool {
    get_attr(node, "class").is_some_and(|c| c.split_whitespace().any(|t| t == class))
}

/// Replace the class list; an empty list removes the attribute.
pub fn set_class_tokens<S: AsRef<str>>(node: &NodeRef, tokens: &[S]) {
    if tokens.is_empty() {
        remove_attr(node, "class");
    } else {
        let joined = tokens
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");
        set_attr(node, "class", joined);
    }
}

/// First element under (or equal to) `root` with the given `id`.
pub fn element_by_id(root: &NodeRef, id: &str) -> Option<NodeRef> {
    root.inclusive_descendants()
        .find(|node| get_attr(node, "id").as_deref() == Some(id))
}

/// The element holding the rendered content: the descendant carrying
/// `content_root_id`, or `element` itself when there is none.
pub fn find_content_root(element: &NodeRef, content_root_id: &str) -> NodeRef {
    element_by_id(element, content_root_id).unwrap_or_else(|| element.clone())
}

/// A subtree with no element children and no visible text.
pub fn is_empty_subtree(node: &NodeRef) -> bool {
    node.children().all(|child| match child.data() {
        NodeData::Element(_) => false,
        NodeData::Text(text) => text.borrow().trim().is_empty(),
        _ => true,
    })
}

/// Direct children that are elements.
pub fn element_children(node: &NodeRef) -> impl Iterator<Item = NodeRef> {
    node.children().filter(|child| child.as_element().is_some())
}

/// Element ancestors, nearest first.
pub fn element_ancestors(node: &NodeRef) -> impl Iterator<Item = NodeRef> {
    node.ancestors().filter(|n| n.as_element().is_some())
}

/// Text content with runs of whitespace collapsed and ends trimmed.
pub fn normalized_text(node: &NodeRef) -> String {
    node.text_contents()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse an HTML fragment and return its nodes, detached and in order.
pub fn parse_fragment(html: &str) -> Vec<NodeRef> {
    let document = kuchiki::parse_html().one(format!("<body>{}</body>", html));
    let body = match first_element(&document, "body") {
        Some(body) => body,
        None => return Vec::new(),
    };
    let nodes: Vec<NodeRef> = body.children().collect();
    for node in &nodes {
        node.detach();
    }
    nodes
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html class="dark" data-theme="dark"><head><title> Notes </title></head>
        <body><main id="app"><article id="markdown-preview" class="prose dark:prose-invert">
        <h1>Title</h1><p>Body <em>text</em></p></article></main></body></html>"#;

    #[test]
    fn test_live_document_lookup() {
        let doc = LiveDocument::parse(PAGE);
        assert!(doc.html_element().is_some());
        assert!(doc.body_element().is_some());
        assert_eq!(doc.title().as_deref(), Some("Notes"));

        let article = doc.element_by_id("markdown-preview").unwrap();
        assert_eq!(tag_name(&article), Some("article"));
        assert!(doc.element_by_id("missing").is_none());
    }

    #[test]
    fn test_deep_clone_is_detached_copy() {
        let doc = LiveDocument::parse(PAGE);
        let article = doc.element_by_id("markdown-preview").unwrap();
        let copy = deep_clone(&article);

        assert!(copy.parent().is_none());
        assert_eq!(copy.to_string(), article.to_string());

        set_attr(&copy, "class", "changed");
        copy.first_child().unwrap().detach();
        assert_eq!(get_attr(&article, "class").as_deref(), Some("prose dark:prose-invert"));
        assert_eq!(
            article.inclusive_descendants().count(),
            copy.inclusive_descendants().count() + 1
        );
    }

    #[test]
    fn test_deep_clone_preserves_shape() {
        let doc = LiveDocument::parse(PAGE);
        let article = doc.element_by_id("markdown-preview").unwrap();
        let copy = deep_clone(&article);

        let source: Vec<Option<String>> = article
            .inclusive_descendants()
            .map(|n| tag_name(&n).map(str::to_string))
            .collect();
        let cloned: Vec<Option<String>> = copy
            .inclusive_descendants()
            .map(|n| tag_name(&n).map(str::to_string))
            .collect();
        assert_eq!(source, cloned);
    }

    #[test]
    fn test_class_helpers() {
        let doc = LiveDocument::parse(PAGE);
        let article = doc.element_by_id("markdown-preview").unwrap();

        assert_eq!(class_tokens(&article), vec!["prose", "dark:prose-invert"]);
        assert!(has_class(&article, "prose"));
        assert!(!has_class(&article, "pro"));

        set_class_tokens(&article, &["a", "b"]);
        assert_eq!(get_attr(&article, "class").as_deref(), Some("a b"));
        set_class_tokens::<&str>(&article, &[]);
        assert!(get_attr(&article, "class").is_none());
    }

    #[test]
    fn test_find_content_root_prefers_known_id() {
        let doc = LiveDocument::parse(PAGE);
        let app = doc.element_by_id("app").unwrap();
        let root = find_content_root(&app, "markdown-preview");
        assert_eq!(get_attr(&root, "id").as_deref(), Some("markdown-preview"));

        let fallback = find_content_root(&app, "nothing-here");
        assert_eq!(fallback, app);
    }

    #[test]
    fn test_is_empty_subtree() {
        let doc = LiveDocument::parse(r#"<div id="a">  </div><div id="b"><span></span></div><div id="c"> x </div><div id="d"><!-- note --></div>"#);
        assert!(is_empty_subtree(&doc.element_by_id("a").unwrap()));
        assert!(!is_empty_subtree(&doc.element_by_id("b").unwrap()));
        assert!(!is_empty_subtree(&doc.element_by_id("c").unwrap()));
        assert!(is_empty_subtree(&doc.element_by_id("d").unwrap()));
    }

    #[test]
    fn test_normalized_text() {
        let doc = LiveDocument::parse("<p id=\"p\">  one\n   two <b>three</b> </p>");
        assert_eq!(normalized_text(&doc.element_by_id("p").unwrap()), "one two three");
    }

    #[test]
    fn test_parse_fragment() {
        let nodes = parse_fragment("<p>a</p>text<hr>");
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| n.parent().is_none()));
        assert_eq!(tag_name(&nodes[2]), Some("hr"));
    }
}
