//! Content Sanitizer
//!
//! Removes markup that has no place in a static document (scripts,
//! interactive controls, canvases, vector diagrams, stylesheet links) and
//! strips bookkeeping attributes left behind by the preview renderer.
//! Runs on the detached export clone only.

use kuchiki::NodeRef;
use log::debug;

use crate::dom;

/// Text left where a diagram stood in formats that cannot carry it.
pub const DIAGRAM_PLACEHOLDER: &str = "[Diagram not supported in this format]";

/// Elements removed outright.
const REMOVED_TAGS: &[&str] = &[
    "script", "noscript", "template", "button", "canvas", "style", "link",
];

/// Attribute prefixes stripped from every surviving element.
const STRIPPED_PREFIXES: &[&str] = &["data-", "aria-", "on"];

/// Value produced by serializing a non-string object into an attribute.
const OBJECT_ATTRIBUTE_VALUE: &str = "[object Object]";

/// What happens to diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeMode {
    /// Diagrams are dropped; the bitmap simply lacks them
    Raster,
    /// Diagrams are replaced by [`DIAGRAM_PLACEHOLDER`]
    Structured,
}

/// Counts of what a sanitize pass changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SanitizeReport {
    pub removed: usize,
    pub placeholders: usize,
    pub stripped_attributes: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Drop,
    Diagram,
}

fn classify(node: &NodeRef) -> Option<Removal> {
    let tag = dom::tag_name(node)?;
    if REMOVED_TAGS.contains(&tag) {
        return Some(Removal::Drop);
    }
    let is_diagram = tag == "svg"
        || dom::get_attr(node, "class").is_some_and(|class| class.contains("mermaid"));
    is_diagram.then_some(Removal::Diagram)
}

/// Sanitize the subtree under `root` in place. The root itself is kept.
pub fn sanitize(root: &NodeRef, mode: SanitizeMode) -> SanitizeReport {
    let mut report = SanitizeReport::default();

    // Outermost matches only; their descendants go with them.
    let mut targets = Vec::new();
    let mut stack: Vec<NodeRef> = root.children().collect();
    stack.reverse();
    while let Some(node) = stack.pop() {
        if let Some(removal) = classify(&node) {
            targets.push((node, removal));
            continue;
        }
        let mut children: Vec<NodeRef> = node.children().collect();
        children.reverse();
        stack.extend(children);
    }

    for (node, removal) in targets {
        if removal == Removal::Diagram && mode == SanitizeMode::Structured {
            node.insert_before(NodeRef::new_text(DIAGRAM_PLACEHOLDER));
            report.placeholders += 1;
        }
        node.detach();
        report.removed += 1;
    }

    for node in root.inclusive_descendants() {
        report.stripped_attributes += strip_attributes(&node);
    }

    debug!(
        "Sanitized export clone: {} removed, {} placeholders, {} attributes stripped",
        report.removed, report.placeholders, report.stripped_attributes
    );
    report
}

fn strip_attributes(node: &NodeRef) -> usize {
    let element = match node.as_element() {
        Some(element) => element,
        None => return 0,
    };
    let mut attributes = element.attributes.borrow_mut();
    let doomed: Vec<_> = attributes
        .map
        .iter()
        .filter(|(name, attr)| {
            let local = &*name.local;
            local == "node"
                || STRIPPED_PREFIXES.iter().any(|p| local.starts_with(p))
                || attr.value == OBJECT_ATTRIBUTE_VALUE
        })
        .map(|(name, _)| name.clone())
        .collect();
    for name in &doomed {
        attributes.map.remove(name);
    }
    doomed.len()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn root(html: &str) -> NodeRef {
        let nodes = dom::parse_fragment(&format!("<article>{}</article>", html));
        nodes.into_iter().next().unwrap()
    }

    #[test]
    fn test_script_and_canvas_removed_heading_kept() {
        let article = root("<script>alert(1)</script><canvas></canvas><h1>Kept</h1>");
        let report = sanitize(&article, SanitizeMode::Raster);

        assert_eq!(report.removed, 2);
        assert_eq!(article.to_string(), "<article><h1>Kept</h1></article>");
    }

    #[test]
    fn test_outermost_diagram_gets_one_placeholder() {
        let article = root(
            r#"<div class="mermaid-container"><div class="mermaid-code">graph TD</div><svg><g></g></svg></div><p>after</p>"#,
        );
        let report = sanitize(&article, SanitizeMode::Structured);

        assert_eq!(report.placeholders, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(
            article.to_string(),
            format!("<article>{}<p>after</p></article>", DIAGRAM_PLACEHOLDER)
        );
    }

    #[test]
    fn test_raster_mode_drops_diagrams() {
        let article = root(r#"<svg width="10"></svg><p>x</p>"#);
        let report = sanitize(&article, SanitizeMode::Raster);
        assert_eq!(report.placeholders, 0);
        assert_eq!(article.to_string(), "<article><p>x</p></article>");
    }

    #[test]
    fn test_strips_bookkeeping_attributes() {
        let article = root(
            r#"<p node="[object Object]" data-line="4" aria-label="x" onclick="go()" title="[object Object]" class="mb-4" id="p">x</p>"#,
        );
        let report = sanitize(&article, SanitizeMode::Raster);
        assert_eq!(report.stripped_attributes, 5);

        let p = article.first_child().unwrap();
        assert_eq!(dom::get_attr(&p, "class").as_deref(), Some("mb-4"));
        assert_eq!(dom::get_attr(&p, "id").as_deref(), Some("p"));
        assert!(dom::get_attr(&p, "data-line").is_none());
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let article = root(
            r#"<div class="mermaid">x</div><button>Copy</button><p data-x="1">text</p>"#,
        );
        sanitize(&article, SanitizeMode::Structured);
        let once = article.to_string();

        let second = sanitize(&article, SanitizeMode::Structured);
        assert!(second.is_clean());
        assert_eq!(article.to_string(), once);
    }
}
