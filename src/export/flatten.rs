//! Style Flattener
//!
//! Rewrites computed presentation into self-contained literal CSS so the
//! export no longer depends on utility classes, a stylesheet or a theme.
//! Inline mode writes each element's declarations into its `style`
//! attribute and drops `class`; stylesheet mode leaves the markup alone and
//! returns one rule per distinct `tag.class` signature.

use kuchiki::NodeRef;
use log::{debug, warn};
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::dom;
use crate::style::{serialize_declarations, ComputedStyle, Declaration, Property, StyleResolver};
use crate::theme::Rgb;

/// Values never worth writing.
const OMITTED_KEYWORDS: &[&str] = &["inherit", "initial", "unset"];

/// Keywords written only when they override a different baseline value.
const QUIET_KEYWORDS: &[&str] = &["auto", "none", "normal"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlattenMode {
    Inline,
    Stylesheet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenOutcome {
    /// Elements whose style was resolved
    pub elements: usize,
    /// Declarations written
    pub declarations: usize,
    /// Elements skipped because their style could not be read
    pub skipped: usize,
    /// Generated rules (stylesheet mode only)
    pub stylesheet: String,
}

fn wide_gamut_function() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(oklch|oklab|lab|lch)\([^)]*\)").expect("valid regex"))
}

/// Replace `oklch()`/`oklab()`/`lab()`/`lch()` with literal sRGB.
///
/// Returns `None` when the value holds a color that cannot be converted
/// here (`color()`, `color-mix()`, or an out-of-range function).
pub fn literal_color_value(value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    if lower.contains("color(") || lower.contains("color-mix(") {
        return None;
    }
    let mut failed = false;
    let converted = wide_gamut_function().replace_all(value, |caps: &Captures| {
        match Rgb::parse(&caps[0]) {
            Some(rgb) => rgb.to_string(),
            None => {
                failed = true;
                String::new()
            }
        }
    });
    (!failed).then(|| converted.into_owned())
}

/// Flatten computed styles under (and including) `root`.
///
/// `context` is the computed style of the element `root` was cloned out
/// of, so inherited values resolve as they did in place.
pub fn flatten(
    root: &NodeRef,
    context: &ComputedStyle,
    resolver: &StyleResolver,
    mode: FlattenMode,
) -> FlattenOutcome {
    let mut outcome = FlattenOutcome::default();
    let mut seen = HashSet::new();
    walk(root, context, resolver, mode, &mut seen, &mut outcome);
    debug!(
        "Flattened {} elements ({} declarations, {} skipped)",
        outcome.elements, outcome.declarations, outcome.skipped
    );
    outcome
}

fn walk(
    node: &NodeRef,
    parent: &ComputedStyle,
    resolver: &StyleResolver,
    mode: FlattenMode,
    seen: &mut HashSet<String>,
    outcome: &mut FlattenOutcome,
) {
    let tag = match dom::tag_name(node) {
        Some(tag) => tag.to_string(),
        None => return,
    };

    let style = match resolver.computed_style_with_parent(node, parent) {
        Ok(style) => style,
        Err(e) => {
            warn!("Leaving <{}> unflattened: {}", tag, e);
            outcome.skipped += 1;
            let fallback = parent.inherited();
            for child in node.children() {
                walk(&child, &fallback, resolver, mode, seen, outcome);
            }
            return;
        }
    };
    outcome.elements += 1;

    let baseline = resolver.baseline(&tag, parent);

    match mode {
        FlattenMode::Inline => {
            let declarations = literal_declarations(&style, &baseline);
            outcome.declarations += declarations.len();
            if declarations.is_empty() {
                dom::remove_attr(node, "style");
            } else {
                dom::set_attr(node, "style", serialize_declarations(&declarations));
            }
            dom::remove_attr(node, "class");
        }
        FlattenMode::Stylesheet => {
            let selector = selector_for(node, &tag);
            // Inline `style` stays on the element; the rule carries only
            // what the classes contribute.
            if seen.insert(selector.clone()) {
                let declarations = match class_style(node, parent, resolver) {
                    Some(class_style) => literal_declarations(&class_style, &baseline),
                    None => Vec::new(),
                };
                if declarations.is_empty() {
                    return walk_children(node, &style, resolver, mode, seen, outcome);
                }
                outcome.declarations += declarations.len();
                let _ = writeln!(
                    outcome.stylesheet,
                    "{} {{ {}; }}",
                    selector,
                    serialize_declarations(&declarations)
                );
            }
        }
    }

    walk_children(node, &style, resolver, mode, seen, outcome);
}

fn walk_children(
    node: &NodeRef,
    style: &ComputedStyle,
    resolver: &StyleResolver,
    mode: FlattenMode,
    seen: &mut HashSet<String>,
    outcome: &mut FlattenOutcome,
) {
    for child in node.children() {
        walk(&child, style, resolver, mode, seen, outcome);
    }
}

/// Computed style of `node` with its inline `style` attribute ignored.
fn class_style(
    node: &NodeRef,
    parent: &ComputedStyle,
    resolver: &StyleResolver,
) -> Option<ComputedStyle> {
    let inline = dom::get_attr(node, "style");
    if inline.is_some() {
        dom::remove_attr(node, "style");
    }
    let style = resolver.computed_style_with_parent(node, parent).ok();
    if let Some(inline) = inline {
        dom::set_attr(node, "style", inline);
    }
    style
}

fn literal_declarations(style: &ComputedStyle, baseline: &ComputedStyle) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for property in Property::ALL {
        let value = style.get(property);
        let always = property == Property::BackgroundColor && style.has_background();
        if !always {
            if OMITTED_KEYWORDS.contains(&&*value) || value == baseline.get(property) {
                continue;
            }
            if QUIET_KEYWORDS.contains(&&*value)
                && QUIET_KEYWORDS.contains(&&*baseline.get(property))
            {
                continue;
            }
        }
        match literal_color_value(&value) {
            Some(literal) => declarations.push(Declaration::new(property.name(), literal)),
            None => debug!("Skipping {} value outside sRGB: {}", property.name(), value),
        }
    }
    declarations
}

fn selector_for(node: &NodeRef, tag: &str) -> String {
    let mut classes = dom::class_tokens(node);
    classes.sort();
    classes.dedup();
    let mut selector = tag.to_string();
    for class in classes {
        selector.push('.');
        selector.push_str(&escape_class(&class));
    }
    selector
}

fn escape_class(class: &str) -> String {
    let mut escaped = String::with_capacity(class.len());
    for (i, c) in class.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            // Leading digits need a code point escape
            let _ = write!(escaped, "\\3{} ", c);
            continue;
        }
        if !(c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn article(html: &str) -> NodeRef {
        dom::parse_fragment(&format!("<article>{}</article>", html))
            .into_iter()
            .next()
            .unwrap()
    }

    fn flatten_inline(root: &NodeRef) -> FlattenOutcome {
        flatten(
            root,
            &ComputedStyle::default(),
            &StyleResolver::new(),
            FlattenMode::Inline,
        )
    }

    #[test]
    fn test_literal_color_value() {
        assert_eq!(
            literal_color_value("2px solid oklch(100% 0 0)").as_deref(),
            Some("2px solid rgb(255, 255, 255)")
        );
        assert_eq!(literal_color_value("#123456").as_deref(), Some("#123456"));
        assert_eq!(literal_color_value("color-mix(in srgb, red, blue)"), None);
        assert_eq!(literal_color_value("color(display-p3 1 0 0)"), None);
    }

    #[test]
    fn test_non_default_background_written_as_literal() {
        let root = article(r#"<blockquote class="bg-blue-50 italic">q</blockquote>"#);
        flatten_inline(&root);
        let quote = dom::element_children(&root).next().unwrap();
        let style = dom::get_attr(&quote, "style").unwrap();

        assert!(style.contains("background-color: rgb("), "{}", style);
        assert!(style.contains("font-style: italic"));
        assert!(!style.contains("oklch"));
        assert!(dom::get_attr(&quote, "class").is_none());
    }

    #[test]
    fn test_inherited_and_default_values_omitted() {
        let root = article(r#"<p style="color: #333333">a <span>b</span></p>"#);
        flatten_inline(&root);
        let p = dom::element_children(&root).next().unwrap();
        let span = dom::element_children(&p).next().unwrap();

        assert_eq!(dom::get_attr(&p, "style").as_deref(), Some("color: #333333"));
        assert!(dom::get_attr(&span, "style").is_none());
    }

    #[test]
    fn test_keyword_override_is_kept() {
        let root = article(r#"<a href="x" class="no-underline">link</a>"#);
        flatten_inline(&root);
        let a = dom::element_children(&root).next().unwrap();
        assert!(dom::get_attr(&a, "style")
            .unwrap()
            .contains("text-decoration: none"));
    }

    #[test]
    fn test_utility_lengths_become_pixels() {
        let root = article(r#"<h1 class="text-4xl mt-8 border-b-2 border-gray-300">T</h1>"#);
        flatten_inline(&root);
        let h1 = dom::element_children(&root).next().unwrap();
        let style = dom::get_attr(&h1, "style").unwrap();
        assert!(style.contains("font-size: 36px"));
        assert!(style.contains("margin-top: 32px"));
        assert!(style.contains("border-bottom: 2px solid rgb("));
    }

    #[test]
    fn test_malformed_style_is_skipped() {
        let root = article(r#"<p style="color red" class="mb-4">x</p><p class="italic">y</p>"#);
        let outcome = flatten_inline(&root);
        assert_eq!(outcome.skipped, 1);

        let mut paragraphs = dom::element_children(&root);
        let broken = paragraphs.next().unwrap();
        let fine = paragraphs.next().unwrap();
        assert_eq!(dom::get_attr(&broken, "class").as_deref(), Some("mb-4"));
        assert!(dom::get_attr(&fine, "style").unwrap().contains("italic"));
    }

    #[test]
    fn test_stylesheet_mode_one_rule_per_signature() {
        let root = article(
            r#"<p class="mb-4 italic">a</p><p class="italic mb-4">b</p><code class="bg-gray-100">c</code>"#,
        );
        let before = root.to_string();
        let outcome = flatten(
            &root,
            &ComputedStyle::default(),
            &StyleResolver::new(),
            FlattenMode::Stylesheet,
        );

        assert_eq!(root.to_string(), before);
        assert_eq!(outcome.stylesheet.matches("p.italic.mb-4 {").count(), 1);
        assert!(outcome.stylesheet.contains("code.bg-gray-100 {"));
    }

    #[test]
    fn test_stylesheet_rule_ignores_inline_style() {
        let root = article(r#"<p class="italic" style="color: #ff0000">a</p><p class="italic">b</p>"#);
        let outcome = flatten(
            &root,
            &ComputedStyle::default(),
            &StyleResolver::new(),
            FlattenMode::Stylesheet,
        );

        assert!(outcome.stylesheet.contains("p.italic {"));
        assert!(!outcome.stylesheet.contains("#ff0000"));
        let first = dom::element_children(&root).next().unwrap();
        assert_eq!(dom::get_attr(&first, "style").as_deref(), Some("color: #ff0000"));
    }

    #[test]
    fn test_escape_class() {
        assert_eq!(escape_class("py-0.5"), "py-0\\.5");
        assert_eq!(escape_class("bg-blue-900/20"), "bg-blue-900\\/20");
        assert_eq!(escape_class("2xl"), "\\32 xl");
    }
}
