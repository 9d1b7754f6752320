//! Theme Normalizer
//!
//! Produces the export clone of the target subtree with every
//! theme-dependent color replaced by a fixed light value. Computed styles
//! are read from the live elements (which the caller has forced light
//! through `ThemeGuard`); replacements are written onto the clone.

use kuchiki::NodeRef;
use log::{debug, warn};

use crate::dom::{self, LiveDocument};
use crate::style::utilities::is_dark_variant;
use crate::style::{set_inline_property, ComputedStyle, StyleResolver};
use crate::theme::{ExportPalette, ThemeState};

/// Classes marking rendered diagram surfaces.
const DIAGRAM_CLASSES: &[&str] = &["mermaid-rendered", "mermaid-container"];

#[derive(Debug, Default)]
struct Counts {
    backgrounds: usize,
    colors: usize,
    tokens: usize,
}

/// Deep-clone `target` and force its styling light.
///
/// The live subtree is only read.
pub fn normalize(
    live: &LiveDocument,
    target: &NodeRef,
    resolver: &StyleResolver,
    palette: &ExportPalette,
) -> NodeRef {
    if ThemeState::capture(live).is_dark() {
        warn!("Normalizing while the live document is still dark; colors may be off");
    }

    let clone = dom::deep_clone(target);
    let context = resolver.context_style(target);
    let mut counts = Counts::default();
    walk(target, &clone, &context, resolver, palette, &mut counts);

    let bg = palette.background.to_hex();
    set_inline_property(&clone, "background-color", &bg);

    debug!(
        "Normalized export clone: {} backgrounds, {} text colors, {} dark tokens",
        counts.backgrounds, counts.colors, counts.tokens
    );
    clone
}

fn walk(
    live: &NodeRef,
    copy: &NodeRef,
    parent: &ComputedStyle,
    resolver: &StyleResolver,
    palette: &ExportPalette,
    counts: &mut Counts,
) {
    if live.as_element().is_none() {
        return;
    }

    let style = match resolver.computed_style_with_parent(live, parent) {
        Ok(style) => {
            rewrite(live, copy, &style, palette, counts);
            style
        }
        Err(e) => {
            warn!("Skipping theme normalization of element: {}", e);
            parent.inherited()
        }
    };
    strip_dark_tokens(copy, counts);

    for (live_child, copy_child) in live.children().zip(copy.children()) {
        walk(&live_child, &copy_child, &style, resolver, palette, counts);
    }
}

fn rewrite(
    live: &NodeRef,
    copy: &NodeRef,
    style: &ComputedStyle,
    palette: &ExportPalette,
    counts: &mut Counts,
) {
    let background = palette.background.to_hex();
    let text = palette.text.to_hex();

    if style
        .background()
        .is_some_and(|bg| palette.is_dark_background(bg))
    {
        set_inline_property(copy, "background-color", &background);
        counts.backgrounds += 1;
    }
    if style.color().is_some_and(|c| palette.is_light_text(c)) {
        set_inline_property(copy, "color", &text);
        counts.colors += 1;
    }

    if dom::is_tag(live, &["code", "pre"]) {
        set_inline_property(copy, "background-color", &palette.code_background.to_hex());
        set_inline_property(copy, "color", &text);
    }
    if DIAGRAM_CLASSES.iter().any(|class| dom::has_class(live, class)) {
        set_inline_property(copy, "background-color", &background);
    }
}

fn strip_dark_tokens(copy: &NodeRef, counts: &mut Counts) {
    let tokens = dom::class_tokens(copy);
    let kept: Vec<&String> = tokens.iter().filter(|t| !is_dark_variant(t)).collect();
    if kept.len() != tokens.len() {
        counts.tokens += tokens.len() - kept.len();
        dom::set_class_tokens(copy, &kept);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
