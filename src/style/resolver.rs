//! Style Resolver
//!
//! Computes `ComputedStyle`s by cascading, lowest priority first:
//! the parent's inherited values, user-agent defaults for the tag,
//! presentational attributes (`width`, `align`, `bgcolor`), utility
//! classes and the inline `style` attribute.
//!
//! Ancestor styles are computed leniently (malformed inline declarations
//! are skipped). The element whose style was asked for is strict: a
//! malformed `style` attribute on it is reported as `Error::Style`.

use kuchiki::NodeRef;

use super::utilities::utility_declarations;
use super::{
    format_px, parse_declarations, parse_declarations_lenient, BorderSide, ComputedStyle,
    Property, Side,
};
use crate::dom;
use crate::error::{Error, Result};
use crate::theme::Rgb;

/// Font size of the root element in pixels.
pub const ROOT_FONT_SIZE: f32 = 16.0;

const BORDER_STYLES: &[&str] = &[
    "none", "hidden", "dotted", "dashed", "solid", "double", "groove", "ridge", "inset", "outset",
];

const LIST_STYLE_TYPES: &[&str] = &[
    "disc",
    "circle",
    "square",
    "decimal",
    "decimal-leading-zero",
    "lower-alpha",
    "upper-alpha",
    "lower-roman",
    "upper-roman",
    "none",
];

const MARGINS: [&str; 4] = ["margin-top", "margin-right", "margin-bottom", "margin-left"];
const PADDINGS: [&str; 4] = [
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
];
const BORDER_WIDTHS: [&str; 4] = [
    "border-top-width",
    "border-right-width",
    "border-bottom-width",
    "border-left-width",
];
const BORDER_STYLE_NAMES: [&str; 4] = [
    "border-top-style",
    "border-right-style",
    "border-bottom-style",
    "border-left-style",
];
const BORDER_COLORS: [&str; 4] = [
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
];

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Computes styles for elements of a kuchiki tree.
#[derive(Debug, Clone)]
pub struct StyleResolver {
    root_font_size: f32,
}

impl Default for StyleResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleResolver {
    pub fn new() -> Self {
        Self {
            root_font_size: ROOT_FONT_SIZE,
        }
    }

    /// Computed style of `node`, cascading through its ancestors.
    ///
    /// Text and other non-element nodes take their parent's style.
    pub fn computed_style(&self, node: &NodeRef) -> Result<ComputedStyle> {
        let parent = self.context_style(node);
        self.computed_style_with_parent(node, &parent)
    }

    /// Computed style of `node` given an already-computed parent style.
    pub fn computed_style_with_parent(
        &self,
        node: &NodeRef,
        parent: &ComputedStyle,
    ) -> Result<ComputedStyle> {
        self.cascade(node, parent, true)
    }

    /// Style of the element `node` lives in (its parent element chain).
    pub fn context_style(&self, node: &NodeRef) -> ComputedStyle {
        match node.parent() {
            Some(parent) => self.lenient_chain(&parent),
            None => ComputedStyle::default(),
        }
    }

    /// What an element with this tag looks like with no classes or inline
    /// style: inherited values plus user-agent defaults.
    pub fn baseline(&self, tag: &str, parent: &ComputedStyle) -> ComputedStyle {
        let declarations = user_agent_declarations(tag)
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        self.compute(declarations, parent)
    }

    fn lenient_chain(&self, node: &NodeRef) -> ComputedStyle {
        let mut chain: Vec<NodeRef> = node
            .inclusive_ancestors()
            .filter(|n| n.as_element().is_some())
            .collect();
        chain.reverse();
        chain.iter().fold(ComputedStyle::default(), |parent, element| {
            self.cascade(element, &parent, false)
                .unwrap_or_else(|_| parent.inherited())
        })
    }

    fn cascade(&self, node: &NodeRef, parent: &ComputedStyle, strict: bool) -> Result<ComputedStyle> {
        let tag = match dom::tag_name(node) {
            Some(tag) => tag.to_string(),
            None => return Ok(parent.clone()),
        };

        let mut declarations: Vec<(String, String)> = user_agent_declarations(&tag)
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        declarations.extend(presentational_hints(node, &tag));

        let dark = in_dark_context(node);
        for token in dom::class_tokens(node) {
            if let Some(decls) = utility_declarations(&token, dark) {
                declarations.extend(decls.into_iter().map(|(n, v)| (n.to_string(), v)));
            }
        }

        if let Some(inline) = dom::get_attr(node, "style") {
            let parsed = match parse_declarations(&inline) {
                Ok(parsed) => parsed,
                Err(e) if strict => {
                    return Err(Error::Style {
                        element: tag,
                        message: e.to_string(),
                    })
                }
                Err(_) => parse_declarations_lenient(&inline),
            };
            declarations.extend(parsed.into_iter().map(|d| (d.name, d.value)));
        }

        Ok(self.compute(declarations, parent))
    }

    fn compute(&self, declarations: Vec<(String, String)>, parent: &ComputedStyle) -> ComputedStyle {
        let longhands: Vec<(&'static str, String)> = declarations
            .iter()
            .flat_map(|(name, value)| expand(name, value))
            .collect();

        let mut style = parent.inherited();
        // Lengths resolve against the element's own font size and colors
        // against its own `color`, so those go first.
        for first in ["font-size", "color"] {
            for (name, value) in longhands.iter().filter(|(n, _)| *n == first) {
                self.apply(&mut style, name, value, parent);
            }
        }
        for (name, value) in longhands
            .iter()
            .filter(|(n, _)| *n != "font-size" && *n != "color")
        {
            self.apply(&mut style, name, value, parent);
        }
        style
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Value resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn apply(&self, style: &mut ComputedStyle, name: &str, value: &str, parent: &ComputedStyle) {
        let value = value.trim();
        let lower = value.to_ascii_lowercase();

        if let Some((side, part)) = border_longhand(name) {
            self.apply_border(style, side, part, &lower, parent);
            return;
        }
        let property = match Property::from_name(name) {
            Some(property) => property,
            None => return,
        };

        match lower.as_str() {
            "inherit" => return style.set(property, parent.get(property).into_owned()),
            "initial" => return style.set(property, property.initial_value()),
            "unset" => {
                let value = if property.is_inherited() {
                    parent.get(property).into_owned()
                } else {
                    property.initial_value().to_string()
                };
                return style.set(property, value);
            }
            _ => {}
        }

        let font_size = style.font_size_px();
        let resolved = match property {
            Property::Color => {
                if lower == "currentcolor" {
                    Some(parent.get(Property::Color).into_owned())
                } else {
                    valid_color(&lower)
                }
            }
            Property::BackgroundColor => {
                if lower == "currentcolor" {
                    Some(style.get(Property::Color).into_owned())
                } else {
                    valid_color(&lower)
                }
            }
            Property::FontSize => self.font_size(&lower, parent.font_size_px()).map(format_px),
            Property::FontWeight => font_weight(&lower, parent),
            Property::LineHeight => self.line_height(&lower, font_size),
            Property::MarginTop
            | Property::MarginRight
            | Property::MarginBottom
            | Property::MarginLeft
            | Property::Width
            | Property::Height => self.length_or_percent(&lower, font_size, true),
            Property::PaddingTop
            | Property::PaddingRight
            | Property::PaddingBottom
            | Property::PaddingLeft => self
                .length_or_percent(&lower, font_size, false)
                .filter(|v| !v.starts_with('-')),
            Property::FontFamily => Some(value.to_string()),
            Property::TextDecoration => Some(text_decoration(&lower)),
            Property::FontStyle
            | Property::TextAlign
            | Property::Display
            | Property::ListStyleType => Some(lower),
            // Border shorthands were expanded into longhands
            Property::BorderTop
            | Property::BorderRight
            | Property::BorderBottom
            | Property::BorderLeft => None,
        };

        if let Some(resolved) = resolved {
            style.set(property, resolved);
        }
    }

    fn apply_border(
        &self,
        style: &mut ComputedStyle,
        side: Side,
        part: BorderPart,
        value: &str,
        parent: &ComputedStyle,
    ) {
        let default = BorderSide::default();
        let source = match value {
            "inherit" => Some(parent.border(side).clone()),
            "initial" | "unset" => Some(default),
            _ => None,
        };
        if let Some(source) = source {
            let target = style.border_mut(side);
            match part {
                BorderPart::Width => target.width = source.width,
                BorderPart::Style => target.style = source.style,
                BorderPart::Color => target.color = source.color,
            }
            return;
        }

        let font_size = style.font_size_px();
        match part {
            BorderPart::Width => {
                if let Some(width) = border_width_px(value, font_size, self.root_font_size) {
                    style.border_mut(side).width = width;
                }
            }
            BorderPart::Style => {
                if BORDER_STYLES.contains(&value) {
                    style.border_mut(side).style = value.to_string();
                }
            }
            BorderPart::Color => {
                if value == "currentcolor" {
                    style.border_mut(side).color = None;
                } else if let Some(color) = valid_color(value) {
                    style.border_mut(side).color = Some(color);
                }
            }
        }
    }

    fn font_size(&self, value: &str, parent_size: f32) -> Option<f32> {
        let keyword = match value {
            "xx-small" => Some(9.0),
            "x-small" => Some(10.0),
            "small" => Some(13.0),
            "medium" => Some(16.0),
            "large" => Some(18.0),
            "x-large" => Some(24.0),
            "xx-large" => Some(32.0),
            "smaller" => Some(parent_size / 1.2),
            "larger" => Some(parent_size * 1.2),
            _ => None,
        };
        if keyword.is_some() {
            return keyword;
        }
        if let Some(percent) = parse_percent(value) {
            return Some(parent_size * percent / 100.0);
        }
        length_px(value, parent_size, self.root_font_size).filter(|px| *px >= 0.0)
    }

    fn line_height(&self, value: &str, font_size: f32) -> Option<String> {
        if value == "normal" {
            return Some(value.to_string());
        }
        if let Ok(factor) = value.parse::<f32>() {
            return (factor >= 0.0).then(|| value.to_string());
        }
        if let Some(percent) = parse_percent(value) {
            return Some(format_px(font_size * percent / 100.0));
        }
        length_px(value, font_size, self.root_font_size).map(format_px)
    }

    fn length_or_percent(&self, value: &str, font_size: f32, allow_auto: bool) -> Option<String> {
        if value == "auto" {
            return allow_auto.then(|| value.to_string());
        }
        if parse_percent(value).is_some() {
            return Some(value.to_string());
        }
        length_px(value, font_size, self.root_font_size).map(format_px)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cascade sources
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a `dark:` variant is active for this element.
pub fn in_dark_context(node: &NodeRef) -> bool {
    node.inclusive_ancestors().any(|n| {
        dom::has_class(&n, "dark") || dom::get_attr(&n, "data-theme").as_deref() == Some("dark")
    })
}

fn user_agent_declarations(tag: &str) -> &'static [(&'static str, &'static str)] {
    match tag {
        "html" | "body" | "div" | "article" | "section" | "main" | "header" | "footer" | "nav"
        | "aside" | "figure" | "figcaption" | "details" | "summary" | "dl" | "dt" | "address"
        | "form" | "fieldset" => &[("display", "block")],
        "dd" => &[("display", "block"), ("margin-left", "40px")],
        "p" => &[("display", "block"), ("margin", "1em 0")],
        "h1" => &[
            ("display", "block"),
            ("font-size", "2em"),
            ("font-weight", "bold"),
            ("margin", "0.67em 0"),
        ],
        "h2" => &[
            ("display", "block"),
            ("font-size", "1.5em"),
            ("font-weight", "bold"),
            ("margin", "0.83em 0"),
        ],
        "h3" => &[
            ("display", "block"),
            ("font-size", "1.17em"),
            ("font-weight", "bold"),
            ("margin", "1em 0"),
        ],
        "h4" => &[
            ("display", "block"),
            ("font-weight", "bold"),
            ("margin", "1.33em 0"),
        ],
        "h5" => &[
            ("display", "block"),
            ("font-size", "0.83em"),
            ("font-weight", "bold"),
            ("margin", "1.67em 0"),
        ],
        "h6" => &[
            ("display", "block"),
            ("font-size", "0.67em"),
            ("font-weight", "bold"),
            ("margin", "2.33em 0"),
        ],
        "blockquote" => &[("display", "block"), ("margin", "1em 40px")],
        "pre" => &[
            ("display", "block"),
            ("font-family", "monospace"),
            ("margin", "1em 0"),
        ],
        "ul" | "menu" => &[
            ("display", "block"),
            ("list-style-type", "disc"),
            ("margin", "1em 0"),
            ("padding-left", "40px"),
        ],
        "ol" => &[
            ("display", "block"),
            ("list-style-type", "decimal"),
            ("margin", "1em 0"),
            ("padding-left", "40px"),
        ],
        "li" => &[("display", "list-item")],
        "hr" => &[
            ("display", "block"),
            ("margin", "0.5em 0"),
            ("border-top", "1px solid #808080"),
        ],
        "table" => &[("display", "table")],
        "thead" => &[("display", "table-header-group")],
        "tbody" => &[("display", "table-row-group")],
        "tfoot" => &[("display", "table-footer-group")],
        "tr" => &[("display", "table-row")],
        "td" => &[("display", "table-cell"), ("padding", "1px")],
        "th" => &[
            ("display", "table-cell"),
            ("padding", "1px"),
            ("font-weight", "bold"),
            ("text-align", "center"),
        ],
        "strong" | "b" => &[("font-weight", "bold")],
        "em" | "i" | "cite" | "var" | "dfn" => &[("font-style", "italic")],
        "code" | "kbd" | "samp" | "tt" => &[("font-family", "monospace")],
        "a" => &[("color", "#0000ee"), ("text-decoration", "underline")],
        "u" | "ins" => &[("text-decoration", "underline")],
        "s" | "del" | "strike" => &[("text-decoration", "line-through")],
        "small" => &[("font-size", "smaller")],
        "mark" => &[("background-color", "#ffff00")],
        "img" => &[("display", "inline-block")],
        "head" | "script" | "style" | "template" | "title" | "meta" | "link" | "noscript" => {
            &[("display", "none")]
        }
        _ => &[],
    }
}

fn presentational_hints(node: &NodeRef, tag: &str) -> Vec<(String, String)> {
    let mut hints = Vec::new();
    if matches!(tag, "img" | "table" | "td" | "th" | "col") {
        for name in ["width", "height"] {
            if let Some(value) = dom::get_attr(node, name) {
                let value = value.trim();
                if value.parse::<f32>().is_ok() {
                    hints.push((name.to_string(), format!("{}px", value)));
                } else if parse_percent(value).is_some() {
                    hints.push((name.to_string(), value.to_string()));
                }
            }
        }
    }
    if matches!(tag, "td" | "th" | "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
        if let Some(align) = dom::get_attr(node, "align") {
            hints.push(("text-align".to_string(), align.trim().to_ascii_lowercase()));
        }
    }
    if matches!(tag, "table" | "tr" | "td" | "th" | "body") {
        if let Some(color) = dom::get_attr(node, "bgcolor") {
            hints.push(("background-color".to_string(), color.trim().to_string()));
        }
    }
    hints
}

// ─────────────────────────────────────────────────────────────────────────────
// Shorthand expansion
// ─────────────────────────────────────────────────────────────────────────────

fn is_global_keyword(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "inherit" | "initial" | "unset"
    )
}

/// Expand a declaration into longhands the resolver understands.
fn expand(name: &str, value: &str) -> Vec<(&'static str, String)> {
    let value = value.trim();
    let per_side = |names: [&'static str; 4]| -> Vec<(&'static str, String)> {
        if is_global_keyword(value) {
            return names.iter().map(|n| (*n, value.to_string())).collect();
        }
        match box_values(value) {
            Some(values) => names.into_iter().zip(values).collect(),
            None => Vec::new(),
        }
    };

    match name {
        "margin" => per_side(MARGINS),
        "padding" => per_side(PADDINGS),
        "border-width" => per_side(BORDER_WIDTHS),
        "border-style" => per_side(BORDER_STYLE_NAMES),
        "border-color" => per_side(BORDER_COLORS),
        "border" => Side::ALL
            .iter()
            .flat_map(|side| border_side_longhands(*side, value))
            .collect(),
        "border-top" => border_side_longhands(Side::Top, value),
        "border-right" => border_side_longhands(Side::Right, value),
        "border-bottom" => border_side_longhands(Side::Bottom, value),
        "border-left" => border_side_longhands(Side::Left, value),
        "background" => background_color_of(value)
            .map(|color| vec![("background-color", color)])
            .unwrap_or_default(),
        "list-style" => split_value_tokens(value)
            .into_iter()
            .find(|t| LIST_STYLE_TYPES.contains(&t.to_ascii_lowercase().as_str()))
            .map(|t| vec![("list-style-type", t.to_ascii_lowercase())])
            .unwrap_or_default(),
        "text-decoration-line" => vec![("text-decoration", value.to_string())],
        other => {
            if let Some(longhand) = static_name(other) {
                return vec![(longhand, value.to_string())];
            }
            match Property::from_name(other) {
                Some(property) => vec![(property.name(), value.to_string())],
                None => Vec::new(),
            }
        }
    }
}

fn static_name(name: &str) -> Option<&'static str> {
    BORDER_WIDTHS
        .iter()
        .chain(BORDER_STYLE_NAMES.iter())
        .chain(BORDER_COLORS.iter())
        .find(|n| **n == name)
        .copied()
}

fn side_index(side: Side) -> usize {
    Side::ALL.iter().position(|s| *s == side).unwrap_or(0)
}

fn border_side_longhands(side: Side, value: &str) -> Vec<(&'static str, String)> {
    let i = side_index(side);
    if is_global_keyword(value) {
        return vec![
            (BORDER_WIDTHS[i], value.to_string()),
            (BORDER_STYLE_NAMES[i], value.to_string()),
            (BORDER_COLORS[i], value.to_string()),
        ];
    }
    let parsed = parse_border_shorthand(value);
    let width = if parsed.style == "none" && parsed.width == 0.0 {
        "0px".to_string()
    } else {
        format_px(parsed.width)
    };
    vec![
        (BORDER_WIDTHS[i], width),
        (BORDER_STYLE_NAMES[i], parsed.style),
        (
            BORDER_COLORS[i],
            parsed.color.unwrap_or_else(|| "currentcolor".to_string()),
        ),
    ]
}

/// Parse `<width> <style> <color>` in any order. Missing parts take their
/// CSS initial values (`medium`, `none`, `currentcolor`).
pub(crate) fn parse_border_shorthand(value: &str) -> BorderSide {
    let mut width = None;
    let mut style = None;
    let mut color = None;
    for token in split_value_tokens(value) {
        let lower = token.to_ascii_lowercase();
        if BORDER_STYLES.contains(&lower.as_str()) {
            style = Some(lower);
        } else if let Some(px) = border_width_px(&lower, ROOT_FONT_SIZE, ROOT_FONT_SIZE) {
            width = Some(px);
        } else if lower == "currentcolor" {
            color = None;
        } else if let Some(valid) = valid_color(&lower) {
            color = Some(valid);
        }
    }
    let style = style.unwrap_or_else(|| "none".to_string());
    let width = match width {
        Some(width) => width,
        None if style == "none" => 0.0,
        None => 3.0,
    };
    BorderSide {
        width,
        style,
        color,
    }
}

/// Resolve 1-4 box values to top/right/bottom/left.
fn box_values(value: &str) -> Option<[String; 4]> {
    let tokens: Vec<String> = split_value_tokens(value)
        .into_iter()
        .map(str::to_string)
        .collect();
    match tokens.as_slice() {
        [all] => Some([all.clone(), all.clone(), all.clone(), all.clone()]),
        [vertical, horizontal] => Some([
            vertical.clone(),
            horizontal.clone(),
            vertical.clone(),
            horizontal.clone(),
        ]),
        [top, horizontal, bottom] => Some([
            top.clone(),
            horizontal.clone(),
            bottom.clone(),
            horizontal.clone(),
        ]),
        [top, right, bottom, left] => {
            Some([top.clone(), right.clone(), bottom.clone(), left.clone()])
        }
        _ => None,
    }
}

fn background_color_of(value: &str) -> Option<String> {
    let lower = value.trim().to_ascii_lowercase();
    if is_global_keyword(&lower) {
        return Some(lower);
    }
    if let Some(color) = valid_color(&lower) {
        return Some(color);
    }
    split_value_tokens(&lower)
        .into_iter()
        .find_map(valid_color)
}

/// Whitespace-separated tokens, keeping parenthesized groups together.
fn split_value_tokens(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    for (i, c) in value.char_indices() {
        match c {
            '(' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&value[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        tokens.push(&value[s..]);
    }
    tokens
}

// ─────────────────────────────────────────────────────────────────────────────
// Value helpers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BorderPart {
    Width,
    Style,
    Color,
}

fn border_longhand(name: &str) -> Option<(Side, BorderPart)> {
    let rest = name.strip_prefix("border-")?;
    let (side, part) = rest.split_once('-')?;
    let side = match side {
        "top" => Side::Top,
        "right" => Side::Right,
        "bottom" => Side::Bottom,
        "left" => Side::Left,
        _ => return None,
    };
    let part = match part {
        "width" => BorderPart::Width,
        "style" => BorderPart::Style,
        "color" => BorderPart::Color,
        _ => return None,
    };
    Some((side, part))
}

/// A color value worth keeping: parseable, or a color function that only a
/// browser could resolve.
fn valid_color(value: &str) -> Option<String> {
    if Rgb::parse(value).is_some()
        || value.starts_with("color(")
        || value.starts_with("color-mix(")
    {
        Some(value.to_string())
    } else {
        None
    }
}

fn font_weight(value: &str, parent: &ComputedStyle) -> Option<String> {
    let parent_weight = parent
        .get(Property::FontWeight)
        .parse::<u16>()
        .unwrap_or(400);
    let weight = match value {
        "normal" => 400,
        "bold" => 700,
        "bolder" => match parent_weight {
            0..=349 => 400,
            350..=549 => 700,
            _ => 900,
        },
        "lighter" => match parent_weight {
            0..=549 => 100,
            550..=749 => 400,
            _ => 700,
        },
        numeric => match numeric.parse::<u16>() {
            Ok(w) if (1..=1000).contains(&w) => w,
            _ => return None,
        },
    };
    Some(weight.to_string())
}

fn text_decoration(value: &str) -> String {
    let lines: Vec<&str> = ["underline", "line-through", "overline"]
        .into_iter()
        .filter(|line| value.contains(line))
        .collect();
    if lines.is_empty() {
        String::from("none")
    } else {
        lines.join(" ")
    }
}

fn parse_percent(value: &str) -> Option<f32> {
    value.strip_suffix('%')?.trim().parse::<f32>().ok()
}

/// Absolute pixels for a CSS length.
pub fn length_px(value: &str, font_size: f32, root_font_size: f32) -> Option<f32> {
    let value = value.trim();
    if value == "0" {
        return Some(0.0);
    }
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let number: f32 = value[..split].parse().ok()?;
    let px = match &value[split..] {
        "px" => number,
        "em" => number * font_size,
        "rem" => number * root_font_size,
        "pt" => number * 4.0 / 3.0,
        "pc" => number * 16.0,
        "in" => number * 96.0,
        "cm" => number * 96.0 / 2.54,
        "mm" => number * 96.0 / 25.4,
        "ex" | "ch" => number * font_size * 0.5,
        _ => return None,
    };
    Some(px)
}

fn border_width_px(value: &str, font_size: f32, root_font_size: f32) -> Option<f32> {
    match value {
        "thin" => Some(1.0),
        "medium" => Some(3.0),
        "thick" => Some(5.0),
        _ => length_px(value, font_size, root_font_size).filter(|w| *w >= 0.0),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::LiveDocument;

    fn style_of(html: &str, id: &str) -> ComputedStyle {
        let doc = LiveDocument::parse(html);
        let node = doc.element_by_id(id).unwrap();
        StyleResolver::new().computed_style(&node).unwrap()
    }

    #[test]
    fn test_user_agent_heading() {
        let style = style_of(r#"<h1 id="h">Title</h1>"#, "h");
        assert_eq!(style.get(Property::FontSize), "32px");
        assert_eq!(style.get(Property::FontWeight), "700");
        assert_eq!(style.get(Property::MarginTop), "21.44px");
        assert_eq!(style.display(), "block");
    }

    #[test]
    fn test_inheritance_and_em_lengths() {
        let style = style_of(
            r#"<div style="font-size: 20px; color: #112233"><p id="p" style="margin-top: 2em">x</p></div>"#,
            "p",
        );
        assert_eq!(style.get(Property::Color), "#112233");
        assert_eq!(style.get(Property::FontSize), "20px");
        assert_eq!(style.get(Property::MarginTop), "40px");
        assert_eq!(style.get(Property::BackgroundColor), "transparent");
    }

    #[test]
    fn test_utility_classes_cascade() {
        let style = style_of(
            r#"<h1 id="h" class="text-4xl font-bold mt-8 mb-6 pb-3 border-b-2 border-gray-300">T</h1>"#,
            "h",
        );
        assert_eq!(style.get(Property::FontSize), "36px");
        assert_eq!(style.get(Property::MarginTop), "32px");
        assert_eq!(style.get(Property::PaddingBottom), "12px");
        assert_eq!(style.border(Side::Bottom).width, 2.0);
        assert_eq!(
            style.border(Side::Bottom).color.as_deref(),
            Some("oklch(87.2% 0.01 258.338)")
        );
        assert!(!style.border(Side::Top).is_visible());
    }

    #[test]
    fn test_dark_variants_follow_context() {
        let html = r#"<html class="dark"><body>
            <p id="p" class="text-gray-700 dark:text-gray-300">x</p></body></html>"#;
        assert_eq!(
            style_of(html, "p").get(Property::Color),
            "oklch(87.2% 0.01 258.338)"
        );

        let light = html.replace(r#"class="dark""#, "");
        assert_eq!(
            style_of(&light, "p").get(Property::Color),
            "oklch(37.3% 0.034 259.733)"
        );
    }

    #[test]
    fn test_inline_beats_classes() {
        let style = style_of(
            r#"<p id="p" class="bg-gray-100" style="background: #ff0000 url(x.png)">x</p>"#,
            "p",
        );
        assert_eq!(style.get(Property::BackgroundColor), "#ff0000");
    }

    #[test]
    fn test_shorthands() {
        let style = style_of(
            r#"<div id="d" style="margin: 1px 2px 3px; padding: 4px 5px; border: 2px dashed red">x</div>"#,
            "d",
        );
        assert_eq!(style.get(Property::MarginLeft), "2px");
        assert_eq!(style.get(Property::MarginBottom), "3px");
        assert_eq!(style.get(Property::PaddingRight), "5px");
        assert_eq!(style.get(Property::BorderLeft), "2px dashed red");
    }

    #[test]
    fn test_current_color_and_keywords() {
        let style = style_of(
            r#"<div style="color: blue"><span id="s" style="color: red; background-color: currentColor; font-weight: inherit">x</span></div>"#,
            "s",
        );
        assert_eq!(style.get(Property::BackgroundColor), "red");
        assert_eq!(style.get(Property::FontWeight), "400");
    }

    #[test]
    fn test_malformed_inline_style_is_an_error() {
        let doc = LiveDocument::parse(r#"<p id="p" style="color red">x</p>"#);
        let node = doc.element_by_id("p").unwrap();
        let err = StyleResolver::new().computed_style(&node).unwrap_err();
        assert!(matches!(err, Error::Style { ref element, .. } if element == "p"));
    }

    #[test]
    fn test_malformed_ancestor_style_is_skipped() {
        let style = style_of(
            r#"<div style="color red; font-size: 20px"><span id="s">x</span></div>"#,
            "s",
        );
        assert_eq!(style.font_size_px(), 20.0);
    }

    #[test]
    fn test_text_node_takes_parent_style() {
        let doc = LiveDocument::parse(r#"<p id="p" style="color: #123456">x</p>"#);
        let text = doc.element_by_id("p").unwrap().first_child().unwrap();
        let style = StyleResolver::new().computed_style(&text).unwrap();
        assert_eq!(style.get(Property::Color), "#123456");
    }

    #[test]
    fn test_presentational_width() {
        let style = style_of(r#"<img id="i" src="a.png" width="120">"#, "i");
        assert_eq!(style.px(Property::Width), Some(120.0));
    }

    #[test]
    fn test_baseline_matches_plain_element() {
        let resolver = StyleResolver::new();
        let parent = ComputedStyle::default();
        let baseline = resolver.baseline("h2", &parent);
        let plain = style_of(r#"<h2 id="h">x</h2>"#, "h");
        assert_eq!(baseline, plain);
    }

    #[test]
    fn test_length_px_units() {
        assert_eq!(length_px("12pt", 16.0, 16.0), Some(16.0));
        assert_eq!(length_px("1.5em", 20.0, 16.0), Some(30.0));
        assert_eq!(length_px("2rem", 20.0, 16.0), Some(32.0));
        assert_eq!(length_px("12", 16.0, 16.0), None);
        assert_eq!(length_px("calc(1px + 2px)", 16.0, 16.0), None);
    }

    #[test]
    fn test_parse_border_shorthand() {
        let border = parse_border_shorthand("solid 1px oklch(87.2% 0.01 258.338)");
        assert_eq!(border.width, 1.0);
        assert_eq!(border.style, "solid");
        assert_eq!(border.color.as_deref(), Some("oklch(87.2% 0.01 258.338)"));

        let none = parse_border_shorthand("none");
        assert!(!none.is_visible());
    }
}
