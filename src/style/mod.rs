//! Computed Style Engine
//!
//! A small cascade that answers "what does this element look like" for the
//! fixed set of presentation properties the exporters care about. Sources,
//! lowest priority first: user-agent defaults per tag, presentational
//! attributes, utility classes (with `dark:` variants honored only inside a
//! dark context), and the inline `style` attribute.
//!
//! - `resolver.rs` - `StyleResolver`, cascade and value resolution
//! - `utilities.rs` - the utility-class vocabulary the preview is styled with

pub mod resolver;
pub mod utilities;

pub use resolver::StyleResolver;

use crate::dom;
use kuchiki::NodeRef;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::theme::Rgb;

// ─────────────────────────────────────────────────────────────────────────────
// Property
// ─────────────────────────────────────────────────────────────────────────────

/// The allow-list of properties that travel into exported content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    Color,
    BackgroundColor,
    FontFamily,
    FontSize,
    FontWeight,
    FontStyle,
    LineHeight,
    TextAlign,
    TextDecoration,
    MarginTop,
    MarginRight,
    MarginBottom,
    MarginLeft,
    PaddingTop,
    PaddingRight,
    PaddingBottom,
    PaddingLeft,
    BorderTop,
    BorderRight,
    BorderBottom,
    BorderLeft,
    Width,
    Height,
    Display,
    ListStyleType,
}

impl Property {
    pub const ALL: [Property; 25] = [
        Property::Color,
        Property::BackgroundColor,
        Property::FontFamily,
        Property::FontSize,
        Property::FontWeight,
        Property::FontStyle,
        Property::LineHeight,
        Property::TextAlign,
        Property::TextDecoration,
        Property::MarginTop,
        Property::MarginRight,
        Property::MarginBottom,
        Property::MarginLeft,
        Property::PaddingTop,
        Property::PaddingRight,
        Property::PaddingBottom,
        Property::PaddingLeft,
        Property::BorderTop,
        Property::BorderRight,
        Property::BorderBottom,
        Property::BorderLeft,
        Property::Width,
        Property::Height,
        Property::Display,
        Property::ListStyleType,
    ];

    /// CSS property name.
    pub fn name(&self) -> &'static str {
        match self {
            Property::Color => "color",
            Property::BackgroundColor => "background-color",
            Property::FontFamily => "font-family",
            Property::FontSize => "font-size",
            Property::FontWeight => "font-weight",
            Property::FontStyle => "font-style",
            Property::LineHeight => "line-height",
            Property::TextAlign => "text-align",
            Property::TextDecoration => "text-decoration",
            Property::MarginTop => "margin-top",
            Property::MarginRight => "margin-right",
            Property::MarginBottom => "margin-bottom",
            Property::MarginLeft => "margin-left",
            Property::PaddingTop => "padding-top",
            Property::PaddingRight => "padding-right",
            Property::PaddingBottom => "padding-bottom",
            Property::PaddingLeft => "padding-left",
            Property::BorderTop => "border-top",
            Property::BorderRight => "border-right",
            Property::BorderBottom => "border-bottom",
            Property::BorderLeft => "border-left",
            Property::Width => "width",
            Property::Height => "height",
            Property::Display => "display",
            Property::ListStyleType => "list-style-type",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Whether children take the parent's computed value by default.
    pub fn is_inherited(&self) -> bool {
        matches!(
            self,
            Property::Color
                | Property::FontFamily
                | Property::FontSize
                | Property::FontWeight
                | Property::FontStyle
                | Property::LineHeight
                | Property::TextAlign
                | Property::ListStyleType
        )
    }

    pub fn initial_value(&self) -> &'static str {
        match self {
            Property::Color => "rgb(0, 0, 0)",
            Property::BackgroundColor => "transparent",
            Property::FontFamily => "sans-serif",
            Property::FontSize => "16px",
            Property::FontWeight => "400",
            Property::FontStyle => "normal",
            Property::LineHeight => "normal",
            Property::TextAlign => "start",
            Property::TextDecoration => "none",
            Property::MarginTop
            | Property::MarginRight
            | Property::MarginBottom
            | Property::MarginLeft
            | Property::PaddingTop
            | Property::PaddingRight
            | Property::PaddingBottom
            | Property::PaddingLeft => "0px",
            Property::BorderTop
            | Property::BorderRight
            | Property::BorderBottom
            | Property::BorderLeft => "none",
            Property::Width | Property::Height => "auto",
            Property::Display => "inline",
            Property::ListStyleType => "disc",
        }
    }

    fn side(&self) -> Option<Side> {
        match self {
            Property::BorderTop => Some(Side::Top),
            Property::BorderRight => Some(Side::Right),
            Property::BorderBottom => Some(Side::Bottom),
            Property::BorderLeft => Some(Side::Left),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Borders
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    fn index(self) -> usize {
        match self {
            Side::Top => 0,
            Side::Right => 1,
            Side::Bottom => 2,
            Side::Left => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        }
    }
}

/// One edge of the border box.
///
/// The default follows the utility framework's reset: zero width, `solid`
/// style and `currentcolor`, so setting a width alone draws a line.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderSide {
    pub width: f32,
    pub style: String,
    /// `None` means `currentcolor`
    pub color: Option<String>,
}

impl Default for BorderSide {
    fn default() -> Self {
        Self {
            width: 0.0,
            style: String::from("solid"),
            color: None,
        }
    }
}

impl BorderSide {
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.style != "none" && self.style != "hidden"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Computed Style
// ─────────────────────────────────────────────────────────────────────────────

/// Resolved values for every allow-listed property of one element.
///
/// Lengths are absolute pixels (`"24px"`), percentages are kept as written,
/// colors are kept in the notation they were declared in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputedStyle {
    values: BTreeMap<Property, String>,
    borders: [BorderSide; 4],
}

impl ComputedStyle {
    /// A style holding only the parent's inherited values.
    pub fn inherited(&self) -> Self {
        let values = self
            .values
            .iter()
            .filter(|(p, _)| p.is_inherited())
            .map(|(p, v)| (*p, v.clone()))
            .collect();
        Self {
            values,
            borders: Default::default(),
        }
    }

    pub fn get(&self, property: Property) -> Cow<'_, str> {
        if let Some(side) = property.side() {
            return Cow::Owned(self.format_border(side));
        }
        match self.values.get(&property) {
            Some(value) => Cow::Borrowed(value.as_str()),
            None => Cow::Borrowed(property.initial_value()),
        }
    }

    pub fn set(&mut self, property: Property, value: impl Into<String>) {
        match property.side() {
            Some(side) => {
                let parsed = resolver::parse_border_shorthand(&value.into());
                self.borders[side.index()] = parsed;
            }
            None => {
                self.values.insert(property, value.into());
            }
        }
    }

    pub fn border(&self, side: Side) -> &BorderSide {
        &self.borders[side.index()]
    }

    pub fn border_mut(&mut self, side: Side) -> &mut BorderSide {
        &mut self.borders[side.index()]
    }

    fn format_border(&self, side: Side) -> String {
        let border = self.border(side);
        if !border.is_visible() {
            return String::from("none");
        }
        let color = border
            .color
            .clone()
            .unwrap_or_else(|| self.get(Property::Color).into_owned());
        format!("{} {} {}", format_px(border.width), border.style, color)
    }

    /// Color of a border edge with `currentcolor` resolved.
    pub fn border_color(&self, side: Side) -> Option<Rgb> {
        match &self.border(side).color {
            Some(color) => Rgb::parse(color),
            None => self.color(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn color(&self) -> Option<Rgb> {
        Rgb::parse(&self.get(Property::Color))
    }

    pub fn background(&self) -> Option<Rgb> {
        Rgb::parse(&self.get(Property::BackgroundColor)).filter(|c| !c.is_transparent())
    }

    pub fn has_background(&self) -> bool {
        let value = self.get(Property::BackgroundColor);
        match Rgb::parse(&value) {
            Some(color) => !color.is_transparent(),
            // Unparseable but declared, e.g. color-mix()
            None => value != Property::BackgroundColor.initial_value(),
        }
    }

    pub fn font_size_px(&self) -> f32 {
        parse_px(&self.get(Property::FontSize)).unwrap_or(16.0)
    }

    /// Line box height in pixels.
    pub fn line_height_px(&self) -> f32 {
        let font_size = self.font_size_px();
        let value = self.get(Property::LineHeight);
        if let Some(px) = parse_px(&value) {
            return px;
        }
        match value.parse::<f32>() {
            Ok(factor) => factor * font_size,
            Err(_) => font_size * 1.2,
        }
    }

    pub fn is_bold(&self) -> bool {
        self.get(Property::FontWeight)
            .parse::<u16>()
            .map(|w| w >= 600)
            .unwrap_or(false)
    }

    pub fn is_italic(&self) -> bool {
        matches!(&*self.get(Property::FontStyle), "italic" | "oblique")
    }

    pub fn is_underlined(&self) -> bool {
        self.get(Property::TextDecoration).contains("underline")
    }

    pub fn is_monospace(&self) -> bool {
        let family = self.get(Property::FontFamily).to_ascii_lowercase();
        family.contains("mono") || family.contains("courier") || family.contains("consolas")
    }

    pub fn display(&self) -> Cow<'_, str> {
        self.get(Property::Display)
    }

    /// Absolute pixel value of a length property, `None` for `auto` and
    /// percentages.
    pub fn px(&self, property: Property) -> Option<f32> {
        parse_px(&self.get(property))
    }

    /// Length resolved against a containing block width.
    pub fn length_against(&self, property: Property, container: f32) -> Option<f32> {
        let value = self.get(property);
        if let Some(px) = parse_px(&value) {
            return Some(px);
        }
        value
            .strip_suffix('%')
            .and_then(|p| p.trim().parse::<f32>().ok())
            .map(|p| p / 100.0 * container)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lengths
// ─────────────────────────────────────────────────────────────────────────────

/// `"12.5px"` to `12.5`.
pub fn parse_px(value: &str) -> Option<f32> {
    value.trim().strip_suffix("px")?.trim().parse::<f32>().ok()
}

/// Shortest pixel notation, e.g. `16px`, `1.5px`.
pub fn format_px(value: f32) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}px", rounded as i64)
    } else {
        format!("{}px", rounded)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Declarations
// ─────────────────────────────────────────────────────────────────────────────

/// A single `name: value` pair from a `style` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
}

impl Declaration {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A `style` attribute segment that is not a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedDeclaration(pub String);

impl fmt::Display for MalformedDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed declaration '{}'", self.0)
    }
}

/// Split a `style` attribute into declarations.
///
/// Semicolons inside parentheses or quotes (data URIs, font lists) do not
/// end a declaration. `!important` is dropped.
pub fn parse_declarations(style: &str) -> Result<Vec<Declaration>, MalformedDeclaration> {
    let mut declarations = Vec::new();
    for segment in split_top_level(style) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, value) = segment
            .split_once(':')
            .ok_or_else(|| MalformedDeclaration(segment.to_string()))?;
        let name = name.trim().to_ascii_lowercase();
        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let value = value.trim();
        let value = value
            .strip_suffix("!important")
            .map(str::trim_end)
            .unwrap_or(value);
        if !valid_name || value.is_empty() {
            return Err(MalformedDeclaration(segment.to_string()));
        }
        declarations.push(Declaration::new(name, value));
    }
    Ok(declarations)
}

/// Like [`parse_declarations`] but skipping malformed segments.
pub fn parse_declarations_lenient(style: &str) -> Vec<Declaration> {
    split_top_level(style)
        .into_iter()
        .filter_map(|segment| parse_declarations(segment).ok())
        .flatten()
        .collect()
}

fn split_top_level(style: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                segments.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&style[start..]);
    segments
}

pub fn serialize_declarations(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|d| format!("{}: {}", d.name, d.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Set one declaration in an element's `style` attribute, replacing any
/// previous value for the same property.
pub fn set_inline_property(node: &NodeRef, name: &str, value: &str) {
    let mut declarations = dom::get_attr(node, "style")
        .map(|s| parse_declarations_lenient(&s))
        .unwrap_or_default();
    declarations.retain(|d| d.name != name);
    declarations.push(Declaration::new(name, value));
    dom::set_attr(node, "style", serialize_declarations(&declarations));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
