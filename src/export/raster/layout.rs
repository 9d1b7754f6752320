//! Raster Layout
//!
//! Lays the flattened export clone out as one tall SVG scene at a fixed
//! viewport width. This is a small flow engine, enough for rendered
//! Markdown: block boxes with margins, borders and padding, word-wrapped
//! styled text runs, list markers, tables with evenly divided columns, rules
//! and images. Text widths are estimated from per-glyph advance classes;
//! glyphs are shaped later by resvg.

use kuchiki::{NodeData, NodeRef};
use std::fmt::Write as _;

use crate::dom;
use crate::error::{Error, Result};
use crate::export::images::{LoadedImage, ResolvedImages};
use crate::style::{ComputedStyle, Property, Side, StyleResolver};
use crate::theme::Rgb;

const SANS_FAMILIES: &str = "Arial, Helvetica, 'Liberation Sans', 'DejaVu Sans', 'Noto Sans', sans-serif";
const SERIF_FAMILIES: &str = "'Times New Roman', 'Liberation Serif', 'DejaVu Serif', 'Noto Serif', serif";
const MONO_FAMILIES: &str =
    "'Courier New', 'Liberation Mono', 'DejaVu Sans Mono', 'Noto Sans Mono', monospace";

/// Ascent as a fraction of the font size.
const ASCENT: f32 = 0.8;

/// Gap between a list marker and the item's content box.
const MARKER_GAP: f32 = 6.0;

const TAB_WIDTH: usize = 4;

/// A laid-out page, ready for rasterizing.
#[derive(Debug, Clone)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub svg: String,
}

/// Lay out `root` at `viewport_width` CSS pixels.
///
/// `context` is the computed style `root` inherits from. An empty layout is
/// an error: there is nothing to rasterize.
pub fn layout_document(
    root: &NodeRef,
    context: &ComputedStyle,
    resolver: &StyleResolver,
    images: &ResolvedImages,
    viewport_width: f32,
) -> Result<Scene> {
    if !(viewport_width > 0.0) {
        return Err(Error::Rendering(format!(
            "invalid viewport width {}",
            viewport_width
        )));
    }

    let mut layouter = Layouter {
        resolver,
        images,
        out: Vec::new(),
        pre_depth: 0,
    };
    let style = layouter.style_of(root, context);
    let margin_top = style.px(Property::MarginTop).unwrap_or(0.0).max(0.0);
    let margin_bottom = style.px(Property::MarginBottom).unwrap_or(0.0).max(0.0);
    let height = layouter.block_box(root, &style, 0.0, margin_top, viewport_width);
    let total = (margin_top + height + margin_bottom).ceil();

    if !(total >= 1.0) {
        return Err(Error::Rendering("layout produced an empty page".to_string()));
    }

    let mut svg = String::with_capacity(layouter.out.iter().map(String::len).sum::<usize>() + 512);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}" xml:space="preserve">"#,
        w = num(viewport_width),
        h = num(total)
    );
    let _ = write!(
        svg,
        r##"<rect x="0" y="0" width="{}" height="{}" fill="#ffffff"/>"##,
        num(viewport_width),
        num(total)
    );
    for part in &layouter.out {
        svg.push_str(part);
    }
    svg.push_str("</svg>");

    Ok(Scene {
        width: viewport_width,
        height: total,
        svg,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Box model
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Edges {
    top: f32,
    right: f32,
    bottom: f32,
    left: f32,
}

impl Edges {
    fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

fn padding(style: &ComputedStyle, container: f32) -> Edges {
    let side = |p| style.length_against(p, container).unwrap_or(0.0).max(0.0);
    Edges {
        top: side(Property::PaddingTop),
        right: side(Property::PaddingRight),
        bottom: side(Property::PaddingBottom),
        left: side(Property::PaddingLeft),
    }
}

fn border(style: &ComputedStyle) -> Edges {
    let side = |s| {
        let b = style.border(s);
        if b.is_visible() {
            b.width
        } else {
            0.0
        }
    };
    Edges {
        top: side(Side::Top),
        right: side(Side::Right),
        bottom: side(Side::Bottom),
        left: side(Side::Left),
    }
}

/// Sibling margins: positive margins overlap, negative ones add.
fn collapse(a: f32, b: f32) -> f32 {
    if a >= 0.0 && b >= 0.0 {
        a.max(b)
    } else if a <= 0.0 && b <= 0.0 {
        a.min(b)
    } else {
        a + b
    }
}

fn is_block_level(display: &str) -> bool {
    matches!(
        display,
        "block" | "list-item" | "table" | "flex" | "grid" | "flow-root" | "table-row-group"
            | "table-header-group" | "table-footer-group" | "table-row" | "table-cell"
            | "table-caption"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Text runs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct RunStyle {
    font_size: f32,
    line_height: f32,
    bold: bool,
    italic: bool,
    mono: bool,
    serif: bool,
    color: Rgb,
    underline: bool,
    strike: bool,
    background: Option<Rgb>,
}

impl RunStyle {
    fn from_style(style: &ComputedStyle, background: Option<Rgb>) -> Self {
        let family = style.get(Property::FontFamily).to_ascii_lowercase();
        let decoration = style.get(Property::TextDecoration);
        Self {
            font_size: style.font_size_px(),
            line_height: style.line_height_px(),
            bold: style.is_bold(),
            italic: style.is_italic(),
            mono: style.is_monospace(),
            serif: family.contains("serif") && !family.contains("sans"),
            color: style.color().unwrap_or(Rgb::BLACK),
            underline: decoration.contains("underline"),
            strike: decoration.contains("line-through"),
            background,
        }
    }

    /// Distance from line top to baseline within this run's own line box.
    fn ascent(&self) -> f32 {
        (self.line_height - self.font_size) / 2.0 + self.font_size * ASCENT
    }

    fn descent(&self) -> f32 {
        self.line_height - self.ascent()
    }

    fn families(&self) -> &'static str {
        if self.mono {
            MONO_FAMILIES
        } else if self.serif {
            SERIF_FAMILIES
        } else {
            SANS_FAMILIES
        }
    }

    fn text_width(&self, text: &str) -> f32 {
        let em: f32 = text.chars().map(|c| advance(c, self.mono)).sum();
        let weight = if self.bold && !self.mono { 1.06 } else { 1.0 };
        em * self.font_size * weight
    }
}

/// Estimated advance of one character, in ems.
fn advance(c: char, mono: bool) -> f32 {
    if mono {
        return if is_wide(c) { 1.0 } else { 0.6 };
    }
    match c {
        'i' | 'l' | 'j' | '!' | '|' | '.' | ',' | ':' | ';' | '\'' | ' ' => 0.28,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '{' | '}' | '/' | '-' => 0.35,
        'm' | 'w' | 'M' | 'W' => 0.85,
        'A'..='Z' => 0.68,
        '0'..='9' => 0.56,
        'a'..='z' => 0.52,
        c if is_wide(c) => 1.0,
        _ => 0.6,
    }
}

fn is_wide(c: char) -> bool {
    matches!(c as u32, 0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF | 0xFF00..=0xFF60)
}

/// Inline content collected from a run of sibling nodes.
#[derive(Debug, Clone)]
enum Item {
    Text(String, usize),
    Break(usize),
    Image(ImageBox),
}

#[derive(Debug, Clone)]
struct ImageBox {
    href: String,
    width: f32,
    height: f32,
}

#[derive(Debug, Clone)]
enum Token {
    Word(String, usize),
    Space(usize),
    Break(usize),
    Image(ImageBox),
}

#[derive(Debug, Clone)]
enum Glyphs {
    Text(String),
    Space,
    Image(String),
}

#[derive(Debug, Clone)]
struct Placed {
    glyphs: Glyphs,
    run: usize,
    x: f32,
    width: f32,
    height: f32,
}

#[derive(Debug, Clone, Default)]
struct Line {
    items: Vec<Placed>,
    width: f32,
}

impl Line {
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn push(&mut self, glyphs: Glyphs, run: usize, width: f32, height: f32) {
        self.items.push(Placed {
            glyphs,
            run,
            x: self.width,
            width,
            height,
        });
        self.width += width;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Layouter
// ─────────────────────────────────────────────────────────────────────────────

struct Layouter<'a> {
    resolver: &'a StyleResolver,
    images: &'a ResolvedImages,
    /// SVG fragments in paint order; empty strings are reserved slots
    out: Vec<String>,
    pre_depth: usize,
}

impl<'a> Layouter<'a> {
    fn style_of(&self, node: &NodeRef, parent: &ComputedStyle) -> ComputedStyle {
        self.resolver
            .computed_style_with_parent(node, parent)
            .unwrap_or_else(|_| parent.inherited())
    }

    /// Reserve a paint slot so a background can be drawn under content that
    /// is laid out before the box height is known.
    fn reserve(&mut self) -> usize {
        self.out.push(String::new());
        self.out.len() - 1
    }

    fn capture<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> (T, Vec<String>) {
        let saved = std::mem::take(&mut self.out);
        let value = f(self);
        let parts = std::mem::replace(&mut self.out, saved);
        (value, parts)
    }

    /// Lay out a block-level box whose margin edge starts at `x`, with its
    /// border edge at `y`. Returns the border-box height.
    fn block_box(
        &mut self,
        node: &NodeRef,
        style: &ComputedStyle,
        x: f32,
        y: f32,
        available: f32,
    ) -> f32 {
        let margin_left = style.length_against(Property::MarginLeft, available);
        let margin_right = style.length_against(Property::MarginRight, available);
        let explicit_width = style
            .length_against(Property::Width, available)
            .map(|w| w.clamp(0.0, available));

        let width = explicit_width.unwrap_or_else(|| {
            (available - margin_left.unwrap_or(0.0) - margin_right.unwrap_or(0.0)).max(0.0)
        });
        let box_x = match (margin_left, margin_right, explicit_width) {
            (None, None, Some(_)) => x + (available - width) / 2.0,
            (None, Some(right), Some(_)) => x + available - width - right,
            (left, _, _) => x + left.unwrap_or(0.0),
        };

        let border = border(style);
        let padding = padding(style, available);
        let content_x = box_x + border.left + padding.left;
        let content_y = y + border.top + padding.top;
        let content_width = (width - border.horizontal() - padding.horizontal()).max(0.0);

        let slot = self.reserve();
        let is_pre = dom::is_tag(node, &["pre"]);
        if is_pre {
            self.pre_depth += 1;
        }

        let mut content_height = if dom::is_tag(node, &["img"]) {
            self.block_image(node, style, content_x, content_y, content_width)
        } else if style.display() == "table" {
            self.table(node, style, content_x, content_y, content_width)
        } else {
            self.flow(node, style, content_x, content_y, content_width)
        };

        if is_pre {
            self.pre_depth -= 1;
        }

        if let Some(height) = style.px(Property::Height) {
            content_height = (height - border.vertical() - padding.vertical()).max(0.0);
        }
        let height = border.vertical() + padding.vertical() + content_height;

        self.out[slot] = background_rect(style, box_x, y, width, height);
        let borders = border_rects(style, box_x, y, width, height);
        self.out.push(borders);
        height
    }

    /// Block formatting context: stack block children, wrap inline runs.
    /// Returns the content height.
    fn flow(&mut self, node: &NodeRef, style: &ComputedStyle, x: f32, y: f32, width: f32) -> f32 {
        let mut cursor = y;
        let mut pending_margin = 0.0f32;
        let mut inline_run: Vec<NodeRef> = Vec::new();
        let mut counter = list_start(node);

        for child in node.children() {
            let child_style = match child.data() {
                NodeData::Element(_) => self.style_of(&child, style),
                NodeData::Text(_) => {
                    inline_run.push(child.clone());
                    continue;
                }
                _ => continue,
            };
            let display = child_style.display();
            if display == "none" {
                continue;
            }
            if !is_block_level(&display) {
                inline_run.push(child.clone());
                continue;
            }

            if !inline_run.is_empty() {
                let height = self.inline_run(&inline_run, style, x, cursor + pending_margin, width);
                if height > 0.0 {
                    cursor += pending_margin + height;
                    pending_margin = 0.0;
                }
                inline_run.clear();
            }

            let margin_top = child_style.length_against(Property::MarginTop, width).unwrap_or(0.0);
            let margin_bottom = child_style
                .length_against(Property::MarginBottom, width)
                .unwrap_or(0.0);
            cursor += collapse(pending_margin, margin_top);

            if display == "list-item" {
                self.list_marker(&child_style, counter, x, cursor, width);
                counter += 1;
            }
            let height = self.block_box(&child, &child_style, x, cursor, width);
            cursor += height;
            pending_margin = margin_bottom;
        }

        if !inline_run.is_empty() {
            let height = self.inline_run(&inline_run, style, x, cursor + pending_margin, width);
            if height > 0.0 {
                cursor += pending_margin + height;
                pending_margin = 0.0;
            }
        }
        cursor += pending_margin.max(0.0);
        (cursor - y).max(0.0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inline content
    // ─────────────────────────────────────────────────────────────────────────

    fn inline_run(
        &mut self,
        nodes: &[NodeRef],
        block: &ComputedStyle,
        x: f32,
        y: f32,
        width: f32,
    ) -> f32 {
        let mut runs = vec![RunStyle::from_style(block, None)];
        let mut items = Vec::new();
        for node in nodes {
            self.collect_inline(node, block, 0, None, &mut runs, &mut items);
        }
        let preformatted = self.pre_depth > 0;
        let tokens = tokenize(&items, preformatted);
        let lines = break_lines(&tokens, &runs, width);
        if lines.is_empty() {
            return 0.0;
        }

        let align = block.get(Property::TextAlign);
        let strut = &runs[0];
        let mut cursor = y;
        for line in &lines {
            let mut ascent = strut.ascent();
            let mut descent = strut.descent();
            for item in &line.items {
                match item.glyphs {
                    Glyphs::Image(_) => ascent = ascent.max(item.height),
                    _ => {
                        ascent = ascent.max(runs[item.run].ascent());
                        descent = descent.max(runs[item.run].descent());
                    }
                }
            }
            let offset = match &*align {
                "center" => ((width - line.width) / 2.0).max(0.0),
                "right" | "end" => (width - line.width).max(0.0),
                _ => 0.0,
            };
            self.paint_line(line, &runs, x + offset, cursor + ascent);
            cursor += ascent + descent;
        }
        cursor - y
    }

    fn collect_inline(
        &self,
        node: &NodeRef,
        parent: &ComputedStyle,
        run: usize,
        background: Option<Rgb>,
        runs: &mut Vec<RunStyle>,
        items: &mut Vec<Item>,
    ) {
        match node.data() {
            NodeData::Text(text) => {
                let text = text.borrow();
                if !text.is_empty() {
                    items.push(Item::Text(text.clone(), run));
                }
            }
            NodeData::Element(_) => {
                let style = self.style_of(node, parent);
                if style.display() == "none" {
                    return;
                }
                if dom::is_tag(node, &["br"]) {
                    items.push(Item::Break(run));
                    return;
                }
                if dom::is_tag(node, &["img"]) {
                    if let Some(image) = self.image_box(node, &style, None) {
                        items.push(Item::Image(image));
                    }
                    return;
                }
                let background = style.background().or(background);
                let own = RunStyle::from_style(&style, background);
                let run = match runs.iter().position(|r| *r == own) {
                    Some(index) => index,
                    None => {
                        runs.push(own);
                        runs.len() - 1
                    }
                };
                for child in node.children() {
                    self.collect_inline(&child, &style, run, background, runs, items);
                }
            }
            _ => {}
        }
    }

    fn paint_line(&mut self, line: &Line, runs: &[RunStyle], x: f32, baseline: f32) {
        let mut fragment = String::new();
        for item in &line.items {
            let run = &runs[item.run];
            let left = x + item.x;
            if let (Some(bg), false) = (run.background, matches!(item.glyphs, Glyphs::Image(_))) {
                let top = baseline - run.ascent();
                fragment.push_str(&rect(left, top, item.width, run.line_height, bg));
            }
        }
        for item in &line.items {
            let run = &runs[item.run];
            let left = x + item.x;
            match &item.glyphs {
                Glyphs::Text(text) => {
                    let _ = write!(
                        fragment,
                        r#"<text x="{}" y="{}" font-family="{}" font-size="{}"{}{}{}>{}</text>"#,
                        num(left),
                        num(baseline),
                        run.families(),
                        num(run.font_size),
                        if run.bold { r#" font-weight="bold""# } else { "" },
                        if run.italic { r#" font-style="italic""# } else { "" },
                        fill(run.color),
                        escape(text)
                    );
                }
                Glyphs::Image(href) => {
                    let _ = write!(
                        fragment,
                        r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"/>"#,
                        num(left),
                        num(baseline - item.height),
                        num(item.width),
                        num(item.height),
                        href
                    );
                    continue;
                }
                Glyphs::Space => {}
            }
            let thickness = (run.font_size / 16.0).max(1.0);
            if run.underline {
                let top = baseline + run.font_size * 0.1;
                fragment.push_str(&rect(left, top, item.width, thickness, run.color));
            }
            if run.strike {
                let top = baseline - run.font_size * 0.3;
                fragment.push_str(&rect(left, top, item.width, thickness, run.color));
            }
        }
        self.out.push(fragment);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Images
    // ─────────────────────────────────────────────────────────────────────────

    /// Sized image for an `<img>`, or `None` when it did not load.
    fn image_box(&self, node: &NodeRef, style: &ComputedStyle, available: Option<f32>) -> Option<ImageBox> {
        let src = dom::get_attr(node, "src")?;
        let image: &LoadedImage = self.images.get(src.trim())?;
        let (natural_w, natural_h) = (image.width as f32, image.height as f32);
        if natural_w <= 0.0 || natural_h <= 0.0 {
            return None;
        }
        let container = available.unwrap_or(natural_w);
        let (mut width, mut height) = match (
            style.length_against(Property::Width, container),
            style.px(Property::Height),
        ) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * natural_h / natural_w),
            (None, Some(h)) => (h * natural_w / natural_h, h),
            (None, None) => (natural_w, natural_h),
        };
        if let Some(limit) = available {
            if width > limit && width > 0.0 {
                height *= limit / width;
                width = limit;
            }
        }
        Some(ImageBox {
            href: image.data_uri(),
            width,
            height,
        })
    }

    fn block_image(&mut self, node: &NodeRef, style: &ComputedStyle, x: f32, y: f32, width: f32) -> f32 {
        match self.image_box(node, style, Some(width)) {
            Some(image) => {
                self.out.push(format!(
                    r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"/>"#,
                    num(x),
                    num(y),
                    num(image.width),
                    num(image.height),
                    image.href
                ));
                image.height
            }
            None => 0.0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lists
    // ─────────────────────────────────────────────────────────────────────────

    fn list_marker(&mut self, item: &ComputedStyle, index: i64, x: f32, top: f32, width: f32) {
        let run = RunStyle::from_style(item, None);
        let offset = border(item).top + padding(item, width).top;
        let baseline = top + offset + run.ascent();
        let right = x - MARKER_GAP;
        let kind = item.get(Property::ListStyleType);
        let size = run.font_size * 0.36;
        let center_y = baseline - run.font_size * 0.3;

        let fragment = match &*kind {
            "none" => return,
            "disc" => format!(
                r#"<circle cx="{}" cy="{}" r="{}"{}/>"#,
                num(right - size / 2.0),
                num(center_y),
                num(size / 2.0),
                fill(run.color)
            ),
            "circle" => format!(
                r#"<circle cx="{}" cy="{}" r="{}" fill="none" stroke="{}" stroke-width="1"/>"#,
                num(right - size / 2.0),
                num(center_y),
                num(size / 2.0 - 0.5),
                run.color.to_hex()
            ),
            "square" => rect(right - size, center_y - size / 2.0, size, size, run.color),
            other => {
                let label = ordinal(index, other);
                let left = right - run.text_width(&label);
                format!(
                    r#"<text x="{}" y="{}" font-family="{}" font-size="{}"{}{}>{}</text>"#,
                    num(left),
                    num(baseline),
                    run.families(),
                    num(run.font_size),
                    if run.bold { r#" font-weight="bold""# } else { "" },
                    fill(run.color),
                    escape(&label)
                )
            }
        };
        self.out.push(fragment);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tables
    // ─────────────────────────────────────────────────────────────────────────

    fn table(&mut self, node: &NodeRef, style: &ComputedStyle, x: f32, y: f32, width: f32) -> f32 {
        let mut rows: Vec<(NodeRef, ComputedStyle)> = Vec::new();
        for child in dom::element_children(node) {
            let child_style = self.style_of(&child, style);
            if dom::is_tag(&child, &["tr"]) {
                rows.push((child, child_style));
            } else if dom::is_tag(&child, &["thead", "tbody", "tfoot"]) {
                for row in dom::element_children(&child).filter(|r| dom::is_tag(r, &["tr"])) {
                    let row_style = self.style_of(&row, &child_style);
                    rows.push((row, row_style));
                }
            }
        }

        let columns = rows
            .iter()
            .map(|(row, _)| cells_of(row).len())
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return 0.0;
        }
        let column_width = width / columns as f32;

        let mut cursor = y;
        for (row, row_style) in &rows {
            let row_slot = self.reserve();
            let mut laid_out = Vec::new();
            for (i, cell) in cells_of(row).into_iter().enumerate() {
                let cell_style = self.style_of(&cell, row_style);
                let cell_x = x + i as f32 * column_width;
                let (height, parts) = self.capture(|l| {
                    let border = border(&cell_style);
                    let padding = padding(&cell_style, column_width);
                    let inner = (column_width - border.horizontal() - padding.horizontal()).max(0.0);
                    let content = l.flow(
                        &cell,
                        &cell_style,
                        cell_x + border.left + padding.left,
                        cursor + border.top + padding.top,
                        inner,
                    );
                    content + border.vertical() + padding.vertical()
                });
                laid_out.push((cell_style, cell_x, height, parts));
            }

            let row_height = laid_out
                .iter()
                .map(|(_, _, h, _)| *h)
                .fold(0.0f32, f32::max);
            self.out[row_slot] = background_rect(row_style, x, cursor, width, row_height);
            for (cell_style, cell_x, _, parts) in laid_out {
                self.out
                    .push(background_rect(&cell_style, cell_x, cursor, column_width, row_height));
                self.out.extend(parts);
                self.out
                    .push(border_rects(&cell_style, cell_x, cursor, column_width, row_height));
            }
            cursor += row_height;
        }
        cursor - y
    }
}

fn cells_of(row: &NodeRef) -> Vec<NodeRef> {
    dom::element_children(row)
        .filter(|c| dom::is_tag(c, &["td", "th"]))
        .collect()
}

fn list_start(node: &NodeRef) -> i64 {
    if !dom::is_tag(node, &["ol"]) {
        return 1;
    }
    dom::get_attr(node, "start")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(1)
}

/// Marker label for ordered list styles.
fn ordinal(index: i64, kind: &str) -> String {
    match kind {
        "decimal-leading-zero" => format!("{:02}.", index),
        "lower-alpha" | "lower-latin" => format!("{}.", alphabetic(index)),
        "upper-alpha" | "upper-latin" => format!("{}.", alphabetic(index).to_ascii_uppercase()),
        "lower-roman" => format!("{}.", roman(index)),
        "upper-roman" => format!("{}.", roman(index).to_ascii_uppercase()),
        _ => format!("{}.", index),
    }
}

fn alphabetic(index: i64) -> String {
    if index < 1 {
        return index.to_string();
    }
    let mut n = index;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

fn roman(index: i64) -> String {
    if !(1..4000).contains(&index) {
        return index.to_string();
    }
    const NUMERALS: [(i64, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut n = index;
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Line breaking
// ─────────────────────────────────────────────────────────────────────────────

fn tokenize(items: &[Item], preformatted: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    for item in items {
        match item {
            Item::Break(run) => tokens.push(Token::Break(*run)),
            Item::Image(image) => tokens.push(Token::Image(image.clone())),
            Item::Text(text, run) if preformatted => {
                let text = text.replace('\t', &" ".repeat(TAB_WIDTH));
                for (i, segment) in text.split('\n').enumerate() {
                    if i > 0 {
                        tokens.push(Token::Break(*run));
                    }
                    let segment = segment.trim_end_matches('\r');
                    if !segment.is_empty() {
                        tokens.push(Token::Word(segment.to_string(), *run));
                    }
                }
            }
            Item::Text(text, run) => {
                let mut word = String::new();
                for c in text.chars() {
                    if c.is_whitespace() {
                        if !word.is_empty() {
                            tokens.push(Token::Word(std::mem::take(&mut word), *run));
                        }
                        if !matches!(tokens.last(), Some(Token::Space(_))) {
                            tokens.push(Token::Space(*run));
                        }
                    } else {
                        word.push(c);
                    }
                }
                if !word.is_empty() {
                    tokens.push(Token::Word(word, *run));
                }
            }
        }
    }
    if preformatted && matches!(tokens.last(), Some(Token::Break(_))) {
        tokens.pop();
    }
    tokens
}

fn break_lines(tokens: &[Token], runs: &[RunStyle], width: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();
    let mut pending_space: Option<usize> = None;

    for token in tokens {
        match token {
            Token::Space(run) => {
                if !line.is_empty() {
                    pending_space = Some(*run);
                }
            }
            Token::Break(_) => {
                lines.push(std::mem::take(&mut line));
                pending_space = None;
            }
            Token::Word(text, run) => {
                let style = &runs[*run];
                let word_width = style.text_width(text);
                let space_width = pending_space.map_or(0.0, |r| runs[r].text_width(" "));
                if !line.is_empty() && line.width + space_width + word_width > width {
                    lines.push(std::mem::take(&mut line));
                    pending_space = None;
                }
                if let Some(space_run) = pending_space.take() {
                    line.push(Glyphs::Space, space_run, space_width, 0.0);
                }
                if word_width <= width || line.width > 0.0 {
                    line.push(Glyphs::Text(text.clone()), *run, word_width, 0.0);
                    continue;
                }
                // Longer than the whole line: wrap by character
                let mut chunk = String::new();
                for c in text.chars() {
                    let mut candidate = chunk.clone();
                    candidate.push(c);
                    if !chunk.is_empty() && style.text_width(&candidate) > width {
                        let chunk_width = style.text_width(&chunk);
                        line.push(Glyphs::Text(std::mem::take(&mut chunk)), *run, chunk_width, 0.0);
                        lines.push(std::mem::take(&mut line));
                        chunk.push(c);
                    } else {
                        chunk = candidate;
                    }
                }
                if !chunk.is_empty() {
                    let chunk_width = style.text_width(&chunk);
                    line.push(Glyphs::Text(chunk), *run, chunk_width, 0.0);
                }
            }
            Token::Image(image) => {
                let space_width = pending_space.map_or(0.0, |r| runs[r].text_width(" "));
                if !line.is_empty() && line.width + space_width + image.width > width {
                    lines.push(std::mem::take(&mut line));
                    pending_space = None;
                }
                if let Some(space_run) = pending_space.take() {
                    line.push(Glyphs::Space, space_run, space_width, 0.0);
                }
                line.push(
                    Glyphs::Image(image.href.clone()),
                    0,
                    image.width,
                    image.height,
                );
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

// ─────────────────────────────────────────────────────────────────────────────
// Painting
// ─────────────────────────────────────────────────────────────────────────────

fn num(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

fn fill(color: Rgb) -> String {
    if color.a >= 1.0 {
        format!(r#" fill="{}""#, color.to_hex())
    } else {
        format!(r#" fill="{}" fill-opacity="{}""#, color.to_hex(), num(color.a))
    }
}

fn rect(x: f32, y: f32, width: f32, height: f32, color: Rgb) -> String {
    if width <= 0.0 || height <= 0.0 || color.is_transparent() {
        return String::new();
    }
    format!(
        r#"<rect x="{}" y="{}" width="{}" height="{}"{}/>"#,
        num(x),
        num(y),
        num(width),
        num(height),
        fill(color)
    )
}

fn background_rect(style: &ComputedStyle, x: f32, y: f32, width: f32, height: f32) -> String {
    match style.background() {
        Some(color) => rect(x, y, width, height, color),
        None => String::new(),
    }
}

fn border_rects(style: &ComputedStyle, x: f32, y: f32, width: f32, height: f32) -> String {
    let mut out = String::new();
    for side in Side::ALL {
        let edge = style.border(side);
        if !edge.is_visible() {
            continue;
        }
        let color = style.border_color(side).unwrap_or(Rgb::BLACK);
        let w = edge.width;
        let fragment = match side {
            Side::Top => rect(x, y, width, w, color),
            Side::Bottom => rect(x, y + height - w, width, w, color),
            Side::Left => rect(x, y, w, height, color),
            Side::Right => rect(x + width - w, y, w, height, color),
        };
        out.push_str(&fragment);
    }
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c if (c as u32) < 0x20 && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn article(html: &str) -> NodeRef {
        dom::parse_fragment(&format!(r#"<article style="padding: 16px">{}</article>"#, html))
            .into_iter()
            .next()
            .unwrap()
    }

    fn scene(html: &str, width: f32) -> Scene {
        layout_document(
            &article(html),
            &ComputedStyle::default(),
            &StyleResolver::new(),
            &ResolvedImages::default(),
            width,
        )
        .unwrap()
    }

    #[test]
    fn test_scene_is_svg_of_viewport_width() {
        let scene = scene("<h1>Title</h1><p>Body text</p>", 800.0);
        assert_eq!(scene.width, 800.0);
        assert!(scene.height > 50.0);
        assert!(scene.svg.starts_with("<svg "));
        assert!(scene.svg.ends_with("</svg>"));
        assert!(scene.svg.contains(">Title</text>"));
        assert!(scene.svg.contains(r#"font-weight="bold""#));
    }

    #[test]
    fn test_long_paragraph_wraps() {
        let words = "lorem ipsum dolor ".repeat(40);
        let narrow = scene(&format!("<p>{}</p>", words), 400.0);
        let wide = scene(&format!("<p>{}</p>", words), 1600.0);
        assert!(narrow.height > wide.height);
    }

    #[test]
    fn test_more_content_is_taller() {
        let one = scene("<p>a</p>", 800.0);
        let three = scene("<p>a</p><p>b</p><p>c</p>", 800.0);
        assert!(three.height > one.height);
    }

    #[test]
    fn test_text_is_escaped() {
        let scene = scene("<p>a &lt; b &amp; c</p>", 800.0);
        assert!(scene.svg.contains("&lt;"));
        assert!(scene.svg.contains("&amp;"));
    }

    #[test]
    fn test_backgrounds_painted() {
        let scene = scene(r#"<div style="background-color: #eff6ff; padding: 8px">x</div>"#, 800.0);
        assert!(scene.svg.contains(r##"fill="#eff6ff""##));
    }

    #[test]
    fn test_list_markers() {
        let bullets = scene("<ul><li>one</li><li>two</li></ul>", 800.0);
        assert_eq!(bullets.svg.matches("<circle").count(), 2);

        let numbered = scene(r#"<ol start="3"><li>a</li><li>b</li></ol>"#, 800.0);
        assert!(numbered.svg.contains(">3.</text>"));
        assert!(numbered.svg.contains(">4.</text>"));
    }

    #[test]
    fn test_table_cells_laid_out() {
        let scene = scene(
            r#"<table style="width: 100%"><tr><th>H1</th><th>H2</th></tr><tr><td>a</td><td>b</td></tr></table>"#,
            800.0,
        );
        for text in [">H1<", ">H2<", ">a<", ">b<"] {
            assert!(scene.svg.contains(text), "{}", text);
        }
    }

    #[test]
    fn test_preformatted_keeps_lines() {
        let scene = scene("<pre><code>fn main() {\n    run();\n}\n</code></pre>", 800.0);
        assert!(scene.svg.contains(">    run();</text>"));
        assert!(scene.svg.contains(MONO_FAMILIES));
    }

    #[test]
    fn test_hidden_elements_skipped() {
        let scene = scene(r#"<p>shown</p><p style="display: none">hidden</p>"#, 800.0);
        assert!(!scene.svg.contains("hidden"));
    }

    #[test]
    fn test_missing_image_is_skipped() {
        let scene = scene(r#"<p>before <img src="nope.png"> after</p>"#, 800.0);
        assert!(!scene.svg.contains("<image"));
    }

    #[tokio::test]
    async fn test_loaded_image_embedded() {
        use crate::export::images::tests::png_bytes;
        use base64::Engine as _;

        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png_bytes())
        );
        let root = article(&format!(r#"<p><img src="{}"></p>"#, uri));
        let images = crate::export::images::settle_images(
            &root,
            &crate::export::images::LocalFetcher::default(),
            std::time::Duration::from_secs(5),
        )
        .await;
        let scene = layout_document(
            &root,
            &ComputedStyle::default(),
            &StyleResolver::new(),
            &images,
            800.0,
        )
        .unwrap();
        assert!(scene.svg.contains(r#"<image "#));
        assert!(scene.svg.contains(r#"width="3" height="2""#));
    }

    #[test]
    fn test_invalid_viewport_rejected() {
        let result = layout_document(
            &article("<p>x</p>"),
            &ComputedStyle::default(),
            &StyleResolver::new(),
            &ResolvedImages::default(),
            0.0,
        );
        assert!(matches!(result, Err(Error::Rendering(_))));
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(4, "decimal"), "4.");
        assert_eq!(ordinal(28, "lower-alpha"), "ab.");
        assert_eq!(ordinal(14, "upper-roman"), "XIV.");
        assert_eq!(ordinal(7, "decimal-leading-zero"), "07.");
    }

    #[test]
    fn test_overlong_word_wraps_by_character() {
        let runs = vec![RunStyle::from_style(&ComputedStyle::default(), None)];
        let tokens = tokenize(&[Item::Text("x".repeat(200), 0)], false);
        let lines = break_lines(&tokens, &runs, 100.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.width <= 100.0 + 0.01));
    }
}
