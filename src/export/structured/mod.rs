//! Structured Export Generator
//!
//! The DOCX path. The prepared clone is walked once, depth-first and in
//! source order, and each recognised tag becomes a typed [`Block`]. Tags the
//! walk does not know are transparent: their children are visited instead.
//!
//! - `docx.rs` - WordprocessingML packaging of the block list

pub mod docx;

pub use docx::build_docx;

use kuchiki::{NodeData, NodeRef};
use log::{debug, warn};

use crate::config::PageSize;
use crate::dom;
use crate::error::{Error, Result};
use crate::style::parse_declarations_lenient;
use crate::theme::Rgb;

/// Shading used behind inline code and preformatted text.
pub const CODE_SHADING: &str = "F5F5F5";

// ─────────────────────────────────────────────────────────────────────────────
// Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// A run of text with uniform formatting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    /// OOXML `RRGGBB` run shading
    pub shading: Option<String>,
    /// OOXML `RRGGBB` text color
    pub color: Option<String>,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::plain(text)
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            italic: true,
            ..Self::plain(text)
        }
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self {
            monospace: true,
            shading: Some(CODE_SHADING.to_string()),
            ..Self::plain(text)
        }
    }
}

/// One typed unit of the structured document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        level: u8,
        text: String,
        color: Option<String>,
    },
    Paragraph {
        runs: Vec<Run>,
    },
    /// Monospace, shaded, line breaks kept
    Preformatted {
        text: String,
    },
    /// Italic, indented
    Quote {
        text: String,
    },
    ListItem {
        text: String,
        ordered: bool,
        /// Which `ul`/`ol` the item came from, counted in document order
        list: usize,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
    /// Empty paragraph
    Break,
    /// Paragraph with only a bottom border
    Rule,
}

impl Block {
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Heading { .. } => "heading",
            Block::Paragraph { .. } => "paragraph",
            Block::Preformatted { .. } => "preformatted",
            Block::Quote { .. } => "quote",
            Block::ListItem { .. } => "list item",
            Block::Table { .. } => "table",
            Block::Break => "break",
            Block::Rule => "rule",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Walk
// ─────────────────────────────────────────────────────────────────────────────

/// Walk the prepared clone into blocks, in document order.
pub fn collect_blocks(root: &NodeRef) -> Vec<Block> {
    let mut blocks = Vec::new();
    visit(root, &mut blocks);
    blocks
}

fn visit(node: &NodeRef, blocks: &mut Vec<Block>) {
    let tag = match node.data() {
        NodeData::Text(text) => {
            let text = collapse_whitespace(&text.borrow());
            if !text.is_empty() {
                blocks.push(Block::Paragraph {
                    runs: vec![Run::plain(text)],
                });
            }
            return;
        }
        NodeData::Element(element) => element.name.local.to_string(),
        NodeData::Document(_) | NodeData::DocumentFragment => {
            visit_children(node, blocks);
            return;
        }
        _ => return,
    };

    match tag.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let text = dom::normalized_text(node);
            if !text.is_empty() {
                blocks.push(Block::Heading {
                    level: tag.as_bytes()[1] - b'0',
                    text,
                    color: literal_color(node),
                });
            }
        }
        "p" => {
            let mut runs = Vec::new();
            inline_runs(node, Run::default(), &mut runs);
            let runs = tidy_runs(runs);
            if !runs.is_empty() {
                let color = literal_color(node);
                let runs = runs
                    .into_iter()
                    .map(|run| Run {
                        color: run.color.or_else(|| color.clone()),
                        ..run
                    })
                    .collect();
                blocks.push(Block::Paragraph { runs });
            }
        }
        "strong" | "b" => push_single_run(blocks, Run::bold(dom::normalized_text(node))),
        "em" | "i" => push_single_run(blocks, Run::italic(dom::normalized_text(node))),
        "code" => push_single_run(blocks, Run::code(dom::normalized_text(node))),
        "pre" => {
            let text = node.text_contents();
            let text = text.trim_end_matches(['\n', '\r']);
            if !text.trim().is_empty() {
                blocks.push(Block::Preformatted {
                    text: text.to_string(),
                });
            }
        }
        "blockquote" => {
            let text = dom::normalized_text(node);
            if !text.is_empty() {
                blocks.push(Block::Quote { text });
            }
        }
        "ul" | "ol" => {
            let ordered = tag == "ol";
            let list = next_list(blocks);
            for item in dom::element_children(node).filter(|c| dom::is_tag(c, &["li"])) {
                let text = dom::normalized_text(&item);
                if !text.is_empty() {
                    blocks.push(Block::ListItem {
                        text,
                        ordered,
                        list,
                    });
                }
            }
        }
        "table" => match table_rows(node) {
            rows if rows.is_empty() => warn!("Skipping table without rows"),
            rows => blocks.push(Block::Table { rows }),
        },
        "br" => blocks.push(Block::Break),
        "hr" => blocks.push(Block::Rule),
        _ => visit_children(node, blocks),
    }
}

fn visit_children(node: &NodeRef, blocks: &mut Vec<Block>) {
    for child in node.children() {
        visit(&child, blocks);
    }
}

/// Identity for the next list: one past the most recent list's.
fn next_list(blocks: &[Block]) -> usize {
    blocks
        .iter()
        .rev()
        .find_map(|block| match block {
            Block::ListItem { list, .. } => Some(list + 1),
            _ => None,
        })
        .unwrap_or(0)
}

fn push_single_run(blocks: &mut Vec<Block>, run: Run) {
    if !run.text.is_empty() {
        blocks.push(Block::Paragraph { runs: vec![run] });
    }
}

/// Formatted runs of a paragraph's inline content.
fn inline_runs(node: &NodeRef, format: Run, runs: &mut Vec<Run>) {
    for child in node.children() {
        match child.data() {
            NodeData::Text(text) => runs.push(Run {
                text: text.borrow().clone(),
                ..format.clone()
            }),
            NodeData::Element(_) => {
                let mut nested = format.clone();
                match dom::tag_name(&child).unwrap_or_default() {
                    "strong" | "b" => nested.bold = true,
                    "em" | "i" => nested.italic = true,
                    "code" | "kbd" | "samp" => {
                        nested.monospace = true;
                        nested.shading = Some(CODE_SHADING.to_string());
                    }
                    "br" => {
                        runs.push(Run {
                            text: "\n".to_string(),
                            ..format.clone()
                        });
                        continue;
                    }
                    _ => {}
                }
                if let Some(color) = literal_color(&child) {
                    nested.color = Some(color);
                }
                inline_runs(&child, nested, runs);
            }
            _ => {}
        }
    }
}

/// Collapse whitespace across run boundaries, trim the ends and merge
/// neighbours with identical formatting.
fn tidy_runs(runs: Vec<Run>) -> Vec<Run> {
    let mut tidy: Vec<Run> = Vec::new();
    let mut after_space = true;
    for run in runs {
        let mut text = String::with_capacity(run.text.len());
        for c in run.text.chars() {
            if c == '\n' && run.text == "\n" {
                text.push('\n');
                after_space = true;
            } else if c.is_whitespace() {
                if !after_space {
                    text.push(' ');
                    after_space = true;
                }
            } else {
                text.push(c);
                after_space = false;
            }
        }
        if text.is_empty() {
            continue;
        }
        match tidy.last_mut() {
            Some(last) if same_format(last, &run) => last.text.push_str(&text),
            _ => tidy.push(Run { text, ..run }),
        }
    }
    if let Some(last) = tidy.last_mut() {
        let trimmed = last.text.trim_end().to_string();
        last.text = trimmed;
    }
    tidy.retain(|r| !r.text.is_empty());
    tidy
}

fn same_format(a: &Run, b: &Run) -> bool {
    a.bold == b.bold
        && a.italic == b.italic
        && a.monospace == b.monospace
        && a.shading == b.shading
        && a.color == b.color
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rows of `td`/`th` text from every `tr` in the table; rows without cells
/// are dropped.
fn table_rows(table: &NodeRef) -> Vec<Vec<String>> {
    table
        .descendants()
        .filter(|n| dom::is_tag(n, &["tr"]))
        .map(|row| {
            dom::element_children(&row)
                .filter(|c| dom::is_tag(c, &["td", "th"]))
                .map(|cell| dom::normalized_text(&cell))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// The literal `color` the flattener wrote onto an element, as OOXML hex.
fn literal_color(node: &NodeRef) -> Option<String> {
    let style = dom::get_attr(node, "style")?;
    parse_declarations_lenient(&style)
        .into_iter()
        .rev()
        .find(|d| d.name == "color")
        .and_then(|d| Rgb::parse(&d.value))
        .filter(|c| !c.is_transparent())
        .map(|c| c.to_ooxml_hex())
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation
// ─────────────────────────────────────────────────────────────────────────────

/// Options for the DOCX package.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredOptions {
    pub page_size: PageSize,
    /// Written to the core properties
    pub title: Option<String>,
}

/// Walk the prepared clone and package it as DOCX bytes.
///
/// The walk runs in place; packaging runs on the blocking pool over the
/// owned block list.
pub async fn generate(root: &NodeRef, options: &StructuredOptions) -> Result<Vec<u8>> {
    let blocks = collect_blocks(root);
    if blocks.is_empty() {
        return Err(Error::Serialization(
            "No content could be parsed for export".to_string(),
        ));
    }
    debug!("Structured walk produced {} blocks", blocks.len());

    let options = options.clone();
    tokio::task::spawn_blocking(move || {
        build_docx(&blocks, options.page_size, options.title.as_deref())
    })
    .await
    .map_err(|e| Error::conversion("docx", e.to_string()))?
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
