//! Markdown rendering module
//!
//! This module turns Markdown source into the styled preview page the
//! exporters work from, using the comrak library, a CommonMark + GFM
//! compatible parser.
//!
//! # Features
//! - Render markdown to HTML (tables, strikethrough, task lists, footnotes)
//! - YAML front matter metadata
//! - Preview page with utility classes and `dark:` variants
//! - Mermaid fences rendered as diagram containers
//!
//! # Example
//! ```ignore
//! use crate::markdown::render_preview;
//!
//! let preview = render_preview("# Hello\n\nThis is **bold** text.", Theme::Dark, "markdown-preview");
//! let root = preview.document.element_by_id("markdown-preview");
//! ```

mod parser;
mod preview;

pub use parser::{render_to_html, split_front_matter, FrontMatter, MarkdownOptions};
pub use preview::{load_html_page, render_preview, Preview};
