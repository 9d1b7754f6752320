//! DOCX Packaging
//!
//! Serializes a block list into WordprocessingML and zips it into a minimal
//! package: content types, relationships, the main document, styles,
//! numbering definitions and core properties.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{Block, Run, CODE_SHADING};
use crate::config::PageSize;
use crate::error::{Error, Result};

/// Page margin on every side, in twips.
pub const PAGE_MARGIN_TWIPS: u32 = 720;

const MONO_FONT: &str = "Courier New";

/// Table width in fiftieths of a percent.
const FULL_WIDTH_PCT: u32 = 5000;

/// `numId` of the bullet list definition; ordered lists get their own ids
/// after it so each restarts at 1.
const BULLET_NUM_ID: usize = 1;

/// Spacing before/after each heading level, in twips.
const HEADING_SPACING: [(u32, u32); 6] = [
    (400, 200),
    (360, 180),
    (320, 160),
    (280, 140),
    (240, 120),
    (200, 100),
];

/// Heading sizes in half-points.
const HEADING_SIZES: [u32; 6] = [48, 40, 32, 28, 24, 22];

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
  <Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/>
  <Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
</Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>
</Relationships>"#;

/// Package `blocks` as a DOCX file.
pub fn build_docx(blocks: &[Block], page_size: PageSize, title: Option<&str>) -> Result<Vec<u8>> {
    let mut writer = DocumentWriter::new(page_size);
    for block in blocks {
        writer.block(block);
    }
    let ordered_lists = writer.ordered_lists;
    let document = writer.finish();

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, String); 7] = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", PACKAGE_RELS.to_string()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
            ("word/document.xml", document),
            ("word/styles.xml", styles_xml()),
            ("word/numbering.xml", numbering_xml(ordered_lists)),
            ("docProps/core.xml", core_xml(title)),
        ];
        for (name, contents) in parts {
            check_well_formed(name, &contents)?;
            zip.start_file(name, options)?;
            zip.write_all(contents.as_bytes())?;
        }
        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

// ─────────────────────────────────────────────────────────────────────────────
// Main document
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct DocumentWriter {
    page_size: PageSize,
    output: String,
    /// Ordered lists started so far
    ordered_lists: usize,
    /// Identity of the ordered list being written, if any
    current_list: Option<usize>,
}

impl DocumentWriter {
    fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            output: String::new(),
            ordered_lists: 0,
            current_list: None,
        }
    }

    /// Width between the side margins, in twips.
    fn text_width(&self) -> u32 {
        self.page_size.width_twips() - 2 * PAGE_MARGIN_TWIPS
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Heading { level, text, color } => self.heading(*level, text, color.as_deref()),
            Block::Paragraph { runs } => {
                self.output
                    .push_str("<w:p><w:pPr><w:spacing w:after=\"200\"/></w:pPr>");
                for run in runs {
                    self.run(run, None);
                }
                self.output.push_str("</w:p>\n");
            }
            Block::Preformatted { text } => {
                self.output.push_str(&format!(
                    "<w:p><w:pPr><w:shd w:val=\"clear\" w:color=\"auto\" w:fill=\"{}\"/><w:spacing w:before=\"200\" w:after=\"200\"/></w:pPr>",
                    CODE_SHADING
                ));
                let run = Run {
                    text: text.clone(),
                    monospace: true,
                    ..Default::default()
                };
                self.run(&run, Some(20));
                self.output.push_str("</w:p>\n");
            }
            Block::Quote { text } => {
                self.output.push_str(
                    "<w:p><w:pPr><w:spacing w:before=\"200\" w:after=\"200\"/><w:ind w:left=\"720\"/></w:pPr>",
                );
                self.run(&Run::italic(text.clone()), None);
                self.output.push_str("</w:p>\n");
            }
            Block::ListItem {
                text,
                ordered,
                list,
            } => {
                let num_id = if *ordered {
                    if self.current_list != Some(*list) {
                        self.ordered_lists += 1;
                        self.current_list = Some(*list);
                    }
                    BULLET_NUM_ID + self.ordered_lists
                } else {
                    BULLET_NUM_ID
                };
                self.output.push_str(&format!(
                    "<w:p><w:pPr><w:pStyle w:val=\"ListParagraph\"/><w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"{}\"/></w:numPr></w:pPr>",
                    num_id
                ));
                self.run(&Run::plain(text.clone()), None);
                self.output.push_str("</w:p>\n");
            }
            Block::Table { rows } => self.table(rows),
            Block::Break => self.output.push_str("<w:p/>\n"),
            Block::Rule => self.output.push_str(
                "<w:p><w:pPr><w:pBdr><w:bottom w:val=\"single\" w:sz=\"6\" w:space=\"1\" w:color=\"auto\"/></w:pBdr></w:pPr></w:p>\n",
            ),
        }
    }

    fn heading(&mut self, level: u8, text: &str, color: Option<&str>) {
        let index = (level.clamp(1, 6) - 1) as usize;
        let (before, after) = HEADING_SPACING[index];
        self.output.push_str(&format!(
            "<w:p><w:pPr><w:pStyle w:val=\"Heading{}\"/><w:spacing w:before=\"{}\" w:after=\"{}\"/></w:pPr>",
            index + 1,
            before,
            after
        ));
        let run = Run {
            bold: true,
            color: color.map(str::to_string),
            ..Run::plain(text)
        };
        self.run(&run, Some(HEADING_SIZES[index]));
        self.output.push_str("</w:p>\n");
    }

    fn run(&mut self, run: &Run, size: Option<u32>) {
        self.output.push_str("<w:r>");
        let mut props = String::new();
        if run.monospace {
            props.push_str(&format!(
                "<w:rFonts w:ascii=\"{0}\" w:hAnsi=\"{0}\" w:cs=\"{0}\"/>",
                MONO_FONT
            ));
        }
        if run.bold {
            props.push_str("<w:b/>");
        }
        if run.italic {
            props.push_str("<w:i/>");
        }
        if let Some(color) = &run.color {
            props.push_str(&format!("<w:color w:val=\"{}\"/>", escape_xml(color)));
        }
        if let Some(size) = size {
            props.push_str(&format!("<w:sz w:val=\"{0}\"/><w:szCs w:val=\"{0}\"/>", size));
        }
        if let Some(fill) = &run.shading {
            props.push_str(&format!(
                "<w:shd w:val=\"clear\" w:color=\"auto\" w:fill=\"{}\"/>",
                escape_xml(fill)
            ));
        }
        if !props.is_empty() {
            self.output.push_str("<w:rPr>");
            self.output.push_str(&props);
            self.output.push_str("</w:rPr>");
        }
        for (i, line) in run.text.split('\n').enumerate() {
            if i > 0 {
                self.output.push_str("<w:br/>");
            }
            if !line.is_empty() {
                self.output.push_str(&format!(
                    "<w:t xml:space=\"preserve\">{}</w:t>",
                    escape_xml(line)
                ));
            }
        }
        self.output.push_str("</w:r>");
    }

    fn table(&mut self, rows: &[Vec<String>]) {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
        self.output.push_str("<w:tbl>\n<w:tblPr>");
        self.output.push_str(&format!(
            "<w:tblW w:w=\"{}\" w:type=\"pct\"/>",
            FULL_WIDTH_PCT
        ));
        self.output.push_str(
            "<w:tblBorders><w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/><w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/><w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/><w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/><w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/><w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/></w:tblBorders>",
        );
        self.output.push_str("</w:tblPr>\n<w:tblGrid>");
        let grid_width = self.text_width() as usize / columns;
        for _ in 0..columns {
            self.output
                .push_str(&format!("<w:gridCol w:w=\"{}\"/>", grid_width));
        }
        self.output.push_str("</w:tblGrid>\n");

        for row in rows {
            let cell_width = FULL_WIDTH_PCT as usize / row.len().max(1);
            self.output.push_str("<w:tr>");
            for cell in row {
                self.output.push_str(&format!(
                    "<w:tc><w:tcPr><w:tcW w:w=\"{}\" w:type=\"pct\"/></w:tcPr><w:p>",
                    cell_width
                ));
                if !cell.is_empty() {
                    self.run(&Run::plain(cell.clone()), None);
                }
                self.output.push_str("</w:p></w:tc>");
            }
            self.output.push_str("</w:tr>\n");
        }
        self.output.push_str("</w:tbl>\n");
    }

    fn finish(self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<w:body>
{body}<w:sectPr><w:pgSz w:w="{width}" w:h="{height}"/><w:pgMar w:top="{margin}" w:right="{margin}" w:bottom="{margin}" w:left="{margin}" w:header="{margin}" w:footer="{margin}" w:gutter="0"/></w:sectPr>
</w:body>
</w:document>"#,
            body = self.output,
            width = self.page_size.width_twips(),
            height = self.page_size.height_twips(),
            margin = PAGE_MARGIN_TWIPS,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Package parts
// ─────────────────────────────────────────────────────────────────────────────

fn styles_xml() -> String {
    let mut headings = String::new();
    for (i, size) in HEADING_SIZES.iter().enumerate() {
        let level = i + 1;
        headings.push_str(&format!(
            r#"  <w:style w:type="paragraph" w:styleId="Heading{level}">
    <w:name w:val="heading {level}"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:qFormat/>
    <w:pPr><w:keepNext/><w:outlineLvl w:val="{outline}"/></w:pPr>
    <w:rPr><w:b/><w:sz w:val="{size}"/><w:szCs w:val="{size}"/></w:rPr>
  </w:style>
"#,
            level = level,
            outline = i,
            size = size
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:docDefaults>
    <w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="22"/><w:szCs w:val="22"/></w:rPr></w:rPrDefault>
    <w:pPrDefault><w:pPr><w:spacing w:after="0" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault>
  </w:docDefaults>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:qFormat/>
  </w:style>
{headings}  <w:style w:type="paragraph" w:styleId="ListParagraph">
    <w:name w:val="List Paragraph"/>
    <w:basedOn w:val="Normal"/>
    <w:pPr><w:spacing w:after="60"/><w:ind w:left="720"/></w:pPr>
  </w:style>
</w:styles>"#,
        headings = headings
    )
}

fn numbering_xml(ordered_lists: usize) -> String {
    let mut nums = format!(
        "  <w:num w:numId=\"{}\"><w:abstractNumId w:val=\"0\"/></w:num>\n",
        BULLET_NUM_ID
    );
    for i in 1..=ordered_lists {
        nums.push_str(&format!(
            "  <w:num w:numId=\"{}\"><w:abstractNumId w:val=\"1\"/><w:lvlOverride w:ilvl=\"0\"><w:startOverride w:val=\"1\"/></w:lvlOverride></w:num>\n",
            BULLET_NUM_ID + i
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:abstractNum w:abstractNumId="0">
    <w:multiLevelType w:val="singleLevel"/>
    <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl>
  </w:abstractNum>
  <w:abstractNum w:abstractNumId="1">
    <w:multiLevelType w:val="singleLevel"/>
    <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl>
  </w:abstractNum>
{nums}</w:numbering>"#,
        nums = nums
    )
}

fn core_xml(title: Option<&str>) -> String {
    let title = title
        .filter(|t| !t.trim().is_empty())
        .map(|t| format!("<dc:title>{}</dc:title>", escape_xml(t)))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">{title}<dc:creator>mdexport</dc:creator></cp:coreProperties>"#,
        title = title
    )
}

/// Read a part through once so a malformed part fails here instead of in
/// the word processor.
fn check_well_formed(name: &str, xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = true;
    let mut depth: usize = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) if depth == 0 => return Ok(()),
            Ok(Event::Eof) => {
                return Err(Error::conversion(
                    "docx",
                    format!("{}: {} unclosed elements", name, depth),
                ))
            }
            Ok(_) => {}
            Err(e) => {
                return Err(Error::conversion(
                    "docx",
                    format!("{} is not well-formed at {}: {}", name, reader.buffer_position(), e),
                ))
            }
        }
    }
}

/// Escape XML special characters and drop characters XML 1.0 forbids.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
