//! Minimal OOXML presentation writer.
//!
//! Produces a single-master, single-layout package and draws every slide
//! with explicit text boxes, so no template file is required.

use std::fmt::Write as _;
use std::io::{Cursor, Write as _};

use bytes::Bytes;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::{PRESENTATION_EXTENSION, RenderedDocument, Renderer, filename_stem};
use crate::Result;
use crate::types::{Slide, SlideBody, SlideKind};

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

// 16:9 canvas, in EMU.
const SLIDE_CX: u64 = 12_192_000;
const SLIDE_CY: u64 = 6_858_000;
const MARGIN_X: u64 = 838_200;
const CONTENT_CX: u64 = SLIDE_CX - 2 * MARGIN_X;
const COLUMN_GAP: u64 = 152_400;
const COLUMN_CX: u64 = (CONTENT_CX - COLUMN_GAP) / 2;

/// Placement and typography of a text box.
#[derive(Debug, Clone, Copy)]
struct TextFrame {
    x: u64,
    y: u64,
    cx: u64,
    cy: u64,
    size: u32,
    bold: bool,
    bullets: bool,
}

const COVER_TITLE: TextFrame = TextFrame {
    x: MARGIN_X,
    y: 2_130_425,
    cx: CONTENT_CX,
    cy: 1_470_025,
    size: 4400,
    bold: true,
    bullets: false,
};

const COVER_SUBTITLE: TextFrame = TextFrame {
    x: MARGIN_X,
    y: 3_886_200,
    cx: CONTENT_CX,
    cy: 1_752_600,
    size: 2400,
    bold: false,
    bullets: false,
};

const HEADING: TextFrame = TextFrame {
    x: MARGIN_X,
    y: 365_125,
    cx: CONTENT_CX,
    cy: 1_325_563,
    size: 3600,
    bold: true,
    bullets: false,
};

const BODY: TextFrame = TextFrame {
    x: MARGIN_X,
    y: 1_825_625,
    cx: CONTENT_CX,
    cy: 4_351_338,
    size: 2000,
    bold: false,
    bullets: true,
};

const LEFT_COLUMN: TextFrame = TextFrame {
    cx: COLUMN_CX,
    ..BODY
};

const RIGHT_COLUMN: TextFrame = TextFrame {
    x: MARGIN_X + COLUMN_CX + COLUMN_GAP,
    cx: COLUMN_CX,
    ..BODY
};

/// Renderer producing `.pptx` packages without a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxRenderer {
    _private: (),
}

impl PptxRenderer {
    /// Creates a new renderer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for PptxRenderer {
    fn render(&self, title: &str, slides: &[Slide]) -> Result<RenderedDocument> {
        let cover;
        let slides = if slides.is_empty() {
            cover = [Slide::title(title, "")];
            &cover[..]
        } else {
            slides
        };

        let buffer = write_package(slides)?;
        Ok(RenderedDocument {
            buffer,
            filename: format!("{}.{PRESENTATION_EXTENSION}", filename_stem(title)),
        })
    }

    fn renderer_name(&self) -> &str {
        "pptx"
    }
}

fn write_package(slides: &[Slide]) -> Result<Bytes> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut put = |name: &str, body: &str| -> Result<()> {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
        Ok(())
    };

    put("[Content_Types].xml", &content_types(slides.len()))?;
    put("_rels/.rels", &package_rels())?;
    put("ppt/presentation.xml", &presentation(slides.len()))?;
    put(
        "ppt/_rels/presentation.xml.rels",
        &presentation_rels(slides.len()),
    )?;
    put("ppt/slideMasters/slideMaster1.xml", &slide_master())?;
    put(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        &relationships(&[
            ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
            ("rId2", "theme", "../theme/theme1.xml"),
        ]),
    )?;
    put("ppt/slideLayouts/slideLayout1.xml", &slide_layout())?;
    put(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        &relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
    )?;
    put("ppt/theme/theme1.xml", THEME)?;

    for (index, slide) in slides.iter().enumerate() {
        let number = index + 1;
        put(&format!("ppt/slides/slide{number}.xml"), &slide_xml(slide, index))?;
        put(
            &format!("ppt/slides/_rels/slide{number}.xml.rels"),
            &relationships(&[("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")]),
        )?;
    }

    let cursor = zip.finish()?;
    Ok(Bytes::from(cursor.into_inner()))
}

fn content_types(slide_count: usize) -> String {
    let mut xml = format!(
        "{XML_DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
         <Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>\
         <Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
         <Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>"
    );
    for number in 1..=slide_count {
        let _ = write!(
            xml,
            "<Override PartName=\"/ppt/slides/slide{number}.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
        );
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels() -> String {
    relationships(&[("rId1", "officeDocument", "ppt/presentation.xml")])
}

fn relationships(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = format!("{XML_DECL}<Relationships xmlns=\"{NS_RELS}\">");
    for (id, kind, target) in entries {
        let _ = write!(
            xml,
            "<Relationship Id=\"{id}\" Type=\"{REL_BASE}/{kind}\" Target=\"{target}\"/>"
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn presentation(slide_count: usize) -> String {
    let mut xml = format!(
        "{XML_DECL}<p:presentation xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\">\
         <p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>\
         <p:sldIdLst>"
    );
    for index in 0..slide_count {
        let _ = write!(
            xml,
            "<p:sldId id=\"{}\" r:id=\"rId{}\"/>",
            256 + index,
            index + 3
        );
    }
    let _ = write!(
        xml,
        "</p:sldIdLst><p:sldSz cx=\"{SLIDE_CX}\" cy=\"{SLIDE_CY}\"/>\
         <p:notesSz cx=\"{SLIDE_CY}\" cy=\"{SLIDE_CX}\"/></p:presentation>"
    );
    xml
}

fn presentation_rels(slide_count: usize) -> String {
    let targets: Vec<(String, String)> = (0..slide_count)
        .map(|index| {
            (
                format!("rId{}", index + 3),
                format!("slides/slide{}.xml", index + 1),
            )
        })
        .collect();

    let mut entries = vec![
        ("rId1", "slideMaster", "slideMasters/slideMaster1.xml"),
        ("rId2", "theme", "theme/theme1.xml"),
    ];
    entries.extend(
        targets
            .iter()
            .map(|(id, target)| (id.as_str(), "slide", target.as_str())),
    );
    relationships(&entries)
}

fn empty_tree() -> &'static str {
    "<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"
}

fn slide_master() -> String {
    format!(
        "{XML_DECL}<p:sldMaster xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\">\
         <p:cSld><p:spTree>{}</p:spTree></p:cSld>\
         <p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" \
         accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>\
         <p:sldLayoutIdLst><p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/></p:sldLayoutIdLst>\
         </p:sldMaster>",
        empty_tree()
    )
}

fn slide_layout() -> String {
    format!(
        "{XML_DECL}<p:sldLayout xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\" type=\"blank\" preserve=\"1\">\
         <p:cSld name=\"Blank\"><p:spTree>{}</p:spTree></p:cSld>\
         <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>",
        empty_tree()
    )
}

fn slide_xml(slide: &Slide, index: usize) -> String {
    let heading = slide.heading(index);
    let mut shapes = String::new();

    match slide.slide_type {
        SlideKind::Title => {
            text_box(&mut shapes, 2, "Title", COVER_TITLE, &[heading.as_ref()]);
            let subtitle = slide.subtitle.as_deref().unwrap_or_default();
            if !subtitle.is_empty() {
                text_box(&mut shapes, 3, "Subtitle", COVER_SUBTITLE, &subtitle.lines().collect::<Vec<_>>());
            }
        }
        SlideKind::Content => {
            text_box(&mut shapes, 2, "Title", HEADING, &[heading.as_ref()]);
            text_box(&mut shapes, 3, "Content", BODY, &paragraphs(slide.content.as_ref()));
        }
        SlideKind::TwoColumn => {
            text_box(&mut shapes, 2, "Title", HEADING, &[heading.as_ref()]);
            text_box(&mut shapes, 3, "Left", LEFT_COLUMN, &paragraphs(slide.left_content.as_ref()));
            text_box(&mut shapes, 4, "Right", RIGHT_COLUMN, &paragraphs(slide.right_content.as_ref()));
        }
    }

    format!(
        "{XML_DECL}<p:sld xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\">\
         <p:cSld><p:spTree>{}{shapes}</p:spTree></p:cSld>\
         <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>",
        empty_tree()
    )
}

fn paragraphs(body: Option<&SlideBody>) -> Vec<&str> {
    body.map(SlideBody::paragraphs).unwrap_or_default()
}

fn text_box(out: &mut String, id: u32, name: &str, frame: TextFrame, lines: &[&str]) {
    let _ = write!(
        out,
        "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"{name}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
         <p:spPr><a:xfrm><a:off x=\"{}\" y=\"{}\"/><a:ext cx=\"{}\" cy=\"{}\"/></a:xfrm>\
         <a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr>\
         <p:txBody><a:bodyPr wrap=\"square\"><a:normAutofit/></a:bodyPr><a:lstStyle/>",
        frame.x, frame.y, frame.cx, frame.cy
    );

    let bold = if frame.bold { " b=\"1\"" } else { "" };
    let mut written = 0;
    for line in lines.iter().map(|line| line.trim()).filter(|line| !line.is_empty()) {
        out.push_str("<a:p>");
        if frame.bullets {
            out.push_str("<a:pPr marL=\"342900\" indent=\"-342900\"><a:buChar char=\"&#8226;\"/></a:pPr>");
        }
        let _ = write!(
            out,
            "<a:r><a:rPr lang=\"en-US\" sz=\"{}\"{bold} dirty=\"0\"/><a:t>{}</a:t></a:r></a:p>",
            frame.size,
            escape(line)
        );
        written += 1;
    }
    if written == 0 {
        out.push_str("<a:p><a:endParaRPr lang=\"en-US\" dirty=\"0\"/></a:p>");
    }

    out.push_str("</p:txBody></p:sp>");
}

/// Escapes XML text, dropping characters XML 1.0 cannot carry.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' => escaped.push(c),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

const THEME: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Deckflow">"#,
    r#"<a:themeElements>"#,
    r#"<a:clrScheme name="Deckflow">"#,
    r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>"#,
    r#"<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#,
    r#"<a:dk2><a:srgbClr val="1F2937"/></a:dk2>"#,
    r#"<a:lt2><a:srgbClr val="F3F4F6"/></a:lt2>"#,
    r#"<a:accent1><a:srgbClr val="2563EB"/></a:accent1>"#,
    r#"<a:accent2><a:srgbClr val="059669"/></a:accent2>"#,
    r#"<a:accent3><a:srgbClr val="D97706"/></a:accent3>"#,
    r#"<a:accent4><a:srgbClr val="DC2626"/></a:accent4>"#,
    r#"<a:accent5><a:srgbClr val="7C3AED"/></a:accent5>"#,
    r#"<a:accent6><a:srgbClr val="0891B2"/></a:accent6>"#,
    r#"<a:hlink><a:srgbClr val="1D4ED8"/></a:hlink>"#,
    r#"<a:folHlink><a:srgbClr val="6D28D9"/></a:folHlink>"#,
    r#"</a:clrScheme>"#,
    r#"<a:fontScheme name="Deckflow">"#,
    r#"<a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
    r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
    r#"</a:fontScheme>"#,
    r#"<a:fmtScheme name="Deckflow">"#,
    r#"<a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst>"#,
    r#"<a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst>"#,
    r#"<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>"#,
    r#"<a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst>"#,
    r#"</a:fmtScheme>"#,
    r#"</a:themeElements>"#,
    r#"</a:theme>"#,
);
