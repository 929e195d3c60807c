//! ODT and DOCX are zip containers with a single XML body; only the
//! character data is kept, with paragraph ends turned into newlines.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::Decoded;
use crate::error::DecodeError;

/// Element names that map to whitespace in the flattened text.
struct Layout {
    paragraphs: &'static [&'static [u8]],
    line_break: &'static [u8],
    tab: &'static [u8],
    /// ODT `<text:s text:c="N"/>`: run of N spaces.
    spaces: Option<(&'static [u8], &'static [u8])>,
}

const ODT: Layout = Layout {
    paragraphs: &[b"text:p", b"text:h"],
    line_break: b"text:line-break",
    tab: b"text:tab",
    spaces: Some((b"text:s", b"text:c")),
};

const DOCX: Layout = Layout {
    paragraphs: &[b"w:p"],
    line_break: b"w:br",
    tab: b"w:tab",
    spaces: None,
};

pub fn read_odt(path: &Path) -> Decoded {
    match read_entry(path, "content.xml").and_then(|xml| flatten(&xml, &ODT)) {
        Ok(text) => Decoded::new(text, "odt_xml"),
        Err(e) => Decoded::failure("odt_error", &format!("Ошибка чтения .odt файла: {e}")),
    }
}

pub fn read_docx(path: &Path) -> Decoded {
    match read_word(path) {
        Ok(text) if text.trim().is_empty() => Decoded::new(String::new(), "docx_empty"),
        Ok(text) => Decoded::new(text, "docx_clean"),
        Err(e) => Decoded::failure("docx_error", &format!("Ошибка чтения .docx файла: {e}")),
    }
}

/// `.doc` files are often DOCX containers under the old extension. Only a
/// real binary Word file ends up as `doc_error`.
pub fn read_doc(path: &Path) -> Decoded {
    match read_word(path) {
        Ok(text) if text.trim().is_empty() => Decoded::new(String::new(), "doc_empty"),
        Ok(text) => Decoded::new(text, "doc_clean"),
        Err(e) => {
            debug!(path = ?path, error = %e, "not a DOCX container");
            Decoded::failure("doc_error", "Формат .doc не поддерживается")
        }
    }
}

fn read_word(path: &Path) -> Result<String, DecodeError> {
    read_entry(path, "word/document.xml").and_then(|xml| flatten(&xml, &DOCX))
}

fn read_entry(path: &Path, entry: &str) -> Result<String, DecodeError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut file = archive.by_name(entry)?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(xml)
}

fn flatten(xml: &str, layout: &Layout) -> Result<String, DecodeError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| DecodeError::Xml(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::CData(e)) => out.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::Empty(e)) => push_inline(&mut out, &e, layout),
            Ok(Event::End(e)) if layout.paragraphs.contains(&e.name().as_ref()) => {
                out.push('\n');
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DecodeError::Xml(e.to_string())),
            _ => {}
        }
    }

    Ok(out)
}

fn push_inline(out: &mut String, e: &BytesStart, layout: &Layout) {
    let name = e.name();
    let name = name.as_ref();
    if name == layout.line_break || layout.paragraphs.contains(&name) {
        out.push('\n');
    } else if name == layout.tab {
        out.push('\t');
    } else if let Some((tag, count_attr)) = layout.spaces {
        if name == tag {
            let count = e
                .try_get_attribute(count_attr)
                .ok()
                .flatten()
                .and_then(|a| std::str::from_utf8(&a.value).ok()?.parse::<usize>().ok())
                .unwrap_or(1);
            out.push_str(&" ".repeat(count));
        }
    }
}
