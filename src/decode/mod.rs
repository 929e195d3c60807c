//! Decoder boundary: turns a file into text plus a format/encoding tag.
//!
//! Decoding never fails. Unreadable or unsupported files produce an
//! error-marker text that no point grammar matches, so they simply yield
//! zero points downstream.

pub mod office;
pub mod text;

use std::path::Path;

use tracing::{debug, warn};

const ERROR_MARKER: &str = "❌";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub format_tag: String,
}

impl Decoded {
    fn new(text: String, format_tag: &str) -> Self {
        Decoded {
            text,
            format_tag: format_tag.to_string(),
        }
    }

    fn failure(format_tag: &str, message: &str) -> Self {
        Decoded {
            text: format!("{ERROR_MARKER} {message}"),
            format_tag: format_tag.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.text.starts_with(ERROR_MARKER)
    }
}

/// Lowercased extension with the leading dot (`".docx"`), or `""`.
pub fn file_type(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

pub fn decode(path: &Path) -> Decoded {
    let decoded = match file_type(path).as_str() {
        ".odt" => office::read_odt(path),
        ".docx" => office::read_docx(path),
        ".doc" => office::read_doc(path),
        _ => text::read_text(path),
    };

    if decoded.is_error() {
        warn!("Could not decode {:?} ({})", path, decoded.format_tag);
    } else {
        debug!(path = ?path, format = %decoded.format_tag, chars = decoded.text.chars().count(), "decoded");
    }
    decoded
}
