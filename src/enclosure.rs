//! Enclosure attribute parsing.
//!
//! Feeds store enclosures as `uri[@]mime[@]size`. Parsing is best-effort:
//! callers fall back to opening the raw value when it fails.

use thiserror::Error;

pub const ENCLOSURE_SEPARATOR: &str = "[@]";

/// Enclosures shorter than this are treated as absent.
pub const MIN_ENCLOSURE_LEN: usize = 7;

const IMAGE_ENCLOSURE_MARKER: &str = "[@]image/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnclosureError {
    #[error("Enclosure has no type separator: {0}")]
    MissingSeparator(String),
    #[error("Enclosure has an empty uri")]
    EmptyUri,
}

/// Parsed enclosure reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure<'a> {
    pub uri: &'a str,
    pub mime_type: &'a str,
}

impl<'a> Enclosure<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, EnclosureError> {
        let (uri, rest) = raw
            .split_once(ENCLOSURE_SEPARATOR)
            .ok_or_else(|| EnclosureError::MissingSeparator(raw.to_string()))?;
        if uri.is_empty() {
            return Err(EnclosureError::EmptyUri);
        }
        let mime_type = rest
            .split_once(ENCLOSURE_SEPARATOR)
            .map_or(rest, |(mime, _)| mime);
        Ok(Self { uri, mime_type })
    }
}

/// Whether an entry's enclosure deserves its own button in the document.
///
/// Image enclosures are shown inline by the feed body, so they get none.
pub fn is_displayable(raw: Option<&str>) -> bool {
    raw.is_some_and(|e| e.len() >= MIN_ENCLOSURE_LEN && !e.contains(IMAGE_ENCLOSURE_MARKER))
}
