//! Per-format metadata decoders and the extension dispatch table.
//!
//! Every decoder reads a `Read + Seek` stream and returns the [`Tags`] it can
//! determine. Filesystem facts (name, size, dates) are added separately by
//! [`generic::filesystem_tags`] so the decoders only deal with bytes.

// Format-specific modules
pub mod bmp;
pub mod generic;
mod genres;
pub mod id3;
pub mod mp4;
pub mod png;
mod reader;

use std::io::{Read, Seek};
use std::path::Path;

use crate::error::DecodeResult;
use crate::types::{MediaKind, Tags};

pub use generic::filesystem_tags;

/// Closed set of decoder families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoder {
    Bmp,
    Png,
    Mp4,
    Id3,
    Generic,
}

impl Decoder {
    /// Decode the tags carried inside the stream
    pub fn decode<R: Read + Seek>(&self, reader: &mut R) -> DecodeResult<Tags> {
        match self {
            Self::Bmp => bmp::decode(reader),
            Self::Png => png::decode(reader),
            Self::Mp4 => mp4::decode(reader),
            Self::Id3 => id3::decode(reader),
            Self::Generic => Ok(Tags::new()),
        }
    }
}

/// Extension → (decoder, kind) table, matched case-insensitively
const DECODERS: &[(&str, Decoder, MediaKind)] = &[
    ("bmp", Decoder::Bmp, MediaKind::Image),
    ("dib", Decoder::Bmp, MediaKind::Image),
    ("png", Decoder::Png, MediaKind::Image),
    ("jpg", Decoder::Generic, MediaKind::Image),
    ("jpeg", Decoder::Generic, MediaKind::Image),
    ("gif", Decoder::Generic, MediaKind::Image),
    ("tif", Decoder::Generic, MediaKind::Image),
    ("tiff", Decoder::Generic, MediaKind::Image),
    ("heic", Decoder::Generic, MediaKind::Image),
    ("webp", Decoder::Generic, MediaKind::Image),
    ("mp4", Decoder::Mp4, MediaKind::Video),
    ("m4v", Decoder::Mp4, MediaKind::Video),
    ("mov", Decoder::Mp4, MediaKind::Video),
    ("avi", Decoder::Generic, MediaKind::Video),
    ("mkv", Decoder::Generic, MediaKind::Video),
    ("wmv", Decoder::Generic, MediaKind::Video),
    ("mpg", Decoder::Generic, MediaKind::Video),
    ("mpeg", Decoder::Generic, MediaKind::Video),
    ("webm", Decoder::Generic, MediaKind::Video),
    ("m4a", Decoder::Mp4, MediaKind::Music),
    ("m4b", Decoder::Mp4, MediaKind::Music),
    ("m4p", Decoder::Mp4, MediaKind::Music),
    ("mp3", Decoder::Id3, MediaKind::Music),
    ("wav", Decoder::Generic, MediaKind::Audio),
    ("flac", Decoder::Generic, MediaKind::Audio),
    ("ogg", Decoder::Generic, MediaKind::Audio),
    ("aac", Decoder::Generic, MediaKind::Audio),
    ("wma", Decoder::Generic, MediaKind::Audio),
    ("aiff", Decoder::Generic, MediaKind::Audio),
];

/// Decoder registered for the extension of `path`, if any
pub fn lookup(path: &Path) -> Option<(Decoder, MediaKind)> {
    let ext = path.extension()?.to_str()?;
    DECODERS
        .iter()
        .find(|(known, _, _)| known.eq_ignore_ascii_case(ext))
        .map(|&(_, decoder, kind)| (decoder, kind))
}

/// Decoder for `path`, falling back to the generic one for unknown extensions
pub fn lookup_or_generic(path: &Path) -> (Decoder, MediaKind) {
    lookup(path).unwrap_or((Decoder::Generic, MediaKind::GenericFile))
}

/// Returns if the given path has an extension claimed by a decoder
pub fn has_known_extension(path: &Path) -> bool {
    lookup(path).is_some()
}
