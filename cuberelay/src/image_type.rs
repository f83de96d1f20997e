//! Image type detection for uploaded faces.
//!
//! A face's type is resolved from three sources, in priority order:
//!
//! 1. the `Content-Type` declared on the multipart part,
//! 2. the extension of the part's filename,
//! 3. the leading magic bytes of the payload.
//!
//! A declared type is authoritative when present. Clients that do not know the
//! type usually send `application/octet-stream`, so that value (and an empty
//! header) is treated as "not declared" and resolution falls through.

use mime_guess::mime::{self, Mime};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Number of leading bytes needed for magic byte sniffing.
pub const SNIFF_LEN: usize = 12;

/// The image formats the solving backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    pub const ALL: [ImageKind; 4] = [ImageKind::Jpeg, ImageKind::Png, ImageKind::Gif, ImageKind::Webp];

    /// Shown to users when a file is rejected.
    pub const SUPPORTED_LABEL: &'static str = "JPG, PNG, GIF, WebP";

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }

    /// Preferred file extension (`jpg` rather than `jpeg`).
    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }

    /// Match a MIME type (parameters and case ignored) against the supported set.
    pub fn from_mime(value: &str) -> Option<Self> {
        let parsed: Mime = value.trim().parse().ok()?;
        Self::from_essence(parsed.essence_str())
    }

    fn from_essence(essence: &str) -> Option<Self> {
        let essence = essence.to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.mime_type() == essence)
    }

    /// Guess from a filename's extension. Only `jpg`, `jpeg`, `png`, `gif` and `webp` count;
    /// aliases such as `jfif` fall through to magic bytes.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpeg" => Some(ImageKind::Jpeg),
            ext => Self::ALL.into_iter().find(|kind| kind.extension() == ext),
        }
    }

    /// Recognise a payload from its first bytes.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        match head {
            [0xFF, 0xD8, ..] => Some(ImageKind::Jpeg),
            [0x89, 0x50, ..] => Some(ImageKind::Png),
            [0x47, 0x49, ..] => Some(ImageKind::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageKind::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Which source produced a resolved type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSource {
    Declared,
    Extension,
    MagicBytes,
}

/// No source yielded a supported type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// The declared type that was rejected, if one was authoritative.
    pub got: Option<String>,
}

/// Resolve a part's image type using declared type, then extension, then magic bytes.
pub fn resolve(declared: Option<&str>, file_name: Option<&str>, head: &[u8]) -> Result<(ImageKind, TypeSource), Unresolved> {
    if let Some(declared) = declared.map(str::trim).filter(|d| is_declared(d)) {
        return ImageKind::from_mime(declared)
            .map(|kind| (kind, TypeSource::Declared))
            .ok_or_else(|| Unresolved {
                got: Some(declared.to_string()),
            });
    }

    if let Some(kind) = file_name.and_then(ImageKind::from_file_name) {
        return Ok((kind, TypeSource::Extension));
    }

    ImageKind::sniff(head)
        .map(|kind| (kind, TypeSource::MagicBytes))
        .ok_or(Unresolved { got: None })
}

fn is_declared(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    match value.parse::<Mime>() {
        Ok(m) => m.essence_str() != mime::APPLICATION_OCTET_STREAM.essence_str(),
        Err(_) => true,
    }
}
