//! Image qualifier
//!
//! Decodes just enough of each candidate entry to learn its pixel
//! dimensions, then applies the minimum-resolution policy. A candidate
//! that fails to decode is skipped, never fatal.

use std::io::Cursor;

use image::ImageReader;
use tracing::trace;

use crate::convert::inspector::CandidateEntry;

/// A candidate that passed the resolution policy.
#[derive(Debug, Clone)]
pub struct QualifiedImage {
    /// Source path inside the container (ordering key)
    pub source_path: String,
    /// Decoded pixel width
    pub width: u32,
    /// Decoded pixel height
    pub height: u32,
    /// Original encoded bytes, written through unchanged
    pub bytes: Vec<u8>,
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Decode failure: corrupt bytes or unsupported format
    NotAnImage,
    /// Either dimension below the floor
    TooSmall { width: u32, height: u32 },
}

/// Apply the minimum-dimension policy to one candidate.
///
/// Only the image header is read to determine dimensions; the encoded
/// bytes are carried through untouched so the output pack never
/// recompresses stamps.
pub fn qualify(entry: CandidateEntry, min_px: u32) -> Result<QualifiedImage, Rejection> {
    let reader = ImageReader::new(Cursor::new(&entry.bytes))
        .with_guessed_format()
        .map_err(|_| Rejection::NotAnImage)?;

    let (width, height) = reader.into_dimensions().map_err(|_| Rejection::NotAnImage)?;

    if width < min_px || height < min_px {
        trace!(path = %entry.path, width, height, "stamp below resolution floor");
        return Err(Rejection::TooSmall { width, height });
    }

    Ok(QualifiedImage {
        source_path: entry.path,
        width,
        height,
        bytes: entry.bytes,
    })
}
