//! Pack assembler
//!
//! Takes the qualified stamps in source-path order and writes them into a
//! fresh in-memory zip, renamed to `<base>_<ordinal>.<ext>` under one
//! branded root folder. Stamp bytes are written through unchanged so the
//! pack never suffers recompression artifacts.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

use crate::convert::qualifier::QualifiedImage;
use crate::types::{ConvertError, Result};

/// The assembled output archive.
#[derive(Debug)]
pub struct OutputPack {
    /// Zip container bytes
    pub bytes: Vec<u8>,
    /// `<brand>_<base>.zip`
    pub file_name: String,
    /// Number of stamps packed
    pub stamp_count: usize,
}

/// Reduce an upload filename stem to a zip-safe token.
///
/// ASCII alphanumerics, `-` and `_` survive; whitespace runs collapse to a
/// single `_`; everything else is dropped. An empty survivor falls back to
/// `brushset`.
pub fn sanitize_base_name(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut last_was_space = false;

    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
            last_was_space = false;
        } else if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push('_');
            }
            last_was_space = true;
        }
        // Anything else: dropped
    }

    let trimmed = out.trim_matches('_').to_string();
    if trimmed.is_empty() {
        "brushset".to_string()
    } else {
        trimmed
    }
}

/// Extension for a packed stamp, preserved from its source encoding.
fn stamp_extension(source_path: &str) -> &'static str {
    let lower = source_path.to_lowercase();
    if lower.ends_with(".jpeg") {
        "jpeg"
    } else if lower.ends_with(".jpg") {
        "jpg"
    } else {
        "png"
    }
}

/// Assemble qualified stamps into one output pack.
///
/// `images` must already be in source-path order; ordinals are assigned
/// 1-based and contiguous. Fails with [`ConvertError::EmptyResult`] when
/// there is nothing to pack.
pub fn assemble_pack(
    images: &[QualifiedImage],
    base_name: &str,
    brand_prefix: &str,
    min_px: u32,
) -> Result<OutputPack> {
    if images.is_empty() {
        return Err(ConvertError::EmptyResult(min_px));
    }

    let base = sanitize_base_name(base_name);
    let root = format!("{}_{}", brand_prefix, base);

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        // Stamps are already compressed image formats; store them as-is.
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        for (i, img) in images.iter().enumerate() {
            let name = format!(
                "{}/{}_{}.{}",
                root,
                base,
                i + 1,
                stamp_extension(&img.source_path)
            );
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| ConvertError::Internal(format!("zip write failed: {}", e)))?;
            writer
                .write_all(&img.bytes)
                .map_err(|e| ConvertError::Internal(format!("zip write failed: {}", e)))?;
        }

        writer
            .finish()
            .map_err(|e| ConvertError::Internal(format!("zip finish failed: {}", e)))?;
    }

    Ok(OutputPack {
        bytes: cursor.into_inner(),
        file_name: format!("{}.zip", root),
        stamp_count: images.len(),
    })
}
