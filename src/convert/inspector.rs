//! Archive inspector
//!
//! Opens the uploaded container as a zip archive in memory and enumerates
//! the entries that could be brush stamps. No temp-dir extraction: the
//! archive is read straight from the request buffer.

use std::io::{Cursor, Read};

use tracing::debug;

use crate::types::{ConvertError, Result};

/// One entry pulled out of the uploaded container.
///
/// Exists only for the duration of a single pipeline run.
#[derive(Debug, Clone)]
pub struct CandidateEntry {
    /// Entry path inside the container, as stored
    pub path: String,
    /// Raw encoded bytes of the entry
    pub bytes: Vec<u8>,
}

/// Raster extensions that may hold a brush stamp
const STAMP_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

/// Container cover-thumbnail convention; never a stamp
const COVER_THUMBNAIL: &str = "artwork.png";

/// macOS resource-fork directory prefix inside zips
const MACOS_RESOURCE_PREFIX: &str = "__macosx/";

/// Initial per-entry buffer size. Declared sizes in the central directory
/// are attacker controlled and must not drive allocation.
const ENTRY_BUFFER_CAPACITY: u64 = 64 * 1024;

/// Decide whether an entry path is worth decoding at all.
fn is_candidate_path(path: &str) -> bool {
    let lower = path.to_lowercase();

    if !STAMP_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }
    if lower.contains(COVER_THUMBNAIL) {
        return false;
    }
    if lower.starts_with(MACOS_RESOURCE_PREFIX) || lower.contains("/._") || lower.starts_with("._") {
        return false;
    }

    true
}

/// Enumerate candidate image entries from the uploaded container bytes.
///
/// Returns entries sorted by path lexical order so downstream ordinal
/// assignment is deterministic for identical input. Fails with
/// [`ConvertError::CorruptArchive`] when the bytes are not a valid zip, and
/// with [`ConvertError::InvalidInput`] when the entries decompress to more
/// than `max_unpacked_bytes` in total (zip-bomb guard).
pub fn inspect_archive(data: &[u8], max_unpacked_bytes: u64) -> Result<Vec<CandidateEntry>> {
    let reader = Cursor::new(data);
    let mut archive = zip::ZipArchive::new(reader)?;

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| is_candidate_path(name))
        .map(|name| name.to_string())
        .collect();
    names.sort();

    let mut remaining = max_unpacked_bytes;
    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let mut file = archive.by_name(&name)?;
        if !file.is_file() {
            continue;
        }
        let mut bytes = Vec::with_capacity(file.size().min(ENTRY_BUFFER_CAPACITY) as usize);
        // Reading one byte past the budget distinguishes "exactly at the
        // limit" from "over it" without decompressing the whole entry.
        let read = (&mut file)
            .take(remaining.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|_| ConvertError::CorruptArchive)? as u64;
        if read > remaining {
            return Err(ConvertError::InvalidInput(format!(
                "Brushset contents expand beyond the {} MB limit.",
                max_unpacked_bytes / (1024 * 1024)
            )));
        }
        remaining -= read;
        entries.push(CandidateEntry { path: name, bytes });
    }

    debug!(candidates = entries.len(), "archive inspected");

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Roomy budget for tests not concerned with expansion limits.
    const BUDGET: u64 = 16 * 1024 * 1024;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            for (name, data) in entries {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn rejects_non_zip_bytes() {
        let err = inspect_archive(b"definitely not a zip", BUDGET).unwrap_err();
        assert!(matches!(err, ConvertError::CorruptArchive));
    }

    #[test]
    fn rejects_empty_bytes() {
        assert!(matches!(
            inspect_archive(&[], BUDGET).unwrap_err(),
            ConvertError::CorruptArchive
        ));
    }

    #[test]
    fn filters_by_extension() {
        let zip = build_zip(&[
            ("brush.png", b"a"),
            ("photo.JPG", b"b"),
            ("pic.jpeg", b"c"),
            ("meta.plist", b"d"),
            ("readme.txt", b"e"),
        ]);
        let entries = inspect_archive(&zip, BUDGET).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["brush.png", "photo.JPG", "pic.jpeg"]);
    }

    #[test]
    fn excludes_cover_thumbnail_anywhere_in_path() {
        let zip = build_zip(&[
            ("stamp.png", b"a"),
            ("Artwork.png", b"b"),
            ("cover/artwork.png", b"c"),
        ]);
        let entries = inspect_archive(&zip, BUDGET).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "stamp.png");
    }

    #[test]
    fn excludes_macos_resource_forks() {
        let zip = build_zip(&[
            ("__MACOSX/stamp.png", b"a"),
            ("dir/._stamp.png", b"b"),
            ("._top.png", b"c"),
            ("real.png", b"d"),
        ]);
        let entries = inspect_archive(&zip, BUDGET).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "real.png");
    }

    #[test]
    fn entries_come_back_in_lexical_path_order() {
        let zip = build_zip(&[("z.png", b"z"), ("a.png", b"a"), ("m/b.jpg", b"m")]);
        let entries = inspect_archive(&zip, BUDGET).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.png", "m/b.jpg", "z.png"]);
    }

    #[test]
    fn entry_bytes_pass_through() {
        let zip = build_zip(&[("a.png", b"payload-bytes")]);
        let entries = inspect_archive(&zip, BUDGET).unwrap();
        assert_eq!(entries[0].bytes, b"payload-bytes");
    }

    #[test]
    fn enforces_decompressed_size_budget() {
        // Zero-filled payloads deflate to almost nothing, so a tiny upload
        // can expand far past its wire size.
        let payload = vec![0u8; 8 * 1024];
        let zip = build_zip(&[("a.png", &payload), ("b.png", &payload)]);

        let err = inspect_archive(&zip, 4 * 1024).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput(_)));

        // The same archive passes once the budget covers both entries.
        let entries = inspect_archive(&zip, 16 * 1024).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn budget_counts_across_entries() {
        // Each entry fits alone; together they exceed the budget.
        let payload = vec![0u8; 3 * 1024];
        let zip = build_zip(&[("a.png", &payload), ("b.png", &payload)]);

        assert!(inspect_archive(&zip, 4 * 1024).is_err());
    }
}
