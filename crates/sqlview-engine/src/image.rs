//! Pre-checks on database file images before they reach the engine
//!
//! `sqlite3_deserialize` accepts any buffer and only fails on the first page
//! read, with a generic "file is not a database".

use crate::error::{EngineError, EngineResult};
use tracing::debug;

/// Magic string at offset 0 of every SQLite database file
pub const HEADER_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Size of the database file header
pub const HEADER_LEN: usize = 100;

const WRITE_VERSION_OFFSET: usize = 18;
const READ_VERSION_OFFSET: usize = 19;
const JOURNAL_LEGACY: u8 = 1;
const JOURNAL_WAL: u8 = 2;

/// Validate an image and normalize it for the in-memory VFS
///
/// Images written in WAL mode carry file-format version 2 at offsets 18/19.
/// The memory VFS has no WAL support, so those bytes are reset to the legacy
/// rollback-journal value. Page content is unaffected.
pub fn prepare(mut bytes: Vec<u8>) -> EngineResult<Vec<u8>> {
    if bytes.is_empty() {
        return Err(EngineError::Load("database image is empty".to_string()));
    }
    if bytes.len() < HEADER_LEN {
        return Err(EngineError::Load(format!(
            "database image is truncated ({} bytes, header needs {})",
            bytes.len(),
            HEADER_LEN
        )));
    }
    if &bytes[..HEADER_MAGIC.len()] != HEADER_MAGIC {
        return Err(EngineError::Load(
            "not a SQLite database (header magic mismatch)".to_string(),
        ));
    }

    for offset in [WRITE_VERSION_OFFSET, READ_VERSION_OFFSET] {
        if bytes[offset] == JOURNAL_WAL {
            debug!(offset, "Resetting WAL file-format byte for in-memory open");
            bytes[offset] = JOURNAL_LEGACY;
        }
    }

    Ok(bytes)
}

/// Page size declared in the header (offsets 16..18, big-endian; 1 means 65536)
pub fn page_size(bytes: &[u8]) -> Option<u32> {
    let raw = u16::from_be_bytes([*bytes.get(16)?, *bytes.get(17)?]);
    match raw {
        1 => Some(65_536),
        n if n >= 512 && n.is_power_of_two() => Some(u32::from(n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(page_size: u16, journal: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[..16].copy_from_slice(HEADER_MAGIC);
        bytes[16..18].copy_from_slice(&page_size.to_be_bytes());
        bytes[18] = journal;
        bytes[19] = journal;
        bytes
    }

    #[test]
    fn test_rejects_empty() {
        let err = prepare(Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::Load(_)));
    }

    #[test]
    fn test_rejects_truncated() {
        let err = prepare(HEADER_MAGIC.to_vec()).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_rejects_wrong_magic() {
        let err = prepare(vec![b'x'; 4096]).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_wal_bytes_reset() {
        let prepared = prepare(header(4096, JOURNAL_WAL)).unwrap();
        assert_eq!(prepared[18], JOURNAL_LEGACY);
        assert_eq!(prepared[19], JOURNAL_LEGACY);
    }

    #[test]
    fn test_legacy_image_untouched() {
        let original = header(4096, JOURNAL_LEGACY);
        assert_eq!(prepare(original.clone()).unwrap(), original);
    }

    #[test]
    fn test_page_size() {
        assert_eq!(page_size(&header(4096, 1)), Some(4096));
        assert_eq!(page_size(&header(1, 1)), Some(65_536));
        assert_eq!(page_size(&header(1000, 1)), None);
        assert_eq!(page_size(&[0u8; 4]), None);
    }
}
