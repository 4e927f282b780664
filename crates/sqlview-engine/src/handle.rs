//! The single open database handle
//!
//! A [`Handle`] owns one in-memory rusqlite connection: either a fresh empty
//! database or one deserialized from a file image. It is dropped (and the
//! engine memory released) when the facade replaces or closes it.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::image;
use crate::schema;
use rusqlite::{Connection, MAIN_DB};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info};

/// Where the handle's contents came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Created empty by `create_database`
    Created,
    /// Deserialized from an image of `image_len` bytes
    Loaded { image_len: usize },
}

/// An open in-memory database
pub struct Handle {
    conn: Connection,
    origin: Origin,
}

impl Handle {
    /// Open a new empty in-memory database
    pub fn create(config: &EngineConfig) -> EngineResult<Self> {
        info!("Creating empty in-memory database");
        let conn = Connection::open_in_memory()?;
        configure_pragmas(&conn, config)?;

        // Any write transaction allocates page 1, so the new database has a
        // header and serializes to a loadable image.
        conn.execute_batch("PRAGMA user_version = 0;")?;

        if config.vacuum_on_create {
            debug!("Running baseline VACUUM");
            conn.execute_batch("VACUUM;")?;
        }

        Ok(Self {
            conn,
            origin: Origin::Created,
        })
    }

    /// Open an in-memory database from a SQLite file image
    ///
    /// The image is copied into engine-owned memory; the handle is writable
    /// and can grow.
    pub fn from_image(bytes: Vec<u8>, config: &EngineConfig) -> EngineResult<Self> {
        let bytes = image::prepare(bytes)?;
        let image_len = bytes.len();
        info!(
            bytes = image_len,
            page_size = ?image::page_size(&bytes),
            "Opening database image"
        );

        let mut conn = Connection::open_in_memory()
            .map_err(|e| EngineError::Load(format!("Failed to open connection: {}", e)))?;
        conn.deserialize_read_exact(MAIN_DB, Cursor::new(bytes), image_len, false)
            .map_err(|e| EngineError::Load(format!("Engine rejected image: {}", e)))?;

        // Touch the catalog so a corrupt image fails here, not on first browse
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| EngineError::Load(format!("Image is not a readable database: {}", e)))?;

        configure_pragmas(&conn, config)
            .map_err(|e| EngineError::Load(format!("Failed to configure connection: {}", e)))?;

        Ok(Self {
            conn,
            origin: Origin::Loaded { image_len },
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Serialize the whole main database to a file image
    pub fn serialize(&self) -> EngineResult<Vec<u8>> {
        let data = self
            .conn
            .serialize(MAIN_DB)
            .map_err(|e| EngineError::Export(format!("Serialization failed: {}", e)))?;
        let bytes = data.to_vec();
        debug!(bytes = bytes.len(), "Serialized database");
        Ok(bytes)
    }

    /// Get database statistics
    pub fn stats(&self) -> EngineResult<HandleStats> {
        let conn = &self.conn;
        let page_count: i64 = conn.query_row("PRAGMA page_count;", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size;", [], |row| row.get(0))?;
        let freelist_count: i64 =
            conn.query_row("PRAGMA freelist_count;", [], |row| row.get(0))?;
        let table_count = schema::list_tables(conn)?.len();

        Ok(HandleStats {
            page_count: page_count as u64,
            page_size: page_size as u64,
            freelist_count: freelist_count as u64,
            total_size_bytes: (page_count * page_size) as u64,
            table_count,
        })
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Configure SQLite PRAGMA settings for an in-memory handle
fn configure_pragmas(conn: &Connection, config: &EngineConfig) -> rusqlite::Result<()> {
    debug!("Configuring SQLite pragmas");

    // Stated both ways: the bundled build may default enforcement on
    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {};", foreign_keys))?;

    conn.busy_timeout(Duration::from_millis(u64::from(config.busy_timeout_ms)))?;
    conn.execute_batch(&format!("PRAGMA cache_size = {};", config.cache_size))?;

    // Use memory for temp tables
    conn.execute_batch("PRAGMA temp_store = MEMORY;")?;

    Ok(())
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleStats {
    pub page_count: u64,
    pub page_size: u64,
    pub freelist_count: u64,
    pub total_size_bytes: u64,
    pub table_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_handle_has_header_page() {
        let handle = Handle::create(&EngineConfig::default()).unwrap();
        let stats = handle.stats().unwrap();

        assert_eq!(handle.origin(), Origin::Created);
        assert!(stats.page_count >= 1);
        assert!(stats.page_size > 0);
        assert_eq!(stats.table_count, 0);
    }

    #[test]
    fn test_foreign_keys_pragma() {
        let foreign_keys = |config: &EngineConfig| -> i64 {
            Handle::create(config)
                .unwrap()
                .connection()
                .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
                .unwrap()
        };

        assert_eq!(foreign_keys(&EngineConfig::default()), 0);
        assert_eq!(foreign_keys(&EngineConfig::default().with_foreign_keys(true)), 1);
        assert_eq!(foreign_keys(&EngineConfig::default().with_foreign_keys(false)), 0);
    }

    #[test]
    fn test_loaded_handle_honours_foreign_keys_setting() {
        let source = Handle::create(&EngineConfig::default()).unwrap();
        source.connection().execute_batch("CREATE TABLE t (v);").unwrap();
        let image = source.serialize().unwrap();

        for (enabled, expected) in [(false, 0i64), (true, 1)] {
            let config = EngineConfig::default().with_foreign_keys(enabled);
            let handle = Handle::from_image(image.clone(), &config).unwrap();
            let value: i64 = handle
                .connection()
                .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
                .unwrap();
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn test_serialize_then_reopen() {
        let config = EngineConfig::default();
        let handle = Handle::create(&config).unwrap();
        handle
            .connection()
            .execute_batch(
                "CREATE TABLE t (id INTEGER, label TEXT);
                 INSERT INTO t VALUES (1, 'one'), (2, 'two');",
            )
            .unwrap();

        let image = handle.serialize().unwrap();
        assert_eq!(&image[..16], image::HEADER_MAGIC);

        let reopened = Handle::from_image(image.clone(), &config).unwrap();
        assert_eq!(
            reopened.origin(),
            Origin::Loaded {
                image_len: image.len()
            }
        );
        let count: i64 = reopened
            .connection()
            .query_row("SELECT count(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_loaded_handle_is_writable() {
        let config = EngineConfig::default();
        let handle = Handle::create(&config).unwrap();
        handle
            .connection()
            .execute_batch("CREATE TABLE t (v TEXT);")
            .unwrap();
        let image = handle.serialize().unwrap();

        let reopened = Handle::from_image(image, &config).unwrap();
        // Enough rows to grow the image past its original size
        for i in 0..500 {
            reopened
                .connection()
                .execute("INSERT INTO t VALUES (?1)", [format!("row-{i:04}")])
                .unwrap();
        }
        assert_eq!(reopened.stats().unwrap().table_count, 1);
    }

    #[test]
    fn test_garbage_after_valid_header_fails_load() {
        let mut bytes = vec![0xAB; 4096];
        bytes[..16].copy_from_slice(image::HEADER_MAGIC);
        let err = Handle::from_image(bytes, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Load(_)));
    }
}
