//! Embedded SQLite facade for sqlview
//!
//! This crate wraps one in-memory SQLite database behind a small,
//! table-oriented API: load a file image, browse tables and schemas, make
//! single-row edits, and export the result as a file image again.
//!
//! ## Features
//!
//! - **One handle**: [`EngineFacade`] owns at most one open database; loading
//!   or creating another releases it
//! - **Allow-listed identifiers**: table and column names are checked against
//!   the live catalog before they reach statement text; values are always bound
//! - **Typed errors**: every fallible call returns [`EngineResult`]
//! - **Notifications**: load/export/init outcomes go to a pluggable
//!   [`NotificationSink`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sqlview_engine::{EngineConfig, EngineFacade, Page, Row};
//!
//! # async fn run(bytes: Vec<u8>) -> sqlview_engine::EngineResult<()> {
//! let mut facade = EngineFacade::new(EngineConfig::default());
//! facade.init_engine().await?;
//! facade.load_database(bytes).await?;
//!
//! for table in facade.list_tables()? {
//!     let rows = facade.read_table(&table, Page::default())?;
//!     println!("{table}: {} rows on first page", rows.len());
//! }
//!
//! facade.insert_row("users", &Row::new().with("id", 2).with("name", "Bob"))?;
//! let image = facade.export_database()?;
//! # let _ = image;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod facade;
pub mod handle;
pub mod image;
pub mod logging;
pub mod notify;
pub mod row;
pub mod schema;
pub mod statement;
pub mod value;

// Re-exports
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, ErrorKind, StatementError};
pub use facade::{EngineFacade, EngineInfo, DEFAULT_EXPORT_FILENAME};
pub use handle::{HandleStats, Origin};
pub use notify::{
    ChannelSink, Notification, NotificationSink, NullSink, ResultExt, Severity, TracingSink,
};
pub use row::Row;
pub use schema::ColumnInfo;
pub use statement::Page;
pub use value::Value;
