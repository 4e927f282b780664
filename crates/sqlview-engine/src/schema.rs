//! Catalog introspection and identifier allow-listing
//!
//! Identifiers can't be bound as statement parameters in most positions, so
//! any table or column name that ends up in statement text goes through
//! [`Ident`]: it must match the safe character set and, for existing objects,
//! be present in a [`SchemaSnapshot`] read from the live catalog.

use crate::error::StatementError;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

// One or more words, optionally followed by "(n)" or "(n, m)", e.g.
// "INTEGER", "VARCHAR(255)", "DOUBLE PRECISION", "DECIMAL(10, 2)".
static COLUMN_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*( [A-Za-z][A-Za-z0-9_]*)*( ?\( ?[+-]?\d+ ?(, ?[+-]?\d+ ?)?\))?$")
        .unwrap()
});

/// Declared type used by `add_column` when none is given
pub const DEFAULT_COLUMN_TYPE: &str = "TEXT";

/// Column definition as reported by `pragma_table_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared type, empty when the column has none
    #[serde(rename = "type")]
    pub decl_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// Default value expression, as written in the DDL
    pub default_value: Option<String>,
    /// Part of the primary key
    pub primary_key: bool,
}

/// An identifier that is safe to interpolate into statement text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(String);

impl Ident {
    /// Check `name` against the safe character set
    pub fn parse(name: &str) -> Result<Self, StatementError> {
        if IDENT_RE.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(StatementError::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form, so keyword-named columns ("order", "group") parse
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a declared column type for `ALTER TABLE ... ADD COLUMN`
pub fn validate_column_type(column_type: &str) -> Result<&str, StatementError> {
    if COLUMN_TYPE_RE.is_match(column_type) {
        Ok(column_type)
    } else {
        Err(StatementError::InvalidColumnType(column_type.to_string()))
    }
}

/// User tables in catalog order. Engine-internal `sqlite_*` tables are skipped.
pub fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r"SELECT name FROM sqlite_master
          WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Ordered column definitions for `table`. Empty when the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        r#"SELECT name, type, "notnull", dflt_value, pk
           FROM pragma_table_info(?1)
           ORDER BY cid"#,
    )?;
    let rows = stmt.query_map([table], |row| {
        Ok(ColumnInfo {
            name: row.get(0)?,
            decl_type: row.get(1)?,
            not_null: row.get::<_, i64>(2)? != 0,
            default_value: row.get(3)?,
            primary_key: row.get::<_, i64>(4)? > 0,
        })
    })?;
    rows.collect()
}

/// Allow-list for one table, read from the live catalog
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    table: Ident,
    columns: Vec<ColumnInfo>,
}

impl SchemaSnapshot {
    /// Read the current definition of `table`
    ///
    /// Fails with `UnknownTable` if the catalog has no such user table, and
    /// with `InvalidIdentifier` if its name is outside the safe set.
    pub fn capture(conn: &Connection, table: &str) -> Result<Self, StatementError> {
        let known = list_tables(conn)?;
        if !known.iter().any(|name| name == table) {
            return Err(StatementError::UnknownTable(table.to_string()));
        }
        let table_ident = Ident::parse(table)?;
        let columns = table_columns(conn, table)?;
        debug!(table, columns = columns.len(), "Captured schema snapshot");

        Ok(Self {
            table: table_ident,
            columns,
        })
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Validated identifier for an existing column
    pub fn column(&self, name: &str) -> Result<Ident, StatementError> {
        if !self.columns.iter().any(|c| c.name == name) {
            return Err(StatementError::UnknownColumn {
                table: self.table.to_string(),
                column: name.to_string(),
            });
        }
        Ident::parse(name)
    }

    /// Validated identifiers for every column in `names`, in order
    pub fn columns_for<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<Ident>, StatementError> {
        names.into_iter().map(|name| self.column(name)).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}
