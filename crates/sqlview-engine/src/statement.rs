//! Statement builder
//!
//! Builds the handful of statements the facade issues. Identifiers come in as
//! [`Ident`] (already allow-listed), values are always positional parameters.

use crate::error::StatementError;
use crate::row::Row;
use crate::schema::{Ident, SchemaSnapshot};
use crate::value::Value;
use rusqlite::Connection;
use tracing::debug;

/// A window over a table scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// First `limit` rows
    pub fn first(limit: u64) -> Self {
        Self::new(0, limit)
    }

    /// The page immediately after this one, same size
    pub fn next(self) -> Self {
        Self::new(self.offset.saturating_add(self.limit), self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(crate::config::DEFAULT_PAGE_LIMIT)
    }
}

/// Statement text plus the values bound to its `?N` parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BoundStatement {
    /// Run as a data-changing statement, returning the changed row count
    pub fn execute(&self, conn: &Connection) -> Result<usize, StatementError> {
        debug!(sql = %self.sql, params = self.params.len(), "Executing statement");
        let mut stmt = conn.prepare(&self.sql)?;
        let changed = stmt.execute(rusqlite::params_from_iter(self.params.iter()))?;
        Ok(changed)
    }

    /// Run as a query, copying every result row out before returning
    pub fn query_rows(&self, conn: &Connection) -> Result<Vec<Row>, StatementError> {
        debug!(sql = %self.sql, "Running query");
        let mut stmt = conn.prepare(&self.sql)?;
        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let rows = stmt.query_map(rusqlite::params_from_iter(self.params.iter()), |row| {
            Row::from_sql_row(row, &column_names)
        })?;
        let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collected)
    }
}

/// Engine limits are signed 64-bit; anything larger means "no limit"
fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// `SELECT * ... LIMIT ? OFFSET ?`
pub fn select_page(table: &Ident, page: Page) -> BoundStatement {
    BoundStatement {
        sql: format!("SELECT * FROM {} LIMIT ?1 OFFSET ?2", table.quoted()),
        params: vec![
            Value::Integer(to_sql_int(page.limit)),
            Value::Integer(to_sql_int(page.offset)),
        ],
    }
}

/// `INSERT INTO t (a, b) VALUES (?1, ?2)`, or `DEFAULT VALUES` for an empty row
pub fn insert(snapshot: &SchemaSnapshot, data: &Row) -> Result<BoundStatement, StatementError> {
    let table = snapshot.table().quoted();
    if data.is_empty() {
        return Ok(BoundStatement {
            sql: format!("INSERT INTO {table} DEFAULT VALUES"),
            params: Vec::new(),
        });
    }

    let columns = snapshot.columns_for(data.columns())?;
    let column_list = columns
        .iter()
        .map(Ident::quoted)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(BoundStatement {
        sql: format!("INSERT INTO {table} ({column_list}) VALUES ({placeholders})"),
        params: data.values().cloned().collect(),
    })
}

/// `UPDATE t SET a = ?1, b = ?2 WHERE pk = ?3`
pub fn update(
    snapshot: &SchemaSnapshot,
    data: &Row,
    pk_column: &str,
    pk_value: Value,
) -> Result<BoundStatement, StatementError> {
    if data.is_empty() {
        return Err(StatementError::EmptyAssignment);
    }

    let columns = snapshot.columns_for(data.columns())?;
    let pk = snapshot.column(pk_column)?;
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ?{}", column.quoted(), i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    let mut params: Vec<Value> = data.values().cloned().collect();
    params.push(pk_value);

    Ok(BoundStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            snapshot.table().quoted(),
            assignments,
            pk.quoted(),
            params.len()
        ),
        params,
    })
}

/// `DELETE FROM t WHERE pk = ?1`
pub fn delete(
    snapshot: &SchemaSnapshot,
    pk_column: &str,
    pk_value: Value,
) -> Result<BoundStatement, StatementError> {
    let pk = snapshot.column(pk_column)?;
    Ok(BoundStatement {
        sql: format!(
            "DELETE FROM {} WHERE {} = ?1",
            snapshot.table().quoted(),
            pk.quoted()
        ),
        params: vec![pk_value],
    })
}

/// `ALTER TABLE t ADD COLUMN c TYPE`
///
/// The new column name only has to pass the safe character set; it must not
/// already exist.
pub fn add_column(
    snapshot: &SchemaSnapshot,
    column: &str,
    column_type: &str,
) -> Result<BoundStatement, StatementError> {
    let column = Ident::parse(column)?;
    let column_type = crate::schema::validate_column_type(column_type)?;
    if snapshot.has_column(column.as_str()) {
        return Err(StatementError::DuplicateColumn {
            table: snapshot.table().to_string(),
            column: column.to_string(),
        });
    }

    Ok(BoundStatement {
        sql: format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            snapshot.table().quoted(),
            column.quoted(),
            column_type
        ),
        params: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> (Connection, SchemaSnapshot) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER, name TEXT, \"order\" INTEGER);")
            .unwrap();
        let snapshot = SchemaSnapshot::capture(&conn, "users").unwrap();
        (conn, snapshot)
    }

    #[test]
    fn test_select_binds_limit_and_offset() {
        let (_conn, snapshot) = users();
        let stmt = select_page(snapshot.table(), Page::new(10, 5));
        assert_eq!(stmt.sql, "SELECT * FROM \"users\" LIMIT ?1 OFFSET ?2");
        assert_eq!(stmt.params, vec![Value::Integer(5), Value::Integer(10)]);
    }

    #[test]
    fn test_huge_limit_saturates() {
        let (_conn, snapshot) = users();
        let stmt = select_page(snapshot.table(), Page::new(0, u64::MAX));
        assert_eq!(stmt.params[0], Value::Integer(i64::MAX));
    }

    #[test]
    fn test_insert_follows_data_order() {
        let (_conn, snapshot) = users();
        let data = Row::new().with("name", "Bob").with("id", 2);
        let stmt = insert(&snapshot, &data).unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"name\", \"id\") VALUES (?1, ?2)"
        );
        assert_eq!(stmt.params, vec![Value::from("Bob"), Value::Integer(2)]);
    }

    #[test]
    fn test_insert_empty_uses_defaults() {
        let (conn, snapshot) = users();
        let stmt = insert(&snapshot, &Row::new()).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"users\" DEFAULT VALUES");
        assert_eq!(stmt.execute(&conn).unwrap(), 1);
    }

    #[test]
    fn test_insert_unknown_column() {
        let (_conn, snapshot) = users();
        let data = Row::new().with("password", "hunter2");
        assert!(matches!(
            insert(&snapshot, &data),
            Err(StatementError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_update_parameter_numbering() {
        let (_conn, snapshot) = users();
        let data = Row::new().with("name", "Carol").with("order", 3);
        let stmt = update(&snapshot, &data, "id", Value::Integer(1)).unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE \"users\" SET \"name\" = ?1, \"order\" = ?2 WHERE \"id\" = ?3"
        );
        assert_eq!(stmt.params.len(), 3);
        assert_eq!(stmt.params[2], Value::Integer(1));
    }

    #[test]
    fn test_update_requires_assignment() {
        let (_conn, snapshot) = users();
        assert!(matches!(
            update(&snapshot, &Row::new(), "id", Value::Integer(1)),
            Err(StatementError::EmptyAssignment)
        ));
    }

    #[test]
    fn test_delete_unknown_pk_column() {
        let (_conn, snapshot) = users();
        assert!(delete(&snapshot, "uuid", Value::Integer(1)).is_err());
    }

    #[test]
    fn test_add_column_statement() {
        let (conn, snapshot) = users();
        let stmt = add_column(&snapshot, "email", "VARCHAR(255)").unwrap();
        assert_eq!(
            stmt.sql,
            "ALTER TABLE \"users\" ADD COLUMN \"email\" VARCHAR(255)"
        );
        stmt.execute(&conn).unwrap();
    }

    #[test]
    fn test_add_existing_column_rejected() {
        let (_conn, snapshot) = users();
        assert!(matches!(
            add_column(&snapshot, "name", "TEXT"),
            Err(StatementError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_query_rows_copies_out() {
        let (conn, snapshot) = users();
        conn.execute_batch("INSERT INTO users VALUES (1, 'Alice', 7);")
            .unwrap();

        let rows = select_page(snapshot.table(), Page::default())
            .query_rows(&conn)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("order"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_page_next() {
        assert_eq!(Page::first(10).next(), Page::new(10, 10));
        assert_eq!(Page::default().limit, 100);
    }
}
