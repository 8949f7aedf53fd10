use std::path::{Path, PathBuf};

use rusqlite::{
    params_from_iter,
    types::{ToSqlOutput, ValueRef},
    Connection, ToSql,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{Error, Result},
    record::{RecordSet, Value},
};

/// File name used when no explicit database name is given.
pub const DEFAULT_DB_NAME: &str = "enfermedades_zoonoticas.sqlite";

/// Directory the `static/` data tree hangs off.
pub fn app_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(r) => ToSqlOutput::from(*r),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
            Value::Boolean(b) => ToSqlOutput::from(*b),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// Declared SQLite column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }

    /// Narrowest type that holds every non-null value. Text wins over
    /// everything, reals absorb integers, an all-null column is text.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let (mut integer, mut real, mut blob) = (false, false, false);
        for value in values {
            match value {
                Value::Null => {}
                Value::Integer(_) | Value::Boolean(_) => integer = true,
                Value::Real(_) => real = true,
                Value::Blob(_) => blob = true,
                Value::Text(_) => return DataType::Text,
            }
        }
        if blob {
            DataType::Blob
        } else if real {
            DataType::Real
        } else if integer {
            DataType::Integer
        } else {
            DataType::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
}

/// Table layout derived from a record set at insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn infer(name: &str, records: &RecordSet) -> Self {
        let columns = records
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| ColumnDefinition {
                name: column.clone(),
                data_type: DataType::infer(records.rows().map(|row| &row.values()[index])),
            })
            .collect();
        Self {
            name: name.to_string(),
            columns,
        }
    }

    pub fn create_statement(&self) -> Result<String> {
        let columns = self
            .columns
            .iter()
            .map(|c| Ok(format!("{} {}", quote_identifier(&c.name)?, c.data_type.as_sql())))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "CREATE TABLE {} ({})",
            quote_identifier(&self.name)?,
            columns.join(", ")
        ))
    }
}

/// Quote a table or column name for interpolation into SQL.
///
/// SQLite binds values only, so identifiers go into the statement text.
/// Empty names and NUL bytes are rejected, embedded quotes are doubled.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// SQLite configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
}

impl SqliteConfig {
    /// `<app_dir>/static/db/<db_name>`
    pub fn new(db_name: &str) -> Self {
        Self::in_dir(app_dir().join("static").join("db"), db_name)
    }

    pub fn in_dir(dir: impl AsRef<Path>, db_name: &str) -> Self {
        Self {
            db_path: dir.as_ref().join(db_name),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DB_NAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record set was empty; any existing table was left alone.
    Skipped,
    Replaced { rows: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub rows_affected: usize,
}

impl WriteOutcome {
    pub fn matched(&self) -> bool {
        self.rows_affected > 0
    }
}

/// Storage accessor for one SQLite file.
///
/// Holds only the path. Every operation opens its own connection and drops
/// it before returning.
#[derive(Debug, Clone)]
pub struct Database {
    config: SqliteConfig,
}

impl Database {
    /// Create the accessor, making sure the database directory exists.
    pub fn new(config: SqliteConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        info!(path = %config.db_path.display(), "using sqlite database");
        Ok(Self { config })
    }

    pub fn path(&self) -> &Path {
        &self.config.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.config.db_path)?)
    }

    /// Replace `table` with the contents of `records`.
    ///
    /// The old table, schema included, is dropped. An empty record set is a
    /// no-op and leaves any existing table in place.
    #[instrument(level = "debug", skip(self, records), fields(rows = records.len()))]
    pub fn insert(&self, records: &RecordSet, table: &str) -> Result<InsertOutcome> {
        if records.is_empty() {
            info!(table, "record set is empty, nothing inserted");
            return Ok(InsertOutcome::Skipped);
        }
        match self.replace_table(records, table) {
            Ok(rows) => {
                info!(table, rows, "table replaced");
                Ok(InsertOutcome::Replaced { rows })
            }
            Err(err) => {
                error!(table, error = %err, "failed to insert records");
                Err(err)
            }
        }
    }

    fn replace_table(&self, records: &RecordSet, table: &str) -> Result<usize> {
        let definition = TableDefinition::infer(table, records);
        let quoted_table = quote_identifier(table)?;
        let columns = records
            .columns()
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Result<Vec<_>>>()?;
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {quoted_table}"), [])?;
        tx.execute(&definition.create_statement()?, [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {quoted_table} ({}) VALUES ({placeholders})",
                columns.join(", ")
            ))?;
            for row in records.rows() {
                stmt.execute(params_from_iter(row.values()))?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Read `table` in full, or run `sql` when given.
    ///
    /// Any failure, a missing table included, is logged and yields an empty
    /// record set. Use [`Database::try_query`] to tell the two apart.
    pub fn query(&self, table: &str, sql: Option<&str>) -> RecordSet {
        match self.try_query(table, sql) {
            Ok(records) => records,
            Err(err) => {
                warn!(table, error = %err, "query failed, returning an empty record set");
                RecordSet::default()
            }
        }
    }

    /// Like [`Database::query`] but returns the error instead of logging it.
    ///
    /// `sql` is executed verbatim and must come from trusted code.
    pub fn try_query(&self, table: &str, sql: Option<&str>) -> Result<RecordSet> {
        let statement = match sql {
            Some(sql) => sql.to_string(),
            None => format!("SELECT * FROM {}", quote_identifier(table)?),
        };
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&statement)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut records = RecordSet::new(columns);

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            records.push_row(values)?;
        }
        debug!(table, statement = %statement, rows = records.len(), "query executed");
        Ok(records)
    }

    /// `UPDATE table SET set_column = set_value WHERE where_column = where_value`
    ///
    /// No matching row is not an error; check [`WriteOutcome::matched`].
    pub fn update_one_column(
        &self,
        table: &str,
        set_column: &str,
        set_value: impl Into<Value>,
        where_column: &str,
        where_value: impl Into<Value>,
    ) -> Result<WriteOutcome> {
        let set_value = set_value.into();
        let where_value = where_value.into();
        match self.execute_update(table, set_column, &set_value, where_column, &where_value) {
            Ok(outcome) if outcome.matched() => {
                info!(table, rows = outcome.rows_affected, column = set_column, "rows updated");
                Ok(outcome)
            }
            Ok(outcome) => {
                info!(table, column = where_column, value = %where_value, "no rows matched, nothing updated");
                Ok(outcome)
            }
            Err(err) => {
                error!(table, error = %err, "failed to update");
                Err(err)
            }
        }
    }

    fn execute_update(
        &self,
        table: &str,
        set_column: &str,
        set_value: &Value,
        where_column: &str,
        where_value: &Value,
    ) -> Result<WriteOutcome> {
        let conn = self.connect()?;
        let columns = table_columns(&conn, table)?;
        require_column(&columns, table, set_column)?;
        require_column(&columns, table, where_column)?;

        let statement = format!(
            "UPDATE {} SET {} = ?1 WHERE {} = ?2",
            quote_identifier(table)?,
            quote_identifier(set_column)?,
            quote_identifier(where_column)?
        );
        let rows_affected = conn.execute(&statement, [set_value, where_value])?;
        Ok(WriteOutcome { rows_affected })
    }

    /// `DELETE FROM table WHERE where_column = where_value`
    ///
    /// Deleting a key that is already gone is a no-op.
    pub fn delete_one_column(
        &self,
        table: &str,
        where_column: &str,
        where_value: impl Into<Value>,
    ) -> Result<WriteOutcome> {
        let where_value = where_value.into();
        match self.execute_delete(table, where_column, &where_value) {
            Ok(outcome) if outcome.matched() => {
                info!(table, rows = outcome.rows_affected, column = where_column, value = %where_value, "rows deleted");
                Ok(outcome)
            }
            Ok(outcome) => {
                info!(table, column = where_column, value = %where_value, "no rows matched, nothing deleted");
                Ok(outcome)
            }
            Err(err) => {
                error!(table, error = %err, "failed to delete");
                Err(err)
            }
        }
    }

    fn execute_delete(&self, table: &str, where_column: &str, where_value: &Value) -> Result<WriteOutcome> {
        let conn = self.connect()?;
        let columns = table_columns(&conn, table)?;
        require_column(&columns, table, where_column)?;

        let statement = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_identifier(table)?,
            quote_identifier(where_column)?
        );
        let rows_affected = conn.execute(&statement, [where_value])?;
        Ok(WriteOutcome { rows_affected })
    }
}

/// Column names of `table` as the store reports them.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if columns.is_empty() {
        return Err(Error::UnknownTable(table.to_string()));
    }
    Ok(columns)
}

/// SQLite folds ASCII case when resolving identifiers.
fn require_column(columns: &[String], table: &str, column: &str) -> Result<()> {
    if columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
        Ok(())
    } else {
        Err(Error::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}
