use std::path::PathBuf;

/// Errors raised by the loader, the storage accessor and the pipeline driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse csv {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("csv file {0} has no header or no data rows")]
    EmptyInput(PathBuf),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("table {0:?} does not exist")]
    UnknownTable(String),

    #[error("column {column:?} does not exist in table {table:?}")]
    UnknownColumn { table: String, column: String },

    #[error("column {0:?} is missing from the record set")]
    MissingColumn(String),

    #[error("row has {found} values but the record set has {expected} columns")]
    RowArity { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
