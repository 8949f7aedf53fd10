//! CSV input for the loader.
//!
//! Files are ISO-8859-1 encoded: every byte is the code point of the same
//! value. Column types are inferred from the cells, empty cells become
//! [`Value::Null`].

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    path::Path,
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    record::{RecordSet, Value},
};

/// Read `path` into a record set.
///
/// Missing, empty or malformed files are errors. A header with no data rows
/// gives an empty record set carrying the header's columns. Repeated header
/// names are renamed `x`, `x.1`, `x.2`, ...
pub fn read_latin1_csv(path: impl AsRef<Path>) -> Result<RecordSet> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_error = |source| Error::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = dedupe_headers(
        reader
            .byte_headers()
            .map_err(csv_error)?
            .iter()
            .map(decode_latin1)
            .collect(),
    );
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(Error::EmptyInput(path.to_path_buf()));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.byte_records() {
        let record = record.map_err(csv_error)?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(decode_latin1(field));
        }
    }
    let row_count = cells.first().map_or(0, Vec::len);

    let columns: Vec<Vec<Value>> = cells.iter().map(|column| parse_column(column)).collect();
    let mut records = RecordSet::new(headers);
    for row in 0..row_count {
        records.push_row(columns.iter().map(|column| column[row].clone()).collect())?;
    }
    debug!(path = %path.display(), rows = records.len(), columns = records.columns().len(), "csv loaded");
    Ok(records)
}

fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut unique = Vec::with_capacity(headers.len());
    for header in headers {
        let mut name = header.clone();
        while taken.contains(&name) {
            let n = repeats.entry(header.clone()).or_insert(0);
            *n += 1;
            name = format!("{header}.{n}");
        }
        taken.insert(name.clone());
        unique.push(name);
    }
    unique
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Real,
    Text,
}

fn parse_column(cells: &[String]) -> Vec<Value> {
    let mut kind = ColumnKind::Integer;
    for cell in cells.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if kind == ColumnKind::Integer && cell.parse::<i64>().is_err() {
            kind = ColumnKind::Real;
        }
        if kind == ColumnKind::Real && cell.parse::<f64>().is_err() {
            kind = ColumnKind::Text;
            break;
        }
    }

    cells
        .iter()
        .map(|cell| {
            let trimmed = cell.trim();
            if trimmed.is_empty() {
                return Value::Null;
            }
            match kind {
                ColumnKind::Integer => trimmed.parse().map_or(Value::Null, Value::Integer),
                ColumnKind::Real => trimmed.parse().map_or(Value::Null, Value::Real),
                ColumnKind::Text => Value::Text(cell.clone()),
            }
        })
        .collect()
}
