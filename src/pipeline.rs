//! One demonstration run: load the CSV, replace the table, update one row,
//! delete one row, re-reading the table after every write.
//!
//! Steps run in a fixed order and never go back:
//! load, insert, verify, update (or skip), verify, delete (or skip), verify.
//! Load failures and a missing key column abort the run; a CSV with no data
//! rows ends it quietly before the insert. Store failures on
//! writes are logged, recorded in the report, and the run carries on.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    csv_source::read_latin1_csv,
    error::{Error, Result},
    record::{RecordSet, Value},
    sqlite::{app_dir, Database, InsertOutcome},
};

/// Rows shown when logging a read.
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub csv_path: PathBuf,
    pub table_name: String,
    pub key_column: String,
    pub update: UpdateStep,
    pub delete: DeleteStep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStep {
    pub key: Value,
    pub column: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStep {
    pub key: Value,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            csv_path: app_dir().join("static").join("csv").join("enfermzoonoticas.csv"),
            table_name: "enfermedades_zoonoticas".to_string(),
            key_column: "codigo".to_string(),
            update: UpdateStep {
                key: Value::Integer(15),
                column: "localidad".to_string(),
                value: Value::from("Esta es una localidad actualizada."),
            },
            delete: DeleteStep {
                key: Value::Integer(12),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Applied { rows: usize },
    /// Ran, but no row matched the key.
    NotFound,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub rows_loaded: usize,
    pub insert: StepStatus,
    pub rows_after_insert: usize,
    pub update: StepStatus,
    pub rows_after_update: Option<usize>,
    pub delete: StepStatus,
    pub rows_after_delete: Option<usize>,
    /// The final read no longer contains the deleted key.
    pub delete_confirmed: bool,
}

impl PipelineReport {
    fn new(rows_loaded: usize) -> Self {
        Self {
            rows_loaded,
            insert: StepStatus::Skipped,
            rows_after_insert: 0,
            update: StepStatus::Skipped,
            rows_after_update: None,
            delete: StepStatus::Skipped,
            rows_after_delete: None,
            delete_confirmed: false,
        }
    }
}

pub struct Pipeline<'a> {
    config: PipelineConfig,
    database: &'a Database,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, database: &'a Database) -> Self {
        Self { config, database }
    }

    pub fn run(&self) -> Result<PipelineReport> {
        info!(path = %self.config.csv_path.display(), "reading csv");
        let loaded = read_latin1_csv(&self.config.csv_path)?;
        self.run_with(&loaded)
    }

    /// Run every step after loading against an already loaded record set.
    pub fn run_with(&self, loaded: &RecordSet) -> Result<PipelineReport> {
        let config = &self.config;
        let table = config.table_name.as_str();
        let key_column = config.key_column.as_str();

        info!("loaded from csv:\n{}", loaded.preview(PREVIEW_ROWS));
        let mut report = PipelineReport::new(loaded.len());
        if loaded.is_empty() {
            info!("csv has no data rows, nothing to do");
            return Ok(report);
        }
        if !loaded.has_column(key_column) {
            return Err(Error::MissingColumn(key_column.to_string()));
        }

        report.insert = match self.database.insert(loaded, table) {
            Ok(InsertOutcome::Replaced { rows }) => StepStatus::Applied { rows },
            Ok(InsertOutcome::Skipped) => StepStatus::Skipped,
            Err(err) => StepStatus::Failed(err.to_string()),
        };

        let after_insert = self.database.query(table, None);
        report.rows_after_insert = after_insert.len();
        if after_insert.is_empty() {
            info!(table, "no rows in table after insert, stopping");
            return Ok(report);
        }
        info!("table after insert:\n{}", after_insert.preview(PREVIEW_ROWS));

        let current = self.update_step(&after_insert, &mut report)?;
        self.delete_step(&current, &mut report)?;
        Ok(report)
    }

    fn update_step(&self, after_insert: &RecordSet, report: &mut PipelineReport) -> Result<RecordSet> {
        let config = &self.config;
        let table = config.table_name.as_str();
        let step = &config.update;

        let before = after_insert.rows_where(&config.key_column, &step.key)?;
        if before.is_empty() {
            warn!(table, key = %step.key, "no row to update, skipping");
            return Ok(after_insert.clone());
        }
        for row in &before {
            info!(key = %step.key, before = ?row.get(&step.column), "row before update");
        }

        report.update = match self.database.update_one_column(
            table,
            &step.column,
            step.value.clone(),
            &config.key_column,
            step.key.clone(),
        ) {
            Ok(outcome) if outcome.matched() => StepStatus::Applied {
                rows: outcome.rows_affected,
            },
            Ok(_) => StepStatus::NotFound,
            Err(err) => StepStatus::Failed(err.to_string()),
        };

        let after_update = self.database.query(table, None);
        report.rows_after_update = Some(after_update.len());
        if after_update.is_empty() {
            info!(table, "could not read table after update");
            return Ok(after_insert.clone());
        }
        for row in after_update.rows_where(&config.key_column, &step.key)? {
            info!(key = %step.key, after = ?row.get(&step.column), "row after update");
        }
        let (rows, columns) = after_update.shape();
        info!(rows, columns, "table shape after update");
        Ok(after_update)
    }

    fn delete_step(&self, current: &RecordSet, report: &mut PipelineReport) -> Result<()> {
        let config = &self.config;
        let table = config.table_name.as_str();
        let key = &config.delete.key;

        if current.is_empty() {
            warn!(table, "no data in table to check before delete");
            return Ok(());
        }
        if !current.contains(&config.key_column, key)? {
            warn!(table, key = %key, "key not present before delete");
        }

        report.delete = match self.database.delete_one_column(table, &config.key_column, key.clone()) {
            Ok(outcome) if outcome.matched() => StepStatus::Applied {
                rows: outcome.rows_affected,
            },
            Ok(_) => StepStatus::NotFound,
            Err(err) => StepStatus::Failed(err.to_string()),
        };

        let after_delete = self.database.query(table, None);
        report.rows_after_delete = Some(after_delete.len());
        if after_delete.is_empty() {
            info!(table, "table is empty after delete");
            report.delete_confirmed = true;
            return Ok(());
        }
        info!("table after delete:\n{}", after_delete.preview(PREVIEW_ROWS));

        report.delete_confirmed = !after_delete.contains(&config.key_column, key)?;
        if report.delete_confirmed {
            info!(column = %config.key_column, key = %key, "row confirmed deleted");
        } else {
            error!(column = %config.key_column, key = %key, "row still present after delete");
        }
        Ok(())
    }
}
