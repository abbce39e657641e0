//! The metadata warehouse that supplies candidate records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use merge_types::LibraryRecord;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Run status the scope is anchored on.
pub const QC_COMPLETE_STATUS: &str = "qc complete";
/// Only lanes that did not fail manual QC.
pub const MANUAL_QC_FILTER: &str = "mqc";

/// Which runs seed the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Study(String),
    Runs(Vec<u32>),
    /// Runs that reached the anchor status at or after this time.
    CompletedAfter(DateTime<Utc>),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Study(study) => write!(f, "study {study}"),
            Scope::Runs(runs) => write!(f, "runs {}", runs.iter().join(",")),
            Scope::CompletedAfter(cutoff) => {
                write!(f, "runs completed after {}", cutoff.to_rfc3339())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseQuery {
    pub scope: Scope,
    /// When non-empty, only these libraries are returned.
    pub library_ids: Vec<String>,
    pub status: &'static str,
    pub filter: &'static str,
}

impl WarehouseQuery {
    pub fn new(scope: Scope, library_ids: Vec<String>) -> Self {
        WarehouseQuery {
            scope,
            library_ids,
            status: QC_COMPLETE_STATUS,
            filter: MANUAL_QC_FILTER,
        }
    }
}

impl fmt::Display for WarehouseQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.scope, self.status, self.filter)?;
        if !self.library_ids.is_empty() {
            write!(f, ", libraries {}", self.library_ids.iter().join(","))?;
        }
        Ok(())
    }
}

/// Source of library records.
///
/// The records returned are every known component of each library that has
/// at least one component in scope, so the full composition of a library can
/// be judged.
pub trait Warehouse {
    fn fetch(&self, query: &WarehouseQuery) -> Result<Vec<LibraryRecord>>;
}

/// A warehouse backed by a JSON export: an array of records.
pub struct JsonWarehouse {
    records: Vec<LibraryRecord>,
}

impl JsonWarehouse {
    pub fn new(records: Vec<LibraryRecord>) -> Self {
        JsonWarehouse { records }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path).with_context(|| path.display().to_string())?);
        let records: Vec<LibraryRecord> = serde_json::from_reader(reader)
            .with_context(|| format!("Error parsing records from {}", path.display()))?;
        Ok(JsonWarehouse::new(records))
    }

    fn is_seed(record: &LibraryRecord, query: &WarehouseQuery) -> bool {
        let status_ok = record
            .status
            .as_ref()
            .is_some_and(|s| s.to_string() == query.status);
        let qc_ok = query.filter != MANUAL_QC_FILTER || record.manual_qc != Some(false);
        let in_scope = match &query.scope {
            Scope::Study(study) => record.study_id == *study,
            Scope::Runs(runs) => runs.contains(&record.id_run),
            Scope::CompletedAfter(cutoff) => record.qc_complete.is_some_and(|t| t >= *cutoff),
        };
        status_ok && qc_ok && in_scope
    }
}

impl Warehouse for JsonWarehouse {
    fn fetch(&self, query: &WarehouseQuery) -> Result<Vec<LibraryRecord>> {
        let libraries: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| Self::is_seed(r, query))
            .map(|r| r.library_id.as_str())
            .filter(|l| query.library_ids.is_empty() || query.library_ids.iter().any(|q| q == l))
            .collect();
        Ok(self
            .records
            .iter()
            .filter(|r| libraries.contains(r.library_id.as_str()))
            .cloned()
            .collect())
    }
}
