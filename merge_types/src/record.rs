use crate::chemistry::chemistry_code;
use crate::composition::Component;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::EnumString;

/// Lifecycle status of the run a component belongs to.
#[derive(EnumString, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    #[strum(serialize = "qc complete")]
    QcComplete,
    #[strum(serialize = "archival in progress")]
    ArchivalInProgress,
    #[strum(default)]
    Other(String),
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::QcComplete => "qc complete",
            RunStatus::ArchivalInProgress => "archival in progress",
            RunStatus::Other(status) => status,
        })
    }
}

impl From<String> for RunStatus {
    fn from(status: String) -> Self {
        match status.parse() {
            Ok(status) => status,
            Err(_) => RunStatus::Other(status),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.to_string()
    }
}

/// Metadata of one sequencing component (a lane, or one tag within a lane)
/// as supplied by the warehouse.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LibraryRecord {
    pub id_run: u32,
    pub position: u32,
    #[serde(default)]
    pub tag_index: Option<u32>,
    pub library_id: String,
    pub sample_id: String,
    pub sample_name: String,
    #[serde(default)]
    pub sample_common_name: String,
    #[serde(default)]
    pub sample_accession_number: Option<String>,
    pub study_id: String,
    pub study_name: String,
    #[serde(default)]
    pub study_title: String,
    #[serde(default)]
    pub study_accession_number: Option<String>,
    pub flowcell_barcode: String,
    pub instrument_type: String,
    pub run_type: String,
    #[serde(default)]
    pub reference_genome: Option<String>,
    /// Identifier of the LIMS that tracks this library.
    pub lims_id: String,
    #[serde(default)]
    pub status: Option<RunStatus>,
    /// When the run reached "qc complete".
    #[serde(default)]
    pub qc_complete: Option<DateTime<Utc>>,
    /// Outcome of manual QC of the lane, if any was recorded.
    #[serde(default)]
    pub manual_qc: Option<bool>,
}

impl LibraryRecord {
    pub fn component(&self) -> Component {
        Component::new(self.id_run, self.position, self.tag_index)
    }

    pub fn chemistry(&self) -> String {
        chemistry_code(&self.flowcell_barcode)
    }

    pub fn is_archival_in_progress(&self) -> bool {
        self.status == Some(RunStatus::ArchivalInProgress)
    }

    /// True when the run carries no status or has completed QC.
    pub fn is_qc_complete(&self) -> bool {
        matches!(self.status, None | Some(RunStatus::QcComplete))
    }

    /// True when the record has a reference to align to.
    pub fn is_aligned(&self) -> bool {
        self.reference_genome
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }
}
