//! Fixtures and in-memory collaborators shared by the unit tests.

use crate::command::{build_merge_command, CommandOptions, MergeCommand};
use crate::grouper::CandidateGrouper;
use crate::scheduler::{JobId, JobStatus, ResourceRequest, ScheduledJob, Scheduler, SubmitRequest};
use crate::storage::ObjectStore;
use crate::warehouse::{Warehouse, WarehouseQuery};
use anyhow::{bail, Result};
use merge_types::{Composition, LibraryRecord, RunStatus};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

/// A qc complete, aligned component of library 21776466.
pub(crate) fn record(id_run: u32, position: u32, tag_index: Option<u32>) -> LibraryRecord {
    LibraryRecord {
        id_run,
        position,
        tag_index,
        library_id: "21776466".to_string(),
        sample_id: "3437116".to_string(),
        sample_name: "SC_WES_INT5916917".to_string(),
        sample_common_name: "Homo Sapien".to_string(),
        sample_accession_number: None,
        study_id: "4591".to_string(),
        study_name: "INT_WES_study".to_string(),
        study_title: "Whole exome sequencing".to_string(),
        study_accession_number: None,
        flowcell_barcode: "H3KCWCCXY".to_string(),
        instrument_type: "HiSeqX".to_string(),
        run_type: "paired150".to_string(),
        reference_genome: Some("Homo_sapiens (GRCh38_15)".to_string()),
        lims_id: "SQSCP".to_string(),
        status: Some(RunStatus::QcComplete),
        qc_complete: None,
        manual_qc: None,
    }
}

/// One record per component of `rpt_list`.
pub(crate) fn records(rpt_list: &str) -> Vec<LibraryRecord> {
    let composition: Composition = rpt_list.parse().unwrap();
    composition
        .components()
        .iter()
        .map(|c| record(c.id_run, c.position, c.tag_index))
        .collect()
}

/// The merge command of library 21776466 over `rpt_list`, with default
/// options.
pub(crate) fn merge_command(rpt_list: &str) -> MergeCommand {
    let group = CandidateGrouper::new(records(rpt_list))
        .candidates()
        .next()
        .unwrap()
        .unwrap();
    let options = CommandOptions {
        executable: "library_merge",
        local: false,
        use_irods: false,
        load_only: false,
        random_replicate: false,
        output_root: None,
    };
    build_merge_command(&group, &options)
}

pub(crate) fn job(id: u64, status: JobStatus, rpt_list: &str) -> ScheduledJob {
    ScheduledJob {
        id: JobId(id),
        status,
        rpt_list: rpt_list.to_string(),
    }
}

/// Returns every record regardless of the query, and remembers the queries.
#[derive(Default)]
pub(crate) struct FakeWarehouse {
    pub records: Vec<LibraryRecord>,
    pub queries: RefCell<Vec<WarehouseQuery>>,
}

impl FakeWarehouse {
    pub fn new(records: Vec<LibraryRecord>) -> Self {
        FakeWarehouse {
            records,
            ..Default::default()
        }
    }
}

impl Warehouse for FakeWarehouse {
    fn fetch(&self, query: &WarehouseQuery) -> Result<Vec<LibraryRecord>> {
        self.queries.borrow_mut().push(query.clone());
        Ok(self.records.clone())
    }
}

/// A scheduler call, as recorded by [`FakeScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Jobs,
    Submit(SubmitRequest),
    SetResources(JobId, ResourceRequest),
    Resume(JobId),
    DisableRerun(JobId),
    Kill(JobId),
}

/// Records every call. Submissions are numbered from `next_id` unless
/// `no_job_id` is set; operations on ids in `failing` return errors.
pub(crate) struct FakeScheduler {
    pub listing: Vec<ScheduledJob>,
    pub next_id: Cell<u64>,
    pub no_job_id: bool,
    pub failing: HashSet<JobId>,
    pub calls: RefCell<Vec<Call>>,
}

impl Default for FakeScheduler {
    fn default() -> Self {
        FakeScheduler {
            listing: Vec::new(),
            next_id: Cell::new(1000),
            no_job_id: false,
            failing: HashSet::new(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl FakeScheduler {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Calls other than the listing.
    pub fn actions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| *call != Call::Jobs)
            .collect()
    }

    fn record(&self, call: Call, job: JobId) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.failing.contains(&job) {
            bail!("scheduler rejected job {job}");
        }
        Ok(())
    }
}

impl Scheduler for FakeScheduler {
    fn jobs(&self) -> Result<Vec<ScheduledJob>> {
        self.calls.borrow_mut().push(Call::Jobs);
        Ok(self.listing.clone())
    }

    fn submit_held(&self, request: &SubmitRequest) -> Result<Option<JobId>> {
        self.calls.borrow_mut().push(Call::Submit(request.clone()));
        if self.no_job_id {
            return Ok(None);
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Ok(Some(JobId(id)))
    }

    fn set_resources(&self, job: JobId, request: &ResourceRequest) -> Result<()> {
        self.record(Call::SetResources(job, request.clone()), job)
    }

    fn resume(&self, job: JobId) -> Result<()> {
        self.record(Call::Resume(job), job)
    }

    fn disable_rerun(&self, job: JobId) -> Result<()> {
        self.record(Call::DisableRerun(job), job)
    }

    fn kill(&self, job: JobId) -> Result<()> {
        self.record(Call::Kill(job), job)
    }
}

/// Object counts keyed by composition digest.
#[derive(Default)]
pub(crate) struct FakeStore {
    pub objects: HashMap<String, usize>,
    pub lookups: RefCell<Vec<String>>,
}

impl FakeStore {
    pub fn with_objects(digest: &str, count: usize) -> Self {
        FakeStore {
            objects: HashMap::from([(digest.to_string(), count)]),
            ..Default::default()
        }
    }
}

impl ObjectStore for FakeStore {
    fn count_objects(&self, _root: &str, metadata: &[(&str, &str)]) -> Result<usize> {
        let digest = metadata
            .iter()
            .find(|(attr, _)| *attr == crate::storage::COMPOSITION_ATTR)
            .map(|(_, value)| value.to_string())
            .unwrap_or_default();
        self.lookups.borrow_mut().push(digest.clone());
        Ok(self.objects.get(&digest).copied().unwrap_or(0))
    }
}
