//! Decide, per merge command, whether to run it, skip it, or run it and
//! preempt older queued jobs over an overlapping composition.
//!
//! The decision is made against a snapshot of the scheduler's job listing
//! taken once per pass, plus storage and local marker lookups made per
//! candidate. The checks below are tried in order and the first that applies
//! wins:
//!
//! 1. a queued job with the identical composition: skip;
//! 2. merged output already in storage or locally completed: skip, unless
//!    forced;
//! 3. local mode: run;
//! 4. load-only mode: run only if a local merge completed and is not already
//!    being loaded;
//! 5. scheduler mode: run, killing pending jobs whose composition overlaps.

use crate::command::MergeCommand;
use crate::scheduler::{JobId, ScheduledJob};
use crate::storage::{merged_output_query, MergeDirs, ObjectStore};
use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info, warn};
use merge_types::Composition;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Run,
    /// Run, after killing these pending jobs.
    RunAndKill { jobs: Vec<JobId> },
    Skip { reason: SkipReason },
}

impl Decision {
    pub fn is_run(&self) -> bool {
        !matches!(self, Decision::Skip { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Run => write!(f, "run"),
            Decision::RunAndKill { jobs } => {
                write!(f, "run, killing {}", jobs.iter().join(", "))
            }
            Decision::Skip { reason } => write!(f, "skip, {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyQueued { job: JobId },
    InStorage { objects: usize },
    MergeCompleted,
    /// Load-only: the merge finished and its output is being loaded.
    LoadInProgress,
    /// Load-only: there is no finished local merge to load.
    MergeNotCompleted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyQueued { job } => write!(f, "already queued as job {job}"),
            SkipReason::InStorage { objects } => {
                write!(f, "{objects} merged object(s) already in storage")
            }
            SkipReason::MergeCompleted => write!(f, "merge already completed locally"),
            SkipReason::LoadInProgress => write!(f, "already loading to storage"),
            SkipReason::MergeNotCompleted => write!(f, "no completed merge to load"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardMode {
    pub force: bool,
    pub load_only: bool,
    pub use_scheduler: bool,
}

pub struct DuplicationGuard<'a> {
    /// The scheduler snapshot, each job with its parsed composition.
    jobs: Vec<(ScheduledJob, Composition)>,
    store: &'a dyn ObjectStore,
    storage_root: &'a str,
    dirs: &'a MergeDirs,
    mode: GuardMode,
}

impl<'a> DuplicationGuard<'a> {
    /// Jobs whose rpt list cannot be parsed are left out of every decision.
    pub fn new(
        jobs: Vec<ScheduledJob>,
        store: &'a dyn ObjectStore,
        storage_root: &'a str,
        dirs: &'a MergeDirs,
        mode: GuardMode,
    ) -> Self {
        let jobs = jobs
            .into_iter()
            .filter_map(|job| match job.rpt_list.parse::<Composition>() {
                Ok(composition) => Some((job, composition)),
                Err(err) => {
                    warn!("ignoring job {}: {err:#}", job.id);
                    None
                }
            })
            .collect();
        DuplicationGuard {
            jobs,
            store,
            storage_root,
            dirs,
            mode,
        }
    }

    pub fn num_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// An `Err` means a lookup failed and no decision could be made.
    pub fn decide(&self, command: &MergeCommand) -> Result<Decision> {
        let composition = command.composition();
        let digest = command.digest();

        if let Some((job, _)) = self
            .jobs
            .iter()
            .find(|(_, queued)| queued.digest() == digest)
        {
            return Ok(skip(SkipReason::AlreadyQueued { job: job.id }));
        }

        if !self.mode.force {
            let objects = self
                .store
                .count_objects(self.storage_root, &merged_output_query(digest))
                .with_context(|| format!("Storage lookup of {composition} failed"))?;
            if objects > 0 {
                return Ok(skip(SkipReason::InStorage { objects }));
            }
            if !self.mode.load_only && self.dirs.is_merge_completed(digest) {
                return Ok(skip(SkipReason::MergeCompleted));
            }
        }

        if self.mode.load_only {
            return Ok(match (
                self.dirs.is_merge_completed(digest),
                self.dirs.is_loading(digest),
            ) {
                (true, true) => skip(SkipReason::LoadInProgress),
                (true, false) => Decision::Run,
                (false, _) => skip(SkipReason::MergeNotCompleted),
            });
        }

        if !self.mode.use_scheduler {
            return Ok(Decision::Run);
        }

        let mut preempt = Vec::new();
        for (job, queued) in &self.jobs {
            let shared = composition.shared_components(queued);
            if shared.is_empty() {
                continue;
            }
            let shared = shared.iter().join(";");
            if job.status.is_pending() {
                info!(
                    "job {} ({}) overlaps {composition} on {shared}, marking it for kill",
                    job.id, job.status
                );
                preempt.push(job.id);
            } else {
                info!(
                    "job {} ({}) overlaps {composition} on {shared}, leaving it be",
                    job.id, job.status
                );
            }
        }
        Ok(if preempt.is_empty() {
            Decision::Run
        } else {
            Decision::RunAndKill { jobs: preempt }
        })
    }
}

fn skip(reason: SkipReason) -> Decision {
    debug!("skip: {reason}");
    Decision::Skip { reason }
}
