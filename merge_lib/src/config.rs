use crate::warehouse::Scope;
use anyhow::{ensure, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_TOKEN_COUNT: u32 = 10;

/// Conditions that stop a run before it has any side effect.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PreflightError {
    #[error("A log directory is required when submitting jobs to the scheduler.")]
    MissingLogDir,

    #[error(
        "Merge jobs must be submitted from one of the hosts {}; this is {host}.",
        allowed.join(", ")
    )]
    WrongHost { host: String, allowed: Vec<String> },
}

/// Options of one merge generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Log every decision, act on none.
    pub dry_run: bool,
    pub verbose: bool,
    /// Merge without loading results to storage.
    pub local: bool,
    /// Only load finished local merges to storage.
    pub load_only: bool,
    /// Merge even if output already exists.
    pub force: bool,
    pub random_replicate: bool,
    /// Leave submitted jobs held.
    pub interactive: bool,
    pub use_scheduler: bool,
    /// Ask the merge to read inputs from storage.
    pub use_irods: bool,
    pub lookback_days: u32,
    pub output_root: Option<PathBuf>,
    pub max_candidates: Option<usize>,
    pub log_dir: Option<PathBuf>,
    /// Units of the storage token resource requested per job.
    pub token_count: u32,
    pub run_ids: Vec<u32>,
    pub library_ids: Vec<String>,
    pub study_id: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            dry_run: false,
            verbose: false,
            local: false,
            load_only: false,
            force: false,
            random_replicate: false,
            interactive: false,
            use_scheduler: false,
            use_irods: false,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            output_root: None,
            max_candidates: None,
            log_dir: None,
            token_count: DEFAULT_TOKEN_COUNT,
            run_ids: Vec::new(),
            library_ids: Vec::new(),
            study_id: None,
        }
    }
}

impl RunConfig {
    /// Apply implied options and reject inconsistent combinations.
    pub fn validated(mut self) -> Result<Self> {
        if self.dry_run {
            self.local = true;
            self.verbose = true;
        }
        self.check_logging()?;
        ensure!(
            self.study_id.is_none() || self.run_ids.is_empty(),
            "A study and a list of runs cannot both be given."
        );
        ensure!(
            self.max_candidates != Some(0),
            "The maximum number of candidates must be at least 1."
        );
        Ok(self)
    }

    pub fn check_logging(&self) -> Result<(), PreflightError> {
        if self.use_scheduler && self.log_dir.is_none() {
            return Err(PreflightError::MissingLogDir);
        }
        Ok(())
    }

    /// The warehouse scope of this run.
    pub fn scope(&self, now: DateTime<Utc>) -> Scope {
        if let Some(study) = &self.study_id {
            Scope::Study(study.clone())
        } else if !self.run_ids.is_empty() {
            Scope::Runs(self.run_ids.clone())
        } else {
            Scope::CompletedAfter(cutoff(now, self.lookback_days))
        }
    }
}

/// Start of the lookback window: `lookback_days` whole days before `now`.
pub fn cutoff(now: DateTime<Utc>, lookback_days: u32) -> DateTime<Utc> {
    now - Duration::hours(24 * i64::from(lookback_days))
}
