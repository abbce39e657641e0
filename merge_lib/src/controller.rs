//! Carry out merge decisions through the scheduler, or locally.

use crate::command::MergeCommand;
use crate::config::RunConfig;
use crate::process::display_command;
use crate::scheduler::{JobId, ResourceRequest, Scheduler, SubmitRequest};
use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use merge_params::SiteParams;
use std::path::PathBuf;
use std::process::Command;

/// Length of the digest prefix that tells apart jobs of one library.
const JOB_NAME_DIGEST_LEN: usize = 8;

/// Name of a merge job: `<prefix>_<library>_<digest prefix>_<YYYYMMDDHHMMSS>`.
///
/// A library can have several candidate groups in one pass (one per run type
/// or chemistry), so the composition digest is part of the name.
pub fn job_name(prefix: &str, library_id: &str, digest: &str, started: DateTime<Utc>) -> String {
    let short = digest.get(..JOB_NAME_DIGEST_LEN).unwrap_or(digest);
    format!("{prefix}_{library_id}_{short}_{}", started.format("%Y%m%d%H%M%S"))
}

/// What the controller needs from the run options and site parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub job_name_prefix: String,
    pub queue: String,
    pub memory_mb: u32,
    pub merge_token: String,
    pub storage_token: String,
    /// Units of `storage_token` per job.
    pub token_count: u32,
    pub log_dir: Option<PathBuf>,
    /// Leave jobs held after submission.
    pub interactive: bool,
    pub load_only: bool,
}

impl ControllerSettings {
    pub fn new(config: &RunConfig, params: &SiteParams) -> Self {
        ControllerSettings {
            job_name_prefix: params.job_name_prefix.clone(),
            queue: params.queue.clone(),
            memory_mb: params.memory_mb,
            merge_token: params.merge_token_resource.clone(),
            storage_token: params.storage_token_resource.clone(),
            token_count: config.token_count,
            log_dir: config.log_dir.clone(),
            interactive: config.interactive,
            load_only: config.load_only,
        }
    }
}

pub struct JobController<'a> {
    scheduler: &'a dyn Scheduler,
    settings: ControllerSettings,
}

impl<'a> JobController<'a> {
    pub fn new(scheduler: &'a dyn Scheduler, settings: ControllerSettings) -> Self {
        JobController {
            scheduler,
            settings,
        }
    }

    /// Enqueue `command` held. `None` if the scheduler gave no job id.
    pub fn submit(&self, command: &MergeCommand, job_name: &str) -> Result<Option<JobId>> {
        let log_dir = self
            .settings
            .log_dir
            .clone()
            .context("A log directory is required to submit jobs")?;
        let request = SubmitRequest {
            job_name: job_name.to_string(),
            command: command.args().to_vec(),
            queue: self.settings.queue.clone(),
            memory_mb: self.settings.memory_mb,
            log_dir,
        };
        self.scheduler.submit_held(&request)
    }

    /// Memory, one merge token and, unless only loading, the storage read
    /// tokens.
    pub fn resource_request(&self) -> ResourceRequest {
        let mut tokens = vec![(self.settings.merge_token.clone(), 1)];
        if !self.settings.load_only {
            tokens.push((self.settings.storage_token.clone(), self.settings.token_count));
        }
        ResourceRequest {
            memory_mb: self.settings.memory_mb,
            tokens,
        }
    }

    /// Set the job's reservation and release it. In interactive mode the job
    /// is left held.
    pub fn resume(&self, job: JobId) -> Result<()> {
        if self.settings.interactive {
            info!("job {job} left held for manual release");
            return Ok(());
        }
        self.scheduler
            .set_resources(job, &self.resource_request())
            .with_context(|| format!("Setting resources of job {job}"))?;
        self.scheduler
            .resume(job)
            .with_context(|| format!("Resuming job {job}"))
    }

    /// Release, disable rerun of, then kill a queued job.
    pub fn kill(&self, job: JobId) -> Result<()> {
        // A job that is not held cannot be released; that is not a failure.
        if let Err(err) = self.scheduler.resume(job) {
            warn!("could not release job {job} before killing it: {err:#}");
        }
        self.scheduler
            .disable_rerun(job)
            .with_context(|| format!("Disabling rerun of job {job}"))?;
        self.scheduler
            .kill(job)
            .with_context(|| format!("Killing job {job}"))?;
        info!("killed job {job}");
        Ok(())
    }

    /// Submit held, then resume. `Ok(None)` if no job id came back, in which
    /// case nothing else is done.
    pub fn launch(&self, command: &MergeCommand, job_name: &str) -> Result<Option<JobId>> {
        let Some(job) = self.submit(command, job_name)? else {
            return Ok(None);
        };
        info!("submitted job {job} {job_name} for {}", command.rpt_list());
        self.resume(job)
            .with_context(|| format!("Job {job} remains held"))?;
        Ok(Some(job))
    }
}

/// Run a merge to completion in the foreground.
pub fn run_local(command: &MergeCommand) -> Result<()> {
    let (program, args) = command
        .args()
        .split_first()
        .context("Empty merge command")?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    let rendered = display_command(&cmd);
    info!("running {rendered}");
    let status = cmd
        .status()
        .with_context(|| format!("running {rendered}"))?;
    ensure!(status.success(), "`{rendered}` exited with {status}");
    Ok(())
}
