//! LSF implementation of [`Scheduler`] on top of the `bjobs`, `bsub`, `bmod`,
//! `bresume` and `bkill` command line tools.

use super::{JobId, JobStatus, ResourceRequest, ScheduledJob, Scheduler, SubmitRequest};
use crate::process::{run_checked, run_output, shell_join, CommandFailed};
use anyhow::Result;
use itertools::Itertools;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::process::Command;

lazy_static! {
    /// One line of `bjobs -UF`, e.g.
    /// `Job <123>, ..., Status <PEND>, ..., Command <... --rpt_list '1:1;1:2' ...>`
    static ref BJOBS_LINE: Regex = Regex::new(
        r"^Job <([0-9]+)>.*?Status <([A-Z]+)>.*--rpt_list[ =]+'?([0-9:;]+)'?"
    )
    .unwrap();
    /// `bsub` response, e.g. `Job <123> is submitted to queue <normal>.`
    static ref BSUB_JOB_ID: Regex = Regex::new(r"Job <([0-9]+)> is submitted").unwrap();
}

/// `bjobs` messages that mean there is nothing to list.
const NO_JOBS_MESSAGES: [&str; 2] = ["No unfinished job found", "is not found"];

/// Parse the unformatted `bjobs -UF` listing. Lines that do not describe a
/// job with an rpt list are ignored.
pub fn parse_job_listing(listing: &str) -> Vec<ScheduledJob> {
    listing
        .lines()
        .filter_map(|line| {
            let caps = BJOBS_LINE.captures(line.trim())?;
            let id = caps[1].parse().ok()?;
            let status = match caps[2].parse() {
                Ok(status) => status,
                Err(_) => JobStatus::Other(caps[2].to_string()),
            };
            Some(ScheduledJob {
                id,
                status,
                rpt_list: caps[3].to_string(),
            })
        })
        .collect()
}

/// Extract the job id from a `bsub` response.
pub fn parse_submitted_job_id(response: &str) -> Option<JobId> {
    BSUB_JOB_ID
        .captures(response)
        .and_then(|caps| caps[1].parse().ok())
}

/// Render a resource requirement string, e.g.
/// `select[mem>8000] rusage[mem=8000,seq_merge=1,seq_irods=10]`.
pub fn resource_string(request: &ResourceRequest) -> String {
    let memory = request.memory_mb;
    let usage = std::iter::once(format!("mem={memory}"))
        .chain(
            request
                .tokens
                .iter()
                .map(|(name, count)| format!("{name}={count}")),
        )
        .join(",");
    format!("select[mem>{memory}] rusage[{usage}]")
}

/// Drives LSF through its command line tools.
pub struct LsfScheduler {
    /// Only jobs whose name starts with this prefix are listed.
    job_name_prefix: String,
}

impl LsfScheduler {
    pub fn new(job_name_prefix: impl Into<String>) -> Self {
        LsfScheduler {
            job_name_prefix: job_name_prefix.into(),
        }
    }

    fn bsub_command(request: &SubmitRequest) -> Command {
        let log_file = request
            .log_dir
            .join(format!("{}.%J.out", request.job_name));
        let resources = ResourceRequest {
            memory_mb: request.memory_mb,
            tokens: Vec::new(),
        };
        let mut cmd = Command::new("bsub");
        cmd.arg("-H")
            .arg("-J")
            .arg(&request.job_name)
            .arg("-q")
            .arg(&request.queue)
            .arg("-o")
            .arg(log_file)
            .arg("-M")
            .arg(request.memory_mb.to_string())
            .arg("-R")
            .arg(resource_string(&resources))
            // One quoted command line, so the listing shows `--rpt_list '...'`.
            .arg(shell_join(&request.command));
        cmd
    }

    fn run_on_job(&self, tool: &str, args: &[&str], job: JobId) -> Result<()> {
        let mut cmd = Command::new(tool);
        cmd.args(args).arg(job.to_string());
        let out = run_checked(&mut cmd)?;
        debug!("{tool} {job}: {}", out.trim());
        Ok(())
    }
}

impl Scheduler for LsfScheduler {
    fn jobs(&self) -> Result<Vec<ScheduledJob>> {
        let mut cmd = Command::new("bjobs");
        cmd.arg("-UF").arg("-J").arg(format!("{}*", self.job_name_prefix));
        let output = run_output(&mut cmd)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            if NO_JOBS_MESSAGES.iter().any(|m| stderr.contains(m)) {
                return Ok(Vec::new());
            }
            return Err(CommandFailed {
                command: "bjobs".to_string(),
                status: output.status,
                stderr: stderr.trim().to_string(),
            }
            .into());
        }
        Ok(parse_job_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn submit_held(&self, request: &SubmitRequest) -> Result<Option<JobId>> {
        let response = run_checked(&mut Self::bsub_command(request))?;
        let job = parse_submitted_job_id(&response);
        if job.is_none() {
            warn!("unexpected bsub response: {}", response.trim());
        }
        Ok(job)
    }

    fn set_resources(&self, job: JobId, request: &ResourceRequest) -> Result<()> {
        self.run_on_job("bmod", &["-R", &resource_string(request)], job)
    }

    fn resume(&self, job: JobId) -> Result<()> {
        self.run_on_job("bresume", &[], job)
    }

    fn disable_rerun(&self, job: JobId) -> Result<()> {
        self.run_on_job("bmod", &["-rnn"], job)
    }

    fn kill(&self, job: JobId) -> Result<()> {
        self.run_on_job("bkill", &[], job)
    }
}
