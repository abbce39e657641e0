//! The cluster scheduler as seen by the merge generator: a structured view of
//! the live job listing plus the primitives needed to submit, hold, resume
//! and kill merge jobs.

pub mod lsf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use strum_macros::EnumString;

pub use lsf::LsfScheduler;

/// Scheduler assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<JobId, Self::Err> {
        s.trim().parse().map(JobId)
    }
}

/// Job state as reported by the scheduler.
#[derive(EnumString, Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum JobStatus {
    #[strum(serialize = "PEND")]
    Pending,
    /// Pending and held, which is how merge jobs are first submitted.
    #[strum(serialize = "PSUSP")]
    HeldPending,
    #[strum(serialize = "RUN")]
    Running,
    /// Suspended by its owner after it started running.
    #[strum(serialize = "USUSP")]
    UserSuspended,
    /// Suspended by the system after it started running.
    #[strum(serialize = "SSUSP")]
    SystemSuspended,
    #[strum(serialize = "DONE")]
    Done,
    #[strum(serialize = "EXIT")]
    Exited,
    #[strum(default)]
    Other(String),
}

impl JobStatus {
    /// True for jobs that have not started yet. Only these may be preempted.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::HeldPending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Pending => "PEND",
            JobStatus::HeldPending => "PSUSP",
            JobStatus::Running => "RUN",
            JobStatus::UserSuspended => "USUSP",
            JobStatus::SystemSuspended => "SSUSP",
            JobStatus::Done => "DONE",
            JobStatus::Exited => "EXIT",
            JobStatus::Other(status) => status,
        })
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.to_string()
    }
}

/// One job from the scheduler's live listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub status: JobStatus,
    /// The `--rpt_list` argument of the job's command, as listed.
    pub rpt_list: String,
}

/// Everything needed to enqueue one held merge job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub job_name: String,
    /// Program and arguments of the merge command.
    pub command: Vec<String>,
    pub queue: String,
    pub memory_mb: u32,
    /// Directory the job's log file is written to.
    pub log_dir: PathBuf,
}

/// A resource reservation: memory plus named token resources and the number
/// of units requested of each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub memory_mb: u32,
    pub tokens: Vec<(String, u32)>,
}

/// Primitives of the cluster scheduler.
///
/// Every call is a blocking round trip. An `Err` means the scheduler command
/// itself failed.
pub trait Scheduler {
    /// The current job listing. Jobs without an rpt list are not included.
    fn jobs(&self) -> Result<Vec<ScheduledJob>>;

    /// Enqueue a job in the held state. Returns `None` when the scheduler
    /// accepted the request but reported no job id.
    fn submit_held(&self, request: &SubmitRequest) -> Result<Option<JobId>>;

    /// Replace the resource reservation of a queued job.
    fn set_resources(&self, job: JobId, request: &ResourceRequest) -> Result<()>;

    /// Release the hold on a job.
    fn resume(&self, job: JobId) -> Result<()>;

    /// Stop the scheduler from rerunning a job after it is killed.
    fn disable_rerun(&self, job: JobId) -> Result<()>;

    fn kill(&self, job: JobId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!("PEND".parse::<JobStatus>().unwrap(), JobStatus::Pending);
        assert_eq!("PSUSP".parse::<JobStatus>().unwrap(), JobStatus::HeldPending);
        assert_eq!("USUSP".parse::<JobStatus>().unwrap(), JobStatus::UserSuspended);
        assert_eq!("SSUSP".parse::<JobStatus>().unwrap(), JobStatus::SystemSuspended);
        assert_eq!(
            "ZOMBI".parse::<JobStatus>().unwrap(),
            JobStatus::Other("ZOMBI".to_string())
        );
        assert!(JobStatus::Pending.is_pending());
        assert!(JobStatus::HeldPending.is_pending());
        assert!(!JobStatus::Running.is_pending());
        assert!(!JobStatus::UserSuspended.is_pending());
        assert!(!JobStatus::SystemSuspended.is_pending());
    }

    #[test]
    fn test_status_display_matches_listing() {
        for token in ["PEND", "PSUSP", "RUN", "USUSP", "SSUSP", "DONE", "EXIT", "ZOMBI"] {
            assert_eq!(token.parse::<JobStatus>().unwrap().to_string(), token);
        }
    }

    #[test]
    fn test_job_id() {
        assert_eq!(" 1234 ".parse::<JobId>().unwrap(), JobId(1234));
        assert!("abc".parse::<JobId>().is_err());
        assert_eq!(JobId(7).to_string(), "7");
    }
}
