//! One merge generation pass: query, group, decide and act.

use crate::command::{build_merge_command, CommandOptions, MergeCommand};
use crate::config::{PreflightError, RunConfig};
use crate::controller::{job_name, run_local, ControllerSettings, JobController};
use crate::grouper::{CandidateGrouper, Partition};
use crate::guard::{Decision, DuplicationGuard, GuardMode};
use crate::scheduler::{JobId, Scheduler};
use crate::storage::{MergeDirs, ObjectStore};
use crate::warehouse::{Warehouse, WarehouseQuery};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use merge_params::SiteParams;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// What was done about a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Dry run; nothing was done.
    DryRun,
    Submitted { job: JobId },
    /// Merged locally.
    Completed,
    Skipped,
    /// The candidate was abandoned for this pass.
    Failed { error: String },
}

/// The decision about one candidate and what came of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub library_id: String,
    pub rpt_list: String,
    pub digest: String,
    pub command: String,
    /// Absent if no decision could be made.
    pub decision: Option<Decision>,
    pub outcome: Outcome,
}

/// Everything one pass decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub started: DateTime<Utc>,
    pub decisions: Vec<DecisionRecord>,
    /// Partitions left for a later pass because a component is being archived.
    pub deferred: Vec<String>,
    /// Partitions that are not merge candidates, with the reason.
    pub skipped_groups: Vec<String>,
}

impl PassSummary {
    fn new(started: DateTime<Utc>) -> Self {
        PassSummary {
            started,
            decisions: Vec::new(),
            deferred: Vec::new(),
            skipped_groups: Vec::new(),
        }
    }

    /// Candidates decided as run or run-and-kill.
    pub fn num_run(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.decision.as_ref().is_some_and(Decision::is_run))
            .count()
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.decisions.iter().filter(|d| pred(&d.outcome)).count()
    }

    pub fn num_failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn log_counts(&self) {
        info!(
            "{} candidate(s): {} to run, {} skipped, {} failed; {} group(s) deferred, {} not candidates",
            self.decisions.len(),
            self.num_run(),
            self.count(|o| *o == Outcome::Skipped),
            self.num_failed(),
            self.deferred.len(),
            self.skipped_groups.len()
        );
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let writer =
            BufWriter::new(File::create(path).with_context(|| path.display().to_string())?);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Error writing {}", path.display()))
    }
}

pub struct Orchestrator<'a> {
    config: RunConfig,
    params: SiteParams,
    warehouse: &'a dyn Warehouse,
    scheduler: &'a dyn Scheduler,
    store: &'a dyn ObjectStore,
    /// Name of the host this pass runs on.
    host: String,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: RunConfig,
        params: SiteParams,
        warehouse: &'a dyn Warehouse,
        scheduler: &'a dyn Scheduler,
        store: &'a dyn ObjectStore,
        host: impl Into<String>,
    ) -> Self {
        Orchestrator {
            config,
            params,
            warehouse,
            scheduler,
            store,
            host: host.into(),
        }
    }

    /// Fail before any side effect if this pass must not run here.
    pub fn preflight(&self) -> Result<(), PreflightError> {
        self.config.check_logging()?;
        if self.config.use_scheduler && !self.params.is_submission_host(&self.host) {
            return Err(PreflightError::WrongHost {
                host: self.host.clone(),
                allowed: self.params.submission_hosts.clone(),
            });
        }
        Ok(())
    }

    /// Run one pass. `now` anchors the lookback window and names the jobs.
    pub fn run(&self, now: DateTime<Utc>) -> Result<PassSummary> {
        self.preflight()?;
        let config = &self.config;

        let query = WarehouseQuery::new(config.scope(now), config.library_ids.clone());
        info!("querying {query}");
        let records = self
            .warehouse
            .fetch(&query)
            .with_context(|| format!("Warehouse query for {query} failed"))?;
        info!("{} record(s) found", records.len());

        // One snapshot for the whole pass.
        let jobs = if config.use_scheduler {
            self.scheduler.jobs().context("Unable to list scheduler jobs")?
        } else {
            Vec::new()
        };

        let dirs = MergeDirs::new(
            config
                .output_root
                .clone()
                .unwrap_or_else(|| self.params.default_output_root.clone()),
        );
        let guard = DuplicationGuard::new(
            jobs,
            self.store,
            &self.params.storage_root,
            &dirs,
            GuardMode {
                force: config.force,
                load_only: config.load_only,
                use_scheduler: config.use_scheduler,
            },
        );
        info!("{} queued merge job(s)", guard.num_jobs());
        let controller = JobController::new(
            self.scheduler,
            ControllerSettings::new(config, &self.params),
        );
        let options = CommandOptions::new(config, &self.params);

        let mut summary = PassSummary::new(now);
        let grouper = CandidateGrouper::new(records);
        info!("{} partition(s)", grouper.num_partitions());
        for partition in grouper.partitions() {
            let group = match partition? {
                Partition::Candidate(group) => group,
                Partition::Deferred(key) => {
                    info!("deferring {key}: archival in progress");
                    summary.deferred.push(key.to_string());
                    continue;
                }
                Partition::Skipped { key, reason } => {
                    if reason.is_inconsistent() {
                        warn!("skipping {key}: {reason}");
                    } else {
                        info!("skipping {key}: {reason}");
                    }
                    summary.skipped_groups.push(format!("{key}: {reason}"));
                    continue;
                }
            };

            let command = build_merge_command(&group, &options);
            let (decision, outcome) = match guard.decide(&command) {
                Ok(decision) => {
                    let outcome = self.act(&command, &decision, &controller, now);
                    (Some(decision), outcome)
                }
                Err(err) => {
                    error!("{}: {err:#}", command.rpt_list());
                    let error = format!("{err:#}");
                    (None, Outcome::Failed { error })
                }
            };
            summary.decisions.push(DecisionRecord {
                library_id: command.library_id().to_string(),
                rpt_list: command.rpt_list(),
                digest: command.digest().to_string(),
                command: command.command_line(),
                decision,
                outcome,
            });

            if let Some(max) = config.max_candidates {
                if summary.num_run() >= max {
                    info!("reached the maximum of {max} candidate(s), stopping");
                    break;
                }
            }
        }
        summary.log_counts();
        Ok(summary)
    }

    fn act(
        &self,
        command: &MergeCommand,
        decision: &Decision,
        controller: &JobController<'_>,
        now: DateTime<Utc>,
    ) -> Outcome {
        let command_line = command.command_line();
        if let Decision::Skip { reason } = decision {
            info!("skipping {}: {reason}", command.rpt_list());
            return Outcome::Skipped;
        }
        if self.config.dry_run {
            info!("dry run, would {decision}: {command_line}");
            return Outcome::DryRun;
        }

        if let Decision::RunAndKill { jobs } = decision {
            for &job in jobs {
                if let Err(err) = controller.kill(job) {
                    warn!("failed to kill job {job}: {err:#}");
                }
            }
        }

        let result = if self.config.use_scheduler {
            let name = job_name(
                &self.params.job_name_prefix,
                command.library_id(),
                command.digest(),
                now,
            );
            controller.launch(command, &name).map(|job| match job {
                Some(job) => Outcome::Submitted { job },
                None => {
                    let error = format!("no job id returned for {command_line}");
                    error!("{error}");
                    Outcome::Failed { error }
                }
            })
        } else {
            run_local(command).map(|()| Outcome::Completed)
        };
        result.unwrap_or_else(|err| {
            error!("{}: {err:#}", command.rpt_list());
            Outcome::Failed {
                error: format!("{err:#}"),
            }
        })
    }
}
