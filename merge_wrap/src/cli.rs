use crate::utils::read_run_id_list;
use anyhow::Result;
use clap::Parser;
use merge_lib::config::{DEFAULT_LOOKBACK_DAYS, DEFAULT_TOKEN_COUNT};
use merge_lib::RunConfig;
use std::path::PathBuf;

/// Find libraries whose sequencing components are ready to be merged, and
/// queue or run one merge per library.
#[derive(Parser, Debug, Clone)]
#[clap(name = "merge_generator")]
pub struct MergeGeneratorArgs {
    /// JSON export of warehouse records.
    #[clap(long, value_name = "PATH")]
    pub records: PathBuf,

    /// Site parameters file. Defaults to merge_params.toml next to the
    /// executable.
    #[clap(long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Write a JSON summary of every decision to this file.
    #[clap(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Append log lines to this file instead of stderr.
    #[clap(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log every decision without acting on any. Implies --local and
    /// --verbose.
    #[clap(long)]
    pub dry_run: bool,

    #[clap(long)]
    pub verbose: bool,

    /// Merge without loading the results to storage.
    #[clap(long)]
    pub local: bool,

    /// Only load finished local merges to storage.
    #[clap(long)]
    pub load_only: bool,

    /// Merge even when merged output already exists.
    #[clap(long)]
    pub force: bool,

    /// Select a random replicate when merging.
    #[clap(long)]
    pub random_replicate: bool,

    /// Leave submitted jobs held for manual release.
    #[clap(long)]
    pub interactive: bool,

    /// Submit merges as LSF jobs instead of running them here.
    #[clap(long)]
    pub use_lsf: bool,

    /// Have merges read their inputs from iRODS.
    #[clap(long)]
    pub use_irods: bool,

    /// Look for runs that completed QC within this many days.
    #[clap(long, value_name = "NUM", default_value_t = DEFAULT_LOOKBACK_DAYS)]
    pub lookback_days: u32,

    /// Write merges under this directory.
    #[clap(long, value_name = "PATH")]
    pub output_root: Option<PathBuf>,

    /// Stop after this many merges are queued or run.
    #[clap(long, value_name = "NUM")]
    pub max_candidates: Option<usize>,

    /// Directory for job logs. Required with --use-lsf.
    #[clap(long, value_name = "PATH")]
    pub log_dir: Option<PathBuf>,

    /// Units of the storage read token requested by each job.
    #[clap(long, value_name = "NUM", default_value_t = DEFAULT_TOKEN_COUNT)]
    pub token_count: u32,

    /// Only consider these runs.
    #[clap(long = "run-id", value_name = "ID", value_delimiter = ',')]
    pub run_ids: Vec<u32>,

    /// Read run ids from a file, separated by whitespace or commas.
    #[clap(long, value_name = "PATH", conflicts_with = "run_ids")]
    pub run_id_list_file: Option<PathBuf>,

    /// Only merge these libraries.
    #[clap(long = "library-id", value_name = "ID", value_delimiter = ',')]
    pub library_ids: Vec<String>,

    /// Consider every run of this study.
    #[clap(long, value_name = "ID", conflicts_with_all = ["run_ids", "run_id_list_file"])]
    pub study_id: Option<String>,
}

impl MergeGeneratorArgs {
    /// The validated options of this run.
    pub fn run_config(&self) -> Result<RunConfig> {
        let run_ids = match &self.run_id_list_file {
            Some(path) => read_run_id_list(path)?,
            None => self.run_ids.clone(),
        };
        RunConfig {
            dry_run: self.dry_run,
            verbose: self.verbose,
            local: self.local,
            load_only: self.load_only,
            force: self.force,
            random_replicate: self.random_replicate,
            interactive: self.interactive,
            use_scheduler: self.use_lsf,
            use_irods: self.use_irods,
            lookback_days: self.lookback_days,
            output_root: self.output_root.clone(),
            max_candidates: self.max_candidates,
            log_dir: self.log_dir.clone(),
            token_count: self.token_count,
            run_ids,
            library_ids: self.library_ids.clone(),
            study_id: self.study_id.clone(),
        }
        .validated()
    }
}
