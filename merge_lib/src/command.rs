//! Render a candidate group into an invocation of the merge executable.

use crate::config::RunConfig;
use crate::grouper::CandidateGroup;
use crate::process::shell_join;
use merge_params::SiteParams;
use merge_types::Composition;
use std::path::Path;

/// The run options that change the rendered command.
#[derive(Debug, Clone, Copy)]
pub struct CommandOptions<'a> {
    pub executable: &'a str,
    pub local: bool,
    pub use_irods: bool,
    pub load_only: bool,
    pub random_replicate: bool,
    /// Set only when output goes somewhere other than the site default.
    pub output_root: Option<&'a Path>,
}

impl<'a> CommandOptions<'a> {
    pub fn new(config: &'a RunConfig, params: &'a SiteParams) -> Self {
        CommandOptions {
            executable: &params.merge_executable,
            local: config.local,
            use_irods: config.use_irods,
            load_only: config.load_only,
            random_replicate: config.random_replicate,
            output_root: config
                .output_root
                .as_deref()
                .filter(|root| *root != params.default_output_root),
        }
    }
}

/// A rendered merge invocation and the composition it merges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCommand {
    args: Vec<String>,
    composition: Composition,
    library_id: String,
}

impl MergeCommand {
    /// Program followed by its arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// The dedup and lookup key of this merge.
    pub fn digest(&self) -> &str {
        self.composition.digest()
    }

    pub fn rpt_list(&self) -> String {
        self.composition.rpt_list()
    }

    pub fn library_id(&self) -> &str {
        &self.library_id
    }

    /// The invocation as a single shell command line.
    pub fn command_line(&self) -> String {
        shell_join(&self.args)
    }
}

/// Build the merge command of a candidate group.
pub fn build_merge_command(group: &CandidateGroup, options: &CommandOptions<'_>) -> MergeCommand {
    let rep = group.representative();
    let key = group.key();
    let composition = group.composition().clone();

    let valued: [(&str, Option<String>); 14] = [
        ("--rpt_list", Some(composition.rpt_list())),
        ("--library_id", Some(rep.library_id.clone())),
        ("--sample_id", Some(rep.sample_id.clone())),
        ("--sample_name", Some(rep.sample_name.clone())),
        ("--sample_common_name", Some(rep.sample_common_name.clone())),
        ("--sample_accession_number", rep.sample_accession_number.clone()),
        ("--study_id", Some(rep.study_id.clone())),
        ("--study_name", Some(rep.study_name.clone())),
        ("--study_title", Some(rep.study_title.clone())),
        ("--study_accession_number", rep.study_accession_number.clone()),
        ("--aligned", Some(u8::from(rep.is_aligned()).to_string())),
        ("--instrument_type", Some(key.instrument_type.clone())),
        ("--run_type", Some(key.run_type.clone())),
        ("--chemistry", Some(key.chemistry.clone())),
    ];

    let mut args = vec![options.executable.to_string()];
    for (flag, value) in valued {
        if let Some(value) = value {
            args.push(flag.to_string());
            args.push(value);
        }
    }

    let switches = [
        options.local.then_some("--local"),
        (options.use_irods && !options.load_only).then_some("--use_irods"),
        options.random_replicate.then_some("--random_replicate"),
    ];
    args.extend(switches.into_iter().flatten().map(String::from));

    if let Some(root) = options.output_root {
        args.push("--default_root_dir".to_string());
        args.push(root.display().to_string());
    }
    if options.load_only {
        args.extend(["--load_only", "--use_irods"].map(String::from));
    }

    MergeCommand {
        args,
        composition,
        library_id: rep.library_id.clone(),
    }
}
