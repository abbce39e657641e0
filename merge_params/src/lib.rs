//! Site parameters of the merge generator.
//!
//! These describe the deployment rather than one run: which executable
//! performs a merge, where jobs go, which token resources bound them and
//! where merged output lives. They are read from `merge_params.toml`.

// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]
// Other warnings (as of rust 1.55)
#![deny(
    confusable_idents,
    const_item_mutation,
    deprecated,
    elided_lifetimes_in_paths,
    irrefutable_let_patterns,
    non_shorthand_field_patterns,
    renamed_and_removed_lints,
    stable_features,
    trivial_bounds,
    type_alias_bounds,
    unconditional_recursion,
    unknown_lints,
    unused_comparisons,
    while_true
)]

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the parameters file looked up next to the running executable.
pub const PARAMS_FILE_NAME: &str = "merge_params.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SiteParams {
    /// Executable that merges the components of one library.
    pub merge_executable: String,
    /// Scheduler queue merge jobs are submitted to.
    pub queue: String,
    /// Memory reserved for each merge job, in MB.
    pub memory_mb: u32,
    /// Token resource bounding the number of simultaneous merges.
    pub merge_token_resource: String,
    /// Token resource bounding simultaneous reads from the storage backend.
    pub storage_token_resource: String,
    /// Hosts allowed to submit merge jobs. Empty allows any host.
    pub submission_hosts: Vec<String>,
    /// Storage collection merged files are loaded under.
    pub storage_root: String,
    /// Storage zone passed to metadata queries.
    pub storage_zone: Option<String>,
    /// Local directory merges are written under unless overridden per run.
    pub default_output_root: PathBuf,
    /// Prefix of scheduler job names.
    pub job_name_prefix: String,
}

impl Default for SiteParams {
    fn default() -> Self {
        SiteParams {
            merge_executable: "library_merge".to_string(),
            queue: "normal".to_string(),
            memory_mb: 8000,
            merge_token_resource: "seq_merge".to_string(),
            storage_token_resource: "seq_irods".to_string(),
            submission_hosts: Vec::new(),
            storage_root: "/seq/illumina/library_merge".to_string(),
            storage_zone: None,
            default_output_root: PathBuf::from("library_merge"),
            job_name_prefix: "seq_merge".to_string(),
        }
    }
}

macro_rules! warn_non_default {
    ($params:expr, $defaults:expr, $($field:ident),+ $(,)?) => {
        $(
            if $params.$field != $defaults.$field {
                warn!("using non-default {} = {:?}", stringify!($field), $params.$field);
            }
        )+
    };
}

impl SiteParams {
    /// Load the site parameters.
    ///
    /// An explicit path must exist. Without one, `merge_params.toml` next to
    /// the running executable is used if present, and the built-in defaults
    /// otherwise.
    pub fn load(path: Option<&Path>) -> Result<SiteParams> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let path = std::env::current_exe()
            .context("Unable to locate the running executable")?
            .with_file_name(PARAMS_FILE_NAME);
        if !path.exists() {
            warn!(
                "could not find {PARAMS_FILE_NAME} at {}, falling back to defaults",
                path.display()
            );
            return Ok(SiteParams::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<SiteParams> {
        let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        Self::from_toml_str(&s).with_context(|| path.display().to_string())
    }

    pub fn from_toml_str(s: &str) -> Result<SiteParams> {
        let params: SiteParams = toml::from_str(s)?;
        params.warn_non_default();
        Ok(params)
    }

    fn warn_non_default(&self) {
        warn_non_default!(
            self,
            SiteParams::default(),
            merge_executable,
            queue,
            memory_mb,
            merge_token_resource,
            storage_token_resource,
            submission_hosts,
            storage_root,
            storage_zone,
            default_output_root,
            job_name_prefix,
        );
    }

    /// Whether merge jobs may be submitted from `host`.
    /// A fully qualified host name also matches its short form.
    pub fn is_submission_host(&self, host: &str) -> bool {
        if self.submission_hosts.is_empty() {
            return true;
        }
        let short = host.split('.').next().unwrap_or(host);
        self.submission_hosts
            .iter()
            .any(|allowed| allowed == host || allowed == short)
    }
}
