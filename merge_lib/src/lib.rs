//! Selection and deduplication of library merges.
//!
//! A pass pulls component records from the [`warehouse`], groups them into
//! merge candidates ([`grouper`]), renders each as a merge command
//! ([`command`]), checks it against queued jobs and existing output
//! ([`guard`]) and submits, preempts or runs it ([`controller`]). The
//! [`orchestrator`] drives the pass.

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

pub mod command;
pub mod config;
pub mod controller;
pub mod grouper;
pub mod guard;
pub mod orchestrator;
pub mod process;
pub mod scheduler;
pub mod storage;
pub mod warehouse;

#[cfg(test)]
mod testing;

pub use config::{PreflightError, RunConfig};
pub use orchestrator::{Orchestrator, PassSummary};
