//! Shared types for library merge generation: the metadata record of one
//! sequencing component, the canonical composition of a merge, and the
//! chemistry code derived from a flowcell barcode.

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

pub mod chemistry;
pub mod composition;
pub mod record;

pub use chemistry::chemistry_code;
pub use composition::{Component, Composition};
pub use record::{LibraryRecord, RunStatus};
