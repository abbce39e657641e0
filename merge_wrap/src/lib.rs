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

pub mod cli;
pub mod logging;
pub mod utils;

/// Name of this host, as used for the submission host check.
pub fn hostname() -> String {
    if let Ok(n) = ::hostname::get() {
        return n.to_string_lossy().into_owned();
    }
    "<unknown hostname>".to_string()
}
