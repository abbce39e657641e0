use anyhow::{Context, Result};
use itertools::Itertools;
use std::path::Path;

/// Convert an io::error to a string and strip "(os error 4)" from the end.
fn io_error_to_string(err: &std::io::Error) -> String {
    let s = err.to_string();
    s.strip_suffix(&format!(" (os error {})", err.raw_os_error().unwrap_or(0)))
        .unwrap_or(&s)
        .to_string()
}

/// Render an error chain as `ERROR: a\n\tCaused by: b`.
pub fn format_error_chain(err: &anyhow::Error) -> String {
    let error_chain = err.chain().join("\n\tCaused by: ");
    match err.downcast_ref::<std::io::Error>() {
        Some(io_err) if err.chain().len() == 1 => format!("ERROR: {}", io_error_to_string(io_err)),
        _ => format!("ERROR: {error_chain}"),
    }
}

/// Print an error chain.
pub fn print_error_chain(err: &anyhow::Error) {
    println!("{}", format_error_chain(err));
}

/// Parse a list of run ids separated by whitespace or commas. Text after a
/// `#` on a line is ignored.
pub fn parse_run_id_list(text: &str) -> Result<Vec<u32>> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.split(|c: char| c == ',' || c.is_ascii_whitespace()))
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse()
                .with_context(|| format!("invalid run id '{id}'"))
        })
        .collect()
}

pub fn read_run_id_list(path: &Path) -> Result<Vec<u32>> {
    let text = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
    parse_run_id_list(&text)
        .with_context(|| format!("Error reading run ids from {}", path.display()))
}
