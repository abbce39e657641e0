use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub fn level_filter(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the global logger, writing to stderr or appending to `log_file`.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level_filter(verbose));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| path.display().to_string())?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("Unable to initialize logging")
}
