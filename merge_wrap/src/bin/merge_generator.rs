//! merge_generator
#![deny(missing_docs)]

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use log::info;
use merge_lib::scheduler::LsfScheduler;
use merge_lib::storage::ImetaStore;
use merge_lib::warehouse::JsonWarehouse;
use merge_lib::Orchestrator;
use merge_params::SiteParams;
use merge_wrap::cli::MergeGeneratorArgs;
use merge_wrap::logging::init_logging;
use merge_wrap::{hostname, utils};
use std::process::ExitCode;

fn inner_main() -> Result<ExitCode> {
    let args = MergeGeneratorArgs::parse();
    let config = args.run_config()?;
    init_logging(config.verbose, args.log_file.as_deref())?;

    let params = SiteParams::load(args.params.as_deref())?;
    let warehouse = JsonWarehouse::from_path(&args.records)?;
    let scheduler = LsfScheduler::new(params.job_name_prefix.clone());
    let store = ImetaStore::new(params.storage_zone.clone());

    let summary = Orchestrator::new(config, params, &warehouse, &scheduler, &store, hostname())
        .run(Utc::now())?;
    if let Some(path) = &args.report {
        summary.write_json(path)?;
        info!("wrote {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match inner_main() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            utils::print_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}
