//! `tfx` -- discovers components, builds the dependency graph, and either renders it (find/list/dot)
//! or dispatches an IaC binary run across it.
//!

mod cli;
mod commands;
mod config;

use clap::Parser;
use eyre::Result;
use tfx_common::{init_logging, ConfigEngine};
use tracing::trace;

use crate::cli::{OutputFormat, SubCommand};
use crate::config::RunConfig;

const NAME: &str = env!("CARGO_BIN_NAME");

#[tokio::main]
async fn main() -> Result<()> {
    let opts = cli::Opts::parse();

    init_logging(NAME, opts.debug, None)?;
    trace!("tfx starting");

    let exit_code = match &opts.subcmd {
        SubCommand::Find(find_opts) => {
            commands::find(&opts, find_opts, None)?;
            0
        }
        SubCommand::List(find_opts) => {
            commands::find(&opts, find_opts, None)?;
            0
        }
        SubCommand::Dot(find_opts) => {
            commands::find(&opts, find_opts, Some(OutputFormat::Dot))?;
            0
        }
        SubCommand::Run(run_opts) => {
            let config = ConfigEngine::<RunConfig>::load("tfx", "tfx.hcl", opts.config.clone())
                .unwrap_or_default();
            commands::run(&opts, run_opts, &config).await?
        }
    };

    std::process::exit(exit_code);
}
