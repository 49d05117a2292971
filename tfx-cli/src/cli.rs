//! CLI surface: `find`/`list` introspection and the `run` dispatcher, per spec.md §6.
//!

use std::path::PathBuf;

use clap::{crate_authors, crate_description, crate_name, crate_version, Parser, ValueEnum};

/// CLI options
#[derive(Parser, Debug)]
#[command(disable_version_flag = true)]
#[clap(name = crate_name!(), about = crate_description!())]
#[clap(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// Working directory to discover components under -- defaults to the current directory.
    #[clap(short = 'w', long)]
    pub working_dir: Option<PathBuf>,
    /// Run config file (see tfx_cli::config::RunConfig).
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Debug mode -- switches on the hierarchical tracing layer.
    #[clap(short = 'D', long = "debug")]
    pub debug: bool,
    /// Include hidden (dot-prefixed) directories during discovery.
    #[clap(long)]
    pub hidden: bool,
    /// Sub-commands (see below).
    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tree,
    Dot,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum GroupBy {
    Fs,
    Dag,
}

#[derive(Debug, Parser)]
pub enum SubCommand {
    /// Discover components and render the dependency graph.
    Find(FindOpts),
    /// Alias for `find`.
    List(FindOpts),
    /// Alias for `find --format=dot`.
    Dot(FindOpts),
    /// Invoke the IaC binary across the discovered queue.
    Run(RunOpts),
}

#[derive(Debug, Parser)]
pub struct FindOpts {
    /// Which IaC command the exclude propagation should target (plan/apply/destroy/...).
    #[clap(long, default_value = "plan")]
    pub target_action: String,
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// Only meaningful for `--format=tree`.
    #[clap(long, value_enum, default_value = "fs")]
    pub group_by: GroupBy,
    #[clap(long)]
    pub discover_dependencies: bool,
    #[clap(long)]
    pub discover_external_dependencies: bool,
}

#[derive(Debug, Parser)]
pub struct RunOpts {
    /// IaC command: plan, apply, destroy, ...
    pub cmd: String,
    #[clap(long)]
    pub parallelism: Option<usize>,
    #[clap(long)]
    pub ignore_dependency_errors: bool,
    /// IaC binary to invoke -- overrides the run config's `binary` (see tfx.hcl).
    #[clap(long)]
    pub binary: Option<String>,
    /// Extra flags forwarded verbatim to every IaC invocation.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra_args: Vec<String>,
}
