//! Command handlers: wire discovery + graph + engine together for each sub-command.
//!

use std::path::{Path, PathBuf};

use eyre::{eyre, Result};
use tfx_common::options::{self, Kind, OptionSpec, Value};
use tfx_discovery::Discovery;
use tfx_engine::{
    ExternalCommandProvider, InputBuilder, NullStsClient, Orchestrator, Provider, RunnerInput,
    StsAssumeRoleProvider,
};
use tfx_graph::{render, GroupBy as RenderGroupBy, Queue};
use tfx_model::{ComponentSet, DiscoveryContext};

use crate::cli::{FindOpts, GroupBy, OutputFormat, RunOpts};
use crate::config::RunConfig;

/// Prefix for every option's derived environment variable name (spec.md §6's CLI > env > file
/// precedence).
const ENV_PREFIX: &str = "TFX_";

fn resolved_usize(name: &'static str, from_cli: Option<usize>, from_file: usize) -> usize {
    let spec = OptionSpec { name, kind: Kind::Int };
    let cli = from_cli.map(|v| Value::Int(v as i64));
    let file = Some(Value::Int(from_file as i64));
    match options::resolve(ENV_PREFIX, &spec, cli, file) {
        Some(Value::Int(v)) if v > 0 => v as usize,
        _ => from_file,
    }
}

fn resolved_bool(name: &'static str, from_cli: bool, from_file: bool) -> bool {
    let spec = OptionSpec { name, kind: Kind::Bool };
    // clap's `bool` flags have no "unset" state, so only an explicit `true` counts as a CLI
    // override -- a bare `false` falls through to let the env var / config file decide.
    let cli = if from_cli { Some(Value::Bool(true)) } else { None };
    let file = Some(Value::Bool(from_file));
    match options::resolve(ENV_PREFIX, &spec, cli, file) {
        Some(Value::Bool(v)) => v,
        _ => from_file,
    }
}

fn resolved_string(name: &'static str, from_cli: Option<String>, from_file: String) -> String {
    let spec = OptionSpec { name, kind: Kind::Str };
    let cli = from_cli.map(Value::Str);
    let file = Some(Value::Str(from_file.clone()));
    match options::resolve(ENV_PREFIX, &spec, cli, file) {
        Some(Value::Str(v)) => v,
        _ => from_file,
    }
}

fn discover(working_dir: &Path, hidden: bool, cmd: &str, deps: bool, external_deps: bool) -> Result<ComponentSet> {
    let mut discovery = Discovery::new(working_dir)
        .with_parse_exclude()
        .with_discovery_context(DiscoveryContext {
            cmd: cmd.to_string(),
            working_dir: working_dir.to_path_buf(),
        });
    if hidden {
        discovery = discovery.with_hidden();
    }
    if deps {
        discovery = discovery.with_discover_dependencies();
    }
    if external_deps {
        discovery = discovery.with_discover_external_dependencies();
    }

    let (set, errors) = discovery.discover(&|| false);
    for err in &errors {
        tracing::warn!(error = %err, "discovery issue");
    }
    Ok(set)
}

fn working_dir(opts: &crate::cli::Opts) -> Result<PathBuf> {
    match &opts.working_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

pub fn find(opts: &crate::cli::Opts, find_opts: &FindOpts, format_override: Option<OutputFormat>) -> Result<()> {
    let wd = working_dir(opts)?;
    let set = discover(
        &wd,
        opts.hidden,
        &find_opts.target_action,
        find_opts.discover_dependencies || find_opts.format == OutputFormat::Dot,
        find_opts.discover_external_dependencies,
    )?;

    let mut queue = Queue::new(set)?;
    queue.mark_excluded_for(&find_opts.target_action);

    let format = format_override.unwrap_or(find_opts.format);
    let rendered = match format {
        OutputFormat::Text => render::text(&queue),
        OutputFormat::Json => render::json(&queue)?,
        OutputFormat::Tree => render::tree(
            &queue,
            match find_opts.group_by {
                GroupBy::Fs => RenderGroupBy::Fs,
                GroupBy::Dag => RenderGroupBy::Dag,
            },
        ),
        OutputFormat::Dot => render::dot(&queue),
    };
    println!("{rendered}");
    Ok(())
}

struct ConfigInputBuilder<'a> {
    config: &'a RunConfig,
    binary: String,
    cmd: String,
    extra_args: Vec<String>,
    /// Built once per run (not per component) so a cached STS session is shared.
    providers: Vec<std::sync::Arc<dyn Provider>>,
}

impl<'a> ConfigInputBuilder<'a> {
    fn new(config: &'a RunConfig, binary: String, cmd: String, extra_args: Vec<String>) -> Self {
        let providers: Vec<std::sync::Arc<dyn Provider>> = match &config.credential_command {
            Some(argv) => {
                let sts = StsAssumeRoleProvider::new(Box::new(NullStsClient));
                vec![std::sync::Arc::new(ExternalCommandProvider::new("external", argv.clone(), sts))]
            }
            None => Vec::new(),
        };
        ConfigInputBuilder { config, binary, cmd, extra_args, providers }
    }
}

impl InputBuilder for ConfigInputBuilder<'_> {
    fn build(&self, component_path: &Path) -> RunnerInput {
        RunnerInput {
            component_path: component_path.to_path_buf(),
            working_dir: component_path.to_path_buf(),
            binary: self.binary.clone(),
            cmd: self.cmd.clone(),
            base_args: self.extra_args.clone(),
            providers: self.providers.clone(),
            before_hooks: self.config.before_hooks(),
            after_hooks: self.config.after_hooks(),
            error_hooks: self.config.error_hooks(),
            retries: self.config.retries(),
            ignores: self.config.ignores(),
        }
    }
}

pub async fn run(opts: &crate::cli::Opts, run_opts: &RunOpts, config: &RunConfig) -> Result<i32> {
    let wd = working_dir(opts)?;
    let set = discover(&wd, opts.hidden, &run_opts.cmd, true, false)?;

    let mut queue = Queue::new(set)?;
    let is_destroy = run_opts.cmd == "destroy";
    if is_destroy {
        queue = queue.reverse();
    }

    // CLI flag > env var > config file, per spec.md §6.
    let parallelism = resolved_usize("parallelism", run_opts.parallelism, config.parallelism);
    let ignore_dependency_errors = resolved_bool(
        "ignore-dependency-errors",
        run_opts.ignore_dependency_errors,
        config.ignore_dependency_errors,
    );
    let binary = resolved_string("binary", run_opts.binary.clone(), config.binary.clone());
    let orchestrator = Orchestrator::new(parallelism, ignore_dependency_errors);

    let inputs = ConfigInputBuilder::new(config, binary, run_opts.cmd.clone(), run_opts.extra_args.clone());

    let report = orchestrator
        .run(&queue, &run_opts.cmd, &inputs)
        .await
        .map_err(|e| eyre!("orchestrator failed: {e}"))?;

    for (path, entry) in report.entries() {
        tracing::info!(
            component = %path.display(),
            attempts = entry.attempts,
            duration_ms = entry.duration.as_millis() as u64,
            outcome = ?entry.outcome,
            "component finished"
        );
    }

    Ok(report.exit_code())
}
