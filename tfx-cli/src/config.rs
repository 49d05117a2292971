//! Typed run configuration, loaded via [`tfx_common::ConfigEngine`] from a plain HCL file
//! distinct from the per-component `terragrunt.hcl` files the partial parser reads — retry,
//! ignore, hook and credential blocks aren't in the partial parser's recognised grammar
//! (spec.md §4.1), so they live in their own fully-typed config instead.
//!

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tfx_common::Versioned;
use tfx_engine::{HookRecord, IgnoreConfig, Pattern, RetryConfig};

const CURRENT_VERSION: usize = 1;

#[derive(Debug, Deserialize)]
pub struct PatternSpec {
    pub regex: String,
    #[serde(default)]
    pub negative: bool,
}

fn compile(specs: &[PatternSpec]) -> Vec<Pattern> {
    specs
        .iter()
        .filter_map(|spec| Regex::new(&spec.regex).ok().map(|re| (re, spec)))
        .map(|(re, spec)| if spec.negative { Pattern::negative(re) } else { Pattern::positive(re) })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct RetryBlock {
    pub name: String,
    pub retryable_errors: Vec<PatternSpec>,
    pub max_attempts: u32,
    pub sleep_interval_sec: u64,
}

#[derive(Debug, Deserialize)]
pub struct IgnoreBlock {
    pub name: String,
    pub ignorable_errors: Vec<PatternSpec>,
    pub message: String,
    #[serde(default)]
    pub signals: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct HookBlock {
    pub name: String,
    #[serde(default)]
    pub commands: Vec<String>,
    pub execute: Vec<String>,
    pub working_dir: Option<String>,
    #[serde(default)]
    pub suppress_stdout: bool,
    #[serde(default)]
    pub run_on_error: bool,
    pub r#if: Option<bool>,
    #[serde(default)]
    pub on_errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub version: usize,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default)]
    pub ignore_dependency_errors: bool,
    #[serde(default)]
    pub retry: Vec<RetryBlock>,
    #[serde(default)]
    pub ignore: Vec<IgnoreBlock>,
    #[serde(default)]
    pub before_hook: Vec<HookBlock>,
    #[serde(default)]
    pub after_hook: Vec<HookBlock>,
    #[serde(default)]
    pub error_hook: Vec<HookBlock>,
    /// argv of an external credential command, if configured.
    #[serde(default)]
    pub credential_command: Option<Vec<String>>,
}

fn default_binary() -> String {
    "tofu".to_string()
}

fn default_parallelism() -> usize {
    4
}

impl Versioned for RunConfig {
    fn version(&self) -> usize {
        self.version
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            version: CURRENT_VERSION,
            binary: default_binary(),
            parallelism: default_parallelism(),
            ignore_dependency_errors: false,
            retry: Vec::new(),
            ignore: Vec::new(),
            before_hook: Vec::new(),
            after_hook: Vec::new(),
            error_hook: Vec::new(),
            credential_command: None,
        }
    }
}

impl RunConfig {
    pub fn retries(&self) -> Vec<RetryConfig> {
        self.retry
            .iter()
            .map(|b| RetryConfig {
                name: b.name.clone(),
                retryable_errors: compile(&b.retryable_errors),
                max_attempts: b.max_attempts,
                sleep_interval_sec: b.sleep_interval_sec,
            })
            .collect()
    }

    pub fn ignores(&self) -> Vec<IgnoreConfig> {
        self.ignore
            .iter()
            .map(|b| IgnoreConfig {
                name: b.name.clone(),
                ignorable_errors: compile(&b.ignorable_errors),
                message: b.message.clone(),
                signals: b.signals.clone(),
            })
            .collect()
    }

    fn hooks(blocks: &[HookBlock]) -> Vec<HookRecord> {
        blocks
            .iter()
            .map(|b| HookRecord {
                name: b.name.clone(),
                commands: b.commands.clone(),
                execute: b.execute.clone(),
                working_dir: b.working_dir.as_ref().map(std::path::PathBuf::from),
                suppress_stdout: b.suppress_stdout,
                run_on_error: b.run_on_error,
                r#if: b.r#if,
                on_errors: b
                    .on_errors
                    .iter()
                    .filter_map(|pattern| Regex::new(pattern).ok())
                    .collect(),
            })
            .collect()
    }

    pub fn before_hooks(&self) -> Vec<HookRecord> {
        Self::hooks(&self.before_hook)
    }

    pub fn after_hooks(&self) -> Vec<HookRecord> {
        Self::hooks(&self.after_hook)
    }

    pub fn error_hooks(&self) -> Vec<HookRecord> {
        Self::hooks(&self.error_hook)
    }
}
