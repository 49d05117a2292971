//! Runner: per-component lifecycle, per spec.md §4.7.
//!
//! `run_component` is plain blocking code (process spawn, hook execution, retry sleeps) — the
//! orchestrator offloads it to a blocking thread via [`tokio::task::spawn_blocking`] rather than
//! making every step `async`, since none of it is cancellation-friendly mid-syscall anyway.
//!

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};

use crate::argv;
use crate::credentials::Provider;
use crate::error::Error;
use crate::hooks::{run_after_hooks, run_before_hooks, run_error_hooks, HookRecord};
use crate::retry::{attempt_recovery, Action, IgnoreConfig, RetryConfig};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success,
    Ignored { block_name: String, message: String },
    Failed,
    SkippedBecauseOfDependency,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub component_path: PathBuf,
    pub outcome: Outcome,
    pub attempts: u32,
    pub duration: Duration,
    pub error: Option<Error>,
}

pub struct RunnerInput {
    pub component_path: PathBuf,
    pub working_dir: PathBuf,
    pub binary: String,
    pub cmd: String,
    pub base_args: Vec<String>,
    /// Shared across every component in a run (see [`crate::credentials::resolve_chain`]) so a
    /// cached STS session survives past the first component that needed it.
    pub providers: Vec<Arc<dyn Provider>>,
    pub before_hooks: Vec<HookRecord>,
    pub after_hooks: Vec<HookRecord>,
    pub error_hooks: Vec<HookRecord>,
    pub retries: Vec<RetryConfig>,
    pub ignores: Vec<IgnoreConfig>,
}

/// Steps 2-7 of spec.md §4.7. Slot acquisition/release (steps 1 and 8) live in the orchestrator.
///
pub fn run_component(input: RunnerInput) -> RunOutcome {
    let start = Instant::now();

    let env = match crate::credentials::resolve_chain(&input.providers) {
        Ok(env) => env,
        Err(err) => {
            return RunOutcome {
                component_path: input.component_path,
                outcome: Outcome::Failed,
                attempts: 0,
                duration: start.elapsed(),
                error: Some(err),
            }
        }
    };

    if let Err(err) = run_before_hooks(&input.before_hooks, &input.working_dir, &input.cmd) {
        return RunOutcome {
            component_path: input.component_path,
            outcome: Outcome::Failed,
            attempts: 0,
            duration: start.elapsed(),
            error: Some(err),
        };
    }

    let mut attempt = 0u32;
    let mut final_error: Option<Error> = None;
    let mut outcome = Outcome::Failed;

    loop {
        let parsed = argv::parse(
            &std::iter::once(input.cmd.clone())
                .chain(input.base_args.iter().cloned())
                .collect::<Vec<_>>(),
        );
        let argv = parsed.into_argv();
        let invocation: Vec<String> = std::iter::once(input.binary.clone()).chain(argv).collect();

        let result = invoke(&invocation, &input.working_dir, &env);

        match result {
            Ok(()) => {
                outcome = Outcome::Success;
                final_error = None;
                break;
            }
            Err(err) => match attempt_recovery(&err, attempt, &input.ignores, &input.retries) {
                Ok(Some(Action::Retry { sleep_secs })) => {
                    sleep(Duration::from_secs(sleep_secs));
                    attempt += 1;
                    continue;
                }
                Ok(Some(Action::Ignore { block_name, message })) => {
                    outcome = Outcome::Ignored { block_name, message };
                    final_error = None;
                    break;
                }
                Ok(None) => {
                    outcome = Outcome::Failed;
                    final_error = Some(err);
                    break;
                }
                Err(max_attempts_err) => {
                    outcome = Outcome::Failed;
                    final_error = Some(max_attempts_err);
                    break;
                }
            },
        }
    }

    let prior_error = final_error.is_some();
    for result in run_after_hooks(&input.after_hooks, &input.working_dir, &input.cmd, prior_error) {
        if let Err(err) = result {
            tracing::warn!(error = %err, "after_hook failed");
        }
    }
    if let Some(err) = &final_error {
        for result in run_error_hooks(&input.error_hooks, &input.working_dir, &input.cmd, &err.canonical_text()) {
            if let Err(hook_err) = result {
                tracing::warn!(error = %hook_err, "error_hook failed");
            }
        }
    }

    RunOutcome {
        component_path: input.component_path,
        outcome,
        attempts: attempt + 1,
        duration: start.elapsed(),
        error: final_error,
    }
}

fn invoke(argv: &[String], working_dir: &std::path::Path, env: &BTreeMap<String, String>) -> Result<(), Error> {
    let Some((bin, args)) = argv.split_first() else {
        return Ok(());
    };
    let output = std::process::Command::new(bin)
        .args(args)
        .current_dir(working_dir)
        .envs(env)
        .output()
        .map_err(|e| Error::ProcessExecution {
            argv: argv.to_vec(),
            exit_code: -1,
            stdout: String::new(),
            stderr: e.to_string(),
            cause: None,
        })?;

    if output.status.success() {
        return Ok(());
    }
    Err(Error::ProcessExecution {
        argv: argv.to_vec(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        cause: None,
    })
}

#[derive(Debug)]
pub enum RunnerMsg {
    Run(Box<RunnerInput>, RpcReplyPort<RunOutcome>),
}

/// Thin ractor wrapper around [`run_component`] — one actor per in-flight component run, offloaded
/// to a blocking thread so the actor's mailbox loop never stalls on process I/O.
///
pub struct RunnerActor;

pub struct RunnerState;

impl Actor for RunnerActor {
    type Msg = RunnerMsg;
    type State = RunnerState;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(RunnerState)
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            RunnerMsg::Run(input, reply) => {
                let outcome = tokio::task::spawn_blocking(move || run_component(*input)).await?;
                reply.send(outcome)?;
            }
        }
        Ok(())
    }
}
