//! Hook engine, retry/ignore engine, credential chain, and the runner/orchestrator that drive one
//! IaC binary invocation per component, per spec.md §4.4-§4.7.
//!

mod argv;
mod credentials;
mod error;
mod hooks;
mod orchestrator;
mod report;
mod retry;
mod runner;

pub use argv::{ParsedArgv, Token};
pub use credentials::{Credentials, ExternalCommandProvider, NullStsClient, Provider, StsAssumeRoleProvider, StsClient};
pub use error::Error;
pub use hooks::{run_after_hooks, run_before_hooks, run_error_hooks, HookKind, HookOutcome, HookRecord};
pub use orchestrator::{InputBuilder, Orchestrator};
pub use report::{ComponentReport, RunReport, EXIT_CLEAN, EXIT_DEPENDENCY_SKIPPED, EXIT_GENERAL_ERROR, EXIT_MAX_RETRIES_EXCEEDED};
pub use retry::{attempt_recovery, canonicalize, Action, IgnoreConfig, Pattern, RetryConfig};
pub use runner::{run_component, Outcome, RunOutcome, RunnerActor, RunnerInput, RunnerMsg};
