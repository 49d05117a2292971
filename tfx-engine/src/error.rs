use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy per spec.md §7 — kinds, not a literal mirror of any one source type.
///
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] tfx_parser::Error),

    #[error(transparent)]
    CycleDetected(#[from] tfx_graph::Error),

    #[error("{from}: dependency {to} was not found in the discovered set")]
    DanglingDependency { from: PathBuf, to: PathBuf },

    #[error("{path}: discovery I/O error: {source}")]
    DiscoveryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("process {argv:?} exited with {exit_code}")]
    ProcessExecution {
        argv: Vec<String>,
        exit_code: i32,
        stdout: String,
        stderr: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    #[error("credential chain failed: {0}")]
    Credential(String),

    #[error("hook {name} failed: {message}")]
    Hook { name: String, message: String },

    #[error("retry block {block} exhausted after {max} attempts: {cause}")]
    MaxAttemptsReached {
        block: String,
        max: u32,
        cause: Box<Error>,
    },

    /// Not a failure: a matched ignore rule. Carries the structured signals for the report.
    #[error("ignored: {message}")]
    Ignored {
        block: String,
        message: String,
        signals: serde_json::Map<String, serde_json::Value>,
    },

    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Canonical error text used by the retry/ignore engine — see [`crate::retry::canonicalize`].
    /// For `ProcessExecution`, combines stderr with the underlying cause's own text, per
    /// spec.md §4.5 step 1.
    ///
    pub fn canonical_text(&self) -> String {
        match self {
            Error::ProcessExecution { stderr, cause, .. } => match cause {
                Some(cause) => format!("{stderr}\n{cause}"),
                None => stderr.clone(),
            },
            other => other.to_string(),
        }
    }
}
