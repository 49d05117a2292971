use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: could not read directory: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] tfx_parser::Error),
    #[error("{from}: dependency {to} was not found in the discovered set")]
    DanglingDependency { from: PathBuf, to: PathBuf },
    #[error("discovery cancelled")]
    Cancelled,
}
