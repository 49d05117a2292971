use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
        line: Option<usize>,
    },
    #[error("{path}: could not read file: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            Error::Parse { path, .. } => path,
            Error::Io { path, .. } => path,
        }
    }
}
