use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("dependency cycle detected at {path}")]
    CycleDetected { path: PathBuf },
}
