//! Shared utilities for the `tfx` workspace.
//!

mod cache;
mod config;
#[macro_use]
mod macros;
mod logging;
pub mod options;

pub use cache::ExpiringCache;
pub use config::{ConfigEngine, Versioned};
pub use logging::init_logging;
