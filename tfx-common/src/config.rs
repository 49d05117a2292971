//! Finds the right default location for the tool's own config file and loads it.
//!
//! Config-file-neutral: stores only the base directory, and `load()` reads either the given
//! file or the platform default one.
//!

use std::fmt::Debug;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

use directories::BaseDirs;
use eyre::Result;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

/// A config struct that knows which version number it expects in the file.
///
pub trait Versioned {
    fn version(&self) -> usize;
}

/// Locates and loads a versioned config file of type `T`.
///
#[derive(Debug)]
pub struct ConfigEngine<T> {
    basedir: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> ConfigEngine<T>
where
    T: Debug + DeserializeOwned + Versioned,
{
    #[tracing::instrument]
    fn new(tag: &str, filename: &str) -> Self {
        let basedir = match BaseDirs::new() {
            Some(base) => base.config_local_dir().join(tag),
            None => PathBuf::from(".").join(tag),
        };
        debug!("basedir = {basedir:?}, filename = {filename}");
        ConfigEngine {
            basedir,
            _marker: PhantomData,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.basedir.clone()
    }

    /// Load the specified file, or the platform default for `tag`/`filename` when none is given.
    ///
    #[tracing::instrument]
    pub fn load(tag: &str, filename: &str, fname: Option<PathBuf>) -> Result<T> {
        trace!("loading config");

        let cfg = ConfigEngine::<T>::new(tag, filename);
        let fname = fname.unwrap_or_else(|| cfg.config_path().join(filename));

        trace!("reading {fname:?}");
        let data = fs::read_to_string(&fname)?;
        let parsed: T = hcl::from_str(&data)?;
        Ok(parsed)
    }
}
