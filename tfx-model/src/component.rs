//! The `Component` entity: one discovered unit or stack directory.
//!

use std::path::{Path, PathBuf};

use crate::exclude::ExcludePredicate;

/// A component is either a single invokable unit, or a stack aggregating child units.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ComponentKind {
    Unit,
    Stack,
}

/// Notes how/why a component entered the discovered set — used to render paths relative to the
/// root that originated the discovery run.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveryContext {
    pub cmd: String,
    pub working_dir: PathBuf,
}

/// One `include "<name>" { path = ... }` block, resolved to an absolute path.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IncludeRef {
    pub name: String,
    pub path: PathBuf,
}

/// Output of the partial parser for one config file.
///
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedConfig {
    /// Resolved `dependency { config_path = ... }` targets.
    pub dependency_paths: Vec<PathBuf>,
    /// Resolved `include "<name>" { path = ... }` targets.
    pub include_paths: Vec<IncludeRef>,
    /// `exclude { if = ...; actions = [...] }`, if present.
    pub exclude: Option<ExcludePredicate>,
    /// Paths named in `read_terragrunt_config(...)` / `read_tfvars_file(...)` calls.
    /// Not recursed through `include` chains — only this file's own calls.
    pub reading: Vec<PathBuf>,
}

/// The central scheduling entity: a directory containing a recognised config file.
///
#[derive(Clone, Debug)]
pub struct Component {
    /// Absolute, cleaned directory path. Unique key within a discovery run.
    pub path: PathBuf,
    pub kind: ComponentKind,
    /// True if this component lives outside the initial working-dir subtree but was pulled in
    /// as a dependency.
    pub external: bool,
    pub discovery_context: Option<DiscoveryContext>,
    pub parsed_config: Option<ParsedConfig>,
    /// Non-owning references: paths into the owning [`crate::ComponentSet`], not `Component`
    /// values. The set owns each `Component` exactly once.
    pub dependencies: Vec<PathBuf>,
    /// Mutable marker set by queue/filter passes; not set at discovery time.
    pub flag_excluded: bool,
}

impl Component {
    pub fn new(path: impl Into<PathBuf>, kind: ComponentKind) -> Self {
        Component {
            path: path.into(),
            kind,
            external: false,
            discovery_context: None,
            parsed_config: None,
            dependencies: Vec::new(),
            flag_excluded: false,
        }
    }

    pub fn exclude_predicate(&self) -> Option<&ExcludePredicate> {
        self.parsed_config.as_ref().and_then(|p| p.exclude.as_ref())
    }

    /// Path rendered relative to the discovery context's working dir, if one was recorded;
    /// falls back to the absolute path otherwise.
    ///
    pub fn display_path(&self) -> PathBuf {
        match &self.discovery_context {
            Some(ctx) => self
                .path
                .strip_prefix(&ctx.working_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| self.path.clone()),
            None => self.path.clone(),
        }
    }
}
