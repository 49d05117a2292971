//! Filesystem walk that turns a directory tree into a [`ComponentSet`], per spec.md §4.2.
//!

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tfx_model::{
    Component, ComponentKind, ComponentSet, DiscoveryContext, STACK_CONFIG_FILENAME,
    UNIT_CONFIG_FILENAME,
};

use crate::error::Error;

/// Builder for a discovery run. Chainable modifiers mirror spec.md §4.2's `with_*` family.
///
#[derive(Clone, Debug)]
pub struct Discovery {
    working_dir: PathBuf,
    hidden: bool,
    suppress_parse_errors: bool,
    discover_dependencies: bool,
    discover_external_dependencies: bool,
    parse_exclude: bool,
    discovery_context: Option<DiscoveryContext>,
}

impl Discovery {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Discovery {
            working_dir: working_dir.into(),
            hidden: false,
            suppress_parse_errors: false,
            discover_dependencies: false,
            discover_external_dependencies: false,
            parse_exclude: false,
            discovery_context: None,
        }
    }

    pub fn with_hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_suppress_parse_errors(mut self) -> Self {
        self.suppress_parse_errors = true;
        self
    }

    pub fn with_discover_dependencies(mut self) -> Self {
        self.discover_dependencies = true;
        self
    }

    pub fn with_discover_external_dependencies(mut self) -> Self {
        self.discover_external_dependencies = true;
        self
    }

    pub fn with_parse_exclude(mut self) -> Self {
        self.parse_exclude = true;
        self
    }

    pub fn with_discovery_context(mut self, ctx: DiscoveryContext) -> Self {
        self.discovery_context = Some(ctx);
        self
    }

    /// Walk `working_dir`, resolve dependency edges if requested, and return every discovered
    /// `Component` together with the non-fatal issues collected along the way. `cancelled` is
    /// polled between directories and between dependency resolutions; once it returns `true`
    /// discovery stops and `Error::Cancelled` is appended.
    ///
    #[tracing::instrument(skip(self, cancelled), fields(working_dir = %self.working_dir.display()))]
    pub fn discover(&self, cancelled: &dyn Fn() -> bool) -> (ComponentSet, Vec<Error>) {
        let mut set = ComponentSet::new();
        let mut errors = Vec::new();

        let root = match fs::canonicalize(&self.working_dir) {
            Ok(root) => root,
            Err(source) => {
                errors.push(Error::Io {
                    path: self.working_dir.clone(),
                    source,
                });
                return (set, errors);
            }
        };

        if let Err(fatal) = self.walk(&root, &mut set, &mut errors, cancelled) {
            errors.push(fatal);
            return (set, errors);
        }

        if self.discover_dependencies || self.parse_exclude {
            self.resolve_dependencies(&root, &mut set, &mut errors, cancelled);
        }

        // `ComponentSet` is backed by a `BTreeMap<PathBuf, _>`, so iteration is already in
        // ascending path order — the determinism spec.md §4.2 step 4 asks for falls out for free.
        (set, errors)
    }

    fn walk(
        &self,
        root: &Path,
        set: &mut ComponentSet,
        errors: &mut Vec<Error>,
        cancelled: &dyn Fn() -> bool,
    ) -> Result<(), Error> {
        let hidden_allowed = self.hidden;
        let walker = walkdir::WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| hidden_allowed || !is_hidden(entry, root));

        for entry in walker {
            if cancelled() {
                return Err(Error::Cancelled);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(walk_err) => {
                    if walk_err.depth() == 0 {
                        return Err(Error::Io {
                            path: root.to_path_buf(),
                            source: walk_err
                                .into_io_error()
                                .unwrap_or_else(|| std::io::Error::other("walk failed")),
                        });
                    }
                    tracing::warn!(error = %walk_err, "skipping unreadable directory entry");
                    continue;
                }
            };

            if entry.path_is_symlink() || !entry.file_type().is_dir() {
                continue;
            }

            if let Some(kind) = classify(entry.path()) {
                let mut component = Component::new(entry.path().to_path_buf(), kind);
                if let Some(ctx) = &self.discovery_context {
                    component.discovery_context = Some(ctx.clone());
                }
                set.insert(component);
            }
        }
        Ok(())
    }

    fn resolve_dependencies(
        &self,
        root: &Path,
        set: &mut ComponentSet,
        errors: &mut Vec<Error>,
        cancelled: &dyn Fn() -> bool,
    ) {
        let mut pending_external: Vec<PathBuf> = Vec::new();
        let mut visited_external: BTreeSet<PathBuf> = BTreeSet::new();

        let initial: Vec<PathBuf> = set.keys().cloned().collect();
        for path in initial {
            if cancelled() {
                errors.push(Error::Cancelled);
                return;
            }
            self.parse_one(&path, root, set, errors, &mut pending_external);
        }

        while let Some(candidate) = pending_external.pop() {
            if cancelled() {
                errors.push(Error::Cancelled);
                return;
            }
            if set.contains_key(&candidate) || visited_external.contains(&candidate) {
                continue;
            }
            visited_external.insert(candidate.clone());

            let Some(kind) = classify(&candidate) else {
                tracing::warn!(
                    path = %candidate.display(),
                    "external dependency directory has no recognised config file"
                );
                continue;
            };

            let mut component = Component::new(candidate.clone(), kind);
            component.external = true;
            if let Some(ctx) = &self.discovery_context {
                component.discovery_context = Some(ctx.clone());
            }
            set.insert(component);
            self.parse_one(&candidate, root, set, errors, &mut pending_external);
        }
    }

    fn parse_one(
        &self,
        path: &Path,
        root: &Path,
        set: &mut ComponentSet,
        errors: &mut Vec<Error>,
        pending_external: &mut Vec<PathBuf>,
    ) {
        let config_file = config_file_for(path);
        let parsed = match tfx_parser::parse_file(&config_file) {
            Ok(parsed) => parsed,
            Err(parse_err) => {
                if self.suppress_parse_errors {
                    tracing::debug!(path = %path.display(), error = %parse_err, "suppressed parse error");
                } else {
                    errors.push(Error::Parse(parse_err));
                }
                return;
            }
        };

        let mut resolved_deps = Vec::new();
        if self.discover_dependencies {
            for dep_path in &parsed.dependency_paths {
                if dep_path.starts_with(root) {
                    if set.contains_key(dep_path) {
                        resolved_deps.push(dep_path.clone());
                    } else {
                        errors.push(Error::DanglingDependency {
                            from: path.to_path_buf(),
                            to: dep_path.clone(),
                        });
                    }
                } else if self.discover_external_dependencies {
                    pending_external.push(dep_path.clone());
                    resolved_deps.push(dep_path.clone());
                } else {
                    tracing::warn!(
                        from = %path.display(),
                        to = %dep_path.display(),
                        "dropping external dependency edge (external discovery disabled)"
                    );
                }
            }
        }

        if let Some(component) = set.get_mut(path) {
            component.dependencies = resolved_deps;
            component.parsed_config = Some(parsed);
        }
    }
}

fn is_hidden(entry: &walkdir::DirEntry, root: &Path) -> bool {
    if entry.path() == root {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn classify(dir: &Path) -> Option<ComponentKind> {
    if dir.join(UNIT_CONFIG_FILENAME).is_file() {
        Some(ComponentKind::Unit)
    } else if dir.join(STACK_CONFIG_FILENAME).is_file() {
        Some(ComponentKind::Stack)
    } else {
        None
    }
}

fn config_file_for(dir: &Path) -> PathBuf {
    let unit = dir.join(UNIT_CONFIG_FILENAME);
    if unit.is_file() {
        unit
    } else {
        dir.join(STACK_CONFIG_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn never_cancelled() -> bool {
        false
    }

    fn write_unit(dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(UNIT_CONFIG_FILENAME), body).unwrap();
    }

    fn write_stack(dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(STACK_CONFIG_FILENAME), body).unwrap();
    }

    #[test]
    fn basic_discovery_is_path_sorted_and_hides_dotdirs_by_default() {
        let root = tempdir().unwrap();
        write_unit(&root.path().join("unit1"), "");
        write_unit(&root.path().join("unit2"), "");
        write_stack(&root.path().join("stack1"), "");
        write_unit(&root.path().join("nested/unit4"), "");
        write_unit(&root.path().join(".hidden/unit3"), "");

        let (set, errors) = Discovery::new(root.path()).discover(&never_cancelled);
        assert!(errors.is_empty());
        let names: Vec<String> = set
            .keys()
            .map(|p| p.strip_prefix(root.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["nested/unit4", "stack1", "unit1", "unit2"]);

        let (set_hidden, _) = Discovery::new(root.path()).with_hidden().discover(&never_cancelled);
        assert_eq!(set_hidden.len(), 5);
    }

    #[test]
    fn unit_wins_when_both_config_files_present() {
        let root = tempdir().unwrap();
        let dir = root.path().join("both");
        write_unit(&dir, "");
        fs::write(dir.join(STACK_CONFIG_FILENAME), "").unwrap();

        let (set, _) = Discovery::new(root.path()).discover(&never_cancelled);
        assert_eq!(set[&fs::canonicalize(&dir).unwrap()].kind, ComponentKind::Unit);
    }

    #[test]
    fn internal_dependency_resolves_to_discovered_component() {
        let root = tempdir().unwrap();
        write_unit(&root.path().join("vpc"), "");
        write_unit(
            &root.path().join("app"),
            r#"dependency "vpc" { config_path = "../vpc" }"#,
        );

        let (set, errors) = Discovery::new(root.path())
            .with_discover_dependencies()
            .discover(&never_cancelled);
        assert!(errors.is_empty());
        let app = fs::canonicalize(root.path().join("app")).unwrap();
        let vpc = fs::canonicalize(root.path().join("vpc")).unwrap();
        assert_eq!(set[&app].dependencies, vec![vpc]);
    }

    #[test]
    fn dangling_dependency_is_reported_not_fatal() {
        let root = tempdir().unwrap();
        write_unit(
            &root.path().join("app"),
            r#"dependency "missing" { config_path = "../does-not-exist" }"#,
        );

        let (set, errors) = Discovery::new(root.path())
            .with_discover_dependencies()
            .discover(&never_cancelled);
        assert_eq!(set.len(), 1);
        assert!(matches!(errors[0], Error::DanglingDependency { .. }));
    }

    #[test]
    fn external_dependency_dropped_without_promotion_flag() {
        let outside = tempdir().unwrap();
        write_unit(&outside.path().join("external/B"), "");
        let root = tempdir().unwrap();
        write_unit(
            &root.path().join("A"),
            &format!(
                r#"dependency "b" {{ config_path = "{}" }}"#,
                sibling_relative(&outside, &root, "external/B", "A")
            ),
        );

        let (set, _) = Discovery::new(root.path())
            .with_discover_dependencies()
            .discover(&never_cancelled);
        let a = fs::canonicalize(root.path().join("A")).unwrap();
        assert!(set[&a].dependencies.is_empty());
    }

    #[test]
    fn external_dependency_promoted_when_enabled() {
        let outside = tempdir().unwrap();
        write_unit(&outside.path().join("external/B"), "");
        let root = tempdir().unwrap();
        write_unit(
            &root.path().join("A"),
            &format!(
                r#"dependency "b" {{ config_path = "{}" }}"#,
                sibling_relative(&outside, &root, "external/B", "A")
            ),
        );

        let (set, errors) = Discovery::new(root.path())
            .with_discover_dependencies()
            .with_discover_external_dependencies()
            .discover(&never_cancelled);
        assert!(errors.is_empty());
        let b = fs::canonicalize(outside.path().join("external/B")).unwrap();
        assert!(set.contains_key(&b));
        assert!(set[&b].external);
    }

    /// Both `tempdir()` calls land as direct siblings under the system temp base. Builds the
    /// `../..`-relative string from `root/component_subdir` across to `outside/target_subdir`.
    fn sibling_relative(
        outside: &tempfile::TempDir,
        root: &tempfile::TempDir,
        target_subdir: &str,
        component_subdir: &str,
    ) -> String {
        let common_parent = root.path().parent().unwrap();
        assert_eq!(common_parent, outside.path().parent().unwrap());
        let from_depth = PathBuf::from(root.path().file_name().unwrap())
            .join(component_subdir)
            .components()
            .count();
        let down = PathBuf::from(outside.path().file_name().unwrap()).join(target_subdir);
        let mut rel = PathBuf::new();
        for _ in 0..from_depth {
            rel.push("..");
        }
        rel.push(down);
        format!("./{}", rel.display())
    }
}
