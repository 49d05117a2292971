//! Deterministic topological linearisation of a [`ComponentSet`], per spec.md §4.3.
//!

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tfx_model::{Component, ComponentSet};

use crate::error::Error;

#[derive(Clone, Copy, Eq, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

/// A built DAG: components, a deterministic flat order, and precomputed levels.
///
#[derive(Clone, Debug)]
pub struct Queue {
    components: ComponentSet,
    order: Vec<PathBuf>,
    levels: Vec<Vec<PathBuf>>,
}

impl Queue {
    /// Builds the DAG and precomputes levels. Fails with [`Error::CycleDetected`] the moment DFS
    /// finds a back-edge.
    ///
    pub fn new(components: ComponentSet) -> Result<Self, Error> {
        let order = toposort(&components)?;
        let levels = assign_levels(&components, &order);
        Ok(Queue {
            components,
            order,
            levels,
        })
    }

    /// Flat topological order. Ties are broken by external components first, then ascending path.
    ///
    pub fn entries(&self) -> Vec<&Component> {
        self.order.iter().map(|p| &self.components[p.as_path()]).collect()
    }

    /// Components grouped by level; `level(c) = 0` when `c` has no in-set dependencies.
    ///
    pub fn levels(&self) -> Vec<Vec<&Component>> {
        self.levels
            .iter()
            .map(|level| level.iter().map(|p| &self.components[p.as_path()]).collect())
            .collect()
    }

    /// Same graph, dependents-first order — used for destroy.
    ///
    pub fn reverse(&self) -> Queue {
        Queue {
            components: self.components.clone(),
            order: self.order.iter().rev().cloned().collect(),
            levels: self.levels.iter().rev().cloned().collect(),
        }
    }

    pub fn components(&self) -> &ComponentSet {
        &self.components
    }

    /// Marks every component whose exclude predicate matches `cmd` as `flag_excluded`, without
    /// removing it from the queue — used by find/list/dot rendering (spec.md §4.3).
    ///
    pub fn mark_excluded_for(&mut self, cmd: &str) {
        for path in &self.order {
            let excluded = self.components[path.as_path()]
                .exclude_predicate()
                .map(|p| p.is_action_listed(cmd))
                .unwrap_or(false);
            if excluded {
                if let Some(component) = self.components.get_mut(path) {
                    component.flag_excluded = true;
                }
            }
        }
    }

    /// Paths whose exclude predicate matches `cmd` — used by the orchestrator to silently skip
    /// dispatch for a run queue while still letting dependents run.
    ///
    pub fn excluded_for(&self, cmd: &str) -> Vec<PathBuf> {
        self.order
            .iter()
            .filter(|path| {
                self.components[path.as_path()]
                    .exclude_predicate()
                    .map(|p| p.is_action_listed(cmd))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

fn toposort(components: &ComponentSet) -> Result<Vec<PathBuf>, Error> {
    let mut marks: BTreeMap<PathBuf, Mark> = BTreeMap::new();
    let mut order = Vec::with_capacity(components.len());

    // External components sort before internal ones at the same level -- everywhere a tie is
    // broken by path, break it by `(!external, path)` instead.
    let mut roots: Vec<PathBuf> = components.keys().cloned().collect();
    roots.sort_by_key(|p| (!components[p.as_path()].external, p.clone()));
    for root in &roots {
        visit(root, components, &mut marks, &mut order)?;
    }
    Ok(order)
}

fn visit(
    path: &PathBuf,
    components: &ComponentSet,
    marks: &mut BTreeMap<PathBuf, Mark>,
    order: &mut Vec<PathBuf>,
) -> Result<(), Error> {
    match marks.get(path) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            return Err(Error::CycleDetected {
                path: path.clone(),
            })
        }
        None => {}
    }
    marks.insert(path.clone(), Mark::InProgress);

    if let Some(component) = components.get(path) {
        let mut deps: Vec<&PathBuf> = component
            .dependencies
            .iter()
            .filter(|d| components.contains_key(d))
            .collect();
        deps.sort_by_key(|d| (!components[d.as_path()].external, (*d).clone()));
        for dep in deps {
            visit(dep, components, marks, order)?;
        }
    }

    marks.insert(path.clone(), Mark::Done);
    order.push(path.clone());
    Ok(())
}

fn assign_levels(components: &ComponentSet, order: &[PathBuf]) -> Vec<Vec<PathBuf>> {
    let mut level_of: BTreeMap<PathBuf, usize> = BTreeMap::new();
    let mut by_level: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();

    for path in order {
        let level = components
            .get(path)
            .map(|component| {
                component
                    .dependencies
                    .iter()
                    .filter(|d| components.contains_key(d))
                    .map(|d| level_of.get(d).copied().unwrap_or(0) + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        level_of.insert(path.clone(), level);
        by_level.entry(level).or_default().push(path.clone());
    }

    for bucket in by_level.values_mut() {
        bucket.sort_by_key(|p| (!components[p.as_path()].external, p.clone()));
    }
    by_level.into_values().collect()
}

/// Lookup used by `entries()`/`levels()` — panics on an unknown path, matching
/// [`ComponentSet`]'s own `Index` contract (every path in `order`/`levels` came from the same
/// set).
///
impl std::ops::Index<&Path> for Queue {
    type Output = Component;

    fn index(&self, path: &Path) -> &Component {
        &self.components[path]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfx_model::ComponentKind;

    fn component(name: &str, deps: &[&str]) -> Component {
        let mut c = Component::new(PathBuf::from(name), ComponentKind::Unit);
        c.dependencies = deps.iter().map(PathBuf::from).collect();
        c
    }

    fn set(components: Vec<Component>) -> ComponentSet {
        components.into_iter().collect()
    }

    #[test]
    fn simple_chain_orders_dependencies_first() {
        let components = set(vec![
            component("unit1", &[]),
            component("unit2", &["unit1"]),
            component("unit3", &["unit2"]),
        ]);
        let queue = Queue::new(components).unwrap();
        let names: Vec<_> = queue.entries().iter().map(|c| c.path.clone()).collect();
        assert_eq!(
            names,
            vec![PathBuf::from("unit1"), PathBuf::from("unit2"), PathBuf::from("unit3")]
        );
    }

    #[test]
    fn reversed_chain() {
        let components = set(vec![
            component("unit1", &["unit2"]),
            component("unit2", &["unit3"]),
            component("unit3", &[]),
        ]);
        let queue = Queue::new(components).unwrap();
        let names: Vec<_> = queue.entries().iter().map(|c| c.path.clone()).collect();
        assert_eq!(
            names,
            vec![PathBuf::from("unit3"), PathBuf::from("unit2"), PathBuf::from("unit1")]
        );
    }

    #[test]
    fn diamond_orders_and_levels() {
        let components = set(vec![
            component("A", &[]),
            component("B", &[]),
            component("C", &["A"]),
            component("D", &["A", "B"]),
            component("E", &["C"]),
            component("F", &["C"]),
        ]);
        let queue = Queue::new(components).unwrap();
        let names: Vec<_> = queue.entries().iter().map(|c| c.path.clone()).collect();
        assert_eq!(
            names,
            vec!["A", "B", "C", "D", "E", "F"]
                .into_iter()
                .map(PathBuf::from)
                .collect::<Vec<_>>()
        );

        let levels: Vec<Vec<PathBuf>> = queue
            .levels()
            .iter()
            .map(|level| level.iter().map(|c| c.path.clone()).collect())
            .collect();
        assert_eq!(
            levels,
            vec![
                vec![PathBuf::from("A"), PathBuf::from("B")],
                vec![PathBuf::from("C"), PathBuf::from("D")],
                vec![PathBuf::from("E"), PathBuf::from("F")],
            ]
        );
    }

    #[test]
    fn external_components_sort_before_internal_ones_at_the_same_level() {
        let mut ext = component("z_external", &[]);
        ext.external = true;
        let components = set(vec![component("a_internal", &[]), ext]);
        let queue = Queue::new(components).unwrap();

        let names: Vec<_> = queue.entries().iter().map(|c| c.path.clone()).collect();
        assert_eq!(
            names,
            vec![PathBuf::from("z_external"), PathBuf::from("a_internal")]
        );

        let levels = queue.levels();
        assert_eq!(levels.len(), 1);
        assert_eq!(
            levels[0].iter().map(|c| c.path.clone()).collect::<Vec<_>>(),
            vec![PathBuf::from("z_external"), PathBuf::from("a_internal")]
        );
    }

    #[test]
    fn cycle_is_reported_as_error() {
        let components = set(vec![component("A", &["B"]), component("B", &["A"])]);
        let err = Queue::new(components);
        assert!(matches!(err, Err(Error::CycleDetected { .. })));
    }

    #[test]
    fn reverse_preserves_permutation_and_flips_order() {
        let components = set(vec![
            component("unit1", &[]),
            component("unit2", &["unit1"]),
        ]);
        let queue = Queue::new(components).unwrap();
        let reversed = queue.reverse();
        let names: Vec<_> = reversed.entries().iter().map(|c| c.path.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("unit2"), PathBuf::from("unit1")]);
    }

    #[test]
    fn exclude_propagation_keeps_excluded_node_in_run_queue() {
        use tfx_model::ExcludePredicate;
        use std::collections::BTreeSet;

        let mut u2 = component("u2", &["u1"]);
        u2.parsed_config = Some(tfx_model::ParsedConfig {
            exclude: Some(ExcludePredicate::new(
                true,
                BTreeSet::from(["destroy".to_string()]),
            )),
            ..Default::default()
        });
        let components = set(vec![component("u1", &[]), u2, component("u3", &["u2"])]);
        let mut queue = Queue::new(components).unwrap();
        queue.mark_excluded_for("destroy");

        assert!(queue[Path::new("u2")].flag_excluded);
        assert!(!queue[Path::new("u1")].flag_excluded);
        assert_eq!(queue.excluded_for("destroy"), vec![PathBuf::from("u2")]);
    }
}
