//! Orchestrator: bounded dispatch of a [`Queue`] in topological order, per spec.md §4.3/§4.7.
//!

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use ractor::{call, Actor};
use tfx_graph::Queue;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::Error;
use crate::report::RunReport;
use crate::runner::{self, RunnerActor, RunnerInput, RunnerMsg};

/// Builds the [`RunnerInput`] for one component. Supplied by the caller (the binary crate) since
/// working-dir resolution, credential providers, and hook/retry/ignore configuration all come
/// from the caller's own typed run config, not from the partial HCL parser — the parser's
/// recognised grammar (spec.md §4.1) only covers `dependency`/`include`/`exclude`/`read_*`.
///
pub trait InputBuilder: Send + Sync {
    fn build(&self, component_path: &std::path::Path) -> RunnerInput;
}

pub struct Orchestrator {
    parallelism: usize,
    ignore_dependency_errors: bool,
}

impl Orchestrator {
    pub fn new(parallelism: usize, ignore_dependency_errors: bool) -> Self {
        Orchestrator {
            parallelism: parallelism.max(1),
            ignore_dependency_errors,
        }
    }

    /// Runs every non-excluded component in `queue`'s order, skipping anything whose blocking
    /// predecessor failed unless `ignore_dependency_errors` is set. Bounded to `parallelism`
    /// concurrent in-flight runs via a semaphore; each run happens inside its own ephemeral
    /// [`RunnerActor`] (actor-per-unit-of-work — the semaphore, not actor pool sizing, is what
    /// bounds concurrency).
    ///
    /// A component's blocking predecessors are whichever endpoint of each dependency edge this
    /// `queue`'s actual order visits first — for a forward (plan/apply) queue that is its
    /// dependencies, for a reversed (destroy) queue it is its dependents, since `Queue::reverse`
    /// flips the visitation order without flipping the edges themselves. A component is never
    /// dispatched until every blocking predecessor's outcome has been absorbed, so a dependent can
    /// never run concurrently with (or before) its still-in-flight dependency.
    ///
    pub async fn run(&self, queue: &Queue, cmd: &str, inputs: &dyn InputBuilder) -> Result<RunReport, Error> {
        let excluded: BTreeSet<PathBuf> = queue.excluded_for(cmd).into_iter().collect();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut report = RunReport::new();
        let mut failed: BTreeSet<PathBuf> = BTreeSet::new();
        let mut skipped: BTreeSet<PathBuf> = BTreeSet::new();
        let mut resolved: BTreeSet<PathBuf> = BTreeSet::new();

        let entries: Vec<PathBuf> = queue.entries().into_iter().map(|c| c.path.clone()).collect();
        let blocked_by = blocking_predecessors(queue, &entries);
        let mut join_set: JoinSet<runner::RunOutcome> = JoinSet::new();

        for path in &entries {
            if excluded.contains(path) {
                resolved.insert(path.clone());
                continue;
            }

            let blockers = blocked_by.get(path).cloned().unwrap_or_default();
            while blockers.iter().any(|p| !resolved.contains(p)) {
                let Some(outcome) = join_set.join_next().await else {
                    break;
                };
                let outcome = outcome.map_err(|_| Error::Cancelled)?;
                resolved.insert(outcome.component_path.clone());
                absorb(&mut report, &mut failed, outcome);
            }

            let blocked = !self.ignore_dependency_errors
                && blockers.iter().any(|p| failed.contains(p) || skipped.contains(p));

            if blocked {
                skipped.insert(path.clone());
                resolved.insert(path.clone());
                report.record(runner::RunOutcome {
                    component_path: path.clone(),
                    outcome: runner::Outcome::SkippedBecauseOfDependency,
                    attempts: 0,
                    duration: std::time::Duration::ZERO,
                    error: None,
                });
                continue;
            }

            let input = inputs.build(path);
            let permit = semaphore.clone().acquire_owned().await.map_err(|_| Error::Cancelled)?;
            join_set.spawn(async move {
                let _permit = permit;
                dispatch_one(input).await
            });

            // Keep pace with the topological order: only let as many jobs run ahead as there are
            // permits, so a downstream failure is observed before later levels are scheduled.
            if join_set.len() >= self.parallelism {
                if let Some(outcome) = join_set.join_next().await {
                    let outcome = outcome.map_err(|_| Error::Cancelled)?;
                    resolved.insert(outcome.component_path.clone());
                    absorb(&mut report, &mut failed, outcome);
                }
            }
        }

        while let Some(outcome) = join_set.join_next().await {
            let outcome = outcome.map_err(|_| Error::Cancelled)?;
            resolved.insert(outcome.component_path.clone());
            absorb(&mut report, &mut failed, outcome);
        }

        Ok(report)
    }
}

/// For every dependency edge in `queue` with both endpoints present in `entries`, records the
/// endpoint `entries` visits later as blocked on the endpoint it visits earlier. Edges to a path
/// outside `entries` (e.g. dropped external dependencies) are skipped — nothing in this run will
/// ever resolve them.
///
fn blocking_predecessors(queue: &Queue, entries: &[PathBuf]) -> BTreeMap<PathBuf, Vec<PathBuf>> {
    let position: BTreeMap<PathBuf, usize> =
        entries.iter().enumerate().map(|(i, p)| (p.clone(), i)).collect();

    let mut blocked_by: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for path in entries {
        let component = &queue[path.as_path()];
        for dep in &component.dependencies {
            let Some(&dep_pos) = position.get(dep) else {
                continue;
            };
            let this_pos = position[path];
            let (earlier, later) = if dep_pos < this_pos {
                (dep.clone(), path.clone())
            } else {
                (path.clone(), dep.clone())
            };
            blocked_by.entry(later).or_default().push(earlier);
        }
    }
    blocked_by
}

fn absorb(report: &mut RunReport, failed: &mut BTreeSet<PathBuf>, outcome: runner::RunOutcome) {
    if matches!(outcome.outcome, runner::Outcome::Failed) {
        failed.insert(outcome.component_path.clone());
    }
    report.record(outcome);
}

async fn dispatch_one(input: RunnerInput) -> runner::RunOutcome {
    let component_path = input.component_path.clone();
    let spawned = Actor::spawn(None, RunnerActor, ()).await;
    let (actor_ref, handle) = match spawned {
        Ok(pair) => pair,
        Err(err) => {
            return runner::RunOutcome {
                component_path,
                outcome: runner::Outcome::Failed,
                attempts: 0,
                duration: std::time::Duration::ZERO,
                error: Some(Error::Hook {
                    name: "<runner-actor>".into(),
                    message: err.to_string(),
                }),
            }
        }
    };

    let result = call!(actor_ref, |reply| RunnerMsg::Run(Box::new(input), reply));
    actor_ref.stop(Some("run complete".to_string()));
    let _ = handle.await;

    match result {
        Ok(outcome) => outcome,
        Err(err) => runner::RunOutcome {
            component_path,
            outcome: runner::Outcome::Failed,
            attempts: 0,
            duration: std::time::Duration::ZERO,
            error: Some(Error::Hook {
                name: "<runner-actor>".into(),
                message: err.to_string(),
            }),
        },
    }
}
