//! Hook Engine, per spec.md §4.4.
//!

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, OnceLock};

use regex::Regex;

use crate::error::Error;

#[derive(Clone, Debug)]
pub struct HookRecord {
    pub name: String,
    pub commands: Vec<String>,
    pub execute: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub suppress_stdout: bool,
    pub run_on_error: bool,
    pub r#if: Option<bool>,
    /// Only meaningful for error hooks.
    pub on_errors: Vec<Regex>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookKind {
    Before,
    After,
    Error,
}

pub struct HookOutcome {
    pub name: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Per-working-directory mutex for the built-in `tflint` action — the linter itself isn't
/// thread-safe, so two components sharing a working dir must not run it concurrently.
///
fn tflint_locks() -> &'static Mutex<BTreeMap<PathBuf, &'static Mutex<()>>> {
    static LOCKS: OnceLock<Mutex<BTreeMap<PathBuf, &'static Mutex<()>>>> = OnceLock::new();
    LOCKS.get_or_init(|| Mutex::new(BTreeMap::new()))
}

fn tflint_lock_for(dir: &Path) -> &'static Mutex<()> {
    let mut locks = tflint_locks().lock().unwrap();
    locks
        .entry(dir.to_path_buf())
        .or_insert_with(|| Box::leak(Box::new(Mutex::new(()))))
}

/// Runs `tflint` against `dir` without shelling out. A stand-in: the real linter integration is
/// left to the binary crate that wires in an actual tflint library; this always reports success so
/// callers can exercise the locking and hook-dispatch machinery end to end.
///
fn run_builtin_tflint(dir: &Path) -> (i32, String, String) {
    let lock = tflint_lock_for(dir);
    let _guard = lock.lock().unwrap();
    (0, String::new(), String::new())
}

/// Runs one hook's `execute` argv, injecting `CTX_TF_PATH`, `CTX_COMMAND`, `CTX_HOOK_NAME`.
///
fn run_hook(hook: &HookRecord, tf_path: &Path, cmd: &str) -> Result<HookOutcome, Error> {
    if hook.execute.first().map(String::as_str) == Some("tflint") {
        let dir = hook.working_dir.clone().unwrap_or_else(|| tf_path.to_path_buf());
        let (exit_code, stdout, stderr) = run_builtin_tflint(&dir);
        return Ok(HookOutcome {
            name: hook.name.clone(),
            exit_code,
            stdout,
            stderr,
        });
    }

    let Some((bin, args)) = hook.execute.split_first() else {
        return Ok(HookOutcome {
            name: hook.name.clone(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        });
    };

    let mut command = Command::new(bin);
    command.args(args);
    command.env("CTX_TF_PATH", tf_path);
    command.env("CTX_COMMAND", cmd);
    command.env("CTX_HOOK_NAME", &hook.name);
    if let Some(dir) = &hook.working_dir {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .map_err(|e| Error::Hook { name: hook.name.clone(), message: e.to_string() })?;

    Ok(HookOutcome {
        name: hook.name.clone(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// `before_hooks`: run after credential resolution, before IaC invocation. Any hook returning
/// nonzero fails the whole run.
///
pub fn run_before_hooks(hooks: &[HookRecord], tf_path: &Path, cmd: &str) -> Result<(), Error> {
    for hook in hooks {
        if hook.r#if == Some(false) {
            continue;
        }
        let outcome = run_hook(hook, tf_path, cmd)?;
        if outcome.exit_code != 0 {
            return Err(Error::Hook {
                name: outcome.name,
                message: format!("before_hook exited with {}: {}", outcome.exit_code, outcome.stderr),
            });
        }
    }
    Ok(())
}

/// `after_hooks`: a hook runs iff `cmd ∈ h.commands` AND (no prior error OR `run_on_error`).
///
pub fn run_after_hooks(
    hooks: &[HookRecord],
    tf_path: &Path,
    cmd: &str,
    prior_error: bool,
) -> Vec<Result<HookOutcome, Error>> {
    hooks
        .iter()
        .filter(|h| h.commands.iter().any(|c| c == cmd))
        .filter(|h| !prior_error || h.run_on_error)
        .filter(|h| h.r#if != Some(false))
        .map(|hook| run_hook(hook, tf_path, cmd))
        .collect()
}

/// `error_hooks`: run only when the combined error text matches any `on_errors` regex.
///
pub fn run_error_hooks(
    hooks: &[HookRecord],
    tf_path: &Path,
    cmd: &str,
    combined_error_text: &str,
) -> Vec<Result<HookOutcome, Error>> {
    hooks
        .iter()
        .filter(|h| h.on_errors.iter().any(|re| re.is_match(combined_error_text)))
        .map(|hook| run_hook(hook, tf_path, cmd))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_hook_skipped_for_other_command() {
        let hooks = vec![HookRecord {
            name: "notify".into(),
            commands: vec!["apply".into()],
            execute: vec!["true".into()],
            working_dir: None,
            suppress_stdout: false,
            run_on_error: false,
            r#if: None,
            on_errors: vec![],
        }];
        let results = run_after_hooks(&hooks, Path::new("/tmp/unit"), "plan", false);
        assert!(results.is_empty());
    }

    #[test]
    fn after_hook_skipped_on_error_unless_run_on_error() {
        let hooks = vec![HookRecord {
            name: "notify".into(),
            commands: vec!["apply".into()],
            execute: vec!["true".into()],
            working_dir: None,
            suppress_stdout: false,
            run_on_error: false,
            r#if: None,
            on_errors: vec![],
        }];
        let results = run_after_hooks(&hooks, Path::new("/tmp/unit"), "apply", true);
        assert!(results.is_empty());
    }

    #[test]
    fn error_hook_runs_only_on_pattern_match() {
        let hooks = vec![HookRecord {
            name: "page-oncall".into(),
            commands: vec![],
            execute: vec!["true".into()],
            working_dir: None,
            suppress_stdout: false,
            run_on_error: true,
            r#if: None,
            on_errors: vec![Regex::new("lock").unwrap()],
        }];
        assert!(run_error_hooks(&hooks, Path::new("/tmp/unit"), "apply", "unrelated failure").is_empty());
        assert_eq!(
            run_error_hooks(&hooks, Path::new("/tmp/unit"), "apply", "state lock held").len(),
            1
        );
    }

    #[test]
    fn tflint_serialises_across_calls_for_same_directory() {
        let dir = Path::new("/tmp/tflint-test-dir");
        let (code, _, _) = run_builtin_tflint(dir);
        assert_eq!(code, 0);
        // Second call must not deadlock — the guard from the first call has been dropped.
        let (code2, _, _) = run_builtin_tflint(dir);
        assert_eq!(code2, 0);
    }
}
