//! Retry/Ignore Engine, per spec.md §4.5.
//!

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use crate::error::Error;

/// A single regex entry in a retry/ignore pattern list. `negative = true` means "this match
/// cancels an earlier positive match in the same list".
///
#[derive(Clone, Debug)]
pub struct Pattern {
    pub regex: Regex,
    pub negative: bool,
}

impl Pattern {
    pub fn positive(regex: Regex) -> Self {
        Pattern { regex, negative: false }
    }

    pub fn negative(regex: Regex) -> Self {
        Pattern { regex, negative: true }
    }
}

/// Does the list match `text`: at least one positive pattern fires AND no later negative
/// pattern also fires.
///
fn list_matches(patterns: &[Pattern], text: &str) -> bool {
    let mut matched = false;
    for pattern in patterns {
        let fired = pattern.regex.is_match(text);
        if pattern.negative {
            if fired {
                return false;
            }
        } else if fired {
            matched = true;
        }
    }
    matched
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub name: String,
    pub retryable_errors: Vec<Pattern>,
    pub max_attempts: u32,
    pub sleep_interval_sec: u64,
}

#[derive(Clone, Debug)]
pub struct IgnoreConfig {
    pub name: String,
    pub ignorable_errors: Vec<Pattern>,
    pub message: String,
    pub signals: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Retry { sleep_secs: u64 },
    Ignore { block_name: String, message: String },
}

/// Strip ANSI escape sequences, keep only `[A-Za-z0-9./'"():=\- ]`, collapse whitespace runs to a
/// single space. This is the canonical text both ignore and retry patterns are matched against.
///
pub fn canonicalize(raw: &str) -> String {
    let ansi = Regex::new(r"\x1b\[[0-9;]*m").unwrap();
    let stripped = ansi.replace_all(raw, "");
    let filtered: String = stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "./'\"():=\\- ".contains(*c))
        .collect();
    let collapsed = Regex::new(r"\s+").unwrap().replace_all(&filtered, " ");
    collapsed.trim().to_string()
}

/// `attempt_recovery(err, current_attempt)`. Ignores are tried before retries, in declaration
/// order, per spec.md §9. Returns `Ok(None)` when no rule matches — the original error should
/// surface unchanged.
///
pub fn attempt_recovery(
    err: &Error,
    current_attempt: u32,
    ignores: &[IgnoreConfig],
    retries: &[RetryConfig],
) -> Result<Option<Action>, Error> {
    let text = canonicalize(&err.canonical_text());

    for ignore in ignores {
        if list_matches(&ignore.ignorable_errors, &text) {
            return Ok(Some(Action::Ignore {
                block_name: ignore.name.clone(),
                message: ignore.message.clone(),
            }));
        }
    }

    for retry in retries {
        if list_matches(&retry.retryable_errors, &text) {
            if current_attempt >= retry.max_attempts {
                return Err(Error::MaxAttemptsReached {
                    block: retry.name.clone(),
                    max: retry.max_attempts,
                    cause: Box::new(clone_for_cause(err)),
                });
            }
            return Ok(Some(Action::Retry {
                sleep_secs: retry.sleep_interval_sec,
            }));
        }
    }

    Ok(None)
}

/// `Error` doesn't derive `Clone` (it wraps other non-`Clone` error types) — `MaxAttemptsReached`
/// only needs the text for the report, so we downgrade to a flattened message instead of cloning.
///
fn clone_for_cause(err: &Error) -> Error {
    Error::Hook {
        name: "<retry-cause>".to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_error(stderr: &str) -> Error {
        Error::ProcessExecution {
            argv: vec!["tofu".into(), "apply".into()],
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.to_string(),
            cause: None,
        }
    }

    #[test]
    fn canonicalize_strips_ansi_and_collapses_whitespace() {
        let raw = "\x1b[31mError:\x1b[0m   lock   held\n\nby pid 42";
        assert_eq!(canonicalize(raw), "Error: lock held by pid 42");
    }

    #[test]
    fn ignore_checked_before_retry_for_same_error() {
        let err = process_error("Error: resource already exists");
        let ignores = vec![IgnoreConfig {
            name: "already-exists".into(),
            ignorable_errors: vec![Pattern::positive(Regex::new("already exists").unwrap())],
            message: "treated as success".into(),
            signals: BTreeMap::new(),
        }];
        let retries = vec![RetryConfig {
            name: "generic".into(),
            retryable_errors: vec![Pattern::positive(Regex::new("already exists").unwrap())],
            max_attempts: 3,
            sleep_interval_sec: 1,
        }];

        let action = attempt_recovery(&err, 0, &ignores, &retries).unwrap();
        assert!(matches!(action, Some(Action::Ignore { .. })));
    }

    #[test]
    fn retry_fails_with_max_attempts_reached_once_exhausted() {
        let err = process_error("Error: connection reset by peer");
        let retries = vec![RetryConfig {
            name: "network".into(),
            retryable_errors: vec![Pattern::positive(Regex::new("connection reset").unwrap())],
            max_attempts: 2,
            sleep_interval_sec: 5,
        }];

        assert!(matches!(
            attempt_recovery(&err, 0, &[], &retries).unwrap(),
            Some(Action::Retry { sleep_secs: 5 })
        ));
        assert!(matches!(
            attempt_recovery(&err, 2, &[], &retries),
            Err(Error::MaxAttemptsReached { .. })
        ));
    }

    #[test]
    fn negative_pattern_cancels_earlier_positive_match() {
        let err = process_error("Error: already exists but ignore_me marker present");
        let ignores = vec![IgnoreConfig {
            name: "already-exists".into(),
            ignorable_errors: vec![
                Pattern::positive(Regex::new("already exists").unwrap()),
                Pattern::negative(Regex::new("ignore_me marker").unwrap()),
            ],
            message: "treated as success".into(),
            signals: BTreeMap::new(),
        }];

        assert_eq!(attempt_recovery(&err, 0, &ignores, &[]).unwrap(), None);
    }

    #[test]
    fn no_matching_rule_returns_none() {
        let err = process_error("Error: something entirely unrelated");
        assert_eq!(attempt_recovery(&err, 0, &[], &[]).unwrap(), None);
    }
}
