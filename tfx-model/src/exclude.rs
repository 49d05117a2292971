//! `exclude { if = ...; actions = [...] }` predicate.
//!

use std::collections::BTreeSet;

/// Sentinel action token meaning "every command".
///
pub const ALL_ACTIONS: &str = "all";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExcludePredicate {
    pub r#if: bool,
    pub actions: BTreeSet<String>,
}

impl ExcludePredicate {
    pub fn new(r#if: bool, actions: BTreeSet<String>) -> Self {
        ExcludePredicate { r#if, actions }
    }

    /// True iff `if` is true AND (`cmd` is listed OR the `all` sentinel is listed).
    ///
    pub fn is_action_listed(&self, cmd: &str) -> bool {
        self.r#if && (self.actions.contains(cmd) || self.actions.contains(ALL_ACTIONS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn if_false_never_excludes() {
        let p = ExcludePredicate::new(false, set(&["apply", "destroy"]));
        assert!(!p.is_action_listed("apply"));
    }

    #[test]
    fn matches_explicit_action() {
        let p = ExcludePredicate::new(true, set(&["destroy"]));
        assert!(p.is_action_listed("destroy"));
        assert!(!p.is_action_listed("apply"));
    }

    #[test]
    fn all_sentinel_matches_any_action() {
        let p = ExcludePredicate::new(true, set(&["all"]));
        assert!(p.is_action_listed("apply"));
        assert!(p.is_action_listed("plan"));
    }
}
