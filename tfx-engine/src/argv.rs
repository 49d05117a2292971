//! IaC binary argv transformation, per spec.md §6.
//!

/// Flags that consume the following token as their value (space-separated form). Unknown flags
/// default to boolean, so a new upstream flag degrades safely instead of eating an argument it
/// shouldn't.
///
const VALUE_TAKING_FLAGS: &[&str] = &[
    "-var",
    "-var-file",
    "-target",
    "-lock-timeout",
    "-chdir",
    "-out",
    "-backend-config",
    "-platform",
];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    Flag { name: String, value: Option<String> },
    Positional(String),
}

/// A parsed invocation: the recognised command plus an ordering-preserving token list.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedArgv {
    pub cmd: String,
    pub tokens: Vec<Token>,
}

impl ParsedArgv {
    /// `cmd == "destroy"`, or `cmd == "apply"` with a `-destroy` flag present.
    ///
    pub fn is_destroy(&self) -> bool {
        self.cmd == "destroy"
            || (self.cmd == "apply"
                && self
                    .tokens
                    .iter()
                    .any(|t| matches!(t, Token::Flag { name, .. } if name == "-destroy")))
    }

    /// Rebuild `argv` (without the binary name), moving a trailing positional plan-file argument
    /// to the end for `apply`/`destroy` — the one case where IaC binaries expect the plan file
    /// last regardless of where the user typed it.
    ///
    pub fn into_argv(mut self) -> Vec<String> {
        let mut argv = vec![self.cmd.clone()];
        let reorder_plan_file = self.cmd == "apply" || self.cmd == "destroy";

        let mut plan_file: Option<String> = None;
        if reorder_plan_file {
            if let Some(pos) = self
                .tokens
                .iter()
                .rposition(|t| matches!(t, Token::Positional(_)))
            {
                if let Token::Positional(value) = self.tokens.remove(pos) {
                    plan_file = Some(value);
                }
            }
        }

        for token in &self.tokens {
            match token {
                Token::Flag { name, value: Some(v) } => {
                    argv.push(name.clone());
                    argv.push(v.clone());
                }
                Token::Flag { name, value: None } => argv.push(name.clone()),
                Token::Positional(value) => argv.push(value.clone()),
            }
        }
        if let Some(plan_file) = plan_file {
            argv.push(plan_file);
        }
        argv
    }
}

/// Parses `[<cmd>, <flags...>, <positional...>]` (the binary name itself is not part of `args`).
/// The first non-flag token becomes `cmd`; everything else is walked left to right, ordering
/// preserved.
///
pub fn parse(args: &[String]) -> ParsedArgv {
    let mut iter = args.iter();
    let mut cmd = String::new();
    let mut tokens = Vec::new();

    while let Some(arg) = iter.next() {
        if !arg.starts_with('-') && cmd.is_empty() {
            cmd = arg.clone();
            continue;
        }
        if arg.starts_with('-') {
            if VALUE_TAKING_FLAGS.contains(&arg.as_str()) {
                let value = iter.next().cloned();
                tokens.push(Token::Flag {
                    name: arg.clone(),
                    value,
                });
            } else {
                tokens.push(Token::Flag {
                    name: arg.clone(),
                    value: None,
                });
            }
        } else {
            tokens.push(Token::Positional(arg.clone()));
        }
    }

    ParsedArgv { cmd, tokens }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn value_taking_flag_consumes_next_token() {
        let parsed = parse(&args(&["plan", "-var", "region=eu-west-1", "-out", "plan.tfplan"]));
        assert_eq!(parsed.cmd, "plan");
        assert_eq!(
            parsed.tokens,
            vec![
                Token::Flag { name: "-var".into(), value: Some("region=eu-west-1".into()) },
                Token::Flag { name: "-out".into(), value: Some("plan.tfplan".into()) },
            ]
        );
    }

    #[test]
    fn unknown_flag_is_boolean_and_next_token_is_positional() {
        let parsed = parse(&args(&["plan", "-refresh-only", "extra"]));
        assert_eq!(
            parsed.tokens,
            vec![
                Token::Flag { name: "-refresh-only".into(), value: None },
                Token::Positional("extra".into()),
            ]
        );
    }

    #[test]
    fn is_destroy_true_for_destroy_cmd_or_apply_with_flag() {
        assert!(parse(&args(&["destroy"])).is_destroy());
        assert!(parse(&args(&["apply", "-destroy"])).is_destroy());
        assert!(!parse(&args(&["apply"])).is_destroy());
        assert!(!parse(&args(&["plan"])).is_destroy());
    }

    #[test]
    fn plan_file_moved_to_end_for_apply_and_destroy() {
        let parsed = parse(&args(&["apply", "plan.tfplan", "-auto-approve"]));
        assert_eq!(
            parsed.into_argv(),
            vec!["apply".to_string(), "-auto-approve".to_string(), "plan.tfplan".to_string()]
        );
    }

    #[test]
    fn plan_file_order_untouched_for_plan() {
        let parsed = parse(&args(&["plan", "-out", "plan.tfplan"]));
        assert_eq!(
            parsed.into_argv(),
            vec!["plan".to_string(), "-out".to_string(), "plan.tfplan".to_string()]
        );
    }
}
