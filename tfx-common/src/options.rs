//! CLI flag / environment variable / config file precedence merge.
//!
//! For every declared option, the canonical env var name is `prefix + SCREAMING_SNAKE_CASE` of
//! the flag's kebab-case name. Precedence is CLI flag > env var > config file.
//!

use std::env;

/// A typed option value, as it can come from any of the three sources.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

/// How to parse a raw string (from env or file) into a typed [`Value`].
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    Bool,
    Int,
    Str,
    List,
}

/// One declared option in the flag registry.
///
#[derive(Clone, Debug)]
pub struct OptionSpec {
    /// Kebab-case flag name, e.g. `"ignore-dependency-errors"`.
    pub name: &'static str,
    pub kind: Kind,
}

/// Compute the canonical environment variable name for a declared option.
///
/// `prefix` should already include any trailing separator the caller wants, e.g. `"TFX_"`.
///
pub fn env_var_name(prefix: &str, spec: &OptionSpec) -> String {
    format!("{prefix}{}", spec.name.to_uppercase().replace('-', "_"))
}

/// Parse a raw string into a [`Value`] according to `kind`.
///
/// Bools accept `"true"/"false"` or `"1"/"0"`. Lists are comma-split with surrounding whitespace
/// trimmed from each element.
///
pub fn parse_value(kind: Kind, raw: &str) -> Option<Value> {
    match kind {
        Kind::Bool => match raw {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Kind::Int => raw.parse::<i64>().ok().map(Value::Int),
        Kind::Str => Some(Value::Str(raw.to_string())),
        Kind::List => Some(Value::List(
            raw.split(',').map(|s| s.trim().to_string()).collect(),
        )),
    }
}

/// Resolve one option's effective value: CLI flag wins, then the environment variable, then the
/// config-file value. Returns `None` if none of the three sources set it.
///
pub fn resolve(
    prefix: &str,
    spec: &OptionSpec,
    from_cli: Option<Value>,
    from_file: Option<Value>,
) -> Option<Value> {
    if let Some(v) = from_cli {
        return Some(v);
    }
    let env_name = env_var_name(prefix, spec);
    if let Ok(raw) = env::var(&env_name) {
        if let Some(v) = parse_value(spec.kind, &raw) {
            return Some(v);
        }
    }
    from_file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_name_uppercases_and_replaces_dashes() {
        let spec = OptionSpec {
            name: "ignore-dependency-errors",
            kind: Kind::Bool,
        };
        assert_eq!(
            env_var_name("TFX_", &spec),
            "TFX_IGNORE_DEPENDENCY_ERRORS"
        );
    }

    #[test]
    fn parse_value_bool_accepts_numeric_and_word_forms() {
        assert_eq!(parse_value(Kind::Bool, "true"), Some(Value::Bool(true)));
        assert_eq!(parse_value(Kind::Bool, "1"), Some(Value::Bool(true)));
        assert_eq!(parse_value(Kind::Bool, "false"), Some(Value::Bool(false)));
        assert_eq!(parse_value(Kind::Bool, "0"), Some(Value::Bool(false)));
        assert_eq!(parse_value(Kind::Bool, "nope"), None);
    }

    #[test]
    fn parse_value_list_trims_elements() {
        assert_eq!(
            parse_value(Kind::List, "a, b ,c"),
            Some(Value::List(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string()
            ]))
        );
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let spec = OptionSpec {
            name: "parallelism",
            kind: Kind::Int,
        };
        // No env var set for this made-up name: file value should win over nothing.
        let resolved = resolve(
            "TFX_TEST_",
            &spec,
            None,
            Some(Value::Int(4)),
        );
        assert_eq!(resolved, Some(Value::Int(4)));

        let resolved = resolve(
            "TFX_TEST_",
            &spec,
            Some(Value::Int(8)),
            Some(Value::Int(4)),
        );
        assert_eq!(resolved, Some(Value::Int(8)));
    }
}
