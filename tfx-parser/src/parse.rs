//! The partial parser: recovers `dependency`, `include`, `exclude` and the `read_*` call
//! attributes from a config file's [`hcl::Body`] without ever forcing the body through a typed
//! schema — user blocks we don't recognise are walked past, not rejected.
//!

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use hcl::{Attribute, Block, Body, Expression, Structure};
use tfx_model::{ExcludePredicate, IncludeRef, ParsedConfig};

use crate::error::Error;
use crate::resolve::{find_in_parent_folders, resolve_relative};

const DEPENDENCY_BLOCK: &str = "dependency";
const INCLUDE_BLOCK: &str = "include";
const EXCLUDE_BLOCK: &str = "exclude";
const CONFIG_PATH_ATTR: &str = "config_path";
const PATH_ATTR: &str = "path";
const IF_ATTR: &str = "if";
const ACTIONS_ATTR: &str = "actions";
const FIND_IN_PARENT_FOLDERS_FN: &str = "find_in_parent_folders";
const READ_TERRAGRUNT_CONFIG_FN: &str = "read_terragrunt_config";
const READ_TFVARS_FILE_FN: &str = "read_tfvars_file";

/// Parse one config file on disk into a [`ParsedConfig`].
///
pub fn parse_file(path: &Path) -> Result<ParsedConfig, Error> {
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let body = hcl::parse(&content)
        .map_err(|e| Error::parse(path, format!("could not parse as HCL: {e}")))?;
    parse_body(&body, path)
}

/// Parse an already-loaded [`Body`]. Split out of [`parse_file`] so tests can construct fixtures
/// in-memory without touching the filesystem.
///
pub fn parse_body(body: &Body, context_path: &Path) -> Result<ParsedConfig, Error> {
    let config_dir = context_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut parsed = ParsedConfig::default();

    for structure in body.iter() {
        match structure {
            Structure::Block(block) => match block.identifier().as_str() {
                DEPENDENCY_BLOCK => {
                    if let Some(p) = dependency_path(block, &config_dir, context_path)? {
                        parsed.dependency_paths.push(p);
                    }
                }
                INCLUDE_BLOCK => {
                    if let Some(r) = include_ref(block, &config_dir, context_path)? {
                        parsed.include_paths.push(r);
                    }
                }
                EXCLUDE_BLOCK => {
                    parsed.exclude = Some(exclude_predicate(block, context_path)?);
                }
                _ => {}
            },
            Structure::Attribute(attr) => {
                collect_reading(attr.expr(), &config_dir, context_path, &mut parsed.reading)?;
            }
        }
        if let Structure::Block(block) = structure {
            for inner in block.body().iter() {
                if let Structure::Attribute(attr) = inner {
                    collect_reading(attr.expr(), &config_dir, context_path, &mut parsed.reading)?;
                }
            }
        }
    }

    Ok(parsed)
}

fn dependency_path(
    block: &Block,
    config_dir: &Path,
    context_path: &Path,
) -> Result<Option<PathBuf>, Error> {
    let Some(attr) = find_attribute(block.body(), CONFIG_PATH_ATTR) else {
        return Ok(None);
    };
    let raw = expect_string(attr.expr(), context_path)?;
    resolve_relative(config_dir, &raw, context_path).map(Some)
}

fn include_ref(
    block: &Block,
    config_dir: &Path,
    context_path: &Path,
) -> Result<Option<IncludeRef>, Error> {
    let Some(attr) = find_attribute(block.body(), PATH_ATTR) else {
        return Ok(None);
    };
    let name = block
        .labels()
        .first()
        .map(|l| l.as_str().to_string())
        .unwrap_or_default();
    let path = match attr.expr() {
        Expression::FuncCall(call) if call.name.as_str() == FIND_IN_PARENT_FOLDERS_FN => {
            find_in_parent_folders(config_dir, context_path)?
        }
        other => {
            let raw = expect_string(other, context_path)?;
            resolve_relative(config_dir, &raw, context_path)?
        }
    };
    Ok(Some(IncludeRef { name, path }))
}

fn exclude_predicate(block: &Block, context_path: &Path) -> Result<ExcludePredicate, Error> {
    let r#if = match find_attribute(block.body(), IF_ATTR) {
        Some(attr) => expect_bool(attr.expr(), context_path)?,
        None => false,
    };
    let mut actions = BTreeSet::new();
    if let Some(attr) = find_attribute(block.body(), ACTIONS_ATTR) {
        let Expression::Array(items) = attr.expr() else {
            return Err(Error::parse(context_path, "exclude.actions must be an array"));
        };
        for item in items {
            actions.insert(expect_string(item, context_path)?);
        }
    }
    Ok(ExcludePredicate::new(r#if, actions))
}

/// Walks a single expression looking for `read_terragrunt_config(...)` / `read_tfvars_file(...)`
/// call expressions, recording their string argument. Does not recurse into `include` targets —
/// `reading` only ever reflects this file's own attributes, per spec.md §9.
///
fn collect_reading(
    expr: &Expression,
    config_dir: &Path,
    context_path: &Path,
    out: &mut Vec<PathBuf>,
) -> Result<(), Error> {
    match expr {
        Expression::FuncCall(call)
            if call.name.as_str() == READ_TERRAGRUNT_CONFIG_FN
                || call.name.as_str() == READ_TFVARS_FILE_FN =>
        {
            if let Some(arg) = call.args.first() {
                let raw = expect_string(arg, context_path)?;
                out.push(resolve_relative(config_dir, &raw, context_path)?);
            }
        }
        Expression::Array(items) => {
            for item in items {
                collect_reading(item, config_dir, context_path, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn find_attribute<'a>(body: &'a Body, key: &str) -> Option<&'a Attribute> {
    body.iter().find_map(|s| match s {
        Structure::Attribute(attr) if attr.key().as_str() == key => Some(attr),
        _ => None,
    })
}

fn expect_string(expr: &Expression, context_path: &Path) -> Result<String, Error> {
    match expr {
        Expression::String(s) => Ok(s.clone()),
        other => Err(Error::parse(
            context_path,
            format!("expected a string literal, found {other:?}"),
        )),
    }
}

fn expect_bool(expr: &Expression, context_path: &Path) -> Result<bool, Error> {
    match expr {
        Expression::Bool(b) => Ok(*b),
        other => Err(Error::parse(
            context_path,
            format!("expected a bool literal, found {other:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn parse_str(src: &str, path: &Path) -> ParsedConfig {
        let body = hcl::parse(src).expect("fixture must parse");
        parse_body(&body, path).expect("fixture must partial-parse")
    }

    #[test]
    fn extracts_dependency_config_path() {
        let src = r#"
            dependency "vpc" {
              config_path = "../vpc"
            }
        "#;
        let parsed = parse_str(src, Path::new("/work/app/terragrunt.hcl"));
        assert_eq!(parsed.dependency_paths, vec![PathBuf::from("/work/vpc")]);
    }

    #[test]
    fn extracts_include_literal_path() {
        let src = r#"
            include "root" {
              path = "../../root.hcl"
            }
        "#;
        let parsed = parse_str(src, Path::new("/work/a/b/terragrunt.hcl"));
        assert_eq!(parsed.include_paths.len(), 1);
        assert_eq!(parsed.include_paths[0].name, "root");
        assert_eq!(parsed.include_paths[0].path, PathBuf::from("/work/root.hcl"));
    }

    #[test]
    fn extracts_exclude_predicate() {
        let src = r#"
            exclude {
              if      = true
              actions = ["plan", "apply"]
            }
        "#;
        let parsed = parse_str(src, Path::new("/work/app/terragrunt.hcl"));
        let predicate = parsed.exclude.expect("exclude should be present");
        assert!(predicate.is_action_listed("plan"));
        assert!(!predicate.is_action_listed("destroy"));
    }

    #[test]
    fn rejects_bare_identifier_config_path() {
        let src = r#"
            dependency "vpc" {
              config_path = "vpc"
            }
        "#;
        let body = hcl::parse(src).unwrap();
        let err = parse_body(&body, Path::new("/work/app/terragrunt.hcl"));
        assert!(err.is_err());
    }

    #[test]
    fn find_in_parent_folders_locates_ancestor_root_hcl() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root.hcl");
        fs::write(&root, "").unwrap();
        let child = dir.path().join("env").join("app");
        fs::create_dir_all(&child).unwrap();
        let child_config = child.join("terragrunt.hcl");
        let mut f = fs::File::create(&child_config).unwrap();
        writeln!(f, r#"include "root" {{ path = find_in_parent_folders() }}"#).unwrap();

        let parsed = parse_file(&child_config).unwrap();
        assert_eq!(parsed.include_paths[0].path, root);
    }

    #[test]
    fn reading_list_is_not_recursive_through_includes() {
        let src = r#"
            include "root" {
              path = "../root.hcl"
            }
            locals {
              extra = read_tfvars_file("./extra.tfvars")
            }
        "#;
        let parsed = parse_str(src, Path::new("/work/app/terragrunt.hcl"));
        assert_eq!(parsed.reading, vec![PathBuf::from("/work/app/extra.tfvars")]);
    }
}
