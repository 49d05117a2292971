//! Well-known config filenames, shared by the parser (which reads them) and discovery (which
//! looks for them).
//!

/// Marks a directory as a unit component.
pub const UNIT_CONFIG_FILENAME: &str = "terragrunt.hcl";

/// Marks a directory as a stack component. Checked before [`UNIT_CONFIG_FILENAME`] is ruled out —
/// a directory carrying both is a unit, per spec.md §4.2 ("if both, unit wins").
pub const STACK_CONFIG_FILENAME: &str = "terragrunt.stack.hcl";

/// What `find_in_parent_folders()` looks for in ancestor directories.
pub const PARENT_INCLUDE_FILENAME: &str = "root.hcl";
