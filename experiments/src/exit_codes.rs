//! Stable exit codes for the `experiments` CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config, or input files.
pub const INVALID: i32 = 1;
/// No experiment applies (missing metadata, unusable manifest, fetch failure).
pub const NO_EXPERIMENT: i32 = 2;
