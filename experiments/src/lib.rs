//! Experiment resolution and variant targeting for page views.
//!
//! Given a page view, this crate decides which experiment (if any) applies,
//! normalizes its configuration, assigns the viewer to a variant, and rewrites
//! block code locations so variant-specific blocks load instead of defaults.
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (normalization, instant configs,
//!   URL algebra, selection, block patching). No I/O, fully testable in
//!   isolation.
//! - **[`io`]**: Side-effecting collaborators (manifest fetch, sticky
//!   assignments, page inspection, config files), each behind a trait.
//!
//! [`resolve`] coordinates core logic with I/O. Every failure there degrades
//! to "no experiment" so page rendering never depends on experiment
//! infrastructure.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
