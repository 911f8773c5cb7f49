//! Deterministic, pure logic for experiment resolution.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod directive;
pub mod instant;
pub mod manifest;
pub mod naming;
pub mod patcher;
pub mod selector;
pub mod types;
pub mod url;
