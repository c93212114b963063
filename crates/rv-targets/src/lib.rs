//! Target specification files for riscv32 cross builds.
//!
//! A target specification is a JSON file describing a compilation
//! target's architecture, instruction-set extensions, ABI, and code-model
//! conventions to a compiler backend, for targets the compiler does not
//! ship built in. This crate models the subset of the schema that a
//! `riscv32imac-unknown-linux-gnu` build actually uses, parses and
//! serializes spec files, and validates them. Validation covers the
//! easy-to-miss case where a configured cross linker carries a different
//! triple than the spec itself, which makes the linker override silently
//! not apply.

pub mod error;
pub mod parse;
pub mod spec;

pub use error::{Result, TargetError};
pub use parse::{load_spec, parse_spec, spec_to_json, validate, Severity, ValidationIssue};
pub use spec::TargetSpec;
