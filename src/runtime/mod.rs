//! Runtime for declared parsers.
//!
//! This module provides the engine that orders a parser's steps and runs them
//! against documents, and the manifest loader for YAML-declared parsers.

pub mod engine;
pub mod manifest;

// Re-export key types
pub use engine::{DocumentParser, ParseError, ParserEngine, ParserError, StepPlan};
pub use manifest::{ParserManifest, StepDecl};
