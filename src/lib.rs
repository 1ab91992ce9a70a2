//! # Gleaner: Declarative Extraction Pipeline
//!
//! Gleaner is the runtime behind a family of per-source document parsers. A
//! parser declares named steps and the engine runs them, in a fixed order,
//! against one document at a time.
//!
//! ## Step kinds
//!
//! - **Attribute**: return value becomes a field of the parse result
//! - **Control**: runs for its side effects on the shared cache
//! - **Filter**: a truthy return value rejects the document
//!
//! Steps with a priority run first, in ascending order; steps without one run
//! after them. Names break ties.
//!
//! ## Example
//!
//! ```
//! use gleaner::{DocumentParser, ParseContext, ParserEngine, SharedCache, StepDeclaration, StepError};
//! use serde_json::Value;
//!
//! struct Article;
//!
//! impl Article {
//!     fn normalize(&self, cache: &mut SharedCache) -> Result<Value, StepError> {
//!         cache.put("lang", "en".to_string());
//!         Ok(Value::Null)
//!     }
//!
//!     fn is_empty(&self, cache: &mut SharedCache) -> Result<Value, StepError> {
//!         Ok(Value::Bool(cache.require::<String>("document")?.is_empty()))
//!     }
//!
//!     fn title(&self, cache: &mut SharedCache) -> Result<Value, StepError> {
//!         Ok(Value::String(cache.require::<String>("document")?.clone()))
//!     }
//! }
//!
//! impl DocumentParser for Article {
//!     fn steps(&self) -> Vec<StepDeclaration<Self>> {
//!         vec![
//!             StepDeclaration::attribute("title", Self::title),
//!             StepDeclaration::filter("is_empty", Self::is_empty).with_priority(0),
//!             StepDeclaration::control("normalize", Self::normalize).with_priority(-1),
//!         ]
//!     }
//! }
//!
//! let engine = ParserEngine::new(Article).unwrap();
//! assert_eq!(engine.attributes(), vec!["title"]);
//!
//! let outcome = engine.parse("Hello".to_string(), ParseContext::new()).unwrap();
//! assert!(outcome.is_accepted());
//!
//! let outcome = engine.parse(String::new(), ParseContext::new()).unwrap();
//! assert!(outcome.is_rejected());
//! ```

// Core modules
pub mod cache;
pub mod result;
pub mod step;
pub mod step_registry;

// Engine and manifest loading
pub mod runtime;

// Re-export key types
pub use cache::{ParseContext, SharedCache, DOCUMENT_KEY};
pub use result::{ParseOutcome, ParseResult};
pub use step::{
    compute_execution_order, execution_key, is_truthy, RegisteredStep, StepDeclaration, StepError,
    StepFn, StepKind,
};
pub use step_registry::StepRegistry;

pub use runtime::{
    DocumentParser, ParseError, ParserEngine, ParserError, ParserManifest, StepDecl, StepPlan,
};
