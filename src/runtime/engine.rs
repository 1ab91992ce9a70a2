//! Parser engine: discovers declared steps once and runs them per document.
//!
//! The engine owns the ordered steps of one parser. Every `parse` call builds
//! its own [`SharedCache`], so an engine can be shared across threads and no
//! cache entry ever survives from one call into the next.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{ParseContext, SharedCache, DOCUMENT_KEY};
use crate::result::{ParseOutcome, ParseResult};
use crate::runtime::manifest::ParserManifest;
use crate::step::{
    compute_execution_order, is_truthy, validate_step_names, RegisteredStep, StepDeclaration,
    StepError, StepKind,
};
use crate::step_registry::StepRegistry;

/// Error type for building an engine or loading its declarations
#[derive(Debug, Clone, PartialEq)]
pub enum ParserError {
    DuplicateStep(String),
    InvalidStepName(String),
    UnknownKind(String),
    StepNotRegistered(String),
    ManifestRead { path: String, reason: String },
    ManifestParse(String),
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::DuplicateStep(name) => {
                write!(f, "Step '{}' is declared more than once", name)
            }
            ParserError::InvalidStepName(name) => {
                write!(f, "Invalid step name '{}': expected an identifier", name)
            }
            ParserError::UnknownKind(kind) => write!(
                f,
                "Unknown step kind '{}': expected attribute, control or filter",
                kind
            ),
            ParserError::StepNotRegistered(name) => {
                write!(f, "No callable registered for step '{}'", name)
            }
            ParserError::ManifestRead { path, reason } => {
                write!(f, "Failed to read manifest {}: {}", path, reason)
            }
            ParserError::ManifestParse(msg) => write!(f, "Failed to parse manifest: {}", msg),
        }
    }
}

impl std::error::Error for ParserError {}

/// Error type for a `parse` call
///
/// A failing step aborts the call; the steps after it never run and no
/// partial result is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    StepFailed {
        step: String,
        kind: StepKind,
        source: StepError,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::StepFailed { step, kind, source } => {
                write!(f, "{} '{}' failed: {}", kind, step, source)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::StepFailed { source, .. } => Some(source),
        }
    }
}

/// A concrete document parser.
///
/// Implementors return their registration table: one [`StepDeclaration`] per
/// attribute, control and filter. The table is read once, when the engine is
/// built, and its order does not matter.
///
/// # Example
///
/// ```
/// use gleaner::{DocumentParser, ParseContext, ParserEngine, SharedCache, StepDeclaration, StepError};
/// use serde_json::Value;
///
/// struct Shouting;
///
/// impl Shouting {
///     fn text(&self, cache: &mut SharedCache) -> Result<Value, StepError> {
///         let doc = cache.require::<String>("document")?;
///         Ok(Value::String(doc.to_uppercase()))
///     }
/// }
///
/// impl DocumentParser for Shouting {
///     fn steps(&self) -> Vec<StepDeclaration<Self>> {
///         vec![StepDeclaration::attribute("text", Self::text)]
///     }
/// }
///
/// let engine = ParserEngine::new(Shouting).unwrap();
/// let outcome = engine.parse("hey".to_string(), ParseContext::new()).unwrap();
/// assert_eq!(outcome.into_result().unwrap().get("text"), Some(&Value::from("HEY")));
/// ```
pub trait DocumentParser: Send + Sync + Sized + 'static {
    fn steps(&self) -> Vec<StepDeclaration<Self>>;
}

/// One entry of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepPlan {
    pub position: usize,
    pub name: String,
    pub kind: StepKind,
    pub priority: Option<i64>,
}

/// Runs a parser's steps, in a fixed order, against one document at a time.
pub struct ParserEngine {
    /// Steps in execution order; fixed at construction
    steps: Vec<RegisteredStep>,
}

impl ParserEngine {
    /// Build an engine for a parser instance.
    ///
    /// # Errors
    /// Returns error if two steps share a name or a name is not an identifier
    pub fn new<P: DocumentParser>(parser: P) -> Result<Self, ParserError> {
        Self::from_shared(Arc::new(parser))
    }

    /// Build an engine for a parser instance that is already shared.
    pub fn from_shared<P: DocumentParser>(parser: Arc<P>) -> Result<Self, ParserError> {
        let steps = parser
            .steps()
            .into_iter()
            .map(|declaration| declaration.attach(&parser))
            .collect();

        Self::from_steps(steps)
    }

    /// Build an engine from steps that are already bound.
    pub fn from_steps(steps: Vec<RegisteredStep>) -> Result<Self, ParserError> {
        validate_step_names(steps.iter().map(RegisteredStep::name))?;

        let steps = compute_execution_order(steps);

        tracing::debug!(
            steps = steps.len(),
            order = ?steps.iter().map(RegisteredStep::name).collect::<Vec<_>>(),
            "Built parser engine"
        );

        Ok(Self { steps })
    }

    /// Build an engine from a manifest, taking callables from `registry`.
    ///
    /// # Errors
    /// Returns error if the manifest is invalid or names a step the registry
    /// does not know
    pub fn from_manifest(
        manifest: &ParserManifest,
        registry: &StepRegistry,
    ) -> Result<Self, ParserError> {
        manifest.validate()?;

        let steps = manifest
            .steps
            .iter()
            .map(|decl| registry.bind(&decl.name, decl.step_kind()?, decl.priority))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            manifest = %manifest.name,
            steps = steps.len(),
            "Bound manifest steps"
        );

        Self::from_steps(steps)
    }

    /// Parse one document.
    ///
    /// Seeds a fresh cache with `document` under [`DOCUMENT_KEY`] and then
    /// every entry of `context`, then runs the steps in order.
    ///
    /// # Returns
    /// * `Ok(ParseOutcome::Accepted(result))` - all steps ran
    /// * `Ok(ParseOutcome::Rejected { filter })` - a filter fired
    ///
    /// # Errors
    /// Returns the first step error; remaining steps are skipped
    pub fn parse<D: Any + Send + Sync>(
        &self,
        document: D,
        context: ParseContext,
    ) -> Result<ParseOutcome, ParseError> {
        let mut cache = SharedCache::new();
        cache.put(DOCUMENT_KEY, document);
        context.seed(&mut cache);

        self.run_steps(&mut cache)
    }

    // Only called from `parse`, on a cache it has just created and seeded.
    fn run_steps(&self, cache: &mut SharedCache) -> Result<ParseOutcome, ParseError> {
        let mut result = ParseResult::new();

        for step in &self.steps {
            tracing::trace!(step = step.name(), kind = %step.kind(), "Running step");

            let value = step.invoke(cache).map_err(|source| ParseError::StepFailed {
                step: step.name().to_string(),
                kind: step.kind(),
                source,
            })?;

            match step.kind() {
                StepKind::Control => {}
                StepKind::Attribute => {
                    result.insert(step.name(), value);
                }
                StepKind::Filter => {
                    if is_truthy(&value) {
                        tracing::debug!(filter = step.name(), "Document rejected");
                        return Ok(ParseOutcome::Rejected {
                            filter: step.name().to_string(),
                        });
                    }
                }
            }
        }

        Ok(ParseOutcome::Accepted(result))
    }

    /// Names of the attributes a successful parse produces, in execution order.
    pub fn attributes(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| step.kind() == StepKind::Attribute)
            .map(RegisteredStep::name)
            .collect()
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[RegisteredStep] {
        &self.steps
    }

    pub fn plan(&self) -> Vec<StepPlan> {
        self.steps
            .iter()
            .enumerate()
            .map(|(position, step)| StepPlan {
                position,
                name: step.name().to_string(),
                kind: step.kind(),
                priority: step.priority(),
            })
            .collect()
    }

}

impl fmt::Debug for ParserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserEngine")
            .field("steps", &self.steps)
            .finish()
    }
}
