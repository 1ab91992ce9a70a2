//! Step declarations and registered steps.
//!
//! A step is one named operation declared by a parser: an attribute whose
//! return value becomes a field of the parse result, a control that publishes
//! derived values into the shared cache, or a filter that can reject the
//! document outright.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::cache::SharedCache;
use crate::runtime::ParserError;

/// Error type for step callables
#[derive(Debug, Clone, PartialEq)]
pub enum StepError {
    MissingCacheEntry {
        key: String,
    },
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
    Failed(String),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::MissingCacheEntry { key } => {
                write!(f, "Cache entry '{}' not found", key)
            }
            StepError::TypeMismatch { key, expected } => {
                write!(f, "Cache entry '{}' is not of type {}", key, expected)
            }
            StepError::Failed(msg) => write!(f, "Step failed: {}", msg),
        }
    }
}

impl std::error::Error for StepError {}

/// How the engine treats a step's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Return value is stored in the result under the step's name
    Attribute,
    /// Run for side effects on the shared cache; return value is discarded
    Control,
    /// A truthy return value rejects the document
    Filter,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Attribute => "attribute",
            StepKind::Control => "control",
            StepKind::Filter => "filter",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = ParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attribute" => Ok(StepKind::Attribute),
            // "function" is the legacy tag for control steps
            "control" | "function" => Ok(StepKind::Control),
            "filter" => Ok(StepKind::Filter),
            other => Err(ParserError::UnknownKind(other.to_string())),
        }
    }
}

/// Trait for step callables
///
/// A step reads (and, for controls, writes) the shared cache of the current
/// `parse` call and returns a JSON value. Errors are propagated to the caller
/// of `parse` untouched.
pub trait StepFn: Send + Sync {
    fn call(&self, cache: &mut SharedCache) -> Result<Value, StepError>;
}

impl<F> StepFn for F
where
    F: Fn(&mut SharedCache) -> Result<Value, StepError> + Send + Sync,
{
    fn call(&self, cache: &mut SharedCache) -> Result<Value, StepError> {
        self(cache)
    }
}

type OwnedStepFn<P> = Arc<dyn Fn(&P, &mut SharedCache) -> Result<Value, StepError> + Send + Sync>;

/// A step declared by a parser type `P`, not yet bound to an instance.
///
/// Parsers return a fresh table of declarations from
/// [`DocumentParser::steps`](crate::runtime::DocumentParser::steps); the
/// engine binds each one to the parser instance with [`attach`](Self::attach).
///
/// # Example
///
/// ```
/// use gleaner::{SharedCache, StepDeclaration, StepError};
/// use serde_json::Value;
///
/// struct Headline;
///
/// impl Headline {
///     fn title(&self, _cache: &mut SharedCache) -> Result<Value, StepError> {
///         Ok(Value::from("Hello"))
///     }
/// }
///
/// let decl = StepDeclaration::attribute("title", Headline::title).with_priority(2);
/// assert_eq!(decl.name(), "title");
/// assert_eq!(decl.priority(), Some(2));
/// ```
pub struct StepDeclaration<P> {
    name: String,
    kind: StepKind,
    priority: Option<i64>,
    func: OwnedStepFn<P>,
}

impl<P: Send + Sync + 'static> StepDeclaration<P> {
    pub fn new<F>(name: impl Into<String>, kind: StepKind, func: F) -> Self
    where
        F: Fn(&P, &mut SharedCache) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            priority: None,
            func: Arc::new(func),
        }
    }

    /// Declare an attribute step
    pub fn attribute<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&P, &mut SharedCache) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        Self::new(name, StepKind::Attribute, func)
    }

    /// Declare a control step
    pub fn control<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&P, &mut SharedCache) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        Self::new(name, StepKind::Control, func)
    }

    /// Declare a filter step
    pub fn filter<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&P, &mut SharedCache) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        Self::new(name, StepKind::Filter, func)
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn priority(&self) -> Option<i64> {
        self.priority
    }

    /// Bind this declaration to one parser instance.
    ///
    /// The returned step keeps its own handle on `owner` and can be invoked
    /// with nothing but the shared cache.
    pub fn attach(self, owner: &Arc<P>) -> RegisteredStep {
        let owner = Arc::clone(owner);
        let func = self.func;

        RegisteredStep {
            name: self.name,
            kind: self.kind,
            priority: self.priority,
            func: Arc::new(move |cache: &mut SharedCache| func(&*owner, cache)),
        }
    }
}

impl<P> fmt::Debug for StepDeclaration<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDeclaration")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// A bound step, ready for execution.
///
/// Name, kind and priority are fixed at construction; the only thing that
/// happens to a registered step afterwards is invocation.
#[derive(Clone)]
pub struct RegisteredStep {
    name: String,
    kind: StepKind,
    priority: Option<i64>,
    func: Arc<dyn StepFn>,
}

impl RegisteredStep {
    /// Create a step from a callable that needs no owner.
    ///
    /// # Example
    ///
    /// ```
    /// use gleaner::{RegisteredStep, SharedCache, StepKind};
    /// use serde_json::Value;
    ///
    /// let step = RegisteredStep::new("lang", StepKind::Attribute, None, |_cache: &mut SharedCache| {
    ///     Ok(Value::from("en"))
    /// });
    ///
    /// let mut cache = SharedCache::new();
    /// assert_eq!(step.invoke(&mut cache).unwrap(), Value::from("en"));
    /// ```
    pub fn new<F>(name: impl Into<String>, kind: StepKind, priority: Option<i64>, func: F) -> Self
    where
        F: Fn(&mut SharedCache) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        Self::from_shared(name, kind, priority, Arc::new(func))
    }

    pub(crate) fn from_shared(
        name: impl Into<String>,
        kind: StepKind,
        priority: Option<i64>,
        func: Arc<dyn StepFn>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            priority,
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn priority(&self) -> Option<i64> {
        self.priority
    }

    /// Invoke the bound callable, forwarding its value or its error.
    pub fn invoke(&self, cache: &mut SharedCache) -> Result<Value, StepError> {
        self.func.call(cache)
    }

    /// Position of this step relative to `other` in execution order.
    pub fn execution_cmp(&self, other: &Self) -> Ordering {
        execution_key(&self.name, self.priority).cmp(&execution_key(&other.name, other.priority))
    }
}

impl fmt::Debug for RegisteredStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredStep")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RegisteredStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.priority {
            Some(priority) => write!(f, "registered {} '{}' (priority {})", self.kind, self.name, priority),
            None => write!(f, "registered {} '{}'", self.kind, self.name),
        }
    }
}

/// Total sort key for execution order.
///
/// Steps with a priority come first, ascending; steps without one follow.
/// The name breaks every remaining tie, so the order never depends on the
/// order in which steps were declared.
pub fn execution_key(name: &str, priority: Option<i64>) -> (bool, i64, &str) {
    (priority.is_none(), priority.unwrap_or(0), name)
}

/// Sort steps into execution order.
///
/// # Example
///
/// ```
/// use gleaner::{compute_execution_order, RegisteredStep, SharedCache, StepKind};
/// use serde_json::Value;
///
/// let noop = |_cache: &mut SharedCache| Ok(Value::Null);
/// let steps = vec![
///     RegisteredStep::new("b_attr", StepKind::Attribute, None, noop),
///     RegisteredStep::new("a_attr", StepKind::Attribute, None, noop),
///     RegisteredStep::new("late", StepKind::Control, Some(5), noop),
///     RegisteredStep::new("early", StepKind::Control, Some(1), noop),
/// ];
///
/// let names: Vec<String> = compute_execution_order(steps)
///     .iter()
///     .map(|s| s.name().to_string())
///     .collect();
/// assert_eq!(names, vec!["early", "late", "a_attr", "b_attr"]);
/// ```
pub fn compute_execution_order(mut steps: Vec<RegisteredStep>) -> Vec<RegisteredStep> {
    steps.sort_by(|a, b| a.execution_cmp(b));
    steps
}

fn step_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid step name pattern"))
}

/// Check that step names are identifiers and unique.
///
/// Attribute names double as result keys, so a duplicate would silently
/// overwrite another step's value.
pub fn validate_step_names<'a, I>(names: I) -> Result<(), ParserError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();

    for name in names {
        if !step_name_pattern().is_match(name) {
            return Err(ParserError::InvalidStepName(name.to_string()));
        }
        if !seen.insert(name) {
            return Err(ParserError::DuplicateStep(name.to_string()));
        }
    }

    Ok(())
}

/// Truthiness of a step's return value, as used by filters.
///
/// `null`, `false`, zero, the empty string, the empty array and the empty
/// object are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(name: &str, priority: Option<i64>) -> RegisteredStep {
        RegisteredStep::new(name, StepKind::Attribute, priority, |_cache: &mut SharedCache| {
            Ok(Value::Null)
        })
    }

    fn names(steps: &[RegisteredStep]) -> Vec<&str> {
        steps.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_prioritized_steps_run_before_unprioritized() {
        let ordered = compute_execution_order(vec![
            step("none", None),
            step("five", Some(5)),
            step("one", Some(1)),
        ]);

        assert_eq!(names(&ordered), vec!["one", "five", "none"]);
    }

    #[test]
    fn test_unprioritized_steps_sorted_by_name() {
        let ordered = compute_execution_order(vec![step("b_attr", None), step("a_attr", None)]);

        assert_eq!(names(&ordered), vec!["a_attr", "b_attr"]);
    }

    #[test]
    fn test_equal_priorities_sorted_by_name() {
        let ordered = compute_execution_order(vec![
            step("zeta", Some(3)),
            step("alpha", Some(3)),
            step("mid", Some(2)),
        ]);

        assert_eq!(names(&ordered), vec!["mid", "alpha", "zeta"]);
    }

    #[test]
    fn test_negative_priority_sorts_first() {
        let ordered = compute_execution_order(vec![
            step("title", None),
            step("reject_if_empty", Some(0)),
            step("normalize", Some(-1)),
        ]);

        assert_eq!(names(&ordered), vec!["normalize", "reject_if_empty", "title"]);
    }

    #[test]
    fn test_step_kind_from_str() {
        assert_eq!("attribute".parse::<StepKind>().unwrap(), StepKind::Attribute);
        assert_eq!("control".parse::<StepKind>().unwrap(), StepKind::Control);
        assert_eq!("function".parse::<StepKind>().unwrap(), StepKind::Control);
        assert_eq!("filter".parse::<StepKind>().unwrap(), StepKind::Filter);

        let err = "transform".parse::<StepKind>().unwrap_err();
        assert!(matches!(err, ParserError::UnknownKind(ref k) if k == "transform"));
    }

    #[test]
    fn test_step_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(StepKind::Control).unwrap(), json!("control"));
        assert_eq!(
            serde_json::to_value(["function".parse::<StepKind>().unwrap(), StepKind::Filter]).unwrap(),
            json!(["control", "filter"])
        );
    }

    #[test]
    fn test_attach_binds_owner() {
        struct Greeter {
            greeting: String,
        }

        let owner = Arc::new(Greeter {
            greeting: "hi".to_string(),
        });

        let registered = StepDeclaration::attribute("greeting", |g: &Greeter, _cache: &mut SharedCache| {
            Ok(Value::String(g.greeting.clone()))
        })
        .with_priority(4)
        .attach(&owner);

        assert_eq!(registered.name(), "greeting");
        assert_eq!(registered.kind(), StepKind::Attribute);
        assert_eq!(registered.priority(), Some(4));

        let mut cache = SharedCache::new();
        assert_eq!(registered.invoke(&mut cache).unwrap(), json!("hi"));
    }

    #[test]
    fn test_invoke_propagates_error() {
        let failing = RegisteredStep::new("broken", StepKind::Control, None, |_cache: &mut SharedCache| {
            Err(StepError::Failed("boom".to_string()))
        });

        let mut cache = SharedCache::new();
        assert_eq!(
            failing.invoke(&mut cache),
            Err(StepError::Failed("boom".to_string()))
        );
    }

    #[test]
    fn test_validate_step_names() {
        assert!(validate_step_names(["title", "body", "_private"]).is_ok());

        let err = validate_step_names(["title", "title"]).unwrap_err();
        assert!(matches!(err, ParserError::DuplicateStep(ref n) if n == "title"));

        let err = validate_step_names(["bad name"]).unwrap_err();
        assert!(matches!(err, ParserError::InvalidStepName(_)));
    }

    #[test]
    fn test_is_truthy() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy in [json!(true), json!(1), json!(-2.5), json!("x"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(step("title", None).to_string(), "registered attribute 'title'");
        assert_eq!(
            step("body", Some(2)).to_string(),
            "registered attribute 'body' (priority 2)"
        );
    }
}
