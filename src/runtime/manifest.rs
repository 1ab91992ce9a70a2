//! Parser manifest loader.
//!
//! A manifest is a YAML declaration table: for each step, its name, kind and
//! optional priority. Callables come from a [`StepRegistry`](crate::StepRegistry);
//! the manifest only decides how the engine treats them.
//!
//! ```yaml
//! name: world_truth
//! steps:
//!   - name: normalize
//!     kind: control
//!     priority: -1
//!   - name: reject_if_empty
//!     kind: filter
//!     priority: 0
//!   - name: title
//!     kind: attribute
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::runtime::engine::{ParserError, StepPlan};
use crate::step::{execution_key, validate_step_names, StepKind};

/// Parser manifest: a named table of step declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserManifest {
    /// Parser name (used in logs)
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Step declarations, in any order
    #[serde(default)]
    pub steps: Vec<StepDecl>,
}

/// One step declaration in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDecl {
    pub name: String,

    /// `attribute`, `control` (or its legacy alias `function`), or `filter`
    pub kind: String,

    #[serde(default)]
    pub priority: Option<i64>,

    #[serde(default)]
    pub doc: Option<String>,
}

impl StepDecl {
    pub fn step_kind(&self) -> Result<StepKind, ParserError> {
        self.kind.parse()
    }
}

impl ParserManifest {
    /// Load a manifest from a YAML file.
    ///
    /// # Errors
    /// Returns error if the file can't be read, isn't valid YAML, or fails
    /// [`validate`](Self::validate)
    ///
    /// # Example
    /// ```ignore
    /// use gleaner::ParserManifest;
    ///
    /// let manifest = ParserManifest::load_from_file("parsers/world_truth.yaml")?;
    /// println!("Attributes: {:?}", manifest.attributes());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParserError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| ParserError::ManifestRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(path = %path.display(), "Loading parser manifest");

        Self::from_yaml_str(&contents)
    }

    /// Parse and validate a manifest from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ParserError> {
        let manifest: ParserManifest = serde_yaml::from_str(contents)
            .map_err(|e| ParserError::ManifestParse(e.to_string()))?;

        manifest.validate()?;

        Ok(manifest)
    }

    /// Check kinds and step names.
    ///
    /// Unknown kinds are rejected here, so an engine never holds a step it
    /// does not know how to run.
    pub fn validate(&self) -> Result<(), ParserError> {
        for decl in &self.steps {
            decl.step_kind()?;
        }

        validate_step_names(self.steps.iter().map(|decl| decl.name.as_str()))
    }

    /// Get a step declaration by name.
    pub fn get_step(&self, name: &str) -> Option<&StepDecl> {
        self.steps.iter().find(|decl| decl.name == name)
    }

    /// Execution plan the engine would use, without binding any callables.
    pub fn plan(&self) -> Result<Vec<StepPlan>, ParserError> {
        self.validate()?;

        let mut ordered: Vec<&StepDecl> = self.steps.iter().collect();
        ordered.sort_by(|a, b| {
            execution_key(&a.name, a.priority).cmp(&execution_key(&b.name, b.priority))
        });

        ordered
            .into_iter()
            .enumerate()
            .map(|(position, decl)| {
                Ok(StepPlan {
                    position,
                    name: decl.name.clone(),
                    kind: decl.step_kind()?,
                    priority: decl.priority,
                })
            })
            .collect()
    }

    /// Attribute names in execution order.
    pub fn attributes(&self) -> Result<Vec<String>, ParserError> {
        Ok(self
            .plan()?
            .into_iter()
            .filter(|step| step.kind == StepKind::Attribute)
            .map(|step| step.name)
            .collect())
    }
}
