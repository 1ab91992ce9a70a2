//! Parse results and outcomes.

use std::io::{self, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute values produced by one successful `parse` call.
///
/// Keys appear in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParseResult {
    values: IndexMap<String, Value>,
}

impl ParseResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an attribute value, replacing any previous value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.values
    }

    /// Convert result to a JSON object, keys in execution order
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Convert result to NDJSON line (newline-delimited JSON)
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

impl IntoIterator for ParseResult {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Terminal state of one `parse` call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Every step ran and no filter fired
    Accepted(ParseResult),
    /// The named filter returned a truthy value; no result is produced
    Rejected { filter: String },
}

impl ParseOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ParseOutcome::Accepted(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ParseOutcome::Rejected { .. })
    }

    pub fn result(&self) -> Option<&ParseResult> {
        match self {
            ParseOutcome::Accepted(result) => Some(result),
            ParseOutcome::Rejected { .. } => None,
        }
    }

    /// The result, or `None` for a rejected document.
    pub fn into_result(self) -> Option<ParseResult> {
        match self {
            ParseOutcome::Accepted(result) => Some(result),
            ParseOutcome::Rejected { .. } => None,
        }
    }

    /// Append an accepted result to `writer` as one NDJSON line.
    ///
    /// Rejected outcomes write nothing.
    ///
    /// # Returns
    /// Whether a line was written
    pub fn write_ndjson<W: Write>(&self, writer: &mut W) -> io::Result<bool> {
        match self {
            ParseOutcome::Accepted(result) => {
                writer.write_all(result.to_ndjson_line()?.as_bytes())?;
                Ok(true)
            }
            ParseOutcome::Rejected { .. } => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_preserves_insertion_order() {
        let mut result = ParseResult::new();
        result.insert("title", json!("Hello"));
        result.insert("body", json!("Text"));
        result.insert("authors", json!(["A"]));

        let names: Vec<&str> = result.names().collect();
        assert_eq!(names, vec!["title", "body", "authors"]);
    }

    #[test]
    fn test_result_to_json() {
        let mut result = ParseResult::new();
        result.insert("title", json!("Hello"));
        result.insert("publishing_date", Value::Null);

        assert_eq!(result.to_json(), json!({"title": "Hello", "publishing_date": null}));

        let line = result.to_ndjson_line().unwrap();
        assert_eq!(line, "{\"title\":\"Hello\",\"publishing_date\":null}\n");
    }

    #[test]
    fn test_to_json_keeps_execution_order() {
        let mut result = ParseResult::new();
        result.insert("title", json!("Hello"));
        result.insert("body", json!("Text"));
        result.insert("authors", json!([]));

        let json = result.to_json();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "body", "authors"]);
        assert_eq!(
            serde_json::to_string(&json).unwrap() + "\n",
            result.to_ndjson_line().unwrap()
        );
    }

    #[test]
    fn test_write_ndjson_skips_rejected() {
        let mut first = ParseResult::new();
        first.insert("title", json!("One"));
        let mut second = ParseResult::new();
        second.insert("title", json!("Two"));

        let outcomes = vec![
            ParseOutcome::Accepted(first),
            ParseOutcome::Rejected {
                filter: "missing_body".to_string(),
            },
            ParseOutcome::Accepted(second),
        ];

        let mut out = Vec::new();
        let mut written = 0;
        for outcome in &outcomes {
            if outcome.write_ndjson(&mut out).unwrap() {
                written += 1;
            }
        }

        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"title\":\"One\"}\n{\"title\":\"Two\"}\n"
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let mut result = ParseResult::new();
        result.insert("title", json!("Hello"));

        let accepted = ParseOutcome::Accepted(result.clone());
        assert!(accepted.is_accepted());
        assert_eq!(accepted.result(), Some(&result));
        assert_eq!(accepted.into_result(), Some(result));

        let rejected = ParseOutcome::Rejected {
            filter: "reject_if_empty".to_string(),
        };
        assert!(rejected.is_rejected());
        assert_eq!(rejected.result(), None);
        assert_eq!(rejected.into_result(), None);
    }
}
