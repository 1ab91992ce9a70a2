//! Integration tests for manifest-declared parsers

use std::fs;

use gleaner::{
    ParseContext, ParseOutcome, ParserEngine, ParserError, ParserManifest, SharedCache, StepKind,
    StepRegistry,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const WORLD_TRUTH: &str = r#"
name: world_truth
description: Title-only publisher
steps:
  - name: title
    kind: attribute
    doc: og:title meta tag
  - name: reject_if_empty
    kind: filter
    priority: 0
  - name: normalize
    kind: control
    priority: -1
"#;

fn registry() -> StepRegistry {
    let mut registry = StepRegistry::new();

    registry.register("normalize", |cache: &mut SharedCache| {
        let lang = cache
            .get::<String>("lang")
            .cloned()
            .unwrap_or_else(|| "en".to_string());
        cache.put("lang", lang.to_lowercase());
        Ok(Value::Null)
    });

    registry.register("reject_if_empty", |cache: &mut SharedCache| {
        let doc = cache.require::<String>("document")?;
        Ok(Value::Bool(doc.trim().is_empty()))
    });

    registry.register("title", |cache: &mut SharedCache| {
        let doc = cache.require::<String>("document")?;
        let lang = cache.require::<String>("lang")?;
        Ok(json!(format!("{} [{}]", doc.trim(), lang)))
    });

    registry
}

fn write_manifest(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("parser.yaml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_engine_from_manifest_file() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, WORLD_TRUTH);

    let manifest = ParserManifest::load_from_file(&path).unwrap();
    let engine = ParserEngine::from_manifest(&manifest, &registry()).unwrap();

    let order: Vec<&str> = engine.steps().iter().map(|s| s.name()).collect();
    assert_eq!(order, vec!["normalize", "reject_if_empty", "title"]);
    assert_eq!(engine.steps()[0].kind(), StepKind::Control);

    let outcome = engine
        .parse("  Hello  ".to_string(), ParseContext::new().with("lang", "DE".to_string()))
        .unwrap();
    assert_eq!(
        outcome.into_result().unwrap().to_json(),
        json!({"title": "Hello [de]"})
    );

    let outcome = engine
        .parse("   ".to_string(), ParseContext::new())
        .unwrap();
    assert_eq!(
        outcome,
        ParseOutcome::Rejected {
            filter: "reject_if_empty".to_string()
        }
    );
}

#[test]
fn test_manifest_plan_matches_engine_plan() {
    let manifest = ParserManifest::from_yaml_str(WORLD_TRUTH).unwrap();
    let engine = ParserEngine::from_manifest(&manifest, &registry()).unwrap();

    assert_eq!(manifest.plan().unwrap(), engine.plan());
    assert_eq!(manifest.attributes().unwrap(), engine.attributes());
}

#[test]
fn test_manifest_with_unregistered_step() {
    let yaml = r#"
name: partial
steps:
  - name: title
    kind: attribute
  - name: authors
    kind: attribute
"#;
    let manifest = ParserManifest::from_yaml_str(yaml).unwrap();

    let err = ParserEngine::from_manifest(&manifest, &registry()).unwrap_err();
    assert_eq!(err, ParserError::StepNotRegistered("authors".to_string()));
}

#[test]
fn test_manifest_with_unknown_kind_file() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(
        &dir,
        r#"
name: broken
steps:
  - name: title
    kind: extractor
"#,
    );

    let err = ParserManifest::load_from_file(&path).unwrap_err();
    assert_eq!(err, ParserError::UnknownKind("extractor".to_string()));
    assert!(err.to_string().contains("extractor"));
}

#[test]
fn test_manifest_rejects_bad_step_name() {
    let yaml = r#"
name: broken
steps:
  - name: "og:title"
    kind: attribute
"#;

    let err = ParserManifest::from_yaml_str(yaml).unwrap_err();
    assert_eq!(err, ParserError::InvalidStepName("og:title".to_string()));
}
