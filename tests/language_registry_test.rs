//! Cross-language engine wiring: shared registrations, conflicts, handler
//! cache behavior, and the Go plugin end-to-end.
#![cfg(feature = "tree-sitter")]

use std::sync::Arc;

use crosslint::lang::go::{version_ordinal, GoLanguage};
use crosslint::lang::java::JavaLanguage;
use crosslint::rules::flow::UNREACHABLE_CODE;
use crosslint::rules::DefaultViolationFactory;
use crosslint::tree::{NodeId, NodeKind, Span, SyntaxTree, TreeBuilder};
use crosslint::version::FeatureClassifier;
use crosslint::{
    AnalysisOptions, Engine, FeatureTable, FileStatus, FunctionDef, FunctionRegistry,
    LanguageModule, LanguageVersion, MetricKey, MetricResult, MetricsProvider, Namespace,
    ParseError, QueryValue, RegistrationConflict, ReportingStrategy, SourceParser,
    ViolationFactory,
};

fn both_languages() -> Vec<Arc<dyn LanguageModule>> {
    vec![
        Arc::new(JavaLanguage) as Arc<dyn LanguageModule>,
        Arc::new(GoLanguage) as Arc<dyn LanguageModule>,
    ]
}

#[test]
fn test_two_languages_share_global_functions_without_conflict() {
    // Both plugins register `metric` and `comment-on` globally with the
    // same fingerprints; initialization must not raise a conflict.
    let engine = Engine::new(both_languages()).unwrap();
    assert!(engine.functions().len() >= 2 + 3 + 3);
}

/// A module that claims the global `metric` name with its own body.
struct RogueModule;

struct NullMetrics;

impl MetricsProvider for NullMetrics {
    fn type_metrics(&self) -> &'static [MetricKey] {
        &[]
    }
    fn operation_metrics(&self) -> &'static [MetricKey] {
        &[]
    }
    fn compute(&self, _: MetricKey, _: &SyntaxTree, _: NodeId) -> MetricResult {
        MetricResult::NotApplicable
    }
}

struct NullParser;

impl SourceParser for NullParser {
    fn parse(&mut self, _file: &str, _source: &str) -> Result<SyntaxTree, ParseError> {
        let mut b = TreeBuilder::new();
        b.open(NodeKind::CompilationUnit, Span::default());
        b.close();
        Ok(b.finish())
    }
}

const NO_FEATURES: FeatureTable = FeatureTable::new(&[]);

fn no_classifier(_: &SyntaxTree, _: NodeId) -> Option<&'static str> {
    None
}

impl LanguageModule for RogueModule {
    fn id(&self) -> &'static str {
        "rogue"
    }
    fn file_extensions(&self) -> &'static [&'static str] {
        &["rogue"]
    }
    fn default_version(&self) -> LanguageVersion {
        LanguageVersion::new(1)
    }
    fn features(&self) -> FeatureTable {
        NO_FEATURES
    }
    fn feature_classifier(&self) -> FeatureClassifier {
        no_classifier
    }
    fn parser(&self) -> Box<dyn SourceParser> {
        Box::new(NullParser)
    }
    fn metrics(&self) -> Arc<dyn MetricsProvider> {
        Arc::new(NullMetrics)
    }
    fn register_functions(
        &self,
        registry: &mut FunctionRegistry,
    ) -> Result<(), RegistrationConflict> {
        registry.register(FunctionDef {
            namespace: Namespace::Global,
            name: "metric",
            fingerprint: "rogue/metric@1",
            body: Arc::new(|_, _, _| Ok(QueryValue::Empty)),
        })
    }
    fn violation_factory(&self) -> Arc<dyn ViolationFactory> {
        Arc::new(DefaultViolationFactory)
    }
}

#[test]
fn test_conflicting_global_registration_fails_engine_init() {
    let mut modules = both_languages();
    modules.push(Arc::new(RogueModule));
    let err = Engine::new(modules).unwrap_err();
    assert_eq!(err.name, "metric");
    assert_eq!(err.offered, "rogue/metric@1");
}

#[test]
fn test_handler_cache_is_keyed_by_language_version_preview() {
    let engine = Engine::new(both_languages()).unwrap();

    let a = engine.handler("java", Some(LanguageVersion::new(17))).unwrap();
    let b = engine.handler("java", Some(LanguageVersion::new(17))).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let c = engine.handler("java", Some(LanguageVersion::new(11))).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));

    let d = engine.handler("go", None).unwrap();
    assert_eq!(d.language(), "go");

    assert!(engine.handler("cobol", None).is_none());
}

const GENERIC_GO: &str = r#"
package main

func Map[T any](items []T) []T {
    return items
}
"#;

#[test]
fn test_go_generics_gated_below_118() {
    let engine = Engine::with_strategy(both_languages(), ReportingStrategy::Collect).unwrap();

    let old = AnalysisOptions {
        version: Some(LanguageVersion::new(version_ordinal(1, 17))),
        ..Default::default()
    };
    let outcome = engine.analyze_source("map.go", GENERIC_GO, "go", &[], &old);
    assert!(outcome.status.is_completed());
    assert_eq!(outcome.version_diagnostics.len(), 1);
    assert_eq!(outcome.version_diagnostics[0].feature, "generics");
    assert_eq!(
        outcome.version_diagnostics[0].required,
        Some(version_ordinal(1, 18))
    );

    let new = AnalysisOptions {
        version: Some(LanguageVersion::new(version_ordinal(1, 18))),
        ..Default::default()
    };
    let outcome = engine.analyze_source("map.go", GENERIC_GO, "go", &[], &new);
    assert!(outcome.version_diagnostics.is_empty());
}

#[test]
fn test_go_unreachable_code_flow_rule() {
    let engine = Engine::new(both_languages()).unwrap();
    let source = r#"
package main

func answer() int {
    return 42
    println("never")
}
"#;
    let outcome = engine.analyze_source("dead.go", source, "go", &[], &AnalysisOptions::default());
    assert!(outcome.status.is_completed(), "{:?}", outcome.status);
    let dead: Vec<_> = outcome
        .violations
        .iter()
        .filter(|v| v.rule == UNREACHABLE_CODE)
        .collect();
    assert_eq!(dead.len(), 1, "violations: {:?}", outcome.violations);
}

#[test]
fn test_unknown_language_is_skipped_not_fatal() {
    let engine = Engine::new(both_languages()).unwrap();
    let outcome = engine.analyze_source(
        "main.zig",
        "const x = 1;",
        "zig",
        &[],
        &AnalysisOptions::default(),
    );
    assert!(matches!(outcome.status, FileStatus::Skipped { .. }));
}

#[test]
fn test_multi_file_run_isolates_failures() {
    use std::io::Write;

    let engine = Engine::new(both_languages()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let good = dir.path().join("Good.java");
    writeln!(
        std::fs::File::create(&good).unwrap(),
        "class Good {{ int id() {{ return 1; }} }}"
    )
    .unwrap();

    let bad = dir.path().join("Bad.java");
    writeln!(std::fs::File::create(&bad).unwrap(), "class Bad {{ int").unwrap();

    let other = dir.path().join("notes.txt");
    writeln!(std::fs::File::create(&other).unwrap(), "not code").unwrap();

    let report = engine.analyze_files(
        &[good, bad, other],
        &[],
        &AnalysisOptions::default(),
    );

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.completed_files(), 1);
    let statuses: Vec<_> = report.outcomes.iter().map(|o| &o.status).collect();
    assert!(statuses.iter().any(|s| matches!(s, FileStatus::ParseFailed(_))));
    assert!(statuses.iter().any(|s| matches!(s, FileStatus::Skipped { .. })));
}
