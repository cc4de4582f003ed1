//! End-to-end pipeline tests through the Java reference plugin.
#![cfg(feature = "tree-sitter")]

use std::sync::Arc;

use crosslint::lang::java::JavaLanguage;
use crosslint::rules::builtin::{CyclomaticComplexityRule, HIGH_COMPLEXITY};
use crosslint::rules::flow::USE_BEFORE_DEFINITION;
use crosslint::{
    AnalysisOptions, Engine, FileStatus, LanguageModule, LanguageVersion, ReportingStrategy,
    RuleSet, Severity, SourceParser,
};

fn java_engine(strategy: ReportingStrategy) -> Engine {
    Engine::with_strategy(
        vec![Arc::new(JavaLanguage) as Arc<dyn LanguageModule>],
        strategy,
    )
    .unwrap()
}

fn complexity_rules() -> Vec<RuleSet> {
    vec![RuleSet::new("quality")
        .with_rule(Arc::new(CyclomaticComplexityRule { threshold: 2.0 }))]
}

const BRANCHY: &str = r#"
class Branchy {
    int pick(int a, int b, int c) {
        if (a > b) {
            return a;
        }
        if (b > c) {
            return b;
        }
        if (a > c) {
            return a;
        }
        return c;
    }
}
"#;

#[test]
fn test_complexity_violation_end_to_end() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let outcome = engine.analyze_source(
        "Branchy.java",
        BRANCHY,
        "java",
        &complexity_rules(),
        &AnalysisOptions::default(),
    );

    assert!(outcome.status.is_completed(), "{:?}", outcome.status);
    assert_eq!(outcome.violations.len(), 1);
    let v = &outcome.violations[0];
    assert_eq!(v.rule, HIGH_COMPLEXITY);
    assert_eq!(v.severity, Severity::Warning);
    assert!(v.message.contains("pick"));
}

#[test]
fn test_version_gate_fail_fast_aborts_file() {
    // Records were standardized in 16; at 11 without preview the file is
    // rejected with a single error naming the requirement.
    let engine = java_engine(ReportingStrategy::FailFast);
    let options = AnalysisOptions {
        version: Some(LanguageVersion::new(11)),
        ..Default::default()
    };
    let outcome = engine.analyze_source(
        "Point.java",
        "record Point(int x, int y) {}",
        "java",
        &[],
        &options,
    );

    match outcome.status {
        FileStatus::VersionFailed(err) => {
            assert_eq!(err.0.feature, "records");
            assert_eq!(err.0.required, Some(16));
            assert_eq!(err.0.active.ordinal, 11);
        }
        other => panic!("expected version failure, got {:?}", other),
    }
    assert!(outcome.violations.is_empty());
}

#[test]
fn test_version_gate_collect_mode_keeps_analyzing() {
    let engine = java_engine(ReportingStrategy::Collect);
    let options = AnalysisOptions {
        version: Some(LanguageVersion::new(11)),
        ..Default::default()
    };
    let source = format!("record Point(int x, int y) {{}}\n{}", BRANCHY);
    let outcome = engine.analyze_source(
        "Mixed.java",
        &source,
        "java",
        &complexity_rules(),
        &options,
    );

    assert!(outcome.status.is_completed());
    assert_eq!(outcome.version_diagnostics.len(), 1);
    assert_eq!(outcome.version_diagnostics[0].feature, "records");
    // The rest of the tree was still annotated and checked.
    assert_eq!(outcome.violations.len(), 1);
}

#[test]
fn test_preview_feature_needs_flag() {
    let engine = java_engine(ReportingStrategy::Collect);
    let source = "record Point(int x, int y) {}";

    // 14 previews records.
    let with_preview = AnalysisOptions {
        version: Some(LanguageVersion::with_preview(14)),
        ..Default::default()
    };
    let outcome = engine.analyze_source("P.java", source, "java", &[], &with_preview);
    assert!(outcome.version_diagnostics.is_empty());

    let without_preview = AnalysisOptions {
        version: Some(LanguageVersion::new(14)),
        ..Default::default()
    };
    let outcome = engine.analyze_source("P.java", source, "java", &[], &without_preview);
    assert_eq!(outcome.version_diagnostics.len(), 1);
}

#[test]
fn test_parse_failure_degrades_to_empty_results() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let outcome = engine.analyze_source(
        "Broken.java",
        "class Broken { int",
        "java",
        &complexity_rules(),
        &AnalysisOptions::default(),
    );
    assert!(matches!(outcome.status, FileStatus::ParseFailed(_)));
    assert!(outcome.violations.is_empty());
}

#[test]
fn test_missing_lookup_degrades_not_crashes() {
    // References leaving the file resolve to the unknown marker; qualified
    // name and type resolution keep going.
    let engine = java_engine(ReportingStrategy::FailFast);
    let source = r#"
import com.external.Service;

class Client {
    Service service;

    void ping() {
        service.call();
        Helper.assist();
    }
}
"#;
    let outcome = engine.analyze_source(
        "Client.java",
        source,
        "java",
        &complexity_rules(),
        &AnalysisOptions::default(),
    );
    assert!(outcome.status.is_completed(), "{:?}", outcome.status);
}

#[test]
fn test_use_before_definition_flow_rule() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let source = r#"
class Maybe {
    int compute(boolean flag) {
        int x;
        if (flag) {
            x = 1;
        }
        return x;
    }

    int fine() {
        int y = 2;
        return y;
    }
}
"#;
    let outcome = engine.analyze_source(
        "Maybe.java",
        source,
        "java",
        &[],
        &AnalysisOptions::default(),
    );
    assert!(outcome.status.is_completed());

    let ubd: Vec<_> = outcome
        .violations
        .iter()
        .filter(|v| v.rule == USE_BEFORE_DEFINITION)
        .collect();
    assert_eq!(ubd.len(), 1, "violations: {:?}", outcome.violations);
    assert!(ubd[0].message.contains('x'));
    assert_eq!(ubd[0].severity, Severity::Error);
}

#[test]
fn test_suppression_moves_violation_to_suppressed() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let source = r#"
class Branchy {
    int pick(int a, int b, int c) { // crosslint:ignore high-complexity - ported
        if (a > b) {
            return a;
        }
        if (b > c) {
            return b;
        }
        if (a > c) {
            return a;
        }
        return c;
    }
}
"#;
    let outcome = engine.analyze_source(
        "Branchy.java",
        source,
        "java",
        &complexity_rules(),
        &AnalysisOptions::default(),
    );
    assert!(outcome.status.is_completed());
    assert!(outcome.violations.is_empty(), "{:?}", outcome.violations);
    assert_eq!(outcome.suppressed.len(), 1);
    assert_eq!(outcome.suppressed[0].violation.rule, HIGH_COMPLEXITY);
    assert_eq!(outcome.suppressed[0].suppression.reason, "ported");
}

#[test]
fn test_suppress_warnings_annotation() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let source = r#"
class Branchy {
    @SuppressWarnings("crosslint:high-complexity")
    int pick(int a, int b, int c) {
        if (a > b) {
            return a;
        }
        if (b > c) {
            return b;
        }
        if (a > c) {
            return a;
        }
        return c;
    }
}
"#;
    let outcome = engine.analyze_source(
        "Branchy.java",
        source,
        "java",
        &complexity_rules(),
        &AnalysisOptions::default(),
    );
    assert!(outcome.violations.is_empty(), "{:?}", outcome.violations);
    assert_eq!(outcome.suppressed.len(), 1);
    assert_eq!(outcome.suppressed[0].suppression.reason, "@SuppressWarnings");
}

#[test]
fn test_cancellation_is_a_distinguished_outcome() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let options = AnalysisOptions::default();
    options.cancel.cancel();
    let outcome = engine.analyze_source(
        "Branchy.java",
        BRANCHY,
        "java",
        &complexity_rules(),
        &options,
    );
    assert!(matches!(outcome.status, FileStatus::Cancelled));
    assert!(outcome.violations.is_empty());
}

#[test]
fn test_facade_determinism_across_fresh_trees() {
    // Two fresh parses of the same source, fully decorated, must agree on
    // every annotation.
    let module = JavaLanguage;
    let engine = java_engine(ReportingStrategy::FailFast);
    let handler = engine.handler("java", None).unwrap();

    let decorate = || {
        let mut tree = handler.parser().parse("Branchy.java", BRANCHY).unwrap();
        handler.run_symbol_pass(&mut tree, None).unwrap();
        handler.run_qualified_name_pass(&mut tree, None).unwrap();
        handler.run_type_pass(&mut tree, None).unwrap();
        handler.run_dataflow_pass(&mut tree).unwrap();
        tree
    };
    let a = decorate();
    let b = decorate();

    assert_eq!(a.len(), b.len());
    let sa = a.annotations().symbols().unwrap();
    let sb = b.annotations().symbols().unwrap();
    assert_eq!(sa.symbol_count(), sb.symbol_count());
    assert_eq!(sa.scope_count(), sb.scope_count());
    for node in a.preorder() {
        assert_eq!(sa.binding(node), sb.binding(node), "binding for {:?}", node);
        assert_eq!(
            a.annotations().type_of(node),
            b.annotations().type_of(node),
            "type for {:?}",
            node
        );
        assert_eq!(
            a.annotations().qualified_name(node).map(|q| q.to_string()),
            b.annotations().qualified_name(node).map(|q| q.to_string()),
        );
    }
    assert_eq!(module.id(), "java");
}

#[test]
fn test_concurrent_analyses_share_handler_without_interference() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let rules = complexity_rules();

    let simple = "class Simple { int id() { return 1; } }";

    std::thread::scope(|scope| {
        let branchy = scope.spawn(|| {
            engine.analyze_source(
                "Branchy.java",
                BRANCHY,
                "java",
                &rules,
                &AnalysisOptions::default(),
            )
        });
        let plain = scope.spawn(|| {
            engine.analyze_source(
                "Simple.java",
                simple,
                "java",
                &rules,
                &AnalysisOptions::default(),
            )
        });

        let branchy = branchy.join().unwrap();
        let plain = plain.join().unwrap();
        assert_eq!(branchy.violations.len(), 1);
        assert!(plain.violations.is_empty());
    });
}

#[test]
fn test_multifile_pass_changes_no_other_annotations() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let handler = engine.handler("java", None).unwrap();

    let decorate = |multifile: bool| {
        let mut tree = handler.parser().parse("Branchy.java", BRANCHY).unwrap();
        handler.run_symbol_pass(&mut tree, None).unwrap();
        handler.run_qualified_name_pass(&mut tree, None).unwrap();
        handler.run_type_pass(&mut tree, None).unwrap();
        handler.run_dataflow_pass(&mut tree).unwrap();
        if multifile {
            #[allow(deprecated)]
            handler.run_multifile_pass(&mut tree).unwrap();
        }
        tree
    };
    let without = decorate(false);
    let with = decorate(true);

    for node in without.preorder() {
        assert_eq!(
            without.annotations().type_of(node),
            with.annotations().type_of(node)
        );
        assert_eq!(
            without.annotations().qualified_name(node).map(|q| q.to_string()),
            with.annotations().qualified_name(node).map(|q| q.to_string())
        );
        assert!(without.annotations().usage_summary(node).is_none());
    }
    let class = with.nodes_where(|k| k.is_type_decl())[0];
    assert!(with.annotations().usage_summary(class).is_some());
}

#[test]
fn test_violations_serialize_for_the_sink() {
    let engine = java_engine(ReportingStrategy::FailFast);
    let outcome = engine.analyze_source(
        "Branchy.java",
        BRANCHY,
        "java",
        &complexity_rules(),
        &AnalysisOptions::default(),
    );
    let json = serde_json::to_string(&outcome.violations).unwrap();
    assert!(json.contains("high-complexity"));
    assert!(json.contains("\"severity\":\"warning\""));
}
