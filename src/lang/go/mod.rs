//! Go language plugin.
//!
//! The minimal reference plugin: enough to prove the contract generalizes
//! beyond Java. Generics are the one version-gated construct (Go 1.18);
//! ordinals pack `major * 100 + minor`.

mod parser;

pub use parser::GoParser;

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::lang::{LanguageModule, SourceParser};
use crate::metrics::{helpers, MetricKey, MetricResult, MetricScope, MetricsProvider};
use crate::query::{builtins, FunctionRegistry, RegistrationConflict};
use crate::rules::{DefaultViolationFactory, ViolationFactory};
use crate::tree::{NodeId, NodeKind, OperationKind, SyntaxTree};
use crate::version::{FeatureClassifier, FeatureSpec, FeatureTable, LanguageVersion};

/// Pack a Go `major.minor` release into a gate ordinal.
pub const fn version_ordinal(major: u32, minor: u32) -> u32 {
    major * 100 + minor
}

const FEATURES: FeatureTable = FeatureTable::new(&[FeatureSpec::standard(
    "generics",
    version_ordinal(1, 18),
)]);

fn classify_feature(tree: &SyntaxTree, node: NodeId) -> Option<&'static str> {
    match tree.kind(node) {
        NodeKind::TypeParameter => Some("generics"),
        _ => None,
    }
}

/// The Go [`LanguageModule`].
pub struct GoLanguage;

impl LanguageModule for GoLanguage {
    fn id(&self) -> &'static str {
        "go"
    }

    fn display_name(&self) -> &'static str {
        "Go"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn default_version(&self) -> LanguageVersion {
        LanguageVersion::new(version_ordinal(1, 22))
    }

    fn features(&self) -> FeatureTable {
        FEATURES
    }

    fn feature_classifier(&self) -> FeatureClassifier {
        classify_feature
    }

    fn parser(&self) -> Box<dyn SourceParser> {
        Box::new(GoParser::new())
    }

    fn metrics(&self) -> Arc<dyn MetricsProvider> {
        Arc::new(GoMetrics)
    }

    fn register_functions(
        &self,
        registry: &mut FunctionRegistry,
    ) -> Result<(), RegistrationConflict> {
        builtins::register_shared(registry)?;
        builtins::register_type_predicates(registry, "go")
    }

    fn violation_factory(&self) -> Arc<dyn ViolationFactory> {
        // Go has no annotation convention; the comment-directive factory
        // covers it.
        let factory: Arc<DefaultViolationFactory> = Arc::clone(&*FACTORY);
        factory
    }
}

static FACTORY: Lazy<Arc<DefaultViolationFactory>> =
    Lazy::new(|| Arc::new(DefaultViolationFactory));

static TYPE_METRICS: &[MetricKey] = &[MetricKey::type_level("NOM")];

static OPERATION_METRICS: &[MetricKey] = &[
    MetricKey::operation_level("CYCLO"),
    MetricKey::operation_level("NCSS"),
];

/// Go [`MetricsProvider`].
pub struct GoMetrics;

impl MetricsProvider for GoMetrics {
    fn type_metrics(&self) -> &'static [MetricKey] {
        TYPE_METRICS
    }

    fn operation_metrics(&self) -> &'static [MetricKey] {
        OPERATION_METRICS
    }

    fn compute(&self, key: MetricKey, tree: &SyntaxTree, node: NodeId) -> MetricResult {
        if !key.applies_to(tree, node) {
            return MetricResult::NotApplicable;
        }
        match (key.scope, key.name) {
            (MetricScope::Type, "NOM") => {
                // Methods are declared at top level with a receiver; count
                // the ones whose receiver names this type.
                let Some(type_name) = tree.name(node) else {
                    return MetricResult::NotApplicable;
                };
                let count = tree
                    .nodes_where(|k| k == NodeKind::Operation(OperationKind::Method))
                    .into_iter()
                    .filter(|&m| receiver_type(tree, m).as_deref() == Some(type_name))
                    .count();
                MetricResult::Value(count as f64)
            }
            (MetricScope::Operation, "CYCLO") => {
                if !helpers::has_body(tree, node) {
                    return MetricResult::NotApplicable;
                }
                MetricResult::Value(helpers::cyclomatic_complexity(tree, node))
            }
            (MetricScope::Operation, "NCSS") => {
                if !helpers::has_body(tree, node) {
                    return MetricResult::NotApplicable;
                }
                MetricResult::Value(helpers::statement_count(tree, node) as f64)
            }
            _ => MetricResult::NotApplicable,
        }
    }
}

/// Receiver type of a method: the first parameter's type, stripped of `*`.
fn receiver_type(tree: &SyntaxTree, method: NodeId) -> Option<String> {
    tree.children(method)
        .iter()
        .find(|&&c| tree.kind(c) == NodeKind::Parameter)
        .and_then(|&c| tree.type_name(c))
        .map(|t| t.trim_start_matches('*').to_string())
}
