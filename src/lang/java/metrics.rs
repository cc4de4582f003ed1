//! Java metrics catalog.

use crate::metrics::{helpers, MetricKey, MetricResult, MetricsProvider};
use crate::tree::{NodeId, SyntaxTree};

/// Type-level keys.
pub static TYPE_METRICS: &[MetricKey] = &[
    MetricKey::type_level("NCSS"),
    MetricKey::type_level("WMC"),
    MetricKey::type_level("NOM"),
];

/// Operation-level keys.
pub static OPERATION_METRICS: &[MetricKey] = &[
    MetricKey::operation_level("CYCLO"),
    MetricKey::operation_level("NCSS"),
    MetricKey::operation_level("NPARAM"),
];

/// Java [`MetricsProvider`].
///
/// All computations run over the normalized tree; none touch the source
/// text, so repeated invocation is trivially deterministic.
pub struct JavaMetrics;

impl MetricsProvider for JavaMetrics {
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
            (crate::metrics::MetricScope::Type, "NCSS") => {
                MetricResult::Value(helpers::statement_count(tree, node) as f64)
            }
            (crate::metrics::MetricScope::Type, "WMC") => {
                // Weighted method count: sum of operation complexities.
                // Meaningless on a type with no operations.
                let ops = helpers::operations_of(tree, node);
                if ops.is_empty() {
                    return MetricResult::NotApplicable;
                }
                let total: f64 = ops
                    .iter()
                    .filter(|&&op| helpers::has_body(tree, op))
                    .map(|&op| helpers::cyclomatic_complexity(tree, op))
                    .sum();
                MetricResult::Value(total)
            }
            (crate::metrics::MetricScope::Type, "NOM") => {
                MetricResult::Value(helpers::operations_of(tree, node).len() as f64)
            }
            (crate::metrics::MetricScope::Operation, "CYCLO") => {
                if !helpers::has_body(tree, node) {
                    return MetricResult::NotApplicable;
                }
                MetricResult::Value(helpers::cyclomatic_complexity(tree, node))
            }
            (crate::metrics::MetricScope::Operation, "NCSS") => {
                if !helpers::has_body(tree, node) {
                    return MetricResult::NotApplicable;
                }
                MetricResult::Value(helpers::statement_count(tree, node) as f64)
            }
            (crate::metrics::MetricScope::Operation, "NPARAM") => {
                MetricResult::Value(helpers::parameter_count(tree, node) as f64)
            }
            _ => MetricResult::NotApplicable,
        }
    }
}
