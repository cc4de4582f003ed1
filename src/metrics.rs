//! Metric keys and the per-language metrics provider contract.
//!
//! A language publishes two catalogs, type-level and operation-level metric
//! keys, and a single computation entry point. Computation is deterministic
//! and side-effect-free on the tree; [`MetricResult::NotApplicable`] is a
//! value, returned when the metric is structurally meaningless for the
//! subject, never an error.

use crate::tree::{NodeId, NodeKind, SyntaxTree};

/// Whether a metric applies to type-level or operation-level subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricScope {
    Type,
    Operation,
}

/// Identifier of one computable metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricKey {
    pub name: &'static str,
    pub scope: MetricScope,
}

impl MetricKey {
    pub const fn type_level(name: &'static str) -> Self {
        Self {
            name,
            scope: MetricScope::Type,
        }
    }

    pub const fn operation_level(name: &'static str) -> Self {
        Self {
            name,
            scope: MetricScope::Operation,
        }
    }

    /// Whether the subject node's kind matches this key's scope.
    pub fn applies_to(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        match self.scope {
            MetricScope::Type => tree.kind(node).is_type_decl(),
            MetricScope::Operation => tree.kind(node).is_operation(),
        }
    }
}

/// Outcome of a metric computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricResult {
    Value(f64),
    NotApplicable,
}

impl MetricResult {
    pub fn value(self) -> Option<f64> {
        match self {
            MetricResult::Value(v) => Some(v),
            MetricResult::NotApplicable => None,
        }
    }

    pub fn is_applicable(self) -> bool {
        matches!(self, MetricResult::Value(_))
    }
}

/// Per-language metric catalog and computation.
///
/// Implementations must be pure: repeated invocation with an unchanged tree
/// returns the same result. No caching is required of implementers, but an
/// expensive metric should be cached keyed by (key, node identity).
pub trait MetricsProvider: Send + Sync {
    /// Type-level keys this language supports.
    fn type_metrics(&self) -> &'static [MetricKey];

    /// Operation-level keys this language supports.
    fn operation_metrics(&self) -> &'static [MetricKey];

    /// Compute a metric for a subject node.
    ///
    /// A key whose scope does not match the subject, or whose structural
    /// requirements the subject cannot meet, yields `NotApplicable`.
    fn compute(&self, key: MetricKey, tree: &SyntaxTree, node: NodeId) -> MetricResult;

    /// Find a supported key by name.
    fn key_named(&self, name: &str) -> Option<MetricKey> {
        self.type_metrics()
            .iter()
            .chain(self.operation_metrics())
            .find(|k| k.name == name)
            .copied()
    }
}

/// Shared counting helpers for providers.
///
/// These operate on the normalized tree, so most languages can assemble
/// their catalog from them and only add language-specific keys on top.
pub mod helpers {
    use super::*;
    use crate::tree::OperationKind;

    /// Non-comment statement count in a subtree (NCSS-style).
    pub fn statement_count(tree: &SyntaxTree, node: NodeId) -> usize {
        tree.descendants(node)
            .filter(|&n| {
                tree.kind(n).is_statement() && tree.kind(n) != NodeKind::Block
            })
            .count()
    }

    /// Decision points in a subtree. Cyclomatic complexity is
    /// `1 + decision points`: if, loop, case, catch, ternary, and the
    /// short-circuit/boolean operators.
    pub fn decision_points(tree: &SyntaxTree, node: NodeId) -> usize {
        tree.descendants(node)
            .filter(|&n| match tree.kind(n) {
                NodeKind::IfStmt
                | NodeKind::LoopStmt
                | NodeKind::CaseClause
                | NodeKind::CatchClause
                | NodeKind::TernaryExpr => true,
                NodeKind::BinaryExpr => {
                    matches!(tree.name(n), Some("&&") | Some("||"))
                }
                _ => false,
            })
            .count()
    }

    /// Cyclomatic complexity of an operation body.
    pub fn cyclomatic_complexity(tree: &SyntaxTree, op: NodeId) -> f64 {
        1.0 + decision_points(tree, op) as f64
    }

    /// Declared parameter count of an operation.
    pub fn parameter_count(tree: &SyntaxTree, op: NodeId) -> usize {
        tree.children(op)
            .iter()
            .filter(|&&c| tree.kind(c) == NodeKind::Parameter)
            .count()
    }

    /// Operations declared directly in a type.
    pub fn operations_of(tree: &SyntaxTree, type_decl: NodeId) -> Vec<NodeId> {
        tree.children(type_decl)
            .iter()
            .copied()
            .filter(|&c| {
                matches!(
                    tree.kind(c),
                    NodeKind::Operation(OperationKind::Method)
                        | NodeKind::Operation(OperationKind::Constructor)
                        | NodeKind::Operation(OperationKind::Function)
                )
            })
            .collect()
    }

    /// Whether an operation has a body to measure.
    pub fn has_body(tree: &SyntaxTree, op: NodeId) -> bool {
        tree.children(op)
            .iter()
            .any(|&c| tree.kind(c) == NodeKind::Block)
    }
}
