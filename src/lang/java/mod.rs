//! Java language plugin.
//!
//! The full reference plugin: tree-sitter parser and normalizer, JDK
//! feature table, metrics catalog, query functions, and a violation factory
//! honoring `@SuppressWarnings` markers alongside comment directives.

mod metrics;
mod parser;

pub use metrics::JavaMetrics;
pub use parser::JavaParser;

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::lang::{LanguageModule, SourceParser};
use crate::metrics::MetricsProvider;
use crate::query::{builtins, FunctionRegistry, RegistrationConflict};
use crate::rules::suppress::{SuppressKind, Suppression};
use crate::rules::{default_violation, RuleContext, Severity, Violation, ViolationFactory};
use crate::tree::{LiteralKind, NodeId, NodeKind, OperationKind, SyntaxTree, TypeDeclKind};
use crate::version::{FeatureClassifier, FeatureSpec, FeatureTable, LanguageVersion};

/// JDK feature gates. Ordinals are JDK release numbers.
const FEATURES: FeatureTable = FeatureTable::new(&[
    FeatureSpec::standard("try-with-resources", 7),
    FeatureSpec::standard("lambda expressions", 8),
    FeatureSpec::standard("local variable type inference", 10),
    FeatureSpec::previewed("switch expressions", 12, 14),
    FeatureSpec::previewed("text blocks", 13, 15),
    FeatureSpec::previewed("records", 14, 16),
    FeatureSpec::previewed("pattern matching for instanceof", 14, 16),
    FeatureSpec::previewed("sealed types", 15, 17),
]);

fn classify_feature(tree: &SyntaxTree, node: NodeId) -> Option<&'static str> {
    match tree.kind(node) {
        NodeKind::Operation(OperationKind::Lambda) => Some("lambda expressions"),
        NodeKind::LocalVarDecl if tree.type_name(node) == Some("var") => {
            Some("local variable type inference")
        }
        NodeKind::SwitchExpr => Some("switch expressions"),
        NodeKind::Literal(LiteralKind::TextBlock) => Some("text blocks"),
        NodeKind::TypeDecl(TypeDeclKind::Record) => Some("records"),
        NodeKind::InstanceOfExpr if tree.name(node).is_some() => {
            Some("pattern matching for instanceof")
        }
        NodeKind::TypeDecl(_)
            if tree.has_modifier(node, "sealed") || tree.has_modifier(node, "non-sealed") =>
        {
            Some("sealed types")
        }
        NodeKind::TryStmt
            if tree
                .children(node)
                .iter()
                .any(|&c| tree.kind(c) == NodeKind::Other("resource_specification")) =>
        {
            Some("try-with-resources")
        }
        _ => None,
    }
}

/// The Java [`LanguageModule`].
pub struct JavaLanguage;

impl LanguageModule for JavaLanguage {
    fn id(&self) -> &'static str {
        "java"
    }

    fn display_name(&self) -> &'static str {
        "Java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn default_version(&self) -> LanguageVersion {
        LanguageVersion::new(17)
    }

    fn features(&self) -> FeatureTable {
        FEATURES
    }

    fn feature_classifier(&self) -> FeatureClassifier {
        classify_feature
    }

    fn parser(&self) -> Box<dyn SourceParser> {
        Box::new(JavaParser::new())
    }

    fn metrics(&self) -> Arc<dyn MetricsProvider> {
        Arc::new(JavaMetrics)
    }

    fn register_functions(
        &self,
        registry: &mut FunctionRegistry,
    ) -> Result<(), RegistrationConflict> {
        builtins::register_shared(registry)?;
        builtins::register_type_predicates(registry, "java")
    }

    fn violation_factory(&self) -> Arc<dyn ViolationFactory> {
        JavaViolationFactory::instance()
    }
}

/// Shared stateless instance.
static FACTORY: Lazy<Arc<JavaViolationFactory>> = Lazy::new(|| Arc::new(JavaViolationFactory));

/// Java-specific violation construction.
///
/// Location granularity: a bare identifier widens to its enclosing
/// statement so reports point at something readable. Suppression: comment
/// directives plus `@SuppressWarnings("crosslint:<rule>")` (or
/// `crosslint:all`) on any enclosing declaration.
pub struct JavaViolationFactory;

impl JavaViolationFactory {
    pub fn instance() -> Arc<JavaViolationFactory> {
        Arc::clone(&FACTORY)
    }
}

impl ViolationFactory for JavaViolationFactory {
    fn create(
        &self,
        ctx: &RuleContext<'_>,
        rule: &str,
        severity: Severity,
        node: Option<NodeId>,
        message: String,
    ) -> Violation {
        let widened = node.map(|n| {
            if ctx.tree.kind(n) == NodeKind::Identifier {
                ctx.tree
                    .ancestor_where(n, |k| k.is_statement())
                    .unwrap_or(n)
            } else {
                n
            }
        });
        default_violation(ctx, rule, severity, widened, message)
    }

    fn suppression(
        &self,
        ctx: &RuleContext<'_>,
        node: Option<NodeId>,
        rule: &str,
    ) -> Option<Suppression> {
        let line = node.map(|n| ctx.tree.span(n).start_line).unwrap_or(0);
        if let Some(found) = crate::rules::suppress::find_suppression(ctx.suppressions, rule, line)
        {
            return Some(found);
        }

        let node = node?;
        let marker = format!("crosslint:{}", rule);
        let mut current = Some(node);
        while let Some(n) = current {
            if ctx.tree.kind(n).is_declaration() {
                for &child in ctx.tree.children(n) {
                    if ctx.tree.kind(child) != NodeKind::Annotation {
                        continue;
                    }
                    let Some(text) = ctx.tree.name(child) else {
                        continue;
                    };
                    if text.contains("SuppressWarnings")
                        && (text.contains(&marker) || text.contains("crosslint:all"))
                    {
                        return Some(Suppression {
                            rule: rule.to_string(),
                            reason: "@SuppressWarnings".to_string(),
                            line: ctx.tree.span(child).start_line,
                            kind: SuppressKind::Line,
                        });
                    }
                }
            }
            current = ctx.tree.parent(n);
        }
        None
    }
}
