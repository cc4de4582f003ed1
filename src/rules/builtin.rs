//! Language-agnostic rules built on the extension-function registry.
//!
//! These demonstrate the query surface calling back into typed,
//! language-specific computations: metrics, comment retrieval, and type
//! predicates all go through the registered functions rather than
//! language-specific code in the rule.

use crate::query::builtins::{COMMENT_ON, METRIC, TYPE_IS};
use crate::query::QueryValue;
use crate::rules::{Rule, RuleContext, Severity, ViolationCollector};

pub const HIGH_COMPLEXITY: &str = "high-complexity";
pub const COMMENT_REQUIRED: &str = "comment-required";
pub const FORBIDDEN_TYPE: &str = "forbidden-type";

/// Flags operations whose cyclomatic complexity exceeds a threshold.
pub struct CyclomaticComplexityRule {
    pub threshold: f64,
}

impl Default for CyclomaticComplexityRule {
    fn default() -> Self {
        Self { threshold: 10.0 }
    }
}

impl Rule for CyclomaticComplexityRule {
    fn name(&self) -> &'static str {
        HIGH_COMPLEXITY
    }

    fn check(&self, ctx: &RuleContext<'_>, out: &mut ViolationCollector) {
        for op in ctx.tree.nodes_where(|k| k.is_operation()) {
            let result = match ctx.call(METRIC, op, &[QueryValue::Str("CYCLO".into())]) {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(rule = self.name(), %err, "metric call failed");
                    return;
                }
            };
            let Some(complexity) = result.as_number() else {
                continue; // Not applicable (e.g. bodyless declaration).
            };
            if complexity > self.threshold {
                let name = ctx.tree.name(op).unwrap_or("<anonymous>");
                out.report(
                    ctx,
                    self.name(),
                    self.severity(),
                    Some(op),
                    format!(
                        "`{}` has cyclomatic complexity {} (limit {})",
                        name, complexity, self.threshold
                    ),
                );
            }
        }
    }
}

/// Flags public type declarations with no preceding comment.
pub struct CommentRequiredRule;

impl Rule for CommentRequiredRule {
    fn name(&self) -> &'static str {
        COMMENT_REQUIRED
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn check(&self, ctx: &RuleContext<'_>, out: &mut ViolationCollector) {
        for decl in ctx.tree.nodes_where(|k| k.is_type_decl()) {
            if !ctx.tree.has_modifier(decl, "public") {
                continue;
            }
            let comment = match ctx.call(COMMENT_ON, decl, &[]) {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(rule = self.name(), %err, "comment lookup failed");
                    return;
                }
            };
            if comment.is_empty() {
                let name = ctx.tree.name(decl).unwrap_or("<anonymous>");
                out.report(
                    ctx,
                    self.name(),
                    self.severity(),
                    Some(decl),
                    format!("public type `{}` has no documentation comment", name),
                );
            }
        }
    }
}

/// Flags declarations whose static type is a forbidden type or one of its
/// subtypes.
pub struct ForbiddenTypeRule {
    pub type_name: String,
}

impl Rule for ForbiddenTypeRule {
    fn name(&self) -> &'static str {
        FORBIDDEN_TYPE
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &RuleContext<'_>, out: &mut ViolationCollector) {
        let subjects = ctx.tree.nodes_where(|k| {
            matches!(
                k,
                crate::tree::NodeKind::FieldDecl
                    | crate::tree::NodeKind::LocalVarDecl
                    | crate::tree::NodeKind::Parameter
            )
        });
        for decl in subjects {
            let arg = QueryValue::Str(self.type_name.clone());
            let matched = match ctx.call(TYPE_IS, decl, &[arg]) {
                Ok(v) => v.as_bool().unwrap_or(false),
                Err(err) => {
                    tracing::warn!(rule = self.name(), %err, "type predicate failed");
                    return;
                }
            };
            if matched {
                let name = ctx.tree.name(decl).unwrap_or("<anonymous>");
                out.report(
                    ctx,
                    self.name(),
                    self.severity(),
                    Some(decl),
                    format!("`{}` must not be declared as `{}`", name, self.type_name),
                );
            }
        }
    }
}
