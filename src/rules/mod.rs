//! Rule contract and the violation data model.
//!
//! A rule is a check over a decorated tree; matches become [`Violation`]
//! records through the language's [`ViolationFactory`]. Violations are
//! immutable once produced and owned by the reporting pipeline after the
//! engine hands them off. Factories never fail: a node without a usable
//! span degrades to a whole-file location.

pub mod builtin;
pub mod flow;
pub mod suppress;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::lookup::Lookup;
use crate::metrics::MetricsProvider;
use crate::query::{EvalContext, FunctionRegistry, QueryError, QueryValue};
use crate::rules::suppress::Suppression;
use crate::tree::{NodeId, Span, SyntaxTree};

/// Severity levels for violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// A single reported finding. Produced, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Originating rule identity.
    pub rule: String,
    pub message: String,
    pub file: String,
    pub span: Span,
    pub severity: Severity,
}

impl Violation {
    /// Stable key for deduplication; line numbers are excluded because code
    /// motion shifts them.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.rule, self.file, self.message)
    }
}

/// A violation an in-source directive suppressed. Reported alongside active
/// violations rather than dropped silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressedViolation {
    pub violation: Violation,
    pub suppression: Suppression,
}

/// One check evaluated against a decorated tree.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &RuleContext<'_>, out: &mut ViolationCollector);
}

/// An ordered, named group of rules.
pub struct RuleSet {
    pub id: String,
    pub rules: Vec<Arc<dyn Rule>>,
}

impl RuleSet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Everything a rule may read while checking one file.
pub struct RuleContext<'a> {
    pub tree: &'a SyntaxTree,
    pub source: &'a str,
    pub file: &'a str,
    pub language: &'a str,
    pub functions: &'a FunctionRegistry,
    pub metrics: &'a dyn MetricsProvider,
    pub lookup: Option<&'a dyn Lookup>,
    pub factory: &'a dyn ViolationFactory,
    pub suppressions: &'a [Suppression],
}

impl<'a> RuleContext<'a> {
    pub fn eval(&self) -> EvalContext<'a> {
        EvalContext {
            tree: self.tree,
            source: self.source,
            metrics: self.metrics,
            lookup: self.lookup,
        }
    }

    /// Invoke an extension function in this language's namespace (falling
    /// back to the global one).
    pub fn call(
        &self,
        name: &str,
        node: NodeId,
        args: &[QueryValue],
    ) -> Result<QueryValue, QueryError> {
        self.functions
            .call(&self.eval(), Some(self.language), name, node, args)
    }
}

/// Collects a rule run's findings, partitioned by suppression.
#[derive(Default)]
pub struct ViolationCollector {
    pub active: Vec<Violation>,
    pub suppressed: Vec<SuppressedViolation>,
}

impl ViolationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a violation through the factory and file it under active or
    /// suppressed.
    pub fn report(
        &mut self,
        ctx: &RuleContext<'_>,
        rule: &str,
        severity: Severity,
        node: Option<NodeId>,
        message: String,
    ) {
        let violation = ctx.factory.create(ctx, rule, severity, node, message);
        match ctx.factory.suppression(ctx, node, rule) {
            Some(suppression) => self.suppressed.push(SuppressedViolation {
                violation,
                suppression,
            }),
            None => self.active.push(violation),
        }
    }

    pub fn merge(&mut self, other: ViolationCollector) {
        self.active.extend(other.active);
        self.suppressed.extend(other.suppressed);
    }
}

/// Language-specific construction of violations.
///
/// One shared instance per language; stateless. Overrides adjust location
/// granularity and in-source suppression conventions.
pub trait ViolationFactory: Send + Sync {
    fn create(
        &self,
        ctx: &RuleContext<'_>,
        rule: &str,
        severity: Severity,
        node: Option<NodeId>,
        message: String,
    ) -> Violation {
        default_violation(ctx, rule, severity, node, message)
    }

    /// A suppression covering this violation, if the source carries one.
    fn suppression(
        &self,
        ctx: &RuleContext<'_>,
        node: Option<NodeId>,
        rule: &str,
    ) -> Option<Suppression> {
        let line = node.map(|n| ctx.tree.span(n).start_line).unwrap_or(0);
        suppress::find_suppression(ctx.suppressions, rule, line)
    }
}

/// Best-effort violation construction shared by factories.
pub fn default_violation(
    ctx: &RuleContext<'_>,
    rule: &str,
    severity: Severity,
    node: Option<NodeId>,
    message: String,
) -> Violation {
    let span = node
        .map(|n| ctx.tree.span(n))
        .unwrap_or_else(|| whole_file_span(ctx.source));
    Violation {
        rule: rule.to_string(),
        message,
        file: ctx.file.to_string(),
        span,
        severity,
    }
}

fn whole_file_span(source: &str) -> Span {
    let lines = source.lines().count().max(1);
    Span {
        start_byte: 0,
        end_byte: source.len(),
        start_line: 1,
        start_col: 1,
        end_line: lines,
        end_col: 1,
    }
}

/// The language-neutral factory: node-granular locations, comment-directive
/// suppression only.
pub struct DefaultViolationFactory;

impl ViolationFactory for DefaultViolationFactory {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_round_trip() {
        for s in ["error", "warning", "info"] {
            let parsed: Severity = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_violation_key_ignores_span() {
        let a = Violation {
            rule: "x".into(),
            message: "m".into(),
            file: "f".into(),
            span: Span::point(1, 1),
            severity: Severity::Error,
        };
        let mut b = a.clone();
        b.span = Span::point(9, 9);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_severity_serde_lowercase() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
