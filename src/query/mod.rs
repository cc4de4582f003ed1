//! Query-language extension registry.
//!
//! The tree-query evaluator is language-agnostic; languages extend it by
//! registering named callables into a [`FunctionRegistry`] at engine
//! initialization, either globally or under their own namespace. The
//! registry is built eagerly, read-only afterwards, and shared across
//! concurrent query evaluations. Conflicts between distinct bodies for the
//! same name are detected at registration time, before any file is analyzed.

pub mod builtins;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::lookup::Lookup;
use crate::metrics::MetricsProvider;
use crate::tree::{NodeId, SyntaxTree};

/// Where a function name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Visible to every language's queries.
    Global,
    /// Visible only to queries running under this language.
    Language(&'static str),
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Global => write!(f, "global"),
            Namespace::Language(id) => write!(f, "language `{}`", id),
        }
    }
}

/// Value passed to and returned from extension functions.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Bool(bool),
    Number(f64),
    Str(String),
    Node(NodeId),
    /// Absence of a result (unknown type, no comment, metric not
    /// applicable).
    Empty,
}

impl QueryValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            QueryValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, QueryValue::Empty)
    }
}

/// Read-only evaluation context handed to extension functions.
pub struct EvalContext<'a> {
    pub tree: &'a SyntaxTree,
    pub source: &'a str,
    pub metrics: &'a dyn MetricsProvider,
    pub lookup: Option<&'a dyn Lookup>,
}

/// Errors surfaced by query evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown query function `{name}`")]
    UnknownFunction { name: String },
    #[error("unknown metric `{name}`")]
    UnknownMetric { name: String },
    #[error("`{function}` expects {expected}")]
    BadArgument {
        function: &'static str,
        expected: &'static str,
    },
}

/// An extension function body.
pub type QueryFn =
    Arc<dyn Fn(&EvalContext<'_>, NodeId, &[QueryValue]) -> Result<QueryValue, QueryError> + Send + Sync>;

/// A registration request: name, namespace, and a fingerprint identifying
/// the body. Re-registering the same (namespace, name, fingerprint) is a
/// no-op; the same name with a different fingerprint is a conflict.
pub struct FunctionDef {
    pub namespace: Namespace,
    pub name: &'static str,
    pub fingerprint: &'static str,
    pub body: QueryFn,
}

/// Two registrations disagree about a name. Raised eagerly at engine
/// initialization: this is a configuration defect, not a per-file condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "conflicting registration for {namespace} function `{name}`: \
     `{existing}` vs `{offered}`"
)]
pub struct RegistrationConflict {
    pub namespace: String,
    pub name: &'static str,
    pub existing: &'static str,
    pub offered: &'static str,
}

struct Registered {
    fingerprint: &'static str,
    body: QueryFn,
}

/// The function namespace of the query evaluator.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Registered>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(namespace: Namespace, name: &str) -> String {
        match namespace {
            Namespace::Global => format!("::{}", name),
            Namespace::Language(id) => format!("{}::{}", id, name),
        }
    }

    /// Register a function, idempotently.
    pub fn register(&mut self, def: FunctionDef) -> Result<(), RegistrationConflict> {
        let key = Self::key(def.namespace, def.name);
        if let Some(existing) = self.functions.get(&key) {
            if existing.fingerprint == def.fingerprint {
                return Ok(());
            }
            return Err(RegistrationConflict {
                namespace: def.namespace.to_string(),
                name: def.name,
                existing: existing.fingerprint,
                offered: def.fingerprint,
            });
        }
        self.functions.insert(
            key,
            Registered {
                fingerprint: def.fingerprint,
                body: def.body,
            },
        );
        Ok(())
    }

    /// Look up a function: the language namespace shadows the global one.
    pub fn resolve(&self, language: Option<&str>, name: &str) -> Option<QueryFn> {
        if let Some(lang) = language {
            let key = format!("{}::{}", lang, name);
            if let Some(found) = self.functions.get(&key) {
                return Some(Arc::clone(&found.body));
            }
        }
        self.functions
            .get(&format!("::{}", name))
            .map(|f| Arc::clone(&f.body))
    }

    /// Resolve and invoke in one step.
    pub fn call(
        &self,
        ctx: &EvalContext<'_>,
        language: Option<&str>,
        name: &str,
        node: NodeId,
        args: &[QueryValue],
    ) -> Result<QueryValue, QueryError> {
        let f = self
            .resolve(language, name)
            .ok_or_else(|| QueryError::UnknownFunction {
                name: name.to_string(),
            })?;
        f(ctx, node, args)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
