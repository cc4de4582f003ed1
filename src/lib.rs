//! Crosslint - semantic-analysis core for a multi-language static analyzer.
//!
//! Crosslint runs a configurable chain of analysis passes over parsed
//! source files and exposes the enriched tree to a rule engine. One engine
//! supports many target languages: each contributes a parser, a
//! grammar-version gate, semantic passes wiring, a metrics catalog,
//! query-language extension functions, and violation construction, all
//! behind a single plugin contract.
//!
//! # Architecture
//!
//! - `tree`: arena AST with typed annotation side-tables
//! - `version`: language version gating (fail-fast or collect)
//! - `passes`: symbol, qualified-name, type, and data-flow facades
//! - `metrics`: metric keys and the per-language provider contract
//! - `query`: extension-function registry for the tree-query evaluator
//! - `rules`: rule contract, violations, suppression
//! - `lang`: the `LanguageModule` plugin contract, handler cache, and the
//!   Java/Go reference plugins
//! - `pipeline`: the engine driving parse → gate → facades → rules
//! - `prefs`: enabled-rule-set preference collaborator
//!
//! # Adding a New Language
//!
//! Implement [`lang::LanguageModule`] (see `src/lang/java` for the full
//! reference), normalize your grammar onto [`tree::NodeKind`], and hand the
//! module to [`pipeline::Engine::new`].

pub mod lang;
pub mod lookup;
pub mod metrics;
pub mod passes;
pub mod pipeline;
pub mod prefs;
pub mod query;
pub mod rules;
pub mod tree;
pub mod version;

pub use lang::{Handler, HandlerCache, HandlerKey, LanguageModule, ParseError, SourceParser};
pub use lookup::{ExternalDecl, Lookup};
pub use metrics::{MetricKey, MetricResult, MetricScope, MetricsProvider};
pub use pipeline::{
    AnalysisOptions, CancelFlag, Engine, FileOutcome, FileStatus, RunReport,
};
pub use query::{
    FunctionDef, FunctionRegistry, Namespace, QueryError, QueryValue, RegistrationConflict,
};
pub use rules::{
    Rule, RuleContext, RuleSet, Severity, SuppressedViolation, Violation, ViolationCollector,
    ViolationFactory,
};
pub use tree::{NodeId, NodeKind, Span, SyntaxTree, TreeBuilder};
pub use version::{
    FeatureSpec, FeatureTable, LanguageVersion, ReportingStrategy, VersionDiagnostic, VersionError,
};

#[cfg(feature = "tree-sitter")]
pub use lang::{go::GoLanguage, java::JavaLanguage};
