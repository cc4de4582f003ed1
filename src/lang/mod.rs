//! Per-language plugin contract and the handler composition root.
//!
//! A [`LanguageModule`] is everything a language contributes: parser
//! factory, version feature table, metrics catalog, query-function
//! registrations, and violation construction. The engine core never sees
//! language internals; it holds an immutable [`Handler`] bundle per
//! (language, version, preview) triple, cached process-wide in a
//! [`HandlerCache`].
//!
//! # Adding a New Language
//!
//! See `src/lang/java` for the full reference plugin and `src/lang/go` for
//! a minimal one. Implement [`LanguageModule`], normalize your grammar onto
//! [`crate::tree::NodeKind`], and hand the module to
//! [`crate::pipeline::Engine::new`].

#[cfg(feature = "tree-sitter")]
pub mod go;
#[cfg(feature = "tree-sitter")]
pub mod java;
#[cfg(feature = "tree-sitter")]
pub(crate) mod treesitter;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::lookup::Lookup;
use crate::metrics::MetricsProvider;
use crate::passes::dataflow::DataFlowPass;
use crate::passes::multifile::MultifilePass;
use crate::passes::qualified::QualifiedNamePass;
use crate::passes::symbols::SymbolPass;
use crate::passes::types::TypePass;
use crate::passes::PassError;
use crate::query::{FunctionRegistry, RegistrationConflict};
use crate::rules::flow::{DataFlowRule, DefaultFlowRules};
use crate::rules::ViolationFactory;
use crate::tree::SyntaxTree;
use crate::version::{
    FeatureClassifier, FeatureTable, LanguageVersion, ReportingStrategy, VersionGate,
};

/// Malformed source; fatal to analyzing the file, other files unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}:{line}:{column}: {message}")]
pub struct ParseError {
    pub file: String,
    /// 1-indexed, file-relative.
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// The parser boundary: source text in, normalized tree out.
///
/// Parsers are created per parse (concrete parser states are rarely
/// `Sync`); the factory lives on the module.
pub trait SourceParser {
    fn parse(&mut self, file: &str, source: &str) -> Result<SyntaxTree, ParseError>;
}

/// Everything one language plugs into the engine.
pub trait LanguageModule: Send + Sync {
    /// Stable identifier, e.g. `"java"`.
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str {
        self.id()
    }

    /// File extensions (without dot) this language claims.
    fn file_extensions(&self) -> &'static [&'static str];

    /// Version assumed when the embedder does not specify one.
    fn default_version(&self) -> LanguageVersion;

    /// Version-gated constructs of this language.
    fn features(&self) -> FeatureTable;

    /// Maps normalized nodes to gated features.
    fn feature_classifier(&self) -> FeatureClassifier;

    /// A fresh parser.
    fn parser(&self) -> Box<dyn SourceParser>;

    fn metrics(&self) -> Arc<dyn MetricsProvider>;

    /// Register this language's query functions. Must be idempotent: called
    /// once per engine construction, with fixed fingerprints.
    fn register_functions(
        &self,
        registry: &mut FunctionRegistry,
    ) -> Result<(), RegistrationConflict>;

    fn violation_factory(&self) -> Arc<dyn ViolationFactory>;

    /// The whole-graph rule descriptor consuming data-flow graphs.
    fn flow_rule(&self) -> Option<Arc<dyn DataFlowRule>> {
        Some(Arc::new(DefaultFlowRules))
    }
}

/// Cache key: one handler per distinct configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub language: &'static str,
    pub ordinal: u32,
    pub preview: bool,
}

impl HandlerKey {
    pub fn new(language: &'static str, version: LanguageVersion) -> Self {
        Self {
            language,
            ordinal: version.ordinal,
            preview: version.preview,
        }
    }
}

/// Immutable bundle of one language's capabilities at one version.
///
/// Stateless after construction and safely shared read-only across
/// concurrently analyzed files.
pub struct Handler {
    module: Arc<dyn LanguageModule>,
    version: LanguageVersion,
    gate: VersionGate,
    metrics: Arc<dyn MetricsProvider>,
    violations: Arc<dyn ViolationFactory>,
    flow_rule: Option<Arc<dyn DataFlowRule>>,
}

impl Handler {
    pub(crate) fn new(
        module: Arc<dyn LanguageModule>,
        version: LanguageVersion,
        strategy: ReportingStrategy,
    ) -> Self {
        let gate = VersionGate::new(
            module.features(),
            module.feature_classifier(),
            version,
            strategy,
        );
        let metrics = module.metrics();
        let violations = module.violation_factory();
        let flow_rule = module.flow_rule();
        Self {
            module,
            version,
            gate,
            metrics,
            violations,
            flow_rule,
        }
    }

    pub fn language(&self) -> &'static str {
        self.module.id()
    }

    pub fn version(&self) -> LanguageVersion {
        self.version
    }

    pub fn module(&self) -> &Arc<dyn LanguageModule> {
        &self.module
    }

    /// A parser bound to this handler's language.
    pub fn parser(&self) -> Box<dyn SourceParser> {
        self.module.parser()
    }

    pub fn version_gate(&self) -> &VersionGate {
        &self.gate
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsProvider> {
        &self.metrics
    }

    pub fn violation_factory(&self) -> &dyn ViolationFactory {
        self.violations.as_ref()
    }

    pub fn flow_rule(&self) -> Option<&Arc<dyn DataFlowRule>> {
        self.flow_rule.as_ref()
    }

    // Facade entry points, in required order. Each starts the pass on a
    // root tree; rerunning any of them on the same tree is an error.

    pub fn run_symbol_pass(
        &self,
        tree: &mut SyntaxTree,
        lookup: Option<&dyn Lookup>,
    ) -> Result<(), PassError> {
        SymbolPass::run(tree, lookup)
    }

    pub fn run_qualified_name_pass(
        &self,
        tree: &mut SyntaxTree,
        lookup: Option<&dyn Lookup>,
    ) -> Result<(), PassError> {
        QualifiedNamePass::run(tree, lookup)
    }

    pub fn run_type_pass(
        &self,
        tree: &mut SyntaxTree,
        lookup: Option<&dyn Lookup>,
    ) -> Result<(), PassError> {
        TypePass::run(tree, lookup)
    }

    pub fn run_dataflow_pass(&self, tree: &mut SyntaxTree) -> Result<(), PassError> {
        DataFlowPass::run(tree)
    }

    /// Project-level usage summaries.
    #[deprecated(note = "the multifile stage has no dependents; enable via AnalysisOptions only")]
    pub fn run_multifile_pass(&self, tree: &mut SyntaxTree) -> Result<(), PassError> {
        MultifilePass::run(tree)
    }
}

/// Process-wide handler cache with race-tolerant lookup-or-construct.
///
/// Handlers are immutable, so concurrent construction of the same key is
/// benign; the first insert wins and later constructions are dropped.
#[derive(Default)]
pub struct HandlerCache {
    inner: RwLock<HashMap<HandlerKey, Arc<Handler>>>,
}

impl HandlerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &self,
        module: &Arc<dyn LanguageModule>,
        version: LanguageVersion,
        strategy: ReportingStrategy,
    ) -> Arc<Handler> {
        let key = HandlerKey::new(module.id(), version);
        {
            let cache = self.inner.read().unwrap();
            if let Some(handler) = cache.get(&key) {
                return Arc::clone(handler);
            }
        }
        // Construct outside the lock; under a race the first insert wins.
        let built = Arc::new(Handler::new(Arc::clone(module), version, strategy));
        let mut cache = self.inner.write().unwrap();
        Arc::clone(cache.entry(key).or_insert(built))
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricKey, MetricResult};
    use crate::rules::DefaultViolationFactory;
    use crate::tree::{NodeId, NodeKind, Span, TreeBuilder};
    use crate::version::FeatureSpec;

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

    struct TrivialParser;

    impl SourceParser for TrivialParser {
        fn parse(&mut self, _file: &str, _source: &str) -> Result<SyntaxTree, ParseError> {
            let mut b = TreeBuilder::new();
            b.open(NodeKind::CompilationUnit, Span::default());
            b.close();
            Ok(b.finish())
        }
    }

    pub(crate) struct ToyModule;

    const TOY_FEATURES: FeatureTable =
        FeatureTable::new(&[FeatureSpec::standard("toy widgets", 2)]);

    fn toy_classifier(_: &SyntaxTree, _: NodeId) -> Option<&'static str> {
        None
    }

    impl LanguageModule for ToyModule {
        fn id(&self) -> &'static str {
            "toy"
        }
        fn file_extensions(&self) -> &'static [&'static str] {
            &["toy"]
        }
        fn default_version(&self) -> LanguageVersion {
            LanguageVersion::new(3)
        }
        fn features(&self) -> FeatureTable {
            TOY_FEATURES
        }
        fn feature_classifier(&self) -> FeatureClassifier {
            toy_classifier
        }
        fn parser(&self) -> Box<dyn SourceParser> {
            Box::new(TrivialParser)
        }
        fn metrics(&self) -> Arc<dyn MetricsProvider> {
            Arc::new(NullMetrics)
        }
        fn register_functions(
            &self,
            registry: &mut FunctionRegistry,
        ) -> Result<(), RegistrationConflict> {
            crate::query::builtins::register_shared(registry)
        }
        fn violation_factory(&self) -> Arc<dyn ViolationFactory> {
            Arc::new(DefaultViolationFactory)
        }
    }

    #[test]
    fn test_cache_returns_same_handler_for_same_key() {
        let cache = HandlerCache::new();
        let module: Arc<dyn LanguageModule> = Arc::new(ToyModule);

        let a = cache.get_or_build(&module, LanguageVersion::new(3), ReportingStrategy::FailFast);
        let b = cache.get_or_build(&module, LanguageVersion::new(3), ReportingStrategy::FailFast);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let c = cache.get_or_build(
            &module,
            LanguageVersion::with_preview(3),
            ReportingStrategy::FailFast,
        );
        assert!(!Arc::ptr_eq(&a, &c), "preview flag is part of the key");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_handler_runs_passes_in_order() {
        let module: Arc<dyn LanguageModule> = Arc::new(ToyModule);
        let handler = Handler::new(
            Arc::clone(&module),
            LanguageVersion::new(3),
            ReportingStrategy::FailFast,
        );

        let mut tree = handler.parser().parse("a.toy", "").unwrap();
        handler.run_symbol_pass(&mut tree, None).unwrap();
        handler.run_qualified_name_pass(&mut tree, None).unwrap();
        handler.run_type_pass(&mut tree, None).unwrap();
        handler.run_dataflow_pass(&mut tree).unwrap();

        // A second start of any facade is refused.
        assert!(handler.run_symbol_pass(&mut tree, None).is_err());
    }
}
