//! The analysis engine: handler selection, the per-file pipeline, and the
//! parallel multi-file driver.
//!
//! Per file the sequence is strict and single-threaded: parse → version
//! gate → facades in dependency order → rules → violation construction.
//! Across files analysis is embarrassingly parallel; handlers are immutable
//! and shared, every file gets its own tree and annotations. Cancellation
//! is cooperative and checked between stages, never mid-facade: a facade
//! that has begun must finish, and a cancelled file's tree is discarded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::lang::{Handler, HandlerCache, LanguageModule, ParseError, SourceParser};
use crate::query::{FunctionRegistry, RegistrationConflict};
use crate::rules::flow::DataFlowRule;
use crate::rules::suppress::parse_suppressions;
use crate::rules::{Rule, RuleContext, RuleSet, SuppressedViolation, Violation, ViolationCollector};
use crate::version::{LanguageVersion, ReportingStrategy, VersionDiagnostic, VersionError};

/// Cooperative cancellation shared between the embedder and the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-run knobs.
#[derive(Default)]
pub struct AnalysisOptions {
    /// Language version override; the module's default applies otherwise.
    pub version: Option<LanguageVersion>,
    /// External declaration lookup; absent means externals stay unresolved.
    pub lookup: Option<Arc<dyn crate::lookup::Lookup>>,
    pub cancel: CancelFlag,
    /// Run the deprecated multifile pass.
    pub multifile: bool,
}

/// How one file's analysis ended.
#[derive(Debug)]
pub enum FileStatus {
    Completed,
    ParseFailed(ParseError),
    VersionFailed(VersionError),
    Cancelled,
    /// Unknown language or unreadable input; nothing was analyzed.
    Skipped { reason: String },
    /// Internal sequencing defect; the file's results are degraded to
    /// empty rather than aborting the run.
    Failed { message: String },
}

impl FileStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, FileStatus::Completed)
    }
}

/// Everything reported for one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub file: String,
    pub language: Option<&'static str>,
    pub status: FileStatus,
    pub violations: Vec<Violation>,
    pub suppressed: Vec<SuppressedViolation>,
    /// Collect-mode version diagnostics (empty in fail-fast mode).
    pub version_diagnostics: Vec<VersionDiagnostic>,
}

impl FileOutcome {
    fn bare(file: &str, language: Option<&'static str>, status: FileStatus) -> Self {
        Self {
            file: file.to_string(),
            language,
            status,
            violations: Vec::new(),
            suppressed: Vec::new(),
            version_diagnostics: Vec::new(),
        }
    }
}

/// Outcome of a multi-file run, ordered by file path.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    pub fn total_violations(&self) -> usize {
        self.outcomes.iter().map(|o| o.violations.len()).sum()
    }

    pub fn completed_files(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_completed())
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.outcomes.iter().any(|o| {
            o.violations
                .iter()
                .any(|v| v.severity == crate::rules::Severity::Error)
        })
    }
}

/// The language-agnostic engine core.
///
/// Construction registers every module's query functions eagerly; a
/// conflict aborts initialization before any file is analyzed.
pub struct Engine {
    modules: Vec<Arc<dyn LanguageModule>>,
    functions: Arc<FunctionRegistry>,
    handlers: HandlerCache,
    strategy: ReportingStrategy,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("modules", &self.modules.len())
            .field("functions", &self.functions.len())
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(modules: Vec<Arc<dyn LanguageModule>>) -> Result<Self, RegistrationConflict> {
        Self::with_strategy(modules, ReportingStrategy::FailFast)
    }

    pub fn with_strategy(
        modules: Vec<Arc<dyn LanguageModule>>,
        strategy: ReportingStrategy,
    ) -> Result<Self, RegistrationConflict> {
        let mut registry = FunctionRegistry::new();
        for module in &modules {
            module.register_functions(&mut registry)?;
        }
        debug!(
            languages = modules.len(),
            functions = registry.len(),
            "engine initialized"
        );
        Ok(Self {
            modules,
            functions: Arc::new(registry),
            handlers: HandlerCache::new(),
            strategy,
        })
    }

    pub fn strategy(&self) -> ReportingStrategy {
        self.strategy
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn module_for_language(&self, id: &str) -> Option<&Arc<dyn LanguageModule>> {
        self.modules.iter().find(|m| m.id() == id)
    }

    pub fn module_for_extension(&self, ext: &str) -> Option<&Arc<dyn LanguageModule>> {
        self.modules
            .iter()
            .find(|m| m.file_extensions().contains(&ext))
    }

    /// The cached handler for a (language, version) pair.
    pub fn handler(
        &self,
        language: &str,
        version: Option<LanguageVersion>,
    ) -> Option<Arc<Handler>> {
        let module = self.module_for_language(language)?;
        let version = version.unwrap_or_else(|| module.default_version());
        Some(self.handlers.get_or_build(module, version, self.strategy))
    }

    /// Analyze in-memory source under a named language.
    pub fn analyze_source(
        &self,
        file: &str,
        source: &str,
        language: &str,
        rule_sets: &[RuleSet],
        options: &AnalysisOptions,
    ) -> FileOutcome {
        let Some(handler) = self.handler(language, options.version) else {
            return FileOutcome::bare(
                file,
                None,
                FileStatus::Skipped {
                    reason: format!("no language module for `{}`", language),
                },
            );
        };
        self.run_file(&handler, file, source, rule_sets, options)
    }

    /// Analyze one file from disk, selecting the language by extension.
    pub fn analyze_file(
        &self,
        path: &Path,
        rule_sets: &[RuleSet],
        options: &AnalysisOptions,
    ) -> FileOutcome {
        let file = path.to_string_lossy().to_string();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let Some(module) = self.module_for_extension(ext) else {
            return FileOutcome::bare(
                &file,
                None,
                FileStatus::Skipped {
                    reason: format!("no language module for extension `{}`", ext),
                },
            );
        };
        let language = module.id();
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                warn!(file = %file, error = %e, "unreadable file skipped");
                return FileOutcome::bare(
                    &file,
                    Some(language),
                    FileStatus::Skipped {
                        reason: format!("unreadable: {}", e),
                    },
                );
            }
        };
        self.analyze_source(&file, &source, language, rule_sets, options)
    }

    /// Analyze many files in parallel. One file's failure never aborts the
    /// run; outcomes come back sorted by path.
    pub fn analyze_files(
        &self,
        paths: &[PathBuf],
        rule_sets: &[RuleSet],
        options: &AnalysisOptions,
    ) -> RunReport {
        let mut outcomes: Vec<FileOutcome> = paths
            .par_iter()
            .map(|p| self.analyze_file(p, rule_sets, options))
            .collect();
        outcomes.sort_by(|a, b| a.file.cmp(&b.file));
        RunReport { outcomes }
    }

    fn run_file(
        &self,
        handler: &Handler,
        file: &str,
        source: &str,
        rule_sets: &[RuleSet],
        options: &AnalysisOptions,
    ) -> FileOutcome {
        let language = handler.language();
        let cancel = &options.cancel;
        if cancel.is_cancelled() {
            return FileOutcome::bare(file, Some(language), FileStatus::Cancelled);
        }

        let mut tree = match handler.parser().parse(file, source) {
            Ok(tree) => tree,
            Err(e) => {
                debug!(file = %file, error = %e, "parse failed");
                return FileOutcome::bare(file, Some(language), FileStatus::ParseFailed(e));
            }
        };

        let version_diagnostics = match handler.version_gate().check(&tree) {
            Ok(diagnostics) => diagnostics,
            Err(e) => {
                debug!(file = %file, error = %e, "version check failed");
                return FileOutcome::bare(file, Some(language), FileStatus::VersionFailed(e));
            }
        };

        // Facades in dependency order, cancellation between each. A failure
        // here is a sequencing bug; degrade the file to empty results.
        let lookup = options.lookup.as_deref();
        let failed = |e: crate::passes::PassError| {
            warn!(file = %file, error = %e, "facade sequencing error");
            FileOutcome::bare(
                file,
                Some(language),
                FileStatus::Failed {
                    message: e.to_string(),
                },
            )
        };
        if let Err(e) = handler.run_symbol_pass(&mut tree, lookup) {
            return failed(e);
        }
        if cancel.is_cancelled() {
            return FileOutcome::bare(file, Some(language), FileStatus::Cancelled);
        }
        if let Err(e) = handler.run_qualified_name_pass(&mut tree, lookup) {
            return failed(e);
        }
        if cancel.is_cancelled() {
            return FileOutcome::bare(file, Some(language), FileStatus::Cancelled);
        }
        if let Err(e) = handler.run_type_pass(&mut tree, lookup) {
            return failed(e);
        }
        if cancel.is_cancelled() {
            return FileOutcome::bare(file, Some(language), FileStatus::Cancelled);
        }
        if let Err(e) = handler.run_dataflow_pass(&mut tree) {
            return failed(e);
        }
        if options.multifile {
            #[allow(deprecated)]
            if let Err(e) = handler.run_multifile_pass(&mut tree) {
                warn!(file = %file, error = %e, "multifile sequencing error");
            }
        }

        if cancel.is_cancelled() {
            return FileOutcome::bare(file, Some(language), FileStatus::Cancelled);
        }

        // Rule evaluation over the decorated tree.
        let suppressions = parse_suppressions(source);
        let ctx = RuleContext {
            tree: &tree,
            source,
            file,
            language,
            functions: self.functions.as_ref(),
            metrics: handler.metrics().as_ref(),
            lookup,
            factory: handler.violation_factory(),
            suppressions: &suppressions,
        };
        let mut collector = ViolationCollector::new();
        for set in rule_sets {
            for rule in &set.rules {
                if cancel.is_cancelled() {
                    return FileOutcome::bare(file, Some(language), FileStatus::Cancelled);
                }
                rule.check(&ctx, &mut collector);
            }
        }

        if let Some(flow_rule) = handler.flow_rule() {
            for (op, graph) in tree.annotations().flow_graphs() {
                if cancel.is_cancelled() {
                    return FileOutcome::bare(file, Some(language), FileStatus::Cancelled);
                }
                flow_rule.apply(&ctx, op, graph, &mut collector);
            }
        }

        FileOutcome {
            file: file.to_string(),
            language: Some(language),
            status: FileStatus::Completed,
            violations: collector.active,
            suppressed: collector.suppressed,
            version_diagnostics,
        }
    }
}
