//! Language version gating.
//!
//! Every language module publishes a [`FeatureTable`]: for each version-gated
//! construct, the version it was standardized in and (optionally) the version
//! it became available under a preview flag. The [`VersionGate`] validates a
//! completed tree against the active [`LanguageVersion`] as a post-parse
//! pass, with the enforcement policy selected by [`ReportingStrategy`] at
//! handler-construction time.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::tree::{NodeId, Span, SyntaxTree};

/// An ordered language revision plus the preview/unstable flag.
///
/// Ordinals are module-defined (Java uses the JDK release number, Go packs
/// `major * 100 + minor`); the gate only relies on their total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LanguageVersion {
    pub ordinal: u32,
    pub preview: bool,
}

impl LanguageVersion {
    pub fn new(ordinal: u32) -> Self {
        Self {
            ordinal,
            preview: false,
        }
    }

    pub fn with_preview(ordinal: u32) -> Self {
        Self {
            ordinal,
            preview: true,
        }
    }
}

impl fmt::Display for LanguageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.preview {
            write!(f, "{}-preview", self.ordinal)
        } else {
            write!(f, "{}", self.ordinal)
        }
    }
}

/// Version requirements for one gated construct.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    /// Feature name as used in diagnostics, e.g. `"records"`.
    pub name: &'static str,
    /// Version the construct was standardized in. `None` means the construct
    /// is still preview-only at every version.
    pub since: Option<u32>,
    /// Version the construct became available behind the preview flag.
    pub preview_since: Option<u32>,
}

impl FeatureSpec {
    /// A construct available unconditionally from `since`.
    pub const fn standard(name: &'static str, since: u32) -> Self {
        Self {
            name,
            since: Some(since),
            preview_since: None,
        }
    }

    /// A construct previewed at `preview_since` and standardized at `since`.
    pub const fn previewed(name: &'static str, preview_since: u32, since: u32) -> Self {
        Self {
            name,
            since: Some(since),
            preview_since: Some(preview_since),
        }
    }

    /// A construct only ever available behind the preview flag.
    pub const fn preview_only(name: &'static str, preview_since: u32) -> Self {
        Self {
            name,
            since: None,
            preview_since: Some(preview_since),
        }
    }

    fn allows(&self, version: LanguageVersion) -> bool {
        if let Some(since) = self.since {
            if version.ordinal >= since {
                return true;
            }
        }
        if version.preview {
            if let Some(preview_since) = self.preview_since {
                return version.ordinal >= preview_since;
            }
        }
        false
    }
}

/// The gated constructs of one language.
#[derive(Debug, Clone, Copy)]
pub struct FeatureTable {
    features: &'static [FeatureSpec],
}

impl FeatureTable {
    pub const fn new(features: &'static [FeatureSpec]) -> Self {
        Self { features }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn features(&self) -> &'static [FeatureSpec] {
        self.features
    }
}

/// Maps a tree node to the gated feature it uses, if any.
///
/// Supplied by the language module; the gate itself stays language-agnostic.
pub type FeatureClassifier = fn(&SyntaxTree, NodeId) -> Option<&'static str>;

/// What the gate does when it finds a rejected construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportingStrategy {
    /// Abort the file on the first rejected construct.
    #[default]
    FailFast,
    /// Record a diagnostic per rejected construct and keep going, allowing
    /// partial trees.
    Collect,
}

/// One rejected construct. Exactly one diagnostic is produced per rejection;
/// rejection is never silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDiagnostic {
    /// The gated feature, e.g. `"records"`.
    pub feature: String,
    /// Version the feature was standardized in, if ever.
    pub required: Option<u32>,
    /// Version the feature became available behind the preview flag.
    pub preview_since: Option<u32>,
    /// The active version the check ran under.
    pub active: LanguageVersion,
    /// Location of the offending construct.
    pub span: Span,
}

impl fmt::Display for VersionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.required, self.preview_since) {
            (Some(required), _) if self.active.ordinal < required => write!(
                f,
                "{} at {} requires language version {}, active version is {}",
                self.feature, self.span, required, self.active
            ),
            (_, Some(preview_since)) => write!(
                f,
                "{} at {} is a preview feature (since version {}) and the preview flag is not set",
                self.feature, self.span, preview_since
            ),
            _ => write!(
                f,
                "{} at {} is not available at language version {}",
                self.feature, self.span, self.active
            ),
        }
    }
}

/// Fatal outcome of a fail-fast check.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct VersionError(pub VersionDiagnostic);

/// Post-parse validation of a tree against the active language version.
pub struct VersionGate {
    table: FeatureTable,
    classifier: FeatureClassifier,
    version: LanguageVersion,
    strategy: ReportingStrategy,
}

impl VersionGate {
    pub fn new(
        table: FeatureTable,
        classifier: FeatureClassifier,
        version: LanguageVersion,
        strategy: ReportingStrategy,
    ) -> Self {
        Self {
            table,
            classifier,
            version,
            strategy,
        }
    }

    pub fn version(&self) -> LanguageVersion {
        self.version
    }

    pub fn strategy(&self) -> ReportingStrategy {
        self.strategy
    }

    /// Walk the completed tree and check every construct.
    ///
    /// Fail-fast: `Err` with the first rejection. Collect: `Ok` with one
    /// diagnostic per rejection (empty on a clean tree).
    pub fn check(&self, tree: &SyntaxTree) -> Result<Vec<VersionDiagnostic>, VersionError> {
        let mut diagnostics = Vec::new();
        for node in tree.preorder() {
            let Some(feature_name) = (self.classifier)(tree, node) else {
                continue;
            };
            let Some(spec) = self.table.get(feature_name) else {
                // A classifier naming a feature the table does not list is a
                // plugin defect; admit the construct rather than inventing a
                // requirement for it.
                tracing::warn!(feature = feature_name, "feature missing from version table");
                continue;
            };
            if spec.allows(self.version) {
                continue;
            }
            let diagnostic = VersionDiagnostic {
                feature: spec.name.to_string(),
                required: spec.since,
                preview_since: spec.preview_since,
                active: self.version,
                span: tree.span(node),
            };
            match self.strategy {
                ReportingStrategy::FailFast => return Err(VersionError(diagnostic)),
                ReportingStrategy::Collect => diagnostics.push(diagnostic),
            }
        }
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, TreeBuilder};

    const TABLE: FeatureTable = FeatureTable::new(&[
        FeatureSpec::standard("gadgets", 9),
        FeatureSpec::previewed("widgets", 12, 14),
        FeatureSpec::preview_only("contraptions", 5),
    ]);

    fn classify(tree: &SyntaxTree, node: NodeId) -> Option<&'static str> {
        match tree.kind(node) {
            NodeKind::Other(raw) => match raw {
                "gadget" => Some("gadgets"),
                "widget" => Some("widgets"),
                "contraption" => Some("contraptions"),
                _ => None,
            },
            _ => None,
        }
    }

    fn tree_with(kinds: &[&'static str]) -> SyntaxTree {
        let mut b = TreeBuilder::new();
        b.open(NodeKind::CompilationUnit, Span::default());
        for (i, raw) in kinds.iter().enumerate() {
            b.leaf(NodeKind::Other(raw), Span::point(i + 1, 1));
        }
        b.close();
        b.finish()
    }

    fn gate(version: LanguageVersion, strategy: ReportingStrategy) -> VersionGate {
        VersionGate::new(TABLE, classify, version, strategy)
    }

    #[test]
    fn test_standard_feature_version_ordering() {
        let tree = tree_with(&["gadget"]);

        // Accepted at and above the introducing version, with or without
        // preview.
        for ordinal in [9, 10, 21] {
            for preview in [false, true] {
                let v = LanguageVersion { ordinal, preview };
                let diags = gate(v, ReportingStrategy::Collect).check(&tree).unwrap();
                assert!(diags.is_empty(), "version {} should accept", v);
            }
        }

        // Rejected below it, independent of the preview flag.
        for preview in [false, true] {
            let v = LanguageVersion {
                ordinal: 7,
                preview,
            };
            let diags = gate(v, ReportingStrategy::Collect).check(&tree).unwrap();
            assert_eq!(diags.len(), 1);
            assert_eq!(diags[0].required, Some(9));
        }
    }

    #[test]
    fn test_fail_fast_reports_first_rejection() {
        let tree = tree_with(&["gadget", "gadget"]);
        let err = gate(LanguageVersion::new(7), ReportingStrategy::FailFast)
            .check(&tree)
            .unwrap_err();
        assert_eq!(err.0.feature, "gadgets");
        assert_eq!(err.0.required, Some(9));
        assert_eq!(err.0.active.ordinal, 7);
    }

    #[test]
    fn test_previewed_feature() {
        let tree = tree_with(&["widget"]);

        // Standardized at 14: fine without preview from there on.
        let diags = gate(LanguageVersion::new(14), ReportingStrategy::Collect)
            .check(&tree)
            .unwrap();
        assert!(diags.is_empty());

        // At 12 it needs the preview flag.
        let diags = gate(LanguageVersion::new(12), ReportingStrategy::Collect)
            .check(&tree)
            .unwrap();
        assert_eq!(diags.len(), 1);
        let diags = gate(LanguageVersion::with_preview(12), ReportingStrategy::Collect)
            .check(&tree)
            .unwrap();
        assert!(diags.is_empty());

        // Below the preview introduction even the flag does not help.
        let diags = gate(LanguageVersion::with_preview(11), ReportingStrategy::Collect)
            .check(&tree)
            .unwrap();
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_preview_only_feature_rejected_without_flag() {
        let tree = tree_with(&["contraption"]);
        for ordinal in [5, 9, 30] {
            let diags = gate(LanguageVersion::new(ordinal), ReportingStrategy::Collect)
                .check(&tree)
                .unwrap();
            assert_eq!(diags.len(), 1, "rejected at any version without preview");
            assert_eq!(diags[0].required, None);
        }
        let diags = gate(LanguageVersion::with_preview(5), ReportingStrategy::Collect)
            .check(&tree)
            .unwrap();
        assert!(diags.is_empty());
    }

    #[test]
    fn test_collect_mode_clean_tree_is_empty() {
        let tree = tree_with(&["other", "other"]);
        let diags = gate(LanguageVersion::new(1), ReportingStrategy::Collect)
            .check(&tree)
            .unwrap();
        assert!(diags.is_empty());
    }

    #[test]
    fn test_sibling_order_does_not_change_flagged_set() {
        let forward = tree_with(&["gadget", "widget", "other"]);
        let reversed = tree_with(&["other", "widget", "gadget"]);
        let gate = gate(LanguageVersion::new(7), ReportingStrategy::Collect);

        let mut a: Vec<String> = gate
            .check(&forward)
            .unwrap()
            .into_iter()
            .map(|d| d.feature)
            .collect();
        let mut b: Vec<String> = gate
            .check(&reversed)
            .unwrap()
            .into_iter()
            .map(|d| d.feature)
            .collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }
}
