//! External declaration lookup boundary.
//!
//! References that leave the current file resolve through a [`Lookup`]
//! supplied by the embedding application (build-tool integration, classpath
//! scanner). The core never constructs one; when none is supplied, external
//! references degrade to the unresolved marker instead of erroring.
//!
//! Implementations are expected to be pre-warmed: `resolve` may be called
//! once per unresolved name during a pass and must not block on per-call I/O.

/// Metadata for a declaration that lives outside the analyzed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDecl {
    /// Fully-qualified name of the declaration.
    pub qualified_name: String,
    /// Qualified names of supertypes, nearest first. Used by the `type-is`
    /// query predicate; may be empty when the embedder cannot supply it.
    pub supertypes: Vec<String>,
}

impl ExternalDecl {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            supertypes: Vec::new(),
        }
    }

    pub fn with_supertypes(mut self, supertypes: Vec<String>) -> Self {
        self.supertypes = supertypes;
        self
    }
}

/// Resolve an external qualified name to declaration metadata.
pub trait Lookup: Send + Sync {
    /// `None` means not found; passes record the unresolved marker and
    /// continue.
    fn resolve(&self, qualified_name: &str) -> Option<ExternalDecl>;
}

/// A lookup over a fixed table, useful for embedders with a precomputed
/// index and for tests.
#[derive(Debug, Default)]
pub struct MapLookup {
    entries: std::collections::HashMap<String, ExternalDecl>,
}

impl MapLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, decl: ExternalDecl) {
        self.entries.insert(decl.qualified_name.clone(), decl);
    }
}

impl Lookup for MapLookup {
    fn resolve(&self, qualified_name: &str) -> Option<ExternalDecl> {
        self.entries.get(qualified_name).cloned()
    }
}
