//! Symbol resolution: lexical scopes and reference binding.
//!
//! Builds the scope tree for a file and binds every identifier reference to
//! its declaring node, an external declaration, or the explicit
//! [`Binding::Unresolved`] marker. Members of a type (fields, operations,
//! nested types) are pre-declared when the type's scope opens, so forward
//! references within a type resolve; block-local names become visible only
//! at their declaration statement.

use std::collections::{HashMap, HashSet};

use crate::lookup::Lookup;
use crate::passes::{ensure_fresh, PassError};
use crate::tree::{NodeId, NodeKind, Pass, SyntaxTree};

/// Index of a scope within the file's [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// Index of a declared symbol within the file's [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Type,
    Operation,
    Field,
    Parameter,
    Local,
}

impl SymbolKind {
    fn from_node(kind: NodeKind) -> Option<SymbolKind> {
        match kind {
            NodeKind::TypeDecl(_) | NodeKind::TypeParameter => Some(SymbolKind::Type),
            NodeKind::Operation(_) => Some(SymbolKind::Operation),
            NodeKind::FieldDecl => Some(SymbolKind::Field),
            NodeKind::Parameter => Some(SymbolKind::Parameter),
            NodeKind::LocalVarDecl => Some(SymbolKind::Local),
            _ => None,
        }
    }
}

/// A declared symbol.
#[derive(Debug, Clone)]
pub struct SymbolData {
    pub name: String,
    pub kind: SymbolKind,
    /// The declaring node.
    pub decl: NodeId,
    /// The scope the symbol is declared in.
    pub scope: ScopeId,
}

/// What an identifier reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Declared in this file.
    Local(SymbolId),
    /// Resolved through the external lookup context; carries the qualified
    /// name the lookup answered for.
    External(String),
    /// Could not be resolved. Recorded explicitly so downstream passes can
    /// tell "checked and unknown" from "never checked".
    Unresolved,
}

#[derive(Debug, Clone)]
struct ScopeData {
    parent: Option<ScopeId>,
    owner: NodeId,
    names: HashMap<String, SymbolId>,
}

/// Scopes, symbols, and reference bindings for one tree.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    scopes: Vec<ScopeData>,
    symbols: Vec<SymbolData>,
    scope_of_node: HashMap<NodeId, ScopeId>,
    bindings: HashMap<NodeId, Binding>,
}

impl SymbolTable {
    fn new_scope(&mut self, parent: Option<ScopeId>, owner: NodeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent,
            owner,
            names: HashMap::new(),
        });
        self.scope_of_node.insert(owner, id);
        id
    }

    fn define(&mut self, scope: ScopeId, name: &str, kind: SymbolKind, decl: NodeId) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolData {
            name: name.to_string(),
            kind,
            decl,
            scope,
        });
        self.scopes[scope.0 as usize].names.insert(name.to_string(), id);
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &SymbolData {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// The scope a node opens, if it opens one.
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.scope_of_node.get(&node).copied()
    }

    /// The scope owner node.
    pub fn scope_owner(&self, scope: ScopeId) -> NodeId {
        self.scopes[scope.0 as usize].owner
    }

    /// Binding recorded for a reference node.
    pub fn binding(&self, node: NodeId) -> Option<&Binding> {
        self.bindings.get(&node)
    }

    /// The symbol a declaration node introduced, if any.
    pub fn symbol_for_decl(&self, decl: NodeId) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|s| s.decl == decl)
            .map(|i| SymbolId(i as u32))
    }

    /// Resolve a simple name by walking the scope chain outward.
    pub fn resolve_from(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            let data = &self.scopes[s.0 as usize];
            if let Some(&sym) = data.names.get(name) {
                return Some(sym);
            }
            current = data.parent;
        }
        None
    }

    /// All symbols declared directly in a scope, in declaration order.
    pub fn symbols_in(&self, scope: ScopeId) -> impl Iterator<Item = &SymbolData> {
        self.symbols.iter().filter(move |s| s.scope == scope)
    }

    /// The innermost scope enclosing a node (the scope the node itself opens,
    /// or the nearest ancestor's).
    pub fn enclosing_scope(&self, tree: &SyntaxTree, node: NodeId) -> Option<ScopeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(scope) = self.scope_of(n) {
                return Some(scope);
            }
            current = tree.parent(n);
        }
        None
    }
}

/// The symbol resolution facade.
pub struct SymbolPass;

impl SymbolPass {
    /// Decorate `tree` with its symbol table.
    ///
    /// `lookup` is optional: without it, references to declarations outside
    /// this file bind to [`Binding::Unresolved`] rather than erroring.
    pub fn run(tree: &mut SyntaxTree, lookup: Option<&dyn Lookup>) -> Result<(), PassError> {
        ensure_fresh(tree, Pass::Symbols)?;

        let mut resolver = Resolver {
            tree,
            lookup,
            table: SymbolTable::default(),
            imports: HashMap::new(),
            predefined: HashSet::new(),
            unresolved: 0,
        };
        let root = tree.root();
        let root_scope = resolver.table.new_scope(None, root);
        resolver.collect_imports(root);
        resolver.predeclare_members(root, root_scope);
        for &child in tree.children(root) {
            resolver.walk(child, root_scope);
        }
        if resolver.unresolved > 0 {
            tracing::debug!(
                unresolved = resolver.unresolved,
                "symbol resolution left references unresolved"
            );
        }

        let table = resolver.table;
        tree.annotations_mut().symbols = Some(table);
        tree.annotations_mut().mark(Pass::Symbols);
        Ok(())
    }
}

struct Resolver<'a> {
    tree: &'a SyntaxTree,
    lookup: Option<&'a dyn Lookup>,
    table: SymbolTable,
    /// Simple name -> qualified name, from the file's import declarations.
    imports: HashMap<String, String>,
    /// Declarations already defined by a pre-declaration sweep.
    predefined: HashSet<NodeId>,
    unresolved: usize,
}

impl<'a> Resolver<'a> {
    fn collect_imports(&mut self, root: NodeId) {
        for &child in self.tree.children(root) {
            if self.tree.kind(child) != NodeKind::ImportDecl {
                continue;
            }
            if let Some(path) = self.tree.name(child) {
                let simple = path.rsplit('.').next().unwrap_or(path);
                self.imports.insert(simple.to_string(), path.to_string());
            }
        }
    }

    /// Define the named member declarations of a scope owner before walking
    /// their bodies, so members can reference each other regardless of
    /// declaration order.
    fn predeclare_members(&mut self, owner: NodeId, scope: ScopeId) {
        for &child in self.tree.children(owner) {
            let kind = self.tree.kind(child);
            let member = matches!(
                kind,
                NodeKind::TypeDecl(_) | NodeKind::Operation(_) | NodeKind::FieldDecl
            );
            if !member {
                continue;
            }
            if let (Some(name), Some(sym_kind)) = (self.tree.name(child), SymbolKind::from_node(kind)) {
                self.table.define(scope, name, sym_kind, child);
                self.predefined.insert(child);
            }
        }
    }

    fn walk(&mut self, node: NodeId, scope: ScopeId) {
        let kind = self.tree.kind(node);
        if matches!(kind, NodeKind::Comment | NodeKind::Annotation) {
            return;
        }

        // Declarations introduce their name into the enclosing scope.
        if kind.is_declaration() && !self.predefined.contains(&node) {
            if let (Some(name), Some(sym_kind)) = (self.tree.name(node), SymbolKind::from_node(kind))
            {
                self.table.define(scope, name, sym_kind, node);
            }
        }

        // Scope-opening nodes get a fresh child scope for their subtree.
        let child_scope = if kind.opens_scope() {
            let inner = self.table.new_scope(Some(scope), node);
            if kind.is_type_decl() {
                self.predeclare_members(node, inner);
            }
            // The caught variable lives in the clause's own scope.
            if kind == NodeKind::CatchClause {
                if let Some(name) = self.tree.name(node) {
                    self.table.define(inner, name, SymbolKind::Local, node);
                }
            }
            inner
        } else {
            scope
        };

        // References: plain identifiers and named callees.
        if matches!(kind, NodeKind::Identifier | NodeKind::CallExpr) {
            if let Some(name) = self.tree.name(node) {
                self.bind(node, name, scope);
            }
        }

        for &child in self.tree.children(node) {
            self.walk(child, child_scope);
        }
    }

    fn bind(&mut self, node: NodeId, name: &str, scope: ScopeId) {
        if let Some(sym) = self.table.resolve_from(scope, name) {
            self.table.bindings.insert(node, Binding::Local(sym));
            return;
        }

        if let Some(lookup) = self.lookup {
            let mut candidates = Vec::with_capacity(2);
            if let Some(qualified) = self.imports.get(name) {
                candidates.push(qualified.clone());
            }
            candidates.push(name.to_string());
            for qualified in candidates {
                if lookup.resolve(&qualified).is_some() {
                    self.table.bindings.insert(node, Binding::External(qualified));
                    return;
                }
            }
        }

        self.unresolved += 1;
        self.table.bindings.insert(node, Binding::Unresolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{ExternalDecl, MapLookup};
    use crate::tree::{OperationKind, Span, TreeBuilder, TypeDeclKind};

    /// class Widget { int size; void grow(int amount) { size = amount; helper; } }
    /// plus a trailing `use-before-decl` block and an import.
    fn build_tree() -> (SyntaxTree, NodeId, NodeId, NodeId, NodeId) {
        let mut b = TreeBuilder::new();
        b.open(NodeKind::CompilationUnit, Span::default());

        let import = b.leaf(NodeKind::ImportDecl, Span::point(1, 1));
        b.set_name(import, "java.util.List");

        let class = b.open(NodeKind::TypeDecl(TypeDeclKind::Class), Span::point(2, 1));
        b.set_name(class, "Widget");

        let method = b.open(NodeKind::Operation(OperationKind::Method), Span::point(3, 5));
        b.set_name(method, "grow");
        let param = b.leaf(NodeKind::Parameter, Span::point(3, 20));
        b.set_name(param, "amount");
        b.open(NodeKind::Block, Span::point(3, 30));
        b.open(NodeKind::ExprStmt, Span::point(4, 9));
        b.open(NodeKind::Assignment, Span::point(4, 9));
        let size_use = b.leaf(NodeKind::Identifier, Span::point(4, 9));
        b.set_name(size_use, "size");
        let amount_use = b.leaf(NodeKind::Identifier, Span::point(4, 16));
        b.set_name(amount_use, "amount");
        b.close(); // assignment
        b.close(); // stmt
        b.open(NodeKind::ExprStmt, Span::point(5, 9));
        let list_use = b.leaf(NodeKind::Identifier, Span::point(5, 9));
        b.set_name(list_use, "List");
        b.close();
        b.close(); // block
        b.close(); // method

        // Field declared after the method that uses it.
        let field = b.leaf(NodeKind::FieldDecl, Span::point(7, 5));
        b.set_name(field, "size");
        b.set_type_name(field, "int");

        b.close(); // class
        b.close(); // unit
        (b.finish(), size_use, amount_use, list_use, field)
    }

    #[test]
    fn test_forward_field_reference_resolves() {
        let (mut tree, size_use, amount_use, _, field) = build_tree();
        SymbolPass::run(&mut tree, None).unwrap();
        let table = tree.annotations().symbols().unwrap();

        match table.binding(size_use).unwrap() {
            Binding::Local(sym) => {
                assert_eq!(table.symbol(*sym).decl, field);
                assert_eq!(table.symbol(*sym).kind, SymbolKind::Field);
            }
            other => panic!("expected local binding, got {:?}", other),
        }
        match table.binding(amount_use).unwrap() {
            Binding::Local(sym) => assert_eq!(table.symbol(*sym).kind, SymbolKind::Parameter),
            other => panic!("expected local binding, got {:?}", other),
        }
    }

    #[test]
    fn test_external_reference_without_lookup_is_unresolved() {
        let (mut tree, _, _, list_use, _) = build_tree();
        SymbolPass::run(&mut tree, None).unwrap();
        let table = tree.annotations().symbols().unwrap();
        assert_eq!(table.binding(list_use), Some(&Binding::Unresolved));
    }

    #[test]
    fn test_external_reference_with_lookup_resolves_through_import() {
        let (mut tree, _, _, list_use, _) = build_tree();
        let mut lookup = MapLookup::new();
        lookup.insert(ExternalDecl::new("java.util.List"));
        SymbolPass::run(&mut tree, Some(&lookup)).unwrap();
        let table = tree.annotations().symbols().unwrap();
        assert_eq!(
            table.binding(list_use),
            Some(&Binding::External("java.util.List".to_string()))
        );
    }

    #[test]
    fn test_rerun_is_rejected() {
        let (mut tree, ..) = build_tree();
        SymbolPass::run(&mut tree, None).unwrap();
        let err = SymbolPass::run(&mut tree, None).unwrap_err();
        assert!(matches!(err, PassError::AlreadyRan { .. }));
    }

    #[test]
    fn test_use_before_block_local_declaration_is_unresolved() {
        let mut b = TreeBuilder::new();
        b.open(NodeKind::CompilationUnit, Span::default());
        let f = b.open(NodeKind::Operation(OperationKind::Function), Span::point(1, 1));
        b.set_name(f, "run");
        b.open(NodeKind::Block, Span::point(1, 10));
        b.open(NodeKind::ExprStmt, Span::point(2, 5));
        let early = b.leaf(NodeKind::Identifier, Span::point(2, 5));
        b.set_name(early, "x");
        b.close();
        let decl = b.leaf(NodeKind::LocalVarDecl, Span::point(3, 5));
        b.set_name(decl, "x");
        b.open(NodeKind::ExprStmt, Span::point(4, 5));
        let late = b.leaf(NodeKind::Identifier, Span::point(4, 5));
        b.set_name(late, "x");
        b.close();
        b.close();
        b.close();
        b.close();
        let mut tree = b.finish();

        SymbolPass::run(&mut tree, None).unwrap();
        let table = tree.annotations().symbols().unwrap();
        assert_eq!(table.binding(early), Some(&Binding::Unresolved));
        assert!(matches!(table.binding(late), Some(Binding::Local(_))));
    }
}
