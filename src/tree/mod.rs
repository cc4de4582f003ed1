//! Arena-backed AST shared by all analysis passes.
//!
//! Parsers normalize their concrete syntax trees into a [`SyntaxTree`]: a
//! single-owner arena of nodes addressed by stable [`NodeId`] indices.
//! Parent/child links are index pairs, so passes never hold aliasing
//! references into the tree. Derived information lives in typed side-tables
//! (see [`annotations`]) keyed by node index; the tree shape itself is
//! immutable once built.

mod annotations;

pub use annotations::{Annotations, Pass, PassState};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// A span covering a single point, used for synthetic nodes.
    pub fn point(line: usize, col: usize) -> Self {
        Self {
            start_byte: 0,
            end_byte: 0,
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// Stable index of a node within its [`SyntaxTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of a type-introducing declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDeclKind {
    Class,
    Interface,
    Enum,
    Record,
    Struct,
}

/// Kind of an operation-like declaration (anything with a body to analyze).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Function,
    Method,
    Constructor,
    Lambda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Float,
    Bool,
    Char,
    Str,
    TextBlock,
    Null,
}

/// Normalized node kinds.
///
/// Language normalizers map their grammar's productions onto this shared
/// taxonomy; constructs the taxonomy does not distinguish keep their raw
/// grammar kind in `Other`. The version gate, the semantic passes, and the
/// metric helpers all dispatch on these kinds, so a plugin only has to get
/// the mapping right once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    CompilationUnit,
    PackageDecl,
    ImportDecl,
    TypeDecl(TypeDeclKind),
    Operation(OperationKind),
    Parameter,
    TypeParameter,
    FieldDecl,
    LocalVarDecl,
    Block,
    IfStmt,
    LoopStmt,
    SwitchStmt,
    SwitchExpr,
    CaseClause,
    TryStmt,
    CatchClause,
    ReturnStmt,
    ThrowStmt,
    BreakStmt,
    ContinueStmt,
    ExprStmt,
    Assignment,
    BinaryExpr,
    UnaryExpr,
    TernaryExpr,
    InstanceOfExpr,
    CallExpr,
    FieldAccess,
    Identifier,
    Literal(LiteralKind),
    Annotation,
    Comment,
    Other(&'static str),
}

impl NodeKind {
    /// Whether this kind declares a name in the enclosing scope.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::TypeDecl(_)
                | NodeKind::Operation(_)
                | NodeKind::Parameter
                | NodeKind::TypeParameter
                | NodeKind::FieldDecl
                | NodeKind::LocalVarDecl
        )
    }

    /// Whether this kind opens a lexical scope.
    pub fn opens_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::CompilationUnit
                | NodeKind::TypeDecl(_)
                | NodeKind::Operation(_)
                | NodeKind::Block
                | NodeKind::LoopStmt
                | NodeKind::CatchClause
        )
    }

    pub fn is_operation(&self) -> bool {
        matches!(self, NodeKind::Operation(_))
    }

    pub fn is_type_decl(&self) -> bool {
        matches!(self, NodeKind::TypeDecl(_))
    }

    /// Statement-like kinds that become nodes of a data-flow graph.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::IfStmt
                | NodeKind::LoopStmt
                | NodeKind::SwitchStmt
                | NodeKind::CaseClause
                | NodeKind::TryStmt
                | NodeKind::CatchClause
                | NodeKind::ReturnStmt
                | NodeKind::ThrowStmt
                | NodeKind::BreakStmt
                | NodeKind::ContinueStmt
                | NodeKind::ExprStmt
                | NodeKind::LocalVarDecl
                | NodeKind::Block
        )
    }
}

/// One node record in the arena.
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Declared name for declarations, referenced name for identifiers and
    /// calls, operator text for binary/unary expressions, comment text for
    /// comment nodes.
    pub name: Option<String>,
    /// Static type text where the grammar supplies one (declared types,
    /// literals, boolean-producing operators). The type pass resolves this
    /// text; absence means the type pass has to derive or give up.
    pub type_name: Option<String>,
    /// Modifier keywords as written (`public`, `sealed`, ...).
    pub modifiers: Vec<String>,
}

/// The normalized syntax tree for one source file.
///
/// Acyclic and single-owner: children are owned through the arena, parent
/// links are lookup-only. Annotations are append-only per pass.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    pub(crate) annotations: Annotations,
}

impl SyntaxTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    pub fn type_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).type_name.as_deref()
    }

    pub fn modifiers(&self, id: NodeId) -> &[String] {
        &self.node(id).modifiers
    }

    pub fn has_modifier(&self, id: NodeId, modifier: &str) -> bool {
        self.node(id).modifiers.iter().any(|m| m == modifier)
    }

    /// Iterate the whole tree in preorder (parents before children,
    /// children in source order).
    pub fn preorder(&self) -> Preorder<'_> {
        let mut stack = Vec::new();
        if !self.nodes.is_empty() {
            stack.push(self.root());
        }
        Preorder { tree: self, stack }
    }

    /// Preorder walk of the subtree rooted at `id`, including `id` itself.
    pub fn descendants(&self, id: NodeId) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![id],
        }
    }

    /// All nodes matching a predicate, in preorder.
    pub fn nodes_where<F: Fn(NodeKind) -> bool>(&self, pred: F) -> Vec<NodeId> {
        self.preorder().filter(|&n| pred(self.kind(n))).collect()
    }

    /// Nearest ancestor (excluding `id`) matching a predicate.
    pub fn ancestor_where<F: Fn(NodeKind) -> bool>(&self, id: NodeId, pred: F) -> Option<NodeId> {
        let mut current = self.parent(id);
        while let Some(n) = current {
            if pred(self.kind(n)) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// The nearest enclosing operation node, if any.
    pub fn enclosing_operation(&self, id: NodeId) -> Option<NodeId> {
        self.ancestor_where(id, |k| k.is_operation())
    }

    /// The nearest enclosing declaration node (type, operation, field, ...).
    pub fn enclosing_declaration(&self, id: NodeId) -> Option<NodeId> {
        self.ancestor_where(id, |k| k.is_declaration())
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

/// Preorder node iterator.
pub struct Preorder<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let children = self.tree.children(id);
        for &child in children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

/// Incremental builder used by language normalizers.
///
/// Nodes are pushed depth-first: `open` starts a node and makes it current,
/// `close` pops back to its parent, `leaf` is open+close. The first opened
/// node becomes the root.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a node as a child of the current node and make it current.
    pub fn open(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let parent = self.stack.last().copied();
        self.nodes.push(NodeData {
            kind,
            span,
            parent,
            children: Vec::new(),
            name: None,
            type_name: None,
            modifiers: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p.index()].children.push(id);
        }
        self.stack.push(id);
        id
    }

    /// Close the current node, returning to its parent.
    pub fn close(&mut self) {
        self.stack.pop();
    }

    /// Add a childless node under the current node.
    pub fn leaf(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = self.open(kind, span);
        self.close();
        id
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        self.nodes[id.index()].name = Some(name.into());
    }

    pub fn set_type_name(&mut self, id: NodeId, type_name: impl Into<String>) {
        self.nodes[id.index()].type_name = Some(type_name.into());
    }

    pub fn add_modifier(&mut self, id: NodeId, modifier: impl Into<String>) {
        self.nodes[id.index()].modifiers.push(modifier.into());
    }

    /// Number of nodes pushed so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finish the tree. All opened nodes must have been closed.
    pub fn finish(self) -> SyntaxTree {
        assert!(
            self.stack.is_empty(),
            "unbalanced TreeBuilder: {} node(s) left open",
            self.stack.len()
        );
        assert!(!self.nodes.is_empty(), "TreeBuilder produced an empty tree");
        SyntaxTree {
            nodes: self.nodes,
            annotations: Annotations::default(),
        }
    }
}
