//! Type resolution.
//!
//! Assigns a [`TypeRef`] to every typed expression and declaration node.
//! Resolution is best-effort: anything the pass cannot determine is recorded
//! as [`TypeRef::Unknown`], never left blank and never fatal. `Unknown` is
//! deliberately distinct from [`TypeRef::Void`]: "resolution failed" and
//! "this operation returns nothing" must stay distinguishable to rule
//! predicates.

use std::collections::{HashMap, HashSet};

use crate::lookup::Lookup;
use crate::passes::symbols::Binding;
use crate::passes::{ensure_fresh, ensure_ran, PassError};
use crate::tree::{NodeId, NodeKind, Pass, SyntaxTree};

use std::fmt;

/// Resolved static type of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A named type; qualified when an import or lookup supplied the
    /// qualification, otherwise as written.
    Named(String),
    /// The void/unit type of the language.
    Void,
    /// Resolution failed.
    Unknown,
}

impl TypeRef {
    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeRef::Unknown)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named(n) => Some(n),
            _ => None,
        }
    }

    /// Simple (unqualified) name, for predicates that accept either form.
    pub fn simple_name(&self) -> Option<&str> {
        self.name().map(|n| n.rsplit('.').next().unwrap_or(n))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(n) => write!(f, "{}", n),
            TypeRef::Void => write!(f, "void"),
            TypeRef::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// The type resolution facade.
pub struct TypePass;

impl TypePass {
    pub fn run(tree: &mut SyntaxTree, lookup: Option<&dyn Lookup>) -> Result<(), PassError> {
        ensure_fresh(tree, Pass::Types)?;
        ensure_ran(tree, Pass::Types, Pass::Symbols)?;
        ensure_ran(tree, Pass::Types, Pass::QualifiedNames)?;

        let mut inference = Inference {
            tree,
            lookup,
            imports: collect_imports(tree),
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        };

        let mut resolved = Vec::new();
        for node in tree.preorder() {
            if is_typed(tree, node) {
                let t = inference.type_of(node);
                resolved.push((node, t));
            }
        }

        let unknown = resolved.iter().filter(|(_, t)| t.is_unknown()).count();
        if unknown > 0 {
            tracing::debug!(unknown, total = resolved.len(), "type resolution left unknowns");
        }

        let annotations = tree.annotations_mut();
        for (node, t) in resolved {
            annotations.types.insert(node, t);
        }
        annotations.mark(Pass::Types);
        Ok(())
    }
}

/// Nodes that receive a type annotation.
fn is_typed(tree: &SyntaxTree, node: NodeId) -> bool {
    if tree.type_name(node).is_some() {
        return true;
    }
    matches!(
        tree.kind(node),
        NodeKind::Operation(_)
            | NodeKind::Parameter
            | NodeKind::FieldDecl
            | NodeKind::LocalVarDecl
            | NodeKind::Identifier
            | NodeKind::CallExpr
            | NodeKind::FieldAccess
            | NodeKind::Assignment
            | NodeKind::BinaryExpr
            | NodeKind::UnaryExpr
            | NodeKind::TernaryExpr
            | NodeKind::InstanceOfExpr
            | NodeKind::Literal(_)
    )
}

fn collect_imports(tree: &SyntaxTree) -> HashMap<String, String> {
    let mut imports = HashMap::new();
    for &child in tree.children(tree.root()) {
        if tree.kind(child) != NodeKind::ImportDecl {
            continue;
        }
        if let Some(path) = tree.name(child) {
            let simple = path.rsplit('.').next().unwrap_or(path);
            imports.insert(simple.to_string(), path.to_string());
        }
    }
    imports
}

struct Inference<'a> {
    tree: &'a SyntaxTree,
    lookup: Option<&'a dyn Lookup>,
    imports: HashMap<String, String>,
    memo: HashMap<NodeId, TypeRef>,
    in_progress: HashSet<NodeId>,
}

impl<'a> Inference<'a> {
    fn type_of(&mut self, node: NodeId) -> TypeRef {
        if let Some(t) = self.memo.get(&node) {
            return t.clone();
        }
        // Self-referential initializers (`var x = x + 1`) would otherwise
        // recurse forever.
        if !self.in_progress.insert(node) {
            return TypeRef::Unknown;
        }
        let t = self.compute(node);
        self.in_progress.remove(&node);
        self.memo.insert(node, t.clone());
        t
    }

    fn compute(&mut self, node: NodeId) -> TypeRef {
        let tree = self.tree;
        if let Some(text) = tree.type_name(node) {
            if text != "var" {
                return self.resolve_text(text);
            }
            // Inferred declaration: take the initializer's type.
            return match tree.children(node).last() {
                Some(&init) => self.type_of(init),
                None => TypeRef::Unknown,
            };
        }

        match tree.kind(node) {
            // Declarations without a written type (Go short declarations,
            // inferred locals) take the initializer's type.
            NodeKind::LocalVarDecl | NodeKind::FieldDecl | NodeKind::Parameter => {
                match tree.children(node).last() {
                    Some(&init) => self.type_of(init),
                    None => TypeRef::Unknown,
                }
            }
            NodeKind::Identifier | NodeKind::CallExpr => self.type_via_binding(node),
            NodeKind::Assignment => match tree.children(node).first() {
                Some(&target) => self.type_of(target),
                None => TypeRef::Unknown,
            },
            NodeKind::UnaryExpr => match tree.children(node).first() {
                Some(&operand) => self.type_of(operand),
                None => TypeRef::Unknown,
            },
            NodeKind::BinaryExpr => self.join_children(node, 0),
            NodeKind::TernaryExpr => self.join_children(node, 1),
            // Member access needs receiver-type member tables the core does
            // not model.
            NodeKind::FieldAccess => TypeRef::Unknown,
            _ => TypeRef::Unknown,
        }
    }

    /// Type of a reference, through its symbol binding.
    fn type_via_binding(&mut self, node: NodeId) -> TypeRef {
        let Some(symbols) = self.tree.annotations().symbols() else {
            return TypeRef::Unknown;
        };
        match symbols.binding(node) {
            Some(Binding::Local(sym)) => {
                let decl = symbols.symbol(*sym).decl;
                self.type_of(decl)
            }
            Some(Binding::External(qualified)) => {
                // A call to an external operation has an unknowable return
                // type; a plain reference is the external type itself.
                if self.tree.kind(node) == NodeKind::CallExpr {
                    TypeRef::Unknown
                } else {
                    TypeRef::Named(qualified.clone())
                }
            }
            Some(Binding::Unresolved) | None => TypeRef::Unknown,
        }
    }

    /// Common type of the children from `skip` onward, or `Unknown` when
    /// they disagree.
    fn join_children(&mut self, node: NodeId, skip: usize) -> TypeRef {
        let children: Vec<NodeId> = self.tree.children(node).iter().skip(skip).copied().collect();
        let mut joined: Option<TypeRef> = None;
        for child in children {
            let t = self.type_of(child);
            match joined {
                None => joined = Some(t),
                Some(ref j) if *j == t => {}
                Some(_) => return TypeRef::Unknown,
            }
        }
        joined.unwrap_or(TypeRef::Unknown)
    }

    fn resolve_text(&self, text: &str) -> TypeRef {
        if text == "void" {
            return TypeRef::Void;
        }
        if let Some(qualified) = self.imports.get(text) {
            return TypeRef::Named(qualified.clone());
        }
        if let Some(lookup) = self.lookup {
            if let Some(decl) = lookup.resolve(text) {
                return TypeRef::Named(decl.qualified_name);
            }
        }
        TypeRef::Named(text.to_string())
    }
}
