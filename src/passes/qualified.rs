//! Qualified-name resolution.
//!
//! Derives fully-qualified names for type and operation declarations from
//! the declaration nesting established by symbol resolution. The lookup
//! context parameter is part of the facade contract; an absent context
//! behaves as an empty one.

use crate::lookup::Lookup;
use crate::passes::{ensure_fresh, ensure_ran, PassError};
use crate::tree::{NodeId, NodeKind, Pass, SyntaxTree};

use std::fmt;

/// Fully-qualified name of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// Package/module prefix, if the file declares one.
    pub package: Option<String>,
    /// Enclosing type names, outermost first, including the named type
    /// itself for type declarations.
    pub types: Vec<String>,
    /// Operation name, for operation declarations.
    pub operation: Option<String>,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(ref package) = self.package {
            write!(f, "{}", package)?;
            first = false;
        }
        for t in &self.types {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", t)?;
            first = false;
        }
        if let Some(ref op) = self.operation {
            write!(f, "#{}", op)?;
        }
        Ok(())
    }
}

/// The qualified-name resolution facade.
pub struct QualifiedNamePass;

impl QualifiedNamePass {
    pub fn run(tree: &mut SyntaxTree, _lookup: Option<&dyn Lookup>) -> Result<(), PassError> {
        ensure_fresh(tree, Pass::QualifiedNames)?;
        ensure_ran(tree, Pass::QualifiedNames, Pass::Symbols)?;

        let package = tree
            .children(tree.root())
            .iter()
            .find(|&&c| tree.kind(c) == NodeKind::PackageDecl)
            .and_then(|&c| tree.name(c))
            .map(str::to_string);

        let mut qualified = Vec::new();
        let mut stack = Vec::new();
        collect(tree, tree.root(), &package, &mut stack, &mut qualified);

        let annotations = tree.annotations_mut();
        for (node, name) in qualified {
            annotations.qualified.insert(node, name);
        }
        annotations.mark(Pass::QualifiedNames);
        Ok(())
    }
}

fn collect(
    tree: &SyntaxTree,
    node: NodeId,
    package: &Option<String>,
    stack: &mut Vec<String>,
    out: &mut Vec<(NodeId, QualifiedName)>,
) {
    let kind = tree.kind(node);
    match kind {
        NodeKind::TypeDecl(_) => {
            if let Some(name) = tree.name(node) {
                stack.push(name.to_string());
                out.push((
                    node,
                    QualifiedName {
                        package: package.clone(),
                        types: stack.clone(),
                        operation: None,
                    },
                ));
                for &child in tree.children(node) {
                    collect(tree, child, package, stack, out);
                }
                stack.pop();
                return;
            }
        }
        NodeKind::Operation(_) => {
            if let Some(name) = tree.name(node) {
                out.push((
                    node,
                    QualifiedName {
                        package: package.clone(),
                        types: stack.clone(),
                        operation: Some(name.to_string()),
                    },
                ));
            }
        }
        _ => {}
    }
    for &child in tree.children(node) {
        collect(tree, child, package, stack, out);
    }
}
