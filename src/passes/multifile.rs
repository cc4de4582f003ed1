//! Project-level usage summaries (deprecated pipeline stage).
//!
//! Records a per-type summary of declared members, originally feeding a
//! cross-file signature index. Nothing else in the pipeline reads its table;
//! it is kept as an optional, disableable pass for embedders that still
//! consume the summaries.

use crate::passes::{ensure_fresh, ensure_ran, PassError};
use crate::tree::{NodeKind, Pass, SyntaxTree};

/// Member counts for one type declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSummary {
    pub operations: usize,
    pub fields: usize,
    pub nested_types: usize,
}

/// The deprecated multifile facade.
pub struct MultifilePass;

impl MultifilePass {
    pub fn run(tree: &mut SyntaxTree) -> Result<(), PassError> {
        ensure_fresh(tree, Pass::Multifile)?;
        ensure_ran(tree, Pass::Multifile, Pass::Symbols)?;

        let mut summaries = Vec::new();
        for type_decl in tree.nodes_where(|k| k.is_type_decl()) {
            let mut summary = UsageSummary::default();
            for &child in tree.children(type_decl) {
                match tree.kind(child) {
                    NodeKind::Operation(_) => summary.operations += 1,
                    NodeKind::FieldDecl => summary.fields += 1,
                    NodeKind::TypeDecl(_) => summary.nested_types += 1,
                    _ => {}
                }
            }
            summaries.push((type_decl, summary));
        }

        let annotations = tree.annotations_mut();
        for (node, summary) in summaries {
            annotations.usages.insert(node, summary);
        }
        annotations.mark(Pass::Multifile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::symbols::SymbolPass;
    use crate::tree::{OperationKind, Span, TreeBuilder, TypeDeclKind};

    #[test]
    fn test_usage_summary_counts_members() {
        let mut b = TreeBuilder::new();
        b.open(NodeKind::CompilationUnit, Span::default());
        let class = b.open(NodeKind::TypeDecl(TypeDeclKind::Class), Span::point(1, 1));
        b.set_name(class, "Widget");
        let m = b.open(NodeKind::Operation(OperationKind::Method), Span::point(2, 5));
        b.set_name(m, "a");
        b.close();
        let f = b.leaf(NodeKind::FieldDecl, Span::point(3, 5));
        b.set_name(f, "x");
        b.close();
        b.close();
        let mut tree = b.finish();

        SymbolPass::run(&mut tree, None).unwrap();
        MultifilePass::run(&mut tree).unwrap();
        let summary = tree.annotations().usage_summary(class).unwrap();
        assert_eq!(summary.operations, 1);
        assert_eq!(summary.fields, 1);
        assert_eq!(summary.nested_types, 0);
    }
}
