//! Whole-graph rules over the data-flow annotation.
//!
//! These consume the control-flow graph directly instead of the generic
//! query surface: reachability and definite-assignment need the whole graph
//! at once. A language handler exposes one [`DataFlowRule`] descriptor; the
//! default covers unreachable statements and use-before-define.

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::NodeIndex;

use crate::passes::dataflow::FlowGraph;
use crate::passes::symbols::{Binding, SymbolId, SymbolKind, SymbolTable};
use crate::rules::{RuleContext, Severity, ViolationCollector};
use crate::tree::{NodeId, NodeKind, SyntaxTree};

pub const UNREACHABLE_CODE: &str = "unreachable-code";
pub const USE_BEFORE_DEFINITION: &str = "use-before-definition";

/// A rule consuming an operation's data-flow graph.
pub trait DataFlowRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        ctx: &RuleContext<'_>,
        op: NodeId,
        graph: &FlowGraph,
        out: &mut ViolationCollector,
    );
}

/// Unreachable statements and use-before-define over one graph.
pub struct DefaultFlowRules;

impl DataFlowRule for DefaultFlowRules {
    fn name(&self) -> &'static str {
        "flow-graph"
    }

    fn apply(
        &self,
        ctx: &RuleContext<'_>,
        op: NodeId,
        graph: &FlowGraph,
        out: &mut ViolationCollector,
    ) {
        let op_name = ctx.tree.name(op).unwrap_or("<anonymous>");

        for dead in graph.unreachable_statements() {
            out.report(
                ctx,
                UNREACHABLE_CODE,
                Severity::Warning,
                Some(dead),
                format!("statement in `{}` is never executed", op_name),
            );
        }

        let Some(symbols) = ctx.tree.annotations().symbols() else {
            return;
        };
        for (ident, name) in undefined_uses(ctx.tree, symbols, op, graph) {
            out.report(
                ctx,
                USE_BEFORE_DEFINITION,
                Severity::Error,
                Some(ident),
                format!("`{}` may be used before it is assigned", name),
            );
        }
    }
}

/// Definite-assignment analysis: identifier uses no definition reaches on
/// every path from entry.
fn undefined_uses(
    tree: &SyntaxTree,
    symbols: &SymbolTable,
    op: NodeId,
    graph: &FlowGraph,
) -> Vec<(NodeId, String)> {
    let statements = graph.statements();

    let mut defs: HashMap<NodeIndex, HashSet<SymbolId>> = HashMap::new();
    let mut uses: HashMap<NodeIndex, Vec<(NodeId, SymbolId)>> = HashMap::new();
    for &(idx, ast) in &statements {
        let (d, u) = defs_and_uses(tree, symbols, ast);
        defs.insert(idx, d);
        uses.insert(idx, u);
    }

    // Parameters count as assigned at entry.
    let mut entry_defs = HashSet::new();
    if let Some(scope) = symbols.scope_of(op) {
        for sym in symbols.symbols_in(scope) {
            if sym.kind == SymbolKind::Parameter {
                if let Some(id) = symbols.symbol_for_decl(sym.decl) {
                    entry_defs.insert(id);
                }
            }
        }
    }

    // Forward must-analysis to a fixpoint: a variable is definitely assigned
    // at a statement when every predecessor path assigns it. `None` is the
    // not-yet-computed top element.
    let mut out_sets: HashMap<NodeIndex, Option<HashSet<SymbolId>>> = HashMap::new();
    out_sets.insert(graph.entry(), Some(entry_defs));
    for &(idx, _) in &statements {
        out_sets.insert(idx, None);
    }

    let mut changed = true;
    let mut rounds = 0usize;
    while changed && rounds < statements.len() + 2 {
        changed = false;
        rounds += 1;
        for &(idx, _) in &statements {
            let mut incoming: Option<HashSet<SymbolId>> = None;
            for pred in graph.predecessors(idx) {
                let Some(Some(pred_out)) = out_sets.get(&pred) else {
                    continue;
                };
                incoming = Some(match incoming {
                    None => pred_out.clone(),
                    Some(acc) => acc.intersection(pred_out).copied().collect(),
                });
            }
            let Some(mut new_out) = incoming else {
                continue;
            };
            if let Some(d) = defs.get(&idx) {
                new_out.extend(d.iter().copied());
            }
            if out_sets.get(&idx) != Some(&Some(new_out.clone())) {
                out_sets.insert(idx, Some(new_out));
                changed = true;
            }
        }
    }

    let mut findings = Vec::new();
    for &(idx, _) in &statements {
        // The in-set is the intersection of predecessor out-sets; recompute
        // it from the fixpoint rather than storing both directions.
        let mut in_set: Option<HashSet<SymbolId>> = None;
        for pred in graph.predecessors(idx) {
            let Some(Some(pred_out)) = out_sets.get(&pred) else {
                continue;
            };
            in_set = Some(match in_set {
                None => pred_out.clone(),
                Some(acc) => acc.intersection(pred_out).copied().collect(),
            });
        }
        let Some(in_set) = in_set else {
            continue; // Unreachable statement; reported separately.
        };
        for &(ident, sym) in uses.get(&idx).into_iter().flatten() {
            if symbols.symbol(sym).kind != SymbolKind::Local {
                continue;
            }
            if !in_set.contains(&sym) {
                findings.push((ident, symbols.symbol(sym).name.clone()));
            }
        }
    }
    findings.sort_by_key(|&(ident, _)| tree.span(ident).start_line);
    findings
}

/// Definitions and local-variable uses of one statement's flow node.
///
/// Nested statements are their own flow nodes, so the walk stops at child
/// statements; an `if` header contributes only its condition.
fn defs_and_uses(
    tree: &SyntaxTree,
    symbols: &SymbolTable,
    stmt: NodeId,
) -> (HashSet<SymbolId>, Vec<(NodeId, SymbolId)>) {
    let mut defs = HashSet::new();
    let mut uses = Vec::new();

    // A declaration with an initializer defines its own symbol.
    if tree.kind(stmt) == NodeKind::LocalVarDecl && !tree.children(stmt).is_empty() {
        if let Some(sym) = symbols.symbol_for_decl(stmt) {
            defs.insert(sym);
        }
    }

    // Loop headers declare their induction/range variables; those live in
    // the header's flow node even though the declarations are nested.
    if tree.kind(stmt) == NodeKind::LoopStmt {
        for &child in tree.children(stmt) {
            if tree.kind(child) == NodeKind::LocalVarDecl {
                if let Some(sym) = symbols.symbol_for_decl(child) {
                    defs.insert(sym);
                }
            }
        }
    }

    collect(tree, symbols, stmt, stmt, &mut defs, &mut uses);
    (defs, uses)
}

fn collect(
    tree: &SyntaxTree,
    symbols: &SymbolTable,
    node: NodeId,
    stmt: NodeId,
    defs: &mut HashSet<SymbolId>,
    uses: &mut Vec<(NodeId, SymbolId)>,
) {
    if node != stmt && tree.kind(node).is_statement() {
        return;
    }

    if tree.kind(node) == NodeKind::Assignment {
        let children = tree.children(node);
        if let Some(&target) = children.first() {
            if tree.kind(target) == NodeKind::Identifier {
                if let Some(Binding::Local(sym)) = symbols.binding(target) {
                    defs.insert(*sym);
                }
            }
            for &value in &children[1..] {
                collect(tree, symbols, value, stmt, defs, uses);
            }
        }
        return;
    }

    if tree.kind(node) == NodeKind::Identifier {
        if let Some(Binding::Local(sym)) = symbols.binding(node) {
            uses.push((node, *sym));
        }
    }

    for &child in tree.children(node) {
        collect(tree, symbols, child, stmt, defs, uses);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::dataflow::DataFlowPass;
    use crate::passes::symbols::SymbolPass;
    use crate::tree::{OperationKind, Span, TreeBuilder};

    /// fn f() { int a; if (c) { a = 1; } use(a); int b = 2; use(b); }
    fn build() -> (crate::tree::SyntaxTree, NodeId, NodeId, NodeId) {
        let mut b = TreeBuilder::new();
        b.open(NodeKind::CompilationUnit, Span::default());
        let op = b.open(NodeKind::Operation(OperationKind::Function), Span::point(1, 1));
        b.set_name(op, "f");
        b.open(NodeKind::Block, Span::point(1, 10));

        // int a; (no initializer)
        let a_decl = b.leaf(NodeKind::LocalVarDecl, Span::point(2, 5));
        b.set_name(a_decl, "a");
        b.set_type_name(a_decl, "int");

        // if (c) { a = 1; }
        b.open(NodeKind::IfStmt, Span::point(3, 5));
        let c_use = b.leaf(NodeKind::Identifier, Span::point(3, 9));
        b.set_name(c_use, "c");
        b.open(NodeKind::Block, Span::point(3, 12));
        b.open(NodeKind::ExprStmt, Span::point(4, 9));
        b.open(NodeKind::Assignment, Span::point(4, 9));
        let a_target = b.leaf(NodeKind::Identifier, Span::point(4, 9));
        b.set_name(a_target, "a");
        b.close();
        b.close();
        b.close();
        b.close();

        // use of a after the conditional assignment
        b.open(NodeKind::ExprStmt, Span::point(6, 5));
        let a_use = b.leaf(NodeKind::Identifier, Span::point(6, 5));
        b.set_name(a_use, "a");
        b.close();

        // int b = 2; use(b);
        let b_decl = b.open(NodeKind::LocalVarDecl, Span::point(7, 5));
        b.set_name(b_decl, "b");
        b.set_type_name(b_decl, "int");
        b.leaf(NodeKind::Literal(crate::tree::LiteralKind::Int), Span::point(7, 13));
        b.close();
        b.open(NodeKind::ExprStmt, Span::point(8, 5));
        let b_use = b.leaf(NodeKind::Identifier, Span::point(8, 5));
        b.set_name(b_use, "b");
        b.close();

        b.close(); // block
        b.close(); // op
        b.close();
        (b.finish(), op, a_use, b_use)
    }

    #[test]
    fn test_conditional_assignment_flags_later_use() {
        let (mut tree, op, a_use, b_use) = build();
        SymbolPass::run(&mut tree, None).unwrap();
        DataFlowPass::run(&mut tree).unwrap();

        let symbols = tree.annotations().symbols().unwrap();
        let graph = tree.annotations().flow_graph(op).unwrap();
        let findings = undefined_uses(&tree, symbols, op, graph);

        let flagged: Vec<NodeId> = findings.iter().map(|&(n, _)| n).collect();
        assert!(
            flagged.contains(&a_use),
            "`a` is only assigned on one branch"
        );
        assert!(
            !flagged.contains(&b_use),
            "`b` is initialized at its declaration"
        );
    }
}
