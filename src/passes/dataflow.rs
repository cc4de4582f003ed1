//! Data-flow analysis.
//!
//! Builds a control-flow graph per operation node: graph nodes are the
//! operation's statements (plus synthetic entry/exit), edges are possible
//! execution order. The graph is attached as an annotation on the operation
//! node and consumed by whole-graph rules (unreachable statements,
//! use-before-define) that bypass the generic query surface.

use std::collections::HashSet;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Dfs;
use petgraph::Direction;

use crate::passes::{ensure_fresh, ensure_ran, PassError};
use crate::tree::{NodeId, NodeKind, Pass, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowNodeKind {
    Entry,
    Exit,
    Statement,
}

/// One node of a control-flow graph.
#[derive(Debug, Clone, Copy)]
pub struct FlowNode {
    pub kind: FlowNodeKind,
    /// The statement this flow node stands for; `None` for entry/exit.
    pub ast: Option<NodeId>,
}

/// Control-flow graph of one operation body.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    graph: StableDiGraph<FlowNode, ()>,
    entry: NodeIndex,
    exit: NodeIndex,
}

impl FlowGraph {
    pub fn graph(&self) -> &StableDiGraph<FlowNode, ()> {
        &self.graph
    }

    pub fn entry(&self) -> NodeIndex {
        self.entry
    }

    pub fn exit(&self) -> NodeIndex {
        self.exit
    }

    /// Statement flow nodes with their AST nodes, in insertion (source)
    /// order.
    pub fn statements(&self) -> Vec<(NodeIndex, NodeId)> {
        let mut out: Vec<(NodeIndex, NodeId)> = self
            .graph
            .node_indices()
            .filter_map(|idx| self.graph[idx].ast.map(|ast| (idx, ast)))
            .collect();
        out.sort_by_key(|&(idx, _)| idx.index());
        out
    }

    pub fn predecessors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect()
    }

    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect()
    }

    /// Flow nodes reachable from entry.
    pub fn reachable(&self) -> HashSet<NodeIndex> {
        let mut seen = HashSet::new();
        let mut dfs = Dfs::new(&self.graph, self.entry);
        while let Some(idx) = dfs.next(&self.graph) {
            seen.insert(idx);
        }
        seen
    }

    /// AST nodes of statements no execution path reaches.
    pub fn unreachable_statements(&self) -> Vec<NodeId> {
        let reachable = self.reachable();
        self.statements()
            .into_iter()
            .filter(|(idx, _)| !reachable.contains(idx))
            .map(|(_, ast)| ast)
            .collect()
    }
}

/// The data-flow analysis facade.
pub struct DataFlowPass;

impl DataFlowPass {
    pub fn run(tree: &mut SyntaxTree) -> Result<(), PassError> {
        ensure_fresh(tree, Pass::DataFlow)?;
        ensure_ran(tree, Pass::DataFlow, Pass::Symbols)?;

        let mut graphs = Vec::new();
        for op in tree.nodes_where(|k| k.is_operation()) {
            let body = tree
                .children(op)
                .iter()
                .copied()
                .find(|&c| tree.kind(c) == NodeKind::Block);
            if let Some(body) = body {
                graphs.push((op, build_graph(tree, body)));
            }
        }
        tracing::debug!(operations = graphs.len(), "built flow graphs");

        let annotations = tree.annotations_mut();
        for (op, graph) in graphs {
            annotations.flow.insert(op, graph);
        }
        annotations.mark(Pass::DataFlow);
        Ok(())
    }
}

struct LoopCtx {
    header: NodeIndex,
    breaks: Vec<NodeIndex>,
}

struct GraphBuilder<'a> {
    tree: &'a SyntaxTree,
    graph: StableDiGraph<FlowNode, ()>,
    exit: NodeIndex,
    loops: Vec<LoopCtx>,
}

fn build_graph(tree: &SyntaxTree, body: NodeId) -> FlowGraph {
    let mut graph = StableDiGraph::new();
    let entry = graph.add_node(FlowNode {
        kind: FlowNodeKind::Entry,
        ast: None,
    });
    let exit = graph.add_node(FlowNode {
        kind: FlowNodeKind::Exit,
        ast: None,
    });
    let mut builder = GraphBuilder {
        tree,
        graph,
        exit,
        loops: Vec::new(),
    };
    let frontier = builder.stmt_list(tree.children(body), vec![entry]);
    builder.connect(&frontier, exit);
    FlowGraph {
        graph: builder.graph,
        entry,
        exit,
    }
}

impl<'a> GraphBuilder<'a> {
    fn add(&mut self, ast: NodeId) -> NodeIndex {
        self.graph.add_node(FlowNode {
            kind: FlowNodeKind::Statement,
            ast: Some(ast),
        })
    }

    fn connect(&mut self, preds: &[NodeIndex], to: NodeIndex) {
        for &p in preds {
            if !self.graph.contains_edge(p, to) {
                self.graph.add_edge(p, to, ());
            }
        }
    }

    fn stmt_list(&mut self, stmts: &[NodeId], mut frontier: Vec<NodeIndex>) -> Vec<NodeIndex> {
        for &stmt in stmts {
            let kind = self.tree.kind(stmt);
            if matches!(kind, NodeKind::Comment | NodeKind::Annotation) {
                continue;
            }
            frontier = self.stmt(stmt, frontier);
        }
        frontier
    }

    /// Add one statement; returns the frontier that falls through to the
    /// next statement.
    fn stmt(&mut self, stmt: NodeId, frontier: Vec<NodeIndex>) -> Vec<NodeIndex> {
        let tree = self.tree;
        match tree.kind(stmt) {
            NodeKind::Block => self.stmt_list(tree.children(stmt), frontier),
            NodeKind::IfStmt => {
                let n = self.add(stmt);
                self.connect(&frontier, n);
                let children = tree.children(stmt);
                let mut out = Vec::new();
                match children.len() {
                    0 | 1 => out.push(n),
                    2 => {
                        // Condition + then branch; false edge falls through.
                        out.extend(self.stmt(children[1], vec![n]));
                        out.push(n);
                    }
                    _ => {
                        out.extend(self.stmt(children[1], vec![n]));
                        out.extend(self.stmt(children[2], vec![n]));
                    }
                }
                dedup(out)
            }
            NodeKind::LoopStmt => {
                let header = self.add(stmt);
                self.connect(&frontier, header);
                self.loops.push(LoopCtx {
                    header,
                    breaks: Vec::new(),
                });
                let body = tree.children(stmt).last().copied();
                if let Some(body) = body {
                    let body_exit = self.stmt(body, vec![header]);
                    self.connect(&body_exit, header);
                }
                let mut out = vec![header];
                if let Some(ctx) = self.loops.pop() {
                    out.extend(ctx.breaks);
                }
                dedup(out)
            }
            NodeKind::SwitchStmt | NodeKind::SwitchExpr => {
                let header = self.add(stmt);
                self.connect(&frontier, header);
                let mut out = vec![header];
                for &child in tree.children(stmt) {
                    if tree.kind(child) == NodeKind::CaseClause {
                        out.extend(self.stmt_list(tree.children(child), vec![header]));
                    }
                }
                dedup(out)
            }
            NodeKind::TryStmt => {
                let header = self.add(stmt);
                self.connect(&frontier, header);
                let mut out = Vec::new();
                for &child in tree.children(stmt) {
                    match tree.kind(child) {
                        NodeKind::Block => {
                            out.extend(self.stmt(child, vec![header]));
                        }
                        NodeKind::CatchClause => {
                            out.extend(self.stmt_list(tree.children(child), vec![header]));
                        }
                        _ => {}
                    }
                }
                if out.is_empty() {
                    out.push(header);
                }
                dedup(out)
            }
            NodeKind::ReturnStmt | NodeKind::ThrowStmt => {
                let n = self.add(stmt);
                self.connect(&frontier, n);
                let exit = self.exit;
                self.connect(&[n], exit);
                Vec::new()
            }
            NodeKind::BreakStmt => {
                let n = self.add(stmt);
                self.connect(&frontier, n);
                if let Some(ctx) = self.loops.last_mut() {
                    ctx.breaks.push(n);
                    Vec::new()
                } else {
                    // Break outside a tracked loop (e.g. inside a switch
                    // case): treat as falling through rather than invent an
                    // unreachable region.
                    vec![n]
                }
            }
            NodeKind::ContinueStmt => {
                let n = self.add(stmt);
                self.connect(&frontier, n);
                if let Some(header) = self.loops.last().map(|c| c.header) {
                    self.connect(&[n], header);
                    Vec::new()
                } else {
                    vec![n]
                }
            }
            _ => {
                let n = self.add(stmt);
                self.connect(&frontier, n);
                vec![n]
            }
        }
    }
}

fn dedup(frontier: Vec<NodeIndex>) -> Vec<NodeIndex> {
    let mut seen = HashSet::new();
    frontier.into_iter().filter(|n| seen.insert(*n)).collect()
}
