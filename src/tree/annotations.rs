//! Typed annotation side-tables written by the semantic passes.
//!
//! Each pass owns exactly one table and only ever appends to it; no pass may
//! retract or overwrite another pass's entries. [`PassState`] records which
//! passes have already run so the never-rerun contract can be enforced.

use std::collections::HashMap;

use crate::passes::dataflow::FlowGraph;
use crate::passes::multifile::UsageSummary;
use crate::passes::qualified::QualifiedName;
use crate::passes::symbols::SymbolTable;
use crate::passes::types::TypeRef;
use crate::tree::NodeId;

/// Identity of a semantic pass, used to key annotation ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Symbols,
    QualifiedNames,
    Types,
    DataFlow,
    Multifile,
}

impl Pass {
    fn bit(self) -> u8 {
        match self {
            Pass::Symbols => 1 << 0,
            Pass::QualifiedNames => 1 << 1,
            Pass::Types => 1 << 2,
            Pass::DataFlow => 1 << 3,
            Pass::Multifile => 1 << 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Pass::Symbols => "symbol resolution",
            Pass::QualifiedNames => "qualified-name resolution",
            Pass::Types => "type resolution",
            Pass::DataFlow => "data-flow analysis",
            Pass::Multifile => "multifile",
        }
    }
}

/// Which passes have decorated this tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassState(u8);

impl PassState {
    pub fn ran(&self, pass: Pass) -> bool {
        self.0 & pass.bit() != 0
    }

    pub(crate) fn mark(&mut self, pass: Pass) {
        self.0 |= pass.bit();
    }
}

/// All annotation tables for one tree.
///
/// Tables start empty; a missing entry means the owning pass has not run or
/// had nothing to record for that node.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    state: PassState,
    pub(crate) symbols: Option<SymbolTable>,
    pub(crate) qualified: HashMap<NodeId, QualifiedName>,
    pub(crate) types: HashMap<NodeId, TypeRef>,
    pub(crate) flow: HashMap<NodeId, FlowGraph>,
    pub(crate) usages: HashMap<NodeId, UsageSummary>,
}

impl Annotations {
    pub fn state(&self) -> PassState {
        self.state
    }

    pub(crate) fn mark(&mut self, pass: Pass) {
        self.state.mark(pass);
    }

    /// The symbol table, present once the symbol pass has run.
    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.as_ref()
    }

    /// Fully-qualified name of a declaration node.
    pub fn qualified_name(&self, id: NodeId) -> Option<&QualifiedName> {
        self.qualified.get(&id)
    }

    /// Resolved static type of a node.
    pub fn type_of(&self, id: NodeId) -> Option<&TypeRef> {
        self.types.get(&id)
    }

    /// Data-flow graph attached to an operation node.
    pub fn flow_graph(&self, id: NodeId) -> Option<&FlowGraph> {
        self.flow.get(&id)
    }

    /// All (operation node, flow graph) pairs, ordered by node index.
    pub fn flow_graphs(&self) -> Vec<(NodeId, &FlowGraph)> {
        let mut graphs: Vec<(NodeId, &FlowGraph)> = self.flow.iter().map(|(&n, g)| (n, g)).collect();
        graphs.sort_by_key(|&(n, _)| n);
        graphs
    }

    /// Usage summary recorded by the deprecated multifile pass.
    pub fn usage_summary(&self, id: NodeId) -> Option<&UsageSummary> {
        self.usages.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_state_bits() {
        let mut state = PassState::default();
        assert!(!state.ran(Pass::Symbols));
        state.mark(Pass::Symbols);
        state.mark(Pass::DataFlow);
        assert!(state.ran(Pass::Symbols));
        assert!(state.ran(Pass::DataFlow));
        assert!(!state.ran(Pass::Types));
    }
}
