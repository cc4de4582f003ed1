//! Semantic analysis passes (facades).
//!
//! Each pass is a restartable tree walk that decorates the tree in place
//! through its own annotation side-table. Passes never alter tree shape, and
//! never run twice on the same tree: symbol resolution allocates fresh scope
//! records per run, so a rerun would duplicate them. The required ordering
//! is symbols → qualified names → types → data flow; each pass reads only
//! annotations written by passes strictly before it.
//!
//! Resolution failures inside a pass are not errors. They degrade to the
//! explicit unresolved/unknown markers so one missing classpath entry does
//! not cost the file its remaining diagnostics.

pub mod dataflow;
pub mod multifile;
pub mod qualified;
pub mod symbols;
pub mod types;

use thiserror::Error;

use crate::tree::{Pass, SyntaxTree};

/// Contract violations in pass sequencing. These indicate an engine or
/// embedder bug, not a property of the analyzed source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error("{pass} has already run on this tree")]
    AlreadyRan { pass: &'static str },
    #[error("{pass} requires {requires} to have run first")]
    MissingPrerequisite {
        pass: &'static str,
        requires: &'static str,
    },
}

pub(crate) fn ensure_fresh(tree: &SyntaxTree, pass: Pass) -> Result<(), PassError> {
    if tree.annotations().state().ran(pass) {
        return Err(PassError::AlreadyRan { pass: pass.name() });
    }
    Ok(())
}

pub(crate) fn ensure_ran(tree: &SyntaxTree, pass: Pass, requires: Pass) -> Result<(), PassError> {
    if !tree.annotations().state().ran(requires) {
        return Err(PassError::MissingPrerequisite {
            pass: pass.name(),
            requires: requires.name(),
        });
    }
    Ok(())
}
