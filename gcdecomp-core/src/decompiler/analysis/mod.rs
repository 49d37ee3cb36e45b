//! Subroutine Analysis
//!
//! The per-subroutine analyses: control flow graph construction, register
//! liveness, stack-frame recovery, and perilogue classification. Their
//! results accumulate into a [`Subroutine`], which owns all of them
//! exclusively; nothing here shares mutable state across subroutines.

pub mod control_flow;
pub mod data_flow;
pub mod perilogue;
pub mod stack;

pub use control_flow::{
    build_graph, BasicBlock, BlockId, IncomingEdgeKind, Loop, OutgoingEdgeKind, SubroutineGraph,
};
pub use data_flow::{run_liveness_analysis, RegisterLifetimes};
pub use perilogue::{run_perilogue_analysis, PerilogueTag};
pub use stack::{run_stack_analysis, StackVariable, SubroutineStack};

use crate::decompiler::datasource::{FprSet, GprSet};

/// Everything known about one analyzed subroutine.
pub struct Subroutine {
    pub start_va: u32,
    pub graph: SubroutineGraph,
    pub stack: SubroutineStack,
    /// Argument registers observed live into the entry block.
    pub gpr_params: GprSet,
    pub fpr_params: FprSet,
}
