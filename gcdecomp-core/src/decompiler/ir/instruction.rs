//! Intermediate Representation
//!
//! Flat three-address IR over routine-scoped temporaries. Operands never
//! name physical registers: they reference temps, stack slots, parameters,
//! immediates, or function addresses. Conditional control flow lives on the
//! block terminator (condition temp + inversion + counter check), not in the
//! instruction stream.

use smallvec::SmallVec;

use crate::decompiler::datasource::{CrField, Fpr, Gpr};
use crate::decompiler::flow_graph::{FlowGraph, VertexId};
use crate::decompiler::ir::binding::BindTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrOpcode {
    // Data movement
    Mov,
    Load,
    Store,

    // Comparison
    Cmp,
    /// Record-form test of a result against zero into cr0.
    RcTest,

    // Indirection
    Call,
    Return,

    // Bit
    Lsh,
    Rsh,
    Rol,
    Ror,
    AndB,
    OrB,
    XorB,
    NotB,

    // Arithmetic
    Add,
    /// Add that also produces a carry.
    Addc,
    Sub,
    Mul,
    Div,
    Neg,
    Sqrt,
    Abs,

    /// No high-level translation; kept opaque.
    Intrinsic,

    /// Optimization barrier (sync/isync/eieio).
    OptBarrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    S1,
    S2,
    S4,
    U1,
    U2,
    U4,
    Single,
    Double,
    Bool,
    Invalid,
}

/// Reference to a condition temp, addressing a subset of its field's four
/// bits (bit 0 = lt, 1 = gt, 2 = eq, 3 = so).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionRef {
    pub temp: u32,
    pub bits: u8,
}

/// Routine-scoped temporary reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempVar {
    Integral { temp: u32, ty: IrType },
    Floating { temp: u32, ty: IrType },
    Condition(ConditionRef),
}

/// Memory operand: GPR temp base plus signed displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRef {
    pub base_temp: u32,
    pub offset: i16,
}

/// Reference to a slot in this routine's own frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRef {
    pub offset: i16,
    pub addrof: bool,
}

/// Reference to an incoming parameter by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRef {
    pub index: u32,
    pub addrof: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Immediate {
    pub value: u32,
    pub signed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionRef {
    pub va: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpVar {
    Temp(TempVar),
    Mem(MemRef),
    Stack(StackRef),
    Param(ParamRef),
    Imm(Immediate),
    Func(FunctionRef),
}

/// One IR instruction with up to three operands; the first operand is the
/// destination for every value-producing opcode.
#[derive(Debug, Clone)]
pub struct IrInst {
    pub opcode: IrOpcode,
    pub operands: SmallVec<[OpVar; 3]>,
}

impl IrInst {
    pub fn new(opcode: IrOpcode, operands: &[OpVar]) -> Self {
        IrInst {
            opcode,
            operands: SmallVec::from_slice(operands),
        }
    }
}

/// CTR involvement of a block's conditional terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterCheck {
    #[default]
    Ignore,
    Zero,
    NotZero,
}

/// IR block: instruction sequence plus optional terminating condition.
#[derive(Debug, Clone, Default)]
pub struct IrBlock {
    pub instructions: Vec<IrInst>,
    /// Condition the ConditionTrue out-edge tests, if any.
    pub cond: Option<ConditionRef>,
    pub invert_cond: bool,
    pub counter_check: CounterCheck,
}

/// Marker for an unassigned parameter-table entry.
pub const INVALID_TEMP: u32 = u32::MAX;

/// The IR of one subroutine: a flow graph of [`IrBlock`]s with the same
/// shape as the source CFG, the three bind trackers, and parameter tables.
pub struct IrRoutine {
    pub graph: FlowGraph<IrBlock>,
    pub gpr_binds: BindTracker<Gpr>,
    pub fpr_binds: BindTracker<Fpr>,
    pub cr_binds: BindTracker<CrField>,
    /// Temp ids bound to r3-r10, in parameter order.
    pub int_params: [u32; 8],
    /// Temp ids bound to f1-f13, in parameter order.
    pub flt_params: [u32; 13],
    /// Frame offsets of parameters passed on the stack, in offset order.
    pub stack_params: Vec<u16>,
    pub num_int_params: u8,
    pub num_flt_params: u8,
    /// CFG block id -> IR graph vertex.
    pub block_vertex: Vec<VertexId>,
}

impl IrRoutine {
    /// Position of a GPR-bound parameter in the combined parameter list.
    pub fn int_param_idx(&self, reg: Gpr) -> u32 {
        reg.0 as u32 - 3
    }

    /// Position of an FPR-bound parameter in the combined parameter list.
    pub fn flt_param_idx(&self, reg: Fpr) -> u32 {
        reg.0 as u32 - 1 + self.num_int_params as u32
    }

    /// Position of a stack-passed parameter in the combined parameter list.
    pub fn stack_param_idx(&self, offset: u16) -> Option<u32> {
        self.stack_params
            .iter()
            .position(|&o| o == offset)
            .map(|pos| pos as u32 + self.num_int_params as u32 + self.num_flt_params as u32)
    }
}
