//! Register-Bound Intermediate Representation
//!
//! Lowering of analyzed PPC subroutines into a flat IR over routine-scoped
//! temporaries, plus the bind tracking that names those temporaries.

pub mod binding;
pub mod builder;
pub mod instruction;

pub use binding::{BindInfo, BindTracker};
pub use builder::translate_subroutine;
pub use instruction::{
    ConditionRef, CounterCheck, FunctionRef, Immediate, IrBlock, IrInst, IrOpcode, IrRoutine,
    IrType, MemRef, OpVar, ParamRef, StackRef, TempVar, INVALID_TEMP,
};
