//! Op dispatch.
//!
//! Each instruction of a method is compiled once into an immutable [`Op`]: a closed enum
//! with one variant per opcode kind, each holding its operand registers, its own address
//! and its successor addresses resolved at build time. Ops are `Send + Sync` and are
//! shared by every execution of the method.
//!
//! Executing an op mutates the path's [`ExecutionState`] and returns successor
//! descriptors of exactly three shapes, see [`OpChild`].
//!
//! # Modules
//!
//! - [`factory`] - [`OpFactoryRegistry`] and the compiled [`OpProgram`]
//! - one module per opcode family: constants, moves, returns, jumps, branches, compares,
//!   monitors, arithmetic, static fields, invokes and throws

pub mod branch;
pub mod cmp;
pub mod constant;
pub mod factory;
pub mod field;
pub mod goto;
pub mod invoke;
pub mod math;
pub mod monitor;
pub mod moves;
pub mod ret;
pub mod throw;

use std::{fmt, sync::Arc};

use crate::{
    emulation::{ExecutionState, Value, VmServices},
    metadata::VirtualMethod,
    Result,
};

pub use branch::{Comparison, IfTestOp, IfTestZeroOp, SwitchOp};
pub use cmp::{CmpKind, CmpOp};
pub use constant::{ConstOp, NopOp};
pub use factory::{BuildContext, OpFactory, OpFactoryRegistry, OpProgram};
pub use field::{StaticGetOp, StaticPutOp};
pub use goto::GotoOp;
pub use invoke::InvokeOp;
pub use math::{BinaryMathOp, BinaryOperator, NumericKind, UnaryMathOp, UnaryOperator};
pub use monitor::{MonitorKind, MonitorOp};
pub use moves::{MoveExceptionOp, MoveOp, MoveResultOp};
pub use ret::ReturnOp;
pub use throw::ThrowOp;

/// A step the driver must run before a path can continue.
#[derive(Debug, Clone)]
pub enum SyntheticStep {
    /// Run the class's static initializer on this path
    StaticInit {
        /// Internal name of the class
        class: Arc<str>,
    },
    /// Execute a local method body and continue with its outcomes
    Invoke {
        /// The callee
        method: Arc<VirtualMethod>,
        /// Argument values, receiver first for instance methods
        arguments: Vec<Value>,
    },
}

/// How a path ends.
#[derive(Debug, Clone)]
pub enum Termination {
    /// `return*` executed; the value is in the state's return slot
    Return,
    /// An exception was raised
    Throw(Value),
}

/// Successor descriptor returned by [`Op::execute`] and emulated calls.
#[derive(Debug, Clone)]
pub enum OpChild {
    /// Continue at `address` with the op's resulting state
    Continue {
        /// Next instruction
        address: u32,
    },
    /// Run a synthetic step, then continue at `resume` with each of its outcomes
    Redirect {
        /// The step
        step: SyntheticStep,
        /// Where the path resumes; the op's own address to re-execute it
        resume: u32,
    },
    /// The path ends here, unless a catch handler picks up a thrown value
    Terminal(Termination),
}

impl OpChild {
    /// Shorthand for [`OpChild::Continue`].
    #[must_use]
    pub fn next(address: u32) -> Self {
        OpChild::Continue { address }
    }

    /// Shorthand for a thrown value.
    #[must_use]
    pub fn throw(value: Value) -> Self {
        OpChild::Terminal(Termination::Throw(value))
    }
}

/// Execution-time services handed to every op.
#[derive(Clone, Copy)]
pub struct OpContext<'a> {
    /// Class repository, configuration, loaders and emulated calls
    pub services: &'a VmServices,
    /// Nesting depth of the graph being explored
    pub depth: usize,
}

/// One compiled instruction.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum Op {
    Nop(NopOp),
    Const(ConstOp),
    Move(MoveOp),
    MoveResult(MoveResultOp),
    MoveException(MoveExceptionOp),
    Return(ReturnOp),
    Goto(GotoOp),
    IfTest(IfTestOp),
    IfTestZero(IfTestZeroOp),
    Switch(SwitchOp),
    Cmp(CmpOp),
    Monitor(MonitorOp),
    BinaryMath(BinaryMathOp),
    UnaryMath(UnaryMathOp),
    StaticGet(StaticGetOp),
    StaticPut(StaticPutOp),
    Invoke(InvokeOp),
    Throw(ThrowOp),
}

macro_rules! dispatch {
    ($self:ident, $op:ident => $body:expr) => {
        match $self {
            Op::Nop($op) => $body,
            Op::Const($op) => $body,
            Op::Move($op) => $body,
            Op::MoveResult($op) => $body,
            Op::MoveException($op) => $body,
            Op::Return($op) => $body,
            Op::Goto($op) => $body,
            Op::IfTest($op) => $body,
            Op::IfTestZero($op) => $body,
            Op::Switch($op) => $body,
            Op::Cmp($op) => $body,
            Op::Monitor($op) => $body,
            Op::BinaryMath($op) => $body,
            Op::UnaryMath($op) => $body,
            Op::StaticGet($op) => $body,
            Op::StaticPut($op) => $body,
            Op::Invoke($op) => $body,
            Op::Throw($op) => $body,
        }
    };
}

impl Op {
    /// Executes the op against one path's state.
    ///
    /// # Errors
    ///
    /// Returns an [`crate::Error::Emulation`] for internal faults only. Exceptions of the
    /// analyzed program are reported as [`Termination::Throw`] successors.
    pub fn execute(&self, state: &mut ExecutionState, ctx: &OpContext<'_>) -> Result<Vec<OpChild>> {
        dispatch!(self, op => op.execute(state, ctx))
    }

    /// Address of the instruction this op was built from.
    #[must_use]
    pub fn address(&self) -> u32 {
        dispatch!(self, op => op.address)
    }

    /// Number of operand registers the op reads.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        dispatch!(self, op => op.registers_read_count())
    }

    /// Number of operand registers the op assigns.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        dispatch!(self, op => op.registers_assigned_count())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, op => fmt::Display::fmt(op, f))
    }
}
