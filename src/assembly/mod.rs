//! Dalvik instruction records and method bodies.
//!
//! The engine consumes methods as sequences of decoded [`Instruction`]s. This module
//! defines that input format together with the [`Opcode`] table and a [`MethodAssembler`]
//! for building bodies by hand.
//!
//! # Key Components
//!
//! - [`Opcode`] / [`FlowType`] - the supported opcodes, their mnemonics and control flow
//! - [`Instruction`] / [`Reference`] - one decoded instruction and its operands
//! - [`MethodImplementation`] / [`TryBlock`] - one method body with its exception ranges
//! - [`MethodAssembler`] - label-resolving builder for method bodies

mod assembler;
mod instruction;
mod opcodes;

pub use assembler::{LabelFixup, MethodAssembler, SwitchFixup};
pub use instruction::{
    CatchHandler, Instruction, MethodImplementation, Reference, SwitchTarget, TryBlock,
};
pub use opcodes::{FlowType, Opcode};
