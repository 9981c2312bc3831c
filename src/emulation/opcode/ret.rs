//! `return*`

use std::fmt;
use std::sync::Arc;

use crate::{
    assembly::{Instruction, Opcode},
    emulation::{
        opcode::{BuildContext, Op, OpChild, OpContext, Termination},
        ExecutionState,
    },
    Result,
};

/// `return-void`, `return`, `return-wide` and `return-object`.
#[derive(Debug, Clone)]
pub struct ReturnOp {
    /// Own address
    pub address: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Returned register, `None` for `return-void`
    pub source: Option<u16>,
    /// Declared return type of the method
    pub return_type: Arc<str>,
}

impl ReturnOp {
    /// Records the return value under the method's declared return type and ends the path.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let value = match self.source {
            Some(register) => Some(
                state
                    .read_register(register)?
                    .retyped(self.return_type.clone()),
            ),
            None => None,
        };
        state.assign_return(value);
        Ok(vec![OpChild::Terminal(Termination::Return)])
    }

    /// Reads the returned register, if any.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        usize::from(self.source.is_some())
    }

    /// Assigns nothing.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        0
    }
}

impl fmt::Display for ReturnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(register) => write!(f, "{} v{register}", self.opcode.mnemonic()),
            None => f.write_str(self.opcode.mnemonic()),
        }
    }
}

pub(crate) fn build(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let source = if instruction.opcode == Opcode::ReturnVoid {
        None
    } else {
        Some(ctx.register(instruction, 0)?)
    };
    Ok(Op::Return(ReturnOp {
        address: instruction.address,
        opcode: instruction.opcode,
        source,
        return_type: Arc::from(ctx.method.reference.return_type.as_str()),
    }))
}
