//! Register moves and the pseudo-register reads `move-result*` and `move-exception`.

use std::fmt;

use crate::{
    assembly::{Instruction, Opcode},
    emulation::{
        opcode::{BuildContext, Op, OpChild, OpContext},
        EmulationError, ExecutionState,
    },
    Result,
};

/// `move`, `move-wide` and `move-object` in every width.
#[derive(Debug, Clone)]
pub struct MoveOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Destination register
    pub destination: u16,
    /// Source register
    pub source: u16,
}

impl MoveOp {
    /// Copies the source register, keeping its declared type.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let value = state.read_register(self.source)?;
        state.assign_register(self.destination, value);
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads the source.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        1
    }

    /// Assigns the destination.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        1
    }
}

impl fmt::Display for MoveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}, v{}",
            self.opcode.mnemonic(),
            self.destination,
            self.source
        )
    }
}

/// `move-result`, `move-result-wide` and `move-result-object`.
#[derive(Debug, Clone)]
pub struct MoveResultOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Destination register
    pub destination: u16,
}

impl MoveResultOp {
    /// Moves the pending invoke result into the destination.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InternalError`] if no invoke left a result.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let value = state.peek_result_register().cloned().ok_or_else(|| {
            EmulationError::InternalError {
                description: format!(
                    "{} at {:#06x} without a pending result",
                    self.opcode.mnemonic(),
                    self.address
                ),
            }
        })?;
        state.assign_register(self.destination, value);
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads no operand register.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        0
    }

    /// Assigns the destination.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        1
    }
}

impl fmt::Display for MoveResultOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.opcode.mnemonic(), self.destination)
    }
}

/// `move-exception`
#[derive(Debug, Clone)]
pub struct MoveExceptionOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Destination register
    pub destination: u16,
}

impl MoveExceptionOp {
    /// Moves the exception the handler was entered with.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InternalError`] outside of a handler.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let value = state
            .peek_exception()
            .cloned()
            .ok_or_else(|| EmulationError::InternalError {
                description: format!("move-exception at {:#06x} outside a handler", self.address),
            })?;
        state.assign_register(self.destination, value);
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads no operand register.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        0
    }

    /// Assigns the destination.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        1
    }
}

impl fmt::Display for MoveExceptionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "move-exception v{}", self.destination)
    }
}

pub(crate) fn build_move(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    Ok(Op::Move(MoveOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        destination: ctx.register(instruction, 0)?,
        source: ctx.register(instruction, 1)?,
    }))
}

pub(crate) fn build_move_result(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    Ok(Op::MoveResult(MoveResultOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        destination: ctx.register(instruction, 0)?,
    }))
}

pub(crate) fn build_move_exception(
    instruction: &Instruction,
    ctx: &BuildContext<'_>,
) -> Result<Op> {
    Ok(Op::MoveException(MoveExceptionOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        destination: ctx.register(instruction, 0)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emulation::Value,
        test::emulation::{context, services},
        Error,
    };

    #[test]
    fn move_copies_value_and_type() {
        let services = services(Vec::new());
        let op = MoveOp {
            address: 0,
            next: 1,
            opcode: Opcode::MoveWide,
            destination: 0,
            source: 2,
        };
        let mut state = ExecutionState::new(4);
        state.poke_register(2, Value::long(9));
        let children = op.execute(&mut state, &context(&services)).unwrap();
        assert!(matches!(children.as_slice(), [OpChild::Continue { address: 1 }]));
        assert_eq!(state.peek_register(0), Some(&Value::long(9)));
        assert_eq!(state.registers_read().len(), op.registers_read_count());
        assert_eq!(state.registers_assigned().len(), op.registers_assigned_count());
        assert_eq!(op.to_string(), "move-wide v0, v2");
    }

    #[test]
    fn move_result_requires_pending_result() {
        let services = services(Vec::new());
        let op = MoveResultOp {
            address: 4,
            next: 5,
            opcode: Opcode::MoveResult,
            destination: 0,
        };
        let mut state = ExecutionState::new(1);
        assert!(matches!(
            op.execute(&mut state, &context(&services)),
            Err(Error::Emulation(_))
        ));

        state.assign_result_register(Some(Value::unknown("I")));
        op.execute(&mut state, &context(&services)).unwrap();
        assert!(state.peek_register(0).is_some_and(Value::is_unknown));
        assert!(state.registers_read().is_empty());
    }

    #[test]
    fn move_exception_reads_handler_value() {
        let services = services(Vec::new());
        let op = MoveExceptionOp {
            address: 8,
            next: 9,
            destination: 1,
        };
        let mut state = ExecutionState::new(2);
        let exception = Value::string("boom").retyped("Ljava/lang/RuntimeException;");
        state.assign_exception(exception.clone());
        op.execute(&mut state, &context(&services)).unwrap();
        assert_eq!(state.peek_register(1), Some(&exception));
    }
}
