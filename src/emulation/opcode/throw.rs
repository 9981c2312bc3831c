//! `throw`

use std::fmt;

use crate::{
    assembly::Instruction,
    emulation::{
        modeled_exception,
        opcode::{BuildContext, Op, OpChild, OpContext},
        ExecutionState, ThrownException, Value,
    },
    Result,
};

/// Raises the exception held in a register.
#[derive(Debug, Clone)]
pub struct ThrowOp {
    /// Own address
    pub address: u32,
    /// Exception register
    pub register: u16,
}

impl ThrowOp {
    /// Ends the path with the register's value; `null` raises a `NullPointerException`.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let value = state.read_register(self.register)?;
        if value.raw().is_some_and(|raw| raw.is_null()) {
            return Ok(vec![OpChild::throw(Value::throwable(ThrownException::new(
                modeled_exception::NULL_POINTER,
                None,
            )))]);
        }
        Ok(vec![OpChild::throw(value)])
    }

    /// Reads the exception register.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        1
    }

    /// Assigns nothing.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        0
    }
}

impl fmt::Display for ThrowOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "throw v{}", self.register)
    }
}

pub(crate) fn build(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    Ok(Op::Throw(ThrowOp {
        address: instruction.address,
        register: ctx.register(instruction, 0)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emulation::opcode::Termination,
        test::emulation::{context, services},
    };

    fn thrown(children: Vec<OpChild>) -> Value {
        match children.as_slice() {
            [OpChild::Terminal(Termination::Throw(v))] => v.clone(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn throws_register_value() {
        let services = services(Vec::new());
        let op = ThrowOp {
            address: 0,
            register: 0,
        };
        let exception = Value::throwable(ThrownException::new(
            "Ljava/lang/IllegalStateException;",
            None,
        ));
        let mut state = ExecutionState::new(1);
        state.poke_register(0, exception.clone());
        assert_eq!(thrown(op.execute(&mut state, &context(&services)).unwrap()), exception);
    }

    #[test]
    fn null_throws_null_pointer_exception() {
        let services = services(Vec::new());
        let op = ThrowOp {
            address: 0,
            register: 0,
        };
        let mut state = ExecutionState::new(1);
        state.poke_register(0, Value::null("Ljava/lang/Throwable;"));
        let value = thrown(op.execute(&mut state, &context(&services)).unwrap());
        assert_eq!(value.ty(), modeled_exception::NULL_POINTER);
    }
}
