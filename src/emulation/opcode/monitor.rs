//! `monitor-enter` and `monitor-exit`.
//!
//! Exploration is single-threaded per path, so monitors have no effect on state. Neither
//! op reads its register; a null monitor object is not modeled.

use std::fmt;

use crate::{
    assembly::{Instruction, Opcode},
    emulation::{
        opcode::{BuildContext, Op, OpChild, OpContext},
        ExecutionState,
    },
    Result,
};

/// Which monitor instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorKind {
    /// `monitor-enter`
    Enter,
    /// `monitor-exit`
    Exit,
}

/// A monitor instruction.
#[derive(Debug, Clone)]
pub struct MonitorOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Enter or exit
    pub kind: MonitorKind,
    /// Monitor object register, display only
    pub register: u16,
}

impl MonitorOp {
    /// Continues with the next instruction.
    pub fn execute(
        &self,
        _state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads nothing.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        0
    }

    /// Assigns nothing.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        0
    }
}

impl fmt::Display for MonitorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            MonitorKind::Enter => "monitor-enter",
            MonitorKind::Exit => "monitor-exit",
        };
        write!(f, "{name} v{}", self.register)
    }
}

pub(crate) fn build(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let kind = if instruction.opcode == Opcode::MonitorEnter {
        MonitorKind::Enter
    } else {
        MonitorKind::Exit
    };
    Ok(Op::Monitor(MonitorOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        kind,
        register: ctx.register(instruction, 0)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::MethodAssembler,
        test::emulation::{compile, context, services},
    };

    #[test]
    fn monitors_touch_no_registers() {
        let mut asm = MethodAssembler::new(4);
        asm.monitor_enter(3)
            .unwrap()
            .monitor_exit(3)
            .unwrap()
            .return_void()
            .unwrap();
        let services = services(Vec::new());
        let program = compile(&services, "LFoo;->f()V", asm.finish().unwrap());

        let mut state = ExecutionState::new(4);
        for address in [0, 1] {
            let op = program.op(address).unwrap();
            let children = op.execute(&mut state, &context(&services)).unwrap();
            assert!(matches!(children.as_slice(), [OpChild::Continue { .. }]));
            assert_eq!(op.registers_read_count(), 0);
            assert_eq!(op.registers_assigned_count(), 0);
        }
        assert!(state.registers_read().is_empty());
        assert!(state.registers_assigned().is_empty());
        assert_eq!(program.op(1).unwrap().to_string(), "monitor-exit v3");
    }
}
