//! `goto`, `goto/16` and `goto/32`.

use std::fmt;

use crate::{
    assembly::Instruction,
    emulation::{
        opcode::{BuildContext, Op, OpChild, OpContext},
        ExecutionState,
    },
    Result,
};

/// Unconditional jump.
#[derive(Debug, Clone)]
pub struct GotoOp {
    /// Own address
    pub address: u32,
    /// Jump target
    pub target: u32,
}

impl GotoOp {
    /// Continues at the target.
    pub fn execute(
        &self,
        _state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        Ok(vec![OpChild::next(self.target)])
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

impl fmt::Display for GotoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "goto :{:04x}", self.target)
    }
}

pub(crate) fn build(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    Ok(Op::Goto(GotoOp {
        address: instruction.address,
        target: ctx.target(instruction, instruction.branch_target())?,
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
    fn backward_goto_resolves_to_label() {
        let mut asm = MethodAssembler::new(1);
        asm.label("top")
            .unwrap()
            .nop()
            .unwrap()
            .goto("top")
            .unwrap();
        let services = services(Vec::new());
        let program = compile(&services, "LFoo;->spin()V", asm.finish().unwrap());
        let op = program.op(1).unwrap();
        let mut state = ExecutionState::new(1);
        let children = op.execute(&mut state, &context(&services)).unwrap();
        assert!(matches!(children.as_slice(), [OpChild::Continue { address: 0 }]));
        assert_eq!(op.to_string(), "goto :0000");
    }
}
