//! `nop` and the `const*` family.

use std::fmt;

use crate::{
    assembly::{Instruction, Opcode, Reference},
    emulation::{
        opcode::{BuildContext, Op, OpChild, OpContext},
        ClassObject, ClassOrigin, EmulationError, ExecutionState, Value,
    },
    Result,
};

/// `nop`
#[derive(Debug, Clone)]
pub struct NopOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
}

impl NopOp {
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

impl fmt::Display for NopOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("nop")
    }
}

/// Every `const*` form; the loaded value is resolved when the op is built.
#[derive(Debug, Clone)]
pub struct ConstOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Destination register
    pub destination: u16,
    /// The constant
    pub value: Value,
}

impl ConstOp {
    /// Assigns the constant.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        state.assign_register(self.destination, self.value.clone());
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads nothing.
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

impl fmt::Display for ConstOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}, {}", self.opcode.mnemonic(), self.destination, self.value)
    }
}

pub(crate) fn build_nop(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    Ok(Op::Nop(NopOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
    }))
}

pub(crate) fn build(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let destination = ctx.register(instruction, 0)?;
    let value = match instruction.opcode {
        Opcode::Const4 | Opcode::Const16 | Opcode::Const | Opcode::ConstHigh16 => {
            Value::int(ctx.literal(instruction)? as i32)
        }
        Opcode::ConstWide16 | Opcode::ConstWide32 | Opcode::ConstWide | Opcode::ConstWideHigh16 => {
            Value::long(ctx.literal(instruction)?)
        }
        Opcode::ConstString | Opcode::ConstStringJumbo => match &instruction.reference {
            Some(Reference::String(s)) => Value::string(s),
            _ => {
                return Err(EmulationError::InvalidOperand {
                    instruction: instruction.opcode.mnemonic(),
                    expected: "string reference",
                }
                .into())
            }
        },
        Opcode::ConstClass => match &instruction.reference {
            Some(Reference::Type(descriptor)) => {
                // const-class never triggers initialization
                let origin = if ctx.services.classes().is_local_class(descriptor) {
                    ClassOrigin::Sandbox
                } else {
                    ClassOrigin::Platform
                };
                Value::class(ClassObject::new(descriptor.as_str(), origin))
            }
            _ => {
                return Err(EmulationError::InvalidOperand {
                    instruction: instruction.opcode.mnemonic(),
                    expected: "type reference",
                }
                .into())
            }
        },
        other => {
            return Err(EmulationError::UnsupportedOpcode {
                mnemonic: other.mnemonic(),
            }
            .into())
        }
    };

    Ok(Op::Const(ConstOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        destination,
        value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::MethodAssembler,
        emulation::RawValue,
        metadata::VirtualClass,
        test::emulation::{compile, context, services},
    };

    #[test]
    fn constants_assign_typed_values() {
        let mut asm = MethodAssembler::new(4);
        asm.const_int(0, 70_000)
            .unwrap()
            .const_wide(1, -5)
            .unwrap()
            .const_string(3, "hi")
            .unwrap()
            .return_void()
            .unwrap();
        let services = services(Vec::new());
        let program = compile(&services, "LFoo;->f()V", asm.finish().unwrap());
        let ctx = context(&services);

        let mut state = ExecutionState::new(4);
        let mut address = program.entry();
        for _ in 0..3 {
            let op = program.op(address).unwrap();
            let children = op.execute(&mut state, &ctx).unwrap();
            assert_eq!(state.registers_assigned().len(), op.registers_assigned_count());
            assert_eq!(state.registers_read().len(), op.registers_read_count());
            state = state.derive_child();
            address = match children.as_slice() {
                [OpChild::Continue { address }] => *address,
                other => panic!("unexpected {other:?}"),
            };
        }

        assert_eq!(state.peek_register(0), Some(&Value::int(70_000)));
        assert_eq!(state.peek_register(1), Some(&Value::long(-5)));
        assert_eq!(state.peek_register(3).and_then(Value::as_str), Some("hi"));
    }

    #[test]
    fn const_class_resolves_origin_without_initializing() {
        let mut asm = MethodAssembler::new(2);
        asm.const_class(0, "LLocal;")
            .unwrap()
            .const_class(1, "Ljava/lang/String;")
            .unwrap()
            .return_void()
            .unwrap();
        let services = services(vec![VirtualClass::new("LLocal;")]);
        let program = compile(&services, "LFoo;->f()V", asm.finish().unwrap());
        let ctx = context(&services);

        let mut state = ExecutionState::new(2);
        program.op(0).unwrap().execute(&mut state, &ctx).unwrap();
        program.op(2).unwrap().execute(&mut state, &ctx).unwrap();

        let local = state.peek_register(0).and_then(Value::as_class).unwrap();
        assert_eq!(local.origin, ClassOrigin::Sandbox);
        let platform = state.peek_register(1).and_then(Value::as_class).unwrap();
        assert_eq!(platform.origin, ClassOrigin::Platform);
        assert!(state.needs_initialization("LLocal;"));
    }

    #[test]
    fn float_constants_keep_their_bits() {
        let mut asm = MethodAssembler::new(1);
        asm.const_float(0, 1.5).unwrap().return_void().unwrap();
        let services = services(Vec::new());
        let program = compile(&services, "LFoo;->f()V", asm.finish().unwrap());
        let mut state = ExecutionState::new(1);
        program.op(0).unwrap().execute(&mut state, &context(&services)).unwrap();
        let v = state.peek_register(0).unwrap();
        assert_eq!(v.raw(), Some(&RawValue::Int(1.5f32.to_bits() as i32)));
        assert_eq!(v.as_f32(), Some(1.5));
    }
}
