//! Building ops from instruction records.
//!
//! An [`OpFactory`] turns one [`Instruction`] into one [`Op`]. The [`OpFactoryRegistry`]
//! maps every supported [`Opcode`] to its factory; [`OpFactoryRegistry::with_defaults`]
//! registers the built-in ones and callers may register more, or replace them, before
//! handing the registry to a [`VirtualMachine`](crate::emulation::VirtualMachine).
//!
//! An [`OpProgram`] is the compiled form of a whole method body.

use std::{collections::BTreeMap, fmt, sync::Arc};

use rustc_hash::FxHashMap;
use strum::IntoEnumIterator;

use crate::{
    assembly::{Instruction, MethodImplementation, Opcode, Reference},
    emulation::{
        opcode::{branch, cmp, constant, field, goto, invoke, math, monitor, moves, ret, throw, Op},
        EmulationError, VmServices,
    },
    metadata::{FieldRef, MethodRef, VirtualMethod},
    Result,
};

/// Builds one op from one instruction.
pub type OpFactory = fn(&Instruction, &BuildContext<'_>) -> Result<Op>;

/// Everything a factory may consult besides the instruction itself.
pub struct BuildContext<'a> {
    /// The method being compiled
    pub method: &'a VirtualMethod,
    /// Address to instruction index of the method body
    pub address_map: &'a BTreeMap<u32, usize>,
    /// Class repository, configuration and emulated calls
    pub services: &'a VmServices,
}

impl BuildContext<'_> {
    /// Validates that `target` starts an instruction of this method.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InvalidBranchTarget`] otherwise.
    pub fn target(&self, instruction: &Instruction, target: Option<u32>) -> Result<u32> {
        match target {
            Some(address) if self.address_map.contains_key(&address) => Ok(address),
            other => Err(EmulationError::InvalidBranchTarget {
                address: instruction.address,
                target: other.map_or(-1, i64::from),
            }
            .into()),
        }
    }

    /// Address of the next instruction, which must exist.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InvalidBranchTarget`] if execution would fall off the end
    /// of the method.
    pub fn fall_through(&self, instruction: &Instruction) -> Result<u32> {
        self.target(instruction, Some(instruction.next_address()))
    }

    /// Register operand `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the instruction has fewer registers.
    pub fn register(&self, instruction: &Instruction, index: usize) -> Result<u16> {
        instruction.register(index).ok_or_else(|| {
            malformed_error!(
                "{} at {:#06x} lacks register operand {}",
                instruction.opcode.mnemonic(),
                instruction.address,
                index
            )
        })
    }

    /// Literal operand.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the instruction has none.
    pub fn literal(&self, instruction: &Instruction) -> Result<i64> {
        instruction.literal.ok_or_else(|| {
            malformed_error!(
                "{} at {:#06x} lacks its literal",
                instruction.opcode.mnemonic(),
                instruction.address
            )
        })
    }

    /// Field reference operand.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InvalidOperand`] if the reference is missing or of
    /// another kind.
    pub fn field_reference<'i>(&self, instruction: &'i Instruction) -> Result<&'i FieldRef> {
        match &instruction.reference {
            Some(Reference::Field(field)) => Ok(field),
            _ => Err(EmulationError::InvalidOperand {
                instruction: instruction.opcode.mnemonic(),
                expected: "field reference",
            }
            .into()),
        }
    }

    /// Method reference operand.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InvalidOperand`] if the reference is missing or of
    /// another kind.
    pub fn method_reference<'i>(&self, instruction: &'i Instruction) -> Result<&'i MethodRef> {
        match &instruction.reference {
            Some(Reference::Method(method)) => Ok(method),
            _ => Err(EmulationError::InvalidOperand {
                instruction: instruction.opcode.mnemonic(),
                expected: "method reference",
            }
            .into()),
        }
    }
}

/// Maps opcodes to their factories.
#[derive(Clone, Default)]
pub struct OpFactoryRegistry {
    factories: FxHashMap<Opcode, OpFactory>,
}

impl fmt::Debug for OpFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpFactoryRegistry")
            .field("opcodes", &self.factories.len())
            .finish()
    }
}

impl OpFactoryRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a factory for every opcode in [`Opcode`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for opcode in Opcode::iter() {
            let factory: OpFactory = match opcode {
                Opcode::Nop => constant::build_nop,
                Opcode::Const4
                | Opcode::Const16
                | Opcode::Const
                | Opcode::ConstHigh16
                | Opcode::ConstWide16
                | Opcode::ConstWide32
                | Opcode::ConstWide
                | Opcode::ConstWideHigh16
                | Opcode::ConstString
                | Opcode::ConstStringJumbo
                | Opcode::ConstClass => constant::build,
                Opcode::Move
                | Opcode::MoveFrom16
                | Opcode::Move16
                | Opcode::MoveWide
                | Opcode::MoveWideFrom16
                | Opcode::MoveWide16
                | Opcode::MoveObject
                | Opcode::MoveObjectFrom16
                | Opcode::MoveObject16 => moves::build_move,
                Opcode::MoveResult | Opcode::MoveResultWide | Opcode::MoveResultObject => {
                    moves::build_move_result
                }
                Opcode::MoveException => moves::build_move_exception,
                Opcode::ReturnVoid | Opcode::Return | Opcode::ReturnWide | Opcode::ReturnObject => {
                    ret::build
                }
                Opcode::Goto | Opcode::Goto16 | Opcode::Goto32 => goto::build,
                Opcode::IfEq
                | Opcode::IfNe
                | Opcode::IfLt
                | Opcode::IfGe
                | Opcode::IfGt
                | Opcode::IfLe => branch::build_if_test,
                Opcode::IfEqz
                | Opcode::IfNez
                | Opcode::IfLtz
                | Opcode::IfGez
                | Opcode::IfGtz
                | Opcode::IfLez => branch::build_if_test_zero,
                Opcode::PackedSwitch | Opcode::SparseSwitch => branch::build_switch,
                Opcode::CmplFloat
                | Opcode::CmpgFloat
                | Opcode::CmplDouble
                | Opcode::CmpgDouble
                | Opcode::CmpLong => cmp::build,
                Opcode::MonitorEnter | Opcode::MonitorExit => monitor::build,
                Opcode::Throw => throw::build,
                op if op.is_invoke() => invoke::build,
                op if op.is_unary() => math::build_unary,
                op if math::BinaryOperator::of(op).is_some() => math::build_binary,
                op if op.mnemonic().starts_with("sget") => field::build_get,
                op if op.mnemonic().starts_with("sput") => field::build_put,
                _ => continue,
            };
            registry.register(opcode, factory);
        }
        registry
    }

    /// Registers or replaces the factory of one opcode.
    pub fn register(&mut self, opcode: Opcode, factory: OpFactory) {
        self.factories.insert(opcode, factory);
    }

    /// Returns `true` if the opcode has a factory.
    #[must_use]
    pub fn supports(&self, opcode: Opcode) -> bool {
        self.factories.contains_key(&opcode)
    }

    /// Builds the op for one instruction.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::UnsupportedOpcode`] if no factory is registered, or
    /// whatever the factory reports.
    pub fn build(&self, instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
        let factory = self.factories.get(&instruction.opcode).ok_or(
            EmulationError::UnsupportedOpcode {
                mnemonic: instruction.opcode.mnemonic(),
            },
        )?;
        factory(instruction, ctx)
    }
}

/// The compiled ops of one method body, keyed by address.
#[derive(Debug)]
pub struct OpProgram {
    method: Arc<VirtualMethod>,
    implementation: Arc<MethodImplementation>,
    ops: BTreeMap<u32, Op>,
}

impl OpProgram {
    /// Compiles every instruction of `method`.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::MissingImplementation`] for methods without a body, and the
    /// first build error of any instruction otherwise.
    pub fn compile(
        method: &Arc<VirtualMethod>,
        factories: &OpFactoryRegistry,
        services: &VmServices,
    ) -> Result<Self> {
        let implementation = method.implementation.clone().ok_or_else(|| {
            EmulationError::MissingImplementation {
                method: method.signature(),
            }
        })?;
        let address_map = implementation.address_map();
        let ctx = BuildContext {
            method,
            address_map: &address_map,
            services,
        };

        let mut ops = BTreeMap::new();
        for instruction in &implementation.instructions {
            ops.insert(instruction.address, factories.build(instruction, &ctx)?);
        }
        if ops.is_empty() {
            return Err(EmulationError::MissingImplementation {
                method: method.signature(),
            }
            .into());
        }

        Ok(OpProgram {
            method: method.clone(),
            implementation,
            ops,
        })
    }

    /// The compiled method.
    #[must_use]
    pub fn method(&self) -> &Arc<VirtualMethod> {
        &self.method
    }

    /// The method body.
    #[must_use]
    pub fn implementation(&self) -> &MethodImplementation {
        &self.implementation
    }

    /// The op at `address`.
    #[must_use]
    pub fn op(&self, address: u32) -> Option<&Op> {
        self.ops.get(&address)
    }

    /// Address of the first op.
    #[must_use]
    pub fn entry(&self) -> u32 {
        self.ops.keys().next().copied().unwrap_or_default()
    }

    /// Every op address in order.
    pub fn addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.ops.keys().copied()
    }

    /// Number of ops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` for an empty program; compiled programs never are.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{MethodAssembler, Opcode},
        test::emulation::{services, static_method},
        Error,
    };
    use strum::IntoEnumIterator;

    #[test]
    fn defaults_cover_every_opcode() {
        let registry = OpFactoryRegistry::with_defaults();
        for opcode in Opcode::iter() {
            assert!(registry.supports(opcode), "{}", opcode.mnemonic());
        }
    }

    #[test]
    fn empty_registry_rejects_opcodes() {
        let mut asm = MethodAssembler::new(1);
        asm.return_void().unwrap();
        let method = static_method("LFoo;->f()V", asm.finish().unwrap());
        let services = services(Vec::new());
        let err = OpProgram::compile(&method, &OpFactoryRegistry::new(), &services).unwrap_err();
        match err {
            Error::Emulation(e) => assert_eq!(
                *e,
                EmulationError::UnsupportedOpcode {
                    mnemonic: "return-void"
                }
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn falling_off_the_end_is_rejected_at_build_time() {
        let mut asm = MethodAssembler::new(1);
        asm.const_int(0, 1).unwrap();
        let method = static_method("LFoo;->f()V", asm.finish().unwrap());
        let services = services(Vec::new());
        let err = OpProgram::compile(&method, &OpFactoryRegistry::with_defaults(), &services)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Emulation(e)
                if matches!(*e, EmulationError::InvalidBranchTarget { address: 0, target: 1 })
        ));
    }

    #[test]
    fn compiled_program_indexes_ops_by_address() {
        let mut asm = MethodAssembler::new(1);
        asm.const_int(0, 300).unwrap().return_void().unwrap();
        let method = static_method("LFoo;->f()V", asm.finish().unwrap());
        let services = services(Vec::new());
        let program =
            OpProgram::compile(&method, &OpFactoryRegistry::with_defaults(), &services).unwrap();
        assert_eq!(program.addresses().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(program.entry(), 0);
        assert_eq!(program.op(2).map(|op| op.to_string()), Some("return-void".to_string()));
    }
}
