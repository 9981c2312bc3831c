//! `invoke-*` and `invoke-*/range`.
//!
//! Targets are resolved statically when the op is built, in this order:
//!
//! 1. an emulated handler registered for the exact signature,
//! 2. a method with a body found in the class repository (the referenced class or one of
//!    its local superclasses), which the driver explores as a nested graph,
//! 3. anything else: the call is opaque and its result is an unknown of the declared
//!    return type.
//!
//! A static call into a local class first runs the class's static initializer on the
//! path, like `sget`/`sput`.

use std::{fmt, sync::Arc};

use crate::{
    assembly::{Instruction, Opcode},
    emulation::{
        emulate::{EmulatedMethodCall, Invocation},
        opcode::{BuildContext, Op, OpChild, OpContext, SyntheticStep},
        ExecutionState, Value,
    },
    metadata::{is_wide, MethodRef, VirtualMethod},
    Result,
};

/// A method invocation.
#[derive(Debug, Clone)]
pub struct InvokeOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// The referenced method
    pub method: MethodRef,
    /// First register of every argument, receiver first; high halves of wide arguments
    /// are skipped
    pub arguments: Vec<u16>,
    /// Local target with a body
    pub target: Option<Arc<VirtualMethod>>,
    /// Local class to initialize before a static call
    pub initialize: Option<Arc<str>>,
    /// Handler substituting modeled semantics
    pub emulated: Option<Arc<dyn EmulatedMethodCall>>,
}

impl InvokeOp {
    /// Calls the emulated handler, redirects into the local target, or assigns an
    /// unknown result.
    pub fn execute(&self, state: &mut ExecutionState, ctx: &OpContext<'_>) -> Result<Vec<OpChild>> {
        if let Some(class) = &self.initialize {
            if state.needs_initialization(class) {
                return Ok(vec![OpChild::Redirect {
                    step: SyntheticStep::StaticInit {
                        class: class.clone(),
                    },
                    resume: self.address,
                }]);
            }
        }

        let mut arguments = Vec::with_capacity(self.arguments.len());
        for register in &self.arguments {
            arguments.push(state.read_register(*register)?);
        }

        if let Some(handler) = &self.emulated {
            let call = Invocation {
                method: &self.method,
                arguments: &arguments,
                address: self.address,
                resume: self.next,
            };
            return handler.execute(state, &call, ctx);
        }

        if let Some(target) = &self.target {
            return Ok(vec![OpChild::Redirect {
                step: SyntheticStep::Invoke {
                    method: target.clone(),
                    arguments,
                },
                resume: self.next,
            }]);
        }

        let result =
            (!self.method.is_void()).then(|| Value::unknown(self.method.return_type.as_str()));
        state.assign_result_register(result);
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads one register per argument.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        self.arguments.len()
    }

    /// Assigns no operand register; the result goes to the result pseudo-register.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        0
    }
}

impl fmt::Display for InvokeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.opcode.mnemonic())?;
        for (i, register) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "v{register}")?;
        }
        write!(f, "}}, {}", self.method)
    }
}

pub(crate) fn build(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let method = ctx.method_reference(instruction)?.clone();
    let is_static = instruction.opcode.is_static_invoke();
    let expected = method.argument_register_count(is_static);
    if instruction.registers.len() != expected {
        return Err(malformed_error!(
            "{} at {:#06x} passes {} registers to {} which takes {}",
            instruction.opcode.mnemonic(),
            instruction.address,
            instruction.registers.len(),
            method,
            expected
        ));
    }

    let mut arguments = Vec::with_capacity(method.parameters.len() + 1);
    let mut index = 0;
    if !is_static {
        arguments.push(ctx.register(instruction, 0)?);
        index = 1;
    }
    for parameter in &method.parameters {
        arguments.push(ctx.register(instruction, index)?);
        index += if is_wide(parameter) { 2 } else { 1 };
    }

    let classes = ctx.services.classes();
    let emulated = ctx.services.emulated().get(&method.signature());
    let target = classes
        .get_method(&method.class, &method.descriptor())
        .ok()
        .filter(|m| m.implementation.is_some());
    let initialize = if is_static && classes.is_local_class(&method.class) {
        let declaring = target
            .as_ref()
            .map_or(method.class.as_str(), |t| t.reference.class.as_str());
        Some(Arc::from(declaring))
    } else {
        None
    };

    Ok(Op::Invoke(InvokeOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        method,
        arguments,
        target,
        initialize,
        emulated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::MethodAssembler,
        emulation::ClassInitLevel,
        metadata::{AccessFlags, VirtualClass},
        test::emulation::{compile, context, services},
        Error,
    };

    fn helper_class() -> VirtualClass {
        let mut asm = MethodAssembler::new(2);
        asm.return_value(Opcode::Return, 1).unwrap();
        VirtualClass::new("LHelper;").with_method(
            VirtualMethod::new(MethodRef::parse("LHelper;->id(I)I").unwrap(), AccessFlags::STATIC)
                .with_implementation(asm.finish().unwrap()),
        )
    }

    #[test]
    fn wide_arguments_skip_high_half() {
        let mut asm = MethodAssembler::new(5);
        asm.invoke(Opcode::InvokeStatic, &[0, 1, 2, 3], "Ljava/lang/Math;->max(JJ)J")
            .unwrap()
            .return_void()
            .unwrap();
        let services = services(Vec::new());
        let program = compile(&services, "LFoo;->f()V", asm.finish().unwrap());
        let Some(Op::Invoke(op)) = program.op(0) else {
            panic!("not an invoke");
        };
        assert_eq!(op.arguments, vec![0, 2]);
        assert_eq!(op.to_string(), "invoke-static {v0, v2}, Ljava/lang/Math;->max(JJ)J");
    }

    #[test]
    fn register_count_must_match_prototype() {
        let mut asm = MethodAssembler::new(2);
        asm.invoke(Opcode::InvokeStatic, &[0], "Ljava/lang/Math;->max(II)I")
            .unwrap()
            .return_void()
            .unwrap();
        let body = asm.finish().unwrap();
        let services = services(Vec::new());
        let method = crate::test::emulation::static_method("LFoo;->f()V", body);
        let err = crate::emulation::OpProgram::compile(
            &method,
            &crate::emulation::OpFactoryRegistry::with_defaults(),
            &services,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[test]
    fn opaque_call_assigns_unknown_result() {
        let mut asm = MethodAssembler::new(2);
        asm.invoke(Opcode::InvokeStatic, &[0, 1], "Ljava/lang/Math;->max(II)I")
            .unwrap()
            .return_void()
            .unwrap();
        let services = services(Vec::new());
        let program = compile(&services, "LFoo;->f()V", asm.finish().unwrap());
        let mut state = ExecutionState::new(2);
        state.poke_register(0, Value::int(1));
        state.poke_register(1, Value::int(2));
        let children = program
            .op(0)
            .unwrap()
            .execute(&mut state, &context(&services))
            .unwrap();
        assert!(matches!(children.as_slice(), [OpChild::Continue { address: 3 }]));
        let result = state.peek_result_register().unwrap();
        assert!(result.is_unknown());
        assert_eq!(result.ty(), "I");
        assert_eq!(state.registers_read().len(), 2);
    }

    #[test]
    fn local_static_call_initializes_then_redirects() {
        let mut asm = MethodAssembler::new(1);
        asm.invoke(Opcode::InvokeStatic, &[0], "LHelper;->id(I)I")
            .unwrap()
            .return_void()
            .unwrap();
        let services = services(vec![helper_class()]);
        let program = compile(&services, "LFoo;->f()V", asm.finish().unwrap());
        let op = program.op(0).unwrap();
        let ctx = context(&services);

        let mut state = ExecutionState::new(1);
        state.poke_register(0, Value::int(4));
        let children = op.execute(&mut state, &ctx).unwrap();
        assert!(matches!(
            children.as_slice(),
            [OpChild::Redirect {
                step: SyntheticStep::StaticInit { class },
                resume: 0,
            }] if &**class == "LHelper;"
        ));

        state.set_class_init_level("LHelper;", ClassInitLevel::Initialized);
        let children = op.execute(&mut state, &ctx).unwrap();
        match children.as_slice() {
            [OpChild::Redirect {
                step: SyntheticStep::Invoke { method, arguments },
                resume: 3,
            }] => {
                assert_eq!(method.signature(), "LHelper;->id(I)I");
                assert_eq!(arguments, &vec![Value::int(4)]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
