//! `Object.getClass` and `Class.getName`.

use crate::{
    emulation::{
        emulate::{EmulatedMethodCall, Invocation},
        modeled_exception,
        opcode::{OpChild, OpContext},
        ClassObject, ClassOrigin, ExecutionState, RawValue, Value,
    },
    metadata::types,
    Result,
};

/// `Object.getClass()` on a known receiver.
///
/// The class of a known value is its runtime class where the payload pins it down
/// (strings, class objects, exceptions) and its declared type otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectGetClass;

impl EmulatedMethodCall for ObjectGetClass {
    fn execute(
        &self,
        state: &mut ExecutionState,
        call: &Invocation<'_>,
        ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let Some(receiver) = call.parameter(0) else {
            return Ok(call.finish(state, Some(Value::unknown(types::CLASS))));
        };
        let name = match receiver.raw() {
            None => return Ok(call.finish(state, Some(Value::unknown(types::CLASS)))),
            Some(RawValue::Null) => return Ok(call.throw(modeled_exception::NULL_POINTER, None)),
            Some(RawValue::String(_)) => types::STRING.to_string(),
            Some(RawValue::Class(_)) => types::CLASS.to_string(),
            Some(RawValue::Throwable(t)) => t.class_name.to_string(),
            Some(_) => receiver.ty().to_string(),
        };
        let origin = if ctx.services.classes().is_local_class(&name) {
            ClassOrigin::Sandbox
        } else {
            ClassOrigin::Platform
        };
        Ok(call.finish(state, Some(Value::class(ClassObject::new(name, origin)))))
    }
}

/// `Class.getName()` on a known class object.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassGetName;

impl EmulatedMethodCall for ClassGetName {
    fn execute(
        &self,
        state: &mut ExecutionState,
        call: &Invocation<'_>,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let receiver = call.parameter(0);
        if receiver.and_then(Value::raw).is_some_and(RawValue::is_null) {
            return Ok(call.throw(modeled_exception::NULL_POINTER, None));
        }
        let name = match receiver.and_then(Value::as_class) {
            Some(class) => Value::string(&class.binary_name()),
            None => Value::unknown(types::STRING),
        };
        Ok(call.finish(state, Some(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emulation::{opcode::Termination, ThrownException},
        metadata::{MethodRef, VirtualClass},
        test::emulation::{context, services},
    };

    fn call_with(
        handler: &dyn EmulatedMethodCall,
        signature: &str,
        receiver: Value,
        locals: Vec<VirtualClass>,
    ) -> (Vec<OpChild>, ExecutionState) {
        let services = services(locals);
        let method = MethodRef::parse(signature).unwrap();
        let arguments = [receiver];
        let call = Invocation {
            method: &method,
            arguments: &arguments,
            address: 0,
            resume: 3,
        };
        let mut state = ExecutionState::new(1);
        let children = handler.execute(&mut state, &call, &context(&services)).unwrap();
        (children, state)
    }

    const GET_CLASS: &str = "Ljava/lang/Object;->getClass()Ljava/lang/Class;";
    const GET_NAME: &str = "Ljava/lang/Class;->getName()Ljava/lang/String;";

    #[test]
    fn get_class_uses_runtime_class() {
        let (_, state) = call_with(&ObjectGetClass, GET_CLASS, Value::string("x"), Vec::new());
        let class = state.peek_result_register().and_then(Value::as_class).unwrap();
        assert_eq!(&*class.name, types::STRING);

        let oops = Value::throwable(ThrownException::new("Lcom/example/Oops;", None));
        let (_, state) = call_with(
            &ObjectGetClass,
            GET_CLASS,
            oops,
            vec![VirtualClass::new("Lcom/example/Oops;")],
        );
        let class = state.peek_result_register().and_then(Value::as_class).unwrap();
        assert_eq!(class.origin, ClassOrigin::Sandbox);
    }

    #[test]
    fn get_class_on_null_throws() {
        let (children, _) =
            call_with(&ObjectGetClass, GET_CLASS, Value::null(types::OBJECT), Vec::new());
        assert!(matches!(
            children.as_slice(),
            [OpChild::Terminal(Termination::Throw(v))] if v.ty() == modeled_exception::NULL_POINTER
        ));
    }

    #[test]
    fn get_name_returns_binary_name() {
        let class = Value::class(ClassObject::new("Lcom/example/Main;", ClassOrigin::Sandbox));
        let (children, state) = call_with(&ClassGetName, GET_NAME, class, Vec::new());
        assert!(matches!(children.as_slice(), [OpChild::Continue { address: 3 }]));
        assert_eq!(
            state.peek_result_register().and_then(Value::as_str),
            Some("com.example.Main")
        );

        let (_, state) = call_with(
            &ClassGetName,
            GET_NAME,
            Value::unknown(types::CLASS),
            Vec::new(),
        );
        assert!(state.peek_result_register().unwrap().is_unknown());
    }
}
