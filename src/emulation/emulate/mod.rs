//! Method-call emulation.
//!
//! Calls into the platform standard library cannot be executed: the engine has no
//! platform code, and running real reflection or class loading against the analyzed
//! program would be unsafe. An [`EmulatedMethodCall`] substitutes modeled semantics for
//! one such method. It runs in place of the invoke op's normal handling and answers with
//! the same successor contract as any op, restricted to three shapes:
//!
//! - complete normally, see [`Invocation::finish`],
//! - redirect to a synthetic continuation, e.g. run a static initializer and re-execute
//!   the call,
//! - end the path with a thrown value, see [`Invocation::throw`].
//!
//! # Built-in Handlers
//!
//! | Signature | Handler |
//! |-----------|---------|
//! | `Ljava/lang/Class;->forName(Ljava/lang/String;)Ljava/lang/Class;` | [`ClassForName`] |
//! | `Ljava/lang/Class;->forName(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;` | [`ClassForName`] |
//! | `Ljava/lang/Object;->getClass()Ljava/lang/Class;` | [`ObjectGetClass`] |
//! | `Ljava/lang/Class;->getName()Ljava/lang/String;` | [`ClassGetName`] |
//!
//! # Custom Handlers
//!
//! ```rust
//! use std::sync::Arc;
//! use smaliscope::emulation::{
//!     EmulatedCallRegistry, EmulatedMethodCall, ExecutionState, Invocation, OpChild, OpContext,
//!     Value,
//! };
//!
//! #[derive(Debug)]
//! struct CurrentTimeMillis;
//!
//! impl EmulatedMethodCall for CurrentTimeMillis {
//!     fn execute(
//!         &self,
//!         state: &mut ExecutionState,
//!         call: &Invocation<'_>,
//!         _ctx: &OpContext<'_>,
//!     ) -> smaliscope::Result<Vec<OpChild>> {
//!         Ok(call.finish(state, Some(Value::long(0))))
//!     }
//! }
//!
//! let mut registry = EmulatedCallRegistry::with_defaults();
//! registry.register("Ljava/lang/System;->currentTimeMillis()J", Arc::new(CurrentTimeMillis));
//! assert!(registry.get("Ljava/lang/System;->currentTimeMillis()J").is_some());
//! ```

mod class_for_name;
mod reflection;

use std::{fmt, sync::Arc};

use rustc_hash::FxHashMap;

use crate::{
    emulation::{
        opcode::{OpChild, OpContext},
        ExecutionState, ThrownException, Value,
    },
    metadata::MethodRef,
    Result,
};

pub use class_for_name::ClassForName;
pub use reflection::{ClassGetName, ObjectGetClass};

/// Modeled semantics of one platform method.
pub trait EmulatedMethodCall: Send + Sync + fmt::Debug {
    /// Emulates one call on the given path.
    ///
    /// # Errors
    ///
    /// Returns an error for internal faults only; failures of the emulated method are
    /// thrown values.
    fn execute(
        &self,
        state: &mut ExecutionState,
        call: &Invocation<'_>,
        ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>>;
}

/// One call site being emulated.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// The called method
    pub method: &'a MethodRef,
    /// Argument values, receiver first for instance methods
    pub arguments: &'a [Value],
    /// Address of the invoke instruction, where a redirect re-executes the call
    pub address: u32,
    /// Address following the invoke
    pub resume: u32,
}

impl Invocation<'_> {
    /// Argument `ordinal`, receiver first for instance methods.
    #[must_use]
    pub fn parameter(&self, ordinal: usize) -> Option<&Value> {
        self.arguments.get(ordinal)
    }

    /// Completes the call normally, leaving `value` for a following `move-result*`.
    ///
    /// The value is retyped to the declared return type; `None` is a `void` return.
    pub fn finish(&self, state: &mut ExecutionState, value: Option<Value>) -> Vec<OpChild> {
        let value = value.map(|v| v.retyped(self.method.return_type.as_str()));
        state.assign_result_register(value);
        vec![OpChild::next(self.resume)]
    }

    /// Ends the path with a modeled exception.
    #[must_use]
    pub fn throw(&self, class_name: &str, message: Option<&str>) -> Vec<OpChild> {
        vec![OpChild::throw(Value::throwable(ThrownException::new(
            class_name, message,
        )))]
    }
}

/// Emulated calls keyed by full method signature.
#[derive(Debug, Clone, Default)]
pub struct EmulatedCallRegistry {
    handlers: FxHashMap<String, Arc<dyn EmulatedMethodCall>>,
}

impl EmulatedCallRegistry {
    /// An empty registry; every platform call is opaque.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in handlers.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            "Ljava/lang/Class;->forName(Ljava/lang/String;)Ljava/lang/Class;",
            Arc::new(ClassForName::new()),
        );
        registry.register(
            "Ljava/lang/Class;->forName(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;",
            Arc::new(ClassForName::with_initialize_flag(1)),
        );
        registry.register(
            "Ljava/lang/Object;->getClass()Ljava/lang/Class;",
            Arc::new(ObjectGetClass),
        );
        registry.register(
            "Ljava/lang/Class;->getName()Ljava/lang/String;",
            Arc::new(ClassGetName),
        );
        registry
    }

    /// Registers or replaces the handler for a signature.
    pub fn register(&mut self, signature: impl Into<String>, handler: Arc<dyn EmulatedMethodCall>) {
        self.handlers.insert(signature.into(), handler);
    }

    /// The handler for a signature.
    #[must_use]
    pub fn get(&self, signature: &str) -> Option<Arc<dyn EmulatedMethodCall>> {
        self.handlers.get(signature).cloned()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulation::opcode::Termination;

    #[test]
    fn finish_retypes_and_resumes() {
        let method = MethodRef::parse("LFoo;->flag()Z").unwrap();
        let call = Invocation {
            method: &method,
            arguments: &[],
            address: 4,
            resume: 7,
        };
        let mut state = ExecutionState::new(1);
        let children = call.finish(&mut state, Some(Value::int(1)));
        assert!(matches!(children.as_slice(), [OpChild::Continue { address: 7 }]));
        assert_eq!(state.peek_result_register().map(Value::ty), Some("Z"));
    }

    #[test]
    fn throw_builds_modeled_exception() {
        let method = MethodRef::parse("LFoo;->f()V").unwrap();
        let call = Invocation {
            method: &method,
            arguments: &[],
            address: 0,
            resume: 3,
        };
        match call.throw("Ljava/lang/IllegalStateException;", Some("no")).as_slice() {
            [OpChild::Terminal(Termination::Throw(v))] => {
                assert_eq!(v.ty(), "Ljava/lang/IllegalStateException;");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn defaults_are_registered() {
        let registry = EmulatedCallRegistry::with_defaults();
        assert_eq!(registry.len(), 4);
        assert!(registry
            .get("Ljava/lang/Class;->forName(Ljava/lang/String;)Ljava/lang/Class;")
            .is_some());
        assert!(EmulatedCallRegistry::new().is_empty());
    }
}
