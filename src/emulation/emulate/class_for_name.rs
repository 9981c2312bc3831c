//! `Class.forName`.
//!
//! Safe classes are resolved by the platform loader. Everything else goes through the
//! sandbox, which only knows the analyzed program's own classes; a local class that has
//! not been initialized on this path is initialized first and the call re-executed, so
//! the class object returned afterwards always reflects modeled static state.

use log::debug;

use crate::{
    emulation::{
        emulate::{EmulatedMethodCall, Invocation},
        modeled_exception,
        opcode::{OpChild, OpContext, SyntheticStep},
        EmulationError, ExecutionState, Value,
    },
    metadata::{binary_to_internal, types},
    Result,
};

/// Handler for both `forName` overloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassForName {
    initialize_flag: Option<usize>,
}

impl ClassForName {
    /// `forName(String)`, which always initializes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `forName(String, boolean, ClassLoader)`; argument `ordinal` is the `initialize`
    /// flag. Only a known `false` skips initialization.
    #[must_use]
    pub fn with_initialize_flag(ordinal: usize) -> Self {
        ClassForName {
            initialize_flag: Some(ordinal),
        }
    }

    fn initializes(&self, call: &Invocation<'_>) -> bool {
        match self.initialize_flag {
            Some(ordinal) => call
                .parameter(ordinal)
                .and_then(Value::as_i64)
                .map_or(true, |flag| flag != 0),
            None => true,
        }
    }
}

impl EmulatedMethodCall for ClassForName {
    fn execute(
        &self,
        state: &mut ExecutionState,
        call: &Invocation<'_>,
        ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let Some(name) = call.parameter(0) else {
            return Err(EmulationError::InternalError {
                description: format!("{} called without a class name", call.method),
            }
            .into());
        };
        if name.is_unknown() {
            debug!("forName with unknown name at {:#06x}", call.address);
            return Ok(call.finish(state, Some(Value::unknown(types::CLASS))));
        }
        if name.raw().is_some_and(|raw| raw.is_null()) {
            return Ok(call.throw(modeled_exception::NULL_POINTER, None));
        }
        let Some(binary_name) = name.as_str() else {
            return Err(EmulationError::TypeMismatch {
                operation: "Class.forName",
                expected: types::STRING.to_string(),
                found: name.ty().to_string(),
            }
            .into());
        };

        let internal = binary_to_internal(binary_name);
        let services = ctx.services;
        if services.config().is_safe(&internal) {
            return Ok(match services.platform().load_class(binary_name) {
                Some(class) => {
                    debug!("forName({binary_name}) resolved by the platform");
                    call.finish(state, Some(Value::class(class)))
                }
                None => call.throw(modeled_exception::CLASS_NOT_FOUND, Some(binary_name)),
            });
        }

        let class = match services.sandbox().load_class(binary_name) {
            Ok(class) => class,
            Err(_) => {
                debug!("forName({binary_name}) is neither safe nor local");
                return Ok(call.throw(modeled_exception::CLASS_NOT_FOUND, Some(binary_name)));
            }
        };
        if self.initializes(call) && state.needs_initialization(&class.name) {
            debug!("forName({binary_name}) initializes {} first", class.name);
            return Ok(vec![OpChild::Redirect {
                step: SyntheticStep::StaticInit {
                    class: class.name.clone(),
                },
                resume: call.address,
            }]);
        }
        Ok(call.finish(state, Some(Value::class(class))))
    }
}
