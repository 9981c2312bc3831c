//! Per-path execution state.
//!
//! An [`ExecutionState`] is the complete mutable snapshot one explored path carries:
//! the register file, the pseudo-registers for invoke results, caught exceptions and
//! return values, and the path's [`StaticState`]. Every execution node exclusively owns
//! one state; forking a path clones it with [`ExecutionState::derive_child`], which is
//! O(1) thanks to `imbl` structural sharing.
//!
//! The state also records which registers the most recent op read and assigned, so
//! tests can check an op against its declared register arity.

mod statics;

use std::{collections::BTreeSet, sync::Arc};

use imbl::HashMap as ImHashMap;

use crate::{
    emulation::{EmulationError, Value},
    metadata::{is_wide, VirtualMethod},
    Result,
};

pub use statics::{ClassInitLevel, FieldKey, StaticState};

/// Where one method parameter lives in the register file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSlot {
    /// First register of the parameter
    pub register: u16,
    /// Declared type descriptor
    pub ty: String,
}

/// Mutable snapshot of one explored path.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    registers: ImHashMap<u16, Value>,
    register_count: u16,
    parameters: Arc<[ParameterSlot]>,
    result: Option<Value>,
    exception: Option<Value>,
    returned: Option<Value>,
    statics: StaticState,
    position: u32,
    assigned: BTreeSet<u16>,
    read: BTreeSet<u16>,
}

impl ExecutionState {
    /// Creates an empty state with `register_count` registers and no parameters.
    #[must_use]
    pub fn new(register_count: u16) -> Self {
        ExecutionState {
            registers: ImHashMap::new(),
            register_count,
            parameters: Arc::from(Vec::new()),
            result: None,
            exception: None,
            returned: None,
            statics: StaticState::new(),
            position: 0,
            assigned: BTreeSet::new(),
            read: BTreeSet::new(),
        }
    }

    /// Creates the frame of `method`, with parameters laid out in the last registers.
    ///
    /// Parameter registers are left unassigned; see [`ExecutionState::assign_parameters`].
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::MissingImplementation`] if the method has no body and
    /// [`EmulationError::InternalError`] if its arguments do not fit the frame.
    pub fn for_method(method: &VirtualMethod) -> Result<Self> {
        let body = method.implementation.as_ref().ok_or_else(|| {
            EmulationError::MissingImplementation {
                method: method.signature(),
            }
        })?;
        let argument_registers = method.reference.argument_register_count(method.is_static());
        let first = usize::from(body.register_count)
            .checked_sub(argument_registers)
            .ok_or_else(|| EmulationError::InternalError {
                description: format!(
                    "{} declares {} registers for {} argument registers",
                    method.signature(),
                    body.register_count,
                    argument_registers
                ),
            })?;

        let mut slots = Vec::with_capacity(method.reference.parameters.len() + 1);
        let mut register = first as u16;
        if !method.is_static() {
            slots.push(ParameterSlot {
                register,
                ty: method.reference.class.clone(),
            });
            register += 1;
        }
        for ty in &method.reference.parameters {
            slots.push(ParameterSlot {
                register,
                ty: ty.clone(),
            });
            register += if is_wide(ty) { 2 } else { 1 };
        }

        let mut state = ExecutionState::new(body.register_count);
        state.parameters = Arc::from(slots);
        Ok(state)
    }

    /// Number of registers in the frame.
    #[must_use]
    pub fn register_count(&self) -> u16 {
        self.register_count
    }

    /// Parameter layout, receiver first for instance methods.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSlot] {
        &self.parameters
    }

    /// Register holding parameter `ordinal` (receiver is ordinal 0 for instance methods).
    #[must_use]
    pub fn parameter_register(&self, ordinal: usize) -> Option<u16> {
        self.parameters.get(ordinal).map(|p| p.register)
    }

    /// Current value of parameter `ordinal` without touching bookkeeping.
    #[must_use]
    pub fn peek_parameter(&self, ordinal: usize) -> Option<&Value> {
        self.parameter_register(ordinal)
            .and_then(|r| self.registers.get(&r))
    }

    /// Assigns parameter values in order, without bookkeeping.
    ///
    /// Missing values become unknown of the declared type.
    pub fn assign_parameters(&mut self, values: &[Value]) {
        let slots = self.parameters.clone();
        for (i, slot) in slots.iter().enumerate() {
            let value = values
                .get(i)
                .map(|v| v.retyped(slot.ty.as_str()))
                .unwrap_or_else(|| Value::unknown(slot.ty.as_str()));
            self.registers.insert(slot.register, value);
        }
    }

    /// Reads a register, recording the read.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::UninitializedRegister`] if no value was ever assigned.
    pub fn read_register(&mut self, register: u16) -> Result<Value> {
        let value = self.registers.get(&register).cloned().ok_or_else(|| {
            EmulationError::UninitializedRegister {
                register,
                address: self.position,
            }
        })?;
        self.read.insert(register);
        Ok(value)
    }

    /// Current value of a register without touching bookkeeping.
    #[must_use]
    pub fn peek_register(&self, register: u16) -> Option<&Value> {
        self.registers.get(&register)
    }

    /// Assigns a register, recording the assignment.
    ///
    /// Wide values occupy a register pair; the high half is invalidated.
    pub fn assign_register(&mut self, register: u16, value: Value) {
        if is_wide(value.ty()) {
            self.registers.remove(&(register + 1));
        }
        self.registers.insert(register, value);
        self.assigned.insert(register);
    }

    /// Assigns a register without bookkeeping, for setting up fixtures.
    pub fn poke_register(&mut self, register: u16, value: Value) {
        self.registers.insert(register, value);
    }

    /// Every assigned register in ascending order.
    pub fn registers(&self) -> impl Iterator<Item = (u16, &Value)> {
        let mut regs: Vec<_> = self.registers.iter().map(|(r, v)| (*r, v)).collect();
        regs.sort_by_key(|(r, _)| *r);
        regs.into_iter()
    }

    /// Registers assigned by the most recent op.
    #[must_use]
    pub fn registers_assigned(&self) -> &BTreeSet<u16> {
        &self.assigned
    }

    /// Registers read by the most recent op.
    #[must_use]
    pub fn registers_read(&self) -> &BTreeSet<u16> {
        &self.read
    }

    /// Stores the outcome of an invoke for a following `move-result*`.
    ///
    /// `None` clears it, as after a `void` call.
    pub fn assign_result_register(&mut self, value: Option<Value>) {
        self.result = value;
    }

    /// Value left by the most recent invoke.
    #[must_use]
    pub fn peek_result_register(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Stores the exception a handler is entered with.
    pub fn assign_exception(&mut self, exception: Value) {
        self.exception = Some(exception);
    }

    /// Exception the current handler was entered with.
    #[must_use]
    pub fn peek_exception(&self) -> Option<&Value> {
        self.exception.as_ref()
    }

    /// Records the method's return value.
    pub fn assign_return(&mut self, value: Option<Value>) {
        self.returned = value;
    }

    /// The method's return value, once a `return*` executed.
    #[must_use]
    pub fn return_value(&self) -> Option<&Value> {
        self.returned.as_ref()
    }

    /// Static fields and class levels of this path.
    #[must_use]
    pub fn statics(&self) -> &StaticState {
        &self.statics
    }

    /// Mutable access to the static view.
    pub fn statics_mut(&mut self) -> &mut StaticState {
        &mut self.statics
    }

    /// Replaces the static view, e.g. with the outcome of a static initializer.
    pub fn replace_statics(&mut self, statics: StaticState) {
        self.statics = statics;
    }

    /// Value of a static field on this path.
    #[must_use]
    pub fn read_field(&self, key: &FieldKey) -> Option<&Value> {
        self.statics.field(key)
    }

    /// Stores a static field on this path.
    pub fn assign_field(&mut self, key: FieldKey, value: Value) {
        self.statics.set_field(key, value);
    }

    /// Initialization level of `class` on this path.
    #[must_use]
    pub fn class_init_level(&self, class: &str) -> ClassInitLevel {
        self.statics.init_level(class)
    }

    /// Sets the initialization level of `class` on this path.
    pub fn set_class_init_level(&mut self, class: &str, level: ClassInitLevel) {
        self.statics.set_init_level(class, level);
    }

    /// Returns `true` once `class`'s initializer completed on this path.
    #[must_use]
    pub fn is_class_initialized(&self, class: &str) -> bool {
        self.class_init_level(class) == ClassInitLevel::Initialized
    }

    /// Returns `true` if `class`'s initializer has not even started on this path.
    ///
    /// A class whose initializer is running further up the call chain does not need
    /// initialization; its fields are read as they currently are.
    #[must_use]
    pub fn needs_initialization(&self, class: &str) -> bool {
        self.class_init_level(class) == ClassInitLevel::NotInitialized
    }

    /// Address of the instruction this state is positioned at.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    pub(crate) fn set_position(&mut self, address: u32) {
        self.position = address;
    }

    /// Copy for a successor path with fresh bookkeeping.
    #[must_use]
    pub fn derive_child(&self) -> Self {
        let mut child = self.clone();
        child.assigned.clear();
        child.read.clear();
        child
    }
}
