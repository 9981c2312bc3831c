//! Static field access: `sget*` and `sput*`.
//!
//! Accessing a static field of a local class that is not yet initialized on the current
//! path first redirects through the class's static initializer and then re-executes the
//! access. Fields of classes outside the repository read as unknown unless the path
//! stored a value earlier.

use std::{fmt, sync::Arc};

use crate::{
    assembly::{Instruction, Opcode},
    emulation::{
        opcode::{BuildContext, Op, OpChild, OpContext, SyntheticStep},
        ExecutionState, FieldKey, RawValue, Value,
    },
    metadata::FieldRef,
    Result,
};

/// Field reference resolved against the class repository.
#[derive(Debug, Clone)]
pub struct ResolvedField {
    /// Storage key, naming the declaring class
    pub key: FieldKey,
    /// Declared field type
    pub ty: Arc<str>,
    /// Whether the declaring class is local and subject to static initialization
    pub local: bool,
}

impl ResolvedField {
    fn resolve(field: &FieldRef, ctx: &BuildContext<'_>) -> Self {
        match ctx.services.classes().get_field(&field.class, &field.name) {
            Ok((declaring, _)) => ResolvedField {
                key: FieldKey::new(declaring.name(), &field.name),
                ty: Arc::from(field.ty.as_str()),
                local: true,
            },
            Err(_) => ResolvedField {
                key: FieldKey::from(field),
                ty: Arc::from(field.ty.as_str()),
                local: false,
            },
        }
    }

    fn initialization(&self, state: &ExecutionState, address: u32) -> Option<OpChild> {
        (self.local && state.needs_initialization(&self.key.class)).then(|| OpChild::Redirect {
            step: SyntheticStep::StaticInit {
                class: self.key.class.clone(),
            },
            resume: address,
        })
    }
}

/// `sget`, `sget-wide`, `sget-object` and the narrow forms.
#[derive(Debug, Clone)]
pub struct StaticGetOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Destination register
    pub destination: u16,
    /// The accessed field
    pub field: ResolvedField,
}

impl StaticGetOp {
    /// Loads the field on this path, initializing its class first if needed.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        if let Some(redirect) = self.field.initialization(state, self.address) {
            return Ok(vec![redirect]);
        }

        let value = match state.read_field(&self.field.key) {
            Some(value) => value.retyped(self.field.ty.clone()),
            None if self.field.local => {
                Value::wrap(RawValue::default_for(&self.field.ty), self.field.ty.clone())
            }
            None => Value::unknown(self.field.ty.clone()),
        };
        state.assign_register(self.destination, value);
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads no register.
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

impl fmt::Display for StaticGetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}, {}:{}",
            self.opcode.mnemonic(),
            self.destination,
            self.field.key,
            self.field.ty
        )
    }
}

/// `sput`, `sput-wide`, `sput-object` and the narrow forms.
#[derive(Debug, Clone)]
pub struct StaticPutOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Source register
    pub source: u16,
    /// The accessed field
    pub field: ResolvedField,
}

impl StaticPutOp {
    /// Stores the register into the field on this path, initializing its class first if
    /// needed.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        if let Some(redirect) = self.field.initialization(state, self.address) {
            return Ok(vec![redirect]);
        }

        let value = state.read_register(self.source)?;
        state.assign_field(self.field.key.clone(), value.retyped(self.field.ty.clone()));
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads the source.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        1
    }

    /// Assigns no register.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        0
    }
}

impl fmt::Display for StaticPutOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}, {}:{}",
            self.opcode.mnemonic(),
            self.source,
            self.field.key,
            self.field.ty
        )
    }
}

pub(crate) fn build_get(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let field = ctx.field_reference(instruction)?;
    Ok(Op::StaticGet(StaticGetOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        destination: ctx.register(instruction, 0)?,
        field: ResolvedField::resolve(field, ctx),
    }))
}

pub(crate) fn build_put(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let field = ctx.field_reference(instruction)?;
    Ok(Op::StaticPut(StaticPutOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        source: ctx.register(instruction, 0)?,
        field: ResolvedField::resolve(field, ctx),
    }))
}
