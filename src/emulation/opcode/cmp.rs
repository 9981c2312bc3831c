//! `cmpl-*`, `cmpg-*` and `cmp-long`.
//!
//! The result is `-1`, `0` or `1`. When either floating point operand is NaN the result is
//! the opcode's bias: `1` for `cmpg`, `-1` for `cmpl`. Otherwise operands are compared
//! numerically, so `-0.0` and `0.0` compare equal.

use std::{cmp::Ordering, fmt};

use crate::{
    assembly::{Instruction, Opcode},
    emulation::{
        opcode::{BuildContext, Op, OpChild, OpContext},
        EmulationError, ExecutionState, Value,
    },
    metadata::types,
    Result,
};

/// Operand kind and NaN bias of a compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpKind {
    /// `cmpl-float`, NaN gives `-1`
    FloatLess,
    /// `cmpg-float`, NaN gives `1`
    FloatGreater,
    /// `cmpl-double`, NaN gives `-1`
    DoubleLess,
    /// `cmpg-double`, NaN gives `1`
    DoubleGreater,
    /// `cmp-long`
    Long,
}

impl CmpKind {
    /// The kind of a compare opcode.
    #[must_use]
    pub fn of(opcode: Opcode) -> Option<CmpKind> {
        Some(match opcode {
            Opcode::CmplFloat => CmpKind::FloatLess,
            Opcode::CmpgFloat => CmpKind::FloatGreater,
            Opcode::CmplDouble => CmpKind::DoubleLess,
            Opcode::CmpgDouble => CmpKind::DoubleGreater,
            Opcode::CmpLong => CmpKind::Long,
            _ => return None,
        })
    }

    fn nan_bias(self) -> i32 {
        match self {
            CmpKind::FloatGreater | CmpKind::DoubleGreater => 1,
            _ => -1,
        }
    }

    fn operand_type(self) -> &'static str {
        match self {
            CmpKind::FloatLess | CmpKind::FloatGreater => types::FLOAT,
            CmpKind::DoubleLess | CmpKind::DoubleGreater => types::DOUBLE,
            CmpKind::Long => types::LONG,
        }
    }

    /// Compares two known operands.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::TypeMismatch`] if an operand has no numeric view of the
    /// compare's operand type.
    pub fn compare(self, left: &Value, right: &Value) -> Result<i32> {
        let mismatch = |v: &Value| EmulationError::TypeMismatch {
            operation: "cmp",
            expected: self.operand_type().to_string(),
            found: v.ty().to_string(),
        };
        let ordering = match self {
            CmpKind::Long => {
                let a = left.as_i64().ok_or_else(|| mismatch(left))?;
                let b = right.as_i64().ok_or_else(|| mismatch(right))?;
                Some(a.cmp(&b))
            }
            CmpKind::FloatLess | CmpKind::FloatGreater => {
                let a = left.as_f32().ok_or_else(|| mismatch(left))?;
                let b = right.as_f32().ok_or_else(|| mismatch(right))?;
                a.partial_cmp(&b)
            }
            CmpKind::DoubleLess | CmpKind::DoubleGreater => {
                let a = left.as_f64().ok_or_else(|| mismatch(left))?;
                let b = right.as_f64().ok_or_else(|| mismatch(right))?;
                a.partial_cmp(&b)
            }
        };
        Ok(match ordering {
            Some(Ordering::Less) => -1,
            Some(Ordering::Equal) => 0,
            Some(Ordering::Greater) => 1,
            None => self.nan_bias(),
        })
    }
}

/// Three-way compare into an `int` register.
#[derive(Debug, Clone)]
pub struct CmpOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Operand kind and NaN bias
    pub kind: CmpKind,
    /// Destination register
    pub destination: u16,
    /// Left operand
    pub left: u16,
    /// Right operand
    pub right: u16,
}

impl CmpOp {
    /// Assigns the comparison result, unknown if either operand is.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let left = state.read_register(self.left)?;
        let right = state.read_register(self.right)?;
        let result = if left.is_unknown() || right.is_unknown() {
            Value::unknown(types::INTEGER)
        } else {
            Value::int(self.kind.compare(&left, &right)?)
        };
        state.assign_register(self.destination, result);
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads both operands.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        2
    }

    /// Assigns the destination.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        1
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}, v{}, v{}",
            self.opcode.mnemonic(),
            self.destination,
            self.left,
            self.right
        )
    }
}

pub(crate) fn build(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let kind = CmpKind::of(instruction.opcode).ok_or(EmulationError::UnsupportedOpcode {
        mnemonic: instruction.opcode.mnemonic(),
    })?;
    Ok(Op::Cmp(CmpOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        kind,
        destination: ctx.register(instruction, 0)?,
        left: ctx.register(instruction, 1)?,
        right: ctx.register(instruction, 2)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::emulation::{context, services};

    fn run(opcode: Opcode, left: Value, right: Value) -> Value {
        let services = services(Vec::new());
        let op = CmpOp {
            address: 0,
            next: 2,
            opcode,
            kind: CmpKind::of(opcode).unwrap(),
            destination: 0,
            left: 2,
            right: 4,
        };
        let mut state = ExecutionState::new(6);
        state.poke_register(2, left);
        state.poke_register(4, right);
        op.execute(&mut state, &context(&services)).unwrap();
        assert_eq!(state.registers_read().len(), op.registers_read_count());
        assert_eq!(state.registers_assigned().len(), op.registers_assigned_count());
        state.peek_register(0).cloned().unwrap()
    }

    #[test]
    fn nan_bias_depends_on_opcode() {
        assert_eq!(
            run(Opcode::CmpgFloat, Value::float(f32::NAN), Value::float(1.0)),
            Value::int(1)
        );
        assert_eq!(
            run(Opcode::CmplFloat, Value::float(f32::NAN), Value::float(1.0)),
            Value::int(-1)
        );
        assert_eq!(
            run(Opcode::CmpgDouble, Value::double(0.0), Value::double(f64::NAN)),
            Value::int(1)
        );
        assert_eq!(
            run(Opcode::CmplDouble, Value::double(0.0), Value::double(f64::NAN)),
            Value::int(-1)
        );
    }

    #[test]
    fn ordered_operands_compare_numerically() {
        assert_eq!(run(Opcode::CmpLong, Value::long(1), Value::long(2)), Value::int(-1));
        assert_eq!(run(Opcode::CmpLong, Value::long(2), Value::long(2)), Value::int(0));
        assert_eq!(
            run(Opcode::CmplDouble, Value::double(3.0), Value::double(2.0)),
            Value::int(1)
        );
        assert_eq!(
            run(Opcode::CmpgFloat, Value::float(-0.0), Value::float(0.0)),
            Value::int(0)
        );
    }

    #[test]
    fn float_constants_loaded_as_int_bits_compare_as_floats() {
        let bits = Value::int(2.5f32.to_bits() as i32);
        assert_eq!(run(Opcode::CmplFloat, bits, Value::float(2.5)), Value::int(0));
    }

    #[test]
    fn unknown_operand_gives_unknown_int() {
        let result = run(Opcode::CmpLong, Value::unknown("J"), Value::long(0));
        assert!(result.is_unknown());
        assert_eq!(result.ty(), "I");
    }

    #[test]
    fn display_lists_registers() {
        let op = CmpOp {
            address: 0,
            next: 2,
            opcode: Opcode::CmpgDouble,
            kind: CmpKind::DoubleGreater,
            destination: 0,
            left: 1,
            right: 3,
        };
        assert_eq!(op.to_string(), "cmpg-double v0, v1, v3");
    }
}
