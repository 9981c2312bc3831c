//! Arithmetic, bitwise and conversion ops.
//!
//! Integer arithmetic wraps in two's complement, shift distances are masked to the operand
//! width, and integer division or remainder by a known zero raises
//! `java.lang.ArithmeticException: / by zero`. Floating point arithmetic is plain IEEE-754,
//! and conversions to integral types saturate with NaN mapping to zero.
//!
//! An unknown operand makes the result an unknown of the operation's result type. A
//! division whose divisor is unknown does not fork an exception path.

use std::fmt;

use crate::{
    assembly::{Instruction, Opcode},
    emulation::{
        modeled_exception,
        opcode::{BuildContext, Op, OpChild, OpContext},
        EmulationError, ExecutionState, RawValue, ThrownException, Value,
    },
    metadata::types,
    Result,
};

/// Primitive kind an arithmetic op works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl NumericKind {
    fn parse(name: &str) -> Option<NumericKind> {
        Some(match name {
            "int" => NumericKind::Int,
            "long" => NumericKind::Long,
            "float" => NumericKind::Float,
            "double" => NumericKind::Double,
            _ => return None,
        })
    }

    /// Type descriptor of the kind.
    #[must_use]
    pub fn descriptor(self) -> &'static str {
        match self {
            NumericKind::Int => types::INTEGER,
            NumericKind::Long => types::LONG,
            NumericKind::Float => types::FLOAT,
            NumericKind::Double => types::DOUBLE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Number {
    fn read(kind: NumericKind, value: &Value, operation: &'static str) -> Result<Number> {
        let number = match kind {
            NumericKind::Int => value.as_i32().map(Number::Int),
            NumericKind::Long => value.as_i64().map(Number::Long),
            NumericKind::Float => value.as_f32().map(Number::Float),
            NumericKind::Double => value.as_f64().map(Number::Double),
        };
        number.ok_or_else(|| {
            EmulationError::TypeMismatch {
                operation,
                expected: kind.descriptor().to_string(),
                found: value.ty().to_string(),
            }
            .into()
        })
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(v) => Value::int(v),
            Number::Long(v) => Value::long(v),
            Number::Float(v) => Value::float(v),
            Number::Double(v) => Value::double(v),
        }
    }
}

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `add`
    Add,
    /// `sub`
    Sub,
    /// `rsub`, literal minus register
    Rsub,
    /// `mul`
    Mul,
    /// `div`
    Div,
    /// `rem`
    Rem,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
    /// `shl`
    Shl,
    /// `shr`, arithmetic
    Shr,
    /// `ushr`, logical
    Ushr,
}

impl BinaryOperator {
    /// Operator and operand kind of a binary arithmetic opcode in any form.
    #[must_use]
    pub fn of(opcode: Opcode) -> Option<(BinaryOperator, NumericKind)> {
        let mnemonic = opcode.mnemonic();
        let base = mnemonic
            .strip_suffix("/2addr")
            .or_else(|| mnemonic.strip_suffix("/lit16"))
            .or_else(|| mnemonic.strip_suffix("/lit8"))
            .unwrap_or(mnemonic);
        let (name, kind) = base.split_once('-')?;
        let operator = match name {
            "add" => BinaryOperator::Add,
            "sub" => BinaryOperator::Sub,
            "rsub" => BinaryOperator::Rsub,
            "mul" => BinaryOperator::Mul,
            "div" => BinaryOperator::Div,
            "rem" => BinaryOperator::Rem,
            "and" => BinaryOperator::And,
            "or" => BinaryOperator::Or,
            "xor" => BinaryOperator::Xor,
            "shl" => BinaryOperator::Shl,
            "shr" => BinaryOperator::Shr,
            "ushr" => BinaryOperator::Ushr,
            _ => return None,
        };
        Some((operator, NumericKind::parse(kind)?))
    }

    fn is_shift(self) -> bool {
        matches!(
            self,
            BinaryOperator::Shl | BinaryOperator::Shr | BinaryOperator::Ushr
        )
    }

    /// Evaluates the operator, `Err(value)` for a thrown exception.
    fn apply(self, a: Number, b: Number) -> Option<std::result::Result<Number, Value>> {
        use BinaryOperator::*;
        let divide_by_zero = || {
            Err(Value::throwable(ThrownException::new(
                modeled_exception::ARITHMETIC,
                Some("/ by zero"),
            )))
        };
        Some(match (a, b) {
            (Number::Int(a), Number::Int(b)) => Ok(Number::Int(match self {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Rsub => b.wrapping_sub(a),
                Mul => a.wrapping_mul(b),
                Div if b == 0 => return Some(divide_by_zero()),
                Div => a.wrapping_div(b),
                Rem if b == 0 => return Some(divide_by_zero()),
                Rem => a.wrapping_rem(b),
                And => a & b,
                Or => a | b,
                Xor => a ^ b,
                Shl => a.wrapping_shl(b as u32 & 0x1f),
                Shr => a.wrapping_shr(b as u32 & 0x1f),
                Ushr => ((a as u32) >> (b as u32 & 0x1f)) as i32,
            })),
            (Number::Long(a), Number::Int(b)) if self.is_shift() => Ok(Number::Long(match self {
                Shl => a.wrapping_shl(b as u32 & 0x3f),
                Shr => a.wrapping_shr(b as u32 & 0x3f),
                _ => ((a as u64) >> (b as u32 & 0x3f)) as i64,
            })),
            (Number::Long(a), Number::Long(b)) => Ok(Number::Long(match self {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Rsub => b.wrapping_sub(a),
                Mul => a.wrapping_mul(b),
                Div if b == 0 => return Some(divide_by_zero()),
                Div => a.wrapping_div(b),
                Rem if b == 0 => return Some(divide_by_zero()),
                Rem => a.wrapping_rem(b),
                And => a & b,
                Or => a | b,
                Xor => a ^ b,
                Shl | Shr | Ushr => return None,
            })),
            (Number::Float(a), Number::Float(b)) => Ok(Number::Float(match self {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Rem => a % b,
                _ => return None,
            })),
            (Number::Double(a), Number::Double(b)) => Ok(Number::Double(match self {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Rem => a % b,
                _ => return None,
            })),
            _ => return None,
        })
    }
}

/// Second operand of a binary op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOperand {
    /// A register
    Register(u16),
    /// The literal of a `/lit8`, `/lit16` or `rsub-int` form
    Literal(i32),
}

/// Binary arithmetic in three-register, `/2addr` and literal forms.
#[derive(Debug, Clone)]
pub struct BinaryMathOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// The operator
    pub operator: BinaryOperator,
    /// Operand and result kind
    pub kind: NumericKind,
    /// Destination register
    pub destination: u16,
    /// First operand register
    pub left: u16,
    /// Second operand
    pub right: MathOperand,
}

impl BinaryMathOp {
    /// Assigns the result or raises `ArithmeticException`.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::TypeMismatch`] if a known operand has no view of the
    /// operation's kind.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let left = state.read_register(self.left)?;
        let right = match self.right {
            MathOperand::Register(register) => state.read_register(register)?,
            MathOperand::Literal(literal) => Value::int(literal),
        };
        if left.is_unknown() || right.is_unknown() {
            state.assign_register(self.destination, Value::unknown(self.kind.descriptor()));
            return Ok(vec![OpChild::next(self.next)]);
        }

        let operation = self.opcode.mnemonic();
        let right_kind = if self.operator.is_shift() {
            NumericKind::Int
        } else {
            self.kind
        };
        let a = Number::read(self.kind, &left, operation)?;
        let b = Number::read(right_kind, &right, operation)?;
        match self.operator.apply(a, b) {
            Some(Ok(result)) => {
                state.assign_register(self.destination, result.into_value());
                Ok(vec![OpChild::next(self.next)])
            }
            Some(Err(exception)) => Ok(vec![OpChild::throw(exception)]),
            None => Err(EmulationError::UnsupportedOpcode {
                mnemonic: self.opcode.mnemonic(),
            }
            .into()),
        }
    }

    /// Reads one or two registers.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        match self.right {
            MathOperand::Register(_) => 2,
            MathOperand::Literal(_) => 1,
        }
    }

    /// Assigns the destination.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        1
    }
}

impl fmt::Display for BinaryMathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.opcode.mnemonic(), self.destination)?;
        if !self.opcode.is_two_address() {
            write!(f, ", v{}", self.left)?;
        }
        match self.right {
            MathOperand::Register(r) => write!(f, ", v{r}"),
            MathOperand::Literal(l) => write!(f, ", #{l}"),
        }
    }
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `neg-*`
    Negate(NumericKind),
    /// `not-int`, `not-long`
    Not(NumericKind),
    /// Primitive widening or narrowing between numeric kinds
    Convert {
        /// Source kind
        from: NumericKind,
        /// Result kind
        to: NumericKind,
    },
    /// `int-to-byte`
    IntToByte,
    /// `int-to-char`
    IntToChar,
    /// `int-to-short`
    IntToShort,
}

impl UnaryOperator {
    /// The operator of a unary opcode.
    #[must_use]
    pub fn of(opcode: Opcode) -> Option<UnaryOperator> {
        match opcode {
            Opcode::IntToByte => return Some(UnaryOperator::IntToByte),
            Opcode::IntToChar => return Some(UnaryOperator::IntToChar),
            Opcode::IntToShort => return Some(UnaryOperator::IntToShort),
            _ => {}
        }
        let mnemonic = opcode.mnemonic();
        if let Some(kind) = mnemonic.strip_prefix("neg-") {
            return NumericKind::parse(kind).map(UnaryOperator::Negate);
        }
        if let Some(kind) = mnemonic.strip_prefix("not-") {
            return NumericKind::parse(kind).map(UnaryOperator::Not);
        }
        let (from, to) = mnemonic.split_once("-to-")?;
        Some(UnaryOperator::Convert {
            from: NumericKind::parse(from)?,
            to: NumericKind::parse(to)?,
        })
    }

    /// Kind of the operand.
    #[must_use]
    pub fn operand_kind(self) -> NumericKind {
        match self {
            UnaryOperator::Negate(kind) | UnaryOperator::Not(kind) => kind,
            UnaryOperator::Convert { from, .. } => from,
            _ => NumericKind::Int,
        }
    }

    /// Type descriptor of the result.
    #[must_use]
    pub fn result_type(self) -> &'static str {
        match self {
            UnaryOperator::Negate(kind) | UnaryOperator::Not(kind) => kind.descriptor(),
            UnaryOperator::Convert { to, .. } => to.descriptor(),
            UnaryOperator::IntToByte => types::BYTE,
            UnaryOperator::IntToChar => types::CHAR,
            UnaryOperator::IntToShort => types::SHORT,
        }
    }

    fn apply(self, operand: Number) -> Option<Value> {
        Some(match (self, operand) {
            (UnaryOperator::Negate(_), Number::Int(v)) => Value::int(v.wrapping_neg()),
            (UnaryOperator::Negate(_), Number::Long(v)) => Value::long(v.wrapping_neg()),
            (UnaryOperator::Negate(_), Number::Float(v)) => Value::float(-v),
            (UnaryOperator::Negate(_), Number::Double(v)) => Value::double(-v),
            (UnaryOperator::Not(_), Number::Int(v)) => Value::int(!v),
            (UnaryOperator::Not(_), Number::Long(v)) => Value::long(!v),
            (UnaryOperator::Convert { to, .. }, number) => convert(number, to).into_value(),
            (UnaryOperator::IntToByte, Number::Int(v)) => {
                Value::wrap(RawValue::Byte(v as i8), types::BYTE)
            }
            (UnaryOperator::IntToChar, Number::Int(v)) => {
                Value::wrap(RawValue::Char(v as u16), types::CHAR)
            }
            (UnaryOperator::IntToShort, Number::Int(v)) => {
                Value::wrap(RawValue::Short(v as i16), types::SHORT)
            }
            _ => return None,
        })
    }
}

// `as` from float to integer saturates and maps NaN to zero.
fn convert(number: Number, to: NumericKind) -> Number {
    match (number, to) {
        (Number::Int(v), NumericKind::Int) => Number::Int(v),
        (Number::Int(v), NumericKind::Long) => Number::Long(i64::from(v)),
        (Number::Int(v), NumericKind::Float) => Number::Float(v as f32),
        (Number::Int(v), NumericKind::Double) => Number::Double(f64::from(v)),
        (Number::Long(v), NumericKind::Int) => Number::Int(v as i32),
        (Number::Long(v), NumericKind::Long) => Number::Long(v),
        (Number::Long(v), NumericKind::Float) => Number::Float(v as f32),
        (Number::Long(v), NumericKind::Double) => Number::Double(v as f64),
        (Number::Float(v), NumericKind::Int) => Number::Int(v as i32),
        (Number::Float(v), NumericKind::Long) => Number::Long(v as i64),
        (Number::Float(v), NumericKind::Float) => Number::Float(v),
        (Number::Float(v), NumericKind::Double) => Number::Double(f64::from(v)),
        (Number::Double(v), NumericKind::Int) => Number::Int(v as i32),
        (Number::Double(v), NumericKind::Long) => Number::Long(v as i64),
        (Number::Double(v), NumericKind::Float) => Number::Float(v as f32),
        (Number::Double(v), NumericKind::Double) => Number::Double(v),
    }
}

/// Negation, bitwise not and primitive conversion.
#[derive(Debug, Clone)]
pub struct UnaryMathOp {
    /// Own address
    pub address: u32,
    /// Successor
    pub next: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// The operator
    pub operator: UnaryOperator,
    /// Destination register
    pub destination: u16,
    /// Operand register
    pub source: u16,
}

impl UnaryMathOp {
    /// Assigns the result.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::TypeMismatch`] if a known operand has no view of the
    /// operand kind.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let operand = state.read_register(self.source)?;
        let result = if operand.is_unknown() {
            Value::unknown(self.operator.result_type())
        } else {
            let number =
                Number::read(self.operator.operand_kind(), &operand, self.opcode.mnemonic())?;
            self.operator
                .apply(number)
                .ok_or(EmulationError::UnsupportedOpcode {
                    mnemonic: self.opcode.mnemonic(),
                })?
        };
        state.assign_register(self.destination, result);
        Ok(vec![OpChild::next(self.next)])
    }

    /// Reads the operand.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        1
    }

    /// Assigns the destination.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        1
    }
}

impl fmt::Display for UnaryMathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}, v{}",
            self.opcode.mnemonic(),
            self.destination,
            self.source
        )
    }
}

pub(crate) fn build_binary(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let (operator, kind) =
        BinaryOperator::of(instruction.opcode).ok_or(EmulationError::UnsupportedOpcode {
            mnemonic: instruction.opcode.mnemonic(),
        })?;
    let destination = ctx.register(instruction, 0)?;
    let (left, right) = if instruction.opcode.is_two_address() {
        (destination, MathOperand::Register(ctx.register(instruction, 1)?))
    } else if instruction.opcode.is_literal_math() {
        (
            ctx.register(instruction, 1)?,
            MathOperand::Literal(ctx.literal(instruction)? as i32),
        )
    } else {
        (
            ctx.register(instruction, 1)?,
            MathOperand::Register(ctx.register(instruction, 2)?),
        )
    };

    Ok(Op::BinaryMath(BinaryMathOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        operator,
        kind,
        destination,
        left,
        right,
    }))
}

pub(crate) fn build_unary(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let operator = UnaryOperator::of(instruction.opcode).ok_or(EmulationError::UnsupportedOpcode {
        mnemonic: instruction.opcode.mnemonic(),
    })?;
    Ok(Op::UnaryMath(UnaryMathOp {
        address: instruction.address,
        next: ctx.fall_through(instruction)?,
        opcode: instruction.opcode,
        operator,
        destination: ctx.register(instruction, 0)?,
        source: ctx.register(instruction, 1)?,
    }))
}
