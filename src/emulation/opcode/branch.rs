//! Conditional branches and switches.
//!
//! A condition over known operands selects exactly one successor. When an operand is
//! unknown, or the operands cannot be compared (two non-null references of unrelated
//! kinds, for instance), both successors are produced and the path forks.

use std::{cmp::Ordering, fmt};

use crate::{
    assembly::{Instruction, Opcode},
    emulation::{
        opcode::{BuildContext, Op, OpChild, OpContext},
        EmulationError, ExecutionState, RawValue, Value,
    },
    Result,
};

/// Relation tested by an `if-*` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `<=`
    Le,
}

impl Comparison {
    /// The relation of an `if-*` or `if-*z` opcode.
    #[must_use]
    pub fn of(opcode: Opcode) -> Option<Comparison> {
        Some(match opcode {
            Opcode::IfEq | Opcode::IfEqz => Comparison::Eq,
            Opcode::IfNe | Opcode::IfNez => Comparison::Ne,
            Opcode::IfLt | Opcode::IfLtz => Comparison::Lt,
            Opcode::IfGe | Opcode::IfGez => Comparison::Ge,
            Opcode::IfGt | Opcode::IfGtz => Comparison::Gt,
            Opcode::IfLe | Opcode::IfLez => Comparison::Le,
            _ => return None,
        })
    }

    /// Whether the relation holds for `left.cmp(right) == ordering`.
    #[must_use]
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Ge => ordering != Ordering::Less,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Le => ordering != Ordering::Greater,
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, Comparison::Eq | Comparison::Ne)
    }

    /// Decides the relation, `None` if it cannot be decided.
    #[must_use]
    pub fn evaluate(self, left: &Value, right: &Value) -> Option<bool> {
        let (a, b) = (left.raw()?, right.raw()?);
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return Some(self.holds(x.cmp(&y)));
        }
        if !self.is_equality() {
            return None;
        }
        let equal = match (a, b) {
            (RawValue::Null, RawValue::Null) => true,
            (RawValue::Null, _) | (_, RawValue::Null) => false,
            (RawValue::Class(x), RawValue::Class(y)) => x == y,
            _ => return None,
        };
        Some(self.holds(if equal {
            Ordering::Equal
        } else {
            Ordering::Less
        }))
    }

    /// Decides the relation against zero, or against `null` for references.
    #[must_use]
    pub fn evaluate_zero(self, value: &Value) -> Option<bool> {
        let raw = value.raw()?;
        if let Some(x) = raw.as_i64() {
            return Some(self.holds(x.cmp(&0)));
        }
        if !self.is_equality() {
            return None;
        }
        Some(self.holds(if raw.is_null() {
            Ordering::Equal
        } else {
            Ordering::Greater
        }))
    }
}

fn branch_children(outcome: Option<bool>, target: u32, fall_through: u32) -> Vec<OpChild> {
    match outcome {
        Some(true) => vec![OpChild::next(target)],
        Some(false) => vec![OpChild::next(fall_through)],
        None if target == fall_through => vec![OpChild::next(target)],
        None => vec![OpChild::next(target), OpChild::next(fall_through)],
    }
}

/// Two-register `if-*`.
#[derive(Debug, Clone)]
pub struct IfTestOp {
    /// Own address
    pub address: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Tested relation
    pub comparison: Comparison,
    /// Left operand register
    pub left: u16,
    /// Right operand register
    pub right: u16,
    /// Taken successor
    pub target: u32,
    /// Not-taken successor
    pub fall_through: u32,
}

impl IfTestOp {
    /// Selects or forks successors.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let left = state.read_register(self.left)?;
        let right = state.read_register(self.right)?;
        Ok(branch_children(
            self.comparison.evaluate(&left, &right),
            self.target,
            self.fall_through,
        ))
    }

    /// Reads both operands.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        2
    }

    /// Assigns nothing.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        0
    }
}

impl fmt::Display for IfTestOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}, v{}, :{:04x}",
            self.opcode.mnemonic(),
            self.left,
            self.right,
            self.target
        )
    }
}

/// Compare-with-zero `if-*z`.
#[derive(Debug, Clone)]
pub struct IfTestZeroOp {
    /// Own address
    pub address: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Tested relation
    pub comparison: Comparison,
    /// Operand register
    pub register: u16,
    /// Taken successor
    pub target: u32,
    /// Not-taken successor
    pub fall_through: u32,
}

impl IfTestZeroOp {
    /// Selects or forks successors.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let value = state.read_register(self.register)?;
        Ok(branch_children(
            self.comparison.evaluate_zero(&value),
            self.target,
            self.fall_through,
        ))
    }

    /// Reads the operand.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        1
    }

    /// Assigns nothing.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        0
    }
}

impl fmt::Display for IfTestZeroOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}, :{:04x}",
            self.opcode.mnemonic(),
            self.register,
            self.target
        )
    }
}

/// `packed-switch` and `sparse-switch` with their tables resolved to absolute addresses.
#[derive(Debug, Clone)]
pub struct SwitchOp {
    /// Own address
    pub address: u32,
    /// Opcode, for display
    pub opcode: Opcode,
    /// Selector register
    pub register: u16,
    /// `(key, target)` in table order
    pub cases: Vec<(i32, u32)>,
    /// Successor when no key matches
    pub fall_through: u32,
}

impl SwitchOp {
    /// Jumps to the matching case, or forks to every case and the fall-through.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::TypeMismatch`] for a known non-integral selector.
    pub fn execute(
        &self,
        state: &mut ExecutionState,
        _ctx: &OpContext<'_>,
    ) -> Result<Vec<OpChild>> {
        let selector = state.read_register(self.register)?;
        if selector.is_unknown() {
            let mut targets: Vec<u32> = self.cases.iter().map(|(_, t)| *t).collect();
            targets.push(self.fall_through);
            let mut seen = Vec::with_capacity(targets.len());
            for target in targets {
                if !seen.contains(&target) {
                    seen.push(target);
                }
            }
            return Ok(seen.into_iter().map(OpChild::next).collect());
        }

        let key = selector.as_i32().ok_or_else(|| EmulationError::TypeMismatch {
            operation: self.opcode.mnemonic(),
            expected: "int".to_string(),
            found: selector.ty().to_string(),
        })?;
        let target = self
            .cases
            .iter()
            .find(|(k, _)| *k == key)
            .map_or(self.fall_through, |(_, t)| *t);
        Ok(vec![OpChild::next(target)])
    }

    /// Reads the selector.
    #[must_use]
    pub fn registers_read_count(&self) -> usize {
        1
    }

    /// Assigns nothing.
    #[must_use]
    pub fn registers_assigned_count(&self) -> usize {
        0
    }
}

impl fmt::Display for SwitchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} {{", self.opcode.mnemonic(), self.register)?;
        for (key, target) in &self.cases {
            write!(f, " {key} -> :{target:04x}")?;
        }
        write!(f, " }}")
    }
}

fn comparison(instruction: &Instruction) -> Result<Comparison> {
    Comparison::of(instruction.opcode).ok_or_else(|| {
        EmulationError::UnsupportedOpcode {
            mnemonic: instruction.opcode.mnemonic(),
        }
        .into()
    })
}

pub(crate) fn build_if_test(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    Ok(Op::IfTest(IfTestOp {
        address: instruction.address,
        opcode: instruction.opcode,
        comparison: comparison(instruction)?,
        left: ctx.register(instruction, 0)?,
        right: ctx.register(instruction, 1)?,
        target: ctx.target(instruction, instruction.branch_target())?,
        fall_through: ctx.fall_through(instruction)?,
    }))
}

pub(crate) fn build_if_test_zero(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    Ok(Op::IfTestZero(IfTestZeroOp {
        address: instruction.address,
        opcode: instruction.opcode,
        comparison: comparison(instruction)?,
        register: ctx.register(instruction, 0)?,
        target: ctx.target(instruction, instruction.branch_target())?,
        fall_through: ctx.fall_through(instruction)?,
    }))
}

pub(crate) fn build_switch(instruction: &Instruction, ctx: &BuildContext<'_>) -> Result<Op> {
    let mut cases = Vec::with_capacity(instruction.switch_targets.len());
    for case in &instruction.switch_targets {
        cases.push((case.key, ctx.target(instruction, instruction.relative(case.offset))?));
    }
    Ok(Op::Switch(SwitchOp {
        address: instruction.address,
        opcode: instruction.opcode,
        register: ctx.register(instruction, 0)?,
        cases,
        fall_through: ctx.fall_through(instruction)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emulation::{ClassObject, ClassOrigin},
        test::emulation::{context, services},
    };

    fn targets(children: &[OpChild]) -> Vec<u32> {
        children
            .iter()
            .map(|c| match c {
                OpChild::Continue { address } => *address,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    fn if_test(comparison: Comparison) -> IfTestOp {
        IfTestOp {
            address: 0,
            opcode: Opcode::IfEq,
            comparison,
            left: 0,
            right: 1,
            target: 10,
            fall_through: 2,
        }
    }

    #[test]
    fn known_operands_pick_one_successor() {
        let services = services(Vec::new());
        let mut state = ExecutionState::new(2);
        state.poke_register(0, Value::int(3));
        state.poke_register(1, Value::int(5));
        let taken = if_test(Comparison::Lt).execute(&mut state, &context(&services)).unwrap();
        assert_eq!(targets(&taken), vec![10]);
        let not_taken = if_test(Comparison::Ge).execute(&mut state, &context(&services)).unwrap();
        assert_eq!(targets(&not_taken), vec![2]);
    }

    #[test]
    fn unknown_operand_forks_both_ways() {
        let services = services(Vec::new());
        let mut state = ExecutionState::new(2);
        state.poke_register(0, Value::unknown("I"));
        state.poke_register(1, Value::int(5));
        let children = if_test(Comparison::Eq).execute(&mut state, &context(&services)).unwrap();
        assert_eq!(targets(&children), vec![10, 2]);
        assert_eq!(state.registers_read().len(), 2);
    }

    #[test]
    fn reference_equality_against_null() {
        let string = Value::string("x");
        let null = Value::null("Ljava/lang/String;");
        assert_eq!(Comparison::Eq.evaluate(&null, &null.clone()), Some(true));
        assert_eq!(Comparison::Ne.evaluate(&string, &null), Some(true));
        assert_eq!(Comparison::Eq.evaluate(&string, &Value::string("x")), None);
        assert_eq!(Comparison::Lt.evaluate(&null, &null.clone()), None);

        let class = Value::class(ClassObject::new("LFoo;", ClassOrigin::Sandbox));
        assert_eq!(Comparison::Eq.evaluate(&class, &class.clone()), Some(true));

        assert_eq!(Comparison::Eq.evaluate_zero(&null), Some(true));
        assert_eq!(Comparison::Ne.evaluate_zero(&class), Some(true));
    }

    #[test]
    fn zero_tests_on_integers() {
        assert_eq!(Comparison::Lt.evaluate_zero(&Value::int(-1)), Some(true));
        assert_eq!(Comparison::Gt.evaluate_zero(&Value::int(0)), Some(false));
        assert_eq!(Comparison::Ne.evaluate_zero(&Value::string("s")), Some(true));
        assert_eq!(Comparison::Le.evaluate_zero(&Value::unknown("I")), None);
    }

    #[test]
    fn identical_successors_are_not_duplicated() {
        let services = services(Vec::new());
        let op = IfTestZeroOp {
            address: 0,
            opcode: Opcode::IfEqz,
            comparison: Comparison::Eq,
            register: 0,
            target: 2,
            fall_through: 2,
        };
        let mut state = ExecutionState::new(1);
        state.poke_register(0, Value::unknown("I"));
        let children = op.execute(&mut state, &context(&services)).unwrap();
        assert_eq!(targets(&children), vec![2]);
    }

    #[test]
    fn switch_selects_case_or_forks() {
        let services = services(Vec::new());
        let op = SwitchOp {
            address: 0,
            opcode: Opcode::PackedSwitch,
            register: 0,
            cases: vec![(1, 10), (2, 20), (3, 10)],
            fall_through: 3,
        };
        let mut state = ExecutionState::new(1);
        state.poke_register(0, Value::int(2));
        assert_eq!(targets(&op.execute(&mut state, &context(&services)).unwrap()), vec![20]);

        state.poke_register(0, Value::int(9));
        assert_eq!(targets(&op.execute(&mut state, &context(&services)).unwrap()), vec![3]);

        state.poke_register(0, Value::unknown("I"));
        assert_eq!(
            targets(&op.execute(&mut state, &context(&services)).unwrap()),
            vec![10, 20, 3]
        );
    }
}
