//! Label-aware construction of method bodies.
//!
//! [`MethodAssembler`] lays out [`Instruction`]s at consecutive code-unit addresses and
//! resolves symbolic labels for branches, switch cases and try blocks when the body is
//! finished. It is the counterpart of a dex decoder for callers that want to describe a
//! method by hand, such as tests, fixtures and benchmarks.
//!
//! # Label Resolution
//!
//! ```rust
//! use smaliscope::assembly::{MethodAssembler, Opcode};
//!
//! let mut asm = MethodAssembler::new(2);
//! asm.if_testz(Opcode::IfEqz, 1, "zero")?
//!     .const_int(0, 1)?
//!     .goto("end")?
//!     .label("zero")?
//!     .const_int(0, 0)?
//!     .label("end")?
//!     .return_value(Opcode::Return, 0)?;
//!
//! let body = asm.finish()?;
//! let branch = &body.instructions[0];
//! assert_eq!(branch.branch_target(), Some(body.instructions[3].address));
//! # Ok::<(), smaliscope::Error>(())
//! ```

use rustc_hash::FxHashMap;

use crate::{
    assembly::{
        instruction::{
            CatchHandler, Instruction, MethodImplementation, Reference, SwitchTarget, TryBlock,
        },
        opcodes::{FlowType, Opcode},
    },
    metadata::{FieldRef, MethodRef},
    Result,
};

/// A branch whose target label is resolved in [`MethodAssembler::finish`].
#[derive(Debug, Clone)]
pub struct LabelFixup {
    /// The target label name to resolve
    pub label: String,
    /// Index of the branch instruction
    pub instruction_index: usize,
}

/// A switch whose case labels are resolved in [`MethodAssembler::finish`].
#[derive(Debug, Clone)]
pub struct SwitchFixup {
    /// `(key, label)` per case
    pub cases: Vec<(i32, String)>,
    /// Index of the switch instruction
    pub instruction_index: usize,
}

#[derive(Debug, Clone)]
struct TryFixup {
    start: String,
    end: String,
    handlers: Vec<(Option<String>, String)>,
}

/// Builds a [`MethodImplementation`] one instruction at a time.
///
/// Every emitter validates that the opcode belongs to the family it emits and returns
/// `&mut Self` so calls chain with `?`.
#[derive(Debug)]
pub struct MethodAssembler {
    register_count: u16,
    instructions: Vec<Instruction>,
    position: u32,
    labels: FxHashMap<String, u32>,
    fixups: Vec<LabelFixup>,
    switch_fixups: Vec<SwitchFixup>,
    try_fixups: Vec<TryFixup>,
}

impl MethodAssembler {
    /// Creates an assembler for a frame of `register_count` registers.
    #[must_use]
    pub fn new(register_count: u16) -> Self {
        MethodAssembler {
            register_count,
            instructions: Vec::new(),
            position: 0,
            labels: FxHashMap::default(),
            fixups: Vec::new(),
            switch_fixups: Vec::new(),
            try_fixups: Vec::new(),
        }
    }

    /// Address the next instruction will be placed at.
    #[must_use]
    pub fn current_address(&self) -> u32 {
        self.position
    }

    /// Binds `name` to the current address.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the label is already bound.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.contains_key(name) {
            return Err(malformed_error!("Duplicate label '{}'", name));
        }
        self.labels.insert(name.to_string(), self.position);
        Ok(self)
    }

    /// Appends a prepared instruction at the current address.
    ///
    /// The instruction's own address is overwritten.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the other emitters.
    pub fn emit(&mut self, mut instruction: Instruction) -> Result<&mut Self> {
        instruction.address = self.position;
        self.position += instruction.opcode.code_units();
        self.instructions.push(instruction);
        Ok(self)
    }

    fn emit_new(&mut self, opcode: Opcode, registers: &[u16]) -> Result<&mut Self> {
        self.emit(Instruction::new(0, opcode).with_registers(registers))
    }

    fn last_mut(&mut self) -> Result<&mut Instruction> {
        self.instructions
            .last_mut()
            .ok_or_else(|| malformed_error!("No instruction emitted"))
    }

    fn expect(opcode: Opcode, allowed: bool, family: &str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(malformed_error!(
                "'{}' is not a {} instruction",
                opcode.mnemonic(),
                family
            ))
        }
    }

    /// `nop`
    pub fn nop(&mut self) -> Result<&mut Self> {
        self.emit_new(Opcode::Nop, &[])
    }

    /// Loads a 32-bit constant using the shortest `const` form that holds it.
    pub fn const_int(&mut self, register: u16, value: i32) -> Result<&mut Self> {
        let opcode = if (-8..8).contains(&value) && register < 16 {
            Opcode::Const4
        } else if i16::try_from(value).is_ok() {
            Opcode::Const16
        } else {
            Opcode::Const
        };
        self.emit_new(opcode, &[register])?;
        self.last_mut()?.literal = Some(i64::from(value));
        Ok(self)
    }

    /// Loads a 64-bit constant into a register pair.
    pub fn const_wide(&mut self, register: u16, value: i64) -> Result<&mut Self> {
        let opcode = if i16::try_from(value).is_ok() {
            Opcode::ConstWide16
        } else if i32::try_from(value).is_ok() {
            Opcode::ConstWide32
        } else {
            Opcode::ConstWide
        };
        self.emit_new(opcode, &[register])?;
        self.last_mut()?.literal = Some(value);
        Ok(self)
    }

    /// Loads the bit pattern of a float with `const`.
    pub fn const_float(&mut self, register: u16, value: f32) -> Result<&mut Self> {
        self.emit_new(Opcode::Const, &[register])?;
        self.last_mut()?.literal = Some(i64::from(value.to_bits() as i32));
        Ok(self)
    }

    /// Loads the bit pattern of a double with `const-wide`.
    pub fn const_double(&mut self, register: u16, value: f64) -> Result<&mut Self> {
        self.emit_new(Opcode::ConstWide, &[register])?;
        self.last_mut()?.literal = Some(value.to_bits() as i64);
        Ok(self)
    }

    /// `const-string`
    pub fn const_string(&mut self, register: u16, value: &str) -> Result<&mut Self> {
        self.emit_new(Opcode::ConstString, &[register])?;
        self.last_mut()?.reference = Some(Reference::String(value.to_string()));
        Ok(self)
    }

    /// `const-class`
    pub fn const_class(&mut self, register: u16, descriptor: &str) -> Result<&mut Self> {
        self.emit_new(Opcode::ConstClass, &[register])?;
        self.last_mut()?.reference = Some(Reference::Type(descriptor.to_string()));
        Ok(self)
    }

    /// Any `move`, `move-wide` or `move-object` form.
    pub fn mov(&mut self, opcode: Opcode, dest: u16, src: u16) -> Result<&mut Self> {
        Self::expect(
            opcode,
            matches!(
                opcode,
                Opcode::Move
                    | Opcode::MoveFrom16
                    | Opcode::Move16
                    | Opcode::MoveWide
                    | Opcode::MoveWideFrom16
                    | Opcode::MoveWide16
                    | Opcode::MoveObject
                    | Opcode::MoveObjectFrom16
                    | Opcode::MoveObject16
            ),
            "move",
        )?;
        self.emit_new(opcode, &[dest, src])
    }

    /// `move-result`, `move-result-wide` or `move-result-object`.
    pub fn move_result(&mut self, opcode: Opcode, register: u16) -> Result<&mut Self> {
        Self::expect(
            opcode,
            matches!(
                opcode,
                Opcode::MoveResult | Opcode::MoveResultWide | Opcode::MoveResultObject
            ),
            "move-result",
        )?;
        self.emit_new(opcode, &[register])
    }

    /// `move-exception`
    pub fn move_exception(&mut self, register: u16) -> Result<&mut Self> {
        self.emit_new(Opcode::MoveException, &[register])
    }

    /// `return-void`
    pub fn return_void(&mut self) -> Result<&mut Self> {
        self.emit_new(Opcode::ReturnVoid, &[])
    }

    /// `return`, `return-wide` or `return-object`.
    pub fn return_value(&mut self, opcode: Opcode, register: u16) -> Result<&mut Self> {
        Self::expect(
            opcode,
            opcode.flow() == FlowType::Return && opcode != Opcode::ReturnVoid,
            "value return",
        )?;
        self.emit_new(opcode, &[register])
    }

    /// `goto` to a label.
    pub fn goto(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(Opcode::Goto, &[], label)
    }

    /// Two-register `if-*` to a label.
    pub fn if_test(&mut self, opcode: Opcode, a: u16, b: u16, label: &str) -> Result<&mut Self> {
        Self::expect(
            opcode,
            matches!(
                opcode,
                Opcode::IfEq
                    | Opcode::IfNe
                    | Opcode::IfLt
                    | Opcode::IfGe
                    | Opcode::IfGt
                    | Opcode::IfLe
            ),
            "if-test",
        )?;
        self.emit_branch(opcode, &[a, b], label)
    }

    /// Compare-with-zero `if-*z` to a label.
    pub fn if_testz(&mut self, opcode: Opcode, a: u16, label: &str) -> Result<&mut Self> {
        Self::expect(
            opcode,
            matches!(
                opcode,
                Opcode::IfEqz
                    | Opcode::IfNez
                    | Opcode::IfLtz
                    | Opcode::IfGez
                    | Opcode::IfGtz
                    | Opcode::IfLez
            ),
            "if-testz",
        )?;
        self.emit_branch(opcode, &[a], label)
    }

    fn emit_branch(&mut self, opcode: Opcode, registers: &[u16], label: &str) -> Result<&mut Self> {
        self.emit_new(opcode, registers)?;
        self.fixups.push(LabelFixup {
            label: label.to_string(),
            instruction_index: self.instructions.len() - 1,
        });
        Ok(self)
    }

    /// `packed-switch` or `sparse-switch` with `(key, label)` cases.
    pub fn switch(
        &mut self,
        opcode: Opcode,
        register: u16,
        cases: &[(i32, &str)],
    ) -> Result<&mut Self> {
        Self::expect(opcode, opcode.flow() == FlowType::Switch, "switch")?;
        self.emit_new(opcode, &[register])?;
        self.switch_fixups.push(SwitchFixup {
            cases: cases.iter().map(|(k, l)| (*k, (*l).to_string())).collect(),
            instruction_index: self.instructions.len() - 1,
        });
        Ok(self)
    }

    /// `cmpl-*`, `cmpg-*` or `cmp-long`.
    pub fn cmp(&mut self, opcode: Opcode, dest: u16, a: u16, b: u16) -> Result<&mut Self> {
        Self::expect(
            opcode,
            matches!(
                opcode,
                Opcode::CmplFloat
                    | Opcode::CmpgFloat
                    | Opcode::CmplDouble
                    | Opcode::CmpgDouble
                    | Opcode::CmpLong
            ),
            "compare",
        )?;
        self.emit_new(opcode, &[dest, a, b])
    }

    /// Three-register arithmetic.
    pub fn binary(&mut self, opcode: Opcode, dest: u16, a: u16, b: u16) -> Result<&mut Self> {
        Self::expect(
            opcode,
            crate::emulation::opcode::math::BinaryOperator::of(opcode).is_some()
                && !opcode.is_two_address()
                && !opcode.is_literal_math(),
            "binary",
        )?;
        self.emit_new(opcode, &[dest, a, b])
    }

    /// `/2addr` arithmetic, `a = a op b`.
    pub fn binary_2addr(&mut self, opcode: Opcode, a: u16, b: u16) -> Result<&mut Self> {
        Self::expect(opcode, opcode.is_two_address(), "/2addr")?;
        self.emit_new(opcode, &[a, b])
    }

    /// `/lit8`, `/lit16` and `rsub-int` arithmetic.
    pub fn binary_lit(
        &mut self,
        opcode: Opcode,
        dest: u16,
        src: u16,
        literal: i32,
    ) -> Result<&mut Self> {
        Self::expect(opcode, opcode.is_literal_math(), "literal arithmetic")?;
        self.emit_new(opcode, &[dest, src])?;
        self.last_mut()?.literal = Some(i64::from(literal));
        Ok(self)
    }

    /// Negation, bitwise not or primitive conversion.
    pub fn unary(&mut self, opcode: Opcode, dest: u16, src: u16) -> Result<&mut Self> {
        Self::expect(opcode, opcode.is_unary(), "unary")?;
        self.emit_new(opcode, &[dest, src])
    }

    /// Any `sget*` with a field in smali form.
    pub fn sget(&mut self, opcode: Opcode, register: u16, field: &str) -> Result<&mut Self> {
        Self::expect(opcode, opcode.mnemonic().starts_with("sget"), "sget")?;
        let field = FieldRef::parse(field)?;
        self.emit_new(opcode, &[register])?;
        self.last_mut()?.reference = Some(Reference::Field(field));
        Ok(self)
    }

    /// Any `sput*` with a field in smali form.
    pub fn sput(&mut self, opcode: Opcode, register: u16, field: &str) -> Result<&mut Self> {
        Self::expect(opcode, opcode.mnemonic().starts_with("sput"), "sput")?;
        let field = FieldRef::parse(field)?;
        self.emit_new(opcode, &[register])?;
        self.last_mut()?.reference = Some(Reference::Field(field));
        Ok(self)
    }

    /// Any `invoke-*` with a method in smali form.
    pub fn invoke(&mut self, opcode: Opcode, registers: &[u16], method: &str) -> Result<&mut Self> {
        Self::expect(opcode, opcode.is_invoke(), "invoke")?;
        let method = MethodRef::parse(method)?;
        self.emit_new(opcode, registers)?;
        self.last_mut()?.reference = Some(Reference::Method(method));
        Ok(self)
    }

    /// `monitor-enter`
    pub fn monitor_enter(&mut self, register: u16) -> Result<&mut Self> {
        self.emit_new(Opcode::MonitorEnter, &[register])
    }

    /// `monitor-exit`
    pub fn monitor_exit(&mut self, register: u16) -> Result<&mut Self> {
        self.emit_new(Opcode::MonitorExit, &[register])
    }

    /// `throw`
    pub fn throw(&mut self, register: u16) -> Result<&mut Self> {
        self.emit_new(Opcode::Throw, &[register])
    }

    /// Protects `[start, end)` with catch clauses given as `(exception type, handler label)`.
    ///
    /// A `None` type is a `catchall`. Blocks registered earlier take priority.
    pub fn try_catch(
        &mut self,
        start: &str,
        end: &str,
        handlers: &[(Option<&str>, &str)],
    ) -> Result<&mut Self> {
        self.try_fixups.push(TryFixup {
            start: start.to_string(),
            end: end.to_string(),
            handlers: handlers
                .iter()
                .map(|(ty, label)| (ty.map(str::to_string), (*label).to_string()))
                .collect(),
        });
        Ok(self)
    }

    fn resolve(&self, label: &str) -> Result<u32> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| malformed_error!("Undefined label '{}'", label))
    }

    fn offset_to(&self, from: u32, label: &str) -> Result<i32> {
        let target = i64::from(self.resolve(label)?);
        i32::try_from(target - i64::from(from))
            .map_err(|_| malformed_error!("Branch to '{}' out of range", label))
    }

    /// Resolves every label and returns the finished body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a referenced label was never bound.
    pub fn finish(mut self) -> Result<MethodImplementation> {
        let fixups = std::mem::take(&mut self.fixups);
        for fixup in &fixups {
            let from = self.instructions[fixup.instruction_index].address;
            let offset = self.offset_to(from, &fixup.label)?;
            self.instructions[fixup.instruction_index].branch_offset = Some(offset);
        }

        let switch_fixups = std::mem::take(&mut self.switch_fixups);
        for fixup in &switch_fixups {
            let from = self.instructions[fixup.instruction_index].address;
            let mut targets = Vec::with_capacity(fixup.cases.len());
            for (key, label) in &fixup.cases {
                targets.push(SwitchTarget {
                    key: *key,
                    offset: self.offset_to(from, label)?,
                });
            }
            self.instructions[fixup.instruction_index].switch_targets = targets;
        }

        let mut try_blocks = Vec::with_capacity(self.try_fixups.len());
        for fixup in &self.try_fixups {
            let mut handlers = Vec::with_capacity(fixup.handlers.len());
            for (exception_type, label) in &fixup.handlers {
                handlers.push(CatchHandler {
                    exception_type: exception_type.clone(),
                    handler: self.resolve(label)?,
                });
            }
            try_blocks.push(TryBlock {
                start: self.resolve(&fixup.start)?,
                end: self.resolve(&fixup.end)?,
                handlers,
            });
        }

        Ok(MethodImplementation::new(
            self.register_count,
            self.instructions,
            try_blocks,
        ))
    }
}
