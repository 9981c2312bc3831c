//! Decoded instruction records and method bodies.
//!
//! An [`Instruction`] is the engine's input unit: one decoded Dalvik instruction with its
//! address (in 16-bit code units from the start of the method), opcode, register operands
//! in format order, and whatever extra operand its format carries (a literal, a branch
//! offset, a constant-pool reference or a resolved switch table).
//!
//! A [`MethodImplementation`] groups the instructions of one method body with its register
//! count and try blocks, and provides the address-to-instruction map the op factories use
//! to resolve branch targets.

use std::{collections::BTreeMap, fmt};

use crate::{
    assembly::opcodes::Opcode,
    metadata::{FieldRef, MethodRef},
};

/// A constant-pool reference operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// `const-string` literal
    String(String),
    /// Type descriptor of `const-class`, `check-cast` and friends
    Type(String),
    /// Field of `sget`/`sput`
    Field(FieldRef),
    /// Method of `invoke-*`
    Method(MethodRef),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::String(s) => write!(f, "{s:?}"),
            Reference::Type(t) => f.write_str(t),
            Reference::Field(field) => write!(f, "{field}"),
            Reference::Method(method) => write!(f, "{method}"),
        }
    }
}

/// One `key -> target` entry of a packed or sparse switch.
///
/// Offsets are relative to the switch instruction, as in the dex payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchTarget {
    /// Case key
    pub key: i32,
    /// Branch offset in code units
    pub offset: i32,
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Address in code units from the start of the method
    pub address: u32,
    /// The opcode
    pub opcode: Opcode,
    /// Register operands in format order (vA, vB, vC, ...)
    pub registers: Vec<u16>,
    /// Literal operand of `const*` and `/lit` forms
    pub literal: Option<i64>,
    /// Branch offset of `goto` and `if-*`, in code units
    pub branch_offset: Option<i32>,
    /// Constant-pool operand
    pub reference: Option<Reference>,
    /// Resolved switch table of `packed-switch`/`sparse-switch`
    pub switch_targets: Vec<SwitchTarget>,
}

impl Instruction {
    /// Creates an instruction with no operands.
    #[must_use]
    pub fn new(address: u32, opcode: Opcode) -> Self {
        Instruction {
            address,
            opcode,
            registers: Vec::new(),
            literal: None,
            branch_offset: None,
            reference: None,
            switch_targets: Vec::new(),
        }
    }

    /// Sets the register operands.
    #[must_use]
    pub fn with_registers(mut self, registers: &[u16]) -> Self {
        self.registers = registers.to_vec();
        self
    }

    /// Sets the literal operand.
    #[must_use]
    pub fn with_literal(mut self, literal: i64) -> Self {
        self.literal = Some(literal);
        self
    }

    /// Sets the branch offset.
    #[must_use]
    pub fn with_branch_offset(mut self, offset: i32) -> Self {
        self.branch_offset = Some(offset);
        self
    }

    /// Sets the reference operand.
    #[must_use]
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Sets the switch table.
    #[must_use]
    pub fn with_switch_targets(mut self, targets: Vec<SwitchTarget>) -> Self {
        self.switch_targets = targets;
        self
    }

    /// The `index`-th register operand.
    #[must_use]
    pub fn register(&self, index: usize) -> Option<u16> {
        self.registers.get(index).copied()
    }

    /// Address of the next instruction in code order.
    #[must_use]
    pub fn next_address(&self) -> u32 {
        self.address + self.opcode.code_units()
    }

    /// Absolute target of a relative branch operand.
    #[must_use]
    pub fn branch_target(&self) -> Option<u32> {
        self.branch_offset.and_then(|o| self.relative(o))
    }

    /// Absolute address `offset` code units away from this instruction.
    #[must_use]
    pub fn relative(&self, offset: i32) -> Option<u32> {
        self.address.checked_add_signed(offset)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}: {}", self.address, self.opcode.mnemonic())?;
        let mut sep = " ";
        for r in &self.registers {
            write!(f, "{sep}v{r}")?;
            sep = ", ";
        }
        if let Some(lit) = self.literal {
            write!(f, "{sep}#{lit}")?;
        }
        if let Some(target) = self.branch_target() {
            write!(f, "{sep}:{target:04x}")?;
        }
        if let Some(reference) = &self.reference {
            write!(f, "{sep}{reference}")?;
        }
        Ok(())
    }
}

/// One `catch` clause of a [`TryBlock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchHandler {
    /// Caught exception class, `None` for `catchall`
    pub exception_type: Option<String>,
    /// Address of the handler's first instruction
    pub handler: u32,
}

/// A protected range `[start, end)` with its catch clauses in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryBlock {
    /// First covered address
    pub start: u32,
    /// First address past the range
    pub end: u32,
    /// Catch clauses, first match wins
    pub handlers: Vec<CatchHandler>,
}

impl TryBlock {
    /// Returns `true` if the block protects `address`.
    #[must_use]
    pub fn covers(&self, address: u32) -> bool {
        self.start <= address && address < self.end
    }
}

/// The body of one method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodImplementation {
    /// Number of registers in the frame, parameters included
    pub register_count: u16,
    /// Instructions in address order
    pub instructions: Vec<Instruction>,
    /// Try blocks, innermost first
    pub try_blocks: Vec<TryBlock>,
}

impl MethodImplementation {
    /// Creates a body from its parts.
    #[must_use]
    pub fn new(
        register_count: u16,
        instructions: Vec<Instruction>,
        try_blocks: Vec<TryBlock>,
    ) -> Self {
        MethodImplementation {
            register_count,
            instructions,
            try_blocks,
        }
    }

    /// Maps every instruction address to its index in [`Self::instructions`].
    #[must_use]
    pub fn address_map(&self) -> BTreeMap<u32, usize> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, insn)| (insn.address, i))
            .collect()
    }

    /// The instruction starting at `address`.
    #[must_use]
    pub fn instruction_at(&self, address: u32) -> Option<&Instruction> {
        self.instructions
            .binary_search_by_key(&address, |i| i.address)
            .ok()
            .map(|i| &self.instructions[i])
    }

    /// Every instruction address in order.
    #[must_use]
    pub fn addresses(&self) -> Vec<u32> {
        self.instructions.iter().map(|i| i.address).collect()
    }

    /// Address of the first instruction.
    #[must_use]
    pub fn entry_address(&self) -> Option<u32> {
        self.instructions.first().map(|i| i.address)
    }
}
