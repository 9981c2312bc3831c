//! The Dalvik opcodes understood by the engine.
//!
//! [`Opcode`] is a closed enum whose string form is the smali mnemonic, so instruction
//! records coming from a text or binary front end can be mapped with `str::parse`:
//!
//! ```rust
//! use smaliscope::assembly::{FlowType, Opcode};
//!
//! let op: Opcode = "cmpg-double".parse().unwrap();
//! assert_eq!(op, Opcode::CmpgDouble);
//! assert_eq!(Opcode::AddInt2addr.mnemonic(), "add-int/2addr");
//! assert_eq!(Opcode::IfEqz.flow(), FlowType::ConditionalBranch);
//! ```

use strum::{EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Control-flow behaviour of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Execution continues with the next instruction
    Sequential,
    /// Branches to a target or falls through
    ConditionalBranch,
    /// Always branches to a target
    UnconditionalBranch,
    /// Multi-way branch
    Switch,
    /// Invokes another method, then continues with the next instruction
    Call,
    /// Leaves the method normally
    Return,
    /// Raises an exception
    Throw,
}

/// A Dalvik opcode, named by its smali mnemonic.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter, EnumCount,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Opcode {
    Nop,

    Move,
    #[strum(serialize = "move/from16")]
    MoveFrom16,
    #[strum(serialize = "move/16")]
    Move16,
    MoveWide,
    #[strum(serialize = "move-wide/from16")]
    MoveWideFrom16,
    #[strum(serialize = "move-wide/16")]
    MoveWide16,
    MoveObject,
    #[strum(serialize = "move-object/from16")]
    MoveObjectFrom16,
    #[strum(serialize = "move-object/16")]
    MoveObject16,
    MoveResult,
    MoveResultWide,
    MoveResultObject,
    MoveException,

    ReturnVoid,
    Return,
    ReturnWide,
    ReturnObject,

    #[strum(serialize = "const/4")]
    Const4,
    #[strum(serialize = "const/16")]
    Const16,
    Const,
    #[strum(serialize = "const/high16")]
    ConstHigh16,
    #[strum(serialize = "const-wide/16")]
    ConstWide16,
    #[strum(serialize = "const-wide/32")]
    ConstWide32,
    ConstWide,
    #[strum(serialize = "const-wide/high16")]
    ConstWideHigh16,
    ConstString,
    #[strum(serialize = "const-string/jumbo")]
    ConstStringJumbo,
    ConstClass,

    MonitorEnter,
    MonitorExit,
    Throw,

    Goto,
    #[strum(serialize = "goto/16")]
    Goto16,
    #[strum(serialize = "goto/32")]
    Goto32,
    PackedSwitch,
    SparseSwitch,

    CmplFloat,
    CmpgFloat,
    CmplDouble,
    CmpgDouble,
    CmpLong,

    IfEq,
    IfNe,
    IfLt,
    IfGe,
    IfGt,
    IfLe,
    IfEqz,
    IfNez,
    IfLtz,
    IfGez,
    IfGtz,
    IfLez,

    Sget,
    SgetWide,
    SgetObject,
    SgetBoolean,
    SgetByte,
    SgetChar,
    SgetShort,
    Sput,
    SputWide,
    SputObject,
    SputBoolean,
    SputByte,
    SputChar,
    SputShort,

    InvokeVirtual,
    InvokeSuper,
    InvokeDirect,
    InvokeStatic,
    InvokeInterface,
    #[strum(serialize = "invoke-virtual/range")]
    InvokeVirtualRange,
    #[strum(serialize = "invoke-super/range")]
    InvokeSuperRange,
    #[strum(serialize = "invoke-direct/range")]
    InvokeDirectRange,
    #[strum(serialize = "invoke-static/range")]
    InvokeStaticRange,
    #[strum(serialize = "invoke-interface/range")]
    InvokeInterfaceRange,

    NegInt,
    NotInt,
    NegLong,
    NotLong,
    NegFloat,
    NegDouble,
    IntToLong,
    IntToFloat,
    IntToDouble,
    LongToInt,
    LongToFloat,
    LongToDouble,
    FloatToInt,
    FloatToLong,
    FloatToDouble,
    DoubleToInt,
    DoubleToLong,
    DoubleToFloat,
    IntToByte,
    IntToChar,
    IntToShort,

    AddInt,
    SubInt,
    MulInt,
    DivInt,
    RemInt,
    AndInt,
    OrInt,
    XorInt,
    ShlInt,
    ShrInt,
    UshrInt,
    AddLong,
    SubLong,
    MulLong,
    DivLong,
    RemLong,
    AndLong,
    OrLong,
    XorLong,
    ShlLong,
    ShrLong,
    UshrLong,
    AddFloat,
    SubFloat,
    MulFloat,
    DivFloat,
    RemFloat,
    AddDouble,
    SubDouble,
    MulDouble,
    DivDouble,
    RemDouble,

    #[strum(serialize = "add-int/2addr")]
    AddInt2addr,
    #[strum(serialize = "sub-int/2addr")]
    SubInt2addr,
    #[strum(serialize = "mul-int/2addr")]
    MulInt2addr,
    #[strum(serialize = "div-int/2addr")]
    DivInt2addr,
    #[strum(serialize = "rem-int/2addr")]
    RemInt2addr,
    #[strum(serialize = "and-int/2addr")]
    AndInt2addr,
    #[strum(serialize = "or-int/2addr")]
    OrInt2addr,
    #[strum(serialize = "xor-int/2addr")]
    XorInt2addr,
    #[strum(serialize = "shl-int/2addr")]
    ShlInt2addr,
    #[strum(serialize = "shr-int/2addr")]
    ShrInt2addr,
    #[strum(serialize = "ushr-int/2addr")]
    UshrInt2addr,
    #[strum(serialize = "add-long/2addr")]
    AddLong2addr,
    #[strum(serialize = "sub-long/2addr")]
    SubLong2addr,
    #[strum(serialize = "mul-long/2addr")]
    MulLong2addr,
    #[strum(serialize = "div-long/2addr")]
    DivLong2addr,
    #[strum(serialize = "rem-long/2addr")]
    RemLong2addr,
    #[strum(serialize = "and-long/2addr")]
    AndLong2addr,
    #[strum(serialize = "or-long/2addr")]
    OrLong2addr,
    #[strum(serialize = "xor-long/2addr")]
    XorLong2addr,
    #[strum(serialize = "shl-long/2addr")]
    ShlLong2addr,
    #[strum(serialize = "shr-long/2addr")]
    ShrLong2addr,
    #[strum(serialize = "ushr-long/2addr")]
    UshrLong2addr,
    #[strum(serialize = "add-float/2addr")]
    AddFloat2addr,
    #[strum(serialize = "sub-float/2addr")]
    SubFloat2addr,
    #[strum(serialize = "mul-float/2addr")]
    MulFloat2addr,
    #[strum(serialize = "div-float/2addr")]
    DivFloat2addr,
    #[strum(serialize = "rem-float/2addr")]
    RemFloat2addr,
    #[strum(serialize = "add-double/2addr")]
    AddDouble2addr,
    #[strum(serialize = "sub-double/2addr")]
    SubDouble2addr,
    #[strum(serialize = "mul-double/2addr")]
    MulDouble2addr,
    #[strum(serialize = "div-double/2addr")]
    DivDouble2addr,
    #[strum(serialize = "rem-double/2addr")]
    RemDouble2addr,

    #[strum(serialize = "add-int/lit16")]
    AddIntLit16,
    #[strum(serialize = "rsub-int")]
    RsubInt,
    #[strum(serialize = "mul-int/lit16")]
    MulIntLit16,
    #[strum(serialize = "div-int/lit16")]
    DivIntLit16,
    #[strum(serialize = "rem-int/lit16")]
    RemIntLit16,
    #[strum(serialize = "and-int/lit16")]
    AndIntLit16,
    #[strum(serialize = "or-int/lit16")]
    OrIntLit16,
    #[strum(serialize = "xor-int/lit16")]
    XorIntLit16,
    #[strum(serialize = "add-int/lit8")]
    AddIntLit8,
    #[strum(serialize = "rsub-int/lit8")]
    RsubIntLit8,
    #[strum(serialize = "mul-int/lit8")]
    MulIntLit8,
    #[strum(serialize = "div-int/lit8")]
    DivIntLit8,
    #[strum(serialize = "rem-int/lit8")]
    RemIntLit8,
    #[strum(serialize = "and-int/lit8")]
    AndIntLit8,
    #[strum(serialize = "or-int/lit8")]
    OrIntLit8,
    #[strum(serialize = "xor-int/lit8")]
    XorIntLit8,
    #[strum(serialize = "shl-int/lit8")]
    ShlIntLit8,
    #[strum(serialize = "shr-int/lit8")]
    ShrIntLit8,
    #[strum(serialize = "ushr-int/lit8")]
    UshrIntLit8,
}

impl Opcode {
    /// The smali mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Control-flow behaviour.
    #[must_use]
    pub fn flow(self) -> FlowType {
        use Opcode::*;
        match self {
            Goto | Goto16 | Goto32 => FlowType::UnconditionalBranch,
            IfEq | IfNe | IfLt | IfGe | IfGt | IfLe | IfEqz | IfNez | IfLtz | IfGez | IfGtz
            | IfLez => FlowType::ConditionalBranch,
            PackedSwitch | SparseSwitch => FlowType::Switch,
            ReturnVoid | Return | ReturnWide | ReturnObject => FlowType::Return,
            Throw => FlowType::Throw,
            InvokeVirtual | InvokeSuper | InvokeDirect | InvokeStatic | InvokeInterface
            | InvokeVirtualRange | InvokeSuperRange | InvokeDirectRange | InvokeStaticRange
            | InvokeInterfaceRange => FlowType::Call,
            _ => FlowType::Sequential,
        }
    }

    /// Encoded size in 16-bit code units.
    #[must_use]
    pub fn code_units(self) -> u32 {
        use Opcode::*;
        match self {
            Nop | Move | MoveWide | MoveObject | MoveResult | MoveResultWide
            | MoveResultObject | MoveException | ReturnVoid | Return | ReturnWide
            | ReturnObject | Const4 | MonitorEnter | MonitorExit | Throw | Goto => 1,
            Move16 | MoveWide16 | MoveObject16 | Const | ConstWide32 | ConstStringJumbo
            | Goto32 | PackedSwitch | SparseSwitch => 3,
            ConstWide => 5,
            other if other.is_invoke() => 3,
            other if other.is_unary() || other.is_two_address() => 1,
            _ => 2,
        }
    }

    /// Returns `true` for every `invoke-*` form.
    #[must_use]
    pub fn is_invoke(self) -> bool {
        self.flow() == FlowType::Call
    }

    /// Returns `true` for `/range` invokes, whose register list is a contiguous run.
    #[must_use]
    pub fn is_range_invoke(self) -> bool {
        matches!(
            self,
            Opcode::InvokeVirtualRange
                | Opcode::InvokeSuperRange
                | Opcode::InvokeDirectRange
                | Opcode::InvokeStaticRange
                | Opcode::InvokeInterfaceRange
        )
    }

    /// Returns `true` for `invoke-static` and its range form.
    #[must_use]
    pub fn is_static_invoke(self) -> bool {
        matches!(self, Opcode::InvokeStatic | Opcode::InvokeStaticRange)
    }

    /// Returns `true` for negations, bitwise not and primitive conversions.
    #[must_use]
    pub fn is_unary(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            NegInt
                | NotInt
                | NegLong
                | NotLong
                | NegFloat
                | NegDouble
                | IntToLong
                | IntToFloat
                | IntToDouble
                | LongToInt
                | LongToFloat
                | LongToDouble
                | FloatToInt
                | FloatToLong
                | FloatToDouble
                | DoubleToInt
                | DoubleToLong
                | DoubleToFloat
                | IntToByte
                | IntToChar
                | IntToShort
        )
    }

    /// Returns `true` for the `/2addr` arithmetic forms.
    #[must_use]
    pub fn is_two_address(self) -> bool {
        self.mnemonic().ends_with("/2addr")
    }

    /// Returns `true` for `/lit8`, `/lit16` and `rsub-int`.
    #[must_use]
    pub fn is_literal_math(self) -> bool {
        let m = self.mnemonic();
        m.ends_with("/lit8") || m.ends_with("/lit16") || self == Opcode::RsubInt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_mnemonic_parses_back_to_its_opcode() {
        for op in Opcode::iter() {
            let parsed: Opcode = op.mnemonic().parse().unwrap();
            assert_eq!(parsed, op, "{}", op.mnemonic());
        }
    }

    #[test]
    fn kebab_case_mnemonics() {
        assert_eq!(Opcode::MoveResultObject.mnemonic(), "move-result-object");
        assert_eq!(Opcode::InvokeStaticRange.mnemonic(), "invoke-static/range");
        assert_eq!(Opcode::Const4.mnemonic(), "const/4");
        assert_eq!(Opcode::IntToChar.mnemonic(), "int-to-char");
        assert_eq!(Opcode::RsubIntLit8.mnemonic(), "rsub-int/lit8");
    }

    #[test]
    fn code_units_follow_instruction_formats() {
        assert_eq!(Opcode::Const4.code_units(), 1);
        assert_eq!(Opcode::Const16.code_units(), 2);
        assert_eq!(Opcode::Const.code_units(), 3);
        assert_eq!(Opcode::ConstWide.code_units(), 5);
        assert_eq!(Opcode::InvokeStatic.code_units(), 3);
        assert_eq!(Opcode::AddInt2addr.code_units(), 1);
        assert_eq!(Opcode::AddInt.code_units(), 2);
        assert_eq!(Opcode::NegFloat.code_units(), 1);
        assert_eq!(Opcode::CmplFloat.code_units(), 2);
    }

    #[test]
    fn literal_and_two_address_forms_are_classified() {
        assert!(Opcode::RsubInt.is_literal_math());
        assert!(Opcode::ShlIntLit8.is_literal_math());
        assert!(!Opcode::ShlInt.is_literal_math());
        assert!(Opcode::RemDouble2addr.is_two_address());
        assert!(Opcode::InvokeInterfaceRange.is_range_invoke());
        assert!(!Opcode::InvokeInterface.is_range_invoke());
    }
}
