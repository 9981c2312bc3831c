//! Emulation error types.
//!
//! [`EmulationError`] describes conditions that abort exploration of a whole method: engine
//! invariant violations, instruction shapes the engine cannot interpret, and exhausted
//! exploration bounds. Exceptions raised by the analyzed program are *not* represented here;
//! they are thrown values built from the class names in [`modeled_exception`].

use std::fmt;

/// Exception classes the engine raises on behalf of the analyzed program.
///
/// | Constant                   | Raised when                                         |
/// |----------------------------|-----------------------------------------------------|
/// | `CLASS_NOT_FOUND`          | reflective class lookup fails                       |
/// | `ARITHMETIC`               | integer division or remainder by zero               |
/// | `NULL_POINTER`             | `throw` of a null reference                         |
/// | `EXCEPTION_IN_INITIALIZER` | a static initializer terminates by throwing         |
pub mod modeled_exception {
    /// `java.lang.ClassNotFoundException`
    pub const CLASS_NOT_FOUND: &str = "Ljava/lang/ClassNotFoundException;";
    /// `java.lang.ArithmeticException`
    pub const ARITHMETIC: &str = "Ljava/lang/ArithmeticException;";
    /// `java.lang.NullPointerException`
    pub const NULL_POINTER: &str = "Ljava/lang/NullPointerException;";
    /// `java.lang.ExceptionInInitializerError`
    pub const EXCEPTION_IN_INITIALIZER: &str = "Ljava/lang/ExceptionInInitializerError;";
}

/// Errors that abort the exploration of a method.
#[derive(Debug, Clone, PartialEq)]
pub enum EmulationError {
    /// An operand held a value of a type the operation cannot interpret.
    TypeMismatch {
        /// Operation being performed.
        operation: &'static str,
        /// Expected type.
        expected: String,
        /// Actual type found.
        found: String,
    },
    /// A register was read before any path assigned it.
    UninitializedRegister {
        /// The register index.
        register: u16,
        /// Address of the reading instruction.
        address: u32,
    },
    /// A branch or switch points outside the method or between instructions.
    InvalidBranchTarget {
        /// Address of the branching instruction.
        address: u32,
        /// The computed target.
        target: i64,
    },
    /// No op factory is registered for the opcode.
    UnsupportedOpcode {
        /// Mnemonic of the opcode.
        mnemonic: &'static str,
    },
    /// An instruction lacks an operand its opcode requires.
    InvalidOperand {
        /// Instruction mnemonic.
        instruction: &'static str,
        /// Description of what was expected.
        expected: &'static str,
    },
    /// More nodes were created than the configured bound allows.
    ExplorationLimitExceeded {
        /// Nodes created so far.
        nodes: usize,
        /// Maximum allowed.
        limit: usize,
    },
    /// One address was reached by more paths than the configured bound allows.
    AddressVisitsExceeded {
        /// The address.
        address: u32,
        /// Nodes at that address.
        visits: usize,
        /// Maximum allowed.
        limit: usize,
    },
    /// Nested static initializers and invokes went deeper than allowed.
    CallDepthExceeded {
        /// Current depth.
        depth: usize,
        /// Maximum allowed.
        limit: usize,
    },
    /// A method that must be executed has no instruction body.
    MissingImplementation {
        /// Signature of the method.
        method: String,
    },
    /// Engine invariant violation.
    InternalError {
        /// What went wrong.
        description: String,
    },
}

impl fmt::Display for EmulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulationError::TypeMismatch {
                operation,
                expected,
                found,
            } => write!(
                f,
                "type mismatch in {operation}: expected {expected}, found {found}"
            ),
            EmulationError::UninitializedRegister { register, address } => {
                write!(f, "read of unassigned register v{register} at {address:#06x}")
            }
            EmulationError::InvalidBranchTarget { address, target } => {
                write!(f, "invalid branch target {target} from {address:#06x}")
            }
            EmulationError::UnsupportedOpcode { mnemonic } => {
                write!(f, "unsupported opcode {mnemonic}")
            }
            EmulationError::InvalidOperand {
                instruction,
                expected,
            } => write!(f, "invalid operand for {instruction}: expected {expected}"),
            EmulationError::ExplorationLimitExceeded { nodes, limit } => {
                write!(f, "exploration limit exceeded: {nodes} nodes (limit {limit})")
            }
            EmulationError::AddressVisitsExceeded {
                address,
                visits,
                limit,
            } => write!(
                f,
                "address {address:#06x} visited {visits} times (limit {limit})"
            ),
            EmulationError::CallDepthExceeded { depth, limit } => {
                write!(f, "call depth exceeded: {depth} (limit {limit})")
            }
            EmulationError::MissingImplementation { method } => {
                write!(f, "no implementation for {method}")
            }
            EmulationError::InternalError { description } => {
                write!(f, "internal error: {description}")
            }
        }
    }
}

impl std::error::Error for EmulationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_limit() {
        let err = EmulationError::ExplorationLimitExceeded {
            nodes: 101,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "exploration limit exceeded: 101 nodes (limit 100)"
        );
    }

    #[test]
    fn converts_into_crate_error() {
        let err: crate::Error = EmulationError::UnsupportedOpcode { mnemonic: "nop" }.into();
        assert!(matches!(err, crate::Error::Emulation(_)));
        assert!(err.to_string().contains("unsupported opcode nop"));
    }
}
