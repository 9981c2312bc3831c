//! # smaliscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the smaliscope library. Import this module to get quick access to the essential
//! types for exploring methods and querying their consensus.
//!
//! ```rust
//! use smaliscope::prelude::*;
//!
//! let config = VmConfig::default();
//! assert!(config.is_safe("Ljava/lang/String;"));
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all smaliscope operations
pub use crate::Error;

/// The result type used throughout smaliscope
pub use crate::Result;

// ================================================================================================
// Instruction Records
// ================================================================================================

/// Method bodies, instructions and the assembler that builds them
pub use crate::assembly::{
    CatchHandler, Instruction, MethodAssembler, MethodImplementation, Opcode, Reference, TryBlock,
};

// ================================================================================================
// Class Repository
// ================================================================================================

/// Classes, fields, methods and their symbolic references
pub use crate::metadata::{
    AccessFlags, ClassManager, ClassManagerBuilder, FieldRef, MethodRef, VirtualClass,
    VirtualField, VirtualMethod,
};

// ================================================================================================
// Emulation
// ================================================================================================

/// The driver and its configuration
pub use crate::emulation::{ExplorationLimits, VirtualMachine, VmConfig};

/// Explored graphs and their nodes
pub use crate::emulation::{ExecutionGraph, ExecutionNode, NodeId, NodeOutcome};

/// Values and per-path state
pub use crate::emulation::{
    consensus, ClassInitLevel, ClassObject, ExecutionState, FieldKey, RawValue, ThrownException,
    Value,
};

/// Extension points
pub use crate::emulation::{
    EmulatedCallRegistry, EmulatedMethodCall, Invocation, OpChild, OpContext, OpFactoryRegistry,
    PlatformClassLoader,
};

/// Internal faults and modeled exception classes
pub use crate::emulation::{modeled_exception, EmulationError};
