//! Path-exhaustive abstract interpretation of Dalvik method bodies.
//!
//! The engine executes every reachable path through a method, including both sides of
//! every branch whose condition cannot be decided statically, and reports for each
//! register and static field the value all terminating paths agree on, or an explicit
//! unknown when they do not.
//!
//! # Architecture
//!
//! - Value model: [`Value`] is either a known [`RawValue`] with its declared type or an
//!   unknown carrying only the type
//! - Per-path state: [`ExecutionState`] holds the register file and the path's
//!   [`StaticState`], forked in O(1) through persistent maps
//! - Op dispatch: every instruction is compiled once into an immutable [`Op`] by the
//!   [`OpFactoryRegistry`]; executing it yields [`OpChild`] successors
//! - Method-call emulation: [`EmulatedMethodCall`] handlers replace platform methods
//!   such as `Class.forName` with modeled semantics
//! - Exploration: [`VirtualMachine`] drives a worklist over an [`ExecutionGraph`] and
//!   answers consensus and reachability queries on it
//!
//! # Key Components
//!
//! ## Values
//! - [`Value`], [`RawValue`], [`ClassObject`], [`ThrownException`]
//! - [`consensus`] - merges the values several paths observed
//!
//! ## Execution
//! - [`VirtualMachine`] - compiles, caches and explores methods
//! - [`ExecutionGraph`], [`ExecutionNode`] - explored paths and their queries
//! - [`VmConfig`], [`ExplorationLimits`] - class-safety policy and bounds
//!
//! ## Extension Points
//! - [`OpFactoryRegistry`] - add or replace op factories per opcode
//! - [`EmulatedCallRegistry`] - add or replace emulated platform methods
//! - [`PlatformClassLoader`] - the real loader consulted for safe classes
//!
//! # Usage Examples
//!
//! ```rust
//! use smaliscope::{
//!     assembly::{MethodAssembler, Opcode},
//!     emulation::{modeled_exception, VirtualMachine, VmConfig},
//!     metadata::{AccessFlags, ClassManagerBuilder, MethodRef, VirtualClass, VirtualMethod},
//! };
//!
//! // Class.forName("com.example.Missing") on a class the program does not have
//! let mut asm = MethodAssembler::new(1);
//! asm.const_string(0, "com.example.Missing")?
//!     .invoke(
//!         Opcode::InvokeStatic,
//!         &[0],
//!         "Ljava/lang/Class;->forName(Ljava/lang/String;)Ljava/lang/Class;",
//!     )?
//!     .return_void()?;
//! let method = VirtualMethod::new(MethodRef::parse("LMain;->load()V")?, AccessFlags::STATIC)
//!     .with_implementation(asm.finish()?);
//! let classes = ClassManagerBuilder::new()
//!     .add_class(VirtualClass::new("LMain;").with_method(method))
//!     .build();
//!
//! let vm = VirtualMachine::new(classes, VmConfig::default());
//! let graph = vm.execute("LMain;", "load()V")?;
//! let thrown = graph.terminating_exception_consensus().expect("forName throws");
//! assert_eq!(thrown.ty(), modeled_exception::CLASS_NOT_FOUND);
//! assert!(!graph.was_address_reached(5));
//! # Ok::<(), smaliscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`VirtualMachine`] is `Send + Sync`. Explorations never share mutable state: each
//! graph owns its nodes and each node owns its state.

mod config;
pub mod emulate;
mod error;
mod exception;
pub mod graph;
pub mod opcode;
pub mod runtime;
mod state;
mod value;
mod vm;

pub use config::{ExplorationLimits, VmConfig};
pub use emulate::{EmulatedCallRegistry, EmulatedMethodCall, Invocation};
pub use error::{modeled_exception, EmulationError};
pub use exception::{candidate_handlers, find_handler, thrown_class, HandlerCandidates};
pub use graph::{ExecutionGraph, ExecutionNode, NodeId, NodeOutcome};
pub use opcode::{
    Op, OpChild, OpContext, OpFactory, OpFactoryRegistry, OpProgram, SyntheticStep, Termination,
};
pub use runtime::{KnownPlatformClasses, PlatformClassLoader, SandboxClassLoader, VmServices};
pub use state::{ClassInitLevel, ExecutionState, FieldKey, ParameterSlot, StaticState};
pub use value::{consensus, ClassObject, ClassOrigin, RawValue, ThrownException, Value};
pub use vm::VirtualMachine;
