// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # smaliscope
//!
//! A path-exhaustive abstract interpreter for register-based Dalvik/smali bytecode.
//!
//! `smaliscope` executes every reachable control-flow path of a method, including paths
//! whose branch conditions cannot be decided statically, and computes for every register
//! and static field a *consensus value*: the value all terminating paths agree on, or an
//! explicit unknown marker when they disagree. It is meant for static analysis and
//! deobfuscation of Android applications without running them on a device.
//!
//! ## Features
//!
//! - **🧮 Known/unknown value lattice** - every value carries its declared type, unknowns
//!   degrade gracefully
//! - **🌳 Branching exploration** - unresolved conditions fork the path, each fork owns an
//!   O(1) copy of its state
//! - **🔁 Per-path class initialization** - `<clinit>` runs once per path, field effects stay
//!   on that path
//! - **🪞 Emulated platform calls** - reflection and class loading are modeled, not executed
//! - **🧵 Parallel method exploration** - independent methods are explored on the rayon pool
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use smaliscope::prelude::*;
//!
//! # fn main() -> smaliscope::Result<()> {
//! let mut asm = MethodAssembler::new(2);
//! asm.const_int(0, 7)?
//!     .const_int(1, 5)?
//!     .binary(Opcode::AddInt, 0, 0, 1)?
//!     .return_value(Opcode::Return, 0)?;
//!
//! let method = VirtualMethod::new(MethodRef::parse("LDemo;->sum()I")?, AccessFlags::STATIC)
//!     .with_implementation(asm.finish()?);
//! let class = VirtualClass::new("LDemo;").with_method(method);
//! let classes = Arc::new(ClassManagerBuilder::new().add_class(class).build());
//!
//! let vm = VirtualMachine::new(classes, VmConfig::default());
//! let graph = vm.execute("LDemo;", "sum()I")?;
//!
//! let result = graph.terminating_register_consensus(0);
//! assert_eq!(result.and_then(|v| v.as_i32()), Some(12));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - instruction records, the opcode table and a label-aware method assembler
//! - [`metadata`] - virtual classes, fields and methods plus the read-only
//!   [`metadata::ClassManager`]
//! - [`emulation`] - values, per-path state, op dispatch, emulated calls, the execution graph and
//!   the [`emulation::VirtualMachine`] driver
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`]. Internal engine faults and configured limits are
//! reported as [`Error::Emulation`]; exceptions raised by the analyzed program are never errors,
//! they are thrown values recorded on the terminating nodes of the execution graph.

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

pub mod assembly;
pub mod emulation;
pub mod metadata;
pub mod prelude;

pub use error::Error;

/// `smaliscope` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
