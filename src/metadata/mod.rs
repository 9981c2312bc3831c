//! Class, field and method metadata of the analyzed program.
//!
//! This module is the engine's view of the class repository produced by a dex parser:
//!
//! - [`names`] - conversions between binary (`java.lang.String`) and internal
//!   (`Ljava/lang/String;`) class names
//! - [`types`] - descriptors of the types the engine refers to directly
//! - [`class`] - [`VirtualClass`], [`VirtualField`], [`VirtualMethod`] and the symbolic
//!   [`FieldRef`]/[`MethodRef`] used by instruction operands
//! - [`manager`] - the read-only [`ClassManager`]
//!
//! Nothing in here is mutated once execution starts.

pub mod class;
pub mod manager;
pub mod names;
pub mod types;

pub use class::{
    AccessFlags, FieldRef, MethodRef, VirtualClass, VirtualField, VirtualMethod,
    STATIC_INITIALIZER,
};
pub use manager::{ClassManager, ClassManagerBuilder};
pub use names::{
    array_dimensions, binary_to_internal, component_base, internal_to_binary, internal_to_source,
    is_array, is_primitive, is_wide,
};
