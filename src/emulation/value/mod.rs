//! The known/unknown value model.
//!
//! Every register and field holds a [`Value`]: either a *known* [`RawValue`] together with
//! its declared type descriptor, or an *unknown* that only carries the declared type.
//!
//! # Equality
//!
//! Two notions of equality exist:
//!
//! - `==` ([`PartialEq`]) is strict. An unknown value is never equal to anything, itself
//!   included, because two unknowns may stand for different runtime values.
//! - [`Value::consensus_eq`] is used when merging paths. Unknowns of the same declared type
//!   are equal to each other, so a register that is unknown on every path has a stable
//!   unknown consensus. An unknown is never consensus-equal to a known value.
//!
//! # Consensus
//!
//! [`consensus`] merges the values observed on several paths: if they all agree the result
//! is that value, otherwise an unknown of the first-seen declared type.
//!
//! ```rust
//! use smaliscope::emulation::{consensus, Value};
//!
//! let a = Value::int(3);
//! let b = Value::int(4);
//! assert_eq!(consensus([&a, &a]), Some(a.clone()));
//! assert!(consensus([&a, &b]).is_some_and(|v| v.is_unknown() && v.ty() == "I"));
//! ```

mod raw;

use std::{fmt, sync::Arc};

use crate::metadata::types;

pub use raw::{ClassObject, ClassOrigin, RawValue, ThrownException};

/// A register or field value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Statically determined value
    Known {
        /// The payload
        raw: RawValue,
        /// Declared type descriptor
        ty: Arc<str>,
    },
    /// Value whose content could not be determined
    Unknown {
        /// Declared type descriptor
        ty: Arc<str>,
    },
}

impl Value {
    /// Wraps a payload with its declared type.
    pub fn wrap(raw: RawValue, ty: impl Into<Arc<str>>) -> Self {
        Value::Known { raw, ty: ty.into() }
    }

    /// An unknown value of the declared type.
    pub fn unknown(ty: impl Into<Arc<str>>) -> Self {
        Value::Unknown { ty: ty.into() }
    }

    /// Known `int`.
    #[must_use]
    pub fn int(v: i32) -> Self {
        Value::wrap(RawValue::Int(v), types::INTEGER)
    }

    /// Known `long`.
    #[must_use]
    pub fn long(v: i64) -> Self {
        Value::wrap(RawValue::Long(v), types::LONG)
    }

    /// Known `float`.
    #[must_use]
    pub fn float(v: f32) -> Self {
        Value::wrap(RawValue::Float(v), types::FLOAT)
    }

    /// Known `double`.
    #[must_use]
    pub fn double(v: f64) -> Self {
        Value::wrap(RawValue::Double(v), types::DOUBLE)
    }

    /// Known `boolean`.
    #[must_use]
    pub fn boolean(v: bool) -> Self {
        Value::wrap(RawValue::Boolean(v), types::BOOLEAN)
    }

    /// Known `java.lang.String`.
    #[must_use]
    pub fn string(v: &str) -> Self {
        Value::wrap(RawValue::String(Arc::from(v)), types::STRING)
    }

    /// `null` of a reference type.
    pub fn null(ty: impl Into<Arc<str>>) -> Self {
        Value::wrap(RawValue::Null, ty)
    }

    /// Known `java.lang.Class`.
    #[must_use]
    pub fn class(class: ClassObject) -> Self {
        Value::wrap(RawValue::Class(class), types::CLASS)
    }

    /// A thrown exception, typed by its own class.
    #[must_use]
    pub fn throwable(exception: ThrownException) -> Self {
        let ty = exception.class_name.clone();
        Value::wrap(RawValue::Throwable(Arc::new(exception)), ty)
    }

    /// Returns `true` only for values built with [`Value::unknown`].
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown { .. })
    }

    /// Returns `true` for known values.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !self.is_unknown()
    }

    /// Declared type descriptor.
    #[must_use]
    pub fn ty(&self) -> &str {
        match self {
            Value::Known { ty, .. } | Value::Unknown { ty } => ty,
        }
    }

    /// Payload of a known value.
    #[must_use]
    pub fn raw(&self) -> Option<&RawValue> {
        match self {
            Value::Known { raw, .. } => Some(raw),
            Value::Unknown { .. } => None,
        }
    }

    /// The same content under another declared type.
    #[must_use]
    pub fn retyped(&self, ty: impl Into<Arc<str>>) -> Value {
        match self {
            Value::Known { raw, .. } => Value::wrap(raw.clone(), ty),
            Value::Unknown { .. } => Value::unknown(ty),
        }
    }

    /// Integral content truncated to 32 bits.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().map(|v| v as i32)
    }

    /// Integral content.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.raw().and_then(RawValue::as_i64)
    }

    /// See [`RawValue::as_f32`].
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        self.raw().and_then(RawValue::as_f32)
    }

    /// See [`RawValue::as_f64`].
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.raw().and_then(RawValue::as_f64)
    }

    /// Content of a known string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self.raw() {
            Some(RawValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Content of a known class object.
    #[must_use]
    pub fn as_class(&self) -> Option<&ClassObject> {
        match self.raw() {
            Some(RawValue::Class(c)) => Some(c),
            _ => None,
        }
    }

    /// Content of a known exception.
    #[must_use]
    pub fn as_throwable(&self) -> Option<&ThrownException> {
        match self.raw() {
            Some(RawValue::Throwable(t)) => Some(t),
            _ => None,
        }
    }

    /// Equality used when merging paths.
    ///
    /// Like `==`, except that unknowns of the same declared type are equal.
    #[must_use]
    pub fn consensus_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unknown { ty: a }, Value::Unknown { ty: b }) => a == b,
            _ => self == other,
        }
    }

    /// Greatest lower bound of two path values.
    ///
    /// Agreeing values are kept, anything else degrades to an unknown of `self`'s type.
    #[must_use]
    pub fn meet(&self, other: &Value) -> Value {
        if self.consensus_eq(other) {
            self.clone()
        } else {
            Value::unknown(self.ty())
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Known { raw: a, ty: ta }, Value::Known { raw: b, ty: tb }) => {
                ta == tb && a == b
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Known { raw, ty } => write!(f, "{raw} ({ty})"),
            Value::Unknown { ty } => write!(f, "Unknown({ty})"),
        }
    }
}

/// Merges the values several terminating paths hold for one register or field.
///
/// Returns `None` for an empty input. Type disagreement between paths violates the
/// engine's typing invariant; it is logged and the first-seen type wins.
pub fn consensus<'a, I>(values: I) -> Option<Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut iter = values.into_iter();
    let first = iter.next()?;
    let mut merged = first.clone();
    for value in iter {
        if value.ty() != first.ty() {
            log::warn!(
                "consensus over mismatched types: {} vs {}",
                first.ty(),
                value.ty()
            );
        }
        merged = merged.meet(value);
    }
    Some(merged)
}
