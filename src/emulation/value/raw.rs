//! Raw payloads of known values.

use std::{fmt, sync::Arc};

use crate::metadata::internal_to_binary;

/// Where a modeled `java.lang.Class` instance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassOrigin {
    /// Loaded by the real platform loader, only ever for safe classes
    Platform,
    /// Loaded through the sandbox from the analyzed program's classes
    Sandbox,
}

/// A modeled `java.lang.Class` instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassObject {
    /// Internal name of the represented class
    pub name: Arc<str>,
    /// Loader that produced it
    pub origin: ClassOrigin,
}

impl ClassObject {
    /// Creates a class object.
    pub fn new(name: impl Into<Arc<str>>, origin: ClassOrigin) -> Self {
        ClassObject {
            name: name.into(),
            origin,
        }
    }

    /// Name as returned by `Class.getName()`.
    #[must_use]
    pub fn binary_name(&self) -> String {
        internal_to_binary(&self.name)
    }
}

/// A modeled exception instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrownException {
    /// Internal name of the exception class
    pub class_name: Arc<str>,
    /// Detail message
    pub message: Option<Arc<str>>,
}

impl ThrownException {
    /// Creates an exception with a detail message.
    pub fn new(class_name: impl Into<Arc<str>>, message: Option<&str>) -> Self {
        ThrownException {
            class_name: class_name.into(),
            message: message.map(Arc::from),
        }
    }
}

/// The content of a known [`Value`](super::Value).
///
/// Floating point payloads compare by bit pattern, so `NaN == NaN` holds for identical
/// NaNs and `0.0 != -0.0`. This is identity, not numeric equality; numeric comparison is
/// the business of the compare ops.
#[derive(Debug, Clone)]
pub enum RawValue {
    /// `null` reference
    Null,
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `short`
    Short(i16),
    /// `char`
    Char(u16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `java.lang.String`
    String(Arc<str>),
    /// `java.lang.Class`
    Class(ClassObject),
    /// Array with known elements
    Array(Arc<[RawValue]>),
    /// `java.lang.Throwable` and subclasses
    Throwable(Arc<ThrownException>),
}

impl PartialEq for RawValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawValue::Null, RawValue::Null) => true,
            (RawValue::Boolean(a), RawValue::Boolean(b)) => a == b,
            (RawValue::Byte(a), RawValue::Byte(b)) => a == b,
            (RawValue::Short(a), RawValue::Short(b)) => a == b,
            (RawValue::Char(a), RawValue::Char(b)) => a == b,
            (RawValue::Int(a), RawValue::Int(b)) => a == b,
            (RawValue::Long(a), RawValue::Long(b)) => a == b,
            (RawValue::Float(a), RawValue::Float(b)) => a.to_bits() == b.to_bits(),
            (RawValue::Double(a), RawValue::Double(b)) => a.to_bits() == b.to_bits(),
            (RawValue::String(a), RawValue::String(b)) => a == b,
            (RawValue::Class(a), RawValue::Class(b)) => a == b,
            (RawValue::Array(a), RawValue::Array(b)) => a == b,
            (RawValue::Throwable(a), RawValue::Throwable(b)) => a == b,
            _ => false,
        }
    }
}

impl RawValue {
    /// The zero value a field or array element of type `ty` starts with.
    #[must_use]
    pub fn default_for(ty: &str) -> RawValue {
        match ty {
            "Z" => RawValue::Boolean(false),
            "B" => RawValue::Byte(0),
            "S" => RawValue::Short(0),
            "C" => RawValue::Char(0),
            "I" => RawValue::Int(0),
            "J" => RawValue::Long(0),
            "F" => RawValue::Float(0.0),
            "D" => RawValue::Double(0.0),
            _ => RawValue::Null,
        }
    }

    /// Integral view, widening the narrow kinds.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Boolean(b) => Some(i64::from(*b)),
            RawValue::Byte(v) => Some(i64::from(*v)),
            RawValue::Short(v) => Some(i64::from(*v)),
            RawValue::Char(v) => Some(i64::from(*v)),
            RawValue::Int(v) => Some(i64::from(*v)),
            RawValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Single precision view.
    ///
    /// Integral payloads are reinterpreted as IEEE-754 bits, since Dalvik loads float
    /// constants with the untyped `const` instruction.
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            RawValue::Float(v) => Some(*v),
            RawValue::Long(_) | RawValue::Double(_) => None,
            other => other.as_i64().map(|bits| f32::from_bits(bits as u32)),
        }
    }

    /// Double precision view, reinterpreting `long` payloads as IEEE-754 bits.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Double(v) => Some(*v),
            RawValue::Long(bits) => Some(f64::from_bits(*bits as u64)),
            _ => None,
        }
    }

    /// Returns `true` for `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Short name of the payload kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Boolean(_) => "boolean",
            RawValue::Byte(_) => "byte",
            RawValue::Short(_) => "short",
            RawValue::Char(_) => "char",
            RawValue::Int(_) => "int",
            RawValue::Long(_) => "long",
            RawValue::Float(_) => "float",
            RawValue::Double(_) => "double",
            RawValue::String(_) => "string",
            RawValue::Class(_) => "class",
            RawValue::Array(_) => "array",
            RawValue::Throwable(_) => "throwable",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => write!(f, "null"),
            RawValue::Boolean(v) => write!(f, "{v}"),
            RawValue::Byte(v) => write!(f, "{v}t"),
            RawValue::Short(v) => write!(f, "{v}s"),
            RawValue::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) => write!(f, "'{c}'"),
                None => write!(f, "'\\u{v:04x}'"),
            },
            RawValue::Int(v) => write!(f, "{v}"),
            RawValue::Long(v) => write!(f, "{v}L"),
            RawValue::Float(v) => write!(f, "{v}f"),
            RawValue::Double(v) => write!(f, "{v}"),
            RawValue::String(s) => write!(f, "{:?}", &**s),
            RawValue::Class(c) => write!(f, "class {}", c.binary_name()),
            RawValue::Array(items) => write!(f, "array[{}]", items.len()),
            RawValue::Throwable(t) => match &t.message {
                Some(msg) => write!(f, "{}: {msg}", internal_to_binary(&t.class_name)),
                None => f.write_str(&internal_to_binary(&t.class_name)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(RawValue::Float(f32::NAN), RawValue::Float(f32::NAN));
        assert_ne!(RawValue::Double(0.0), RawValue::Double(-0.0));
        assert_ne!(RawValue::Int(1), RawValue::Long(1));
    }

    #[test]
    fn untyped_constants_reinterpret_as_float_bits() {
        let one = RawValue::Int(0x3f80_0000);
        assert_eq!(one.as_f32(), Some(1.0));
        let two = RawValue::Long(2.0f64.to_bits() as i64);
        assert_eq!(two.as_f64(), Some(2.0));
        assert_eq!(RawValue::Double(1.0).as_f32(), None);
    }

    #[test]
    fn defaults_follow_descriptor() {
        assert_eq!(RawValue::default_for("J"), RawValue::Long(0));
        assert_eq!(RawValue::default_for("Ljava/lang/String;"), RawValue::Null);
        assert_eq!(RawValue::default_for("[I"), RawValue::Null);
    }

    #[test]
    fn display_is_readable() {
        let exc = RawValue::Throwable(Arc::new(ThrownException::new(
            "Ljava/lang/ClassNotFoundException;",
            Some("com.example.Gone"),
        )));
        assert_eq!(
            exc.to_string(),
            "java.lang.ClassNotFoundException: com.example.Gone"
        );
        assert_eq!(RawValue::Long(3).to_string(), "3L");
        assert_eq!(RawValue::Char(u16::from(b'a')).to_string(), "'a'");
    }
}
