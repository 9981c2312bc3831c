//! Descriptors of the types the engine names directly.

/// `void`
pub const VOID: &str = "V";
/// `boolean`
pub const BOOLEAN: &str = "Z";
/// `byte`
pub const BYTE: &str = "B";
/// `short`
pub const SHORT: &str = "S";
/// `char`
pub const CHAR: &str = "C";
/// `int`
pub const INTEGER: &str = "I";
/// `long`
pub const LONG: &str = "J";
/// `float`
pub const FLOAT: &str = "F";
/// `double`
pub const DOUBLE: &str = "D";

/// `java.lang.Object`
pub const OBJECT: &str = "Ljava/lang/Object;";
/// `java.lang.String`
pub const STRING: &str = "Ljava/lang/String;";
/// `java.lang.Class`
pub const CLASS: &str = "Ljava/lang/Class;";
/// `java.lang.Throwable`
pub const THROWABLE: &str = "Ljava/lang/Throwable;";
