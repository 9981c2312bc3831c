//! Virtual classes, fields and methods.
//!
//! A *virtual* class is the engine's read-only view of one class of the analyzed
//! program: its name, superclass, access flags, declared fields (with their
//! compile-time initial values) and methods (with their instruction bodies).
//! References to members of *other* classes, as they appear in instruction
//! operands, are modeled separately by [`FieldRef`] and [`MethodRef`].

use std::{fmt, sync::Arc};

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::{
    assembly::MethodImplementation,
    emulation::RawValue,
    metadata::names::{is_wide, split_descriptors},
    Result,
};

bitflags! {
    /// Access flags of a class, field or method as stored in the dex file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        /// `public`
        const PUBLIC = 0x0001;
        /// `private`
        const PRIVATE = 0x0002;
        /// `protected`
        const PROTECTED = 0x0004;
        /// `static`
        const STATIC = 0x0008;
        /// `final`
        const FINAL = 0x0010;
        /// `synchronized`
        const SYNCHRONIZED = 0x0020;
        /// `volatile` on fields, `bridge` on methods
        const VOLATILE = 0x0040;
        /// `transient` on fields, `varargs` on methods
        const TRANSIENT = 0x0080;
        /// `native`
        const NATIVE = 0x0100;
        /// `interface`
        const INTERFACE = 0x0200;
        /// `abstract`
        const ABSTRACT = 0x0400;
        /// `strictfp`
        const STRICT = 0x0800;
        /// Compiler generated
        const SYNTHETIC = 0x1000;
        /// `@interface`
        const ANNOTATION = 0x2000;
        /// `enum`
        const ENUM = 0x4000;
        /// Constructor or static initializer
        const CONSTRUCTOR = 0x1_0000;
    }
}

/// Descriptor of the static initializer.
pub const STATIC_INITIALIZER: &str = "<clinit>()V";

/// A symbolic reference to a field, as found in `sget`/`sput` operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Internal name of the declaring class
    pub class: String,
    /// Field name
    pub name: String,
    /// Field type descriptor
    pub ty: String,
}

impl FieldRef {
    /// Creates a field reference.
    pub fn new(class: impl Into<String>, name: impl Into<String>, ty: impl Into<String>) -> Self {
        FieldRef {
            class: class.into(),
            name: name.into(),
            ty: ty.into(),
        }
    }

    /// Parses the smali form `Lpkg/Class;->name:Type`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if either separator is missing.
    pub fn parse(signature: &str) -> Result<Self> {
        let (class, rest) = signature
            .split_once("->")
            .ok_or_else(|| malformed_error!("Field reference without '->': {}", signature))?;
        let (name, ty) = rest
            .split_once(':')
            .ok_or_else(|| malformed_error!("Field reference without type: {}", signature))?;
        Ok(FieldRef::new(class, name, ty))
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.class, self.name, self.ty)
    }
}

/// A symbolic reference to a method, as found in `invoke-*` operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Internal name of the declaring class
    pub class: String,
    /// Method name
    pub name: String,
    /// Parameter type descriptors, receiver excluded
    pub parameters: Vec<String>,
    /// Return type descriptor
    pub return_type: String,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        parameters: Vec<String>,
        return_type: impl Into<String>,
    ) -> Self {
        MethodRef {
            class: class.into(),
            name: name.into(),
            parameters,
            return_type: return_type.into(),
        }
    }

    /// Parses the smali form `Lpkg/Class;->name(Params)Ret`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the signature does not follow that shape.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use smaliscope::metadata::MethodRef;
    ///
    /// let m =
    ///     MethodRef::parse("Ljava/lang/Class;->forName(Ljava/lang/String;)Ljava/lang/Class;")?;
    /// assert_eq!(m.name, "forName");
    /// assert_eq!(m.parameters, vec!["Ljava/lang/String;"]);
    /// assert_eq!(m.descriptor(), "forName(Ljava/lang/String;)Ljava/lang/Class;");
    /// # Ok::<(), smaliscope::Error>(())
    /// ```
    pub fn parse(signature: &str) -> Result<Self> {
        let (class, rest) = signature
            .split_once("->")
            .ok_or_else(|| malformed_error!("Method reference without '->': {}", signature))?;
        let (name, descriptor) = rest
            .split_once('(')
            .ok_or_else(|| malformed_error!("Method reference without '(': {}", signature))?;
        let (params, return_type) = descriptor
            .split_once(')')
            .ok_or_else(|| malformed_error!("Method reference without ')': {}", signature))?;
        let parameters = split_descriptors(params)
            .ok_or_else(|| malformed_error!("Invalid parameter list in {}", signature))?;
        if return_type.is_empty() {
            return Err(malformed_error!("Missing return type in {}", signature));
        }
        Ok(MethodRef::new(class, name, parameters, return_type))
    }

    /// Name plus prototype, e.g. `run(I)V`. Unique within a class.
    #[must_use]
    pub fn descriptor(&self) -> String {
        format!(
            "{}({}){}",
            self.name,
            self.parameters.concat(),
            self.return_type
        )
    }

    /// Fully qualified smali signature, e.g. `LFoo;->run(I)V`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}->{}", self.class, self.descriptor())
    }

    /// Returns `true` if the method returns nothing.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.return_type == "V"
    }

    /// Number of registers occupied by the arguments, receiver included for instance methods.
    #[must_use]
    pub fn argument_register_count(&self, is_static: bool) -> usize {
        let receiver = usize::from(!is_static);
        receiver
            + self
                .parameters
                .iter()
                .map(|p| if is_wide(p) { 2 } else { 1 })
                .sum::<usize>()
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// A field declared by a [`VirtualClass`].
#[derive(Debug, Clone)]
pub struct VirtualField {
    /// Field name
    pub name: String,
    /// Field type descriptor
    pub ty: String,
    /// Access flags
    pub flags: AccessFlags,
    /// Compile-time constant from the class's static values, if any
    pub initial_value: Option<RawValue>,
}

impl VirtualField {
    /// Creates a field without an initial value.
    pub fn new(name: impl Into<String>, ty: impl Into<String>, flags: AccessFlags) -> Self {
        VirtualField {
            name: name.into(),
            ty: ty.into(),
            flags,
            initial_value: None,
        }
    }

    /// Attaches a compile-time initial value.
    #[must_use]
    pub fn with_initial_value(mut self, value: RawValue) -> Self {
        self.initial_value = Some(value);
        self
    }

    /// Returns `true` for `static` fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }
}

/// A method declared by a [`VirtualClass`].
#[derive(Debug, Clone)]
pub struct VirtualMethod {
    /// Symbolic reference naming this method
    pub reference: MethodRef,
    /// Access flags
    pub flags: AccessFlags,
    /// Instruction body, absent for abstract and native methods
    pub implementation: Option<Arc<MethodImplementation>>,
}

impl VirtualMethod {
    /// Creates a method without a body.
    pub fn new(reference: MethodRef, flags: AccessFlags) -> Self {
        VirtualMethod {
            reference,
            flags,
            implementation: None,
        }
    }

    /// Attaches the instruction body.
    #[must_use]
    pub fn with_implementation(mut self, implementation: MethodImplementation) -> Self {
        self.implementation = Some(Arc::new(implementation));
        self
    }

    /// Returns `true` for `static` methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }

    /// See [`MethodRef::descriptor`].
    #[must_use]
    pub fn descriptor(&self) -> String {
        self.reference.descriptor()
    }

    /// See [`MethodRef::signature`].
    #[must_use]
    pub fn signature(&self) -> String {
        self.reference.signature()
    }
}

/// One class of the analyzed program.
#[derive(Debug, Clone)]
pub struct VirtualClass {
    name: String,
    super_class: Option<String>,
    flags: AccessFlags,
    fields: Vec<VirtualField>,
    methods: FxHashMap<String, Arc<VirtualMethod>>,
}

impl VirtualClass {
    /// Creates an empty class extending `java.lang.Object`.
    pub fn new(name: impl Into<String>) -> Self {
        VirtualClass {
            name: name.into(),
            super_class: Some(crate::metadata::types::OBJECT.to_string()),
            flags: AccessFlags::PUBLIC,
            fields: Vec::new(),
            methods: FxHashMap::default(),
        }
    }

    /// Sets the superclass.
    #[must_use]
    pub fn with_super_class(mut self, super_class: impl Into<String>) -> Self {
        self.super_class = Some(super_class.into());
        self
    }

    /// Sets the access flags.
    #[must_use]
    pub fn with_flags(mut self, flags: AccessFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Declares a field.
    #[must_use]
    pub fn with_field(mut self, field: VirtualField) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares a method. A method with the same descriptor is replaced.
    #[must_use]
    pub fn with_method(mut self, method: VirtualMethod) -> Self {
        self.methods.insert(method.descriptor(), Arc::new(method));
        self
    }

    /// Internal name, e.g. `Lcom/example/Foo;`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Internal name of the superclass.
    #[must_use]
    pub fn super_class(&self) -> Option<&str> {
        self.super_class.as_deref()
    }

    /// Access flags.
    #[must_use]
    pub fn flags(&self) -> AccessFlags {
        self.flags
    }

    /// Declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&VirtualField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared static fields in declaration order.
    pub fn static_fields(&self) -> impl Iterator<Item = &VirtualField> {
        self.fields.iter().filter(|f| f.is_static())
    }

    /// Declared method by descriptor.
    #[must_use]
    pub fn method(&self, descriptor: &str) -> Option<&Arc<VirtualMethod>> {
        self.methods.get(descriptor)
    }

    /// All declared methods, in no particular order.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<VirtualMethod>> {
        self.methods.values()
    }

    /// The `<clinit>` method, if the class has one with a body.
    #[must_use]
    pub fn static_initializer(&self) -> Option<&Arc<VirtualMethod>> {
        self.methods
            .get(STATIC_INITIALIZER)
            .filter(|m| m.implementation.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_reference_parses_smali_form() {
        let field = FieldRef::parse("Lcom/example/Foo;->counter:I").unwrap();
        assert_eq!(field.class, "Lcom/example/Foo;");
        assert_eq!(field.name, "counter");
        assert_eq!(field.ty, "I");
        assert_eq!(field.to_string(), "Lcom/example/Foo;->counter:I");
        assert!(FieldRef::parse("Lcom/example/Foo;->counter").is_err());
    }

    #[test]
    fn method_reference_rejects_broken_signatures() {
        assert!(MethodRef::parse("LFoo;run()V").is_err());
        assert!(MethodRef::parse("LFoo;->run)V").is_err());
        assert!(MethodRef::parse("LFoo;->run(Q)V").is_err());
        assert!(MethodRef::parse("LFoo;->run()").is_err());
    }

    #[test]
    fn argument_registers_count_wide_pairs_and_receiver() {
        let m = MethodRef::parse("LFoo;->mix(IJLjava/lang/String;D)V").unwrap();
        assert_eq!(m.argument_register_count(true), 6);
        assert_eq!(m.argument_register_count(false), 7);
        assert!(m.is_void());
    }

    #[test]
    fn static_initializer_requires_a_body() {
        let clinit = MethodRef::parse("LFoo;-><clinit>()V").unwrap();
        let class = VirtualClass::new("LFoo;").with_method(VirtualMethod::new(
            clinit,
            AccessFlags::STATIC | AccessFlags::CONSTRUCTOR,
        ));
        assert!(class.method(STATIC_INITIALIZER).is_some());
        assert!(class.static_initializer().is_none());
    }

    #[test]
    fn static_fields_skip_instance_fields() {
        let class = VirtualClass::new("LFoo;")
            .with_field(VirtualField::new("a", "I", AccessFlags::STATIC))
            .with_field(VirtualField::new("b", "I", AccessFlags::PRIVATE))
            .with_field(VirtualField::new("c", "J", AccessFlags::STATIC | AccessFlags::FINAL));
        let names: Vec<_> = class.static_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
