//! The read-only class repository.
//!
//! [`ClassManager`] holds every [`VirtualClass`] of the analyzed program. It is built once
//! through [`ClassManagerBuilder`] before any execution starts and is never mutated
//! afterwards, so a single `Arc<ClassManager>` can be shared by every method explored on
//! the rayon pool.
//!
//! # Example
//!
//! ```rust
//! use smaliscope::metadata::{ClassManagerBuilder, VirtualClass};
//!
//! let manager = ClassManagerBuilder::new()
//!     .add_class(VirtualClass::new("Lcom/example/Base;"))
//!     .add_class(VirtualClass::new("Lcom/example/Child;").with_super_class("Lcom/example/Base;"))
//!     .build();
//!
//! assert!(manager.is_local_class("Lcom/example/Child;"));
//! assert_eq!(
//!     manager.superclass_chain("Lcom/example/Child;"),
//!     vec!["Lcom/example/Base;", "Ljava/lang/Object;"]
//! );
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{
    metadata::class::{VirtualClass, VirtualField, VirtualMethod},
    Error, Result,
};

/// Builds a [`ClassManager`].
#[derive(Debug, Default)]
pub struct ClassManagerBuilder {
    classes: FxHashMap<String, Arc<VirtualClass>>,
}

impl ClassManagerBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class, replacing any earlier class with the same name.
    #[must_use]
    pub fn add_class(mut self, class: VirtualClass) -> Self {
        self.classes.insert(class.name().to_string(), Arc::new(class));
        self
    }

    /// Freezes the repository.
    #[must_use]
    pub fn build(self) -> ClassManager {
        ClassManager {
            classes: self.classes,
        }
    }
}

/// Read-only lookup of the analyzed program's classes.
#[derive(Debug, Default)]
pub struct ClassManager {
    classes: FxHashMap<String, Arc<VirtualClass>>,
}

impl ClassManager {
    /// Looks up a class by internal name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if no such class was added.
    pub fn get_virtual_class(&self, name: &str) -> Result<Arc<VirtualClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ClassNotFound(name.to_string()))
    }

    /// Returns `true` if the class belongs to the analyzed program.
    #[must_use]
    pub fn is_local_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Finds a method by descriptor, searching the class and then its local superclasses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] for an unknown class and [`Error::MethodNotFound`]
    /// if no class in the local hierarchy declares the descriptor.
    pub fn get_method(&self, class: &str, descriptor: &str) -> Result<Arc<VirtualMethod>> {
        let mut current = Some(self.get_virtual_class(class)?);
        while let Some(cls) = current {
            if let Some(method) = cls.method(descriptor) {
                return Ok(method.clone());
            }
            current = cls
                .super_class()
                .and_then(|name| self.classes.get(name).cloned());
        }
        Err(Error::MethodNotFound {
            class: class.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    /// Resolves a field by name, searching the class and then its local superclasses.
    ///
    /// Returns the declaring class together with the field, since static state belongs to the
    /// declaring class and not to the class named in the reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] for an unknown class and [`Error::FieldNotFound`]
    /// if no class in the local hierarchy declares the field.
    pub fn get_field(
        &self,
        class: &str,
        name: &str,
    ) -> Result<(&Arc<VirtualClass>, &VirtualField)> {
        let mut current = self.classes.get(class);
        if current.is_none() {
            return Err(Error::ClassNotFound(class.to_string()));
        }
        while let Some(cls) = current {
            if let Some(field) = cls.field(name) {
                return Ok((cls, field));
            }
            current = cls.super_class().and_then(|s| self.classes.get(s));
        }
        Err(Error::FieldNotFound {
            class: class.to_string(),
            name: name.to_string(),
        })
    }

    /// Superclasses of a class, nearest first, as far as they can be followed.
    ///
    /// The chain stops at the first superclass that is not local, which is still included.
    #[must_use]
    pub fn superclass_chain(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(name);
        while let Some(cls) = current {
            let Some(parent) = cls.super_class() else {
                break;
            };
            if chain.iter().any(|c| c == parent) {
                break;
            }
            chain.push(parent.to_string());
            current = self.classes.get(parent);
        }
        chain
    }

    /// Every class in the repository, in no particular order.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<VirtualClass>> {
        self.classes.values()
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if the repository holds no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AccessFlags, MethodRef};

    fn hierarchy() -> ClassManager {
        let base = VirtualClass::new("LBase;")
            .with_field(VirtualField::new("shared", "I", AccessFlags::STATIC))
            .with_method(VirtualMethod::new(
                MethodRef::parse("LBase;->helper()V").unwrap(),
                AccessFlags::STATIC,
            ));
        let child = VirtualClass::new("LChild;").with_super_class("LBase;");
        ClassManagerBuilder::new()
            .add_class(base)
            .add_class(child)
            .build()
    }

    #[test]
    fn methods_resolve_through_local_superclasses() {
        let manager = hierarchy();
        let method = manager.get_method("LChild;", "helper()V").unwrap();
        assert_eq!(method.reference.class, "LBase;");
        assert!(matches!(
            manager.get_method("LChild;", "missing()V"),
            Err(Error::MethodNotFound { .. })
        ));
    }

    #[test]
    fn fields_resolve_to_declaring_class() {
        let manager = hierarchy();
        let (owner, field) = manager.get_field("LChild;", "shared").unwrap();
        assert_eq!(owner.name(), "LBase;");
        assert_eq!(field.ty, "I");
        assert!(matches!(
            manager.get_field("LNowhere;", "shared"),
            Err(Error::ClassNotFound(_))
        ));
    }

    #[test]
    fn superclass_chain_survives_cycles() {
        let manager = ClassManagerBuilder::new()
            .add_class(VirtualClass::new("LA;").with_super_class("LB;"))
            .add_class(VirtualClass::new("LB;").with_super_class("LA;"))
            .build();
        assert_eq!(manager.superclass_chain("LA;"), vec!["LB;", "LA;"]);
    }
}
