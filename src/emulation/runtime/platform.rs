//! The real platform class loader capability.
//!
//! The engine never executes platform code. What the "safe" branch of an emulated call
//! needs from the platform is only whether a class exists, the class object itself, and
//! its superclass for exception handler matching. [`PlatformClassLoader`] is that
//! capability, injected into the VM; [`KnownPlatformClasses`] is the default
//! implementation backed by a static table.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    emulation::{ClassObject, ClassOrigin},
    metadata::{binary_to_internal, component_base, is_array, is_primitive},
};

/// Loader of trusted platform classes.
pub trait PlatformClassLoader: Send + Sync + fmt::Debug {
    /// Loads a class by binary name (`java.lang.String`, `[I`).
    ///
    /// Returns `None` if the platform has no such class.
    fn load_class(&self, binary_name: &str) -> Option<ClassObject>;

    /// Superclass of a platform class by internal name, `None` for `java.lang.Object`
    /// and for unknown classes.
    fn superclass(&self, internal_name: &str) -> Option<String>;
}

/// `(class, superclass)` in internal form.
const PLATFORM_CLASSES: &[(&str, &str)] = &[
    ("Ljava/lang/Object;", ""),
    ("Ljava/lang/String;", "Ljava/lang/Object;"),
    ("Ljava/lang/Class;", "Ljava/lang/Object;"),
    ("Ljava/lang/ClassLoader;", "Ljava/lang/Object;"),
    ("Ljava/lang/System;", "Ljava/lang/Object;"),
    ("Ljava/lang/Math;", "Ljava/lang/Object;"),
    ("Ljava/lang/StringBuilder;", "Ljava/lang/Object;"),
    ("Ljava/lang/Number;", "Ljava/lang/Object;"),
    ("Ljava/lang/Boolean;", "Ljava/lang/Object;"),
    ("Ljava/lang/Character;", "Ljava/lang/Object;"),
    ("Ljava/lang/Byte;", "Ljava/lang/Number;"),
    ("Ljava/lang/Short;", "Ljava/lang/Number;"),
    ("Ljava/lang/Integer;", "Ljava/lang/Number;"),
    ("Ljava/lang/Long;", "Ljava/lang/Number;"),
    ("Ljava/lang/Float;", "Ljava/lang/Number;"),
    ("Ljava/lang/Double;", "Ljava/lang/Number;"),
    ("Ljava/lang/Thread;", "Ljava/lang/Object;"),
    ("Ljava/lang/Throwable;", "Ljava/lang/Object;"),
    ("Ljava/lang/Exception;", "Ljava/lang/Throwable;"),
    ("Ljava/lang/Error;", "Ljava/lang/Throwable;"),
    ("Ljava/lang/LinkageError;", "Ljava/lang/Error;"),
    ("Ljava/lang/ExceptionInInitializerError;", "Ljava/lang/LinkageError;"),
    ("Ljava/lang/RuntimeException;", "Ljava/lang/Exception;"),
    ("Ljava/lang/ReflectiveOperationException;", "Ljava/lang/Exception;"),
    ("Ljava/lang/ClassNotFoundException;", "Ljava/lang/ReflectiveOperationException;"),
    ("Ljava/lang/ArithmeticException;", "Ljava/lang/RuntimeException;"),
    ("Ljava/lang/NullPointerException;", "Ljava/lang/RuntimeException;"),
    ("Ljava/lang/ClassCastException;", "Ljava/lang/RuntimeException;"),
    ("Ljava/lang/IllegalArgumentException;", "Ljava/lang/RuntimeException;"),
    ("Ljava/lang/IllegalStateException;", "Ljava/lang/RuntimeException;"),
    ("Ljava/lang/IndexOutOfBoundsException;", "Ljava/lang/RuntimeException;"),
    ("Ljava/lang/ArrayIndexOutOfBoundsException;", "Ljava/lang/IndexOutOfBoundsException;"),
    ("Ljava/io/IOException;", "Ljava/lang/Exception;"),
    ("Ljava/util/ArrayList;", "Ljava/lang/Object;"),
    ("Ljava/util/HashMap;", "Ljava/lang/Object;"),
];

/// Platform loader backed by a table of well-known classes.
#[derive(Debug, Clone)]
pub struct KnownPlatformClasses {
    classes: FxHashMap<String, Option<String>>,
}

impl Default for KnownPlatformClasses {
    fn default() -> Self {
        let classes = PLATFORM_CLASSES
            .iter()
            .map(|(name, parent)| {
                let parent = (!parent.is_empty()).then(|| (*parent).to_string());
                ((*name).to_string(), parent)
            })
            .collect();
        KnownPlatformClasses { classes }
    }
}

impl KnownPlatformClasses {
    /// The default table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class, by internal name, with its superclass.
    #[must_use]
    pub fn with_class(mut self, name: impl Into<String>, superclass: impl Into<String>) -> Self {
        self.classes.insert(name.into(), Some(superclass.into()));
        self
    }

    /// Returns `true` if the table knows the class or array type.
    #[must_use]
    pub fn contains(&self, internal_name: &str) -> bool {
        let base = component_base(internal_name);
        (is_array(internal_name) && is_primitive(base) && base != "V")
            || self.classes.contains_key(base)
    }
}

impl PlatformClassLoader for KnownPlatformClasses {
    fn load_class(&self, binary_name: &str) -> Option<ClassObject> {
        let internal = binary_to_internal(binary_name);
        self.contains(&internal)
            .then(|| ClassObject::new(internal, ClassOrigin::Platform))
    }

    fn superclass(&self, internal_name: &str) -> Option<String> {
        if is_array(internal_name) {
            return Some("Ljava/lang/Object;".to_string());
        }
        self.classes.get(internal_name).cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_known_classes_and_arrays() {
        let platform = KnownPlatformClasses::new();
        let string = platform.load_class("java.lang.String").unwrap();
        assert_eq!(&*string.name, "Ljava/lang/String;");
        assert_eq!(string.origin, ClassOrigin::Platform);
        assert!(platform.load_class("[I").is_some());
        assert!(platform.load_class("[[Ljava.lang.Object;").is_some());
        assert!(platform.load_class("com.example.Missing").is_none());
        assert!(platform.load_class("java.lang.Strin").is_none());
    }

    #[test]
    fn exception_hierarchy_is_linked() {
        let platform = KnownPlatformClasses::new();
        assert_eq!(
            platform.superclass("Ljava/lang/ArithmeticException;").as_deref(),
            Some("Ljava/lang/RuntimeException;")
        );
        assert_eq!(platform.superclass("Ljava/lang/Object;"), None);
        assert_eq!(
            platform.superclass("[I").as_deref(),
            Some("Ljava/lang/Object;")
        );
    }

    #[test]
    fn table_can_be_extended() {
        let platform =
            KnownPlatformClasses::new().with_class("Landroid/app/Activity;", "Ljava/lang/Object;");
        assert!(platform.load_class("android.app.Activity").is_some());
    }
}
