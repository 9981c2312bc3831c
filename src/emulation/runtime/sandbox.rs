//! The sandboxed class loader.
//!
//! Resolves class names against the analyzed program's own classes. The resulting class
//! objects carry no field values: static state of local classes lives only in the
//! per-path [`StaticState`](crate::emulation::StaticState), populated by modeled static
//! initialization.

use std::sync::Arc;

use crate::{
    emulation::{runtime::PlatformClassLoader, ClassObject, ClassOrigin},
    metadata::{binary_to_internal, types, ClassManager},
    Error, Result,
};

/// Loader for the analyzed program's classes, with hierarchy queries spanning both the
/// repository and the platform.
#[derive(Debug, Clone)]
pub struct SandboxClassLoader {
    classes: Arc<ClassManager>,
    platform: Arc<dyn PlatformClassLoader>,
}

impl SandboxClassLoader {
    /// Creates a loader over a repository, consulting `platform` for foreign superclasses.
    pub fn new(classes: Arc<ClassManager>, platform: Arc<dyn PlatformClassLoader>) -> Self {
        SandboxClassLoader { classes, platform }
    }

    /// Loads a local class by binary name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] with the binary name if the repository has no
    /// such class.
    pub fn load_class(&self, binary_name: &str) -> Result<ClassObject> {
        let internal = binary_to_internal(binary_name);
        if self.classes.is_local_class(&internal) {
            Ok(ClassObject::new(internal, ClassOrigin::Sandbox))
        } else {
            Err(Error::ClassNotFound(binary_name.to_string()))
        }
    }

    /// Direct superclass, from the repository for local classes and from the platform
    /// otherwise.
    #[must_use]
    pub fn superclass(&self, internal_name: &str) -> Option<String> {
        match self.classes.get_virtual_class(internal_name) {
            Ok(class) => class.super_class().map(str::to_string),
            Err(_) => self.platform.superclass(internal_name),
        }
    }

    /// Every superclass, nearest first, as far as it can be resolved.
    #[must_use]
    pub fn superclass_chain(&self, internal_name: &str) -> Vec<String> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = self.superclass(internal_name);
        while let Some(parent) = current {
            if parent == internal_name || chain.contains(&parent) {
                break;
            }
            current = self.superclass(&parent);
            chain.push(parent);
        }
        chain
    }

    /// Returns `true` if a value of class `from` can be stored in a slot of type `to`.
    #[must_use]
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        from == to || to == types::OBJECT || self.superclass_chain(from).iter().any(|c| c == to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emulation::runtime::KnownPlatformClasses,
        metadata::{ClassManagerBuilder, VirtualClass},
    };

    fn loader() -> SandboxClassLoader {
        let classes = ClassManagerBuilder::new()
            .add_class(VirtualClass::new("Lcom/example/Secret;"))
            .add_class(
                VirtualClass::new("Lcom/example/Oops;")
                    .with_super_class("Ljava/lang/RuntimeException;"),
            )
            .build();
        SandboxClassLoader::new(Arc::new(classes), Arc::new(KnownPlatformClasses::new()))
    }

    #[test]
    fn only_local_classes_load() {
        let loader = loader();
        let class = loader.load_class("com.example.Secret").unwrap();
        assert_eq!(class.origin, ClassOrigin::Sandbox);
        assert!(matches!(
            loader.load_class("java.lang.String"),
            Err(Error::ClassNotFound(name)) if name == "java.lang.String"
        ));
    }

    #[test]
    fn hierarchy_crosses_into_platform() {
        let loader = loader();
        assert_eq!(
            loader.superclass_chain("Lcom/example/Oops;"),
            vec![
                "Ljava/lang/RuntimeException;",
                "Ljava/lang/Exception;",
                "Ljava/lang/Throwable;",
                "Ljava/lang/Object;"
            ]
        );
        assert!(loader.is_assignable("Lcom/example/Oops;", "Ljava/lang/Exception;"));
        assert!(!loader.is_assignable("Lcom/example/Oops;", "Ljava/lang/Error;"));
        assert!(loader.is_assignable("Lcom/example/Unknown;", "Ljava/lang/Object;"));
    }
}
