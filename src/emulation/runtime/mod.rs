//! Shared execution services and class loading capabilities.
//!
//! [`VmServices`] is the immutable bundle every op and emulated call is handed at
//! execution time: the class repository, the configuration, the two class loaders and
//! the emulated-call registry. One instance is created per
//! [`VirtualMachine`](crate::emulation::VirtualMachine) and shared by every graph it
//! explores, across threads.

mod platform;
mod sandbox;

use std::{fmt, sync::Arc};

use crate::{
    emulation::{emulate::EmulatedCallRegistry, VmConfig},
    metadata::ClassManager,
};

pub use platform::{KnownPlatformClasses, PlatformClassLoader};
pub use sandbox::SandboxClassLoader;

/// Read-only services of one virtual machine.
#[derive(Clone)]
pub struct VmServices {
    classes: Arc<ClassManager>,
    config: Arc<VmConfig>,
    platform: Arc<dyn PlatformClassLoader>,
    sandbox: SandboxClassLoader,
    emulated: Arc<EmulatedCallRegistry>,
}

impl VmServices {
    /// Bundles the services.
    pub fn new(
        classes: Arc<ClassManager>,
        config: Arc<VmConfig>,
        platform: Arc<dyn PlatformClassLoader>,
        emulated: Arc<EmulatedCallRegistry>,
    ) -> Self {
        let sandbox = SandboxClassLoader::new(classes.clone(), platform.clone());
        VmServices {
            classes,
            config,
            platform,
            sandbox,
            emulated,
        }
    }

    /// The analyzed program's classes.
    #[must_use]
    pub fn classes(&self) -> &ClassManager {
        &self.classes
    }

    /// Shared handle to the class repository.
    #[must_use]
    pub fn classes_arc(&self) -> &Arc<ClassManager> {
        &self.classes
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The real platform loader, consulted only for safe classes.
    #[must_use]
    pub fn platform(&self) -> &dyn PlatformClassLoader {
        self.platform.as_ref()
    }

    /// Shared handle to the platform loader.
    #[must_use]
    pub fn platform_arc(&self) -> &Arc<dyn PlatformClassLoader> {
        &self.platform
    }

    /// The sandboxed loader for the analyzed program's classes.
    #[must_use]
    pub fn sandbox(&self) -> &SandboxClassLoader {
        &self.sandbox
    }

    /// Registered emulated calls.
    #[must_use]
    pub fn emulated(&self) -> &EmulatedCallRegistry {
        &self.emulated
    }
}

impl fmt::Debug for VmServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmServices")
            .field("classes", &self.classes.len())
            .field("config", &self.config)
            .field("platform", &self.platform)
            .field("emulated", &self.emulated)
            .finish()
    }
}
