//! Fixtures for op and emulated-call tests.

use std::sync::Arc;

use crate::{
    assembly::MethodImplementation,
    emulation::{
        EmulatedCallRegistry, KnownPlatformClasses, OpContext, OpFactoryRegistry, OpProgram,
        VmConfig, VmServices,
    },
    metadata::{AccessFlags, ClassManagerBuilder, MethodRef, VirtualClass, VirtualMethod},
};

/// Services over `classes` with the default configuration.
pub fn services(classes: Vec<VirtualClass>) -> VmServices {
    services_with_config(classes, VmConfig::default())
}

/// Services over `classes` with a given configuration.
pub fn services_with_config(classes: Vec<VirtualClass>, config: VmConfig) -> VmServices {
    let manager = classes
        .into_iter()
        .fold(ClassManagerBuilder::new(), ClassManagerBuilder::add_class)
        .build();
    VmServices::new(
        Arc::new(manager),
        Arc::new(config),
        Arc::new(KnownPlatformClasses::new()),
        Arc::new(EmulatedCallRegistry::with_defaults()),
    )
}

/// A static method with the given signature and body.
pub fn static_method(signature: &str, body: MethodImplementation) -> Arc<VirtualMethod> {
    Arc::new(
        VirtualMethod::new(MethodRef::parse(signature).unwrap(), AccessFlags::STATIC)
            .with_implementation(body),
    )
}

/// Compiles `body` as a static method with the default factories.
pub fn compile(services: &VmServices, signature: &str, body: MethodImplementation) -> OpProgram {
    OpProgram::compile(
        &static_method(signature, body),
        &OpFactoryRegistry::with_defaults(),
        services,
    )
    .unwrap()
}

/// Execution context at the top level.
pub fn context(services: &VmServices) -> OpContext<'_> {
    OpContext { services, depth: 0 }
}
