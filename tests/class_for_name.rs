//! Reflective class loading integration tests.
//!
//! Covers the three ways `Class.forName` resolves a name:
//! 1. Safe platform classes through the platform loader
//! 2. The analyzed program's own classes through the sandbox, initializing them on the path
//! 3. Anything else, which raises `ClassNotFoundException`

use smaliscope::{
    assembly::{MethodAssembler, Opcode},
    emulation::{modeled_exception, ClassOrigin, Value, VirtualMachine, VmConfig},
    metadata::{
        AccessFlags, ClassManagerBuilder, MethodRef, VirtualClass, VirtualField, VirtualMethod,
    },
    Result,
};

const FOR_NAME: &str = "Ljava/lang/Class;->forName(Ljava/lang/String;)Ljava/lang/Class;";
const FOR_NAME_WITH_LOADER: &str =
    "Ljava/lang/Class;->forName(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;";
const GET_NAME: &str = "Ljava/lang/Class;->getName()Ljava/lang/String;";

/// `Lcom/example/Payload;` whose initializer sets `secret` to 42.
fn payload() -> Result<VirtualClass> {
    let mut clinit = MethodAssembler::new(1);
    clinit
        .const_int(0, 42)?
        .sput(Opcode::Sput, 0, "Lcom/example/Payload;->secret:I")?
        .return_void()?;
    Ok(VirtualClass::new("Lcom/example/Payload;")
        .with_field(VirtualField::new("secret", "I", AccessFlags::STATIC))
        .with_method(
            VirtualMethod::new(
                MethodRef::parse("Lcom/example/Payload;-><clinit>()V")?,
                AccessFlags::STATIC | AccessFlags::CONSTRUCTOR,
            )
            .with_implementation(clinit.finish()?),
        ))
}

/// `LMain;->load()Ljava/lang/Class;` returning `Class.forName(name)`.
fn loader_of(name: &str) -> Result<VirtualClass> {
    let mut asm = MethodAssembler::new(1);
    asm.const_string(0, name)?
        .invoke(Opcode::InvokeStatic, &[0], FOR_NAME)?
        .move_result(Opcode::MoveResultObject, 0)?
        .return_value(Opcode::ReturnObject, 0)?;
    Ok(VirtualClass::new("LMain;").with_method(
        VirtualMethod::new(
            MethodRef::parse("LMain;->load()Ljava/lang/Class;")?,
            AccessFlags::STATIC,
        )
        .with_implementation(asm.finish()?),
    ))
}

fn machine(classes: Vec<VirtualClass>) -> VirtualMachine {
    let manager = classes
        .into_iter()
        .fold(ClassManagerBuilder::new(), ClassManagerBuilder::add_class)
        .build();
    VirtualMachine::new(manager, VmConfig::default())
}

#[test]
fn test_safe_class_resolves_on_the_platform() -> Result<()> {
    let vm = machine(vec![loader_of("java.lang.String")?]);
    let graph = vm.execute("LMain;", "load()Ljava/lang/Class;")?;

    let result = graph.terminating_return_consensus().expect("load returns");
    let class = result.as_class().expect("a known class object");
    assert_eq!(&*class.name, "Ljava/lang/String;");
    assert_eq!(class.origin, ClassOrigin::Platform);
    assert_eq!(graph.terminating_exception_consensus(), None);
    Ok(())
}

#[test]
fn test_local_class_is_initialized_in_the_sandbox() -> Result<()> {
    let vm = machine(vec![payload()?, loader_of("com.example.Payload")?]);
    let graph = vm.execute("LMain;", "load()Ljava/lang/Class;")?;

    let result = graph.terminating_return_consensus().expect("load returns");
    let class = result.as_class().expect("a known class object");
    assert_eq!(&*class.name, "Lcom/example/Payload;");
    assert_eq!(class.origin, ClassOrigin::Sandbox);
    assert_eq!(class.binary_name(), "com.example.Payload");

    // the initializer ran on the path, so its field effects are part of the result
    assert_eq!(
        graph.terminating_field_consensus(("Lcom/example/Payload;", "secret")),
        Some(Value::int(42))
    );
    assert!(graph
        .terminating_nodes()
        .all(|node| node.state().is_class_initialized("Lcom/example/Payload;")));
    Ok(())
}

#[test]
fn test_unresolvable_class_raises_class_not_found() -> Result<()> {
    let mut asm = MethodAssembler::new(1);
    asm.const_string(0, "com.example.Missing")?
        .invoke(Opcode::InvokeStatic, &[0], FOR_NAME)?;
    let next = asm.current_address();
    asm.move_result(Opcode::MoveResultObject, 0)?
        .return_value(Opcode::ReturnObject, 0)?;
    let main = VirtualClass::new("LMain;").with_method(
        VirtualMethod::new(
            MethodRef::parse("LMain;->load()Ljava/lang/Class;")?,
            AccessFlags::STATIC,
        )
        .with_implementation(asm.finish()?),
    );
    let vm = machine(vec![main]);
    let graph = vm.execute("LMain;", "load()Ljava/lang/Class;")?;

    let thrown = graph.terminating_exception_consensus().expect("forName throws");
    let exception = thrown.as_throwable().expect("a known exception");
    assert_eq!(&*exception.class_name, modeled_exception::CLASS_NOT_FOUND);
    assert_eq!(exception.message.as_deref(), Some("com.example.Missing"));
    assert!(!graph.was_address_reached(next));
    assert_eq!(graph.terminating_return_consensus(), None);
    Ok(())
}

#[test]
fn test_initialize_flag_false_skips_the_initializer() -> Result<()> {
    let mut asm = MethodAssembler::new(3);
    asm.const_string(0, "com.example.Payload")?
        .const_int(1, 0)?
        .const_int(2, 0)?
        .invoke(Opcode::InvokeStatic, &[0, 1, 2], FOR_NAME_WITH_LOADER)?
        .move_result(Opcode::MoveResultObject, 0)?
        .return_value(Opcode::ReturnObject, 0)?;
    let main = VirtualClass::new("LMain;").with_method(
        VirtualMethod::new(
            MethodRef::parse("LMain;->load()Ljava/lang/Class;")?,
            AccessFlags::STATIC,
        )
        .with_implementation(asm.finish()?),
    );
    let vm = machine(vec![payload()?, main]);
    let graph = vm.execute("LMain;", "load()Ljava/lang/Class;")?;

    let result = graph.terminating_return_consensus().expect("load returns");
    assert_eq!(
        result.as_class().map(|class| class.binary_name()),
        Some("com.example.Payload".to_string())
    );
    assert_eq!(
        graph.terminating_field_consensus(("Lcom/example/Payload;", "secret")),
        None
    );
    assert!(graph
        .terminating_nodes()
        .all(|node| !node.state().is_class_initialized("Lcom/example/Payload;")));
    Ok(())
}

#[test]
fn test_unknown_name_yields_unknown_class() -> Result<()> {
    let mut asm = MethodAssembler::new(1);
    asm.invoke(Opcode::InvokeStatic, &[0], FOR_NAME)?
        .move_result(Opcode::MoveResultObject, 0)?
        .return_value(Opcode::ReturnObject, 0)?;
    let main = VirtualClass::new("LMain;").with_method(
        VirtualMethod::new(
            MethodRef::parse("LMain;->load(Ljava/lang/String;)Ljava/lang/Class;")?,
            AccessFlags::STATIC,
        )
        .with_implementation(asm.finish()?),
    );
    let vm = machine(vec![main]);
    let graph = vm.execute("LMain;", "load(Ljava/lang/String;)Ljava/lang/Class;")?;

    let result = graph.terminating_return_consensus().expect("load returns");
    assert!(result.is_unknown());
    assert_eq!(result.ty(), "Ljava/lang/Class;");
    Ok(())
}

#[test]
fn test_class_name_round_trips_through_get_name() -> Result<()> {
    let mut asm = MethodAssembler::new(1);
    asm.const_string(0, "com.example.Payload")?
        .invoke(Opcode::InvokeStatic, &[0], FOR_NAME)?
        .move_result(Opcode::MoveResultObject, 0)?
        .invoke(Opcode::InvokeVirtual, &[0], GET_NAME)?
        .move_result(Opcode::MoveResultObject, 0)?
        .return_value(Opcode::ReturnObject, 0)?;
    let main = VirtualClass::new("LMain;").with_method(
        VirtualMethod::new(
            MethodRef::parse("LMain;->name()Ljava/lang/String;")?,
            AccessFlags::STATIC,
        )
        .with_implementation(asm.finish()?),
    );
    let vm = machine(vec![payload()?, main]);
    let graph = vm.execute("LMain;", "name()Ljava/lang/String;")?;

    assert_eq!(
        graph.terminating_return_consensus(),
        Some(Value::string("com.example.Payload"))
    );
    Ok(())
}
