//! The exploration driver.
//!
//! [`VirtualMachine`] explores every path through a method with a FIFO worklist. Each
//! dequeued node executes its op against a copy of the node's state; every successor
//! the op reports becomes a child node with its own derived state.
//!
//! # Successor Handling
//!
//! - `Continue` - a child at the address.
//! - `Terminal(Return)` - the path ends.
//! - `Terminal(Throw)` - the innermost matching catch clause gets a child with the
//!   exception pseudo-register set; without one the path ends with an uncaught
//!   exception recorded on the node. An unknown exception enters every clause its
//!   runtime class might match and escapes unless one matches for certain.
//! - `Redirect` - the synthetic step runs as a nested exploration and every path it
//!   produces becomes its own continuation at the resume address, or its own throw.
//!
//! # Static Initialization
//!
//! Class initialization is tracked per path. Running `<clinit>` marks the class
//! `Initializing` so recursive accesses from inside the initializer read the fields as
//! they are, then explores the initializer as a nested graph sharing the path's static
//! view. Each returning initializer path yields a continuation with the class
//! `Initialized` and the static view that path produced. A local superclass is
//! initialized first. An initializer that throws surfaces at the triggering
//! instruction as `java.lang.ExceptionInInitializerError`, errors excepted.
//!
//! # Bounds
//!
//! [`ExplorationLimits`](crate::emulation::ExplorationLimits) caps the nodes per graph,
//! the nodes per address and the nesting of initializers and invoked methods. Hitting
//! any cap aborts the whole exploration with an [`EmulationError`]; the graph is never
//! silently truncated.

use std::{collections::VecDeque, fmt, sync::Arc};

use dashmap::DashMap;
use log::{debug, trace, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{
    emulation::{
        emulate::EmulatedCallRegistry,
        exception::{candidate_handlers, find_handler, thrown_class},
        graph::{ExecutionGraph, NodeId, NodeOutcome},
        modeled_exception,
        opcode::{OpChild, OpContext, OpFactoryRegistry, OpProgram, SyntheticStep, Termination},
        runtime::{KnownPlatformClasses, PlatformClassLoader, VmServices},
        ClassInitLevel, EmulationError, ExecutionState, FieldKey, RawValue, StaticState,
        ThrownException, Value, VmConfig,
    },
    metadata::{ClassManager, VirtualMethod},
    Result,
};

/// Result of running a synthetic step on one path.
enum StepOutcome {
    /// Continue at the resume address with this state
    Resume(ExecutionState),
    /// Throw at the redirecting instruction with this state
    Raise(ExecutionState, Value),
}

/// Path-exhaustive abstract interpreter over an immutable class repository.
///
/// Compiled method bodies are cached and shared by every exploration; the machine is
/// `Send + Sync` and [`VirtualMachine::execute_all`] explores methods in parallel.
///
/// # Example
///
/// ```rust
/// use smaliscope::{
///     assembly::{MethodAssembler, Opcode},
///     emulation::{Value, VirtualMachine, VmConfig},
///     metadata::{AccessFlags, ClassManagerBuilder, MethodRef, VirtualClass, VirtualMethod},
/// };
///
/// let mut asm = MethodAssembler::new(1);
/// asm.const_int(0, 42)?.return_value(Opcode::Return, 0)?;
/// let answer = VirtualMethod::new(MethodRef::parse("LMain;->answer()I")?, AccessFlags::STATIC)
///     .with_implementation(asm.finish()?);
/// let classes = ClassManagerBuilder::new()
///     .add_class(VirtualClass::new("LMain;").with_method(answer))
///     .build();
///
/// let vm = VirtualMachine::new(classes, VmConfig::default());
/// let graph = vm.execute("LMain;", "answer()I")?;
/// assert_eq!(graph.terminating_return_consensus(), Some(Value::int(42)));
/// # Ok::<(), smaliscope::Error>(())
/// ```
pub struct VirtualMachine {
    services: VmServices,
    factories: Arc<OpFactoryRegistry>,
    programs: DashMap<String, Arc<OpProgram>>,
}

impl VirtualMachine {
    /// Creates a machine with the built-in platform table, emulated calls and op
    /// factories.
    pub fn new(classes: impl Into<Arc<ClassManager>>, config: VmConfig) -> Self {
        let services = VmServices::new(
            classes.into(),
            Arc::new(config),
            Arc::new(KnownPlatformClasses::new()),
            Arc::new(EmulatedCallRegistry::with_defaults()),
        );
        VirtualMachine {
            services,
            factories: Arc::new(OpFactoryRegistry::with_defaults()),
            programs: DashMap::new(),
        }
    }

    /// Replaces the real platform loader consulted for safe classes.
    #[must_use]
    pub fn with_platform_loader(mut self, platform: Arc<dyn PlatformClassLoader>) -> Self {
        self.services = VmServices::new(
            self.services.classes_arc().clone(),
            Arc::new(self.services.config().clone()),
            platform,
            Arc::new(self.services.emulated().clone()),
        );
        self.programs.clear();
        self
    }

    /// Replaces the emulated-call registry.
    #[must_use]
    pub fn with_emulated_calls(mut self, emulated: EmulatedCallRegistry) -> Self {
        let platform = self.services.platform_arc().clone();
        self.services = VmServices::new(
            self.services.classes_arc().clone(),
            Arc::new(self.services.config().clone()),
            platform,
            Arc::new(emulated),
        );
        self.programs.clear();
        self
    }

    /// Replaces the op factories.
    #[must_use]
    pub fn with_op_factories(mut self, factories: OpFactoryRegistry) -> Self {
        self.factories = Arc::new(factories);
        self.programs.clear();
        self
    }

    /// Services shared by every exploration.
    #[must_use]
    pub fn services(&self) -> &VmServices {
        &self.services
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        self.services.config()
    }

    /// The class repository.
    #[must_use]
    pub fn classes(&self) -> &ClassManager {
        self.services.classes()
    }

    /// The compiled body of `method`, built on first use.
    ///
    /// # Errors
    ///
    /// Returns the first build error of the method's instructions.
    pub fn program(&self, method: &Arc<VirtualMethod>) -> Result<Arc<OpProgram>> {
        let signature = method.signature();
        if let Some(program) = self.programs.get(&signature) {
            return Ok(program.clone());
        }
        let program = Arc::new(OpProgram::compile(method, &self.factories, &self.services)?);
        Ok(self
            .programs
            .entry(signature)
            .or_insert(program)
            .value()
            .clone())
    }

    /// A fresh frame for `method`: parameters unknown of their declared types, no class
    /// initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the method has no body or its arguments do not fit its frame.
    pub fn spawn_entrypoint_state(&self, method: &VirtualMethod) -> Result<ExecutionState> {
        let mut state = ExecutionState::for_method(method)?;
        state.assign_parameters(&[]);
        Ok(state)
    }

    /// Explores a method by class and descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ClassNotFound`] or [`crate::Error::MethodNotFound`] if the
    /// method does not exist, and any error of [`VirtualMachine::execute_method`].
    pub fn execute(&self, class: &str, descriptor: &str) -> Result<ExecutionGraph> {
        let method = self.services.classes().get_method(class, descriptor)?;
        self.execute_method(&method)
    }

    /// Explores a method from its entry state.
    ///
    /// # Errors
    ///
    /// Returns an [`EmulationError`] for internal faults and exceeded bounds.
    pub fn execute_method(&self, method: &Arc<VirtualMethod>) -> Result<ExecutionGraph> {
        let state = self.spawn_entrypoint_state(method)?;
        self.execute_with_state(method, state)
    }

    /// Explores a method from a prepared state, e.g. with known parameters.
    ///
    /// # Errors
    ///
    /// Returns an [`EmulationError`] for internal faults and exceeded bounds.
    pub fn execute_with_state(
        &self,
        method: &Arc<VirtualMethod>,
        state: ExecutionState,
    ) -> Result<ExecutionGraph> {
        self.explore(method, state, 0)
    }

    /// Explores independent methods in parallel, one graph each.
    pub fn execute_all(&self, methods: &[Arc<VirtualMethod>]) -> Vec<Result<ExecutionGraph>> {
        methods
            .par_iter()
            .map(|method| self.execute_method(method))
            .collect()
    }

    fn explore(
        &self,
        method: &Arc<VirtualMethod>,
        state: ExecutionState,
        depth: usize,
    ) -> Result<ExecutionGraph> {
        let limits = &self.services.config().limits;
        if depth > limits.max_call_depth {
            warn!(
                "{} nested {} deep, limit {}",
                method.signature(),
                depth,
                limits.max_call_depth
            );
            return Err(EmulationError::CallDepthExceeded {
                depth,
                limit: limits.max_call_depth,
            }
            .into());
        }

        let program = self.program(method)?;
        debug!("exploring {} at depth {}", method.signature(), depth);

        let mut graph = ExecutionGraph::new(method.clone(), program.addresses().collect());
        let mut visits: FxHashMap<u32, usize> = FxHashMap::default();
        let mut worklist: VecDeque<NodeId> = VecDeque::new();

        let entry = program.entry();
        let mut state = state;
        state.set_position(entry);
        visits.insert(entry, 1);
        worklist.push_back(graph.add_node(entry, None, state));

        let ctx = OpContext {
            services: &self.services,
            depth,
        };

        while let Some(id) = worklist.pop_front() {
            let (address, mut state) = match graph.node(id) {
                Some(node) => (node.address(), node.state().derive_child()),
                None => {
                    return Err(EmulationError::InternalError {
                        description: format!("queued node {id} is not in the graph"),
                    }
                    .into())
                }
            };
            let op = program.op(address).ok_or_else(|| EmulationError::InternalError {
                description: format!("no op at {address:#06x} of {}", method.signature()),
            })?;
            trace!("{id} {address:#06x}: {op}");

            let children = op.execute(&mut state, &ctx)?;
            let mut continuations: Vec<(u32, ExecutionState)> = Vec::new();
            let mut uncaught: Vec<Value> = Vec::new();
            let mut returned = false;

            for child in children {
                match child {
                    OpChild::Continue { address: next } => {
                        continuations.push((next, state.derive_child()));
                    }
                    OpChild::Terminal(Termination::Return) => returned = true,
                    OpChild::Terminal(Termination::Throw(thrown)) => {
                        self.dispatch_throw(
                            &program,
                            address,
                            &state,
                            thrown,
                            &mut continuations,
                            &mut uncaught,
                        );
                    }
                    OpChild::Redirect { step, resume } => {
                        for outcome in self.run_step(&step, &state, depth)? {
                            match outcome {
                                StepOutcome::Resume(next) => continuations.push((resume, next)),
                                StepOutcome::Raise(at, thrown) => self.dispatch_throw(
                                    &program,
                                    address,
                                    &at,
                                    thrown,
                                    &mut continuations,
                                    &mut uncaught,
                                ),
                            }
                        }
                    }
                }
            }

            if let Some(node) = graph.node_mut(id) {
                node.state = state;
                node.outcome = if returned {
                    NodeOutcome::Returned
                } else {
                    NodeOutcome::Continued
                };
                for thrown in uncaught {
                    node.record_exception(thrown);
                }
            }

            for (next, mut child_state) in continuations {
                if graph.len() >= limits.max_nodes {
                    warn!(
                        "{} exceeded {} nodes, aborting",
                        method.signature(),
                        limits.max_nodes
                    );
                    return Err(EmulationError::ExplorationLimitExceeded {
                        nodes: graph.len() + 1,
                        limit: limits.max_nodes,
                    }
                    .into());
                }
                let count = visits.entry(next).or_default();
                *count += 1;
                if *count > limits.max_address_visits {
                    warn!(
                        "{} reached {next:#06x} {} times, aborting",
                        method.signature(),
                        *count
                    );
                    return Err(EmulationError::AddressVisitsExceeded {
                        address: next,
                        visits: *count,
                        limit: limits.max_address_visits,
                    }
                    .into());
                }
                child_state.set_position(next);
                worklist.push_back(graph.add_node(next, Some(id), child_state));
            }
        }

        debug!(
            "explored {} in {} nodes, {} terminating",
            method.signature(),
            graph.len(),
            graph.terminating_nodes().count()
        );
        Ok(graph)
    }

    /// Routes a thrown value to its catch handler, or records it as uncaught.
    fn dispatch_throw(
        &self,
        program: &OpProgram,
        address: u32,
        state: &ExecutionState,
        thrown: Value,
        continuations: &mut Vec<(u32, ExecutionState)>,
        uncaught: &mut Vec<Value>,
    ) {
        if thrown.is_unknown() {
            let candidates = candidate_handlers(
                program.implementation(),
                address,
                thrown.ty(),
                self.services.sandbox(),
            );
            for (handler, caught) in candidates.handlers {
                trace!(
                    "{} at {address:#06x} may be caught by {handler:#06x}",
                    thrown.ty()
                );
                let mut entered = state.derive_child();
                entered.assign_exception(match caught {
                    Some(narrowed) => Value::unknown(narrowed.as_str()),
                    None => thrown.clone(),
                });
                continuations.push((handler, entered));
            }
            if candidates.may_escape {
                uncaught.push(thrown);
            }
            return;
        }

        let class = thrown_class(&thrown).to_string();
        match find_handler(
            program.implementation(),
            address,
            &class,
            self.services.sandbox(),
        ) {
            Some(handler) => {
                trace!("{class} at {address:#06x} caught by {handler:#06x}");
                let mut caught = state.derive_child();
                caught.assign_exception(thrown);
                continuations.push((handler, caught));
            }
            None => uncaught.push(thrown),
        }
    }

    fn run_step(
        &self,
        step: &SyntheticStep,
        state: &ExecutionState,
        depth: usize,
    ) -> Result<Vec<StepOutcome>> {
        match step {
            SyntheticStep::StaticInit { class } => {
                let outcomes = self.initialize(class, state.statics(), depth)?;
                Ok(outcomes
                    .into_iter()
                    .map(|outcome| {
                        let mut next = state.derive_child();
                        match outcome {
                            Ok(statics) => {
                                next.replace_statics(statics);
                                StepOutcome::Resume(next)
                            }
                            Err(thrown) => StepOutcome::Raise(next, thrown),
                        }
                    })
                    .collect())
            }
            SyntheticStep::Invoke { method, arguments } => {
                let mut frame = ExecutionState::for_method(method)?;
                frame.assign_parameters(arguments);
                frame.replace_statics(state.statics().clone());
                let callee = self.explore(method, frame, depth + 1)?;

                let mut outcomes = Vec::new();
                for node in callee.terminating_nodes() {
                    let mut next = state.derive_child();
                    next.replace_statics(node.state().statics().clone());
                    if let Some(thrown) = node.exception() {
                        outcomes.push(StepOutcome::Raise(next.clone(), thrown.clone()));
                    }
                    if node.outcome() == NodeOutcome::Returned {
                        next.assign_result_register(node.state().return_value().cloned());
                        outcomes.push(StepOutcome::Resume(next));
                    }
                }
                Ok(outcomes)
            }
        }
    }

    /// Every static view `class`'s initialization can produce from `statics`, or the
    /// value it raises.
    fn initialize(
        &self,
        class: &str,
        statics: &StaticState,
        depth: usize,
    ) -> Result<Vec<std::result::Result<StaticState, Value>>> {
        if statics.init_level(class) != ClassInitLevel::NotInitialized {
            return Ok(vec![Ok(statics.clone())]);
        }
        let classes = self.services.classes();
        let virtual_class = classes.get_virtual_class(class)?;

        let bases = match virtual_class.super_class() {
            Some(parent)
                if classes.is_local_class(parent)
                    && statics.init_level(parent) == ClassInitLevel::NotInitialized =>
            {
                self.initialize(parent, statics, depth)?
            }
            _ => vec![Ok(statics.clone())],
        };

        let mut outcomes = Vec::with_capacity(bases.len());
        for base in bases {
            let mut statics = match base {
                Ok(statics) => statics,
                Err(thrown) => {
                    outcomes.push(Err(thrown));
                    continue;
                }
            };
            statics.set_init_level(class, ClassInitLevel::Initializing);
            for field in virtual_class.static_fields() {
                let raw = field
                    .initial_value
                    .clone()
                    .unwrap_or_else(|| RawValue::default_for(&field.ty));
                statics.set_field(
                    FieldKey::new(class, &field.name),
                    Value::wrap(raw, field.ty.as_str()),
                );
            }

            let Some(clinit) = virtual_class.static_initializer() else {
                statics.set_init_level(class, ClassInitLevel::Initialized);
                outcomes.push(Ok(statics));
                continue;
            };

            debug!("running {} on this path", clinit.signature());
            let mut frame = ExecutionState::for_method(clinit)?;
            frame.replace_statics(statics);
            let graph = self.explore(clinit, frame, depth + 1)?;
            for node in graph.terminating_nodes() {
                if let Some(thrown) = node.exception() {
                    outcomes.push(Err(self.initializer_failure(thrown)));
                }
                if node.outcome() == NodeOutcome::Returned {
                    let mut after = node.state().statics().clone();
                    after.set_init_level(class, ClassInitLevel::Initialized);
                    outcomes.push(Ok(after));
                }
            }
        }
        Ok(outcomes)
    }

    /// What the triggering instruction sees when an initializer throws.
    fn initializer_failure(&self, thrown: &Value) -> Value {
        let class = thrown_class(thrown);
        if self
            .services
            .sandbox()
            .is_assignable(class, "Ljava/lang/Error;")
        {
            return thrown.clone();
        }
        Value::throwable(ThrownException::new(
            modeled_exception::EXCEPTION_IN_INITIALIZER,
            Some(class),
        ))
    }
}

impl fmt::Debug for VirtualMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("services", &self.services)
            .field("programs", &self.programs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{MethodAssembler, Opcode},
        emulation::ExplorationLimits,
        metadata::{AccessFlags, ClassManagerBuilder, MethodRef, VirtualClass, VirtualField},
        test::emulation::static_method,
        Error,
    };

    fn vm(classes: Vec<VirtualClass>, config: VmConfig) -> VirtualMachine {
        let manager = classes
            .into_iter()
            .fold(ClassManagerBuilder::new(), ClassManagerBuilder::add_class)
            .build();
        VirtualMachine::new(manager, config)
    }

    fn class_with(name: &str, methods: Vec<Arc<VirtualMethod>>) -> VirtualClass {
        methods.into_iter().fold(VirtualClass::new(name), |class, m| {
            class.with_method(Arc::unwrap_or_clone(m))
        })
    }

    #[test]
    fn straight_line_method_has_one_path() {
        let mut asm = MethodAssembler::new(2);
        asm.const_int(0, 3)
            .unwrap()
            .const_int(1, 4)
            .unwrap()
            .binary(Opcode::AddInt, 0, 0, 1)
            .unwrap()
            .return_value(Opcode::Return, 0)
            .unwrap();
        let method = static_method("LMain;->f()I", asm.finish().unwrap());
        let vm = vm(vec![class_with("LMain;", vec![method.clone()])], VmConfig::default());
        let graph = vm.execute_method(&method).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.terminating_return_consensus(), Some(Value::int(7)));
        assert_eq!(graph.terminating_register_consensus(1), Some(Value::int(4)));
    }

    #[test]
    fn unknown_loop_hits_address_bound() {
        let mut asm = MethodAssembler::new(1);
        asm.label("head")
            .unwrap()
            .if_testz(Opcode::IfEqz, 0, "head")
            .unwrap()
            .return_void()
            .unwrap();
        let method = static_method("LMain;->spin(I)V", asm.finish().unwrap());
        let config = VmConfig::default()
            .with_limits(ExplorationLimits::new().with_max_address_visits(8));
        let vm = vm(vec![class_with("LMain;", vec![method.clone()])], config);
        match vm.execute_method(&method) {
            Err(Error::Emulation(e)) => assert!(matches!(
                *e,
                EmulationError::AddressVisitsExceeded { address: 0, limit: 8, .. }
            )),
            other => panic!("expected a bound error, got {other:?}"),
        }
    }

    #[test]
    fn node_bound_is_an_error() {
        let mut asm = MethodAssembler::new(1);
        asm.nop().unwrap().nop().unwrap().nop().unwrap().return_void().unwrap();
        let method = static_method("LMain;->f()V", asm.finish().unwrap());
        let config = VmConfig::default().with_limits(ExplorationLimits::new().with_max_nodes(2));
        let vm = vm(vec![class_with("LMain;", vec![method.clone()])], config);
        assert!(matches!(
            vm.execute_method(&method),
            Err(Error::Emulation(e))
                if matches!(*e, EmulationError::ExplorationLimitExceeded { limit: 2, .. })
        ));
    }

    #[test]
    fn clinit_runs_once_per_path_and_sets_fields() {
        let mut clinit = MethodAssembler::new(1);
        clinit
            .const_int(0, 9)
            .unwrap()
            .sput(Opcode::Sput, 0, "LConf;->level:I")
            .unwrap()
            .return_void()
            .unwrap();
        let conf = VirtualClass::new("LConf;")
            .with_field(VirtualField::new("level", "I", AccessFlags::STATIC))
            .with_method(
                VirtualMethod::new(
                    MethodRef::parse("LConf;-><clinit>()V").unwrap(),
                    AccessFlags::STATIC,
                )
                .with_implementation(clinit.finish().unwrap()),
            );

        let mut asm = MethodAssembler::new(1);
        asm.sget(Opcode::Sget, 0, "LConf;->level:I")
            .unwrap()
            .return_value(Opcode::Return, 0)
            .unwrap();
        let method = static_method("LMain;->f()I", asm.finish().unwrap());
        let vm = vm(
            vec![conf, class_with("LMain;", vec![method.clone()])],
            VmConfig::default(),
        );
        let graph = vm.execute_method(&method).unwrap();
        assert_eq!(graph.terminating_return_consensus(), Some(Value::int(9)));
        assert_eq!(
            graph.terminating_field_consensus(("LConf;", "level")),
            Some(Value::int(9))
        );
        assert!(graph
            .terminating_nodes()
            .all(|n| n.state().is_class_initialized("LConf;")));
    }

    #[test]
    fn throwing_clinit_surfaces_as_initializer_error() {
        let mut clinit = MethodAssembler::new(2);
        clinit
            .const_int(0, 1)
            .unwrap()
            .const_int(1, 0)
            .unwrap()
            .binary(Opcode::DivInt, 0, 0, 1)
            .unwrap()
            .return_void()
            .unwrap();
        let broken = VirtualClass::new("LBroken;")
            .with_field(VirtualField::new("x", "I", AccessFlags::STATIC))
            .with_method(
                VirtualMethod::new(
                    MethodRef::parse("LBroken;-><clinit>()V").unwrap(),
                    AccessFlags::STATIC,
                )
                .with_implementation(clinit.finish().unwrap()),
            );
        let mut asm = MethodAssembler::new(1);
        asm.sget(Opcode::Sget, 0, "LBroken;->x:I")
            .unwrap()
            .return_void()
            .unwrap();
        let method = static_method("LMain;->f()V", asm.finish().unwrap());
        let vm = vm(
            vec![broken, class_with("LMain;", vec![method.clone()])],
            VmConfig::default(),
        );
        let graph = vm.execute_method(&method).unwrap();
        let thrown = graph.terminating_exception_consensus().unwrap();
        assert_eq!(thrown.ty(), modeled_exception::EXCEPTION_IN_INITIALIZER);
        assert!(!graph.was_address_reached(2));
    }

    #[test]
    fn invoke_returns_each_callee_path() {
        let mut callee = MethodAssembler::new(2);
        callee
            .if_testz(Opcode::IfEqz, 1, "zero")
            .unwrap()
            .const_int(0, 1)
            .unwrap()
            .return_value(Opcode::Return, 0)
            .unwrap()
            .label("zero")
            .unwrap()
            .const_int(0, 2)
            .unwrap()
            .return_value(Opcode::Return, 0)
            .unwrap();
        let pick = static_method("LMain;->pick(I)I", callee.finish().unwrap());

        let mut asm = MethodAssembler::new(2);
        asm.invoke(Opcode::InvokeStatic, &[1], "LMain;->pick(I)I")
            .unwrap()
            .move_result(Opcode::MoveResult, 0)
            .unwrap()
            .return_value(Opcode::Return, 0)
            .unwrap();
        let caller = static_method("LMain;->f(I)I", asm.finish().unwrap());
        let vm = vm(
            vec![class_with("LMain;", vec![pick, caller.clone()])],
            VmConfig::default(),
        );
        let graph = vm.execute_method(&caller).unwrap();
        assert_eq!(graph.node_pile(3).len(), 2);
        let merged = graph.terminating_return_consensus().unwrap();
        assert!(merged.is_unknown());
        assert_eq!(merged.ty(), "I");
    }

    #[test]
    fn unbounded_recursion_hits_depth_bound() {
        let mut asm = MethodAssembler::new(0);
        asm.invoke(Opcode::InvokeStatic, &[], "LMain;->f()V")
            .unwrap()
            .return_void()
            .unwrap();
        let method = static_method("LMain;->f()V", asm.finish().unwrap());
        let config =
            VmConfig::default().with_limits(ExplorationLimits::new().with_max_call_depth(3));
        let vm = vm(vec![class_with("LMain;", vec![method.clone()])], config);
        let mut state = vm.spawn_entrypoint_state(&method).unwrap();
        state.set_class_init_level("LMain;", ClassInitLevel::Initialized);
        assert!(matches!(
            vm.execute_with_state(&method, state),
            Err(Error::Emulation(e))
                if matches!(*e, EmulationError::CallDepthExceeded { limit: 3, .. })
        ));
    }

    #[test]
    fn programs_are_cached() {
        let mut asm = MethodAssembler::new(0);
        asm.return_void().unwrap();
        let method = static_method("LMain;->f()V", asm.finish().unwrap());
        let vm = vm(vec![class_with("LMain;", vec![method.clone()])], VmConfig::default());
        let first = vm.program(&method).unwrap();
        let second = vm.program(&method).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
