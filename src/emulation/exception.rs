//! Catch handler dispatch.
//!
//! A thrown value is matched against the try blocks protecting the throwing address.
//! Blocks are consulted in declaration order and, within a block, clauses in priority
//! order; the first clause whose type is a superclass of (or equal to) the thrown class
//! wins. A `catchall` clause matches anything.
//!
//! An unknown thrown value only bounds its runtime class from above by its declared type.
//! [`candidate_handlers`] therefore also enters every clause catching a subclass of the
//! declared type, until a clause that certainly matches ends the walk.

use crate::{
    assembly::MethodImplementation,
    emulation::{runtime::SandboxClassLoader, Value},
};

/// Handler address for an exception of class `exception_type` raised at `address`.
#[must_use]
pub fn find_handler(
    implementation: &MethodImplementation,
    address: u32,
    exception_type: &str,
    loader: &SandboxClassLoader,
) -> Option<u32> {
    implementation
        .try_blocks
        .iter()
        .filter(|block| block.covers(address))
        .flat_map(|block| &block.handlers)
        .find(|clause| match &clause.exception_type {
            None => true,
            Some(caught) => loader.is_assignable(exception_type, caught),
        })
        .map(|clause| clause.handler)
}

/// Handlers an exception of unknown runtime class may enter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerCandidates {
    /// `(handler, narrowed type)` in priority order; `None` keeps the declared type
    pub handlers: Vec<(u32, Option<String>)>,
    /// No clause matches for certain, so the exception may also leave the method
    pub may_escape: bool,
}

/// Every handler an exception declared as `declared_type` raised at `address` may reach.
///
/// Clauses catching `declared_type` or a superclass match for certain and stop the walk.
/// Clauses catching a subclass match only some runtime classes and are collected.
#[must_use]
pub fn candidate_handlers(
    implementation: &MethodImplementation,
    address: u32,
    declared_type: &str,
    loader: &SandboxClassLoader,
) -> HandlerCandidates {
    let mut candidates = HandlerCandidates::default();
    let clauses = implementation
        .try_blocks
        .iter()
        .filter(|block| block.covers(address))
        .flat_map(|block| &block.handlers);
    for clause in clauses {
        match &clause.exception_type {
            None => {
                candidates.handlers.push((clause.handler, None));
                return candidates;
            }
            Some(caught) if loader.is_assignable(declared_type, caught) => {
                candidates.handlers.push((clause.handler, None));
                return candidates;
            }
            Some(caught) if loader.is_assignable(caught, declared_type) => {
                candidates.handlers.push((clause.handler, Some(caught.clone())));
            }
            Some(_) => {}
        }
    }
    candidates.may_escape = true;
    candidates
}

/// Runtime class of a thrown value.
#[must_use]
pub fn thrown_class(value: &Value) -> &str {
    match value.as_throwable() {
        Some(exception) => &exception.class_name,
        None => value.ty(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        assembly::MethodAssembler,
        emulation::{runtime::KnownPlatformClasses, ThrownException},
        metadata::{ClassManagerBuilder, VirtualClass},
    };

    fn loader() -> SandboxClassLoader {
        let classes = ClassManagerBuilder::new()
            .add_class(
                VirtualClass::new("Lcom/example/Oops;")
                    .with_super_class("Ljava/lang/IllegalStateException;"),
            )
            .build();
        SandboxClassLoader::new(Arc::new(classes), Arc::new(KnownPlatformClasses::new()))
    }

    fn body() -> MethodImplementation {
        let mut asm = MethodAssembler::new(1);
        asm.label("start")
            .unwrap()
            .throw(0)
            .unwrap()
            .label("end")
            .unwrap()
            .label("runtime")
            .unwrap()
            .return_void()
            .unwrap()
            .label("any")
            .unwrap()
            .return_void()
            .unwrap()
            .try_catch(
                "start",
                "end",
                &[(Some("Ljava/lang/RuntimeException;"), "runtime"), (None, "any")],
            )
            .unwrap();
        asm.finish().unwrap()
    }

    #[test]
    fn first_matching_clause_wins() {
        let body = body();
        let loader = loader();
        assert_eq!(find_handler(&body, 0, "Lcom/example/Oops;", &loader), Some(1));
        assert_eq!(
            find_handler(&body, 0, "Ljava/lang/ArithmeticException;", &loader),
            Some(1)
        );
        assert_eq!(find_handler(&body, 0, "Ljava/io/IOException;", &loader), Some(2));
    }

    #[test]
    fn uncovered_address_has_no_handler() {
        let body = body();
        assert_eq!(
            find_handler(&body, 1, "Ljava/lang/RuntimeException;", &loader()),
            None
        );
    }

    #[test]
    fn unknown_exception_may_enter_subclass_handlers() {
        let body = body();
        let loader = loader();

        // a declared Exception may be a RuntimeException, or anything the catchall takes
        let candidates = candidate_handlers(&body, 0, "Ljava/lang/Exception;", &loader);
        assert_eq!(
            candidates.handlers,
            vec![(1, Some("Ljava/lang/RuntimeException;".to_string())), (2, None)]
        );
        assert!(!candidates.may_escape);

        // a RuntimeException subclass is caught for certain by the first clause
        let candidates = candidate_handlers(&body, 0, "Lcom/example/Oops;", &loader);
        assert_eq!(candidates.handlers, vec![(1, None)]);
        assert!(!candidates.may_escape);
    }

    #[test]
    fn unknown_exception_escapes_without_a_certain_match() {
        let mut asm = MethodAssembler::new(1);
        asm.label("start")
            .unwrap()
            .throw(0)
            .unwrap()
            .label("end")
            .unwrap()
            .return_void()
            .unwrap()
            .try_catch(
                "start",
                "end",
                &[
                    (Some("Ljava/lang/IllegalStateException;"), "end"),
                    (Some("Ljava/io/IOException;"), "end"),
                ],
            )
            .unwrap();
        let body = asm.finish().unwrap();
        let loader = loader();

        let candidates = candidate_handlers(&body, 0, "Ljava/lang/RuntimeException;", &loader);
        assert_eq!(
            candidates.handlers,
            vec![(1, Some("Ljava/lang/IllegalStateException;".to_string()))]
        );
        assert!(candidates.may_escape);

        let candidates = candidate_handlers(&body, 0, "Ljava/lang/Throwable;", &loader);
        assert_eq!(candidates.handlers.len(), 2);
        assert!(candidates.may_escape);
    }

    #[test]
    fn thrown_class_prefers_payload() {
        let value = Value::throwable(ThrownException::new("Lcom/example/Oops;", None))
            .retyped("Ljava/lang/Throwable;");
        assert_eq!(thrown_class(&value), "Lcom/example/Oops;");
        assert_eq!(thrown_class(&Value::unknown("Ljava/lang/Exception;")), "Ljava/lang/Exception;");
    }
}
