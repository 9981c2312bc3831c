use thiserror::Error;

use crate::emulation::EmulationError;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Exceptions thrown by the analyzed program are *not* errors. They are modeled as thrown
/// values on terminating graph nodes. This enum only covers conditions that prevent the engine
/// from producing a graph at all.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - An instruction record or assembled method body is inconsistent
///
/// ## Repository Errors
/// - [`Error::ClassNotFound`] - No virtual class with the requested name
/// - [`Error::MethodNotFound`] - The class has no method with the requested descriptor
/// - [`Error::FieldNotFound`] - The class has no field with the requested name
///
/// ## Engine Errors
/// - [`Error::Emulation`] - An internal fault or exhausted exploration bound
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use smaliscope::{prelude::*, Error};
///
/// let vm = VirtualMachine::new(Arc::new(ClassManagerBuilder::new().build()), VmConfig::default());
/// match vm.execute("Lcom/example/Missing;", "run()V") {
///     Err(Error::ClassNotFound(name)) => assert_eq!(name, "Lcom/example/Missing;"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An instruction record or method body could not be interpreted.
    ///
    /// Raised by op factories when a raw instruction lacks an operand its opcode requires,
    /// and by the assembler when a label is never bound.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The class repository has no class with this internal name.
    #[error("Class not found - {0}")]
    ClassNotFound(String),

    /// The class exists but does not declare the requested method.
    #[error("Method not found - {class}->{descriptor}")]
    MethodNotFound {
        /// Internal name of the class that was searched
        class: String,
        /// Method descriptor, e.g. `run(I)V`
        descriptor: String,
    },

    /// The class exists but does not declare the requested field.
    #[error("Field not found - {class}->{name}")]
    FieldNotFound {
        /// Internal name of the class that was searched
        class: String,
        /// Field name
        name: String,
    },

    /// The engine aborted exploration of a method.
    ///
    /// Wraps an [`EmulationError`] describing either a genuine engine fault or an exceeded
    /// exploration bound. Boxed to keep `Error` small.
    #[error("Emulation failed - {0}")]
    Emulation(Box<EmulationError>),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl From<EmulationError> for Error {
    fn from(error: EmulationError) -> Self {
        Error::Emulation(Box::new(error))
    }
}
