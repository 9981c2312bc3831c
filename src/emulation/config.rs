//! Virtual machine configuration.
//!
//! [`VmConfig`] bundles the class-safety policy consulted by emulated calls with the
//! [`ExplorationLimits`] that keep path exploration finite.
//!
//! # Safe Classes
//!
//! A class is *safe* when its real platform implementation may be used instead of a
//! modeled one, which in practice means it is a trusted platform class whose behaviour
//! does not depend on the analyzed program. Anything else, the program's own classes in
//! particular, goes through the sandbox.
//!
//! # Presets
//!
//! - [`VmConfig::default()`] - core `java.lang` value classes are safe
//! - [`VmConfig::strict()`] - only boxed primitives and `String` are safe
//! - [`VmConfig::permissive()`] - every `java.*` and `android.*` class is safe
//!
//! # Example
//!
//! ```rust
//! use smaliscope::emulation::{ExplorationLimits, VmConfig};
//!
//! let config = VmConfig::default()
//!     .with_safe_prefix("Lcom/vendor/trusted/")
//!     .with_limits(ExplorationLimits::new().with_max_nodes(50_000));
//!
//! assert!(config.is_safe("Ljava/lang/String;"));
//! assert!(config.is_safe("Lcom/vendor/trusted/Util;"));
//! assert!(!config.is_safe("Lcom/example/Main;"));
//! ```

use rustc_hash::FxHashSet;

use crate::metadata::{component_base, is_primitive};

const CORE_SAFE_CLASSES: &[&str] = &[
    "Ljava/lang/Boolean;",
    "Ljava/lang/Byte;",
    "Ljava/lang/Character;",
    "Ljava/lang/Short;",
    "Ljava/lang/Integer;",
    "Ljava/lang/Long;",
    "Ljava/lang/Float;",
    "Ljava/lang/Double;",
    "Ljava/lang/String;",
];

const DEFAULT_SAFE_CLASSES: &[&str] = &[
    "Ljava/lang/Object;",
    "Ljava/lang/Math;",
    "Ljava/lang/StringBuilder;",
    "Ljava/lang/Number;",
    "Ljava/lang/Throwable;",
    "Ljava/lang/Exception;",
    "Ljava/lang/RuntimeException;",
    "Ljava/lang/Error;",
    "Ljava/lang/ArithmeticException;",
    "Ljava/lang/ClassNotFoundException;",
    "Ljava/lang/NullPointerException;",
    "Ljava/lang/IllegalArgumentException;",
    "Ljava/lang/IllegalStateException;",
];

/// Bounds on path exploration.
///
/// Exceeding any of these aborts the method with an
/// [`EmulationError`](crate::emulation::EmulationError) instead of truncating silently.
///
/// # Default Values
///
/// | Limit | Default Value |
/// |-------|---------------|
/// | `max_nodes` | 100,000 |
/// | `max_address_visits` | 1,000 |
/// | `max_call_depth` | 16 |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplorationLimits {
    /// Maximum nodes created in one execution graph, nested graphs counted separately.
    pub max_nodes: usize,

    /// Maximum nodes reaching a single address.
    ///
    /// Unresolvable loops keep producing new nodes at the loop head; this bound stops
    /// them well before `max_nodes` is reached.
    pub max_address_visits: usize,

    /// Maximum nesting of static initializers and invoked local methods.
    pub max_call_depth: usize,
}

impl Default for ExplorationLimits {
    fn default() -> Self {
        ExplorationLimits {
            max_nodes: 100_000,
            max_address_visits: 1_000,
            max_call_depth: 16,
        }
    }
}

impl ExplorationLimits {
    /// Creates limits with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum node count.
    #[must_use]
    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    /// Sets the maximum per-address node count.
    #[must_use]
    pub fn with_max_address_visits(mut self, max: usize) -> Self {
        self.max_address_visits = max;
        self
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_call_depth(mut self, max: usize) -> Self {
        self.max_call_depth = max;
        self
    }
}

/// Process-wide policy of a [`VirtualMachine`](crate::emulation::VirtualMachine).
///
/// Constructed once and shared read-only by every execution.
#[derive(Clone, Debug)]
pub struct VmConfig {
    /// Exploration bounds.
    pub limits: ExplorationLimits,
    safe_classes: FxHashSet<String>,
    safe_prefixes: Vec<String>,
    unsafe_classes: FxHashSet<String>,
}

impl Default for VmConfig {
    fn default() -> Self {
        let mut config = VmConfig::strict();
        config
            .safe_classes
            .extend(DEFAULT_SAFE_CLASSES.iter().map(|c| (*c).to_string()));
        config
    }
}

impl VmConfig {
    /// Only boxed primitives and `String` are safe.
    #[must_use]
    pub fn strict() -> Self {
        VmConfig {
            limits: ExplorationLimits::default(),
            safe_classes: CORE_SAFE_CLASSES.iter().map(|c| (*c).to_string()).collect(),
            safe_prefixes: Vec::new(),
            unsafe_classes: FxHashSet::default(),
        }
    }

    /// Every `java.*` and `android.*` class is safe.
    #[must_use]
    pub fn permissive() -> Self {
        VmConfig::default()
            .with_safe_prefix("Ljava/")
            .with_safe_prefix("Landroid/")
    }

    /// Replaces the exploration limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ExplorationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Marks one class, by internal name, as safe.
    #[must_use]
    pub fn with_safe_class(mut self, class: impl Into<String>) -> Self {
        self.safe_classes.insert(class.into());
        self
    }

    /// Marks every class whose internal name starts with `prefix` as safe.
    #[must_use]
    pub fn with_safe_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.safe_prefixes.push(prefix.into());
        self
    }

    /// Forces one class to be treated as unsafe, overriding sets and prefixes.
    #[must_use]
    pub fn with_unsafe_class(mut self, class: impl Into<String>) -> Self {
        self.unsafe_classes.insert(class.into());
        self
    }

    /// Decides whether `class_name` may be used with real platform semantics.
    ///
    /// Accepts internal names and array descriptors. Arrays are judged by their
    /// component type and primitive types are always safe.
    #[must_use]
    pub fn is_safe(&self, class_name: &str) -> bool {
        let base = component_base(class_name);
        if is_primitive(base) {
            return true;
        }
        if self.unsafe_classes.contains(base) {
            return false;
        }
        self.safe_classes.contains(base) || self.safe_prefixes.iter().any(|p| base.starts_with(p))
    }
}
