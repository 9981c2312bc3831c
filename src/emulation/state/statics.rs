//! Per-path static field values and class initialization levels.
//!
//! # Copy-on-Write Semantics
//!
//! The storage uses `imbl::HashMap` for O(1) clones. When a path forks, both children
//! share the underlying structure and only modified entries are copied, so a fork per
//! unresolved branch stays cheap even with many initialized classes.

use std::{fmt, sync::Arc};

use imbl::HashMap as ImHashMap;

use crate::{emulation::Value, metadata::FieldRef};

/// Identity of a static field: declaring class plus field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    /// Internal name of the declaring class
    pub class: Arc<str>,
    /// Field name
    pub name: Arc<str>,
}

impl FieldKey {
    /// Creates a key.
    pub fn new(class: &str, name: &str) -> Self {
        FieldKey {
            class: Arc::from(class),
            name: Arc::from(name),
        }
    }
}

impl From<&FieldRef> for FieldKey {
    fn from(field: &FieldRef) -> Self {
        FieldKey::new(&field.class, &field.name)
    }
}

impl From<(&str, &str)> for FieldKey {
    fn from((class, name): (&str, &str)) -> Self {
        FieldKey::new(class, name)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.class, self.name)
    }
}

/// Progress of a class's static initializer on one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ClassInitLevel {
    /// `<clinit>` has not started on this path
    #[default]
    NotInitialized,
    /// `<clinit>` is running further up the call chain
    Initializing,
    /// `<clinit>` completed
    Initialized,
}

/// Static fields and class initialization levels of one path.
#[derive(Debug, Clone, Default)]
pub struct StaticState {
    fields: ImHashMap<FieldKey, Value>,
    class_init: ImHashMap<Arc<str>, ClassInitLevel>,
}

impl StaticState {
    /// Creates empty storage, no class initialized.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a static field, if this path has one.
    #[must_use]
    pub fn field(&self, key: &FieldKey) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Stores a static field value.
    pub fn set_field(&mut self, key: FieldKey, value: Value) {
        self.fields.insert(key, value);
    }

    /// Every field this path holds a value for.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldKey, &Value)> {
        self.fields.iter()
    }

    /// Initialization level of a class on this path.
    #[must_use]
    pub fn init_level(&self, class: &str) -> ClassInitLevel {
        self.class_init.get(class).copied().unwrap_or_default()
    }

    /// Sets the initialization level of a class.
    pub fn set_init_level(&mut self, class: &str, level: ClassInitLevel) {
        self.class_init.insert(Arc::from(class), level);
    }

    /// Every class with an explicit level.
    pub fn init_levels(&self) -> impl Iterator<Item = (&Arc<str>, &ClassInitLevel)> {
        self.class_init.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_are_independent() {
        let key = FieldKey::new("LFoo;", "x");
        let mut original = StaticState::new();
        original.set_field(key.clone(), Value::int(1));
        original.set_init_level("LFoo;", ClassInitLevel::Initialized);

        let mut fork = original.clone();
        fork.set_field(key.clone(), Value::int(2));
        fork.set_init_level("LBar;", ClassInitLevel::Initializing);

        assert_eq!(original.field(&key), Some(&Value::int(1)));
        assert_eq!(fork.field(&key), Some(&Value::int(2)));
        assert_eq!(original.init_level("LBar;"), ClassInitLevel::NotInitialized);
        assert_eq!(fork.init_level("LFoo;"), ClassInitLevel::Initialized);
    }

    #[test]
    fn key_from_reference_drops_type() {
        let field = FieldRef::new("LFoo;", "x", "I");
        assert_eq!(FieldKey::from(&field), FieldKey::new("LFoo;", "x"));
        assert_eq!(FieldKey::from(&field).to_string(), "LFoo;->x");
    }
}
