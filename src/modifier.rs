//! Pluggable codecs that store a value as a section.
//!
//! A modifier owns the layout of any section tagged with its name. It encodes
//! values of its trigger kinds into fields, can rewrite or reject fields as
//! they are set, and computes read-only "implicit" fields on demand.

use crate::config::{Item, NodeMut, NodeRef};
use crate::error::{ConfigError, ConfigResult};
use crate::type_modifier::TypeModifier;
use crate::value::{ConfigValue, ValueKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Codec contract for modified sections.
pub trait Modifier: Send + Sync {
    /// Tag written after `name:` for sections this modifier owns.
    fn name(&self) -> &str;

    /// Value kinds that are stored through this modifier when set.
    fn trigger_kinds(&self) -> &[ValueKind];

    /// Field names computed on read and never stored.
    fn implicit_fields(&self) -> &[&str];

    fn is_implicit(&self, key: &str) -> bool {
        self.implicit_fields().contains(&key)
    }

    /// Stores `value` into the freshly created `node`.
    fn encode(&self, node: NodeMut<'_>, value: &ConfigValue) -> ConfigResult<()>;

    /// Rebuilds a value from the fields of `node`.
    fn decode(&self, node: NodeRef<'_>) -> ConfigResult<ConfigValue>;

    /// Rewrites a field before it is bound on a modified node.
    fn encode_field(
        &self,
        node: NodeRef<'_>,
        key: String,
        value: ConfigValue,
    ) -> ConfigResult<(String, ConfigValue)>;

    /// Rewrites a stored field as it is read.
    fn decode_field<'a>(
        &self,
        _node: NodeRef<'a>,
        _key: &str,
        value: Option<Item<'a>>,
    ) -> ConfigResult<Option<Item<'a>>> {
        Ok(value)
    }

    /// Computes an implicit field.
    fn decode_implicit_field(&self, node: NodeRef<'_>, key: &str) -> ConfigResult<ConfigValue>;
}

/// How a value is bound by `set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueClass {
    /// Stored as a section owned by the named modifier
    Modified(String),
    /// Stored as a plain section, one field per entry
    Mapping,
    /// Stored as a section with `list<i>` fields
    Sequence,
    /// Stored directly
    Scalar,
}

/// Modifiers indexed by name and by the value kinds that trigger them.
#[derive(Default)]
pub struct ModifierRegistry {
    by_name: HashMap<String, Arc<dyn Modifier>>,
    by_kind: HashMap<ValueKind, String>,
}

static SHARED: OnceLock<Arc<ModifierRegistry>> = OnceLock::new();

impl ModifierRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in `type` modifier.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TypeModifier));
        registry
    }

    /// Process-wide registry with the built-in modifiers.
    pub fn shared() -> Arc<ModifierRegistry> {
        SHARED
            .get_or_init(|| Arc::new(Self::with_builtins()))
            .clone()
    }

    /// Adds a modifier, replacing any with the same name or trigger kinds.
    pub fn register(&mut self, modifier: Arc<dyn Modifier>) -> &mut Self {
        let name = modifier.name().to_string();
        for kind in modifier.trigger_kinds() {
            self.by_kind.insert(*kind, name.clone());
        }
        tracing::debug!(modifier = %name, "registered modifier");
        self.by_name.insert(name, modifier);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Modifier>> {
        self.by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Returns the name of the modifier triggered by `value`, if any.
    pub fn modifier_for(&self, value: &ConfigValue) -> Option<&str> {
        self.by_kind.get(&value.kind()).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Decides how `set` stores `value`.
    pub fn classify(&self, value: &ConfigValue) -> ConfigResult<ValueClass> {
        if let Some(name) = self.modifier_for(value) {
            return Ok(ValueClass::Modified(name.to_string()));
        }
        match value {
            ConfigValue::Object(_) => Ok(ValueClass::Mapping),
            ConfigValue::Array(_) => Ok(ValueClass::Sequence),
            ConfigValue::Callable(callable) => Err(ConfigError::unsupported_operation(format!(
                "No modifier registered to store callable {}",
                callable.path()
            ))),
            _ => Ok(ValueClass::Scalar),
        }
    }
}

impl fmt::Debug for ModifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ModifierRegistry")
            .field("modifiers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::{Arguments, Callable};

    #[test]
    fn test_builtins_include_type() {
        let registry = ModifierRegistry::with_builtins();
        assert!(registry.contains("type"));
        let callable = Callable::class("m", "T", |_: &Arguments<'_>| Ok(ConfigValue::Null));
        assert_eq!(
            registry.modifier_for(&ConfigValue::Callable(callable)),
            Some("type")
        );
    }

    #[test]
    fn test_classify() {
        let registry = ModifierRegistry::with_builtins();
        assert_eq!(
            registry.classify(&ConfigValue::Integer(1)).unwrap(),
            ValueClass::Scalar
        );
        assert_eq!(
            registry.classify(&ConfigValue::Array(vec![])).unwrap(),
            ValueClass::Sequence
        );
        assert_eq!(
            registry.classify(&ConfigValue::Object(vec![])).unwrap(),
            ValueClass::Mapping
        );
    }

    #[test]
    fn test_callable_without_modifier_is_rejected() {
        let registry = ModifierRegistry::new();
        let callable = Callable::class("m", "T", |_: &Arguments<'_>| Ok(ConfigValue::Null));
        let err = registry
            .classify(&ConfigValue::Callable(callable))
            .unwrap_err();
        assert!(err.is_unsupported_operation());
    }

    #[test]
    fn test_debug_lists_names() {
        let registry = ModifierRegistry::with_builtins();
        assert_eq!(
            format!("{registry:?}"),
            "ModifierRegistry { modifiers: [\"type\"] }"
        );
    }
}
