//! Deferred constructors and functions that can be stored in a tree.
//!
//! A [`Callable`] is identified by a `module` and a `name`. Only those two
//! strings are persisted; on read the pair is resolved against a
//! process-wide table filled by [`register_callable`] (and by every encode of
//! a callable value, so a tree can always decode what it stored itself).

use crate::config::Item;
use crate::error::{ConfigError, ConfigResult};
use crate::value::ConfigValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Whether a callable is instantiated (`instance`) or called (`call`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
    /// A type; its implicit field is `instance`
    Type,
    /// A function; its implicit field is `call`
    Function,
}

/// The code run when a callable is instantiated or called.
pub type Factory = Arc<dyn Fn(&Arguments<'_>) -> ConfigResult<ConfigValue> + Send + Sync>;

/// A named constructor or function.
#[derive(Clone)]
pub struct Callable {
    module: String,
    name: String,
    kind: CallableKind,
    factory: Factory,
}

impl Callable {
    /// Creates a callable of the given kind.
    pub fn new<F>(
        module: impl Into<String>,
        name: impl Into<String>,
        kind: CallableKind,
        factory: F,
    ) -> Self
    where
        F: Fn(&Arguments<'_>) -> ConfigResult<ConfigValue> + Send + Sync + 'static,
    {
        Self {
            module: module.into(),
            name: name.into(),
            kind,
            factory: Arc::new(factory),
        }
    }

    /// Creates a type-like callable.
    pub fn class<F>(module: impl Into<String>, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Arguments<'_>) -> ConfigResult<ConfigValue> + Send + Sync + 'static,
    {
        Self::new(module, name, CallableKind::Type, factory)
    }

    /// Creates a function-like callable.
    pub fn function<F>(module: impl Into<String>, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Arguments<'_>) -> ConfigResult<ConfigValue> + Send + Sync + 'static,
    {
        Self::new(module, name, CallableKind::Function, factory)
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    /// Returns `module.name`.
    pub fn path(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// Runs the factory.
    pub fn invoke(&self, args: &Arguments<'_>) -> ConfigResult<ConfigValue> {
        (self.factory)(args)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.name == other.name && self.kind == other.kind
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Positional and keyword arguments handed to a factory.
///
/// Arguments are tree items: a section argument stays a live node, so a
/// factory can read nested fields (with globals fallback) or decode nested
/// modifier sections on demand.
#[derive(Debug, Clone, Default)]
pub struct Arguments<'a> {
    positional: Vec<Item<'a>>,
    keyword: Vec<(String, Item<'a>)>,
}

impl<'a> Arguments<'a> {
    pub fn new(positional: Vec<Item<'a>>, keyword: Vec<(String, Item<'a>)>) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    pub fn positional(&self) -> &[Item<'a>] {
        &self.positional
    }

    pub fn keyword(&self) -> &[(String, Item<'a>)] {
        &self.keyword
    }

    /// Returns the positional argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&Item<'a>> {
        self.positional.get(index)
    }

    /// Returns the keyword argument called `name`.
    pub fn kwarg(&self, name: &str) -> Option<&Item<'a>> {
        self.keyword.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Converts positional arguments to plain values.
    pub fn positional_values(&self) -> ConfigResult<Vec<ConfigValue>> {
        self.positional.iter().map(Item::to_value).collect()
    }

    /// Converts keyword arguments to an object value.
    pub fn keyword_values(&self) -> ConfigResult<ConfigValue> {
        self.keyword
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.to_value()?)))
            .collect::<ConfigResult<Vec<_>>>()
            .map(ConfigValue::Object)
    }
}

static CALLABLES: OnceLock<RwLock<HashMap<String, Callable>>> = OnceLock::new();

fn callables() -> &'static RwLock<HashMap<String, Callable>> {
    CALLABLES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Makes a callable resolvable by its `module` and `name`.
pub fn register_callable(callable: Callable) {
    let mut table = callables()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    table.insert(callable.path(), callable);
}

/// Resolves a callable by `module` and `name`.
pub fn lookup_callable(module: &str, name: &str) -> ConfigResult<Callable> {
    let path = format!("{module}.{name}");
    let table = callables()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    table
        .get(&path)
        .cloned()
        .ok_or_else(|| ConfigError::key_not_found(format!("callable {path}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(args: &Arguments<'_>) -> ConfigResult<ConfigValue> {
        Ok(ConfigValue::Array(args.positional_values()?))
    }

    #[test]
    fn test_register_and_lookup() {
        register_callable(Callable::function("callable_tests", "echo", echo));
        let found = lookup_callable("callable_tests", "echo").unwrap();
        assert_eq!(found.kind(), CallableKind::Function);
        assert_eq!(found.path(), "callable_tests.echo");
    }

    #[test]
    fn test_lookup_missing() {
        let err = lookup_callable("callable_tests", "missing").unwrap_err();
        assert!(matches!(err, ConfigError::KeyNotFound { .. }));
    }

    #[test]
    fn test_invoke_with_values() {
        let callable = Callable::function("callable_tests", "echo_local", echo);
        let args = Arguments::new(
            vec![Item::Value(ConfigValue::Integer(1)), Item::Value("a".into())],
            Vec::new(),
        );
        assert_eq!(
            callable.invoke(&args).unwrap(),
            ConfigValue::Array(vec![ConfigValue::Integer(1), ConfigValue::from("a")])
        );
    }

    #[test]
    fn test_equality_ignores_factory() {
        let a = Callable::class("m", "T", |_: &Arguments<'_>| Ok(ConfigValue::Null));
        let b = Callable::class("m", "T", |_: &Arguments<'_>| Ok(ConfigValue::Integer(1)));
        let c = Callable::function("m", "T", |_: &Arguments<'_>| Ok(ConfigValue::Null));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
