//! The built-in `type` modifier.
//!
//! Stores a [`Callable`] as its `module` and `name`, with optional `args`
//! (a sequence) and `kwargs` (a mapping). Reading `object` resolves the
//! callable, `instance` instantiates a type and `call` calls a function.

use crate::callable::{lookup_callable, register_callable, Arguments, CallableKind};
use crate::config::{Item, NodeMut, NodeRef};
use crate::error::{ConfigError, ConfigResult};
use crate::modifier::Modifier;
use crate::value::{ConfigValue, ValueKind};

/// Name of the built-in type modifier.
pub const TYPE_MODIFIER: &str = "type";

const IMPLICIT_FIELDS: &[&str] = &["object", "instance", "call"];
const TRIGGER_KINDS: &[ValueKind] = &[ValueKind::Callable];

#[derive(Debug, Clone, Copy, Default)]
pub struct TypeModifier;

impl TypeModifier {
    fn string_field(node: NodeRef<'_>, field: &str) -> ConfigResult<String> {
        match node.get(field)? {
            Some(Item::Value(ConfigValue::String(s))) => Ok(s),
            Some(other) => Err(ConfigError::type_conversion(
                other.type_name(),
                format!("string for field {field}"),
            )),
            None => Err(ConfigError::key_not_found(field)),
        }
    }

    fn arguments<'a>(node: NodeRef<'a>) -> ConfigResult<Arguments<'a>> {
        let positional = match node.get("args")? {
            Some(Item::Section(args)) => args.as_sequence()?.iter().collect(),
            Some(Item::Value(v)) => {
                return Err(ConfigError::type_conversion(v.type_name(), "args sequence"))
            }
            None => Vec::new(),
        };
        let keyword = match node.get("kwargs")? {
            Some(Item::Section(kwargs)) => kwargs
                .items()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            Some(Item::Value(v)) => {
                return Err(ConfigError::type_conversion(v.type_name(), "kwargs mapping"))
            }
            None => Vec::new(),
        };
        Ok(Arguments::new(positional, keyword))
    }
}

impl Modifier for TypeModifier {
    fn name(&self) -> &str {
        TYPE_MODIFIER
    }

    fn trigger_kinds(&self) -> &[ValueKind] {
        TRIGGER_KINDS
    }

    fn implicit_fields(&self) -> &[&str] {
        IMPLICIT_FIELDS
    }

    fn encode(&self, mut node: NodeMut<'_>, value: &ConfigValue) -> ConfigResult<()> {
        let callable = value
            .as_callable()
            .ok_or_else(|| ConfigError::type_conversion(value.type_name(), "callable"))?;
        register_callable(callable.clone());
        node.set("name", callable.name())?;
        node.set("module", callable.module())?;
        Ok(())
    }

    fn decode(&self, node: NodeRef<'_>) -> ConfigResult<ConfigValue> {
        if !node.has_section("args") && !node.has_section("kwargs") {
            return self.decode_implicit_field(node, "object");
        }
        let callable = match self.decode_implicit_field(node, "object")? {
            ConfigValue::Callable(callable) => callable,
            other => return Err(ConfigError::type_conversion(other.type_name(), "callable")),
        };
        callable.invoke(&Self::arguments(node)?)
    }

    fn encode_field(
        &self,
        _node: NodeRef<'_>,
        key: String,
        value: ConfigValue,
    ) -> ConfigResult<(String, ConfigValue)> {
        match key.as_str() {
            "name" | "module" => {
                if !value.is_scalar() || value.is_null() {
                    return Err(ConfigError::type_conversion(value.type_name(), "string"));
                }
                let text = value.coerce_to_string();
                Ok((key, ConfigValue::String(text)))
            }
            "args" => match value {
                ConfigValue::Array(_) => Ok((key, value)),
                other => Err(ConfigError::type_conversion(other.type_name(), "list")),
            },
            "kwargs" => match value {
                ConfigValue::Object(_) => Ok((key, value)),
                other => Err(ConfigError::type_conversion(other.type_name(), "dict")),
            },
            _ => Err(ConfigError::invalid_value(format!(
                "Modifier does not support field: {key}"
            ))),
        }
    }

    fn decode_implicit_field(&self, node: NodeRef<'_>, key: &str) -> ConfigResult<ConfigValue> {
        let module = Self::string_field(node, "module")?;
        let name = Self::string_field(node, "name")?;
        let callable = lookup_callable(&module, &name)?;

        let supported = match (key, callable.kind()) {
            ("object", _) => return Ok(ConfigValue::Callable(callable)),
            ("instance", CallableKind::Type) | ("call", CallableKind::Function) => true,
            ("instance", CallableKind::Function) | ("call", CallableKind::Type) => false,
            _ => {
                return Err(ConfigError::invalid_value(format!(
                    "{key} is not an implicit field"
                )))
            }
        };
        if !supported {
            let only = match callable.kind() {
                CallableKind::Type => "instantiation",
                CallableKind::Function => "calling",
            };
            return Err(ConfigError::unsupported_operation(format!(
                "Operation: {key} is not supported. {} only supports {only}.",
                callable.path()
            )));
        }
        callable.invoke(&Self::arguments(node)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Callable;
    use crate::config::Config;

    fn point() -> Callable {
        Callable::class("type_modifier_tests", "Point", |args: &Arguments<'_>| {
            let x = args.arg(0).and_then(|v| v.value()).cloned();
            let y = args.kwarg("y").and_then(|v| v.value()).cloned();
            Ok(ConfigValue::Object(vec![
                ("x".to_string(), x.unwrap_or(ConfigValue::Null)),
                ("y".to_string(), y.unwrap_or(ConfigValue::Null)),
            ]))
        })
    }

    fn double() -> Callable {
        Callable::function("type_modifier_tests", "double", |args: &Arguments<'_>| {
            let n = args
                .arg(0)
                .and_then(|v| v.value())
                .and_then(ConfigValue::as_i64)
                .unwrap_or(0);
            Ok(ConfigValue::Integer(n * 2))
        })
    }

    #[test]
    fn test_encode_stores_name_and_module() {
        let mut config = Config::new();
        config.set("point", point()).unwrap();

        let node = config.root().section("point").unwrap();
        assert_eq!(node.modifier_name(), Some("type"));
        assert_eq!(node.get("name").unwrap().unwrap(), ConfigValue::from("Point"));
        assert_eq!(
            node.get("module").unwrap().unwrap(),
            ConfigValue::from("type_modifier_tests")
        );
        assert_eq!(
            node.get("object").unwrap().unwrap(),
            ConfigValue::from(point())
        );
    }

    #[test]
    fn test_instance_with_arguments() {
        let mut config = Config::new();
        config.set("point", point()).unwrap();
        {
            let mut node = config.section("point").unwrap();
            node.set("args", vec![3]).unwrap();
            node.set("kwargs", vec![("y", 4)].into_iter().collect::<ConfigValue>())
                .unwrap();
        }
        let expected: ConfigValue = vec![("x", 3), ("y", 4)].into_iter().collect();
        let node = config.root().section("point").unwrap();
        assert_eq!(node.get("instance").unwrap().unwrap(), expected.clone());
        assert_eq!(node.decode().unwrap(), expected);
    }

    #[test]
    fn test_call_requires_function() {
        let mut config = Config::new();
        config.set("point", point()).unwrap();
        config.set("double", double()).unwrap();
        config.section("double").unwrap().set("args", vec![21]).unwrap();

        let root = config.root();
        let err = root.section("point").unwrap().get("call").unwrap_err();
        assert!(err.is_unsupported_operation());
        let err = root.section("double").unwrap().get("instance").unwrap_err();
        assert!(err.is_unsupported_operation());
        assert_eq!(
            root.section("double").unwrap().get("call").unwrap().unwrap(),
            ConfigValue::Integer(42)
        );
    }

    #[test]
    fn test_decode_without_arguments_returns_object() {
        let mut config = Config::new();
        config.set("double", double()).unwrap();
        let decoded = config.root().section("double").unwrap().decode().unwrap();
        assert_eq!(decoded, ConfigValue::from(double()));
    }

    #[test]
    fn test_field_rules() {
        let mut config = Config::new();
        config.set("point", point()).unwrap();
        let mut node = config.section("point").unwrap();

        assert!(matches!(
            node.set("other", 1).unwrap_err(),
            ConfigError::InvalidValue(_)
        ));
        assert!(node.set("instance", 1).unwrap_err().is_unsupported_operation());
        assert!(matches!(
            node.set("args", 1).unwrap_err(),
            ConfigError::TypeConversion { .. }
        ));
        assert!(matches!(
            node.set("kwargs", vec![1]).unwrap_err(),
            ConfigError::TypeConversion { .. }
        ));
    }

    #[test]
    fn test_unknown_callable() {
        let mut config = Config::new();
        config
            .loads("thing: type\n    name = Missing\n    module = nowhere\n")
            .unwrap();
        let node = config.root().section("thing").unwrap();
        assert!(matches!(
            node.get("object").unwrap_err(),
            ConfigError::KeyNotFound { .. }
        ));
    }
}
