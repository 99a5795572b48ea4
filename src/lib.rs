//! # nestcfg
//!
//! A hierarchical configuration tree with a lossless, comment-preserving,
//! indentation-based text format.
//!
//! - Case-insensitive keys that always form valid identifiers
//! - Nested sections, created on first access
//! - Values typed by literal inference (`5` is an integer, `'5'` a string)
//! - Comments and key order preserved through load and dump
//! - `globals` sections whose fields are visible to every nested section
//! - Modifiers that store rich values as sections, such as deferred constructors
//! - Freezing a node or a whole tree
//!
//! ## Quick Start
//!
//! ```rust
//! use nestcfg::{Config, ConfigValue};
//!
//! let text = "\
//! ## Service settings
//! name = api
//! server:
//!     host = localhost
//!     port = 8080
//! ";
//!
//! let mut config: Config = text.parse().unwrap();
//! let port = config.root().lookup_path(["server", "port"]).unwrap().unwrap();
//! assert_eq!(port, ConfigValue::Integer(8080));
//!
//! config.section("server").unwrap().set("debug", true).unwrap();
//! assert_eq!(
//!     config.dumps().unwrap(),
//!     "# Service settings\nname = api\nserver:\n    host = localhost\n    port = 8080\n    debug = true\n"
//! );
//! ```
//!
//! ## Format
//!
//! ```text
//! # comments start with '#', blank lines are kept too
//! key = value
//! section:
//!     nested = 1
//!     object: type
//!         name = Point
//!         module = geometry
//! ```
//!
//! Values are inferred as an integer, then a float, then a structured
//! literal (`"quoted"`, `[1, 2]`, `{'a': 1}`, `true`, `null`), and finally
//! taken as raw text.
//!
//! ## Globals
//!
//! Reads through [`NodeRef::lookup`] fall back to the nearest `globals`
//! section on the way up to the root:
//!
//! ```rust
//! use nestcfg::{Config, ConfigValue};
//!
//! let config: Config = "globals:\n    region = eu\nservice:\n    name = api\n".parse().unwrap();
//! let service = config.root().section("service").unwrap();
//! assert_eq!(service.lookup("region").unwrap().unwrap(), ConfigValue::from("eu"));
//! assert!(service.get("region").unwrap().is_none());
//! ```
//!
//! ## Deferred Construction
//!
//! Values of kind `Callable` are stored by the built-in `type` modifier:
//!
//! ```rust
//! use nestcfg::{Arguments, Callable, Config, ConfigValue};
//!
//! let add = Callable::function("math", "add", |args: &Arguments<'_>| {
//!     let sum = args
//!         .positional_values()?
//!         .iter()
//!         .filter_map(ConfigValue::as_i64)
//!         .sum::<i64>();
//!     Ok(ConfigValue::Integer(sum))
//! });
//!
//! let mut config = Config::new();
//! config.set("total", add).unwrap();
//! config.section("total").unwrap().set("args", vec![1, 2, 3]).unwrap();
//!
//! let total = config.root().section("total").unwrap();
//! assert_eq!(total.get("call").unwrap().unwrap(), ConfigValue::Integer(6));
//! ```
//!
//! ## Error Handling
//!
//! All operations return `ConfigResult<T>` which is an alias for `Result<T, ConfigError>`.
//! Load failures carry the offending line:
//!
//! ```rust
//! use nestcfg::{Config, ConfigError};
//!
//! match "a = 1\n    b = 2\n".parse::<Config>() {
//!     Err(ConfigError::Parse { line, kind, .. }) => {
//!         assert_eq!(line, 2);
//!         assert_eq!(kind, "Syntax");
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

pub mod callable;
pub mod config;
pub mod engine;
pub mod error;
pub mod immutable;
pub mod key;
pub mod literal;
pub mod modifier;
pub mod node;
pub mod parser;
pub mod type_modifier;
pub mod value;
pub mod writer;

// Re-export main types for convenience
pub use callable::{register_callable, Arguments, Callable, CallableKind};
pub use config::{Config, Item, ItemMut, Iteration, NodeMut, NodeRef, Sequence};
pub use engine::{NestedCfg, StoreEngine};
pub use error::{ConfigError, ConfigResult, ConfigResultExt};
pub use immutable::{Mutability, Mutator};
pub use key::Key;
pub use modifier::{Modifier, ModifierRegistry};
pub use node::{NodeId, OrderEntry};
pub use type_modifier::TypeModifier;
pub use value::{ConfigValue, ValueKind};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
