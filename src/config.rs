//! The configuration tree.
//!
//! A [`Config`] owns every node of one tree. Nodes are reached through two
//! handle types: [`NodeRef`] for reads (cheap to copy, many at a time) and
//! [`NodeMut`] for mutations (one at a time, borrowing the whole tree).
//!
//! ```
//! use nestcfg::{Config, ConfigValue};
//!
//! let mut config = Config::new();
//! config.set("name", "demo").unwrap();
//! config.section("server").unwrap().set("port", 8080).unwrap();
//!
//! let port = config.root().lookup_path(["server", "port"]).unwrap().unwrap();
//! assert_eq!(port, ConfigValue::Integer(8080));
//! assert_eq!(config.dumps().unwrap(), "name = demo\nserver:\n    port = 8080\n");
//! ```

use crate::engine::{NestedCfg, StoreEngine};
use crate::error::{ConfigError, ConfigResult};
use crate::immutable::{Mutability, Mutator};
use crate::key::{is_metadata, sequence_index, Key};
use crate::modifier::{Modifier, ModifierRegistry, ValueClass};
use crate::node::{Arena, NodeData, NodeId, OrderEntry, Slot};
use crate::value::ConfigValue;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// A hierarchical configuration tree.
pub struct Config {
    pub(crate) arena: Arena,
    root: NodeId,
    registry: Arc<ModifierRegistry>,
    engine: Arc<dyn StoreEngine>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Creates an empty tree using the shared modifier registry.
    pub fn new() -> Self {
        Self::with_registry(ModifierRegistry::shared())
    }

    /// Creates an empty tree using `registry` to resolve modifiers.
    pub fn with_registry(registry: Arc<ModifierRegistry>) -> Self {
        let mut arena = Arena::default();
        let root = arena.insert(NodeData::root());
        Self {
            arena,
            root,
            registry,
            engine: Arc::new(NestedCfg::default()),
        }
    }

    /// Replaces the store engine used to load and dump text.
    pub fn with_engine(mut self, engine: Arc<dyn StoreEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Loads a tree from a file and remembers its path.
    pub fn open(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let mut config = Self::new();
        config.root_mut().load_file(path)?;
        Ok(config)
    }

    pub fn registry(&self) -> &Arc<ModifierRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<dyn StoreEngine> {
        &self.engine
    }

    pub(crate) fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            config: self,
            id: self.root,
        }
    }

    pub fn root_mut(&mut self) -> NodeMut<'_> {
        let id = self.root;
        NodeMut { config: self, id }
    }

    /// Returns the node with `id` if it is still part of the tree.
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.arena
            .contains(id)
            .then_some(NodeRef { config: self, id })
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<NodeMut<'_>> {
        if self.arena.contains(id) {
            Some(NodeMut { config: self, id })
        } else {
            None
        }
    }

    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> ConfigResult<Option<Item<'_>>> {
        self.root().get(key)
    }

    pub fn set<'k>(
        &mut self,
        key: impl Into<Key<'k>>,
        value: impl Into<ConfigValue>,
    ) -> ConfigResult<()> {
        self.root_mut().set(key, value)
    }

    pub fn index<'k>(&mut self, key: impl Into<Key<'k>>) -> ConfigResult<ItemMut<'_>> {
        self.root_mut().index(key)
    }

    pub fn section<'k>(&mut self, key: impl Into<Key<'k>>) -> ConfigResult<NodeMut<'_>> {
        self.root_mut().section(key)
    }

    pub fn index_path<'k, I>(&mut self, path: I) -> ConfigResult<ItemMut<'_>>
    where
        I: IntoIterator,
        I::Item: Into<Key<'k>>,
    {
        self.root_mut().index_path(path)
    }

    pub fn lookup<'k>(&self, key: impl Into<Key<'k>>) -> ConfigResult<Option<Item<'_>>> {
        self.root().lookup(key)
    }

    pub fn add_section<'k>(
        &mut self,
        key: impl Into<Key<'k>>,
        modifier: Option<&str>,
    ) -> ConfigResult<NodeMut<'_>> {
        self.root_mut().add_section(key, modifier)
    }

    pub fn delete<'k>(&mut self, key: impl Into<Key<'k>>) -> ConfigResult<()> {
        self.root_mut().delete(key)
    }

    pub fn add_comment(&mut self, comment: impl Into<String>) -> ConfigResult<()> {
        self.root_mut().add_comment(comment)
    }

    pub fn dumps(&self) -> ConfigResult<String> {
        self.root().dumps()
    }

    pub fn loads(&mut self, text: &str) -> ConfigResult<()> {
        self.root_mut().loads(text)
    }

    pub fn save(&self, path: Option<&Path>) -> ConfigResult<()> {
        self.root().save(path)
    }

    pub fn save_as(&mut self, path: impl AsRef<Path>) -> ConfigResult<()> {
        self.root_mut().save_as(path)
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.root().file_path()
    }

    pub fn to_value(&self) -> ConfigResult<ConfigValue> {
        self.root().to_value()
    }

    /// Deep copy through the text format.
    pub fn copy(&self) -> ConfigResult<Config> {
        self.root().copy()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Config::new();
        config.loads(s)?;
        Ok(config)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("nodes", &self.arena.live())
            .field("file_path", &self.file_path())
            .field("registry", &self.registry)
            .field("engine", &self.engine.name())
            .finish()
    }
}

/// What a key resolves to: a value or a section.
#[derive(Debug, Clone, PartialEq)]
pub enum Item<'a> {
    Value(ConfigValue),
    Section(NodeRef<'a>),
}

impl<'a> Item<'a> {
    pub fn value(&self) -> Option<&ConfigValue> {
        match self {
            Item::Value(v) => Some(v),
            Item::Section(_) => None,
        }
    }

    pub fn into_value(self) -> Option<ConfigValue> {
        match self {
            Item::Value(v) => Some(v),
            Item::Section(_) => None,
        }
    }

    pub fn section(&self) -> Option<NodeRef<'a>> {
        match self {
            Item::Section(node) => Some(*node),
            Item::Value(_) => None,
        }
    }

    pub fn is_section(&self) -> bool {
        matches!(self, Item::Section(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Value(v) => v.type_name(),
            Item::Section(_) => "Section",
        }
    }

    /// Converts the item to a plain value, recursing into sections.
    pub fn to_value(&self) -> ConfigResult<ConfigValue> {
        match self {
            Item::Value(v) => Ok(v.clone()),
            Item::Section(node) => node.to_value(),
        }
    }
}

impl PartialEq<ConfigValue> for Item<'_> {
    fn eq(&self, other: &ConfigValue) -> bool {
        self.value() == Some(other)
    }
}

/// Mutable counterpart of [`Item`].
#[derive(Debug)]
pub enum ItemMut<'a> {
    Value(ConfigValue),
    Section(NodeMut<'a>),
}

impl<'a> ItemMut<'a> {
    pub fn value(&self) -> Option<&ConfigValue> {
        match self {
            ItemMut::Value(v) => Some(v),
            ItemMut::Section(_) => None,
        }
    }

    pub fn into_value(self) -> Option<ConfigValue> {
        match self {
            ItemMut::Value(v) => Some(v),
            ItemMut::Section(_) => None,
        }
    }

    pub fn into_section(self) -> Option<NodeMut<'a>> {
        match self {
            ItemMut::Section(node) => Some(node),
            ItemMut::Value(_) => None,
        }
    }
}

impl PartialEq<ConfigValue> for ItemMut<'_> {
    fn eq(&self, other: &ConfigValue) -> bool {
        self.value() == Some(other)
    }
}

/// A lookup result that does not borrow the tree.
enum Found {
    Value(ConfigValue),
    Node(NodeId),
}

impl From<Item<'_>> for Found {
    fn from(item: Item<'_>) -> Self {
        match item {
            Item::Value(v) => Found::Value(v),
            Item::Section(node) => Found::Node(node.id),
        }
    }
}

fn not_a_section(key: &str) -> ConfigError {
    ConfigError::invalid_value(format!("{key} is a value field, not a section"))
}

/// Read access to one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    config: &'a Config,
    id: NodeId,
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.config, other.config) && self.id == other.id
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("sub_path", &self.sub_path())
            .field("modifier", &self.modifier_name())
            .finish()
    }
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    pub(crate) fn data(&self) -> &'a NodeData {
        &self.config.arena[self.id]
    }

    pub(crate) fn at(&self, id: NodeId) -> NodeRef<'a> {
        NodeRef {
            config: self.config,
            id,
        }
    }

    pub(crate) fn item(&self, slot: &'a Slot) -> Item<'a> {
        match slot {
            Slot::Value(v) => Item::Value(v.clone()),
            Slot::Section(id) => Item::Section(self.at(*id)),
        }
    }

    pub fn owner(&self) -> Option<NodeRef<'a>> {
        self.data().owner.map(|id| self.at(id))
    }

    pub fn root(&self) -> NodeRef<'a> {
        self.at(self.config.root)
    }

    pub fn is_root(&self) -> bool {
        self.data().owner.is_none()
    }

    /// Keys leading from the root to this node.
    pub fn sub_path(&self) -> &'a [String] {
        &self.data().sub_path
    }

    /// Key under which this node is bound in its owner.
    pub fn key(&self) -> Option<&'a str> {
        self.data().key.as_deref()
    }

    pub fn modifier_name(&self) -> Option<&'a str> {
        self.data().modifier.as_deref()
    }

    pub fn has_modifier(&self) -> bool {
        self.modifier().is_some()
    }

    /// Resolves this node's modifier. Unknown names resolve to nothing.
    pub fn modifier(&self) -> Option<Arc<dyn Modifier>> {
        self.config.registry.get(self.modifier_name()?)
    }

    pub fn file_path(&self) -> Option<&'a Path> {
        self.data().file_path.as_deref()
    }

    pub fn mutability(&self) -> Mutability {
        self.data().mutability
    }

    pub fn len(&self) -> usize {
        self.data().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is bound to a value or section.
    pub fn contains<'k>(&self, key: impl Into<Key<'k>>) -> bool {
        key.into()
            .normalize()
            .is_ok_and(|key| self.data().data.contains(&key))
    }

    /// Returns true if `key` is bound or names a metadata field.
    pub fn has_key<'k>(&self, key: impl Into<Key<'k>>) -> bool {
        key.into()
            .normalize()
            .is_ok_and(|key| is_metadata(&key) || self.data().data.contains(&key))
    }

    pub fn has_section<'k>(&self, key: impl Into<Key<'k>>) -> bool {
        key.into()
            .normalize()
            .is_ok_and(|key| matches!(self.data().data.get(&key), Some(Slot::Section(_))))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.data().data.iter().map(|(k, _)| k)
    }

    /// Stored items in insertion order, without modifier decoding.
    pub fn items(&self) -> impl Iterator<Item = (&'a str, Item<'a>)> + 'a {
        let node = *self;
        self.data()
            .data
            .iter()
            .map(move |(k, slot)| (k, node.item(slot)))
    }

    pub fn values(&self) -> impl Iterator<Item = Item<'a>> + 'a {
        self.items().map(|(_, item)| item)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&'a str, NodeRef<'a>)> + 'a {
        self.items()
            .filter_map(|(k, item)| item.section().map(|node| (k, node)))
    }

    /// Keys and comments in write order.
    pub fn order(&self) -> &'a [OrderEntry] {
        &self.data().order
    }

    /// Reads a key of this node.
    ///
    /// Metadata names are answered first. On a modified node, implicit fields
    /// are computed by the modifier and other fields pass through its
    /// `decode_field`. Missing keys give `Ok(None)`.
    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> ConfigResult<Option<Item<'a>>> {
        let key = key.into().normalize()?;
        self.get_normalized(&key)
    }

    /// Like [`get`](Self::get), falling back to `default` for missing keys.
    pub fn get_or<'k>(
        &self,
        key: impl Into<Key<'k>>,
        default: impl Into<ConfigValue>,
    ) -> ConfigResult<Item<'a>> {
        Ok(self
            .get(key)?
            .unwrap_or_else(|| Item::Value(default.into())))
    }

    pub(crate) fn get_normalized(&self, key: &str) -> ConfigResult<Option<Item<'a>>> {
        if let Some(item) = self.metadata(key) {
            return Ok(Some(item));
        }
        let stored = self.stored(key);
        match self.modifier() {
            None => Ok(stored),
            Some(modifier) if modifier.is_implicit(key) => modifier
                .decode_implicit_field(*self, key)
                .map(|value| Some(Item::Value(value))),
            Some(modifier) => modifier.decode_field(*self, key, stored),
        }
    }

    fn stored(&self, key: &str) -> Option<Item<'a>> {
        self.data().data.get(key).map(|slot| self.item(slot))
    }

    fn metadata(&self, key: &str) -> Option<Item<'a>> {
        let node = self.data();
        let item = match key {
            "owner" | "back" => self
                .owner()
                .map_or(Item::Value(ConfigValue::Null), Item::Section),
            "root" => Item::Section(self.root()),
            "sub_path" => Item::Value(node.sub_path.clone().into()),
            "modifier" => Item::Value(node.modifier.clone().into()),
            "key" => Item::Value(node.key.clone().into()),
            "config_file_path" => Item::Value(
                node.file_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .into(),
            ),
            _ => return None,
        };
        Some(item)
    }

    /// Reads a key, falling back to the nearest `globals` section.
    ///
    /// Starting at this node and walking up through owners, the first node
    /// with a `globals` section that binds the key answers it.
    pub fn lookup<'k>(&self, key: impl Into<Key<'k>>) -> ConfigResult<Option<Item<'a>>> {
        let key = key.into().normalize()?;
        self.lookup_normalized(&key)
    }

    pub(crate) fn lookup_normalized(&self, key: &str) -> ConfigResult<Option<Item<'a>>> {
        if let Some(item) = self.get_normalized(key)? {
            return Ok(Some(item));
        }
        self.globals(key)
    }

    fn globals(&self, key: &str) -> ConfigResult<Option<Item<'a>>> {
        let mut current = Some(*self);
        while let Some(node) = current {
            if let Some(Slot::Section(id)) = node.data().data.get("globals") {
                let globals = self.at(*id);
                if globals.data().data.contains(key) {
                    return globals.get_normalized(key);
                }
            }
            current = node.owner();
        }
        Ok(None)
    }

    /// Follows `path` one [`lookup`](Self::lookup) at a time.
    pub fn lookup_path<'k, I>(&self, path: I) -> ConfigResult<Option<Item<'a>>>
    where
        I: IntoIterator,
        I::Item: Into<Key<'k>>,
    {
        let mut current = Item::Section(*self);
        for key in path {
            let key: Key<'k> = key.into();
            let node = match current {
                Item::Section(node) => node,
                Item::Value(value) => {
                    return Err(ConfigError::invalid_value(format!(
                        "cannot look up {} inside a {} value",
                        key,
                        value.type_name()
                    )))
                }
            };
            match node.lookup(key)? {
                Some(item) => current = item,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Returns the section found by [`lookup`](Self::lookup).
    pub fn section<'k>(&self, key: impl Into<Key<'k>>) -> ConfigResult<NodeRef<'a>> {
        let key = key.into().normalize()?;
        match self.lookup_normalized(&key)? {
            Some(Item::Section(node)) => Ok(node),
            Some(Item::Value(_)) => Err(not_a_section(&key)),
            None => Err(ConfigError::key_not_found(key)),
        }
    }

    /// Views this node as a sequence.
    ///
    /// Every key must have the form `list<n>`. Missing positions up to the
    /// largest index read as `Null`.
    pub fn as_sequence(&self) -> ConfigResult<Sequence<'a>> {
        let mut positions = BTreeMap::new();
        for (key, _) in self.data().data.iter() {
            let index = sequence_index(key).ok_or_else(|| {
                ConfigError::type_conversion(format!("section with key {key}"), "sequence")
            })?;
            positions.entry(index).or_insert(key);
        }
        let len = match positions.keys().next_back() {
            Some(last) => last.checked_add(1).ok_or_else(|| {
                ConfigError::type_conversion(format!("section with index {last}"), "sequence")
            })?,
            None => 0,
        };
        Ok(Sequence {
            node: *self,
            positions,
            len,
        })
    }

    /// Iterates as a sequence when possible, otherwise over keys.
    pub fn iterate(&self) -> Iteration<'a> {
        match self.as_sequence() {
            Ok(sequence) => Iteration::Sequence(sequence),
            Err(_) => Iteration::Keys(self.keys().collect()),
        }
    }

    /// Rebuilds the whole value through this node's modifier.
    pub fn decode(&self) -> ConfigResult<ConfigValue> {
        let modifier = self.modifier().ok_or_else(|| {
            ConfigError::unsupported_operation("Cannot call decode without a modifier")
        })?;
        modifier.decode(*self)
    }

    /// Converts the subtree to a plain value.
    ///
    /// Non-empty sections whose keys are all `list<n>` become arrays, as long
    /// as the array would hold at most [`MAX_DENSE_LEN`] items; other
    /// sections become objects. Modified sections are not decoded.
    pub fn to_value(&self) -> ConfigResult<ConfigValue> {
        if !self.is_empty() {
            if let Ok(sequence) = self.as_sequence() {
                if sequence.len() <= MAX_DENSE_LEN {
                    return sequence.to_values().map(ConfigValue::Array);
                }
            }
        }
        self.items()
            .map(|(k, item)| Ok((k.to_string(), item.to_value()?)))
            .collect::<ConfigResult<Vec<_>>>()
            .map(ConfigValue::Object)
    }

    /// Deserializes the subtree into `T`.
    pub fn extract<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        let json = serde_json::to_value(self.to_value()?)?;
        Ok(serde_json::from_value(json)?)
    }

    /// Writes this subtree in the text format.
    pub fn dump<W: Write>(&self, mut out: W) -> ConfigResult<()> {
        self.config.engine.write(*self, &mut out)
    }

    pub fn dumps(&self) -> ConfigResult<String> {
        let mut buffer = Vec::new();
        self.dump(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ConfigError::value_decode(e.to_string()))
    }

    /// Writes the whole tree to `path`, or to the root's file path.
    ///
    /// The stored file path is left unchanged. Missing parent directories
    /// are created.
    pub fn save(&self, path: Option<&Path>) -> ConfigResult<()> {
        if !self.is_root() {
            return self.root().save(path);
        }
        let path = path
            .or_else(|| self.file_path())
            .ok_or(ConfigError::MissingFilePath)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut out = BufWriter::new(File::create(path)?);
        self.dump(&mut out)?;
        out.flush()?;
        tracing::debug!(path = %path.display(), "saved configuration");
        Ok(())
    }

    /// Deep copy of this subtree as a new tree.
    pub fn copy(&self) -> ConfigResult<Config> {
        let text = self.dumps()?;
        let mut copy = Config::with_registry(self.config.registry.clone())
            .with_engine(self.config.engine.clone());
        copy.loads(&text)?;
        Ok(copy)
    }
}

impl Serialize for NodeRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(<S::Error as serde::ser::Error>::custom)?
            .serialize(serializer)
    }
}

/// Longest sequence that is turned into a dense array.
pub const MAX_DENSE_LEN: usize = 1 << 16;

/// Lazy view of a sequence-shaped section.
#[derive(Debug, Clone)]
pub struct Sequence<'a> {
    node: NodeRef<'a>,
    positions: BTreeMap<usize, &'a str>,
    len: usize,
}

impl<'a> Sequence<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Item at `index`; gaps read as `Null`.
    pub fn get(&self, index: usize) -> Option<Item<'a>> {
        if index >= self.len {
            return None;
        }
        let item = self
            .positions
            .get(&index)
            .and_then(|key| self.node.stored(key))
            .unwrap_or(Item::Value(ConfigValue::Null));
        Some(item)
    }

    pub fn iter(&self) -> SequenceIter<'a> {
        self.clone().into_iter()
    }

    /// Collects every position, gaps included.
    ///
    /// Fails for sequences longer than [`MAX_DENSE_LEN`].
    pub fn to_values(&self) -> ConfigResult<Vec<ConfigValue>> {
        if self.len > MAX_DENSE_LEN {
            return Err(ConfigError::type_conversion(
                format!("sequence of length {}", self.len),
                "array",
            ));
        }
        self.iter().map(|item| item.to_value()).collect()
    }
}

impl<'a> IntoIterator for Sequence<'a> {
    type Item = Item<'a>;
    type IntoIter = SequenceIter<'a>;

    fn into_iter(self) -> SequenceIter<'a> {
        SequenceIter {
            sequence: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &Sequence<'a> {
    type Item = Item<'a>;
    type IntoIter = SequenceIter<'a>;

    fn into_iter(self) -> SequenceIter<'a> {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct SequenceIter<'a> {
    sequence: Sequence<'a>,
    next: usize,
}

impl<'a> Iterator for SequenceIter<'a> {
    type Item = Item<'a>;

    fn next(&mut self) -> Option<Item<'a>> {
        let item = self.sequence.get(self.next)?;
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sequence.len.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SequenceIter<'_> {}

/// Result of [`NodeRef::iterate`].
#[derive(Debug, Clone)]
pub enum Iteration<'a> {
    Sequence(Sequence<'a>),
    Keys(Vec<&'a str>),
}

/// Write access to one node.
pub struct NodeMut<'a> {
    pub(crate) config: &'a mut Config,
    pub(crate) id: NodeId,
}

impl fmt::Debug for NodeMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeMut")
            .field("id", &self.id)
            .field("sub_path", &self.view().sub_path())
            .finish()
    }
}

impl<'a> NodeMut<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Read-only view of this node.
    pub fn view(&self) -> NodeRef<'_> {
        NodeRef {
            config: &*self.config,
            id: self.id,
        }
    }

    pub fn into_ref(self) -> NodeRef<'a> {
        NodeRef {
            config: self.config,
            id: self.id,
        }
    }

    /// Shorter-lived handle to the same node.
    pub fn reborrow(&mut self) -> NodeMut<'_> {
        NodeMut {
            config: &mut *self.config,
            id: self.id,
        }
    }

    fn data(&self) -> &NodeData {
        &self.config.arena[self.id]
    }

    fn data_mut(&mut self) -> &mut NodeData {
        &mut self.config.arena[self.id]
    }

    fn check(&self, op: Mutator) -> ConfigResult<()> {
        self.data().mutability.check(op)
    }

    fn at(self, id: NodeId) -> NodeMut<'a> {
        NodeMut {
            config: self.config,
            id,
        }
    }

    pub fn into_owner(self) -> Option<NodeMut<'a>> {
        let owner = self.data().owner?;
        Some(self.at(owner))
    }

    pub fn into_root(self) -> NodeMut<'a> {
        let root = self.config.root;
        self.at(root)
    }

    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> ConfigResult<Option<Item<'_>>> {
        self.view().get(key)
    }

    pub fn contains<'k>(&self, key: impl Into<Key<'k>>) -> bool {
        self.view().contains(key)
    }

    pub fn len(&self) -> usize {
        self.view().len()
    }

    pub fn is_empty(&self) -> bool {
        self.view().is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.view().is_frozen()
    }

    /// Binds an unbound key.
    ///
    /// Mappings become sections with one field per entry, sequences become
    /// sections with `list<n>` fields, and values whose kind triggers a
    /// modifier become sections encoded by it. If building a section fails,
    /// the key and anything created under it are removed again.
    pub fn set<'k>(
        &mut self,
        key: impl Into<Key<'k>>,
        value: impl Into<ConfigValue>,
    ) -> ConfigResult<()> {
        self.check(Mutator::Set)?;
        let mut key = key.into().normalize()?;
        let mut value = value.into();

        if let Some(modifier) = self.view().modifier() {
            reject_implicit(modifier.as_ref(), &key)?;
            (key, value) = modifier.encode_field(self.view(), key, value)?;
            reject_implicit(modifier.as_ref(), &key)?;
        }

        if is_metadata(&key) {
            return Err(ConfigError::key_collision(format!(
                "Cannot set meta-data field: {key}"
            )));
        }
        if self.data().data.contains(&key) {
            return Err(ConfigError::key_collision(format!(
                "{key} is already bound; delete it first"
            )));
        }
        self.bind(key, value)
    }

    fn bind(&mut self, key: String, value: ConfigValue) -> ConfigResult<()> {
        let modifier = match self.config.registry.classify(&value)? {
            ValueClass::Scalar => {
                let node = self.data_mut();
                node.data.insert(key.clone(), Slot::Value(value));
                node.order.push(OrderEntry::Key(key));
                return Ok(());
            }
            ValueClass::Modified(name) => Some(name),
            ValueClass::Mapping | ValueClass::Sequence => None,
        };

        let mark = self.data().order.len();
        let encoded = modifier.is_some();
        let child = self.create_section(key.clone(), modifier);
        let mut section = NodeMut {
            config: &mut *self.config,
            id: child,
        };
        let result = if encoded {
            section.encode(&value)
        } else {
            section.populate(value)
        };

        if result.is_err() {
            let node = self.data_mut();
            let removed = node.data.remove(&key);
            node.order.truncate(mark);
            if let Some(Slot::Section(id)) = removed {
                self.config.arena.release(id);
            }
        }
        result
    }

    fn populate(&mut self, value: ConfigValue) -> ConfigResult<()> {
        match value {
            ConfigValue::Object(entries) => {
                for (k, v) in entries {
                    self.set(k, v)?;
                }
                Ok(())
            }
            ConfigValue::Array(items) => {
                for (i, v) in items.into_iter().enumerate() {
                    self.set(i, v)?;
                }
                Ok(())
            }
            other => Err(ConfigError::type_conversion(other.type_name(), "section")),
        }
    }

    fn create_section(&mut self, key: String, modifier: Option<String>) -> NodeId {
        if let Some(name) = modifier.as_deref() {
            if !self.config.registry.contains(name) {
                tracing::warn!(modifier = name, key = %key, "unknown modifier, section is stored as plain data");
            }
        }
        let child = NodeData::child(self.id, &self.data().sub_path, key.clone(), modifier);
        tracing::trace!(path = ?child.sub_path, modifier = ?child.modifier, "created section");

        let id = self.config.arena.insert(child);
        let node = self.data_mut();
        node.data.insert(key.clone(), Slot::Section(id));
        node.order.push(OrderEntry::Key(key));
        id
    }

    /// Creates an empty section under an unbound key.
    pub fn add_section<'k>(
        mut self,
        key: impl Into<Key<'k>>,
        modifier: Option<&str>,
    ) -> ConfigResult<NodeMut<'a>> {
        self.check(Mutator::AddSection)?;
        let key = key.into().normalize()?;
        if is_metadata(&key) {
            return Err(ConfigError::key_collision(format!(
                "Cannot use meta-data field: {key}"
            )));
        }
        match self.data().data.get(&key) {
            Some(Slot::Section(_)) => {
                return Err(ConfigError::key_collision(format!(
                    "{key} section already exists"
                )))
            }
            Some(Slot::Value(_)) => {
                return Err(ConfigError::key_collision(format!(
                    "{key} is used to store a value"
                )))
            }
            None => {}
        }
        let id = self.create_section(key, modifier.map(str::to_string));
        Ok(self.at(id))
    }

    /// Returns the section bound to `key`, creating it if the key is unbound.
    pub fn get_section<'k>(self, key: impl Into<Key<'k>>) -> ConfigResult<NodeMut<'a>> {
        let key = key.into().normalize()?;
        let existing = self.data().data.get(&key).map(|slot| match slot {
            Slot::Section(id) => Some(*id),
            Slot::Value(_) => None,
        });
        match existing {
            Some(Some(id)) => Ok(self.at(id)),
            Some(None) => Err(not_a_section(&key)),
            None if is_metadata(&key) => Err(ConfigError::invalid_value(format!(
                "Meta-data field {key} is not a section"
            ))),
            None => self.add_section(key, None),
        }
    }

    /// Reads a key with globals fallback, creating an empty section if it
    /// resolves nowhere.
    pub fn index<'k>(self, key: impl Into<Key<'k>>) -> ConfigResult<ItemMut<'a>> {
        let key = key.into().normalize()?;
        let found = self.view().lookup_normalized(&key)?.map(Found::from);
        match found {
            Some(Found::Value(value)) => Ok(ItemMut::Value(value)),
            Some(Found::Node(id)) => Ok(ItemMut::Section(self.at(id))),
            None => self.add_section(key, None).map(ItemMut::Section),
        }
    }

    /// Like [`index`](Self::index), requiring a section.
    pub fn section<'k>(self, key: impl Into<Key<'k>>) -> ConfigResult<NodeMut<'a>> {
        let key = key.into().normalize()?;
        match self.index(key.as_str())? {
            ItemMut::Section(node) => Ok(node),
            ItemMut::Value(_) => Err(not_a_section(&key)),
        }
    }

    /// Follows `path` one [`index`](Self::index) at a time.
    pub fn index_path<'k, I>(self, path: I) -> ConfigResult<ItemMut<'a>>
    where
        I: IntoIterator,
        I::Item: Into<Key<'k>>,
    {
        let mut current = ItemMut::Section(self);
        for key in path {
            let key: Key<'k> = key.into();
            current = match current {
                ItemMut::Section(node) => node.index(key)?,
                ItemMut::Value(value) => {
                    return Err(ConfigError::invalid_value(format!(
                        "cannot index {} inside a {} value",
                        key,
                        value.type_name()
                    )))
                }
            };
        }
        Ok(current)
    }

    /// Unbinds `key`. Its order entries stay and are skipped when writing.
    pub fn delete<'k>(&mut self, key: impl Into<Key<'k>>) -> ConfigResult<()> {
        self.check(Mutator::Delete)?;
        let key = key.into().normalize()?;
        match self.data_mut().data.remove(&key) {
            Some(Slot::Section(id)) => self.config.arena.release(id),
            Some(Slot::Value(_)) => {}
            None => return Err(ConfigError::key_not_found(key)),
        }
        Ok(())
    }

    /// Appends a comment after everything bound so far.
    pub fn add_comment(&mut self, comment: impl Into<String>) -> ConfigResult<()> {
        self.check(Mutator::AddComment)?;
        self.data_mut().order.push(OrderEntry::Comment(comment.into()));
        Ok(())
    }

    /// Sets every `(key, value)` pair, stopping at the first failure.
    pub fn update<'k, I, K, V>(&mut self, entries: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key<'k>>,
        V: Into<ConfigValue>,
    {
        self.check(Mutator::Update)?;
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Returns the item at `key`, binding `default` first if it is missing.
    pub fn setdefault<'k>(
        &mut self,
        key: impl Into<Key<'k>>,
        default: impl Into<ConfigValue>,
    ) -> ConfigResult<Item<'_>> {
        self.check(Mutator::SetDefault)?;
        let key = key.into().normalize()?;
        if self.view().get_normalized(&key)?.is_none() {
            self.set(key.as_str(), default)?;
        }
        self.view()
            .get_normalized(&key)?
            .ok_or_else(|| ConfigError::key_not_found(key))
    }

    /// Drops all data, order entries and the modifier.
    pub fn clear(&mut self) -> ConfigResult<()> {
        self.check(Mutator::Clear)?;
        let node = self.data_mut();
        let slots = node.data.take();
        node.order.clear();
        node.modifier = None;
        self.config.arena.release_slots(slots);
        Ok(())
    }

    /// Replaces the modifier and drops all data. Order entries are kept.
    pub fn set_modifier(&mut self, modifier: Option<&str>) -> ConfigResult<()> {
        self.check(Mutator::SetModifier)?;
        if let Some(name) = modifier {
            if !self.config.registry.contains(name) {
                tracing::warn!(modifier = name, "unknown modifier, section is stored as plain data");
            }
        }
        let node = self.data_mut();
        let slots = node.data.take();
        node.modifier = modifier.map(str::to_string);
        self.config.arena.release_slots(slots);
        Ok(())
    }

    /// Stores `value` through this node's modifier.
    pub fn encode(&mut self, value: &ConfigValue) -> ConfigResult<()> {
        self.check(Mutator::Encode)?;
        let modifier = self.view().modifier().ok_or_else(|| {
            ConfigError::unsupported_operation("Cannot call encode without a modifier")
        })?;
        modifier.encode(self.reborrow(), value)
    }

    pub fn set_file_path(&mut self, path: Option<PathBuf>) -> ConfigResult<()> {
        self.check(Mutator::SetFilePath)?;
        self.data_mut().file_path = path;
        Ok(())
    }

    /// Parses text from `reader` into this node.
    pub fn load<R: BufRead>(&mut self, mut reader: R) -> ConfigResult<()> {
        self.check(Mutator::Load)?;
        self.parse(&mut reader)
    }

    pub fn loads(&mut self, text: &str) -> ConfigResult<()> {
        self.check(Mutator::Loads)?;
        self.parse(&mut text.as_bytes())
    }

    /// Loads a file. A node with no prior content remembers the path.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<()> {
        self.check(Mutator::LoadFile)?;
        let path = path.as_ref();
        let is_new = self.data().order.is_empty();
        tracing::debug!(file = %path.display(), "loading configuration file");

        let mut reader = BufReader::new(File::open(path)?);
        self.parse(&mut reader)?;
        if is_new {
            self.set_file_path(Some(path.to_path_buf()))?;
        }
        Ok(())
    }

    fn parse(&mut self, reader: &mut dyn BufRead) -> ConfigResult<()> {
        let engine = self.config.engine.clone();
        let lines = engine.parse(reader, self.reborrow())?;
        tracing::debug!(lines, path = ?self.view().sub_path(), "loaded configuration");
        Ok(())
    }

    /// Records `path` on the root and saves the whole tree there.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> ConfigResult<()> {
        self.check(Mutator::SaveAs)?;
        let mut root = self.reborrow().into_root();
        root.check(Mutator::SaveAs)?;
        root.set_file_path(Some(path.as_ref().to_path_buf()))?;
        root.view().save(None)
    }
}

fn reject_implicit(modifier: &dyn Modifier, key: &str) -> ConfigResult<()> {
    if modifier.is_implicit(key) {
        return Err(ConfigError::unsupported_operation(format!(
            "Cannot set implicit field: {key}"
        )));
    }
    Ok(())
}
