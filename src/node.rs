//! Node storage.
//!
//! Every node of a [`Config`](crate::Config) lives in one arena and is
//! addressed by a [`NodeId`]. A node keeps its bound keys in insertion order,
//! a separate order list interleaving keys and comments, and the metadata
//! that links it back to its owner.

use crate::immutable::Mutability;
use crate::value::ConfigValue;
use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::path::PathBuf;

/// Handle to a node inside a configuration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// What a key is bound to.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Value(ConfigValue),
    Section(NodeId),
}

/// One entry of a node's write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEntry {
    /// A bound key, written if still bound
    Key(String),
    /// A comment line (or several, separated by `\n`)
    Comment(String),
}

/// Insertion-ordered key to slot map.
#[derive(Debug, Default)]
pub(crate) struct DataMap {
    index: HashMap<String, usize>,
    entries: Vec<(String, Slot)>,
}

impl DataMap {
    pub(crate) fn get(&self, key: &str) -> Option<&Slot> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Binds an absent key.
    pub(crate) fn insert(&mut self, key: String, slot: Slot) {
        debug_assert!(!self.index.contains_key(&key));
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, slot));
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Slot> {
        let pos = self.index.remove(key)?;
        let (_, slot) = self.entries.remove(pos);
        for p in self.index.values_mut() {
            if *p > pos {
                *p -= 1;
            }
        }
        Some(slot)
    }

    /// Empties the map, returning what was bound.
    pub(crate) fn take(&mut self) -> Vec<(String, Slot)> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub(crate) fn sections(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().filter_map(|(_, s)| match s {
            Slot::Section(id) => Some(*id),
            Slot::Value(_) => None,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) data: DataMap,
    pub(crate) order: Vec<OrderEntry>,
    pub(crate) owner: Option<NodeId>,
    pub(crate) sub_path: Vec<String>,
    pub(crate) key: Option<String>,
    pub(crate) modifier: Option<String>,
    pub(crate) file_path: Option<PathBuf>,
    pub(crate) mutability: Mutability,
}

impl NodeData {
    pub(crate) fn root() -> Self {
        Self {
            data: DataMap::default(),
            order: Vec::new(),
            owner: None,
            sub_path: Vec::new(),
            key: None,
            modifier: None,
            file_path: None,
            mutability: Mutability::Mutable,
        }
    }

    pub(crate) fn child(
        owner: NodeId,
        parent_path: &[String],
        key: String,
        modifier: Option<String>,
    ) -> Self {
        let mut sub_path = parent_path.to_vec();
        sub_path.push(key.clone());
        Self {
            owner: Some(owner),
            sub_path,
            key: Some(key),
            modifier,
            ..Self::root()
        }
    }
}

/// Storage for every node of one tree. Slots are never reused.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<Option<NodeData>>,
}

impl Arena {
    pub(crate) fn insert(&mut self, node: NodeData) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    /// Drops a node and everything below it.
    pub(crate) fn release(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) {
                pending.extend(node.data.sections());
            }
        }
    }

    /// Releases every section bound in `slots`.
    pub(crate) fn release_slots(&mut self, slots: Vec<(String, Slot)>) {
        for (_, slot) in slots {
            if let Slot::Section(id) = slot {
                self.release(id);
            }
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }
}

impl Index<NodeId> for Arena {
    type Output = NodeData;

    fn index(&self, id: NodeId) -> &NodeData {
        match self.nodes.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("node {} is not part of this tree", id.0),
        }
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut NodeData {
        match self.nodes.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("node {} is not part of this tree", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_map_keeps_order() {
        let mut map = DataMap::default();
        map.insert("b".into(), Slot::Value(ConfigValue::Integer(1)));
        map.insert("a".into(), Slot::Value(ConfigValue::Integer(2)));
        map.insert("c".into(), Slot::Value(ConfigValue::Integer(3)));
        assert!(map.remove("a").is_some());
        map.insert("a".into(), Slot::Value(ConfigValue::Integer(4)));

        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
        assert!(matches!(
            map.get("c"),
            Some(Slot::Value(ConfigValue::Integer(3)))
        ));
        assert!(map.remove("missing").is_none());
    }

    #[test]
    fn test_release_drops_subtree() {
        let mut arena = Arena::default();
        let root = arena.insert(NodeData::root());
        let child = arena.insert(NodeData::child(root, &[], "a".into(), None));
        let grandchild = arena.insert(NodeData::child(child, &["a".into()], "b".into(), None));
        arena[root].data.insert("a".into(), Slot::Section(child));
        arena[child].data.insert("b".into(), Slot::Section(grandchild));

        assert_eq!(arena[grandchild].sub_path, vec!["a", "b"]);
        arena.release(child);
        assert!(arena.contains(root));
        assert!(!arena.contains(child));
        assert!(!arena.contains(grandchild));
        assert_eq!(arena.live(), 1);
    }
}
