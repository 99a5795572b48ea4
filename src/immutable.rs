//! Freezing nodes.
//!
//! A frozen node rejects every mutating operation with an
//! `UnsupportedOperation` naming the operation. Reads, including globals
//! fallback, keep working.

use crate::config::{Config, NodeMut, NodeRef};
use crate::error::{ConfigError, ConfigResult};
use crate::node::NodeId;

/// Whether a node accepts mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    #[default]
    Mutable,
    Frozen,
}

/// Operations rejected on a frozen node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutator {
    Set,
    AddSection,
    Delete,
    AddComment,
    Update,
    SetDefault,
    Clear,
    SetModifier,
    Encode,
    SetFilePath,
    Load,
    Loads,
    LoadFile,
    SaveAs,
}

impl Mutator {
    pub fn name(self) -> &'static str {
        match self {
            Mutator::Set => "set",
            Mutator::AddSection => "add_section",
            Mutator::Delete => "delete",
            Mutator::AddComment => "add_comment",
            Mutator::Update => "update",
            Mutator::SetDefault => "setdefault",
            Mutator::Clear => "clear",
            Mutator::SetModifier => "set_modifier",
            Mutator::Encode => "encode",
            Mutator::SetFilePath => "set_file_path",
            Mutator::Load => "load",
            Mutator::Loads => "loads",
            Mutator::LoadFile => "load_file",
            Mutator::SaveAs => "save_as",
        }
    }
}

impl Mutability {
    /// Fails if `op` is not allowed in this state.
    pub fn check(self, op: Mutator) -> ConfigResult<()> {
        match self {
            Mutability::Mutable => Ok(()),
            Mutability::Frozen => Err(ConfigError::immutable(op.name())),
        }
    }

    pub fn is_frozen(self) -> bool {
        self == Mutability::Frozen
    }
}

fn freeze_subtree(config: &mut Config, id: NodeId, recursive: bool) {
    let mut pending = vec![id];
    while let Some(id) = pending.pop() {
        let node = &mut config.arena[id];
        node.mutability = Mutability::Frozen;
        if recursive {
            pending.extend(node.data.sections());
        }
    }
}

impl NodeRef<'_> {
    pub fn is_frozen(&self) -> bool {
        self.mutability().is_frozen()
    }
}

impl NodeMut<'_> {
    /// Freezes this node.
    ///
    /// With `recursive`, every node below it is frozen too. With `from_root`
    /// on a non-root node, the whole tree is frozen instead. Freezing a
    /// frozen node does nothing.
    pub fn set_immutable(&mut self, recursive: bool, from_root: bool) {
        let id = if from_root && !self.view().is_root() {
            self.config.root_id()
        } else {
            self.id
        };
        let recursive = recursive || id != self.id;
        freeze_subtree(self.config, id, recursive);
        tracing::trace!(node = id.0, recursive, "froze configuration node");
    }

    /// Freezes the whole tree.
    pub fn freeze(&mut self) {
        self.set_immutable(true, true);
    }
}

impl Config {
    /// Freezes the root, and every node below it if `recursive`.
    pub fn set_immutable(&mut self, recursive: bool) {
        self.root_mut().set_immutable(recursive, false);
    }
}
