use alloc::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Vec;

/// Index into a verb's variable-name table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Variables every verb starts with, in slot order.
const BUILTIN_NAMES: [&str; 18] = [
    "NUM", "OBJ", "STR", "LIST", "ERR", "player", "this", "caller", "verb", "args", "argstr",
    "dobj", "dobjstr", "prepstr", "iobj", "iobjstr", "INT", "FLOAT",
];

/// A verb's variable-name table.
///
/// Lookup is case-insensitive, matching how the language treats identifiers;
/// the spelling of the first occurrence is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Names {
    names: Vec<Arc<str>>,
}

impl Names {
    pub const PLAYER: VarId = VarId(5);
    pub const THIS: VarId = VarId(6);
    pub const CALLER: VarId = VarId(7);
    pub const VERB: VarId = VarId(8);
    pub const ARGS: VarId = VarId(9);
    pub const ARGSTR: VarId = VarId(10);
    pub const DOBJ: VarId = VarId(11);
    pub const DOBJSTR: VarId = VarId(12);
    pub const PREPSTR: VarId = VarId(13);
    pub const IOBJ: VarId = VarId(14);
    pub const IOBJSTR: VarId = VarId(15);

    /// The call-environment variables handed through to a called verb.
    pub const CALL_ENVIRONMENT: [VarId; 7] = [
        Self::PLAYER,
        Self::ARGSTR,
        Self::DOBJ,
        Self::DOBJSTR,
        Self::PREPSTR,
        Self::IOBJ,
        Self::IOBJSTR,
    ];

    /// A table holding just the built-in variables.
    pub fn new() -> Self {
        Self {
            names: BUILTIN_NAMES.iter().map(|name| Arc::from(*name)).collect(),
        }
    }

    /// An empty table, for programs that do not use the standard slots.
    pub fn empty() -> Self {
        Self { names: Vec::new() }
    }

    pub fn find(&self, name: &str) -> Option<VarId> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| VarId(i as u32))
    }

    /// Looks `name` up, appending it if it is new.
    pub fn find_or_add(&mut self, name: &str) -> VarId {
        match self.find(name) {
            Some(id) => id,
            None => {
                self.names.push(Arc::from(name));
                VarId(self.names.len() as u32 - 1)
            }
        }
    }

    pub fn name(&self, id: VarId) -> Option<&str> {
        self.names.get(id.index()).map(|n| &**n)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| &**n)
    }
}

impl Default for Names {
    fn default() -> Self {
        Self::new()
    }
}
