// Copyright 2026 Stitch Authors.
// This file is part of Stitch.

// Stitch is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Stitch is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Stitch.  If not, see <http://www.gnu.org/licenses/>.

use std::collections::HashMap;

use errors::TrieErrorKind;

use crate::node::{NodeHandle, RepairNode};

/// The in-memory working set of one repair batch: a map from node
/// handles to repair nodes, plus the allocator for provisional
/// handles. Single-owner, no interior locking.
#[derive(Default)]
pub struct RepairDb {
    tab: HashMap<NodeHandle, RepairNode>,
    serial: u64,
}

impl RepairDb {
    pub fn new() -> Self {
        RepairDb {
            tab: HashMap::new(),
            serial: 0,
        }
    }

    /// A fresh provisional handle, never reused within this database.
    pub fn alloc(&mut self) -> NodeHandle {
        self.serial += 1;
        NodeHandle::Temp(self.serial)
    }

    /// Insert a node. Re-inserting the identical node is a no-op;
    /// claiming an occupied handle with different content is refused.
    pub fn insert(&mut self, handle: NodeHandle, node: RepairNode) -> Result<(), TrieErrorKind> {
        match self.tab.get(&handle) {
            Some(have) if have.node == node.node => Ok(()),
            Some(_) => Err(TrieErrorKind::DifferentNodeValueExists),
            None => {
                self.tab.insert(handle, node);
                Ok(())
            }
        }
    }

    /// Overwrite an entry. Only the interpolator uses this, and only on
    /// writable entries it created or copied itself.
    pub fn update(&mut self, handle: NodeHandle, node: RepairNode) {
        self.tab.insert(handle, node);
    }

    pub fn lookup(&self, handle: &NodeHandle) -> Option<&RepairNode> {
        self.tab.get(handle)
    }

    pub fn contains(&self, handle: &NodeHandle) -> bool {
        self.tab.contains_key(handle)
    }

    pub fn remove(&mut self, handle: &NodeHandle) -> Option<RepairNode> {
        self.tab.remove(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeHandle, &RepairNode)> {
        self.tab.iter()
    }

    pub fn len(&self) -> usize {
        self.tab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tab.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::RepairDb;
    use crate::node::{NodeHandle, NodeState, RepairNode, TrieNode};
    use crate::nibble::NibbleSeq;
    use errors::TrieErrorKind;

    fn leaf(payload: &[u8]) -> RepairNode {
        RepairNode {
            state: NodeState::Mutable,
            node: TrieNode::Leaf {
                prefix: NibbleSeq::from_nibbles(&[1, 2]),
                payload: payload.to_vec(),
            },
        }
    }

    #[test]
    fn test_alloc_tags() {
        let mut db = RepairDb::new();
        let a = db.alloc();
        let b = db.alloc();
        assert_ne!(a, b);
        assert!(!a.is_hash());
        assert!(a.as_hash().is_none());
    }

    #[test]
    fn test_insert_rules() {
        let mut db = RepairDb::new();
        let h = db.alloc();

        db.insert(h, leaf(b"x")).unwrap();
        // identical re-insert is idempotent
        db.insert(h, leaf(b"x")).unwrap();
        assert_eq!(db.len(), 1);

        // conflicting content is refused
        assert_eq!(
            db.insert(h, leaf(b"y")),
            Err(TrieErrorKind::DifferentNodeValueExists)
        );

        // explicit overwrite is allowed for the repair machinery
        db.update(h, leaf(b"y"));
        assert_eq!(db.lookup(&h).unwrap(), &leaf(b"y"));

        assert!(db.remove(&h).is_some());
        assert!(db.is_empty());
        assert!(!db.contains(&h));
    }
}
