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

use std::collections::{HashMap, HashSet};

use errors::TrieErrorKind;

use crate::database::RepairDb;
use crate::nibble::{NibbleSeq, PATH_NIBBLES};
use crate::node::{NodeHandle, RepairNode, TrieNode};
use crate::types::Hash;

/// Node source backed by a persistent trie. `None` or an empty blob
/// both read as absent.
pub trait NodeGetter {
    fn node_blob(&self, key: &Hash) -> Option<Vec<u8>>;
}

impl NodeGetter for HashMap<Hash, Vec<u8>> {
    fn node_blob(&self, key: &Hash) -> Option<Vec<u8>> {
        self.get(key).filter(|b| !b.is_empty()).cloned()
    }
}

/// One visited node of a repair-db walk. `nibble` is the branch edge
/// the walk went down, or -1 when the step did not descend a branch
/// edge (extensions, leaves, and the stopping node).
#[derive(Clone, Debug)]
pub struct RepairStep {
    pub handle: NodeHandle,
    pub node: RepairNode,
    pub nibble: i8,
}

#[derive(Clone, Debug, Default)]
pub struct RepairWalk {
    pub steps: Vec<RepairStep>,
    pub tail: NibbleSeq,
}

impl RepairWalk {
    pub fn last(&self) -> Option<&RepairStep> {
        self.steps.last()
    }

    /// Payload of the leaf this walk landed on, if it fully consumed
    /// the path.
    pub fn leaf_payload(&self) -> Option<&[u8]> {
        if !self.tail.is_empty() {
            return None;
        }
        match self.steps.last() {
            Some(RepairStep {
                node:
                    RepairNode {
                        node: TrieNode::Leaf { payload, .. },
                        ..
                    },
                ..
            }) => Some(payload),
            _ => None,
        }
    }
}

/// Walk `path` from `root` against the repair database. The walk never
/// consumes nibbles into a node missing from the database, so the
/// caller can classify the stop from the last step and the tail alone:
/// an empty tail is a full match, otherwise the last node either
/// diverges from the tail or its next link points outside the database.
pub fn walk_repair(db: &RepairDb, root: &NodeHandle, path: &NibbleSeq) -> RepairWalk {
    let mut steps: Vec<RepairStep> = vec![];
    let mut cursor = *root;
    let mut rest = path.clone();

    loop {
        let entry = match db.lookup(&cursor) {
            Some(e) => e.clone(),
            None => break,
        };
        let mut nibble: i8 = -1;
        let mut next: Option<NodeHandle> = None;
        match &entry.node {
            TrieNode::Leaf { prefix, .. } => {
                if *prefix == rest {
                    rest = NibbleSeq::new();
                }
            }
            TrieNode::Extension { prefix, child } => {
                if rest.starts_with(prefix) && db.contains(child) {
                    rest = rest.skip(prefix.len());
                    next = Some(*child);
                }
            }
            TrieNode::Branch { children } => {
                if !rest.is_empty() {
                    let n = rest.at(0);
                    if let Some(child) = children[n as usize] {
                        if db.contains(&child) {
                            nibble = n as i8;
                            rest = rest.skip(1);
                            next = Some(child);
                        }
                    }
                }
            }
        }
        steps.push(RepairStep {
            handle: cursor,
            node: entry,
            nibble,
        });
        match next {
            Some(handle) => cursor = handle,
            None => break,
        }
    }

    trace!("repair walk: {} steps, {:?} tail", steps.len(), rest);
    RepairWalk { steps, tail: rest }
}

/// One visited node of a persistent-trie walk.
#[derive(Clone, Debug)]
pub struct ProofStep {
    pub key: Hash,
    pub node: TrieNode,
    pub nibble: i8,
}

#[derive(Clone, Debug, Default)]
pub struct ProofWalk {
    pub steps: Vec<ProofStep>,
    pub tail: NibbleSeq,
}

impl ProofWalk {
    pub fn last(&self) -> Option<&ProofStep> {
        self.steps.last()
    }

    pub fn leaf_payload(&self) -> Option<&[u8]> {
        if !self.tail.is_empty() {
            return None;
        }
        match self.steps.last() {
            Some(ProofStep {
                node: TrieNode::Leaf { payload, .. },
                ..
            }) => Some(payload),
            _ => None,
        }
    }

    /// Full path of the leaf this walk ends on: the branch nibbles and
    /// prefixes contributed by every step.
    pub fn leaf_path(&self) -> Option<NibbleSeq> {
        if !self.tail.is_empty() {
            return None;
        }
        match self.steps.last() {
            Some(ProofStep {
                node: TrieNode::Leaf { .. },
                ..
            }) => {}
            _ => return None,
        }
        let mut out = NibbleSeq::new();
        for s in &self.steps {
            if s.nibble >= 0 {
                out.push(s.nibble as u8);
            }
            match &s.node {
                TrieNode::Leaf { prefix, .. } | TrieNode::Extension { prefix, .. } => {
                    out = out.join(prefix);
                }
                TrieNode::Branch { .. } => {}
            }
        }
        Some(out)
    }
}

/// Walk `path` from the node keyed `root`, decoding blobs fetched from
/// `getter` on demand. A blob that fails to decode ends the walk
/// without an error; the tail holds whatever was not consumed. The
/// getter is untrusted, so a revisited key or a walk deeper than any
/// secure-trie path raises the loop alert instead of spinning.
pub fn walk_getter(
    getter: &dyn NodeGetter,
    root: &Hash,
    path: &NibbleSeq,
) -> Result<ProofWalk, TrieErrorKind> {
    let mut steps: Vec<ProofStep> = vec![];
    let mut key = *root;
    let mut rest = path.clone();
    let mut seen: HashSet<Hash> = HashSet::new();
    let mut hops = 0;

    loop {
        hops += 1;
        if hops > PATH_NIBBLES + 4 || !seen.insert(key) {
            debug!("walk from {} caught in a loop at {}", root, key);
            return Err(TrieErrorKind::TrieLoopAlert);
        }
        let blob = match getter.node_blob(&key) {
            Some(b) => b,
            None => break,
        };
        let node = match TrieNode::decode(&blob) {
            Ok(n) => n,
            Err(e) => {
                trace!("garbled node {} ends walk: {}", key, e);
                break;
            }
        };
        let mut nibble: i8 = -1;
        let mut next: Option<Hash> = None;
        match &node {
            TrieNode::Leaf { prefix, .. } => {
                if *prefix == rest {
                    rest = NibbleSeq::new();
                }
            }
            TrieNode::Extension { prefix, child } => {
                if rest.starts_with(prefix) {
                    if let NodeHandle::Hash(h) = child {
                        rest = rest.skip(prefix.len());
                        next = Some(*h);
                    }
                }
            }
            TrieNode::Branch { children } => {
                if !rest.is_empty() {
                    let n = rest.at(0);
                    if let Some(NodeHandle::Hash(h)) = children[n as usize] {
                        nibble = n as i8;
                        rest = rest.skip(1);
                        next = Some(h);
                    }
                }
            }
        }
        steps.push(ProofStep { key, node, nibble });
        match next {
            Some(h) => key = h,
            None => break,
        }
    }

    Ok(ProofWalk { steps, tail: rest })
}

/// Key of the node `path` resolves to over a persistent trie.
pub fn walk_node_key(
    getter: &dyn NodeGetter,
    root: &Hash,
    path: &NibbleSeq,
) -> Result<Hash, TrieErrorKind> {
    let walk = walk_getter(getter, root, path)?;
    match walk.steps.last() {
        Some(step) if walk.tail.is_empty() => Ok(step.key),
        _ => Err(TrieErrorKind::NodeNotFound),
    }
}

/// Handle of the node `path` resolves to inside the repair database.
pub fn walk_node_handle(
    db: &RepairDb,
    root: &NodeHandle,
    path: &NibbleSeq,
) -> Result<NodeHandle, TrieErrorKind> {
    let walk = walk_repair(db, root, path);
    match walk.steps.last() {
        Some(step) if walk.tail.is_empty() => Ok(step.handle),
        _ => Err(TrieErrorKind::NodeNotFound),
    }
}
