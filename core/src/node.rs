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

use std::fmt;

use errors::TrieErrorKind;
use rlp::{Prototype, Rlp, RlpStream};

use crate::nibble::NibbleSeq;
use crate::types::Hash;

/// Reference to a trie node. Finished nodes are addressed by the hash
/// of their encoding; nodes under construction get a provisional id
/// from the repair database until their bytes settle. The enum tag
/// keeps the two spaces from ever colliding.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum NodeHandle {
    Hash(Hash),
    Temp(u64),
}

impl NodeHandle {
    pub fn is_hash(&self) -> bool {
        match self {
            NodeHandle::Hash(_) => true,
            NodeHandle::Temp(_) => false,
        }
    }

    pub fn as_hash(&self) -> Option<Hash> {
        match self {
            NodeHandle::Hash(h) => Some(*h),
            NodeHandle::Temp(_) => None,
        }
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeHandle::Hash(h) => write!(f, "{}", h),
            NodeHandle::Temp(n) => write!(f, "tmp#{}", n),
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum NodeKind {
    Leaf,
    Extension,
    Branch,
}

/// Repair-node life cycle. `Static` nodes carry proof bytes whose hash
/// is pinned and must never change shape in place; `Locked` nodes were
/// finalized locally and are equally immutable; `Mutable` nodes are
/// open while a batch is interpolated; `TmpRoot` is the one mutable
/// root placeholder.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum NodeState {
    Static,
    Locked,
    Mutable,
    TmpRoot,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum TrieNode {
    Leaf {
        prefix: NibbleSeq,
        payload: Vec<u8>,
    },
    Extension {
        prefix: NibbleSeq,
        child: NodeHandle,
    },
    Branch {
        children: [Option<NodeHandle>; 16],
    },
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RepairNode {
    pub state: NodeState,
    pub node: TrieNode,
}

impl RepairNode {
    pub fn writable(&self) -> bool {
        match self.state {
            NodeState::Mutable | NodeState::TmpRoot => true,
            NodeState::Static | NodeState::Locked => false,
        }
    }
}

fn branch_link(slot: &Rlp) -> Result<Option<NodeHandle>, TrieErrorKind> {
    if !slot.is_data() {
        return Err(TrieErrorKind::RlpBranchLinkExpected);
    }
    let d = slot.data().map_err(|_| TrieErrorKind::RlpEncoding)?;
    match d.len() {
        0 => Ok(None),
        32 => Ok(Some(NodeHandle::Hash(Hash::from_bytes(d)))),
        _ => Err(TrieErrorKind::RlpBranchLinkExpected),
    }
}

impl TrieNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            TrieNode::Leaf { .. } => NodeKind::Leaf,
            TrieNode::Extension { .. } => NodeKind::Extension,
            TrieNode::Branch { .. } => NodeKind::Branch,
        }
    }

    /// Decode a node blob, reporting the node kind alongside the error
    /// when the list arity already gave it away.
    pub fn decode_checked(blob: &[u8]) -> Result<TrieNode, (Option<NodeKind>, TrieErrorKind)> {
        let r = Rlp::new(blob);
        match r.prototype().map_err(|_| (None, TrieErrorKind::RlpEncoding))? {
            Prototype::List(2) => {
                let item = r.at(0).map_err(|_| (None, TrieErrorKind::RlpEncoding))?;
                if !item.is_data() {
                    return Err((None, TrieErrorKind::RlpBlobExpected));
                }
                let encoded = item.data().map_err(|_| (None, TrieErrorKind::RlpEncoding))?;
                let (is_leaf, prefix) = NibbleSeq::hex_prefix_decode(encoded)
                    .ok_or((None, TrieErrorKind::RlpExtPathEncoding))?;

                if is_leaf {
                    let item = r.at(1).map_err(|_| (None, TrieErrorKind::RlpEncoding))?;
                    if !item.is_data() {
                        return Err((Some(NodeKind::Leaf), TrieErrorKind::RlpBlobExpected));
                    }
                    let payload = item
                        .data()
                        .map_err(|_| (Some(NodeKind::Leaf), TrieErrorKind::RlpEncoding))?;
                    if payload.is_empty() {
                        return Err((Some(NodeKind::Leaf), TrieErrorKind::RlpNonEmptyBlobExpected));
                    }
                    Ok(TrieNode::Leaf {
                        prefix,
                        payload: payload.to_vec(),
                    })
                } else {
                    if prefix.is_empty() {
                        return Err((Some(NodeKind::Extension), TrieErrorKind::RlpExtPathEncoding));
                    }
                    let item = r.at(1).map_err(|_| (None, TrieErrorKind::RlpEncoding))?;
                    match branch_link(&item) {
                        Ok(Some(child)) => Ok(TrieNode::Extension { prefix, child }),
                        // a link shorter than a node key cannot be followed
                        _ => Err((
                            Some(NodeKind::Extension),
                            TrieErrorKind::RlpBranchLinkExpected,
                        )),
                    }
                }
            }
            Prototype::List(17) => {
                let mut children: [Option<NodeHandle>; 16] = Default::default();
                for i in 0..16 {
                    let slot = r.at(i).map_err(|_| (None, TrieErrorKind::RlpEncoding))?;
                    children[i] = branch_link(&slot)
                        .map_err(|e| (Some(NodeKind::Branch), e))?;
                }
                let last = r.at(16).map_err(|_| (None, TrieErrorKind::RlpEncoding))?;
                // an interior branch of a secure trie never carries a
                // payload of its own
                if !last.is_data() || !last.is_empty() {
                    return Err((Some(NodeKind::Branch), TrieErrorKind::RlpEmptyBlobExpected));
                }
                Ok(TrieNode::Branch { children })
            }
            _ => Err((None, TrieErrorKind::Rlp2Or17ListEntries)),
        }
    }

    pub fn decode(blob: &[u8]) -> Result<TrieNode, TrieErrorKind> {
        Self::decode_checked(blob).map_err(|(_, e)| e)
    }

    /// RLP encoding used both for hashing and for the persistent store.
    /// A provisional child link means the node cannot be encoded yet.
    pub fn encode(&self) -> Result<Vec<u8>, TrieErrorKind> {
        match self {
            TrieNode::Leaf { prefix, payload } => {
                let mut stream = RlpStream::new_list(2);
                stream.append(&prefix.hex_prefix(true));
                stream.append(payload);
                Ok(stream.drain())
            }
            TrieNode::Extension { prefix, child } => {
                let hash = child
                    .as_hash()
                    .ok_or(TrieErrorKind::UnresolvedRepairNode)?;
                let mut stream = RlpStream::new_list(2);
                stream.append(&prefix.hex_prefix(false));
                stream.append(&hash);
                Ok(stream.drain())
            }
            TrieNode::Branch { children } => {
                let mut links: [Option<Hash>; 16] = Default::default();
                for (i, c) in children.iter().enumerate() {
                    links[i] = match c {
                        None => None,
                        Some(handle) => Some(
                            handle
                                .as_hash()
                                .ok_or(TrieErrorKind::UnresolvedRepairNode)?,
                        ),
                    };
                }
                let mut stream = RlpStream::new_list(17);
                for link in links.iter() {
                    match link {
                        Some(h) => stream.append(h),
                        None => stream.append_empty_data(),
                    };
                }
                stream.append_empty_data();
                Ok(stream.drain())
            }
        }
    }

    /// Child links with the partial path fragment leading to each.
    pub fn links(&self) -> Vec<(NibbleSeq, NodeHandle)> {
        match self {
            TrieNode::Leaf { .. } => vec![],
            TrieNode::Extension { prefix, child } => vec![(prefix.clone(), *child)],
            TrieNode::Branch { children } => children
                .iter()
                .enumerate()
                .filter_map(|(i, c)| {
                    c.map(|handle| (NibbleSeq::from_nibbles(&[i as u8]), handle))
                })
                .collect(),
        }
    }
}
