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

//! Ordered leaf traversal over a persistent trie: least/greatest
//! descent, strict successor and predecessor walks, and mirroring a
//! subtree into a repair database. Backtracking pops explicit walk
//! frames, never the call stack.

use errors::TrieErrorKind;

use crate::database::RepairDb;
use crate::nibble::{NibbleSeq, PATH_NIBBLES};
use crate::node::{NodeHandle, NodeState, RepairNode, TrieNode};
use crate::types::Hash;
use crate::walk::{NodeGetter, ProofStep, ProofWalk};

fn fetch(getter: &dyn NodeGetter, key: &Hash) -> Result<TrieNode, TrieErrorKind> {
    let blob = getter
        .node_blob(key)
        .ok_or(TrieErrorKind::NodeNotFound)?;
    TrieNode::decode(&blob).map_err(|_| TrieErrorKind::NodeNotFound)
}

/// Nibbles consumed by the frames of a walk.
fn depth_of(steps: &[ProofStep]) -> usize {
    let mut depth = 0;
    for s in steps {
        if s.nibble >= 0 {
            depth += 1;
        }
        match &s.node {
            TrieNode::Leaf { prefix, .. } | TrieNode::Extension { prefix, .. } => {
                depth += prefix.len()
            }
            TrieNode::Branch { .. } => {}
        }
    }
    depth
}

/// Keep descending from `key`, always taking the least (`forward`) or
/// greatest child, until a leaf is hit or a branch sits at depth
/// `min_depth` or deeper.
fn descend(
    getter: &dyn NodeGetter,
    steps: &mut Vec<ProofStep>,
    start: Hash,
    start_depth: usize,
    min_depth: usize,
    forward: bool,
) -> Result<(), TrieErrorKind> {
    let mut key = start;
    let mut depth = start_depth;
    let mut hops = 0;

    loop {
        hops += 1;
        if hops > PATH_NIBBLES + 4 {
            // deeper than any secure-trie path can be
            return Err(TrieErrorKind::TrieLoopAlert);
        }
        let node = fetch(getter, &key)?;
        let mut nibble: i8 = -1;
        let mut next: Option<Hash> = None;
        match &node {
            TrieNode::Leaf { .. } => {}
            TrieNode::Extension { prefix, child } => match child {
                NodeHandle::Hash(h) => {
                    depth += prefix.len();
                    next = Some(*h);
                }
                NodeHandle::Temp(_) => return Err(TrieErrorKind::InternalDbInconsistency),
            },
            TrieNode::Branch { children } => {
                if depth < min_depth {
                    let scan: Vec<usize> = if forward {
                        (0..16).collect()
                    } else {
                        (0..16).rev().collect()
                    };
                    for m in scan {
                        if let Some(NodeHandle::Hash(h)) = children[m] {
                            nibble = m as i8;
                            next = Some(h);
                            break;
                        }
                    }
                    if next.is_none() {
                        // a branch without a single child is garbage
                        return Err(TrieErrorKind::GarbledNextLeaf);
                    }
                    depth += 1;
                }
            }
        }
        steps.push(ProofStep { key, node, nibble });
        match next {
            Some(h) => key = h,
            None => return Ok(()),
        }
    }
}

/// Walk to the least leaf of the trie under `root`.
pub fn least_leaf(getter: &dyn NodeGetter, root: &Hash) -> Result<ProofWalk, TrieErrorKind> {
    first_leaf(getter, root, true)
}

/// Walk to the greatest leaf of the trie under `root`.
pub fn most_leaf(getter: &dyn NodeGetter, root: &Hash) -> Result<ProofWalk, TrieErrorKind> {
    first_leaf(getter, root, false)
}

fn first_leaf(
    getter: &dyn NodeGetter,
    root: &Hash,
    forward: bool,
) -> Result<ProofWalk, TrieErrorKind> {
    if getter.node_blob(root).is_none() {
        return Err(TrieErrorKind::TrieIsEmpty);
    }
    let mut steps = vec![];
    descend(getter, &mut steps, *root, 0, PATH_NIBBLES, forward)?;
    Ok(ProofWalk {
        steps,
        tail: NibbleSeq::new(),
    })
}

/// The leaf walk strictly after `walk`, or an empty walk when `walk`
/// already sits on the greatest leaf. `min_depth` below 64 makes the
/// walk settle on the subtree branch at that depth instead of a leaf.
pub fn next_leaf(
    walk: &ProofWalk,
    getter: &dyn NodeGetter,
    min_depth: usize,
) -> Result<ProofWalk, TrieErrorKind> {
    neighbor_leaf(walk, getter, min_depth, true)
}

/// The leaf walk strictly before `walk`.
pub fn prev_leaf(
    walk: &ProofWalk,
    getter: &dyn NodeGetter,
    min_depth: usize,
) -> Result<ProofWalk, TrieErrorKind> {
    neighbor_leaf(walk, getter, min_depth, false)
}

fn neighbor_leaf(
    walk: &ProofWalk,
    getter: &dyn NodeGetter,
    min_depth: usize,
    forward: bool,
) -> Result<ProofWalk, TrieErrorKind> {
    if walk.steps.is_empty() {
        return Ok(ProofWalk::default());
    }
    let mut steps = walk.steps.clone();

    if walk.tail.is_empty() {
        // complete walk: step over the terminal node
        steps.pop();
    } else {
        // the walk broke off early; decide against the stopping node
        let last = steps.last().unwrap().clone();
        match &last.node {
            TrieNode::Branch { .. } => {
                if last.nibble >= 0 {
                    // descended into a child that could not be read
                    return Err(TrieErrorKind::NodeNotFound);
                }
                // empty slot at tail[0]: scan continues beside it
                steps.last_mut().unwrap().nibble = walk.tail.at(0) as i8;
            }
            TrieNode::Leaf { prefix, .. } => {
                let d = prefix.common_prefix_len(&walk.tail);
                if d < prefix.len() && d < walk.tail.len() && diverges(forward, prefix.at(d), walk.tail.at(d)) {
                    // the stopping leaf itself lies on the wanted side
                    return Ok(ProofWalk {
                        steps,
                        tail: NibbleSeq::new(),
                    });
                }
                steps.pop();
            }
            TrieNode::Extension { prefix, child } => {
                let d = prefix.common_prefix_len(&walk.tail);
                if d < prefix.len() && d < walk.tail.len() && diverges(forward, prefix.at(d), walk.tail.at(d)) {
                    // whole subtree lies on the wanted side
                    let h = match child {
                        NodeHandle::Hash(h) => *h,
                        NodeHandle::Temp(_) => return Err(TrieErrorKind::InternalDbInconsistency),
                    };
                    let depth = depth_of(&steps);
                    descend(getter, &mut steps, h, depth, min_depth, forward)?;
                    return Ok(ProofWalk {
                        steps,
                        tail: NibbleSeq::new(),
                    });
                }
                steps.pop();
            }
        }
    }

    loop {
        let frame = match steps.last() {
            Some(f) => f.clone(),
            None => return Ok(ProofWalk::default()),
        };
        match &frame.node {
            TrieNode::Branch { children } => {
                let mut found: Option<(usize, Hash)> = None;
                if forward {
                    let from = (frame.nibble + 1).max(0) as usize;
                    for m in from..16 {
                        if let Some(NodeHandle::Hash(h)) = children[m] {
                            found = Some((m, h));
                            break;
                        }
                    }
                } else if frame.nibble > 0 {
                    for m in (0..frame.nibble as usize).rev() {
                        if let Some(NodeHandle::Hash(h)) = children[m] {
                            found = Some((m, h));
                            break;
                        }
                    }
                }
                match found {
                    Some((m, h)) => {
                        steps.last_mut().unwrap().nibble = m as i8;
                        let depth = depth_of(&steps);
                        descend(getter, &mut steps, h, depth, min_depth, forward)?;
                        return Ok(ProofWalk {
                            steps,
                            tail: NibbleSeq::new(),
                        });
                    }
                    None => {
                        steps.pop();
                    }
                }
            }
            TrieNode::Extension { .. } => {
                steps.pop();
            }
            // a leaf can never be an interior frame
            TrieNode::Leaf { .. } => return Err(TrieErrorKind::GarbledNextLeaf),
        }
    }
}

fn diverges(forward: bool, have: u8, want: u8) -> bool {
    if forward {
        have > want
    } else {
        have < want
    }
}

/// Mirror every node visited by a walk into the repair database.
fn absorb(db: &mut RepairDb, walk: &ProofWalk) -> Result<(), TrieErrorKind> {
    for step in &walk.steps {
        db.insert(
            NodeHandle::Hash(step.key),
            RepairNode {
                state: NodeState::Static,
                node: step.node.clone(),
            },
        )?;
    }
    Ok(())
}

/// Copy a persistent subtree leaf by leaf, left to right, into the
/// repair database. Gives up past `max_leaves`, and calls the trie
/// garbled when the successor walk fails to make progress.
pub fn fill_from_left(
    db: &mut RepairDb,
    getter: &dyn NodeGetter,
    root: &Hash,
    max_leaves: usize,
) -> Result<usize, TrieErrorKind> {
    fill(db, getter, root, max_leaves, true)
}

/// Same sweep from the right edge.
pub fn fill_from_right(
    db: &mut RepairDb,
    getter: &dyn NodeGetter,
    root: &Hash,
    max_leaves: usize,
) -> Result<usize, TrieErrorKind> {
    fill(db, getter, root, max_leaves, false)
}

fn fill(
    db: &mut RepairDb,
    getter: &dyn NodeGetter,
    root: &Hash,
    max_leaves: usize,
    forward: bool,
) -> Result<usize, TrieErrorKind> {
    let mut walk = first_leaf(getter, root, forward)?;
    let mut count = 0usize;
    let mut prev: Option<Hash> = None;

    while !walk.steps.is_empty() {
        absorb(db, &walk)?;
        let term = walk.steps.last().unwrap().key;
        if prev == Some(term) {
            return Err(TrieErrorKind::GarbledNextLeaf);
        }
        prev = Some(term);
        count += 1;
        if count > max_leaves {
            return Err(TrieErrorKind::LeafMaxExceeded);
        }
        walk = neighbor_leaf(&walk, getter, PATH_NIBBLES, forward)?;
    }

    debug!("mirrored {} leaves under {}", count, root);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{fill_from_left, fill_from_right, least_leaf, most_leaf, next_leaf, prev_leaf};
    use crate::database::RepairDb;
    use crate::interpolate::{interpolate, LeafSpec};
    use crate::nibble::NibbleSeq;
    use crate::types::Hash;
    use crate::walk::walk_getter;
    use errors::TrieErrorKind;

    fn path(first: &[u8]) -> Hash {
        let mut nibbles = first.to_vec();
        nibbles.resize(64, 0);
        NibbleSeq::from_nibbles(&nibbles).to_path().unwrap()
    }

    fn source(firsts: &[&[u8]]) -> (Hash, HashMap<Hash, Vec<u8>>, Vec<Hash>) {
        let leaves: Vec<LeafSpec> = firsts
            .iter()
            .map(|f| LeafSpec {
                path: path(f),
                payload: f.to_vec(),
            })
            .collect();
        let mut db = RepairDb::new();
        let out = interpolate(&mut db, &Hash::default(), &leaves, true).unwrap();
        let mut blobs = HashMap::new();
        for (handle, entry) in db.iter() {
            blobs.insert(handle.as_hash().unwrap(), entry.node.encode().unwrap());
        }
        let paths = leaves.iter().map(|l| l.path).collect();
        (out.root, blobs, paths)
    }

    #[test]
    fn test_ordered_iteration() {
        let (root, blobs, paths) =
            source(&[&[1], &[3, 0xa], &[3, 0xb], &[7, 7, 7], &[0xf]]);

        // forward sweep visits every leaf in ascending path order
        let mut walk = least_leaf(&blobs, &root).unwrap();
        let mut seen: Vec<Hash> = vec![];
        while !walk.steps.is_empty() {
            let leaf_path = walk.leaf_path().unwrap().to_path().unwrap();
            if let Some(last) = seen.last() {
                assert!(leaf_path > *last);
            }
            seen.push(leaf_path);
            walk = next_leaf(&walk, &blobs, 64).unwrap();
        }
        assert_eq!(seen, paths);

        // prev is the inverse of next on interior leaves
        let start = least_leaf(&blobs, &root).unwrap();
        let fwd = next_leaf(&start, &blobs, 64).unwrap();
        let back = prev_leaf(&fwd, &blobs, 64).unwrap();
        assert_eq!(
            back.leaf_path().unwrap().to_path().unwrap(),
            start.leaf_path().unwrap().to_path().unwrap()
        );

        // edges
        let top = most_leaf(&blobs, &root).unwrap();
        assert_eq!(top.leaf_path().unwrap().to_path().unwrap(), paths[4]);
        assert!(next_leaf(&top, &blobs, 64).unwrap().steps.is_empty());
        let bottom = least_leaf(&blobs, &root).unwrap();
        assert!(prev_leaf(&bottom, &blobs, 64).unwrap().steps.is_empty());
    }

    #[test]
    fn test_next_from_vacant_path() {
        let (root, blobs, paths) = source(&[&[1], &[7], &[0xb]]);

        // walk to a path between the leaves at 1.. and 7..
        let probe = walk_getter(&blobs, &root, &NibbleSeq::from_path(&path(&[5]))).unwrap();
        assert!(!probe.tail.is_empty());
        let succ = next_leaf(&probe, &blobs, 64).unwrap();
        assert_eq!(succ.leaf_path().unwrap().to_path().unwrap(), paths[1]);

        let pred = prev_leaf(&probe, &blobs, 64).unwrap();
        assert_eq!(pred.leaf_path().unwrap().to_path().unwrap(), paths[0]);
    }

    #[test]
    fn test_empty_trie() {
        let blobs: HashMap<Hash, Vec<u8>> = HashMap::new();
        let root = Hash::from_u64(9);
        assert_eq!(
            least_leaf(&blobs, &root).unwrap_err(),
            TrieErrorKind::TrieIsEmpty
        );
    }

    #[test]
    fn test_fill() {
        let (root, blobs, _) = source(&[&[1], &[3, 0xa], &[3, 0xb], &[7, 7, 7], &[0xf]]);

        let mut db = RepairDb::new();
        assert_eq!(fill_from_left(&mut db, &blobs, &root, 100).unwrap(), 5);
        // the mirror holds the complete node set
        assert_eq!(db.len(), blobs.len());

        let mut db = RepairDb::new();
        assert_eq!(fill_from_right(&mut db, &blobs, &root, 100).unwrap(), 5);
        assert_eq!(db.len(), blobs.len());

        let mut db = RepairDb::new();
        assert_eq!(
            fill_from_left(&mut db, &blobs, &root, 3).unwrap_err(),
            TrieErrorKind::LeafMaxExceeded
        );
    }
}
