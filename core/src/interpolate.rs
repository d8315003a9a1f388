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

//! Splicing a sorted leaf batch into the partial trie spanned by its
//! boundary proofs. Interior nodes between the proof envelope and the
//! leaves are rebuilt from the batch; the declared root hash has the
//! final word on whether the rebuild was honest.

use std::collections::HashMap;

use errors::TrieErrorKind;

use crate::database::RepairDb;
use crate::inspect::{inspect, DanglingLink};
use crate::nibble::{NibbleSeq, PATH_NIBBLES};
use crate::node::{NodeHandle, NodeState, RepairNode, TrieNode};
use crate::types::Hash;
use crate::walk::{walk_repair, RepairWalk};

/// One leaf of a range response. An empty payload marks the
/// administrative lower-boundary placeholder, never stored as data.
#[derive(Clone, Debug)]
pub struct LeafSpec {
    pub path: Hash,
    pub payload: Vec<u8>,
}

impl LeafSpec {
    pub fn is_admin(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Outcome of a successful interpolation: the verified (or, under
/// bootstrap, freshly computed) root, and the dangling frontier left
/// outside the covered interval.
#[derive(Debug)]
pub struct Interpolated {
    pub root: Hash,
    pub dangling: Vec<DanglingLink>,
}

/// Install `leaves` into the partial trie rooted at `root`. The
/// database must already hold the boundary proofs, unless `bootstrap`
/// declares the batch to be the complete trie content, in which case
/// the root is built from scratch and returned instead of verified.
pub fn interpolate(
    db: &mut RepairDb,
    root: &Hash,
    leaves: &[LeafSpec],
    bootstrap: bool,
) -> Result<Interpolated, TrieErrorKind> {
    let (boundary, data) = validate(leaves)?;

    let mut root_handle = NodeHandle::Hash(*root);
    let mut pending = &data[..];

    if !db.contains(&root_handle) {
        if !bootstrap {
            return Err(TrieErrorKind::RootNodeMissing);
        }
        let first = match pending.first() {
            Some(f) => f,
            None => return Err(TrieErrorKind::RootNodeMissing),
        };
        let fresh = db.alloc();
        db.insert(
            fresh,
            RepairNode {
                state: NodeState::TmpRoot,
                node: TrieNode::Leaf {
                    prefix: NibbleSeq::from_path(&first.path),
                    payload: first.payload.clone(),
                },
            },
        )?;
        root_handle = fresh;
        pending = &pending[1..];
    }

    for spec in pending {
        insert_leaf(db, root_handle, spec)?;
    }

    let computed = finalize(db, root_handle, !bootstrap)?;
    if !bootstrap && computed != *root {
        return Err(TrieErrorKind::RootNodeMismatch);
    }

    let report = inspect(db, &NodeHandle::Hash(computed), &[], PATH_NIBBLES + 1);
    let dangling = check_boundaries(report.dangling, &boundary, &data)?;

    debug!(
        "interpolated {} leaves under {}, {} frontier links",
        data.len(),
        computed,
        dangling.len()
    );
    Ok(Interpolated {
        root: computed,
        dangling,
    })
}

/// Enforce the batch ordering: administrative placeholders in front,
/// data paths strictly ascending, the lower bound not beyond the first
/// data entry.
fn validate(leaves: &[LeafSpec]) -> Result<(Option<Hash>, Vec<LeafSpec>), TrieErrorKind> {
    let mut boundary: Option<Hash> = None;
    let mut data: Vec<LeafSpec> = vec![];

    for spec in leaves {
        if spec.is_admin() {
            if !data.is_empty() {
                return Err(TrieErrorKind::LowerBoundAfterFirstEntry);
            }
            boundary = Some(match boundary {
                Some(b) if b > spec.path => b,
                _ => spec.path,
            });
        } else {
            if let Some(last) = data.last() {
                if spec.path <= last.path {
                    return Err(TrieErrorKind::AccountsNotSrictlyIncreasing);
                }
            }
            data.push(spec.clone());
        }
    }

    if let (Some(b), Some(first)) = (boundary.as_ref(), data.first()) {
        if *b > first.path {
            return Err(TrieErrorKind::LowerBoundAfterFirstEntry);
        }
    }
    Ok((boundary, data))
}

/// Dangling trails inside the covered interval mean the proofs did not
/// actually span the batch; everything outside is legitimate frontier.
fn check_boundaries(
    dangling: Vec<DanglingLink>,
    boundary: &Option<Hash>,
    data: &[LeafSpec],
) -> Result<Vec<DanglingLink>, TrieErrorKind> {
    let (lo, hi) = match (data.first(), data.last()) {
        (Some(first), Some(last)) => (boundary.unwrap_or(first.path), last.path),
        _ => return Ok(dangling),
    };

    let mut frontier = vec![];
    for link in dangling {
        let env_lo = link.trail.min_path();
        let env_hi = link.trail.max_path();
        if env_hi < lo || env_lo > hi {
            frontier.push(link);
        } else if env_lo <= lo {
            debug!("gap below the lower bound at {:?}", link.trail);
            return Err(TrieErrorKind::LowerBoundProofError);
        } else {
            debug!("gap inside the covered range at {:?}", link.trail);
            return Err(TrieErrorKind::RightBoundaryProofFailed);
        }
    }
    Ok(frontier)
}

fn insert_leaf(
    db: &mut RepairDb,
    root_handle: NodeHandle,
    spec: &LeafSpec,
) -> Result<(), TrieErrorKind> {
    let path = NibbleSeq::from_path(&spec.path);
    let walk = walk_repair(db, &root_handle, &path);
    let last = match walk.steps.last() {
        Some(step) => step.clone(),
        None => return Err(TrieErrorKind::InternalDbInconsistency),
    };
    let tail = walk.tail.clone();

    if tail.is_empty() {
        return match &last.node.node {
            TrieNode::Leaf { prefix, payload } => {
                if *payload == spec.payload {
                    return Ok(());
                }
                if last.node.state == NodeState::Static {
                    // a proof node pins a different value at this path
                    return Err(TrieErrorKind::AccountRepairBlocked);
                }
                let prefix = prefix.clone();
                let handles = mutablize(db, &walk)?;
                let target = *handles.last().unwrap();
                let state = db
                    .lookup(&target)
                    .ok_or(TrieErrorKind::InternalDbInconsistency)?
                    .state;
                db.update(
                    target,
                    RepairNode {
                        state,
                        node: TrieNode::Leaf {
                            prefix,
                            payload: spec.payload.clone(),
                        },
                    },
                );
                Ok(())
            }
            // a 64 nibble path cannot run out on an interior node
            _ => Err(TrieErrorKind::InternalDbInconsistency),
        };
    }

    match last.node.node.clone() {
        TrieNode::Branch { children } => {
            let n = tail.at(0) as usize;
            match children[n] {
                Some(child) if db.contains(&child) => Err(TrieErrorKind::InternalDbInconsistency),
                Some(_) => {
                    // the slot commits to a subtree we only know by
                    // hash; rebuild it from the range data and let the
                    // root verification arbitrate
                    attach_leaf(db, &walk, n, tail.skip(1), spec.payload.clone())
                }
                None => {
                    if last.node.state == NodeState::Static {
                        // the proof commits to an empty slot here, the
                        // batch says otherwise: refetch
                        Err(TrieErrorKind::AccountRepairBlocked)
                    } else {
                        attach_leaf(db, &walk, n, tail.skip(1), spec.payload.clone())
                    }
                }
            }
        }
        TrieNode::Extension { prefix, child } => {
            if tail.starts_with(&prefix) {
                if db.contains(&child) {
                    return Err(TrieErrorKind::InternalDbInconsistency);
                }
                // dangling subtree behind the extension: rebuild
                let handles = mutablize(db, &walk)?;
                let target = *handles.last().unwrap();
                let fresh = db.alloc();
                db.insert(
                    fresh,
                    RepairNode {
                        state: NodeState::Mutable,
                        node: TrieNode::Leaf {
                            prefix: tail.skip(prefix.len()),
                            payload: spec.payload.clone(),
                        },
                    },
                )?;
                let state = db
                    .lookup(&target)
                    .ok_or(TrieErrorKind::InternalDbInconsistency)?
                    .state;
                db.update(
                    target,
                    RepairNode {
                        state,
                        node: TrieNode::Extension {
                            prefix,
                            child: fresh,
                        },
                    },
                );
                Ok(())
            } else if prefix.starts_with(&tail) {
                Err(TrieErrorKind::InternalDbInconsistency)
            } else {
                split(db, &walk, &tail, spec.payload.clone())
            }
        }
        TrieNode::Leaf { prefix, .. } => {
            if prefix.starts_with(&tail) || tail.starts_with(&prefix) {
                // one a prefix of the other means unequal leaf depths
                Err(TrieErrorKind::InternalDbInconsistency)
            } else {
                split(db, &walk, &tail, spec.payload.clone())
            }
        }
    }
}

/// Hang a new leaf off the branch the walk stopped at, slot `n`.
fn attach_leaf(
    db: &mut RepairDb,
    walk: &RepairWalk,
    n: usize,
    suffix: NibbleSeq,
    payload: Vec<u8>,
) -> Result<(), TrieErrorKind> {
    let handles = mutablize(db, walk)?;
    let target = *handles.last().unwrap();

    let fresh = db.alloc();
    db.insert(
        fresh,
        RepairNode {
            state: NodeState::Mutable,
            node: TrieNode::Leaf {
                prefix: suffix,
                payload,
            },
        },
    )?;

    let entry = db
        .lookup(&target)
        .cloned()
        .ok_or(TrieErrorKind::InternalDbInconsistency)?;
    match entry.node {
        TrieNode::Branch { mut children } => {
            children[n] = Some(fresh);
            db.update(
                target,
                RepairNode {
                    state: entry.state,
                    node: TrieNode::Branch { children },
                },
            );
            Ok(())
        }
        _ => Err(TrieErrorKind::InternalDbInconsistency),
    }
}

/// Break the node the walk stopped at in two: a branch at the
/// divergence point with the old node's remainder on one side and the
/// new leaf on the other, behind a shared-prefix extension when the
/// divergence sits deeper than the node's first nibble.
fn split(
    db: &mut RepairDb,
    walk: &RepairWalk,
    tail: &NibbleSeq,
    payload: Vec<u8>,
) -> Result<(), TrieErrorKind> {
    let handles = mutablize(db, walk)?;
    let target = *handles.last().unwrap();
    let entry = db
        .lookup(&target)
        .cloned()
        .ok_or(TrieErrorKind::InternalDbInconsistency)?;

    let mut children: [Option<NodeHandle>; 16] = Default::default();
    let d = match &entry.node {
        TrieNode::Leaf {
            prefix,
            payload: old_payload,
        } => {
            let d = prefix.common_prefix_len(tail);
            let moved = db.alloc();
            db.insert(
                moved,
                RepairNode {
                    state: NodeState::Mutable,
                    node: TrieNode::Leaf {
                        prefix: prefix.skip(d + 1),
                        payload: old_payload.clone(),
                    },
                },
            )?;
            children[prefix.at(d) as usize] = Some(moved);
            d
        }
        TrieNode::Extension { prefix, child } => {
            let d = prefix.common_prefix_len(tail);
            if prefix.len() == d + 1 {
                // the extension collapses into the branch edge
                children[prefix.at(d) as usize] = Some(*child);
            } else {
                let moved = db.alloc();
                db.insert(
                    moved,
                    RepairNode {
                        state: NodeState::Mutable,
                        node: TrieNode::Extension {
                            prefix: prefix.skip(d + 1),
                            child: *child,
                        },
                    },
                )?;
                children[prefix.at(d) as usize] = Some(moved);
            }
            d
        }
        TrieNode::Branch { .. } => return Err(TrieErrorKind::InternalDbInconsistency),
    };

    let fresh = db.alloc();
    db.insert(
        fresh,
        RepairNode {
            state: NodeState::Mutable,
            node: TrieNode::Leaf {
                prefix: tail.skip(d + 1),
                payload,
            },
        },
    )?;
    children[tail.at(d) as usize] = Some(fresh);

    let branch = TrieNode::Branch { children };
    let top = if d > 0 {
        let below = db.alloc();
        db.insert(
            below,
            RepairNode {
                state: NodeState::Mutable,
                node: branch,
            },
        )?;
        TrieNode::Extension {
            prefix: tail.take(d),
            child: below,
        }
    } else {
        branch
    };
    db.update(
        target,
        RepairNode {
            state: entry.state,
            node: top,
        },
    );
    Ok(())
}

/// Turn every node along the walk writable. Static and Locked nodes
/// are copied under fresh provisional handles with the parent link
/// rewired; only the parentless root slot is rewritten in place, as
/// the mutable root placeholder, and has to hash back to its own key
/// when the batch is finalized.
fn mutablize(db: &mut RepairDb, walk: &RepairWalk) -> Result<Vec<NodeHandle>, TrieErrorKind> {
    let mut out: Vec<NodeHandle> = Vec::with_capacity(walk.steps.len());

    for (i, step) in walk.steps.iter().enumerate() {
        let entry = db
            .lookup(&step.handle)
            .cloned()
            .ok_or(TrieErrorKind::InternalDbInconsistency)?;

        let handle = if entry.writable() {
            step.handle
        } else if i == 0 {
            db.update(
                step.handle,
                RepairNode {
                    state: NodeState::TmpRoot,
                    node: entry.node,
                },
            );
            step.handle
        } else {
            let fresh = db.alloc();
            db.insert(
                fresh,
                RepairNode {
                    state: NodeState::Mutable,
                    node: entry.node,
                },
            )?;
            let parent = out[i - 1];
            let pentry = db
                .lookup(&parent)
                .cloned()
                .ok_or(TrieErrorKind::InternalDbInconsistency)?;
            let pnode = match pentry.node {
                TrieNode::Branch { mut children } => {
                    let edge = walk.steps[i - 1].nibble;
                    if edge < 0 {
                        return Err(TrieErrorKind::InternalDbInconsistency);
                    }
                    children[edge as usize] = Some(fresh);
                    TrieNode::Branch { children }
                }
                TrieNode::Extension { prefix, .. } => TrieNode::Extension {
                    prefix,
                    child: fresh,
                },
                TrieNode::Leaf { .. } => return Err(TrieErrorKind::InternalDbInconsistency),
            };
            db.update(
                parent,
                RepairNode {
                    state: pentry.state,
                    node: pnode,
                },
            );
            fresh
        };
        out.push(handle);
    }
    Ok(out)
}

/// Re-key every provisional node bottom-up along the modified edges:
/// children first, so each encode sees settled links. With `verify`
/// the root has to hash back to its declared key or the whole batch is
/// a lie; without it (bootstrap rolling forward) a drifted root slot
/// is re-keyed instead.
fn finalize(
    db: &mut RepairDb,
    root_handle: NodeHandle,
    verify: bool,
) -> Result<Hash, TrieErrorKind> {
    let mut resolved: HashMap<u64, Hash> = HashMap::new();
    let mut moved_root: Option<Hash> = None;
    let mut stack: Vec<(NodeHandle, bool)> = vec![(root_handle, false)];

    while let Some((handle, processed)) = stack.pop() {
        if !processed {
            if let NodeHandle::Temp(n) = handle {
                if resolved.contains_key(&n) {
                    continue;
                }
            }
            let entry = db
                .lookup(&handle)
                .ok_or(TrieErrorKind::InternalDbInconsistency)?;
            if handle.is_hash() && !entry.writable() {
                // untouched content-addressed node, nothing to do
                continue;
            }
            stack.push((handle, true));
            for (_, child) in entry.node.links() {
                if !child.is_hash() {
                    stack.push((child, false));
                }
            }
        } else {
            let entry = db
                .lookup(&handle)
                .cloned()
                .ok_or(TrieErrorKind::InternalDbInconsistency)?;
            let node = rewire(entry.node, &resolved)?;
            let blob = node.encode()?;
            let key = Hash::make_hash(&blob);

            match handle {
                NodeHandle::Temp(n) => {
                    db.remove(&handle);
                    db.insert(
                        NodeHandle::Hash(key),
                        RepairNode {
                            state: NodeState::Locked,
                            node,
                        },
                    )?;
                    resolved.insert(n, key);
                }
                NodeHandle::Hash(k) => {
                    if key != k {
                        if verify {
                            debug!("root slot hashes to {} instead of {}", key, k);
                            return Err(TrieErrorKind::RootNodeMismatch);
                        }
                        // rolling a bootstrapped trie forward: the root
                        // slot drifted, move it to its new key
                        db.remove(&handle);
                    }
                    db.update(
                        NodeHandle::Hash(key),
                        RepairNode {
                            state: NodeState::Locked,
                            node,
                        },
                    );
                    moved_root = Some(key);
                }
            }
        }
    }

    match root_handle {
        NodeHandle::Temp(n) => resolved
            .get(&n)
            .copied()
            .ok_or(TrieErrorKind::InternalDbInconsistency),
        NodeHandle::Hash(k) => Ok(moved_root.unwrap_or(k)),
    }
}

fn rewire(node: TrieNode, resolved: &HashMap<u64, Hash>) -> Result<TrieNode, TrieErrorKind> {
    let fix = |h: NodeHandle| -> Result<NodeHandle, TrieErrorKind> {
        match h {
            NodeHandle::Temp(n) => resolved
                .get(&n)
                .map(|k| NodeHandle::Hash(*k))
                .ok_or(TrieErrorKind::InternalDbInconsistency),
            hash => Ok(hash),
        }
    };
    match node {
        leaf @ TrieNode::Leaf { .. } => Ok(leaf),
        TrieNode::Extension { prefix, child } => Ok(TrieNode::Extension {
            prefix,
            child: fix(child)?,
        }),
        TrieNode::Branch { mut children } => {
            for slot in children.iter_mut() {
                if let Some(h) = *slot {
                    *slot = Some(fix(h)?);
                }
            }
            Ok(TrieNode::Branch { children })
        }
    }
}
