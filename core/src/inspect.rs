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

use std::collections::HashSet;

use crate::database::RepairDb;
use crate::nibble::NibbleSeq;
use crate::node::NodeHandle;
use crate::walk::walk_repair;

/// Default level cutoff of an inspection sweep.
pub const STOP_AT_LEVEL: usize = 32;

/// A child link whose target is not in the database (or is still a
/// provisional node). The trail is the partial path from the sweep's
/// root down to the link.
#[derive(Clone, Debug)]
pub struct DanglingLink {
    pub trail: NibbleSeq,
    pub handle: NodeHandle,
}

impl DanglingLink {
    /// Wire form of the trail, hex-prefix encoded as an interior path.
    pub fn hex_prefix(&self) -> Vec<u8> {
        self.trail.hex_prefix(false)
    }
}

#[derive(Debug, Default)]
pub struct InspectReport {
    pub dangling: Vec<DanglingLink>,
    pub level: usize,
    pub stopped: bool,
}

/// Level-synchronous sweep from `root` (or from the nodes reached by
/// `start_paths`) enumerating every referenced-but-absent child. When
/// the sweep is still unfinished at `stop_at_level` it gives up and
/// reports `stopped`; a trie is complete exactly when an unbounded
/// sweep reports no dangling links.
pub fn inspect(
    db: &RepairDb,
    root: &NodeHandle,
    start_paths: &[NibbleSeq],
    stop_at_level: usize,
) -> InspectReport {
    let mut report = InspectReport::default();
    let mut seen: HashSet<NodeHandle> = HashSet::new();
    let mut level: Vec<(NibbleSeq, NodeHandle)> = vec![];

    if start_paths.is_empty() {
        if db.contains(root) {
            level.push((NibbleSeq::new(), *root));
        } else {
            report.dangling.push(DanglingLink {
                trail: NibbleSeq::new(),
                handle: *root,
            });
            return report;
        }
    } else {
        for path in start_paths {
            let walk = walk_repair(db, root, path);
            if !walk.tail.is_empty() {
                continue;
            }
            if let Some(step) = walk.last() {
                level.push((path.clone(), step.handle));
            }
        }
    }

    while !level.is_empty() {
        if report.level >= stop_at_level {
            report.stopped = true;
            break;
        }
        let mut next: Vec<(NibbleSeq, NodeHandle)> = vec![];
        for (trail, handle) in level {
            if !seen.insert(handle) {
                continue;
            }
            let entry = match db.lookup(&handle) {
                Some(e) => e,
                None => continue,
            };
            for (frag, child) in entry.node.links() {
                let sub = trail.join(&frag);
                if !child.is_hash() || !db.contains(&child) {
                    report.dangling.push(DanglingLink {
                        trail: sub,
                        handle: child,
                    });
                } else {
                    next.push((sub, child));
                }
            }
        }
        level = next;
        report.level += 1;
    }

    debug!(
        "inspect: {} dangling, {} levels{}",
        report.dangling.len(),
        report.level,
        if report.stopped { " (cut off)" } else { "" }
    );
    report
}

#[cfg(test)]
mod tests {
    use super::{inspect, STOP_AT_LEVEL};
    use crate::database::RepairDb;
    use crate::nibble::NibbleSeq;
    use crate::node::{NodeHandle, NodeState, RepairNode, TrieNode};
    use crate::types::Hash;

    fn stat(node: TrieNode) -> RepairNode {
        RepairNode {
            state: NodeState::Static,
            node,
        }
    }

    fn chain_db(depth: usize) -> (RepairDb, NodeHandle) {
        // branch chain along nibble 0, ending in a dangling link
        let mut db = RepairDb::new();
        let mut child = NodeHandle::Hash(Hash::from_u64(0xdead));
        for _ in 0..depth {
            let mut children: [Option<NodeHandle>; 16] = Default::default();
            children[0] = Some(child);
            let h = db.alloc();
            db.insert(h, stat(TrieNode::Branch { children })).unwrap();
            child = h;
        }
        (db, child)
    }

    #[test]
    fn test_dangling_enumeration() {
        let (mut db, root) = chain_db(3);
        let report = inspect(&db, &root, &[], STOP_AT_LEVEL);
        assert_eq!(report.dangling.len(), 1);
        assert_eq!(report.dangling[0].trail.len(), 3);
        assert!(!report.stopped);
        // wire form of a 3-nibble interior trail: odd parity, no leaf bit
        assert_eq!(report.dangling[0].hex_prefix(), vec![0x10, 0x00]);

        // completing the trie empties the report
        let missing = report.dangling[0].handle;
        db.insert(
            missing,
            stat(TrieNode::Leaf {
                prefix: NibbleSeq::from_nibbles(&[1]),
                payload: b"done".to_vec(),
            }),
        )
        .unwrap();
        let report = inspect(&db, &root, &[], STOP_AT_LEVEL);
        assert!(report.dangling.is_empty());
    }

    #[test]
    fn test_level_cutoff() {
        let (db, root) = chain_db(40);
        let report = inspect(&db, &root, &[], STOP_AT_LEVEL);
        assert!(report.stopped);
        assert!(report.dangling.is_empty());
        assert_eq!(report.level, STOP_AT_LEVEL);

        let report = inspect(&db, &root, &[], 64);
        assert!(!report.stopped);
        assert_eq!(report.dangling.len(), 1);
    }

    #[test]
    fn test_absent_root() {
        let db = RepairDb::new();
        let root = NodeHandle::Hash(Hash::from_u64(5));
        let report = inspect(&db, &root, &[], STOP_AT_LEVEL);
        assert_eq!(report.dangling.len(), 1);
        assert!(report.dangling[0].trail.is_empty());
    }

    #[test]
    fn test_start_paths() {
        let (db, root) = chain_db(3);
        let start = NibbleSeq::from_nibbles(&[0]);
        let report = inspect(&db, &root, &[start], STOP_AT_LEVEL);
        assert_eq!(report.dangling.len(), 1);
        // trail is relative to the sweep root, so it includes the seed
        assert_eq!(report.dangling[0].trail.len(), 3);
    }
}
