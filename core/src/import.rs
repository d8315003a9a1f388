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

use errors::TrieErrorKind;

use crate::database::RepairDb;
use crate::node::{NodeHandle, NodeKind, NodeState, RepairNode, TrieNode};
use crate::types::Hash;

/// Per-node outcome of a proof import. `slot` is the position in the
/// submitted batch, `kind` the node kind when the decoder got far
/// enough to tell.
#[derive(Clone, Debug)]
pub struct NodeReport {
    pub slot: Option<usize>,
    pub kind: Option<NodeKind>,
    pub error: TrieErrorKind,
}

impl NodeReport {
    fn new(kind: Option<NodeKind>, error: TrieErrorKind) -> Self {
        NodeReport {
            slot: None,
            kind,
            error,
        }
    }
}

/// Decode one proof-node blob and install it as a `Static` node keyed
/// by the hash of its bytes. `refs` collects every handle some
/// imported node links to; `unrefs` keeps the imported handles nothing
/// links to yet — between them the caller can tell the proof envelope
/// tops from the interior.
pub fn import_node(
    db: &mut RepairDb,
    unrefs: &mut HashSet<NodeHandle>,
    refs: &mut HashSet<NodeHandle>,
    blob: &[u8],
) -> Result<NodeHandle, NodeReport> {
    let key = Hash::make_hash(blob);
    let handle = NodeHandle::Hash(key);

    let node = TrieNode::decode_checked(blob).map_err(|(kind, error)| NodeReport::new(kind, error))?;
    let kind = node.kind();

    db.insert(
        handle,
        RepairNode {
            state: NodeState::Static,
            node: node.clone(),
        },
    )
    .map_err(|error| NodeReport::new(Some(kind), error))?;

    for (_, child) in node.links() {
        refs.insert(child);
        unrefs.remove(&child);
    }
    if !refs.contains(&handle) {
        unrefs.insert(handle);
    }

    trace!("imported {:?} node {}", kind, key);
    Ok(handle)
}

/// Import a blob whose node key the peer declared up front.
pub fn import_keyed(
    db: &mut RepairDb,
    unrefs: &mut HashSet<NodeHandle>,
    refs: &mut HashSet<NodeHandle>,
    key: &Hash,
    blob: &[u8],
) -> Result<NodeHandle, NodeReport> {
    if Hash::make_hash(blob) != *key {
        return Err(NodeReport::new(None, TrieErrorKind::ExpectedNodeKeyDiffers));
    }
    import_node(db, unrefs, refs, blob)
}

/// Import a whole proof batch, collecting one report per failed slot.
/// Good nodes land even when neighbours are bad; the caller decides
/// whether partial progress is acceptable.
pub fn import_proof(
    db: &mut RepairDb,
    unrefs: &mut HashSet<NodeHandle>,
    refs: &mut HashSet<NodeHandle>,
    blobs: &[Vec<u8>],
) -> Vec<NodeReport> {
    let mut reports = vec![];
    for (i, blob) in blobs.iter().enumerate() {
        if let Err(mut report) = import_node(db, unrefs, refs, blob) {
            report.slot = Some(i);
            debug!("proof slot {} rejected: {}", i, report.error);
            reports.push(report);
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{import_keyed, import_node, import_proof};
    use crate::database::RepairDb;
    use crate::nibble::NibbleSeq;
    use crate::node::{NodeHandle, NodeKind, TrieNode};
    use crate::types::Hash;
    use errors::TrieErrorKind;

    fn leaf_blob(prefix: &[u8], payload: &[u8]) -> Vec<u8> {
        TrieNode::Leaf {
            prefix: NibbleSeq::from_nibbles(prefix),
            payload: payload.to_vec(),
        }
        .encode()
        .unwrap()
    }

    fn branch_blob(slots: &[(usize, Hash)]) -> Vec<u8> {
        let mut children: [Option<NodeHandle>; 16] = Default::default();
        for (i, h) in slots {
            children[*i] = Some(NodeHandle::Hash(*h));
        }
        TrieNode::Branch { children }.encode().unwrap()
    }

    #[test]
    fn test_import_tracks_references() {
        let mut db = RepairDb::new();
        let mut unrefs = HashSet::new();
        let mut refs = HashSet::new();

        let leaf = leaf_blob(&[0u8; 63], b"x");
        let leaf_key = Hash::make_hash(&leaf);
        let root = branch_blob(&[(3, leaf_key)]);
        let root_key = Hash::make_hash(&root);

        let h = import_node(&mut db, &mut unrefs, &mut refs, &leaf).unwrap();
        assert_eq!(h.as_hash().unwrap(), leaf_key);
        assert!(unrefs.contains(&h));

        import_node(&mut db, &mut unrefs, &mut refs, &root).unwrap();
        // the branch now references the leaf, the branch itself is the top
        assert!(!unrefs.contains(&h));
        assert!(refs.contains(&h));
        assert!(unrefs.contains(&NodeHandle::Hash(root_key)));
        assert_eq!(db.len(), 2);

        // hash consistency: the handle is the keccak of the bytes
        let stored = db.lookup(&h).unwrap();
        assert_eq!(Hash::make_hash(&stored.node.encode().unwrap()), leaf_key);

        // importing identical bytes twice is a no-op
        import_node(&mut db, &mut unrefs, &mut refs, &leaf).unwrap();
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_import_keyed() {
        let mut db = RepairDb::new();
        let mut unrefs = HashSet::new();
        let mut refs = HashSet::new();

        let leaf = leaf_blob(&[1u8; 63], b"y");
        let key = Hash::make_hash(&leaf);
        import_keyed(&mut db, &mut unrefs, &mut refs, &key, &leaf).unwrap();

        let wrong = Hash::from_u64(1);
        let report = import_keyed(&mut db, &mut unrefs, &mut refs, &wrong, &leaf).unwrap_err();
        assert_eq!(report.error, TrieErrorKind::ExpectedNodeKeyDiffers);
    }

    #[test]
    fn test_import_proof_partial() {
        let mut db = RepairDb::new();
        let mut unrefs = HashSet::new();
        let mut refs = HashSet::new();

        let good = leaf_blob(&[2u8; 63], b"ok");
        let bad = vec![0xc1, 0x80]; // one-item list
        let reports = import_proof(&mut db, &mut unrefs, &mut refs, &[good, bad]);

        assert_eq!(db.len(), 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].slot, Some(1));
        assert_eq!(reports[0].error, TrieErrorKind::Rlp2Or17ListEntries);
        assert_eq!(reports[0].kind, None);
    }

    #[test]
    fn test_import_kind_reporting() {
        let mut db = RepairDb::new();
        let mut unrefs = HashSet::new();
        let mut refs = HashSet::new();

        // branch with a bad link reports the branch kind
        let mut stream = rlp::RlpStream::new_list(17);
        stream.append(&vec![7u8; 31]);
        for _ in 1..17 {
            stream.append_empty_data();
        }
        let report = import_node(&mut db, &mut unrefs, &mut refs, &stream.drain()).unwrap_err();
        assert_eq!(report.kind, Some(NodeKind::Branch));
        assert_eq!(report.error, TrieErrorKind::RlpBranchLinkExpected);
    }
}
