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

//! The operation layer a sync scheduler drives: validate one account
//! or storage range response, fold its proofs and leaves into a repair
//! batch, and keep ranges from different responses apart.

use std::collections::HashSet;

use errors::{TrieError, TrieErrorKind};

use crate::database::RepairDb;
use crate::import::import_proof;
use crate::inspect::DanglingLink;
use crate::interpolate::{interpolate, LeafSpec};
use crate::nibble::NibbleSeq;
use crate::types::Hash;
use crate::walk::{walk_getter, NodeGetter};

/// What one ingested range left behind: the verified root, the
/// dangling frontier outside the covered interval, and the number of
/// data leaves installed.
#[derive(Debug)]
pub struct RangeImport {
    pub root: Hash,
    pub dangling: Vec<DanglingLink>,
    pub inserted: usize,
}

fn ingest(
    db: &mut RepairDb,
    root: &Hash,
    base: &Hash,
    entries: &[LeafSpec],
    proof: &[Vec<u8>],
    storage: bool,
) -> Result<RangeImport, TrieError> {
    for pair in entries.windows(2) {
        if pair[1].path <= pair[0].path {
            return Err(if storage {
                TrieErrorKind::SlotsNotSrictlyIncreasing.into()
            } else {
                TrieErrorKind::AccountsNotSrictlyIncreasing.into()
            });
        }
    }
    if let Some(first) = entries.first() {
        if first.path < *base {
            return Err(TrieErrorKind::AccountSmallerThanBase.into());
        }
    }

    let mut unrefs = HashSet::new();
    let mut refs = HashSet::new();
    let reports = import_proof(db, &mut unrefs, &mut refs, proof);
    if let Some(report) = reports.into_iter().next() {
        return Err(report
            .error
            .reason(format!("proof slot {:?} rejected", report.slot)));
    }

    let mut batch: Vec<LeafSpec> = vec![];
    if !base.is_zero() && entries.first().map_or(true, |f| *base < f.path) {
        batch.push(LeafSpec {
            path: *base,
            payload: vec![],
        });
    }
    batch.extend_from_slice(entries);

    let out = interpolate(db, root, &batch, false).map_err(|e| {
        if storage && e == TrieErrorKind::AccountsNotSrictlyIncreasing {
            TrieErrorKind::SlotsNotSrictlyIncreasing
        } else {
            e
        }
    })?;

    info!(
        "range of {} {} under {} ingested, {} frontier links",
        entries.len(),
        if storage { "slots" } else { "accounts" },
        root,
        out.dangling.len()
    );
    Ok(RangeImport {
        root: out.root,
        dangling: out.dangling,
        inserted: entries.len(),
    })
}

/// Fold one account-range response into the repair batch: leaves from
/// `base` on, sorted strictly ascending, flanked by `proof`.
pub fn import_account_range(
    db: &mut RepairDb,
    root: &Hash,
    base: &Hash,
    entries: &[LeafSpec],
    proof: &[Vec<u8>],
) -> Result<RangeImport, TrieError> {
    ingest(db, root, base, entries, proof, false)
}

/// Same pipeline for one contract's storage-slot trie.
pub fn import_storage_slots(
    db: &mut RepairDb,
    storage_root: &Hash,
    base: &Hash,
    entries: &[LeafSpec],
    proof: &[Vec<u8>],
) -> Result<RangeImport, TrieError> {
    ingest(db, storage_root, base, entries, proof, true)
}

/// Coverage ledger across range batches of one trie. Ranges must be
/// requested back to back; a base at or below the covered high mark
/// would hand out overlapping work.
#[derive(Default, Debug)]
pub struct RangeLedger {
    covered: Option<Hash>,
}

impl RangeLedger {
    pub fn new() -> Self {
        RangeLedger { covered: None }
    }

    pub fn begin(&self, base: &Hash) -> Result<(), TrieError> {
        if let Some(hi) = &self.covered {
            if *base <= *hi {
                return Err(TrieErrorKind::AccountRangesOverlap.into());
            }
        }
        Ok(())
    }

    pub fn note(&mut self, last: &Hash) {
        match &self.covered {
            Some(hi) if *hi >= *last => {}
            _ => self.covered = Some(*last),
        }
    }

    pub fn covered_to(&self) -> Option<&Hash> {
        self.covered.as_ref()
    }
}

/// Resolve one leaf of a persisted trie.
pub fn leaf_payload(
    getter: &dyn NodeGetter,
    root: &Hash,
    path: &Hash,
) -> Result<Vec<u8>, TrieError> {
    let walk = walk_getter(getter, root, &NibbleSeq::from_path(path))?;
    match walk.leaf_payload() {
        Some(payload) => Ok(payload.to_vec()),
        None => Err(TrieErrorKind::AccountNotFound.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{import_account_range, import_storage_slots, leaf_payload, RangeLedger};
    use crate::database::RepairDb;
    use crate::interpolate::{interpolate, LeafSpec};
    use crate::nibble::NibbleSeq;
    use crate::types::Hash;
    use errors::TrieErrorKind;

    fn path(first: &[u8]) -> Hash {
        let mut nibbles = first.to_vec();
        nibbles.resize(64, 0);
        NibbleSeq::from_nibbles(&nibbles).to_path().unwrap()
    }

    fn leaf(first: &[u8], payload: &[u8]) -> LeafSpec {
        LeafSpec {
            path: path(first),
            payload: payload.to_vec(),
        }
    }

    fn source(leaves: &[LeafSpec]) -> (Hash, HashMap<Hash, Vec<u8>>) {
        let mut db = RepairDb::new();
        let out = interpolate(&mut db, &Hash::default(), leaves, true).unwrap();
        let mut blobs = HashMap::new();
        for (handle, entry) in db.iter() {
            blobs.insert(handle.as_hash().unwrap(), entry.node.encode().unwrap());
        }
        (out.root, blobs)
    }

    #[test]
    fn test_account_range_pipeline() {
        logger::init_test();
        let leaves = vec![
            leaf(&[3], b"three"),
            leaf(&[7], b"seven"),
            leaf(&[0xb], b"bee"),
            leaf(&[0xd], b"dee"),
        ];
        let (root, blobs) = source(&leaves);
        let proof = vec![blobs.get(&root).unwrap().clone()];

        // middle of the range
        let mut db = RepairDb::new();
        let out = import_account_range(
            &mut db,
            &root,
            &leaves[1].path,
            &leaves[1..3],
            &proof,
        )
        .unwrap();
        assert_eq!(out.root, root);
        assert_eq!(out.inserted, 2);
        assert_eq!(out.dangling.len(), 2);

        // the whole trie from the zero base
        let mut db = RepairDb::new();
        let out =
            import_account_range(&mut db, &root, &Hash::default(), &leaves, &proof).unwrap();
        assert!(out.dangling.is_empty());
        assert_eq!(out.inserted, 4);
    }

    #[test]
    fn test_range_rejections() {
        let leaves = vec![leaf(&[3], b"a"), leaf(&[7], b"b")];
        let (root, blobs) = source(&leaves);
        let proof = vec![blobs.get(&root).unwrap().clone()];

        // entries below the base
        let mut db = RepairDb::new();
        let err = import_account_range(&mut db, &root, &path(&[5]), &leaves, &proof).unwrap_err();
        assert_eq!(*err.kind(), TrieErrorKind::AccountSmallerThanBase);

        // unsorted entries
        let mut db = RepairDb::new();
        let shuffled = vec![leaves[1].clone(), leaves[0].clone()];
        let err = import_account_range(&mut db, &root, &Hash::default(), &shuffled, &proof)
            .unwrap_err();
        assert_eq!(*err.kind(), TrieErrorKind::AccountsNotSrictlyIncreasing);

        // the same shape as a storage response reports the slot flavor
        let mut db = RepairDb::new();
        let err = import_storage_slots(&mut db, &root, &Hash::default(), &shuffled, &proof)
            .unwrap_err();
        assert_eq!(*err.kind(), TrieErrorKind::SlotsNotSrictlyIncreasing);

        // a corrupt proof blob aborts before interpolation
        let mut db = RepairDb::new();
        let err = import_account_range(
            &mut db,
            &root,
            &Hash::default(),
            &leaves,
            &[vec![0xc1, 0x80]],
        )
        .unwrap_err();
        assert_eq!(*err.kind(), TrieErrorKind::Rlp2Or17ListEntries);
    }

    #[test]
    fn test_ledger() {
        let mut ledger = RangeLedger::new();
        ledger.begin(&Hash::default()).unwrap();
        ledger.note(&path(&[7]));

        assert_eq!(
            *ledger.begin(&path(&[5])).unwrap_err().kind(),
            TrieErrorKind::AccountRangesOverlap
        );
        assert_eq!(
            *ledger.begin(&path(&[7])).unwrap_err().kind(),
            TrieErrorKind::AccountRangesOverlap
        );
        ledger.begin(&path(&[8])).unwrap();

        // the high mark never moves backwards
        ledger.note(&path(&[2]));
        assert_eq!(ledger.covered_to(), Some(&path(&[7])));
    }

    #[test]
    fn test_leaf_payload() {
        let leaves = vec![leaf(&[3], b"three"), leaf(&[7], b"seven")];
        let (root, blobs) = source(&leaves);

        assert_eq!(
            leaf_payload(&blobs, &root, &leaves[0].path).unwrap(),
            b"three".to_vec()
        );
        let err = leaf_payload(&blobs, &root, &path(&[4])).unwrap_err();
        assert_eq!(*err.kind(), TrieErrorKind::AccountNotFound);
    }
}
