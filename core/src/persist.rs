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

//! Landing finished repair batches in the store: batched transactional
//! puts, or the sorted-SST bulk lane that skips the write ahead log.
//! Also home of the little state-root registry and the getter adapter
//! for walking persisted tries.

use errors::{TrieError, TrieErrorKind};
use rlp::{Rlp, RlpStream};
use stitch_store::bulk::BulkError;
use stitch_store::{Column, KVDB, WriteBatch};

use crate::database::RepairDb;
use crate::types::Hash;
use crate::walk::NodeGetter;

fn encoded(db: &RepairDb) -> Result<Vec<(Hash, Vec<u8>)>, TrieErrorKind> {
    let mut out = Vec::with_capacity(db.len());
    for (handle, entry) in db.iter() {
        let key = handle
            .as_hash()
            .ok_or(TrieErrorKind::UnresolvedRepairNode)?;
        out.push((key, entry.node.encode()?));
    }
    Ok(out)
}

fn os_error<E: std::fmt::Display>(e: E) -> TrieError {
    TrieErrorKind::OSErrorException.reason(e.to_string())
}

fn bulk_error(e: BulkError) -> TrieError {
    let kind = match &e {
        BulkError::Open(_) => TrieErrorKind::CannotOpenRocksDbBulkSession,
        BulkError::Add(_) => TrieErrorKind::AddBulkItemFailed,
        BulkError::Commit(_) => TrieErrorKind::CommitBulkItemsFailed,
        BulkError::Io(_) => TrieErrorKind::OSErrorException,
    };
    kind.reason(e.to_string())
}

/// Write every node of a finished batch under `column`. On a rocksdb
/// backend the writes ride one atomic batch; elsewhere they degrade to
/// plain puts. Any provisional handle left in the database aborts the
/// whole operation before a single byte lands.
pub fn persist_nodes(
    db: &RepairDb,
    column: Column,
    kv: &mut dyn KVDB,
) -> Result<usize, TrieError> {
    let nodes = encoded(db)?;

    if let Some(rocks) = kv.rocks() {
        let mut batch = WriteBatch::default();
        for (key, blob) in &nodes {
            batch.put(column.key(key.as_bytes()), blob);
        }
        rocks.write_batch(batch).map_err(os_error)?;
        debug!("committed {} nodes to {}", nodes.len(), column.name());
        return Ok(nodes.len());
    }

    for (key, blob) in &nodes {
        kv.put(&column.key(key.as_bytes()), blob).map_err(os_error)?;
    }
    Ok(nodes.len())
}

/// Bulk lane: sort the node keys (the store's byte order is the
/// big-endian integer order of the bare hashes, shared column prefix
/// aside), stage them into an SST and ingest the file atomically.
pub fn persist_bulk(db: &RepairDb, column: Column, kv: &dyn KVDB) -> Result<usize, TrieError> {
    let mut nodes = encoded(db)?;
    let rocks = kv.rocks().ok_or(TrieErrorKind::NoRocksDbBackend)?;

    nodes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut session = rocks.begin_bulk(column.name()).map_err(bulk_error)?;
    let mut items = nodes
        .into_iter()
        .map(|(key, blob)| (column.key(key.as_bytes()), blob));
    let staged = session.load(&mut items).map_err(bulk_error)?;
    let n = session.commit().map_err(bulk_error)?;
    debug!("bulk ingested {} nodes into {}", n, column.name());
    debug_assert_eq!(staged, n);
    Ok(n)
}

// -- state root registry -------------------------------------------------

fn registry_key(root: &Hash) -> Vec<u8> {
    Column::StateRoot.key(root.as_bytes())
}

fn encode_entry(back: &Hash, data: &[u8]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(2);
    stream.append(back);
    stream.append(&data.to_vec());
    stream.drain()
}

fn decode_entry(blob: &[u8]) -> Result<(Hash, Vec<u8>), TrieErrorKind> {
    let r = Rlp::new(blob);
    if r.item_count().map_err(|_| TrieErrorKind::RlpEncoding)? != 2 {
        return Err(TrieErrorKind::RlpEncoding);
    }
    let back = r
        .at(0)
        .and_then(|i| i.data().map(Hash::from_bytes))
        .map_err(|_| TrieErrorKind::RlpEncoding)?;
    let data = r
        .at(1)
        .and_then(|i| i.data().map(|d| d.to_vec()))
        .map_err(|_| TrieErrorKind::RlpEncoding)?;
    Ok((back, data))
}

/// Record `root` in the registry. A known root only has its payload
/// rewritten; a new root is chained in front of the previous top and
/// becomes the top itself. No transaction: a crash can at worst leave
/// a detached top entry.
pub fn register_root(kv: &mut dyn KVDB, root: &Hash, data: &[u8]) -> Result<(), TrieError> {
    let key = registry_key(root);
    if let Some(old) = kv.get(&key).map_err(os_error)? {
        let (back, _) = decode_entry(&old)?;
        kv.put(&key, &encode_entry(&back, data)).map_err(os_error)?;
        return Ok(());
    }

    let zero = registry_key(&Hash::default());
    let top = match kv.get(&zero).map_err(os_error)? {
        Some(entry) => decode_entry(&entry)?.0,
        None => Hash::default(),
    };
    kv.put(&key, &encode_entry(&top, data)).map_err(os_error)?;
    kv.put(&zero, &encode_entry(root, &[])).map_err(os_error)?;
    info!("state root {} registered", root);
    Ok(())
}

/// The most recently registered state root.
pub fn top_root(kv: &dyn KVDB) -> Result<Hash, TrieError> {
    let zero = registry_key(&Hash::default());
    match kv.get(&zero).map_err(os_error)? {
        Some(entry) => {
            let (top, _) = decode_entry(&entry)?;
            if top.is_zero() {
                Err(TrieErrorKind::StateRootNotFound.into())
            } else {
                Ok(top)
            }
        }
        None => Err(TrieErrorKind::StateRootNotFound.into()),
    }
}

/// Back link and payload stored for `root`.
pub fn root_entry(kv: &dyn KVDB, root: &Hash) -> Result<(Hash, Vec<u8>), TrieError> {
    match kv.get(&registry_key(root)).map_err(os_error)? {
        Some(entry) => Ok(decode_entry(&entry)?),
        None => Err(TrieErrorKind::StateRootNotFound.into()),
    }
}

/// Read trie nodes of one column straight from the store.
pub struct StoreGetter<'a> {
    pub kv: &'a dyn KVDB,
    pub column: Column,
}

impl<'a> NodeGetter for StoreGetter<'a> {
    fn node_blob(&self, key: &Hash) -> Option<Vec<u8>> {
        match self.kv.get(&self.column.key(key.as_bytes())) {
            Ok(Some(blob)) => {
                if blob.is_empty() {
                    None
                } else {
                    Some(blob)
                }
            }
            _ => None,
        }
    }
}
