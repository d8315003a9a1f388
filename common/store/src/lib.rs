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

extern crate rocksdb;
pub mod bulk;
pub mod db;
pub type Error = rocksdb::Error;
pub type WriteBatch = rocksdb::WriteBatch;

use std::collections::HashMap;
use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::db::SnapDB;

/// One-byte key spaces sharing the physical store. On-disk keys are the
/// prefix byte followed by the bare 32-byte key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Column {
    Accounts,
    StorageSlots,
    ContractCode,
    StateRoot,
    BlockHeader,
    BlockNumber,
}

impl Column {
    pub fn prefix(self) -> u8 {
        match self {
            Column::Accounts => 'a' as u8,
            Column::StorageSlots => 's' as u8,
            Column::ContractCode => 'c' as u8,
            Column::StateRoot => 'r' as u8,
            Column::BlockHeader => 'h' as u8,
            Column::BlockNumber => 'n' as u8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Column::Accounts => "accounts",
            Column::StorageSlots => "storage_slots",
            Column::ContractCode => "contract_code",
            Column::StateRoot => "state_root",
            Column::BlockHeader => "block_header",
            Column::BlockNumber => "block_number",
        }
    }

    /// Prefixed on-disk key.
    pub fn key(self, k: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + k.len());
        out.push(self.prefix());
        out.extend_from_slice(k);
        out
    }
}

pub trait KVDB: Sync + Send {
    fn get(&self, key: &[u8]) -> io::Result<Option<Vec<u8>>>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> io::Result<()>;

    fn remove(&mut self, key: &[u8]) -> io::Result<()>;

    /// Backends sitting on rocksdb expose themselves for batched and
    /// bulk writes; everything else stays with single puts.
    fn rocks(&self) -> Option<&SnapDB> {
        None
    }
}

#[derive(Default)]
pub struct MemoryKV {
    db: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKV {
    pub fn new() -> Self {
        MemoryKV {
            db: RwLock::new(HashMap::new()),
        }
    }
}

impl KVDB for MemoryKV {
    fn put(&mut self, key: &[u8], value: &[u8]) -> io::Result<()> {
        let mut db = self.db.write().unwrap();
        db.insert(key.into(), value.into());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        let db = self.db.read().unwrap();
        let ret = match db.get(key) {
            Some(v) => Some(v.clone()),
            None => None,
        };
        Ok(ret)
    }

    fn remove(&mut self, key: &[u8]) -> io::Result<()> {
        let mut db = self.db.write().unwrap();
        db.remove(key);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let mut cur = env::current_dir().unwrap();
        cur.push("stitchdata");
        Config { path: cur }
    }
}

impl Config {
    pub fn new(mut dir: PathBuf) -> Self {
        dir.push("stitchdata");
        Config { path: dir }
    }
}
