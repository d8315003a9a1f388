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

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rocksdb::{WriteBatch, DB};

use super::Error;
use crate::{Config, KVDB};

/// Rocksdb handle shared between sync workers.
pub struct SnapDB {
    inner: Arc<RwLock<DB>>,
    dir: PathBuf,
}

impl SnapDB {
    pub fn open(cfg: Config) -> Result<Self, Error> {
        let db = DB::open_default(&cfg.path)?;
        Ok(SnapDB {
            inner: Arc::new(RwLock::new(db)),
            dir: cfg.path,
        })
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        let db = self.inner.write().unwrap();
        db.put(key, value)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let db = self.inner.read().unwrap();
        db.get(key)
    }

    pub fn remove(&self, key: &[u8]) -> Result<(), Error> {
        let db = self.inner.write().unwrap();
        db.delete(key)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, Error> {
        let db = self.inner.read().unwrap();
        db.get(key).and_then(|val| Ok(val.is_some()))
    }

    /// Apply a batch atomically.
    pub fn write_batch(&self, wb: WriteBatch) -> Result<(), Error> {
        let db = self.inner.write().unwrap();
        db.write(wb)
    }

    /// Ingest a pre-sorted SST file, bypassing the write ahead log.
    pub fn ingest(&self, sst: &Path) -> Result<(), Error> {
        let db = self.inner.write().unwrap();
        db.ingest_external_file(vec![sst])
    }

    /// Directory backing this store; staging files live next to the
    /// column families they feed.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn to_io(e: Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

impl KVDB for SnapDB {
    fn get(&self, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        SnapDB::get(self, key).map_err(to_io)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> io::Result<()> {
        SnapDB::put(self, key, value).map_err(to_io)
    }

    fn remove(&mut self, key: &[u8]) -> io::Result<()> {
        SnapDB::remove(self, key).map_err(to_io)
    }

    fn rocks(&self) -> Option<&SnapDB> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::SnapDB;
    use crate::Config;
    use std::env;
    use std::fs;

    #[test]
    fn test_snapdb() {
        let dir = env::temp_dir().join(format!("stitch-db-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        {
            let db = SnapDB::open(Config::new(dir.clone())).unwrap();
            db.put(b"key1", b"a").unwrap();
            assert_eq!(db.get(b"key1").unwrap().unwrap(), b"a");
            assert!(db.exists(b"key1").unwrap());

            db.remove(b"key1").unwrap();
            assert_eq!(db.get(b"key1").unwrap(), None);

            db.put(b"key2", b"b").unwrap();
        }

        // values survive reopening
        {
            let db = SnapDB::open(Config::new(dir.clone())).unwrap();
            assert_eq!(db.get(b"key2").unwrap().unwrap(), b"b");
        }

        let _ = fs::remove_dir_all(&dir);
    }
}
