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
use std::fs;
use std::io;
use std::path::PathBuf;

use rocksdb::{Options, SstFileWriter};

use crate::db::SnapDB;

/// Bulk load failure, split by pipeline stage so callers can tell an
/// unopenable staging file from a failed ingest.
#[derive(Debug)]
pub enum BulkError {
    Open(String),
    Add(String),
    Commit(String),
    Io(io::Error),
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BulkError::Open(e) => write!(f, "bulk open: {}", e),
            BulkError::Add(e) => write!(f, "bulk add: {}", e),
            BulkError::Commit(e) => write!(f, "bulk commit: {}", e),
            BulkError::Io(e) => write!(f, "bulk io: {}", e),
        }
    }
}

/// Exclusive staging session: one sorted SST file written aside and
/// ingested atomically. The session owns the staging file name for its
/// whole lifetime.
pub struct BulkSession<'a> {
    db: &'a SnapDB,
    file: PathBuf,
    loaded: usize,
}

impl SnapDB {
    /// Open a staging session. A leftover staging file from a crashed
    /// predecessor is cleared first.
    pub fn begin_bulk(&self, name: &str) -> Result<BulkSession, BulkError> {
        let file = self.dir().join(format!("{}.sst_stage", name));
        if file.exists() {
            fs::remove_file(&file).map_err(BulkError::Io)?;
        }
        Ok(BulkSession {
            db: self,
            file,
            loaded: 0,
        })
    }
}

impl<'a> BulkSession<'a> {
    /// Stream pre-sorted pairs into the staging file. Keys must arrive
    /// in ascending byte order, the store's native ordering.
    pub fn load(&mut self, items: &mut dyn Iterator<Item = (Vec<u8>, Vec<u8>)>) -> Result<usize, BulkError> {
        let opts = Options::default();
        let mut writer = SstFileWriter::create(&opts);
        writer
            .open(&self.file)
            .map_err(|e| BulkError::Open(e.to_string()))?;

        let mut count = 0usize;
        for (key, value) in items {
            writer
                .put(&key, &value)
                .map_err(|e| BulkError::Add(e.to_string()))?;
            count += 1;
        }

        if count == 0 {
            // an sst without entries cannot be finished nor ingested
            drop(writer);
            let _ = fs::remove_file(&self.file);
            self.loaded = 0;
            return Ok(0);
        }

        writer
            .finish()
            .map_err(|e| BulkError::Commit(e.to_string()))?;
        self.loaded = count;
        Ok(count)
    }

    /// Ingest the staged file and clear it.
    pub fn commit(self) -> Result<usize, BulkError> {
        if self.loaded == 0 {
            return Ok(0);
        }
        self.db
            .ingest(&self.file)
            .map_err(|e| BulkError::Commit(e.to_string()))?;
        let _ = fs::remove_file(&self.file);
        Ok(self.loaded)
    }

    /// Abandon the session, dropping anything staged so far.
    pub fn destroy(self) -> Result<(), BulkError> {
        if self.file.exists() {
            fs::remove_file(&self.file).map_err(BulkError::Io)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Config, KVDB};
    use super::SnapDB;
    use std::env;
    use std::fs;

    #[test]
    fn test_bulk_roundtrip() {
        let dir = env::temp_dir().join(format!("stitch-bulk-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let db = SnapDB::open(Config::new(dir.clone())).unwrap();

        let mut items: Vec<(Vec<u8>, Vec<u8>)> = (0u16..300)
            .map(|i| (i.to_be_bytes().to_vec(), format!("v{}", i).into_bytes()))
            .collect();
        items.sort();

        let mut session = db.begin_bulk("accounts").unwrap();
        let n = session.load(&mut items.clone().into_iter()).unwrap();
        assert_eq!(n, 300);
        assert_eq!(session.commit().unwrap(), 300);

        for (k, v) in &items {
            assert_eq!(db.get(k).unwrap().unwrap(), *v);
        }

        // empty sessions are a no-op
        let mut empty = db.begin_bulk("accounts").unwrap();
        assert_eq!(empty.load(&mut Vec::new().into_iter()).unwrap(), 0);
        assert_eq!(empty.commit().unwrap(), 0);

        // abandoned sessions leave nothing behind
        let gone = db.begin_bulk("storage_slots").unwrap();
        gone.destroy().unwrap();
        assert!(db.rocks().is_some());

        drop(db);
        let _ = fs::remove_dir_all(&dir);
    }
}
