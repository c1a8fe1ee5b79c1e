// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Durable, versioned storage for sample payloads.
//!
//! Each store is a single SQLite file holding one `sample` table keyed by
//! sample name, with a secondary index on payload size.

mod entry;
mod registry;
mod schema;

use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

pub use entry::{
    derive_name, mime_for_path, SampleEntry, SampleFile, SampleInfo, DEFAULT_MIME,
};
pub use registry::StoreRegistry;

/// How long an opener waits on a store locked by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File extension used for store files.
const STORE_EXTENSION: &str = "sqlite3";

/// Errors produced by the sample store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Sample store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migrating store {store} from v{from} to v{to} failed: {source}")]
    Migration {
        store: String,
        from: u32,
        to: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store {store} is at v{current}, refusing to open it at v{requested}")]
    VersionDowngrade {
        store: String,
        current: u32,
        requested: u32,
    },

    #[error("Schema version must be at least 1, got {0}")]
    InvalidVersion(u32),

    #[error("Invalid store name '{0}'")]
    InvalidName(String),

    #[error("Store {0} has been closed")]
    Closed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A handle to an open sample store. Clones share the same connection.
#[derive(Clone)]
pub struct SampleStore {
    /// The logical name of the store.
    name: String,
    /// The schema version this handle was opened at.
    version: u32,
    /// The store file on disk.
    path: PathBuf,
    /// The version replaced by a migration during connect, if one ran.
    migrated_from: Option<u32>,
    /// The shared connection. The mutex makes every operation atomic with
    /// respect to every other operation through this handle. None once the
    /// handle has been invalidated.
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SampleStore {
    /// Opens the named store in the given directory, creating it if needed and
    /// migrating it if the requested version is newer than the one on disk.
    pub fn connect(directory: &Path, name: &str, version: u32) -> Result<SampleStore, StoreError> {
        if version == 0 {
            return Err(StoreError::InvalidVersion(version));
        }
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        fs::create_dir_all(directory)?;
        let path = directory
            .canonicalize()?
            .join(format!("{}.{}", name, STORE_EXTENSION));

        let mut conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let migrated_from = schema::upgrade(&mut conn, &path, name, version)?;

        info!(store = name, version, path = ?path, "Sample store opened");

        Ok(SampleStore {
            name: name.to_string(),
            version,
            path,
            migrated_from,
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Returns the logical name of the store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema version this handle was opened at.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the version that connect migrated away from, if it migrated.
    pub fn migrated_from(&self) -> Option<u32> {
        self.migrated_from
    }

    /// Runs the operation against the shared connection.
    fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock();
        match conn.as_mut() {
            Some(conn) => op(conn),
            None => Err(StoreError::Closed(self.name.clone())),
        }
    }

    /// Inserts the entry, replacing any entry with the same name. Returns the key.
    pub fn put(&self, entry: &SampleEntry) -> Result<String, StoreError> {
        let size = i64::try_from(entry.size)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT OR REPLACE INTO sample (name, size, mime, file) VALUES (?1, ?2, ?3, ?4)",
                params![entry.name, size, entry.file.mime, entry.file.bytes],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        debug!(
            store = self.name,
            name = entry.name,
            size = entry.size,
            "Sample stored"
        );
        Ok(entry.name.clone())
    }

    /// Looks up a single entry. A missing entry is not an error.
    pub fn get(&self, name: &str) -> Result<Option<SampleEntry>, StoreError> {
        let entry = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT name, size, mime, file FROM sample WHERE name = ?1",
                    params![name],
                    entry_from_row,
                )
                .optional()?)
        })?;

        debug!(
            store = self.name,
            name,
            found = entry.is_some(),
            "Sample lookup"
        );
        Ok(entry)
    }

    /// Returns every stored entry as of the moment this call starts.
    ///
    /// The rows are read inside one transaction, so the snapshot contains only
    /// committed entries and nothing written after the read began.
    pub fn entries(&self) -> Result<Snapshot, StoreError> {
        let entries = self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            let entries = {
                let mut stmt = tx.prepare("SELECT name, size, mime, file FROM sample")?;
                let rows = stmt.query_map([], entry_from_row)?;
                rows.collect::<Result<Vec<SampleEntry>, rusqlite::Error>>()?
            };
            tx.commit()?;
            Ok(entries)
        })?;

        Ok(Snapshot {
            entries: entries.into_iter(),
        })
    }

    /// Returns the name, size and MIME type of every entry, ordered by name.
    /// Payloads are not read.
    pub fn catalog(&self) -> Result<Vec<SampleInfo>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name, size, mime FROM sample ORDER BY name")?;
            let infos = stmt
                .query_map([], |row| {
                    Ok(SampleInfo {
                        name: row.get(0)?,
                        size: size_from_row(row, 1)?,
                        mime: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<SampleInfo>, rusqlite::Error>>()?;
            Ok(infos)
        })
    }

    /// Returns the names of all samples whose size falls within the range,
    /// smallest first.
    pub fn names_by_size(&self, range: RangeInclusive<u64>) -> Result<Vec<String>, StoreError> {
        let start = i64::try_from(*range.start()).unwrap_or(i64::MAX);
        let end = i64::try_from(*range.end()).unwrap_or(i64::MAX);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sample INDEXED BY by_size
                 WHERE size BETWEEN ?1 AND ?2 ORDER BY size, name",
            )?;
            let names = stmt
                .query_map(params![start, end], |row| row.get(0))?
                .collect::<Result<Vec<String>, rusqlite::Error>>()?;
            Ok(names)
        })
    }

    /// Returns the number of stored entries.
    pub fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM sample", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
    }

    /// Closes the connection for every clone of this handle. Later operations
    /// through any clone fail with `StoreError::Closed`.
    pub(crate) fn invalidate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| e)?;
            debug!(
                store = self.name,
                version = self.version,
                "Sample store handle invalidated"
            );
        }
        Ok(())
    }

    /// Releases this handle. The underlying connection is closed once the last
    /// handle sharing it is released.
    pub fn close(self) -> Result<(), StoreError> {
        let name = self.name;
        if let Some(Some(conn)) = Arc::into_inner(self.conn).map(Mutex::into_inner) {
            conn.close().map_err(|(_, e)| e)?;
            debug!(store = name, "Sample store connection closed");
        }
        Ok(())
    }
}

impl fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStore")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("path", &self.path)
            .finish()
    }
}

impl fmt::Display for SampleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (v{})", self.name, self.version)
    }
}

/// A consistent, point-in-time view of every entry in a store.
pub struct Snapshot {
    entries: std::vec::IntoIter<SampleEntry>,
}

impl Iterator for Snapshot {
    type Item = SampleEntry;

    fn next(&mut self) -> Option<SampleEntry> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Snapshot {}

fn size_from_row(row: &Row, idx: usize) -> rusqlite::Result<u64> {
    let size: i64 = row.get(idx)?;
    u64::try_from(size)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn entry_from_row(row: &Row) -> rusqlite::Result<SampleEntry> {
    Ok(SampleEntry {
        name: row.get(0)?,
        size: size_from_row(row, 1)?,
        file: SampleFile {
            mime: row.get(2)?,
            bytes: row.get(3)?,
        },
    })
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::error::Error;
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    #[test]
    fn test_put_overwrites() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "overwrite", 1)?;

        store.put(&SampleEntry::new("kick", "audio/wav", vec![1, 2, 3]))?;
        let key = store.put(&SampleEntry::new("kick", "audio/wav", vec![4, 5, 6, 7, 8]))?;
        assert_eq!("kick", key);

        assert_eq!(1, store.count()?);
        let entry = store.get("kick")?.expect("expected kick");
        assert_eq!(5, entry.size);
        assert_eq!(vec![4, 5, 6, 7, 8], entry.file.bytes);
        Ok(())
    }

    #[test]
    fn test_get_missing() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "missing", 1)?;
        assert!(store.get("nothing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_entries_are_consistent() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "catalog", 1)?;

        for i in 0..10 {
            store.put(&SampleEntry::new(
                format!("sample{}", i),
                "audio/wav",
                vec![i as u8; i + 1],
            ))?;
        }
        // Overwrite a couple so the last write is what we expect to see.
        store.put(&SampleEntry::new("sample3", "audio/wav", vec![42; 100]))?;
        store.put(&SampleEntry::new("sample7", "audio/wav", vec![7; 2]))?;

        let snapshot = store.entries()?;
        assert_eq!(10, snapshot.len());

        let mut names = HashSet::new();
        for entry in snapshot {
            let looked_up = store.get(&entry.name)?.expect("expected entry");
            assert_eq!(looked_up, entry);
            names.insert(entry.name);
        }
        assert_eq!(10, names.len());
        assert_eq!(100, store.get("sample3")?.unwrap().size);
        Ok(())
    }

    #[test]
    fn test_snapshot_ignores_later_writes() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "snapshot", 1)?;
        store.put(&SampleEntry::new("before", "audio/wav", vec![1]))?;

        let snapshot = store.entries()?;
        store.put(&SampleEntry::new("after", "audio/wav", vec![2]))?;

        let names: Vec<String> = snapshot.map(|entry| entry.name).collect();
        assert_eq!(vec!["before".to_string()], names);
        assert_eq!(2, store.count()?);
        Ok(())
    }

    #[test]
    fn test_names_by_size() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "sizes", 1)?;
        store.put(&SampleEntry::new("small", "audio/wav", vec![0; 10]))?;
        store.put(&SampleEntry::new("medium", "audio/wav", vec![0; 100]))?;
        store.put(&SampleEntry::new("large", "audio/wav", vec![0; 1000]))?;

        assert_eq!(
            vec!["small".to_string(), "medium".to_string()],
            store.names_by_size(0..=100)?
        );
        assert_eq!(vec!["large".to_string()], store.names_by_size(101..=u64::MAX)?);
        assert!(store.names_by_size(11..=99)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_migration_is_destructive() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "migrate", 1)?;
        assert_eq!(Some(0), store.migrated_from());
        store.put(&SampleEntry::new("kick", "audio/wav", vec![1, 2, 3]))?;
        store.put(&SampleEntry::new("snare", "audio/wav", vec![4, 5]))?;
        store.close()?;

        // Reopening at the same version keeps everything.
        let store = SampleStore::connect(dir.path(), "migrate", 1)?;
        assert_eq!(None, store.migrated_from());
        assert_eq!(2, store.entries()?.count());
        store.close()?;

        let store = SampleStore::connect(dir.path(), "migrate", 2)?;
        assert_eq!(Some(1), store.migrated_from());
        assert_eq!(0, store.entries()?.count());
        assert!(store.get("kick")?.is_none());
        Ok(())
    }

    #[test]
    fn test_connect_rejects_bad_arguments() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            SampleStore::connect(dir.path(), "zero", 0),
            Err(StoreError::InvalidVersion(0))
        ));
        assert!(matches!(
            SampleStore::connect(dir.path(), "../escape", 1),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            SampleStore::connect(dir.path(), "", 1),
            Err(StoreError::InvalidName(_))
        ));

        SampleStore::connect(dir.path(), "older", 4)?.close()?;
        assert!(matches!(
            SampleStore::connect(dir.path(), "older", 3),
            Err(StoreError::VersionDowngrade { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_concurrent_opens_migrate_once() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "race", 1)?;
        store.put(&SampleEntry::new("kick", "audio/wav", vec![1, 2, 3]))?;
        store.close()?;

        let openers = 8;
        let barrier = Arc::new(Barrier::new(openers));
        let handles: Vec<_> = (0..openers)
            .map(|_| {
                let barrier = barrier.clone();
                let directory = dir.path().to_path_buf();
                thread::spawn(move || {
                    barrier.wait();
                    SampleStore::connect(&directory, "race", 2).map(|store| store.migrated_from())
                })
            })
            .collect();

        let mut migrations = 0;
        for handle in handles {
            let migrated_from = handle.join().expect("opener panicked")?;
            if migrated_from.is_some() {
                assert_eq!(Some(1), migrated_from);
                migrations += 1;
            }
        }
        assert_eq!(1, migrations);

        let store = SampleStore::connect(dir.path(), "race", 2)?;
        assert_eq!(0, store.count()?);
        Ok(())
    }

    #[test]
    fn test_concurrent_opens_at_different_versions() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "mixed", 1)?;
        store.put(&SampleEntry::new("kick", "audio/wav", vec![1, 2, 3]))?;
        store.close()?;

        let openers = 8;
        let barrier = Arc::new(Barrier::new(openers));
        let handles: Vec<_> = (0..openers)
            .map(|i| {
                let barrier = barrier.clone();
                let directory = dir.path().to_path_buf();
                let version = if i % 2 == 0 { 2 } else { 3 };
                thread::spawn(move || {
                    barrier.wait();
                    let store = SampleStore::connect(&directory, "mixed", version)?;
                    // The table and its index must both be there, and empty of
                    // anything from v1.
                    let names = store.names_by_size(0..=u64::MAX)?;
                    let count = store.count()?;
                    store.close()?;
                    Ok::<_, StoreError>((version, names, count))
                })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            match handle.join().expect("opener panicked") {
                Ok((_, names, count)) => {
                    assert!(names.is_empty());
                    assert_eq!(0, count);
                    opened += 1;
                }
                Err(StoreError::VersionDowngrade {
                    current, requested, ..
                }) => {
                    assert_eq!(3, current);
                    assert_eq!(2, requested);
                }
                Err(e) => return Err(e.into()),
            }
        }
        // Every v3 opener succeeds.
        assert!(opened >= openers / 2);

        let store = SampleStore::connect(dir.path(), "mixed", 3)?;
        assert_eq!(None, store.migrated_from());
        assert_eq!(0, store.count()?);
        let version = store.with_conn(|conn| Ok(schema::on_disk_version(conn)?))?;
        assert_eq!(3, version);
        Ok(())
    }

    #[test]
    fn test_catalog_skips_payloads() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SampleStore::connect(dir.path(), "catalog", 1)?;
        store.put(&SampleEntry::new("snare", "audio/wav", vec![0; 20]))?;
        store.put(&SampleEntry::new("kick", "audio/mpeg", vec![0; 10]))?;

        assert_eq!(
            vec![
                SampleInfo {
                    name: "kick".to_string(),
                    size: 10,
                    mime: "audio/mpeg".to_string(),
                },
                SampleInfo {
                    name: "snare".to_string(),
                    size: 20,
                    mime: "audio/wav".to_string(),
                },
            ],
            store.catalog()?
        );
        Ok(())
    }
}
