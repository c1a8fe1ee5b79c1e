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

//! Schema management for the sample store.
//!
//! The schema version lives in `PRAGMA user_version`. Any increase drops and
//! recreates the sample table; nothing is carried across versions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use super::StoreError;

/// Per-store migration locks, keyed by the store's canonical path.
static MIGRATION_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn migration_lock(path: &Path) -> Arc<Mutex<()>> {
    MIGRATION_LOCKS
        .lock()
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Reads the schema version currently recorded in the store.
pub(super) fn on_disk_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Brings the store up to the requested version.
///
/// Returns the version that was replaced if a migration ran, or None if the
/// store was already at the requested version.
pub(super) fn upgrade(
    conn: &mut Connection,
    path: &Path,
    store: &str,
    version: u32,
) -> Result<Option<u32>, StoreError> {
    // Only one migration per store in this process; the exclusive transaction
    // orders us against other processes.
    let lock = migration_lock(path);
    let _guard = lock.lock();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
    let current = on_disk_version(&tx)?;

    if version < current {
        return Err(StoreError::VersionDowngrade {
            store: store.to_string(),
            current,
            requested: version,
        });
    }
    if version == current {
        tx.commit()?;
        debug!(store, version, "Sample store schema is current");
        return Ok(None);
    }

    info!(
        store,
        from = current,
        to = version,
        "Upgrading sample store, existing samples will be dropped"
    );

    let migration_error = |source: rusqlite::Error| StoreError::Migration {
        store: store.to_string(),
        from: current,
        to: version,
        source,
    };

    tx.execute_batch(&migration_sql(version))
        .map_err(migration_error)?;
    tx.commit().map_err(migration_error)?;

    Ok(Some(current))
}

fn migration_sql(version: u32) -> String {
    format!(
        "DROP INDEX IF EXISTS by_size;
         DROP TABLE IF EXISTS sample;
         CREATE TABLE sample (
             name TEXT PRIMARY KEY NOT NULL,
             size INTEGER NOT NULL,
             mime TEXT NOT NULL,
             file BLOB NOT NULL
         );
         CREATE INDEX by_size ON sample (size);
         PRAGMA user_version = {};",
        version
    )
}
