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
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::{SampleStore, StoreError};

/// Keeps one open store handle per store name for the life of the process.
///
/// Clones share the same set of handles.
#[derive(Clone)]
pub struct StoreRegistry {
    /// The directory stores are created in.
    directory: PathBuf,
    /// Open handles by store name.
    stores: Arc<Mutex<HashMap<String, SampleStore>>>,
}

impl StoreRegistry {
    /// Creates a registry for stores in the given directory.
    pub fn new(directory: impl Into<PathBuf>) -> StoreRegistry {
        StoreRegistry {
            directory: directory.into(),
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns a handle to the named store at the given version.
    ///
    /// A cached handle at the same version is reused. A higher version
    /// invalidates the cached handle, along with every clone of it still in
    /// use, and replaces it with a freshly migrated one.
    pub fn acquire(&self, name: &str, version: u32) -> Result<SampleStore, StoreError> {
        let mut stores = self.stores.lock();

        if let Some(store) = stores.get(name) {
            match version.cmp(&store.version()) {
                Ordering::Equal => return Ok(store.clone()),
                Ordering::Less => {
                    return Err(StoreError::VersionDowngrade {
                        store: name.to_string(),
                        current: store.version(),
                        requested: version,
                    })
                }
                Ordering::Greater => {
                    info!(
                        store = name,
                        from = store.version(),
                        to = version,
                        "Schema version bumped, reconnecting"
                    );
                    if let Some(stale) = stores.remove(name) {
                        stale.invalidate()?;
                    }
                }
            }
        }

        let store = SampleStore::connect(&self.directory, name, version)?;
        stores.insert(name.to_string(), store.clone());
        Ok(store)
    }

    /// Releases the cached handle for the named store, if any.
    pub fn release(&self, name: &str) -> Result<(), StoreError> {
        let store = self.stores.lock().remove(name);
        match store {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    /// Releases every cached handle.
    pub fn release_all(&self) -> Result<(), StoreError> {
        let stores: Vec<SampleStore> = self.stores.lock().drain().map(|(_, s)| s).collect();
        for store in stores {
            store.close()?;
        }
        Ok(())
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("directory", &self.directory)
            .field("open_stores", &self.stores.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::store::SampleEntry;

    use super::*;

    #[test]
    fn test_acquire_memoizes() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let registry = StoreRegistry::new(dir.path());

        let first = registry.acquire("memo", 1)?;
        first.put(&SampleEntry::new("kick", "audio/wav", vec![1]))?;
        let second = registry.acquire("memo", 1)?;

        assert!(Arc::ptr_eq(&first.conn, &second.conn));
        assert!(second.get("kick")?.is_some());
        Ok(())
    }

    #[test]
    fn test_version_bump_reconnects() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let registry = StoreRegistry::new(dir.path());

        let v1 = registry.acquire("bump", 1)?;
        v1.put(&SampleEntry::new("kick", "audio/wav", vec![1]))?;
        drop(v1);

        let v2 = registry.acquire("bump", 2)?;
        assert_eq!(2, v2.version());
        assert_eq!(Some(1), v2.migrated_from());
        assert_eq!(0, v2.count()?);

        assert!(matches!(
            registry.acquire("bump", 1),
            Err(StoreError::VersionDowngrade { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_version_bump_invalidates_old_handles() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let registry = StoreRegistry::new(dir.path());

        let v1 = registry.acquire("stale", 1)?;
        let v1_clone = v1.clone();
        v1.put(&SampleEntry::new("kick", "audio/wav", vec![1]))?;

        let v2 = registry.acquire("stale", 2)?;

        assert!(matches!(
            v1.put(&SampleEntry::new("snare", "audio/wav", vec![2])),
            Err(StoreError::Closed(_))
        ));
        assert!(matches!(v1_clone.get("kick"), Err(StoreError::Closed(_))));
        assert!(matches!(v1.entries(), Err(StoreError::Closed(_))));
        assert!(matches!(v1.catalog(), Err(StoreError::Closed(_))));

        // Nothing leaked into the new schema through the old handle.
        assert_eq!(0, v2.count()?);

        // Closing an invalidated handle is fine.
        v1.close()?;
        v1_clone.close()?;
        Ok(())
    }

    #[test]
    fn test_release() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let registry = StoreRegistry::new(dir.path());

        let first = registry.acquire("release", 1)?;
        registry.release("release")?;
        let second = registry.acquire("release", 1)?;
        assert!(!Arc::ptr_eq(&first.conn, &second.conn));

        registry.release_all()?;
        registry.release("never-opened")?;
        Ok(())
    }
}
