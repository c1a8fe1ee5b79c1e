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
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_STORE_NAME: &str = "audio_sampler";
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

/// A YAML representation of the sample store configuration.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Store {
    /// The logical name of the store. Also the file stem on disk.
    name: String,

    /// The schema version. Raising it wipes the store.
    version: u32,

    /// The directory the store file lives in.
    directory: PathBuf,
}

impl Default for Store {
    fn default() -> Self {
        Store {
            name: DEFAULT_STORE_NAME.to_string(),
            version: DEFAULT_SCHEMA_VERSION,
            directory: PathBuf::from("."),
        }
    }
}

impl Store {
    /// Creates a new store configuration.
    pub fn new(name: &str, version: u32, directory: &Path) -> Store {
        Store {
            name: name.to_string(),
            version,
            directory: directory.to_path_buf(),
        }
    }

    /// Returns the store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the directory the store lives in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}
