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
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

pub mod audio;
pub mod error;
pub mod store;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::store::Store;

/// Prefix for environment variable overrides, e.g. `SAMPLEDECK__STORE__VERSION=2`.
pub const ENV_PREFIX: &str = "SAMPLEDECK";

/// Number of pads when the configuration doesn't say.
pub const DEFAULT_PAD_COUNT: usize = 2;

/// The configuration for the sampler.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Sampler {
    /// The sample store configuration.
    store: Store,
    /// The audio output configuration.
    audio: Audio,
    /// The number of pads to show.
    pads: Option<usize>,
}

impl Sampler {
    /// Creates a new sampler configuration.
    pub fn new(store: Store, audio: Audio, pads: usize) -> Sampler {
        Sampler {
            store,
            audio,
            pads: Some(pads),
        }
    }

    /// Loads the configuration from an optional YAML file, then applies any
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Sampler, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let sampler = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Sampler>()?;

        if sampler.pads == Some(0) {
            return Err(ConfigError::Invalid("pads must be at least 1".to_string()));
        }
        Ok(sampler)
    }

    /// Returns the store configuration.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the number of pads.
    pub fn pads(&self) -> usize {
        self.pads.unwrap_or(DEFAULT_PAD_COUNT)
    }
}
