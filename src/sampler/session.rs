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
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task;
use tracing::{debug, info};

use super::state::{reduce, Event, SamplerState};
use super::{Playback, SamplerError, SkipReason};
use crate::audio;
use crate::config;
use crate::store::{SampleEntry, SampleFile, SampleStore, StoreError, StoreRegistry};
use crate::util::filename_display;

/// Where the sampler is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    /// A live session: the store is opened and audio is bound.
    Interactive,
    /// A layout-only pass: no store, no audio, and every effect is skipped.
    Prerender,
}

impl Environment {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Environment::Interactive)
    }
}

/// One running sampler. Owns the state and the store handle. Pads and the
/// library hold weak references to it.
pub struct Session {
    environment: Environment,
    store_name: String,
    state: Mutex<SamplerState>,
    store: Mutex<Option<SampleStore>>,
}

impl Session {
    /// Opens a session. In an interactive environment this acquires the store,
    /// seeds the library from it and binds the audio device if there is one.
    pub async fn open(
        registry: &StoreRegistry,
        config: &config::Store,
        environment: Environment,
        device: Option<Arc<dyn audio::Device>>,
    ) -> Result<Arc<Session>, SamplerError> {
        let session = Arc::new(Session {
            environment,
            store_name: config.name().to_string(),
            state: Mutex::new(SamplerState::new(config.name(), config.version())),
            store: Mutex::new(None),
        });

        if !environment.is_interactive() {
            debug!(store = config.name(), "Prerender session, skipping store and audio");
            return Ok(session);
        }

        let store = {
            let registry = registry.clone();
            let name = config.name().to_string();
            let version = config.version();
            task::spawn_blocking(move || registry.acquire(&name, version)).await??
        };
        if let Some(from) = store.migrated_from() {
            info!(
                store = store.name(),
                from,
                to = store.version(),
                "Store migrated, library starts empty"
            );
        }

        let catalog = {
            let store = store.clone();
            task::spawn_blocking(move || store.catalog()).await??
        };
        let seeded = catalog.len();
        *session.state.lock() = SamplerState::seeded(
            config.name(),
            config.version(),
            catalog.into_iter().map(|info| info.name),
        );
        *session.store.lock() = Some(store);

        if let Some(device) = device {
            info!(device = %device, "Audio ready");
            session.dispatch(Event::AudioReady(device));
        }

        info!(store = config.name(), samples = seeded, "Session opened");
        Ok(session)
    }

    /// Applies an event and returns the resulting snapshot. Dispatches are
    /// serialized.
    pub fn dispatch(&self, event: Event) -> SamplerState {
        let mut state = self.state.lock();
        let next = reduce(&state, event);
        *state = next.clone();
        next
    }

    /// Returns the current snapshot.
    pub fn state(&self) -> SamplerState {
        self.state.lock().clone()
    }

    /// Returns the store handle. None in a prerender session.
    fn store(&self) -> Result<Option<SampleStore>, SamplerError> {
        if !self.environment.is_interactive() {
            return Ok(None);
        }
        match self.store.lock().as_ref() {
            Some(store) => Ok(Some(store.clone())),
            None => Err(StoreError::Closed(self.store_name.clone()).into()),
        }
    }

    /// Persists the file under its derived name and adds it to the library.
    /// Returns the name, or None if the session is prerendering.
    pub async fn upload(&self, path: &Path) -> Result<Option<String>, SamplerError> {
        let Some(store) = self.store()? else {
            debug!(path = ?path, "Upload skipped, not interactive");
            return Ok(None);
        };

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| SamplerError::InvalidFileName(path.to_path_buf()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| SamplerError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let entry = SampleEntry::from_file_name(file_name, bytes)
            .ok_or_else(|| SamplerError::InvalidFileName(path.to_path_buf()))?;
        let size = entry.size;

        let name = task::spawn_blocking(move || store.put(&entry)).await??;
        self.dispatch(Event::SampleUploaded(name.clone()));

        info!(name = %name, size, file = filename_display(path), "Sample uploaded");
        Ok(Some(name))
    }

    /// Looks the sample up, decodes it and starts a voice for it.
    pub async fn play(&self, name: &str) -> Result<Playback, SamplerError> {
        let Some(device) = self.state().audio().cloned() else {
            debug!(name, "Play skipped, no audio");
            return Ok(Playback::Skipped(SkipReason::NoAudio));
        };
        let Some(store) = self.store()? else {
            debug!(name, "Play skipped, not interactive");
            return Ok(Playback::Skipped(SkipReason::NoAudio));
        };

        let entry = {
            let name = name.to_string();
            task::spawn_blocking(move || store.get(&name)).await??
        };
        let Some(entry) = entry else {
            debug!(name, "Play skipped, sample not found");
            return Ok(Playback::Skipped(SkipReason::NotFound));
        };

        let SampleFile { mime, bytes } = entry.file;
        let sample_rate = device.sample_rate();
        let clip =
            task::spawn_blocking(move || audio::decode(bytes, &mime, sample_rate)).await??;
        let duration = clip.duration();
        let decoded_bytes = clip.memory_size();

        let voice_id = device.play(clip).map_err(SamplerError::Audio)?;
        debug!(
            name,
            voice_id,
            duration_ms = duration.as_millis(),
            decoded_bytes,
            "Sample playing"
        );
        Ok(Playback::Started { voice_id, duration })
    }

    /// Releases the store handle. Later store operations fail.
    pub fn close(&self) -> Result<(), SamplerError> {
        let store = self.store.lock().take();
        if let Some(store) = store {
            store.close()?;
            info!(store = self.store_name, "Session closed");
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("environment", &self.environment)
            .field("state", &*self.state.lock())
            .field("open", &self.store.lock().is_some())
            .finish()
    }
}
