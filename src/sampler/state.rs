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

//! The sampler's in-memory view of the world and the reducer that moves it
//! from one snapshot to the next.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::audio;

/// The catalog, keyed by sample name.
pub type Library = BTreeMap<String, LibraryEntry>;

/// A sample the library knows about.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LibraryEntry {
    pub name: String,
}

/// A snapshot of the sampler state. Cloning is cheap: the library and audio
/// handle are shared, and no snapshot is ever mutated after it is built.
#[derive(Clone)]
pub struct SamplerState {
    store_name: String,
    schema_version: u32,
    library: Arc<Library>,
    audio: Option<Arc<dyn audio::Device>>,
}

impl SamplerState {
    /// Creates the initial state: an empty library and no audio.
    pub fn new(store_name: &str, schema_version: u32) -> SamplerState {
        SamplerState {
            store_name: store_name.to_string(),
            schema_version,
            library: Arc::new(BTreeMap::new()),
            audio: None,
        }
    }

    /// Creates a state whose library already holds the given names, with no
    /// audio bound.
    pub fn seeded<I>(store_name: &str, schema_version: u32, names: I) -> SamplerState
    where
        I: IntoIterator<Item = String>,
    {
        let library = names
            .into_iter()
            .map(|name| (name.clone(), LibraryEntry { name }))
            .collect();
        SamplerState {
            library: Arc::new(library),
            ..SamplerState::new(store_name, schema_version)
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// Returns the audio handle, if the environment has provided one.
    pub fn audio(&self) -> Option<&Arc<dyn audio::Device>> {
        self.audio.as_ref()
    }

    /// Returns true if the library contains the name.
    pub fn contains(&self, name: &str) -> bool {
        self.library.contains_key(name)
    }
}

impl fmt::Debug for SamplerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplerState")
            .field("store_name", &self.store_name)
            .field("schema_version", &self.schema_version)
            .field("library", &self.library.keys().collect::<Vec<_>>())
            .field("audio", &self.audio.as_ref().map(|audio| audio.to_string()))
            .finish()
    }
}

/// Everything that can change the sampler state.
#[derive(Clone)]
pub enum Event {
    /// The audio output is available.
    AudioReady(Arc<dyn audio::Device>),
    /// A sample with this name now exists in the store.
    SampleUploaded(String),
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::AudioReady(device) => write!(f, "AudioReady({})", device),
            Event::SampleUploaded(name) => write!(f, "SampleUploaded({})", name),
        }
    }
}

/// Computes the next state. Never touches the store or the audio device.
pub fn reduce(state: &SamplerState, event: Event) -> SamplerState {
    match event {
        Event::AudioReady(device) => SamplerState {
            audio: Some(device),
            ..state.clone()
        },
        Event::SampleUploaded(name) => {
            if state.library.contains_key(&name) {
                return state.clone();
            }

            let mut library = Library::clone(&state.library);
            library.insert(name.clone(), LibraryEntry { name });
            SamplerState {
                library: Arc::new(library),
                ..state.clone()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::mock;

    fn names(state: &SamplerState) -> Vec<&str> {
        state.library().keys().map(String::as_str).collect()
    }

    #[test]
    fn test_upload_extends_library() {
        let initial = SamplerState::new("audio_sampler", 1);
        let first = reduce(&initial, Event::SampleUploaded("kick".to_string()));
        let second = reduce(&first, Event::SampleUploaded("snare".to_string()));

        assert_eq!(vec!["kick", "snare"], names(&second));
        assert_eq!("audio_sampler", second.store_name());
        assert_eq!(1, second.schema_version());
        assert!(second.audio().is_none());
    }

    #[test]
    fn test_seeded_library() {
        let seeded = SamplerState::seeded(
            "audio_sampler",
            3,
            vec!["snare".to_string(), "kick".to_string(), "kick".to_string()],
        );
        assert_eq!(vec!["kick", "snare"], names(&seeded));
        assert_eq!(3, seeded.schema_version());
        assert!(seeded.audio().is_none());

        let again = reduce(&seeded, Event::SampleUploaded("snare".to_string()));
        assert!(Arc::ptr_eq(seeded.library(), again.library()));
    }

    #[test]
    fn test_old_snapshots_unchanged() {
        let initial = SamplerState::new("audio_sampler", 1);
        let first = reduce(&initial, Event::SampleUploaded("kick".to_string()));
        let second = reduce(&first, Event::SampleUploaded("snare".to_string()));

        assert!(names(&initial).is_empty());
        assert_eq!(vec!["kick"], names(&first));
        assert!(!Arc::ptr_eq(first.library(), second.library()));
    }

    #[test]
    fn test_repeat_upload_is_idempotent() {
        let initial = SamplerState::new("audio_sampler", 1);
        let first = reduce(&initial, Event::SampleUploaded("kick".to_string()));
        let again = reduce(&first, Event::SampleUploaded("kick".to_string()));

        assert_eq!(vec!["kick"], names(&again));
        assert!(Arc::ptr_eq(first.library(), again.library()));
    }

    #[test]
    fn test_audio_ready_last_write_wins() {
        let initial = SamplerState::new("audio_sampler", 1);
        let with_library = reduce(&initial, Event::SampleUploaded("kick".to_string()));

        let first = reduce(
            &with_library,
            Event::AudioReady(Arc::new(mock::Device::get("mock-first", None))),
        );
        let second = reduce(
            &first,
            Event::AudioReady(Arc::new(mock::Device::get("mock-second", None))),
        );

        assert_eq!(
            Some("mock-second (Mock)".to_string()),
            second.audio().map(|audio| audio.to_string())
        );
        assert_eq!(
            Some("mock-first (Mock)".to_string()),
            first.audio().map(|audio| audio.to_string())
        );
        assert!(with_library.audio().is_none());
        assert!(Arc::ptr_eq(with_library.library(), second.library()));
    }
}
