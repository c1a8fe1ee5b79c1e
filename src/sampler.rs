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

//! The sampler: a session owning the library state and store handle, the pads
//! bound to it and the library drop target.

mod library;
mod pad;
mod session;
pub mod state;
pub mod transfer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::audio;
use crate::audio::DecodeError;
use crate::config;
use crate::store::{StoreError, StoreRegistry};

pub use library::LibraryView;
pub use pad::Pad;
pub use session::{Environment, Session};
pub use state::{reduce, Event, LibraryEntry, SamplerState};
pub use transfer::{DataTransfer, DragEvent, DragPhase, TEXT_PLAIN};

/// The name a pad is bound to before anything is dropped on it.
pub const PLACEHOLDER_NAME: &str = "audio";

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Audio output error: {0}")]
    Audio(Box<dyn std::error::Error + Send + Sync>),

    #[error("Unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No sample name can be derived from {0}")]
    InvalidFileName(PathBuf),

    #[error("Expected a {expected} event, got {actual}")]
    WrongPhase {
        expected: DragPhase,
        actual: DragPhase,
    },

    #[error("The sampler session has been closed")]
    SessionClosed,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The outcome of a press.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Playback {
    /// A new voice started.
    Started { voice_id: u64, duration: Duration },
    /// Nothing was played.
    Skipped(SkipReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No audio output is bound yet.
    NoAudio,
    /// The store has no sample with the pad's name.
    NotFound,
}

fn expect_phase(event: &DragEvent, expected: DragPhase) -> Result<(), SamplerError> {
    if event.phase() != expected {
        return Err(SamplerError::WrongPhase {
            expected,
            actual: event.phase(),
        });
    }
    Ok(())
}

/// A mounted sampler: the session plus the library view and pads that hang
/// off it.
pub struct Sampler {
    session: Arc<Session>,
    library: LibraryView,
    pads: Vec<Pad>,
}

impl Sampler {
    /// Opens a session for the configured store and builds its library and
    /// pads.
    pub async fn mount(
        registry: &StoreRegistry,
        config: &config::Sampler,
        environment: Environment,
        device: Option<Arc<dyn audio::Device>>,
    ) -> Result<Sampler, SamplerError> {
        let session = Session::open(registry, config.store(), environment, device).await?;
        let library = LibraryView::new(&session);
        let pads = (0..config.pads()).map(|i| Pad::new(i, &session)).collect();

        info!(pads = config.pads(), environment = ?environment, "Sampler mounted");
        Ok(Sampler {
            session,
            library,
            pads,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn library(&self) -> &LibraryView {
        &self.library
    }

    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    pub fn pad(&self, index: usize) -> Option<&Pad> {
        self.pads.get(index)
    }

    pub fn pad_mut(&mut self, index: usize) -> Option<&mut Pad> {
        self.pads.get_mut(index)
    }

    /// Closes the session. Pads and the library stop working afterwards.
    pub fn unmount(self) -> Result<(), SamplerError> {
        self.session.close()
    }
}
