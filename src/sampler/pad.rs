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
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use super::transfer::{DragEvent, DragPhase};
use super::{expect_phase, Playback, SamplerError, Session, PLACEHOLDER_NAME};

/// A pad bound to one sample name. Pressing it plays the sample; dropping onto
/// it rebinds it.
pub struct Pad {
    index: usize,
    name: String,
    session: Weak<Session>,
}

impl Pad {
    /// Creates a pad bound to the placeholder name.
    pub fn new(index: usize, session: &Arc<Session>) -> Pad {
        Pad {
            index,
            name: PLACEHOLDER_NAME.to_string(),
            session: Arc::downgrade(session),
        }
    }

    /// The sample name the pad is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn session(&self) -> Result<Arc<Session>, SamplerError> {
        self.session.upgrade().ok_or(SamplerError::SessionClosed)
    }

    /// Accepts the drag so a drop can follow.
    pub fn on_drag_over(&self, event: &mut DragEvent) -> Result<(), SamplerError> {
        expect_phase(event, DragPhase::DragOver)?;
        event.prevent_default();
        Ok(())
    }

    /// Handles a drop. A text/plain payload rebinds the pad to that name. A
    /// file is uploaded and the pad rebound to the stored name; only the first
    /// file counts, and it wins over any text.
    pub async fn on_drop(&mut self, event: &mut DragEvent) -> Result<(), SamplerError> {
        expect_phase(event, DragPhase::Drop)?;
        event.prevent_default();
        let session = self.session()?;

        let transfer = event.data_transfer();
        if let Some(text) = transfer.text() {
            debug!(pad = self.index, name = text, "Pad rebound");
            self.name = text.to_string();
        }

        let files = transfer.files();
        if files.len() > 1 {
            debug!(pad = self.index, ignored = files.len() - 1, "Only the first file is used");
        }
        if let Some(path) = files.first() {
            if let Some(name) = session.upload(path).await? {
                debug!(pad = self.index, name = %name, "Pad rebound to upload");
                self.name = name;
            }
        }
        Ok(())
    }

    /// Plays the bound sample. A sample that fails to decode unbinds the pad.
    pub async fn press(&mut self) -> Result<Playback, SamplerError> {
        let session = self.session()?;
        match session.play(&self.name).await {
            Err(SamplerError::Decode(e)) => {
                warn!(pad = self.index, name = %self.name, err = %e, "Unable to decode sample");
                self.name = PLACEHOLDER_NAME.to_string();
                Err(SamplerError::Decode(e))
            }
            result => result,
        }
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.name)
    }
}
