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
use std::sync::{Arc, Weak};

use tracing::debug;

use super::state::LibraryEntry;
use super::transfer::{DataTransfer, DragEvent, DragPhase};
use super::{expect_phase, SamplerError, Session};

/// The library drop target and the list of known samples.
pub struct LibraryView {
    session: Weak<Session>,
}

impl LibraryView {
    pub fn new(session: &Arc<Session>) -> LibraryView {
        LibraryView {
            session: Arc::downgrade(session),
        }
    }

    fn session(&self) -> Result<Arc<Session>, SamplerError> {
        self.session.upgrade().ok_or(SamplerError::SessionClosed)
    }

    /// Lists the library, ordered by name.
    pub fn entries(&self) -> Result<Vec<LibraryEntry>, SamplerError> {
        Ok(self.session()?.state().library().values().cloned().collect())
    }

    /// Starts dragging an entry. The transfer carries the name as text/plain,
    /// ready to be dropped on a pad. None if the library has no such entry.
    pub fn drag_start(&self, name: &str) -> Result<Option<DataTransfer>, SamplerError> {
        if !self.session()?.state().contains(name) {
            return Ok(None);
        }
        Ok(Some(DataTransfer::with_text(name)))
    }

    pub fn on_drag_over(&self, event: &mut DragEvent) -> Result<(), SamplerError> {
        expect_phase(event, DragPhase::DragOver)?;
        event.prevent_default();
        Ok(())
    }

    /// Uploads every dropped file, in order. Returns the stored names.
    pub async fn on_drop(&self, event: &mut DragEvent) -> Result<Vec<String>, SamplerError> {
        expect_phase(event, DragPhase::Drop)?;
        event.prevent_default();
        let session = self.session()?;

        let mut names = Vec::new();
        for path in event.data_transfer().files() {
            if let Some(name) = session.upload(path).await? {
                names.push(name);
            }
        }
        debug!(uploaded = names.len(), "Library drop handled");
        Ok(names)
    }
}
