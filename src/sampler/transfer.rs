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
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// The data format a library entry is dragged as.
pub const TEXT_PLAIN: &str = "text/plain";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    DragOver,
    Drop,
}

impl fmt::Display for DragPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DragPhase::DragOver => write!(f, "dragover"),
            DragPhase::Drop => write!(f, "drop"),
        }
    }
}

/// The payload of a drag: dropped files and/or string data keyed by format.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataTransfer {
    files: Vec<PathBuf>,
    data: HashMap<String, String>,
}

impl DataTransfer {
    pub fn new() -> DataTransfer {
        DataTransfer::default()
    }

    /// A transfer carrying the given files.
    pub fn with_files(files: Vec<PathBuf>) -> DataTransfer {
        DataTransfer {
            files,
            data: HashMap::new(),
        }
    }

    /// A transfer carrying a text/plain entry.
    pub fn with_text(text: &str) -> DataTransfer {
        let mut transfer = DataTransfer::new();
        transfer.set_data(TEXT_PLAIN, text);
        transfer
    }

    pub fn add_file(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    pub fn set_data(&mut self, format: &str, value: &str) {
        self.data.insert(format.to_string(), value.to_string());
    }

    pub fn get_data(&self, format: &str) -> Option<&str> {
        self.data.get(format).map(String::as_str)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Shorthand for the text/plain entry.
    pub fn text(&self) -> Option<&str> {
        self.get_data(TEXT_PLAIN)
    }
}

/// A drag event delivered to a drop target.
#[derive(Debug)]
pub struct DragEvent {
    phase: DragPhase,
    data_transfer: DataTransfer,
    default_prevented: bool,
}

impl DragEvent {
    pub fn new(phase: DragPhase, data_transfer: DataTransfer) -> DragEvent {
        DragEvent {
            phase,
            data_transfer,
            default_prevented: false,
        }
    }

    /// A dragover event with no payload.
    pub fn drag_over() -> DragEvent {
        DragEvent::new(DragPhase::DragOver, DataTransfer::new())
    }

    /// A drop event carrying the transfer.
    pub fn dropped(data_transfer: DataTransfer) -> DragEvent {
        DragEvent::new(DragPhase::Drop, data_transfer)
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn data_transfer(&self) -> &DataTransfer {
        &self.data_transfer
    }

    /// Marks the event as handled by its target.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_data_transfer() {
        let mut transfer = DataTransfer::with_text("kick");
        assert_eq!(Some("kick"), transfer.text());
        assert!(transfer.files().is_empty());

        transfer.add_file(PathBuf::from("snare.wav"));
        transfer.set_data(TEXT_PLAIN, "hat");
        assert_eq!(Some("hat"), transfer.get_data(TEXT_PLAIN));
        assert_eq!(&[PathBuf::from("snare.wav")], transfer.files());
        assert_eq!(None, transfer.get_data("text/uri-list"));
    }

    #[test]
    fn test_prevent_default() {
        let mut event = DragEvent::drag_over();
        assert_eq!(DragPhase::DragOver, event.phase());
        assert!(!event.default_prevented());
        event.prevent_default();
        assert!(event.default_prevented());
    }
}
