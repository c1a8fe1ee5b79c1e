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

/// MIME type used when the extension doesn't identify an audio format.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// The raw payload of a stored sample.
#[derive(Clone, PartialEq, Eq)]
pub struct SampleFile {
    /// The MIME type reported for the payload. Used as a decoding hint.
    pub mime: String,
    /// The encoded audio bytes, exactly as they were uploaded.
    pub bytes: Vec<u8>,
}

/// One durable record in the sample store.
#[derive(Clone, PartialEq, Eq)]
pub struct SampleEntry {
    /// The primary key.
    pub name: String,
    /// Byte length of the payload.
    pub size: u64,
    /// The payload itself.
    pub file: SampleFile,
}

impl SampleEntry {
    /// Creates a new entry. The size is taken from the payload.
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> SampleEntry {
        SampleEntry {
            name: name.into(),
            size: bytes.len() as u64,
            file: SampleFile {
                mime: mime.into(),
                bytes,
            },
        }
    }

    /// Creates an entry for a dropped file, deriving the name and MIME type from
    /// its file name. Returns None if no name can be derived.
    pub fn from_file_name(file_name: &str, bytes: Vec<u8>) -> Option<SampleEntry> {
        let name = derive_name(file_name)?;
        Some(SampleEntry::new(name, mime_for_path(file_name), bytes))
    }
}

/// The metadata of a stored sample, without its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleInfo {
    pub name: String,
    pub size: u64,
    pub mime: String,
}

impl fmt::Debug for SampleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleEntry")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime", &self.file.mime)
            .finish()
    }
}

impl fmt::Debug for SampleFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleFile")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Derives a sample name from a file name by removing the final extension.
///
/// Only the last extension is removed, so `snare.01.mp3` becomes `snare.01`.
/// A leading dot doesn't start an extension and a trailing dot isn't one.
pub fn derive_name(file_name: &str) -> Option<&str> {
    let file_name = Path::new(file_name).file_name()?.to_str()?;
    let name = match file_name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < file_name.len() => &file_name[..idx],
        _ => file_name,
    };

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Guesses the MIME type of an audio file from its extension.
pub fn mime_for_path(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("wav") | Some("wave") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("m4a") | Some("aac") => "audio/aac",
        Some("aif") | Some("aiff") => "audio/aiff",
        _ => DEFAULT_MIME,
    }
}
