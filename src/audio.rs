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
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::{error::Error, fmt, sync::Arc};

use crate::config;

pub mod clip;
pub mod cpal;
pub mod decode;
pub mod mixer;
pub mod mock;

pub use clip::Clip;
pub use decode::{decode, DecodeError};

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// An audio output that plays one-shot clips. Every call to play starts an
/// independent voice that overlaps anything already playing.
pub trait Device: Any + fmt::Display + Send + Sync {
    /// Starts a voice for the clip and returns its ID without waiting for it to
    /// finish.
    fn play(&self, clip: Clip) -> Result<u64, Box<dyn Error + Send + Sync>>;

    /// The output sample rate. Clips are decoded to this rate.
    fn sample_rate(&self) -> u32;

    /// The output channel count.
    fn channels(&self) -> u16;

    /// The number of voices still playing.
    fn active_voices(&self) -> usize;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Returns a fresh voice ID.
pub(crate) fn next_voice_id() -> u64 {
    NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the configured device. Names starting with "mock" get a mock device.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, config.sample_rate())));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_get_mock_device() -> Result<(), Box<dyn Error>> {
        let mut config = config::Audio::new("mock-drums");
        let device = get_device(&config)?;
        assert_eq!("mock-drums (Mock)", device.to_string());
        assert_eq!(mock::MOCK_SAMPLE_RATE, device.sample_rate());
        assert!(device.to_mock().is_ok());

        config = config::Audio::new("mock");
        assert_eq!(2, get_device(&config)?.channels());
        Ok(())
    }
}
