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
use std::{error::Error, fmt, sync::Arc, time::Instant};

use parking_lot::Mutex;
use tracing::info;

use super::Clip;

/// Sample rate used by mock devices unless configured otherwise.
pub const MOCK_SAMPLE_RATE: u32 = 44100;

/// Channel count of every mock device.
pub const MOCK_CHANNELS: u16 = 2;

/// A clip handed to the mock device.
#[derive(Clone, Debug)]
pub struct PlayedClip {
    /// The voice ID returned for this play.
    pub voice_id: u64,
    /// The clip that was played.
    pub clip: Clip,
    /// When play was called.
    pub started: Instant,
}

/// A mock device. Doesn't actually play anything, but remembers what it was
/// asked to play.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    played: Arc<Mutex<Vec<PlayedClip>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: Option<u32>) -> Device {
        Device {
            name: name.to_string(),
            sample_rate: sample_rate.unwrap_or(MOCK_SAMPLE_RATE),
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns every clip played so far, oldest first.
    pub fn played(&self) -> Vec<PlayedClip> {
        self.played.lock().clone()
    }
}

impl super::Device for Device {
    fn play(&self, clip: Clip) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let clip = clip.resample(self.sample_rate);
        let voice_id = super::next_voice_id();
        info!(
            device = self.name,
            voice_id,
            duration_ms = clip.duration().as_millis(),
            "Playing clip (mock)."
        );

        self.played.lock().push(PlayedClip {
            voice_id,
            clip,
            started: Instant::now(),
        });
        Ok(voice_id)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        MOCK_CHANNELS
    }

    /// Voices count as active until their clip's duration has elapsed.
    fn active_voices(&self) -> usize {
        self.played
            .lock()
            .iter()
            .filter(|played| played.started.elapsed() < played.clip.duration())
            .count()
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::audio::Device as _;

    use super::*;

    #[test]
    fn test_play_records_voices() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device", None);
        let clip = Clip::new(vec![0.0; 44100 * 10], 1, MOCK_SAMPLE_RATE);

        let first = device.play(clip.clone()).map_err(|e| e.to_string())?;
        let second = device.play(clip).map_err(|e| e.to_string())?;

        assert_ne!(first, second);
        let played = device.played();
        assert_eq!(2, played.len());
        assert_eq!(first, played[0].voice_id);
        assert_eq!(second, played[1].voice_id);
        assert_eq!(2, device.active_voices());
        Ok(())
    }

    #[test]
    fn test_short_clip_ends() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device", Some(48000));
        device
            .play(Clip::new(vec![0.0; 48], 1, 48000))
            .map_err(|e| e.to_string())?;

        crate::testutil::eventually(|| device.active_voices() == 0, "voice never ended");
        assert_eq!(48000, device.sample_rate());
        Ok(())
    }
}
