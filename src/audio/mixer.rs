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
// Voice mixing shared by the cpal output callback and tests.
use super::Clip;

/// One independent playback of a clip.
pub struct Voice {
    /// The clip being played.
    clip: Clip,
    /// The next frame to read from the clip.
    position: usize,
}

impl Voice {
    /// Creates a voice positioned at the start of the clip.
    pub fn new(clip: Clip) -> Voice {
        Voice {
            clip,
            position: 0,
        }
    }

    /// Returns true once every frame has been mixed.
    pub fn is_finished(&self) -> bool {
        self.position >= self.clip.frames()
    }
}

/// Sums active voices into an interleaved output buffer.
pub struct Mixer {
    /// Voices currently playing.
    voices: Vec<Voice>,
    /// Number of output channels.
    num_channels: u16,
}

impl Mixer {
    /// Creates a new mixer.
    pub fn new(num_channels: u16) -> Mixer {
        Mixer {
            voices: Vec::new(),
            num_channels: num_channels.max(1),
        }
    }

    /// Adds a voice. Voices are never stolen; each runs until its clip ends.
    pub fn add(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    /// Returns the number of voices still playing.
    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// Mixes into the interleaved output buffer, overwriting it. Output channel
    /// `c` reads clip channel `c % clip_channels`, so mono clips fill every
    /// output. Finished voices are dropped.
    pub fn mix_into(&mut self, output: &mut [f32]) {
        output.fill(0.0);

        let channels = self.num_channels as usize;
        let frames = output.len() / channels;

        for voice in self.voices.iter_mut() {
            let clip_channels = voice.clip.channel_count() as usize;
            let data = voice.clip.data();
            let available = voice.clip.frames().saturating_sub(voice.position);
            let to_mix = available.min(frames);

            for frame in 0..to_mix {
                let source = (voice.position + frame) * clip_channels;
                let out = &mut output[frame * channels..(frame + 1) * channels];
                for (c, sample) in out.iter_mut().enumerate() {
                    *sample += data[source + c % clip_channels];
                }
            }
            voice.position += to_mix;
        }

        self.voices.retain(|voice| !voice.is_finished());

        for sample in output.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_single_voice() {
        let mut mixer = Mixer::new(2);
        mixer.add(Voice::new(Clip::new(vec![0.5, 0.8], 1, 44100)));

        let mut output = vec![1.0; 6];
        mixer.mix_into(&mut output);

        // Mono clip fans out to both channels, remaining frame is silence.
        assert_eq!(vec![0.5, 0.5, 0.8, 0.8, 0.0, 0.0], output);
        assert_eq!(0, mixer.active());
    }

    #[test]
    fn test_overlapping_voices() {
        let mut mixer = Mixer::new(2);
        mixer.add(Voice::new(Clip::new(vec![0.5, 0.3, 0.5, 0.3], 2, 44100)));
        mixer.add(Voice::new(Clip::new(vec![0.2, 0.1], 2, 44100)));

        let mut output = vec![0.0; 2];
        mixer.mix_into(&mut output);
        assert!((output[0] - 0.7).abs() < 1e-6);
        assert!((output[1] - 0.4).abs() < 1e-6);
        assert_eq!(1, mixer.active());

        mixer.mix_into(&mut output);
        assert_eq!(vec![0.5, 0.3], output);
        assert_eq!(0, mixer.active());
    }

    #[test]
    fn test_voice_spans_buffers() {
        let mut mixer = Mixer::new(1);
        mixer.add(Voice::new(Clip::new(vec![0.1, 0.2, 0.3, 0.4, 0.5], 1, 44100)));

        let mut output = vec![0.0; 2];
        mixer.mix_into(&mut output);
        assert_eq!(vec![0.1, 0.2], output);
        mixer.mix_into(&mut output);
        assert_eq!(vec![0.3, 0.4], output);
        assert_eq!(1, mixer.active());
        mixer.mix_into(&mut output);
        assert_eq!(vec![0.5, 0.0], output);
        assert_eq!(0, mixer.active());
    }

    #[test]
    fn test_output_is_clamped() {
        let mut mixer = Mixer::new(1);
        for _ in 0..4 {
            mixer.add(Voice::new(Clip::new(vec![0.9], 1, 44100)));
        }

        let mut output = vec![0.0; 1];
        mixer.mix_into(&mut output);
        assert_eq!(vec![1.0], output);
    }
}
