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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use tracing::{debug, error, info, span, Level};

use super::mixer::{Mixer, Voice};
use super::{Clip, Device as AudioDevice};
use crate::config;

/// How often the output thread checks whether it should shut down.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// An output device as reported by cpal.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    /// The device name.
    pub name: String,
    /// The name of the host the device belongs to.
    pub host: String,
    /// The most output channels any supported config offers.
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// An open cpal output stream with a mixer behind it.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The stream's sample rate.
    sample_rate: u32,
    /// The stream's channel count.
    channels: u16,
    /// Sends new voices to the stream callback.
    voice_tx: crossbeam_channel::Sender<Voice>,
    /// Voices the callback was still mixing at its last run.
    active: Arc<AtomicUsize>,
    /// Tells the output thread to drop the stream and exit.
    shutdown: Arc<AtomicBool>,
    /// Handle to the output thread, which owns the stream.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists the output devices of every available host.
    pub fn list() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(DeviceInfo {
                        name: device.name()?,
                        host: host_id.name().to_string(),
                        max_channels,
                    });
                }
            }
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    /// Opens the configured device and starts its output stream.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let (host_id, device) = find_device(config.device())?;
        let name = device.name()?;

        let default_config = device.default_output_config()?;
        let sample_format = default_config.sample_format();
        let channels = default_config.channels();
        let sample_rate = config
            .sample_rate()
            .unwrap_or(default_config.sample_rate().0);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (voice_tx, voice_rx) = crossbeam_channel::unbounded::<Voice>();
        let active = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        // cpal streams aren't Send, so the stream lives and dies on this thread.
        let output_thread = {
            let active = active.clone();
            let shutdown = shutdown.clone();
            let name = name.clone();
            thread::Builder::new()
                .name("sampledeck-output".to_string())
                .spawn(move || {
                    let span = span!(Level::INFO, "output stream", device = %name);
                    let _enter = span.enter();

                    let mixer = Mixer::new(channels);
                    let stream = match build_stream(
                        &device,
                        sample_format,
                        &stream_config,
                        mixer,
                        voice_rx,
                        active,
                    ) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.to_string()));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                    info!(sample_rate, channels, "Output stream started");
                    let _ = ready_tx.send(Ok(()));

                    while !shutdown.load(Ordering::Relaxed) {
                        thread::sleep(SHUTDOWN_POLL);
                    }
                    drop(stream);
                    debug!("Output stream stopped");
                })?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("unable to start output stream: {}", e).into()),
            Err(_) => return Err("output thread exited before the stream started".into()),
        }

        Ok(Device {
            name,
            host_id,
            sample_rate,
            channels,
            voice_tx,
            active,
            shutdown,
            output_thread: Some(output_thread),
        })
    }
}

impl AudioDevice for Device {
    fn play(&self, clip: Clip) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let clip = clip.resample(self.sample_rate);
        let voice_id = super::next_voice_id();
        info!(
            device = self.name,
            voice_id,
            duration_ms = clip.duration().as_millis(),
            "Playing clip."
        );

        self.voice_tx
            .send(Voice::new(clip))
            .map_err(|_| "output stream is closed")?;
        Ok(voice_id)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn active_voices(&self) -> usize {
        self.active.load(Ordering::Relaxed) + self.voice_tx.len()
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Finds an output device by name. "default" is the default host's default
/// output device.
fn find_device(name: &str) -> Result<(cpal::HostId, cpal::Device), Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    if name == config::audio::DEFAULT_DEVICE {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no default output device")?;
        return Ok((host.id(), device));
    }

    for host_id in cpal::available_hosts() {
        let Ok(devices) = cpal::host_from_id(host_id)?.output_devices() else {
            continue;
        };
        for device in devices {
            if device.name().map(|n| n.trim() == name).unwrap_or(false) {
                return Ok((host_id, device));
            }
        }
    }

    Err(format!("no device found with name {}", name).into())
}

/// Builds an output stream in the device's native sample format.
fn build_stream(
    device: &cpal::Device,
    sample_format: cpal::SampleFormat,
    config: &cpal::StreamConfig,
    mixer: Mixer,
    voice_rx: crossbeam_channel::Receiver<Voice>,
    active: Arc<AtomicUsize>,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            build_typed_stream::<f32>(device, config, mixer, voice_rx, active)
        }
        cpal::SampleFormat::I16 => {
            build_typed_stream::<i16>(device, config, mixer, voice_rx, active)
        }
        cpal::SampleFormat::U16 => {
            build_typed_stream::<u16>(device, config, mixer, voice_rx, active)
        }
        cpal::SampleFormat::I32 => {
            build_typed_stream::<i32>(device, config, mixer, voice_rx, active)
        }
        other => return Err(format!("unsupported sample format {:?}", other).into()),
    }?;
    Ok(stream)
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
    voice_rx: crossbeam_channel::Receiver<Voice>,
    active: Arc<AtomicUsize>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(voice) = voice_rx.try_recv() {
                mixer.add(voice);
            }

            // Only grows when the host hands us a bigger buffer than before.
            scratch.resize(data.len(), 0.0);
            mixer.mix_into(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
            active.store(mixer.active(), Ordering::Relaxed);
        },
        |err| error!(err = %err, "Output stream error"),
        None,
    )
}
