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
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Instrument, Level};

use crate::sampler::{DataTransfer, DragEvent, Playback, Sampler, SamplerError};

pub mod keyboard;

/// Controller events that will trigger behavior in the sampler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Presses the pad at the index.
    Press(usize),

    /// Drops a file onto a pad, uploading it and rebinding the pad.
    DropFile { pad: usize, path: PathBuf },

    /// Drags a library entry onto a pad.
    Drag { name: String, pad: usize },

    /// Drops files onto the library.
    Upload(Vec<PathBuf>),

    /// Prints the library.
    Library,

    /// Prints the pads and what they're bound to.
    Pads,

    /// Stops the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives a mounted sampler from a stream of events.
pub struct Controller {
    handle: JoinHandle<Sampler>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(sampler: Sampler, driver: Arc<dyn Driver>) -> Controller {
        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(Controller::handle_events(sampler, driver).instrument(span)),
        }
    }

    /// Waits for the controller to finish and hands the sampler back.
    pub async fn join(self) -> Result<Sampler, JoinError> {
        self.handle.await
    }

    async fn handle_events(mut sampler: Sampler, driver: Arc<dyn Driver>) -> Sampler {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(pads = sampler.pads().len(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = ?event, "Received event.");
            if event == Event::Quit {
                break;
            }

            if let Err(e) = Controller::handle_event(&mut sampler, event).await {
                error!(err = %e, "Error handling event");
            }
        }

        info!("Controller closing.");
        drop(events_rx);
        match join_handle.await {
            Ok(Err(e)) => error!(err = %e, "Event monitor failed"),
            Err(e) => error!(err = %e, "Error waiting for event monitor to stop"),
            Ok(Ok(())) => {}
        }
        sampler
    }

    async fn handle_event(sampler: &mut Sampler, event: Event) -> Result<(), SamplerError> {
        match event {
            Event::Press(index) => {
                let Some(pad) = sampler.pad_mut(index) else {
                    warn!(pad = index, "No such pad");
                    return Ok(());
                };
                match pad.press().await? {
                    Playback::Started { voice_id, duration } => info!(
                        pad = index,
                        name = pad.name(),
                        voice_id,
                        duration_ms = duration.as_millis(),
                        "Pad pressed"
                    ),
                    Playback::Skipped(reason) => {
                        info!(pad = index, name = pad.name(), reason = ?reason, "Nothing to play")
                    }
                }
            }
            Event::DropFile { pad: index, path } => {
                let Some(pad) = sampler.pad_mut(index) else {
                    warn!(pad = index, "No such pad");
                    return Ok(());
                };
                pad.on_drag_over(&mut DragEvent::drag_over())?;
                pad.on_drop(&mut DragEvent::dropped(DataTransfer::with_files(vec![path])))
                    .await?;
                println!("{}", pad);
            }
            Event::Drag { name, pad: index } => {
                let Some(transfer) = sampler.library().drag_start(&name)? else {
                    warn!(name = %name, "No such sample in the library");
                    return Ok(());
                };
                let Some(pad) = sampler.pad_mut(index) else {
                    warn!(pad = index, "No such pad");
                    return Ok(());
                };
                pad.on_drag_over(&mut DragEvent::drag_over())?;
                pad.on_drop(&mut DragEvent::dropped(transfer)).await?;
                println!("{}", pad);
            }
            Event::Upload(paths) => {
                let library = sampler.library();
                library.on_drag_over(&mut DragEvent::drag_over())?;
                let names = library
                    .on_drop(&mut DragEvent::dropped(DataTransfer::with_files(paths)))
                    .await?;
                for name in names {
                    println!("Uploaded {}", name);
                }
            }
            Event::Library => {
                for entry in sampler.library().entries()? {
                    println!("{}", entry.name);
                }
            }
            Event::Pads => {
                for pad in sampler.pads() {
                    println!("{}", pad);
                }
            }
            Event::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io;
    use std::sync::Arc;

    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::audio::{self, mock};
    use crate::config;
    use crate::sampler::{Environment, Sampler, PLACEHOLDER_NAME};
    use crate::store::StoreRegistry;
    use crate::testutil::write_wav;

    use super::{Controller, Driver, Event};

    /// Replays a fixed list of events, then stops.
    struct TestDriver {
        events: Vec<Event>,
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = self.events.clone();
            tokio::task::spawn_blocking(move || {
                for event in events {
                    events_tx
                        .blocking_send(event)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                }
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let kick = dir.path().join("kick.wav");
        let snare = dir.path().join("snare.01.wav");
        write_wav(kick.clone(), vec![vec![0.5_f32; 4410]], 44100)?;
        write_wav(snare.clone(), vec![vec![0.25_f32; 4410]], 44100)?;

        let registry = StoreRegistry::new(dir.path());
        let config = config::Sampler::new(
            config::Store::new("audio_sampler", 1, dir.path()),
            config::Audio::new("mock-device"),
            3,
        );
        let device = mock::Device::get("mock-device", None);
        let output: Arc<dyn audio::Device> = Arc::new(device.clone());
        let sampler =
            Sampler::mount(&registry, &config, Environment::Interactive, Some(output)).await?;

        let driver = Arc::new(TestDriver {
            events: vec![
                Event::Upload(vec![kick]),
                Event::Drag {
                    name: "kick".to_string(),
                    pad: 1,
                },
                Event::Drag {
                    name: "missing".to_string(),
                    pad: 0,
                },
                Event::Press(1),
                Event::Press(9),
                Event::DropFile {
                    pad: 2,
                    path: snare,
                },
                Event::Press(2),
                Event::Press(0),
                Event::Library,
                Event::Pads,
                Event::Quit,
                Event::Press(1),
            ],
        });

        let sampler = Controller::new(sampler, driver).join().await?;

        let names: Vec<&str> = sampler.pads().iter().map(|pad| pad.name()).collect();
        assert_eq!(vec![PLACEHOLDER_NAME, "kick", "snare.01"], names);
        assert_eq!(2, device.played().len());
        assert_eq!(2, sampler.library().entries()?.len());
        Ok(())
    }
}
