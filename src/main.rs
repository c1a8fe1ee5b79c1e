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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sampledeck::controller::{keyboard, Controller};
use sampledeck::sampler::{DataTransfer, DragEvent, Environment, Playback, Sampler, SkipReason};
use sampledeck::store::StoreRegistry;
use sampledeck::util::format_size;
use sampledeck::{audio, config};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pad sampler with a persistent sample library."
)]
struct Cli {
    /// The path to the sampler config. Built-in defaults are used without one.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Uploads audio files into the sample library.
    Upload {
        /// The files to upload. Each is stored under its name without the extension.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Lists the samples in the library.
    List {},
    /// Plays one sample through the audio device and waits for it to finish.
    Play {
        /// The name of the sample to play.
        name: String,
    },
    /// Starts the interactive pads.
    Start {},
    /// Prints the pad layout without opening the store or the audio device.
    Render {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = config::Sampler::load(cli.config.as_deref())?;
    let registry = StoreRegistry::new(config.store().directory());

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Upload { files } => {
            let sampler = Sampler::mount(&registry, &config, Environment::Interactive, None).await?;
            let names = sampler
                .library()
                .on_drop(&mut DragEvent::dropped(DataTransfer::with_files(files)))
                .await?;
            for name in names {
                println!("Uploaded {}", name);
            }
            sampler.unmount()?;
        }
        Commands::List {} => {
            let store = registry.acquire(config.store().name(), config.store().version())?;
            let samples = store.catalog()?;

            if samples.is_empty() {
                println!("No samples in {} ({}).", store, store.path().display());
            } else {
                println!(
                    "Samples in {} ({}, count: {}):",
                    store,
                    store.path().display(),
                    samples.len()
                );
                for sample in samples {
                    println!(
                        "- {} ({}, {})",
                        sample.name,
                        sample.mime,
                        format_size(sample.size)
                    );
                }
            }
        }
        Commands::Play { name } => {
            let device = audio::get_device(config.audio())?;
            let sampler = Sampler::mount(
                &registry,
                &config,
                Environment::Interactive,
                Some(device.clone()),
            )
            .await?;

            match sampler.session().play(&name).await? {
                Playback::Started { duration, .. } => {
                    println!("Playing {} on {}", name, device);
                    tokio::time::sleep(duration).await;
                    while device.active_voices() > 0 {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
                Playback::Skipped(SkipReason::NotFound) => {
                    println!("No sample named {}.", name)
                }
                Playback::Skipped(SkipReason::NoAudio) => println!("No audio output available."),
            }
            sampler.unmount()?;
        }
        Commands::Start {} => {
            let device = audio::get_device(config.audio())?;
            let sampler =
                Sampler::mount(&registry, &config, Environment::Interactive, Some(device)).await?;
            let driver = Arc::new(keyboard::Driver::new());

            Controller::new(sampler, driver).join().await?.unmount()?;
        }
        Commands::Render {} => {
            let sampler = Sampler::mount(&registry, &config, Environment::Prerender, None).await?;

            println!("Library: {} (v{})", config.store().name(), config.store().version());
            for pad in sampler.pads() {
                println!("{}", pad);
            }
        }
    }

    registry.release_all()?;
    Ok(())
}
