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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const PRESS: &str = "press";
const DROP: &str = "drop";
const DRAG: &str = "drag";
const UPLOAD: &str = "upload";
const LIBRARY: &str = "library";
const PADS: &str = "pads";
const QUIT: &str = "quit";

/// A controller that drives the sampler from lines typed on stdin.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one command and forwards it. Returns false once the input is
    /// exhausted or the user quits.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <pad>, {} <pad> <file>, {} <name> <pad>, {} <files>, {}, {}, {}): ",
            PRESS, DROP, DRAG, UPLOAD, LIBRARY, PADS, QUIT,
        )?;
        writer.flush()?;

        let mut input: String = String::default();
        let event = if reader.read_line(&mut input)? == 0 {
            Event::Quit
        } else {
            match parse(&input) {
                Some(event) => event,
                None => {
                    if !input.trim().is_empty() {
                        warn!(input = input.trim(), "Unrecognized input");
                    }
                    return Ok(true);
                }
            }
        };

        let keep_going = event != Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(keep_going)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Parses one line of input into an event.
pub fn parse(input: &str) -> Option<Event> {
    let input = input.trim();
    let (command, rest) = input
        .split_once(char::is_whitespace)
        .map(|(command, rest)| (command, rest.trim()))
        .unwrap_or((input, ""));

    match command.to_lowercase().as_str() {
        PRESS => Some(Event::Press(rest.parse().ok()?)),
        DROP => {
            let (pad, path) = rest.split_once(char::is_whitespace)?;
            let path = path.trim();
            if path.is_empty() {
                return None;
            }
            Some(Event::DropFile {
                pad: pad.parse().ok()?,
                path: PathBuf::from(path),
            })
        }
        DRAG => {
            let (name, pad) = rest.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Event::Drag {
                name: name.to_string(),
                pad: pad.parse().ok()?,
            })
        }
        UPLOAD => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                return None;
            }
            Some(Event::Upload(paths))
        }
        LIBRARY if rest.is_empty() => Some(Event::Library),
        PADS if rest.is_empty() => Some(Event::Pads),
        QUIT if rest.is_empty() => Some(Event::Quit),
        _ => None,
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}
