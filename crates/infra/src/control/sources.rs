//! Control sources: fixed readings and a watched readings file

use crossbeam::channel::{unbounded, Receiver, Sender};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tonestack_core::domain::{ControlReadings, ControlSource};
use tracing::{debug, info, warn};

/// Errors raised while setting up a control source
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid readings file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Readings that never change after startup
#[derive(Debug, Clone)]
pub struct FixedControls {
    pending: Option<ControlReadings>,
}

impl FixedControls {
    pub fn new(readings: ControlReadings) -> Self {
        Self {
            pending: Some(readings),
        }
    }
}

impl ControlSource for FixedControls {
    fn poll(&mut self) -> Option<ControlReadings> {
        self.pending.take()
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}

/// Parse a readings file: TOML with optional `bass`, `mid` and `treble` keys
pub fn parse_readings(text: &str) -> Result<ControlReadings, ControlError> {
    Ok(toml::from_str(text)?)
}

fn read_readings(path: &Path) -> Result<ControlReadings, ControlError> {
    let text = std::fs::read_to_string(path)?;
    parse_readings(&text)
}

/// Readings taken from a TOML file, re-read whenever it changes
///
/// The file is read on the watcher's thread; `poll` only drains a channel.
/// A file that fails to parse is logged and skipped, so the previous
/// readings stay in effect.
pub struct FileControls {
    path: PathBuf,
    receiver: Receiver<ControlReadings>,
    _watcher: RecommendedWatcher,
}

impl FileControls {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ControlError> {
        let path: PathBuf = path.into();
        let (sender, receiver) = unbounded();

        // Watch the directory: editors often replace the file instead of writing it
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let target = path.clone();
        let watch_sender = sender.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                    ) {
                        return;
                    }
                    if event.paths.iter().any(|p| p.file_name() == target.file_name()) {
                        reload(&target, &watch_sender);
                    }
                }
                Err(e) => warn!("Readings watcher error: {}", e),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        if path.exists() {
            reload(&path, &sender);
        } else {
            warn!(path = %path.display(), "Readings file does not exist yet");
        }

        info!(path = %path.display(), "Watching readings file");

        Ok(Self {
            path,
            receiver,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn reload(path: &Path, sender: &Sender<ControlReadings>) {
    match read_readings(path) {
        Ok(readings) => {
            debug!(path = %path.display(), "Readings file reloaded");
            let _ = sender.send(readings);
        }
        Err(e) => warn!(path = %path.display(), error = %e, "Ignoring readings file"),
    }
}

impl ControlSource for FileControls {
    /// Latest readings since the previous poll
    fn poll(&mut self) -> Option<ControlReadings> {
        self.receiver.try_iter().last()
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
