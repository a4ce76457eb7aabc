/// Seams to the lamp's animation subsystem.
///
/// The motor worker that actually plays recordings lives outside this crate;
/// it is reached through `AnimationDispatcher` (fire-and-forget commands) and
/// `RecordingStore` (which recordings exist on disk).
use std::path::{Path, PathBuf};

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;

/// Recording file extension written by the recorder.
const RECORDING_EXT: &str = "csv";

/// Look up pre-authored choreographies by name.
pub trait RecordingStore: Send + Sync {
    /// `Ok(None)` when no recording of that name exists.
    fn resolve(&self, name: &str) -> Result<Option<PathBuf>>;

    /// All recording names, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Submit `(command, argument)` pairs to the animation worker.
pub trait AnimationDispatcher: Send + Sync {
    fn dispatch<'a>(&'a self, command: &'a str, argument: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// The broader control surface the animation tools need.
pub trait AnimationControl: AnimationDispatcher {
    fn available_recordings(&self) -> Result<Vec<String>>;

    /// Operator is driving the motors by hand; tool-triggered animations are dropped.
    fn manual_control_override(&self) -> bool {
        false
    }

    fn enable_modifier(&self, name: &str) -> Result<()>;
    fn disable_modifier(&self, name: &str) -> Result<()>;

    /// Returns `Ok(false)` when the music modifier is not installed.
    fn set_music_modifier(&self, amplitude: f32, beat_divisor: f32) -> Result<bool>;
}

// ── Directory-backed recording store ──────────────────────────────

/// Recordings stored as `<dir>/<name>.csv`.
pub struct DirRecordingStore {
    dir: PathBuf,
}

impl DirRecordingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordingStore for DirRecordingStore {
    fn resolve(&self, name: &str) -> Result<Option<PathBuf>> {
        // Names come from the LLM; refuse anything that could leave the directory.
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Ok(None);
        }
        let path = self.dir.join(format!("{name}.{RECORDING_EXT}"));
        Ok(path.is_file().then_some(path))
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORDING_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// ── Channel dispatcher ────────────────────────────────────────────

/// A command queued for the animation worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationCommand {
    pub command: String,
    pub argument: String,
}

/// Dispatcher that queues commands on a bounded channel. Never waits for the
/// worker: a full queue or a stopped worker is an immediate error.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<AnimationCommand>,
}

impl ChannelDispatcher {
    /// Returns the dispatcher and the receiving end for the worker.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AnimationCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl AnimationDispatcher for ChannelDispatcher {
    fn dispatch<'a>(&'a self, command: &'a str, argument: &'a str) -> BoxFuture<'a, Result<()>> {
        let cmd = AnimationCommand {
            command: command.to_string(),
            argument: argument.to_string(),
        };
        let sent = self.tx.try_send(cmd);
        async move {
            sent.map_err(|e| match e {
                mpsc::error::TrySendError::Full(c) => {
                    anyhow::anyhow!("animation queue full, dropped {} {}", c.command, c.argument)
                }
                mpsc::error::TrySendError::Closed(_) => {
                    anyhow::anyhow!("animation worker stopped")
                }
            })
        }
        .boxed()
    }
}
