//! Output projection.
//!
//! The engines never touch a display. They describe what happened as a
//! stream of [`SurfaceCommand`]s and an embedder maps the stream onto its
//! own scene (DOM nodes, sprites, terminal cells). Image positions are page
//! coordinates; scrolling and recentering are container transforms.

use std::sync::Mutex;

use sha2::{Digest, Sha256};

/// One projection step emitted by an engine
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    /// A new image enters the scene
    Place {
        id: u64,
        key: String,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
    },
    /// An image leaves the scene
    Remove { id: u64 },
    /// Vertical container transform; positive values move content up
    Scroll { y: f64 },
    /// Horizontal container transform applied for recentering
    Recenter { x: f64 },
    /// Status line replacing any previous one
    Status { text: String },
}

impl SurfaceCommand {
    /// Stable single-line rendering used for logs and stream digests
    pub fn describe(&self) -> String {
        match self {
            SurfaceCommand::Place {
                id,
                key,
                left,
                top,
                width,
                height,
            } => format!(
                "place #{} {} at ({:.2}, {:.2}) size {:.2}x{:.2}",
                id, key, left, top, width, height
            ),
            SurfaceCommand::Remove { id } => format!("remove #{}", id),
            SurfaceCommand::Scroll { y } => format!("scroll {:.2}", y),
            SurfaceCommand::Recenter { x } => format!("recenter {:.2}", x),
            SurfaceCommand::Status { text } => format!("status {}", text),
        }
    }
}

/// Receives engine output
pub trait Surface: Send + Sync {
    fn apply(&self, command: SurfaceCommand);
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn apply(&self, _command: SurfaceCommand) {}
}

/// Records the full command stream in memory for tests and goldens
#[derive(Default)]
pub struct RecordingSurface {
    commands: Mutex<Vec<SurfaceCommand>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the stream so far
    pub fn commands(&self) -> Vec<SurfaceCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().unwrap().is_empty()
    }

    /// Status texts in emission order
    pub fn statuses(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                SurfaceCommand::Status { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids placed and not yet removed, in ascending order
    pub fn live_ids(&self) -> Vec<u64> {
        let mut live = Vec::new();
        for command in self.commands.lock().unwrap().iter() {
            match command {
                SurfaceCommand::Place { id, .. } => live.push(*id),
                SurfaceCommand::Remove { id } => live.retain(|l| l != id),
                _ => {}
            }
        }
        live.sort_unstable();
        live
    }

    /// Hex digest of the stream; equal inputs give equal digests
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for command in self.commands.lock().unwrap().iter() {
            hasher.update(command.describe().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

impl Surface for RecordingSurface {
    fn apply(&self, command: SurfaceCommand) {
        self.commands.lock().unwrap().push(command);
    }
}
