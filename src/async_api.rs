use crate::error::{Error, Result};
use crate::source::ImageSource;
use crate::surface::Surface;
use crate::wall::ImageWall;
use crate::{ControlEvent, Viewport, WallConfig, WallSnapshot};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Initialize(String, Viewport, oneshot::Sender<Result<()>>),
    Tick(f64, Viewport, oneshot::Sender<()>),
    Control(ControlEvent, Viewport, oneshot::Sender<()>),
    Snapshot(oneshot::Sender<WallSnapshot>),
    Close(oneshot::Sender<()>),
}

/// An async-friendly wall abstraction backed by a dedicated worker thread.
///
/// The worker thread owns a synchronous `ImageWall` instance and executes
/// commands sent from async tasks so callers can use an async interface
/// without requiring the engine to be `Send` across threads.
#[derive(Clone)]
pub struct WallHandle {
    cmd_tx: Sender<Command>,
}

impl WallHandle {
    /// Create a new wall (spawns a background thread that owns the engine).
    pub async fn new(
        config: WallConfig,
        source: Arc<dyn ImageSource>,
        surface: Arc<dyn Surface>,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            // Build the engine on the worker thread
            let mut wall = match ImageWall::new(config, source, surface) {
                Ok(w) => w,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            // Signal successful creation (no-op when previous send returned Err)
            let _ = init_tx.send(Ok(()));

            // Command loop
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Initialize(location, viewport, resp) => {
                        let res = wall.initialize(&location, viewport);
                        let _ = resp.send(res);
                    }
                    Command::Tick(elapsed_ms, viewport, resp) => {
                        wall.tick(elapsed_ms, viewport);
                        let _ = resp.send(());
                    }
                    Command::Control(event, viewport, resp) => {
                        wall.handle_control(event, viewport);
                        let _ = resp.send(());
                    }
                    Command::Snapshot(resp) => {
                        let _ = resp.send(wall.snapshot());
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(());
                        break;
                    }
                }
            }
        });

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Fetch the manifest and place the initial images
    pub async fn initialize(&self, manifest_location: &str, viewport: Viewport) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Initialize(
            manifest_location.to_string(),
            viewport,
            tx,
        ));
        rx.await
            .map_err(|e| Error::Other(format!("Initialize canceled: {}", e)))?
    }

    /// Advance the wall by `elapsed_ms` of wall-clock time
    pub async fn tick(&self, elapsed_ms: f64, viewport: Viewport) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Tick(elapsed_ms, viewport, tx));
        rx.await
            .map_err(|e| Error::Other(format!("Tick canceled: {}", e)))
    }

    /// Apply an embedder control event
    pub async fn control(&self, event: ControlEvent, viewport: Viewport) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Control(event, viewport, tx));
        rx.await
            .map_err(|e| Error::Other(format!("Control canceled: {}", e)))
    }

    /// Read the current engine state
    pub async fn snapshot(&self) -> Result<WallSnapshot> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Snapshot(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Snapshot canceled: {}", e)))
    }

    /// Shutdown the background worker
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))
    }
}
