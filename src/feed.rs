//! Receipt-printer effect: a sequential feed where each image emerges from
//! above the viewport and pushes the whole column down by its own height.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::manifest::FeedList;
use crate::source::{ImageDimensions, ImageSource, LoadStatus, LoadTicket};
use crate::surface::{Surface, SurfaceCommand};
use crate::{FeedConfig, Viewport};

/// A feed image currently on the surface
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub id: u64,
    pub name: String,
    /// Column position of the top edge, before displacement
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

enum FeedPhase {
    /// Waiting for the next image to decode
    Loading { ticket: LoadTicket },
    /// The column is travelling down by the newest image's height
    Advancing { remaining_px: f64 },
    /// Post-advance rest before the next request
    Pausing { remaining_ms: f64 },
    /// List exhausted
    Done,
}

/// The feed engine.
///
/// Images are delivered strictly one at a time: load, slide the whole
/// column down by the new image's scaled height, rest, repeat. A failed
/// load skips to the next filename instead of stalling the feed. At most
/// one phase transition happens per [`ReceiptFeed::tick`].
pub struct ReceiptFeed {
    config: FeedConfig,
    source: Arc<dyn ImageSource>,
    surface: Arc<dyn Surface>,
    list: FeedList,
    items: Vec<FeedItem>,
    cursor: usize,
    displacement: f64,
    delivered: usize,
    phase: FeedPhase,
    next_id: u64,
    initialized: bool,
    last_status: Option<String>,
}

impl ReceiptFeed {
    pub fn new(
        config: FeedConfig,
        source: Arc<dyn ImageSource>,
        surface: Arc<dyn Surface>,
    ) -> Result<Self> {
        if config.display_width <= 0.0 {
            return Err(Error::ConfigError("display_width must be positive".into()));
        }
        if config.speed <= 0.0 {
            return Err(Error::ConfigError("speed must be positive".into()));
        }
        Ok(Self {
            config,
            source,
            surface,
            list: FeedList::default(),
            items: Vec::new(),
            cursor: 0,
            displacement: 0.0,
            delivered: 0,
            phase: FeedPhase::Done,
            next_id: 1,
            initialized: false,
            last_status: None,
        })
    }

    /// Fetch the feed list and request the first image.
    ///
    /// List failures are fatal and reported on the surface status line;
    /// individual image failures later are recoverable.
    pub fn initialize(&mut self, list_location: &str) -> Result<()> {
        self.set_status("Initializing receipt feed...");
        info!("Loading feed list from {}", list_location);

        let list = match FeedList::fetch(list_location, self.config.load_timeout_ms) {
            Ok(list) => list,
            Err(e) => {
                error!("Feed list load failed: {}", e);
                self.set_status(&format!("Error: {}", e));
                return Err(e);
            }
        };
        self.initialize_with(list);
        Ok(())
    }

    /// Initialize from an already parsed feed list
    pub fn initialize_with(&mut self, list: FeedList) {
        info!(
            "Feed list ready with {} entries, images from {}",
            list.len(),
            self.source.describe()
        );
        self.set_status(&format!("Loaded {} images", list.len()));
        self.list = list;
        self.initialized = true;
        self.phase = self.request_next();
    }

    /// Advance the feed by `elapsed_ms` of wall-clock time.
    ///
    /// Never blocks: a pending load leaves the phase unchanged until it
    /// resolves. A zero elapse changes nothing mid-motion.
    pub fn tick(&mut self, elapsed_ms: f64, viewport: Viewport) {
        if !self.initialized {
            return;
        }
        let phase = std::mem::replace(&mut self.phase, FeedPhase::Done);
        self.phase = self.step(phase, elapsed_ms, viewport);
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    /// Total downward travel of the column, the sum of the scaled heights
    /// delivered so far
    pub fn displacement(&self) -> f64 {
        self.displacement
    }

    /// Number of images placed over the feed's lifetime, including
    /// reclaimed ones
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True once every filename has been delivered or skipped
    pub fn is_done(&self) -> bool {
        self.initialized && matches!(self.phase, FeedPhase::Done)
    }

    fn step(&mut self, phase: FeedPhase, elapsed_ms: f64, viewport: Viewport) -> FeedPhase {
        match phase {
            FeedPhase::Loading { ticket } => match ticket.poll() {
                LoadStatus::Pending => FeedPhase::Loading { ticket },
                LoadStatus::Ready(dims) => {
                    let name = ticket.key().to_string();
                    let height = self.deliver(&name, dims, viewport);
                    FeedPhase::Advancing {
                        remaining_px: height,
                    }
                }
                LoadStatus::Failed(e) => {
                    warn!("Failed to load {}: {}, skipping", ticket.key(), e);
                    self.request_next()
                }
                LoadStatus::TimedOut => {
                    warn!(
                        "Load of {} timed out after {}ms, skipping",
                        ticket.key(),
                        ticket.timeout_ms()
                    );
                    self.request_next()
                }
            },
            FeedPhase::Advancing { remaining_px } => {
                let travel = (self.config.speed * elapsed_ms / 1000.0).min(remaining_px);
                if travel > 0.0 {
                    self.displacement += travel;
                    self.surface.apply(SurfaceCommand::Scroll {
                        y: -self.displacement,
                    });
                }
                let remaining = remaining_px - travel;
                if remaining > 0.0 {
                    FeedPhase::Advancing {
                        remaining_px: remaining,
                    }
                } else {
                    self.reclaim(viewport);
                    FeedPhase::Pausing {
                        remaining_ms: self.config.pause_ms,
                    }
                }
            }
            FeedPhase::Pausing { remaining_ms } => {
                let remaining = remaining_ms - elapsed_ms;
                if remaining > 0.0 {
                    FeedPhase::Pausing {
                        remaining_ms: remaining,
                    }
                } else {
                    self.request_next()
                }
            }
            FeedPhase::Done => FeedPhase::Done,
        }
    }

    fn request_next(&mut self) -> FeedPhase {
        match self.list.get(self.cursor) {
            Some(name) => {
                let name = name.to_string();
                self.cursor += 1;
                debug!("Requesting feed image {}", name);
                let ticket = self
                    .source
                    .request(&name, Duration::from_millis(self.config.load_timeout_ms));
                FeedPhase::Loading { ticket }
            }
            None => {
                info!("Feed complete after {} images", self.delivered);
                self.set_status("Feed complete");
                FeedPhase::Done
            }
        }
    }

    // Place the new image above the viewport so that its own advance
    // leaves it flush with the top edge.
    fn deliver(&mut self, name: &str, dims: ImageDimensions, viewport: Viewport) -> f64 {
        let width = self.config.display_width;
        let scale = width / f64::from(dims.width.max(1));
        let height = f64::from(dims.height) * scale;
        let left = (f64::from(viewport.width) - width) / 2.0;
        let top = -height - self.displacement;

        let id = self.next_id;
        self.next_id += 1;
        debug!("Feed item #{} {} enters at top {:.1}", id, name, top);
        self.surface.apply(SurfaceCommand::Place {
            id,
            key: name.to_string(),
            left,
            top,
            width,
            height,
        });
        self.items.push(FeedItem {
            id,
            name: name.to_string(),
            top,
            left,
            width,
            height,
        });
        self.delivered += 1;
        height
    }

    // Drop items whose top edge has travelled past the viewport bottom by
    // the reclaim margin.
    fn reclaim(&mut self, viewport: Viewport) {
        let floor = f64::from(viewport.height) + self.config.reclaim_margin;
        let displacement = self.displacement;
        let mut removed = Vec::new();
        self.items.retain(|item| {
            if item.top + displacement > floor {
                removed.push(item.id);
                false
            } else {
                true
            }
        });
        for id in removed {
            debug!("Reclaimed feed item #{}", id);
            self.surface.apply(SurfaceCommand::Remove { id });
        }
    }

    fn set_status(&mut self, text: &str) {
        if self.last_status.as_deref() == Some(text) {
            return;
        }
        self.last_status = Some(text.to_string());
        self.surface.apply(SurfaceCommand::Status {
            text: text.to_string(),
        });
    }
}
