//! The chained-anchor wall engine.
//!
//! Each manifest entry carries two fractional anchor points. The first
//! placed image is centered in the viewport; every later one is positioned
//! so that its entry anchor lands exactly on the exit anchor of the current
//! chain tail, producing one continuous ribbon of images. A tick loop
//! advances the scroll position, keeps the chain horizontally centered, and
//! maintains a bounded working set by evicting images the scroll has left
//! behind and preloading new ones ahead of it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::layout::{self, Point};
use crate::manifest::{ImageMetadata, ImageRecord, Manifest};
use crate::source::{ImageDimensions, ImageSource, LoadStatus, LoadTicket};
use crate::surface::{Surface, SurfaceCommand};
use crate::{ControlEvent, SelectionPolicy, Viewport, WallConfig, WallSnapshot};

/// A live member of the working set
#[derive(Debug, Clone)]
pub struct PlacedImage {
    pub id: u64,
    pub key: String,
    /// Page position of the top-left corner
    pub left: f64,
    pub top: f64,
    /// Rendered dimensions after scaling
    pub width: f64,
    pub height: f64,
    /// Uniform scale applied to the natural dimensions
    pub scale: f64,
    /// Entry anchor offset from the top-left, in pixels
    pub entry: Point,
    /// Exit anchor offset from the top-left, in pixels
    pub exit: Point,
    pub metadata: ImageMetadata,
}

impl PlacedImage {
    /// Page position of the entry anchor
    pub fn entry_position(&self) -> Point {
        Point::new(self.left + self.entry.x, self.top + self.entry.y)
    }

    /// Page position of the exit anchor
    pub fn exit_position(&self) -> Point {
        Point::new(self.left + self.exit.x, self.top + self.exit.y)
    }
}

struct PendingSlot {
    ticket: LoadTicket,
    attempts_left: u32,
}

// Cap, lookahead, and batch sizes after applying the constrained profile.
struct EffectiveParams {
    max_placed: usize,
    preload_px: f64,
    batch: usize,
    initial: usize,
    snap: bool,
}

/// The wall engine.
///
/// All methods run on the caller's thread; image loads are the only
/// concurrent work and are observed by polling. [`ImageWall::initialize`]
/// may block while the first images load, the tick path never does.
pub struct ImageWall {
    config: WallConfig,
    source: Arc<dyn ImageSource>,
    surface: Arc<dyn Surface>,
    manifest: Manifest,
    placed: Vec<PlacedImage>,
    pending: Vec<PendingSlot>,
    used: HashSet<String>,
    rng: StdRng,
    next_id: u64,
    sequential_cursor: usize,
    scroll_y: f64,
    offset_x: f64,
    offset_started: bool,
    speed_index: usize,
    loading: bool,
    initialized: bool,
    last_status: Option<String>,
    last_focus: Option<u64>,
}

impl ImageWall {
    pub fn new(
        config: WallConfig,
        source: Arc<dyn ImageSource>,
        surface: Arc<dyn Surface>,
    ) -> Result<Self> {
        if config.speed_steps.is_empty() {
            return Err(Error::ConfigError("speed_steps must not be empty".into()));
        }
        if !(config.recenter_smoothing > 0.0 && config.recenter_smoothing <= 1.0) {
            return Err(Error::ConfigError(
                "recenter_smoothing must be within (0, 1]".into(),
            ));
        }
        if let Some(size) = config.display_size {
            if size <= 0.0 {
                return Err(Error::ConfigError("display_size must be positive".into()));
            }
        }
        if config.max_placed == 0 {
            return Err(Error::ConfigError("max_placed must be at least 1".into()));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            config,
            source,
            surface,
            manifest: Manifest::default(),
            placed: Vec::new(),
            pending: Vec::new(),
            used: HashSet::new(),
            rng,
            next_id: 1,
            sequential_cursor: 0,
            scroll_y: 0.0,
            offset_x: 0.0,
            offset_started: false,
            speed_index: 0,
            loading: false,
            initialized: false,
            last_status: None,
            last_focus: None,
        })
    }

    /// Fetch the manifest and place the initial set of images.
    ///
    /// Manifest failures are fatal and reported on the surface status line.
    /// Individual image failures are recoverable: the engine retries with
    /// other entries and carries on with however many placed.
    pub fn initialize(&mut self, manifest_location: &str, viewport: Viewport) -> Result<()> {
        self.set_status("Initializing image wall...");
        info!("Loading manifest from {}", manifest_location);

        let manifest = match Manifest::fetch(manifest_location, self.config.load_timeout_ms) {
            Ok(manifest) => manifest,
            Err(e) => {
                error!("Manifest load failed: {}", e);
                self.set_status(&format!("Error: {}", e));
                return Err(e);
            }
        };
        self.initialize_with(manifest, viewport)
    }

    /// Initialize from an already parsed manifest
    pub fn initialize_with(&mut self, manifest: Manifest, viewport: Viewport) -> Result<()> {
        info!(
            "Manifest ready with {} entries, images from {}",
            manifest.len(),
            self.source.describe()
        );
        self.set_status(&format!("Loaded {} image paths", manifest.len()));
        self.manifest = manifest;

        let initial = self.effective(viewport).initial;
        for _ in 0..initial {
            if self.place_with_retry(viewport).is_none() {
                break;
            }
        }

        self.initialized = true;
        Ok(())
    }

    /// Advance the wall by `elapsed_ms` of wall-clock time.
    ///
    /// Applies scrolling, recentering, the focus readout, and working-set
    /// management. Never blocks: in-flight loads are polled, not awaited.
    /// A zero elapse leaves the scroll position untouched.
    pub fn tick(&mut self, elapsed_ms: f64, viewport: Viewport) {
        if !self.initialized {
            return;
        }

        if elapsed_ms > 0.0 {
            let before = self.scroll_y;
            self.scroll_y += self.current_speed() * elapsed_ms / 1000.0;
            if self.scroll_y != before {
                self.surface.apply(SurfaceCommand::Scroll { y: self.scroll_y });
            }
        }

        self.update_recentering(viewport);
        self.update_focus(viewport);
        self.manage(viewport);
    }

    /// Enforce the working-set bound and schedule preloads.
    ///
    /// Also called from [`ImageWall::tick`]; exposed so embedders that
    /// pause scrolling can still keep the set healthy.
    pub fn manage(&mut self, viewport: Viewport) {
        if !self.initialized {
            return;
        }
        self.evict(viewport);
        self.poll_pending(viewport);
        if !self.loading && self.needs_preload(viewport) {
            self.begin_batch(viewport);
        }
    }

    /// Place one more image now, connected to the chain tail (or centered
    /// when the wall is empty). Returns the new image id, or `None` when
    /// the load failed, timed out, or the entry had no anchor points; the
    /// next call picks a different entry.
    pub fn place_next(&mut self, viewport: Viewport) -> Option<u64> {
        self.attempt_place(viewport)
    }

    /// Apply an embedder control event
    pub fn handle_control(&mut self, event: ControlEvent, viewport: Viewport) {
        match event {
            ControlEvent::CycleSpeed => {
                self.speed_index = (self.speed_index + 1) % self.config.speed_steps.len();
                let speed = self.current_speed();
                info!("Scroll speed set to {} px/s", speed);
                self.set_status(&format!("Scroll speed {} px/s", speed));
            }
            ControlEvent::LoadOne => {
                // Queued like a preload slot; the placement lands on a
                // later manage pass and the control never waits on the
                // source.
                if let Some(ticket) = self.request_selected() {
                    self.pending.push(PendingSlot {
                        ticket,
                        attempts_left: self.config.retry_attempts.max(1) - 1,
                    });
                }
            }
            ControlEvent::Cleanup => {
                self.evict(viewport);
            }
        }
    }

    pub fn placed(&self) -> &[PlacedImage] {
        &self.placed
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Accumulated scroll in pixels
    pub fn scroll_position(&self) -> f64 {
        self.scroll_y
    }

    /// Current horizontal recentering offset in pixels
    pub fn horizontal_offset(&self) -> f64 {
        self.offset_x
    }

    pub fn current_speed(&self) -> f64 {
        self.config.speed_steps[self.speed_index % self.config.speed_steps.len()]
    }

    pub fn snapshot(&self) -> WallSnapshot {
        WallSnapshot {
            placed: self.placed.len(),
            pending: self.pending.len(),
            scroll_y: self.scroll_y,
            offset_x: self.offset_x,
            speed: self.current_speed(),
            focus: self
                .last_focus
                .and_then(|id| self.placed.iter().find(|img| img.id == id))
                .map(|img| format_metadata(&img.metadata)),
        }
    }

    fn effective(&self, viewport: Viewport) -> EffectiveParams {
        let vh = f64::from(viewport.height);
        if viewport.width < self.config.constrained_below {
            let profile = &self.config.constrained;
            EffectiveParams {
                max_placed: ((self.config.max_placed as f64) * profile.scale).floor().max(1.0)
                    as usize,
                preload_px: vh * self.config.preload_screens * profile.scale,
                batch: profile.batch_size,
                initial: profile.initial_images,
                snap: profile.snap_positions,
            }
        } else {
            EffectiveParams {
                max_placed: self.config.max_placed,
                preload_px: vh * self.config.preload_screens,
                batch: self.config.batch_size,
                initial: self.config.initial_images,
                snap: false,
            }
        }
    }

    // Picks the next manifest entry and marks it as consumed so concurrent
    // slots cannot double-place it.
    fn select_key(&mut self) -> Option<String> {
        if self.manifest.is_empty() {
            return None;
        }
        let len = self.manifest.len();
        let key = match self.config.selection {
            SelectionPolicy::Sequential => {
                let fresh = self
                    .manifest
                    .keys()
                    .find(|k| !self.used.contains(*k))
                    .map(|k| k.to_string());
                match fresh {
                    Some(key) => key,
                    None => {
                        // Every entry has been placed at least once; wrap
                        let key = self.manifest.key_at(self.sequential_cursor % len)?.to_string();
                        self.sequential_cursor += 1;
                        key
                    }
                }
            }
            SelectionPolicy::Random => self
                .manifest
                .key_at(self.rng.random_range(0..len))?
                .to_string(),
            SelectionPolicy::RandomNoRepeat => {
                let fresh: Vec<&str> = self
                    .manifest
                    .keys()
                    .filter(|k| !self.used.contains(*k))
                    .collect();
                if fresh.is_empty() {
                    self.manifest
                        .key_at(self.rng.random_range(0..len))?
                        .to_string()
                } else {
                    fresh[self.rng.random_range(0..fresh.len())].to_string()
                }
            }
        };
        self.used.insert(key.clone());
        Some(key)
    }

    // Select an entry with placeable anchor points and start loading it.
    fn request_selected(&mut self) -> Option<LoadTicket> {
        let key = self.select_key()?;
        match self.manifest.get(&key) {
            Some(record) if record.points.is_empty() => {
                warn!("{} has no anchor points, skipping", key);
                None
            }
            Some(_) => Some(
                self.source
                    .request(&key, Duration::from_millis(self.config.load_timeout_ms)),
            ),
            None => None,
        }
    }

    // One synchronous placement attempt, bounded by the load timeout.
    fn attempt_place(&mut self, viewport: Viewport) -> Option<u64> {
        let ticket = self.request_selected()?;
        match ticket.wait() {
            LoadStatus::Ready(dims) => {
                let key = ticket.key().to_string();
                let record = self.manifest.get(&key)?.clone();
                self.finish_placement(&key, record, dims, viewport)
            }
            LoadStatus::Failed(e) => {
                warn!("Failed to load {}: {}", ticket.key(), e);
                None
            }
            LoadStatus::TimedOut => {
                warn!(
                    "Load of {} timed out after {}ms",
                    ticket.key(),
                    ticket.timeout_ms()
                );
                None
            }
            LoadStatus::Pending => None,
        }
    }

    // Bounded retry wrapper used by initialization; every attempt selects
    // a different entry because failures stay marked as consumed.
    fn place_with_retry(&mut self, viewport: Viewport) -> Option<u64> {
        let attempts = self.config.retry_attempts.max(1);
        for _ in 0..attempts {
            if let Some(id) = self.attempt_place(viewport) {
                return Some(id);
            }
        }
        warn!("Giving up on placement after {} attempts", attempts);
        None
    }

    // A load completed; connect the image to the current chain tail and
    // emit the placement.
    fn finish_placement(
        &mut self,
        key: &str,
        record: ImageRecord,
        dims: ImageDimensions,
        viewport: Viewport,
    ) -> Option<u64> {
        let params = self.effective(viewport);
        let display = self.display_size(viewport);
        let scale = layout::scale_factor(dims.width, dims.height, display);
        let (width, height) = layout::scaled_dimensions(dims.width, dims.height, scale);

        let entry_anchor = record.points.first().copied()?;
        let exit_anchor = record.points.last().copied().unwrap_or(entry_anchor);
        let entry = layout::anchor_offset(entry_anchor, width, height);
        let exit = layout::anchor_offset(exit_anchor, width, height);

        // Only connected positions are snapped; the centered root keeps
        // its exact coordinates.
        let position = match self.chain_tail_exit() {
            Some(prev_exit) => {
                let connected = layout::connected_position(prev_exit, entry);
                if params.snap {
                    layout::snapped_overlap(connected)
                } else {
                    connected
                }
            }
            None => layout::centered_position(viewport, display),
        };

        let id = self.next_id;
        self.next_id += 1;
        debug!(
            "Placed {} as #{} at ({:.1}, {:.1})",
            key, id, position.x, position.y
        );
        self.surface.apply(SurfaceCommand::Place {
            id,
            key: key.to_string(),
            left: position.x,
            top: position.y,
            width,
            height,
        });
        self.placed.push(PlacedImage {
            id,
            key: key.to_string(),
            left: position.x,
            top: position.y,
            width,
            height,
            scale,
            entry,
            exit,
            metadata: record.metadata,
        });
        Some(id)
    }

    fn display_size(&self, viewport: Viewport) -> f64 {
        match self.config.display_size {
            Some(size) => size,
            None => layout::fallback_display_size(viewport, self.config.constrained_below),
        }
    }

    // Exit-anchor page position of the bottom-most image. New placements
    // attach here, so two loads finishing back to back still chain onto
    // each other instead of sharing one parent.
    fn chain_tail_exit(&self) -> Option<Point> {
        self.placed
            .iter()
            .max_by(|a, b| a.top.total_cmp(&b.top))
            .map(|tail| tail.exit_position())
    }

    // Farthest-first eviction. Images farther above the viewport than the
    // margin are always removed; everything else goes only while the set
    // is over its cap. The margin never reaches below the viewport, where
    // the preload lookahead lives.
    fn evict(&mut self, viewport: Viewport) {
        let params = self.effective(viewport);
        let margin = f64::from(viewport.height) * self.config.eviction_screens;
        loop {
            let candidate = if self.placed.len() > params.max_placed {
                self.farthest(viewport)
            } else {
                self.farthest_above(viewport).filter(|&(_, d)| d > margin)
            };
            let (index, distance) = match candidate {
                Some(found) => found,
                None => break,
            };
            let image = self.placed.remove(index);
            debug!(
                "Evicting #{} {} at distance {:.0}",
                image.id, image.key, distance
            );
            self.surface.apply(SurfaceCommand::Remove { id: image.id });
        }
    }

    // Index of the image farthest from the visible band. Ties, common when
    // everything is on screen, resolve to the oldest placement.
    fn farthest(&self, viewport: Viewport) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, img) in self.placed.iter().enumerate() {
            let top_vp = img.top - self.scroll_y;
            let distance = layout::viewport_distance(top_vp, img.height, viewport);
            match best {
                Some((_, current)) if distance <= current => {}
                _ => best = Some((i, distance)),
            }
        }
        best
    }

    // Farthest image lying entirely above the viewport, if any.
    fn farthest_above(&self, viewport: Viewport) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, img) in self.placed.iter().enumerate() {
            let top_vp = img.top - self.scroll_y;
            if top_vp + img.height >= 0.0 {
                continue;
            }
            let distance = layout::viewport_distance(top_vp, img.height, viewport);
            match best {
                Some((_, current)) if distance <= current => {}
                _ => best = Some((i, distance)),
            }
        }
        best
    }

    // Resolve completed loads. Failed slots retry with a different entry
    // until their attempt budget runs out.
    fn poll_pending(&mut self, viewport: Viewport) {
        if self.pending.is_empty() {
            return;
        }
        let slots = std::mem::take(&mut self.pending);
        let mut keep = Vec::new();
        for slot in slots {
            match slot.ticket.poll() {
                LoadStatus::Pending => keep.push(slot),
                LoadStatus::Ready(dims) => {
                    let key = slot.ticket.key().to_string();
                    if let Some(record) = self.manifest.get(&key).cloned() {
                        self.finish_placement(&key, record, dims, viewport);
                    }
                }
                LoadStatus::Failed(e) => {
                    warn!("Failed to load {}: {}", slot.ticket.key(), e);
                    self.retry_slot(&mut keep, slot);
                }
                LoadStatus::TimedOut => {
                    warn!(
                        "Load of {} timed out after {}ms",
                        slot.ticket.key(),
                        slot.ticket.timeout_ms()
                    );
                    self.retry_slot(&mut keep, slot);
                }
            }
        }
        self.pending = keep;
        if self.pending.is_empty() {
            self.loading = false;
        }
    }

    fn retry_slot(&mut self, keep: &mut Vec<PendingSlot>, slot: PendingSlot) {
        if slot.attempts_left == 0 {
            warn!("Dropping placement slot after repeated load failures");
            return;
        }
        if let Some(ticket) = self.request_selected() {
            keep.push(PendingSlot {
                ticket,
                attempts_left: slot.attempts_left - 1,
            });
        }
    }

    // More images are needed when the chain tail sits within the lookahead
    // band below the viewport.
    fn needs_preload(&self, viewport: Viewport) -> bool {
        let params = self.effective(viewport);
        if self.placed.len() + self.pending.len() >= params.max_placed {
            return false;
        }
        match self.placed.iter().max_by(|a, b| a.top.total_cmp(&b.top)) {
            Some(tail) => {
                let bottom_vp = tail.top + tail.height - self.scroll_y;
                bottom_vp - f64::from(viewport.height) < params.preload_px
            }
            None => true,
        }
    }

    fn begin_batch(&mut self, viewport: Viewport) {
        let params = self.effective(viewport);
        let room = params
            .max_placed
            .saturating_sub(self.placed.len() + self.pending.len());
        let batch = params.batch.min(room);
        if batch == 0 {
            return;
        }
        // The first request counts against the per-slot retry budget
        let attempts_left = self.config.retry_attempts.max(1) - 1;
        let mut started = 0;
        for _ in 0..batch {
            if let Some(ticket) = self.request_selected() {
                self.pending.push(PendingSlot {
                    ticket,
                    attempts_left,
                });
                started += 1;
            }
        }
        if started > 0 {
            self.loading = true;
            debug!("Preloading {} images", started);
        }
    }

    // Horizontal recentering tracks the image nearest the viewport's
    // vertical middle.
    fn update_recentering(&mut self, viewport: Viewport) {
        let (_, left) = match self.nearest_center(viewport) {
            Some(found) => found,
            None => return,
        };
        let display = self.display_size(viewport);
        let target = f64::from(viewport.width) / 2.0 - (left + display / 2.0);

        let changed;
        if !self.offset_started {
            self.offset_x = target;
            self.offset_started = true;
            changed = true;
        } else {
            let before = self.offset_x;
            let delta = target - self.offset_x;
            if delta.abs() > self.config.recenter_snap_px {
                self.offset_x += delta * self.config.recenter_smoothing;
            }
            changed = self.offset_x != before;
        }
        if changed {
            self.surface.apply(SurfaceCommand::Recenter { x: self.offset_x });
        }
    }

    fn update_focus(&mut self, viewport: Viewport) {
        let (id, _) = match self.nearest_center(viewport) {
            Some(found) => found,
            None => return,
        };
        if self.last_focus == Some(id) {
            return;
        }
        self.last_focus = Some(id);
        let text = self
            .placed
            .iter()
            .find(|img| img.id == id)
            .map(|img| format_metadata(&img.metadata));
        if let Some(text) = text {
            self.set_status(&text);
        }
    }

    // (id, left) of the image whose center is nearest the viewport middle
    fn nearest_center(&self, viewport: Viewport) -> Option<(u64, f64)> {
        self.placed
            .iter()
            .map(|img| {
                let top_vp = img.top - self.scroll_y;
                (
                    img.id,
                    img.left,
                    layout::center_distance(top_vp, img.height, viewport),
                )
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(id, left, _)| (id, left))
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

/// Status text for an image's capture metadata
fn format_metadata(metadata: &ImageMetadata) -> String {
    if metadata.is_empty() {
        return "No image metadata".to_string();
    }
    let mut lines = Vec::new();
    let mut first = String::new();
    if let Some(timestamp) = &metadata.timestamp {
        first.push_str(timestamp);
    }
    if let Some([lat, lon]) = metadata.coordinates {
        if !first.is_empty() {
            first.push(' ');
        }
        first.push_str(&format!("({:.4}, {:.4})", lat, lon));
    }
    if !first.is_empty() {
        lines.push(first);
    }
    if let Some(location) = &metadata.location {
        lines.push(location.clone());
    }
    lines.join("\n")
}
