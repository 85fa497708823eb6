//! Scrollwall Engine
//!
//! A headless engine for infinite-scroll image walls. Images are chained
//! together through per-image anchor points so that each new image attaches
//! to the exit anchor of the previous one, while a bounded working set keeps
//! memory flat during endless scrolling.
//!
//! # Features
//!
//! - **Headless Core**: Layout and lifecycle run without any display stack;
//!   embedders observe placements through a [`surface::Surface`] projection
//! - **Pluggable Sources**: Images come from a folder, an HTTP base URL, or
//!   a deterministic in-memory fake for tests
//! - **Safe Defaults**: Bounded retries, load timeouts, and a hard cap on
//!   simultaneously placed images
//!
//! # Example
//!
//! ```no_run
//! use scrollwall::{ImageWall, WallConfig, Viewport};
//! use scrollwall::source::FolderSource;
//! use scrollwall::surface::NullSurface;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WallConfig {
//!     display_size: Some(500.0),
//!     seed: Some(7),
//!     ..Default::default()
//! };
//!
//! let viewport = Viewport { width: 1280, height: 720 };
//! let mut wall = ImageWall::new(
//!     config,
//!     Arc::new(FolderSource::new("photos")),
//!     Arc::new(NullSurface::default()),
//! )?;
//! wall.initialize("photos/images.json", viewport)?;
//! for _ in 0..120 {
//!     wall.tick(16.0, viewport);
//! }
//! println!("{} images placed", wall.placed().len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

// Manifest parsing and retrieval (anchor points + optional capture metadata)
pub mod manifest;

// Pure placement geometry
pub mod layout;

// Image dimension providers (folder, HTTP, deterministic fake)
pub mod source;

// Output projection consumed by embedders
pub mod surface;

// The chained-anchor wall engine
pub mod wall;

// Sequential top-drop feed engine
pub mod feed;

// Async-friendly facade (worker thread + command channel)
pub mod async_api;

// Re-export the main types at the crate root for ergonomic examples
pub use async_api::WallHandle;
pub use feed::ReceiptFeed;
pub use wall::ImageWall;

/// Configuration for the wall engine
///
/// The defaults reproduce the tuning the engine ships with: a 30 image
/// working set, three viewport heights of lookahead, and random selection
/// without replacement. Fields are plain values so embedders can override
/// any subset with struct update syntax.
///
/// # Examples
///
/// ```
/// let cfg = scrollwall::WallConfig::default();
/// assert_eq!(cfg.max_placed, 30);
/// ```
#[derive(Debug, Clone)]
pub struct WallConfig {
    /// Edge of the square bounding each placed image, in pixels.
    /// `None` derives a size from the viewport width at placement time.
    pub display_size: Option<f64>,
    /// Scroll speeds in px/s, cycled by [`ControlEvent::CycleSpeed`].
    /// The first entry is the starting speed.
    pub speed_steps: Vec<f64>,
    /// How the next image is picked from the manifest
    pub selection: SelectionPolicy,
    /// Seed for the selection rng (`None` uses OS entropy)
    pub seed: Option<u64>,
    /// Upper bound on simultaneously placed images
    pub max_placed: usize,
    /// Viewport heights of lookahead below the chain tail before more
    /// images are requested
    pub preload_screens: f64,
    /// Images requested per preload batch
    pub batch_size: usize,
    /// Images placed during initialization (the first is centered)
    pub initial_images: usize,
    /// Image load timeout in milliseconds
    pub load_timeout_ms: u64,
    /// Load attempts per placement before the slot is abandoned
    pub retry_attempts: u32,
    /// Fraction of the remaining recentering distance applied per tick
    /// (1.0 recenters immediately)
    pub recenter_smoothing: f64,
    /// Recentering below this remaining distance is skipped, in pixels
    pub recenter_snap_px: f64,
    /// Images that have scrolled farther above the viewport than this
    /// many viewport heights are evicted even while the working set is
    /// under its cap
    pub eviction_screens: f64,
    /// Viewport widths below this use the constrained profile
    pub constrained_below: u32,
    /// Overrides applied on narrow viewports
    pub constrained: ConstrainedProfile,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            display_size: None,
            speed_steps: vec![200.0, 400.0, 100.0],
            selection: SelectionPolicy::RandomNoRepeat,
            seed: None,
            max_placed: 30,
            preload_screens: 3.0,
            batch_size: default_batch(),
            initial_images: 6,
            load_timeout_ms: 5000,
            retry_attempts: 3,
            recenter_smoothing: 1.0,
            recenter_snap_px: 0.0,
            eviction_screens: 2.0,
            constrained_below: 768,
            constrained: ConstrainedProfile::default(),
        }
    }
}

// Two concurrent loads only pay off with a spare core for the decoder thread.
fn default_batch() -> usize {
    if num_cpus::get() > 1 {
        2
    } else {
        1
    }
}

/// Reduced working set and batch sizes for narrow viewports
#[derive(Debug, Clone)]
pub struct ConstrainedProfile {
    /// Multiplier applied to `max_placed` and `preload_screens`
    pub scale: f64,
    /// Images requested per preload batch
    pub batch_size: usize,
    /// Images placed during initialization
    pub initial_images: usize,
    /// Snap connected placements to whole pixels with a 1px vertical
    /// overlap between neighbors; the centered root is left exact
    pub snap_positions: bool,
}

impl Default for ConstrainedProfile {
    fn default() -> Self {
        Self {
            scale: 0.7,
            batch_size: 1,
            initial_images: 3,
            snap_positions: true,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// How the next image is picked from the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Manifest order, wrapping around once every entry has been placed
    Sequential,
    /// Uniform over the whole manifest, repeats allowed
    Random,
    /// Uniform over entries not yet placed, falling back to the whole
    /// manifest once every entry has been placed
    RandomNoRepeat,
}

/// Control events mapped from embedder input (keys, buttons, gestures)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Advance to the next configured scroll speed
    CycleSpeed,
    /// Queue one additional placement, resolved by the next manage pass
    LoadOne,
    /// Run an eviction pass immediately
    Cleanup,
}

/// A point-in-time summary of wall state
///
/// Returned by `ImageWall::snapshot` and by the async facade. Suitable for
/// status lines and quick inspection in tests.
#[derive(Debug, Clone)]
pub struct WallSnapshot {
    /// Number of currently placed images
    pub placed: usize,
    /// Number of placements still waiting on an image load
    pub pending: usize,
    /// Accumulated vertical scroll in pixels
    pub scroll_y: f64,
    /// Horizontal recentering offset in pixels
    pub offset_x: f64,
    /// Current scroll speed in px/s
    pub speed: f64,
    /// Metadata line for the image nearest the viewport center, if any
    pub focus: Option<String>,
}

/// Configuration for the receipt feed engine
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Rendered width of every feed image, in pixels
    pub display_width: f64,
    /// Downward feed speed in px/s
    pub speed: f64,
    /// Pause between consecutive images in milliseconds
    pub pause_ms: f64,
    /// Image load timeout in milliseconds
    pub load_timeout_ms: u64,
    /// Images farther than this below the viewport are removed, in pixels
    pub reclaim_margin: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            display_width: 150.0,
            speed: 300.0,
            pause_ms: 1000.0,
            load_timeout_ms: 5000,
            reclaim_margin: 500.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WallConfig::default();
        assert_eq!(config.max_placed, 30);
        assert_eq!(config.speed_steps, vec![200.0, 400.0, 100.0]);
        assert_eq!(config.load_timeout_ms, 5000);
        assert_eq!(config.selection, SelectionPolicy::RandomNoRepeat);
        assert!(config.batch_size >= 1);
    }

    #[test]
    fn test_viewport() {
        let viewport = Viewport {
            width: 1920,
            height: 1080,
        };
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.height, 1080);
    }

    #[test]
    fn test_constrained_profile() {
        let profile = ConstrainedProfile::default();
        assert_eq!(profile.batch_size, 1);
        assert!(profile.scale < 1.0);
    }
}
