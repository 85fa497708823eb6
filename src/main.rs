use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use scrollwall::source::{FolderSource, ImageSource};
use scrollwall::surface::{Surface, SurfaceCommand};
use scrollwall::{FeedConfig, ImageWall, ReceiptFeed, Viewport, WallConfig};

#[derive(Parser)]
#[command(name = "scrollwall", version, about = "Headless chained-anchor image wall")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chained-anchor wall for a fixed number of frames
    Wall {
        /// Anchor manifest path or URL
        #[arg(long)]
        manifest: String,
        /// Image folder path or base URL
        #[arg(long)]
        images: String,
        #[arg(long, default_value_t = 300)]
        frames: u32,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        /// Seed for deterministic image selection
        #[arg(long)]
        seed: Option<u64>,
        /// Print scroll and recenter motion, not just placements
        #[arg(long)]
        verbose: bool,
    },
    /// Run the receipt feed until the list is exhausted or frames run out
    Feed {
        /// Feed list path or URL
        #[arg(long)]
        list: String,
        /// Image folder path or base URL
        #[arg(long)]
        images: String,
        #[arg(long, default_value_t = 3600)]
        frames: u32,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        #[arg(long)]
        verbose: bool,
    },
}

/// Prints surface commands as plain text. Placements, removals, and status
/// lines always print; per-frame motion only with `--verbose`.
struct ConsoleSurface {
    verbose: bool,
}

impl Surface for ConsoleSurface {
    fn apply(&self, command: SurfaceCommand) {
        match &command {
            SurfaceCommand::Place { .. } | SurfaceCommand::Remove { .. } => {
                println!("{}", command.describe());
            }
            SurfaceCommand::Status { text } => println!("status: {}", text),
            SurfaceCommand::Scroll { .. } | SurfaceCommand::Recenter { .. } => {
                if self.verbose {
                    println!("{}", command.describe());
                }
            }
        }
    }
}

fn open_source(images: &str, timeout_ms: u64) -> anyhow::Result<Arc<dyn ImageSource>> {
    if images.starts_with("http://") || images.starts_with("https://") {
        #[cfg(feature = "http")]
        {
            let source =
                scrollwall::source::HttpSource::new(images, Duration::from_millis(timeout_ms))?;
            return Ok(Arc::new(source));
        }
        #[cfg(not(feature = "http"))]
        anyhow::bail!("{} requires a build with the http feature", images);
    }
    Ok(Arc::new(FolderSource::new(images)))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Wall {
            manifest,
            images,
            frames,
            fps,
            width,
            height,
            seed,
            verbose,
        } => {
            if fps <= 0.0 {
                anyhow::bail!("fps must be positive");
            }
            let config = WallConfig {
                seed,
                ..Default::default()
            };
            let source = open_source(&images, config.load_timeout_ms)?;
            let surface = Arc::new(ConsoleSurface { verbose });
            let viewport = Viewport { width, height };

            let mut wall = ImageWall::new(config, source, surface)?;
            wall.initialize(&manifest, viewport)?;

            let step_ms = 1000.0 / fps;
            for _ in 0..frames {
                wall.tick(step_ms, viewport);
            }

            let snapshot = wall.snapshot();
            println!(
                "{} frames: {} placed, {} pending, scrolled {:.0}px, offset {:.0}px",
                frames, snapshot.placed, snapshot.pending, snapshot.scroll_y, snapshot.offset_x
            );
        }
        Commands::Feed {
            list,
            images,
            frames,
            fps,
            width,
            height,
            verbose,
        } => {
            if fps <= 0.0 {
                anyhow::bail!("fps must be positive");
            }
            let config = FeedConfig::default();
            let source = open_source(&images, config.load_timeout_ms)?;
            let surface = Arc::new(ConsoleSurface { verbose });
            let viewport = Viewport { width, height };

            let mut feed = ReceiptFeed::new(config, source, surface)?;
            feed.initialize(&list)?;

            let step_ms = 1000.0 / fps;
            for _ in 0..frames {
                if feed.is_done() {
                    break;
                }
                feed.tick(step_ms, viewport);
            }

            println!(
                "{} images delivered, column travelled {:.0}px{}",
                feed.delivered(),
                feed.displacement(),
                if feed.is_done() { ", feed complete" } else { "" }
            );
        }
    }

    Ok(())
}
