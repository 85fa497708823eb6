use criterion::{criterion_group, criterion_main, Criterion};

use std::sync::Arc;

use scrollwall::manifest::{FeedList, Manifest};
use scrollwall::source::FakeSource;
use scrollwall::surface::NullSurface;
use scrollwall::{FeedConfig, ImageWall, ReceiptFeed, SelectionPolicy, Viewport, WallConfig};

fn manifest_json() -> String {
    let mut entries = Vec::new();
    for i in 0..24 {
        entries.push(format!(
            r#""img{:02}.png": [[0.2, 0.1], [0.8, 0.9]]"#,
            i
        ));
    }
    format!("{{{}}}", entries.join(","))
}

fn build_source() -> FakeSource {
    let source = FakeSource::new();
    for i in 0..24u32 {
        source.insert(&format!("img{:02}.png", i), 1200, 800 + (i % 5) * 120);
    }
    source
}

fn bench_config() -> WallConfig {
    WallConfig {
        display_size: Some(120.0),
        selection: SelectionPolicy::RandomNoRepeat,
        seed: Some(42),
        max_placed: 20,
        initial_images: 6,
        ..Default::default()
    }
}

fn bench_manifest_parse(c: &mut Criterion) {
    let json = manifest_json();
    c.bench_function("manifest_parse", |b| {
        b.iter(|| {
            let _ = Manifest::from_json(&json).expect("parse failed");
        })
    });
}

fn bench_wall_initialize(c: &mut Criterion) {
    let viewport = Viewport {
        width: 1280,
        height: 720,
    };
    let manifest = Manifest::from_json(&manifest_json()).expect("parse failed");

    c.bench_function("wall_initialize", |b| {
        b.iter(|| {
            let mut wall = ImageWall::new(
                bench_config(),
                Arc::new(build_source()),
                Arc::new(NullSurface),
            )
            .expect("failed to create wall");
            wall.initialize_with(manifest.clone(), viewport)
                .expect("initialize failed");
        })
    });
}

fn bench_wall_tick(c: &mut Criterion) {
    let viewport = Viewport {
        width: 1280,
        height: 720,
    };
    let manifest = Manifest::from_json(&manifest_json()).expect("parse failed");
    let mut wall = ImageWall::new(
        bench_config(),
        Arc::new(build_source()),
        Arc::new(NullSurface),
    )
    .expect("failed to create wall");
    wall.initialize_with(manifest, viewport)
        .expect("initialize failed");

    c.bench_function("wall_tick", |b| {
        b.iter(|| {
            wall.tick(16.0, viewport);
        })
    });
}

fn bench_feed_run(c: &mut Criterion) {
    let viewport = Viewport {
        width: 1280,
        height: 720,
    };
    let names: Vec<String> = (0..8).map(|i| format!("\"img{:02}.png\"", i)).collect();
    let list_json = format!("[{}]", names.join(","));

    c.bench_function("feed_run_to_completion", |b| {
        b.iter(|| {
            let source = FakeSource::new();
            for i in 0..8 {
                source.insert(&format!("img{:02}.png", i), 600, 900);
            }
            let config = FeedConfig {
                pause_ms: 0.0,
                ..Default::default()
            };
            let mut feed = ReceiptFeed::new(config, Arc::new(source), Arc::new(NullSurface))
                .expect("failed to create feed");
            feed.initialize_with(FeedList::from_json(&list_json).expect("parse failed"));
            while !feed.is_done() {
                feed.tick(100.0, viewport);
            }
        })
    });
}

criterion_group!(
    benches,
    bench_manifest_parse,
    bench_wall_initialize,
    bench_wall_tick,
    bench_feed_run
);
criterion_main!(benches);
