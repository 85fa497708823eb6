//! Integration tests for the wall engine over HTTP and the filesystem
#![cfg(feature = "http")]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use scrollwall::source::{FakeSource, HttpSource, ImageSource};
use scrollwall::surface::{NullSurface, RecordingSurface};
use scrollwall::{
    ControlEvent, Error, ImageWall, SelectionPolicy, Viewport, WallConfig, WallHandle,
};
use tiny_http::{Header, Response, Server};

const MANIFEST: &str = r#"{
    "a.png": [[0.1, 0.1], [0.9, 0.9]],
    "b.png": [[0.5, 0.0], [0.5, 1.0]],
    "c.png": [[0.2, 0.3], [0.8, 0.7]]
}"#;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::new(width, height);
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

fn image_response(width: u32, height: u32) -> Response<Cursor<Vec<u8>>> {
    Response::from_data(png_bytes(width, height))
        .with_header("Content-Type: image/png".parse::<Header>().unwrap())
}

/// Serve a manifest and a handful of images on an ephemeral port
fn start_server() -> String {
    let server = Server::http("127.0.0.1:0").expect("bind test server");
    let addr = server.server_addr();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let path = request.url().to_string();
            let response = match path.as_str() {
                "/manifest.json" => Response::from_string(MANIFEST).with_header(
                    "Content-Type: application/json".parse::<Header>().unwrap(),
                ),
                "/bad.json" => Response::from_string("not a manifest"),
                "/img/a.png" => image_response(200, 100),
                "/img/b.png" => image_response(100, 400),
                "/img/c.png" => image_response(300, 300),
                _ => Response::from_string("Not Found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });
    format!("http://{}", addr)
}

fn wall_config() -> WallConfig {
    WallConfig {
        display_size: Some(100.0),
        selection: SelectionPolicy::Sequential,
        seed: Some(1),
        initial_images: 2,
        ..Default::default()
    }
}

fn viewport() -> Viewport {
    Viewport {
        width: 1280,
        height: 720,
    }
}

#[test]
fn test_wall_initializes_over_http() {
    let base = start_server();
    let source = HttpSource::new(&format!("{}/img/", base), Duration::from_millis(5000))
        .expect("Failed to build source");
    let surface = Arc::new(RecordingSurface::new());
    let mut wall = ImageWall::new(wall_config(), Arc::new(source), surface.clone())
        .expect("Failed to create wall");

    wall.initialize(&format!("{}/manifest.json", base), viewport())
        .expect("Failed to initialize");

    assert_eq!(wall.placed().len(), 2);
    // Sequential selection loads a.png then b.png; b hangs off a's exit
    let exit = wall.placed()[0].exit_position();
    let entry = wall.placed()[1].entry_position();
    assert!((exit.x - entry.x).abs() < 1e-9);
    assert!((exit.y - entry.y).abs() < 1e-9);
    assert!(surface
        .statuses()
        .iter()
        .any(|s| s == "Loaded 3 image paths"));
}

#[test]
fn test_missing_manifest_fails_initialization() {
    let base = start_server();
    let source = HttpSource::new(&format!("{}/img/", base), Duration::from_millis(5000))
        .expect("Failed to build source");
    let surface = Arc::new(RecordingSurface::new());
    let mut wall = ImageWall::new(wall_config(), Arc::new(source), surface.clone())
        .expect("Failed to create wall");

    let result = wall.initialize(&format!("{}/missing.json", base), viewport());
    match result {
        Err(Error::FetchError(message)) => {
            assert!(message.contains("404"), "unexpected message: {}", message)
        }
        other => panic!("Expected a fetch error, got {:?}", other),
    }
    assert!(wall.placed().is_empty());
    assert!(!wall.is_initialized());
    assert!(surface.statuses().iter().any(|s| s.starts_with("Error:")));
    assert!(surface.live_ids().is_empty());
}

#[test]
fn test_malformed_manifest_fails_initialization() {
    let base = start_server();
    let source = HttpSource::new(&format!("{}/img/", base), Duration::from_millis(5000))
        .expect("Failed to build source");
    let surface = Arc::new(RecordingSurface::new());
    let mut wall = ImageWall::new(wall_config(), Arc::new(source), surface)
        .expect("Failed to create wall");

    let result = wall.initialize(&format!("{}/bad.json", base), viewport());
    assert!(matches!(result, Err(Error::ParseError(_))));
    assert!(wall.placed().is_empty());
}

#[test]
fn test_wall_fills_to_cap_over_http() {
    let base = start_server();
    let source = HttpSource::new(&format!("{}/img/", base), Duration::from_millis(5000))
        .expect("Failed to build source");
    let surface = Arc::new(RecordingSurface::new());
    let mut config = wall_config();
    config.max_placed = 4;
    let mut wall =
        ImageWall::new(config, Arc::new(source), surface).expect("Failed to create wall");

    wall.initialize(&format!("{}/manifest.json", base), viewport())
        .expect("Failed to initialize");

    // Preloads resolve on worker threads; keep ticking until they land
    let mut waited = 0;
    while wall.placed().len() < 4 && waited < 500 {
        wall.tick(16.0, viewport());
        assert!(wall.placed().len() <= 4);
        std::thread::sleep(Duration::from_millis(5));
        waited += 1;
    }

    assert_eq!(wall.placed().len(), 4);
    assert!(wall.scroll_position() > 0.0);
    for pair in wall.placed().windows(2) {
        let exit = pair[0].exit_position();
        let entry = pair[1].entry_position();
        assert!((exit.x - entry.x).abs() < 1e-9);
        assert!((exit.y - entry.y).abs() < 1e-9);
    }
}

#[test]
fn test_wall_from_folder_source() {
    let dir = std::env::temp_dir().join("scrollwall-wall-integration");
    std::fs::create_dir_all(&dir).expect("create temp dir");
    image::RgbaImage::new(200, 100)
        .save(dir.join("a.png"))
        .expect("write a.png");
    image::RgbaImage::new(100, 400)
        .save(dir.join("b.png"))
        .expect("write b.png");
    let manifest_path = dir.join("manifest.json");
    std::fs::write(
        &manifest_path,
        r#"{
            "a.png": [[0.1, 0.1], [0.9, 0.9]],
            "b.png": [[0.5, 0.0], [0.5, 1.0]]
        }"#,
    )
    .expect("write manifest");

    let source = scrollwall::source::FolderSource::new(&dir);
    let surface = Arc::new(RecordingSurface::new());
    let mut wall = ImageWall::new(wall_config(), Arc::new(source), surface)
        .expect("Failed to create wall");

    wall.initialize(manifest_path.to_str().expect("utf8 path"), viewport())
        .expect("Failed to initialize");

    assert_eq!(wall.placed().len(), 2);
    assert_eq!(wall.placed()[0].key, "a.png");
    assert_eq!(wall.placed()[1].key, "b.png");
}

#[tokio::test]
async fn test_async_facade_drives_wall() {
    let base = start_server();
    let source = HttpSource::new(&format!("{}/img/", base), Duration::from_millis(5000))
        .expect("Failed to build source");
    let surface = Arc::new(RecordingSurface::new());
    let handle = WallHandle::new(wall_config(), Arc::new(source), surface)
        .await
        .expect("Failed to spawn wall worker");

    handle
        .initialize(&format!("{}/manifest.json", base), viewport())
        .await
        .expect("Failed to initialize");
    for _ in 0..5 {
        handle.tick(16.0, viewport()).await.expect("tick");
    }
    handle
        .control(ControlEvent::CycleSpeed, viewport())
        .await
        .expect("control");

    let snapshot = handle.snapshot().await.expect("snapshot");
    assert!(snapshot.placed >= 2);
    assert!(snapshot.scroll_y > 0.0);
    assert!((snapshot.speed - 400.0).abs() < 1e-9);

    handle.close().await.expect("close");
}

#[tokio::test]
async fn test_async_facade_rejects_bad_config() {
    let config = WallConfig {
        recenter_smoothing: 0.0,
        ..Default::default()
    };
    let source: Arc<dyn ImageSource> = Arc::new(FakeSource::new());
    let result = WallHandle::new(config, source, Arc::new(NullSurface)).await;
    assert!(matches!(result, Err(Error::ConfigError(_))));
}
