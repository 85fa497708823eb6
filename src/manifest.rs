//! Manifest retrieval and parsing.
//!
//! A wall manifest maps image file names to anchor points in fractional
//! image coordinates. Two shapes are accepted: a bare array of `[x, y]`
//! pairs, or an object carrying a `points` array plus optional capture
//! metadata. A feed list is a plain JSON array of file names.

use std::collections::BTreeMap;
use std::fs;
#[cfg(feature = "http")]
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// A fractional anchor position inside an image (0.0..=1.0 on both axes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPoint {
    pub x: f64,
    pub y: f64,
}

impl From<[f64; 2]> for AnchorPoint {
    fn from(pair: [f64; 2]) -> Self {
        Self {
            x: pair[0],
            y: pair[1],
        }
    }
}

/// Optional capture metadata carried by the annotated manifest shape
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageMetadata {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// `[latitude, longitude]` in decimal degrees
    #[serde(default)]
    pub coordinates: Option<[f64; 2]>,
}

impl ImageMetadata {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.location.is_none() && self.coordinates.is_none()
    }
}

/// Anchor points and metadata for a single manifest entry
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Entry anchor first, exit anchor second. Extra points are kept but
    /// unused; an empty list marks the entry as unplaceable.
    pub points: Vec<AnchorPoint>,
    pub metadata: ImageMetadata,
}

// Wire shapes; the annotated form wraps the points array with metadata.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Bare(Vec<[f64; 2]>),
    Annotated {
        points: Vec<[f64; 2]>,
        #[serde(flatten)]
        metadata: ImageMetadata,
    },
}

impl From<RawEntry> for ImageRecord {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Bare(points) => Self {
                points: points.into_iter().map(AnchorPoint::from).collect(),
                metadata: ImageMetadata::default(),
            },
            RawEntry::Annotated { points, metadata } => Self {
                points: points.into_iter().map(AnchorPoint::from).collect(),
                metadata,
            },
        }
    }
}

/// A parsed wall manifest.
///
/// Entries are held in lexicographic file-name order so that sequential
/// selection and test runs are deterministic regardless of the JSON
/// serialization order.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<(String, ImageRecord)>,
}

impl Manifest {
    /// Parse a manifest from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawEntry> =
            serde_json::from_str(text).map_err(|e| Error::ParseError(format!("manifest: {}", e)))?;
        Ok(Self {
            entries: raw.into_iter().map(|(k, v)| (k, v.into())).collect(),
        })
    }

    /// Retrieve and parse a manifest from a file path or, with the `http`
    /// feature, an http(s) URL. Any failure here is fatal to wall
    /// initialization.
    pub fn fetch(location: &str, timeout_ms: u64) -> Result<Self> {
        Self::from_json(&fetch_text(location, timeout_ms)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File name at `index` in manifest order
    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&ImageRecord> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, r)| r)
    }

    /// Iterate file names in manifest order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

/// An ordered list of feed image file names
#[derive(Debug, Clone, Default)]
pub struct FeedList {
    names: Vec<String>,
}

impl FeedList {
    /// Parse a feed list from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let names: Vec<String> = serde_json::from_str(text)
            .map_err(|e| Error::ParseError(format!("image list: {}", e)))?;
        Ok(Self { names })
    }

    /// Retrieve and parse a feed list, same rules as [`Manifest::fetch`]
    pub fn fetch(location: &str, timeout_ms: u64) -> Result<Self> {
        Self::from_json(&fetch_text(location, timeout_ms)?)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }
}

// Manifests are small, so retrieval is synchronous; only image bytes go
// through the worker-backed sources.
pub(crate) fn fetch_text(location: &str, timeout_ms: u64) -> Result<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        #[cfg(feature = "http")]
        {
            return fetch_text_http(location, timeout_ms);
        }
        #[cfg(not(feature = "http"))]
        {
            let _ = timeout_ms;
            return Err(Error::FetchError(format!(
                "{}: http support is not compiled in",
                location
            )));
        }
    }

    fs::read_to_string(location).map_err(|e| Error::FetchError(format!("{}: {}", location, e)))
}

#[cfg(feature = "http")]
fn fetch_text_http(url: &str, timeout_ms: u64) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| Error::FetchError(format!("{}: {}", url, e)))?;

    let res = client
        .get(url)
        .send()
        .map_err(|e| Error::FetchError(format!("{}: {}", url, e)))?;

    if !res.status().is_success() {
        return Err(Error::FetchError(format!("{}: HTTP {}", url, res.status())));
    }

    res.text()
        .map_err(|e| Error::FetchError(format!("{}: {}", url, e)))
}
