//! Source images and the assets a run needs, loaded from disk.
//!
//! The generator only sees byte payloads; this module is the caller side
//! that turns a directory into an ordered list of [`SourceImage`]s and reads
//! the overlay and sticker files named in the config.
//!
//! ## Ordering
//!
//! Images are ordered by timestamp (file modification time), then by name,
//! which is the order they were added in.
//!
//! ## Payloads
//!
//! Images loaded from a directory keep only their path; the bytes are read
//! when their cell is drawn and dropped right after. Ids are hashed while
//! streaming each file once at load time.
//!
//! ## Duplicates
//!
//! Two images with the same display name and the same byte size count as
//! duplicates. [`remove_duplicates`] keeps the first of each.

use crate::config::CollageConfig;
use crate::generate::Assets;
use crate::imaging::rust_backend::supported_input_extensions;
use crate::sheet::CellSource;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Cannot read {kind} {path}: {source}")]
    Asset {
        kind: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where a source image's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Memory(Vec<u8>),
    /// Read on demand.
    File(PathBuf),
}

/// One input image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// SHA-256 of the payload, hex.
    pub id: String,
    /// Display name (file name).
    pub name: String,
    pub payload: Payload,
    /// Payload size in bytes.
    pub size: usize,
    /// Insertion time, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, timestamp: u64) -> Self {
        Self {
            id: payload_id(&bytes),
            name: name.into(),
            size: bytes.len(),
            payload: Payload::Memory(bytes),
            timestamp,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.size
    }
}

impl CellSource for SourceImage {
    fn read_bytes(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match &self.payload {
            Payload::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
            Payload::File(path) => std::fs::read(path).map(Cow::Owned),
        }
    }
}

/// SHA-256 hash of a payload, returned as a hex string.
pub fn payload_id(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn is_supported_image(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    supported_input_extensions().contains(&ext.as_str())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Find image files under `dir`, recursively, in file-name order.
pub fn find_image_files(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    if !dir.is_dir() {
        return Err(SourceError::NotADirectory(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()))
    {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Stat and hash one file without keeping its bytes.
fn load_one(path: &Path) -> Result<SourceImage, SourceError> {
    let metadata = std::fs::metadata(path)?;
    let timestamp = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(SourceImage {
        id: format!("{:x}", hasher.finalize()),
        name,
        payload: Payload::File(path.to_path_buf()),
        size: size as usize,
        timestamp,
    })
}

/// Load every supported image under `dir`, ordered by (timestamp, name).
pub fn load_sources(dir: &Path) -> Result<Vec<SourceImage>, SourceError> {
    let files = find_image_files(dir)?;
    let mut images = files
        .par_iter()
        .map(|p| load_one(p))
        .collect::<Result<Vec<_>, _>>()?;
    sort_sources(&mut images);
    tracing::info!(count = images.len(), dir = %dir.display(), "loaded source images");
    Ok(images)
}

/// Stable insertion order: timestamp, then name.
pub fn sort_sources(images: &mut [SourceImage]) {
    images.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.name.cmp(&b.name)));
}

/// Positions of images that repeat an earlier (name, size) pair.
pub fn find_duplicates(images: &[SourceImage]) -> Vec<usize> {
    let mut seen = HashSet::new();
    images
        .iter()
        .enumerate()
        .filter(|(_, img)| !seen.insert((img.name.as_str(), img.byte_size())))
        .map(|(i, _)| i)
        .collect()
}

/// Drop duplicates, keeping the first occurrence. Returns how many were removed.
pub fn remove_duplicates(images: &mut Vec<SourceImage>) -> usize {
    let dupes: HashSet<usize> = find_duplicates(images).into_iter().collect();
    if dupes.is_empty() {
        return 0;
    }
    let mut i = 0;
    images.retain(|_| {
        let keep = !dupes.contains(&i);
        i += 1;
        keep
    });
    dupes.len()
}

/// Read the overlay and sticker files named in `config`.
///
/// Relative paths resolve against `base_dir` (the config file's directory).
pub fn load_assets(config: &CollageConfig, base_dir: &Path) -> Result<Assets, SourceError> {
    let read = |kind: &'static str, path: &Option<PathBuf>| -> Result<Option<Vec<u8>>, SourceError> {
        let Some(path) = path else {
            return Ok(None);
        };
        let path = base_dir.join(path);
        std::fs::read(&path)
            .map(Some)
            .map_err(|source| SourceError::Asset { kind, path, source })
    };
    Ok(Assets {
        overlay: read("overlay", &config.overlay.image)?,
        sticker: read("sticker", &config.mask.sticker)?,
    })
}
