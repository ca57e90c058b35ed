//! Metadata catalog of the audio assets the server can slice.
//!
//! Built once at startup from a directory scan. Only WAV headers are read;
//! no samples are decoded. The catalog is immutable afterwards and shared
//! between sessions without locking.

use hound::{WavReader, WavSpec};
use log::{debug, info, warn};
use segment_protocol::{AudioFormat, CatalogEntry};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Audio file not found: {0}")]
    NotFound(String),

    #[error("Cannot read audio directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One audio file known to the server
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    /// File name, unique within the catalog
    pub name: String,
    pub path: PathBuf,
    pub spec: WavSpec,
    pub total_frames: u32,
    pub format: AudioFormat,
}

impl AudioAsset {
    /// Read the header of a WAV file without decoding its samples
    pub fn probe(path: &Path) -> Result<Self, hound::Error> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or(hound::Error::FormatError("file name is not valid UTF-8"))?;

        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(hound::Error::FormatError("sample rate is zero"));
        }

        Ok(Self {
            name,
            path: path.to_path_buf(),
            spec,
            total_frames: reader.duration(),
            format: AudioFormat::PcmWav,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    pub fn duration_seconds(&self) -> f64 {
        self.total_frames as f64 / self.spec.sample_rate as f64
    }

    pub fn entry(&self) -> CatalogEntry {
        CatalogEntry {
            name: self.name.clone(),
            duration: self.duration_seconds(),
            format: self.format,
        }
    }
}

/// Read-only index of audio assets, ordered by name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    assets: Vec<AudioAsset>,
}

impl Catalog {
    /// Scan `directory` for `.wav` files and read their headers.
    ///
    /// Files whose header cannot be parsed are logged and skipped. Only a
    /// directory that cannot be listed fails the build.
    pub fn build(directory: &Path) -> Result<Self, CatalogError> {
        info!("🔍 Scanning {} for audio files", directory.display());

        let entries = fs::read_dir(directory).map_err(|source| CatalogError::ReadDir {
            path: directory.to_path_buf(),
            source,
        })?;

        let mut assets = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("⚠️  Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };

            if !path.is_file() || !is_wav(&path) {
                continue;
            }

            match AudioAsset::probe(&path) {
                Ok(asset) => {
                    debug!(
                        "🎵 {}: {}Hz, {} channels, {} bits, {} frames",
                        asset.name,
                        asset.spec.sample_rate,
                        asset.spec.channels,
                        asset.spec.bits_per_sample,
                        asset.total_frames
                    );
                    assets.push(asset);
                }
                Err(e) => {
                    warn!("⚠️  Skipping {}: {}", path.display(), e);
                }
            }
        }

        Ok(Self::from_assets(assets))
    }

    pub fn from_assets(mut assets: Vec<AudioAsset>) -> Self {
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        assets.dedup_by(|a, b| a.name == b.name);
        info!("📚 Catalog built with {} audio files", assets.len());
        Self { assets }
    }

    pub fn lookup(&self, name: &str) -> Result<&AudioAsset, CatalogError> {
        self.assets
            .binary_search_by(|asset| asset.name.as_str().cmp(name))
            .map(|index| &self.assets[index])
            .map_err(|_| CatalogError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioAsset> {
        self.assets.iter()
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.assets.iter().map(AudioAsset::entry).collect()
    }

    /// JSON snapshot answered to `list`
    pub fn serialize(&self) -> Result<Vec<u8>, CatalogError> {
        Ok(serde_json::to_vec(&self.entries())?)
    }

    /// Write the snapshot to the metadata lookup file
    pub fn persist(&self, path: &Path) -> Result<(), CatalogError> {
        fs::write(path, self.serialize()?)?;
        info!("💾 Audio metadata saved to {}", path.display());
        Ok(())
    }
}

/// Read a snapshot previously written by [`Catalog::persist`]
pub fn load_snapshot(path: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create the audio directory if it does not exist yet.
///
/// Returns `true` when the directory was created.
pub fn ensure_directory(path: &Path) -> io::Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path)?;
    info!("📁 Created directory {}", path.display());
    Ok(true)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}
