use std::path::PathBuf;

/// Configuration for the segment server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the TCP server to (use "127.0.0.1:0" for random port)
    pub bind_address: String,
    /// Directory scanned for `.wav` files at startup
    pub audio_dir: PathBuf,
    /// Where the catalog snapshot is written
    pub metadata_file: PathBuf,
    /// Largest `SegmentChunk` payload in bytes
    pub chunk_size: usize,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:12345".to_string(),
            audio_dir: PathBuf::from("audio_files"),
            metadata_file: PathBuf::from("audio_metadata.json"),
            chunk_size: 1024,
            max_connections: 64,
        }
    }
}
