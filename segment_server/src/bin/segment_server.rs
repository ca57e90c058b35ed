use clap::Parser;
use log::{info, warn};
use segment_server::catalog::{self, Catalog};
use segment_server::{SegmentServer, ServerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "segment_server")]
#[command(about = "Serves time-sliced segments of WAV files over TCP")]
struct Args {
    /// Address to bind the TCP server to
    #[arg(short, long, env = "SEGMENT_BIND", default_value = "127.0.0.1:12345")]
    bind: String,

    /// Directory containing the .wav files to serve (created if missing)
    #[arg(short, long, env = "SEGMENT_AUDIO_DIR", default_value = "audio_files")]
    audio_dir: PathBuf,

    /// Where to write the catalog snapshot
    #[arg(long, env = "SEGMENT_METADATA_FILE", default_value = "audio_metadata.json")]
    metadata_file: PathBuf,

    /// Maximum bytes per segment chunk message
    #[arg(long, env = "SEGMENT_CHUNK_SIZE", default_value = "1024")]
    chunk_size: usize,

    /// Maximum number of concurrent client sessions
    #[arg(long, env = "SEGMENT_MAX_CONNECTIONS", default_value = "64")]
    max_connections: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (for development)
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("🚀 Starting segment server with args: {:?}", args);

    let config = ServerConfig {
        bind_address: args.bind,
        audio_dir: args.audio_dir,
        metadata_file: args.metadata_file,
        chunk_size: args.chunk_size,
        max_connections: args.max_connections,
    };

    catalog::ensure_directory(&config.audio_dir)?;
    let catalog = Catalog::build(&config.audio_dir)?;
    if catalog.is_empty() {
        warn!("⚠️  No .wav files found in {}", config.audio_dir.display());
    }

    let server = SegmentServer::bind(config, catalog)?;

    // Handle Ctrl+C gracefully
    let shutdown = server.shutdown_signal();
    ctrlc::set_handler(move || {
        info!("🛑 Received Ctrl+C, shutting down...");
        shutdown.trigger();
    })?;

    server.run()?;
    info!("🛑 Segment server stopped");

    Ok(())
}
