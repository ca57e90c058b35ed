use clap::{Parser, Subcommand};
use log::info;
use segment_protocol::SegmentClient;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "segment_client")]
#[command(about = "Command-line client for the segment server")]
struct Args {
    /// Server address
    #[arg(short, long, env = "SEGMENT_SERVER", default_value = "127.0.0.1:12345")]
    server: String,

    #[command(subcommand)]
    command: ClientCommand,
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    /// List the audio files the server knows about
    List,
    /// Download [start, end) seconds of a file as a standalone WAV
    #[command(allow_negative_numbers = true)]
    Fetch {
        name: String,
        start: f64,
        end: f64,
        /// Output path (default: segment_<name>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask the server to stop accepting new connections
    Shutdown,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut client = SegmentClient::connect(&args.server)?;

    match args.command {
        ClientCommand::List => {
            for entry in client.list()? {
                println!("{:<40} {:>10.3}s  {}", entry.name, entry.duration, entry.format);
            }
        }
        ClientCommand::Fetch {
            name,
            start,
            end,
            output,
        } => {
            let segment = client.fetch_segment(&name, start, end)?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("segment_{}", name)));
            std::fs::write(&output, &segment.data)?;
            info!("💾 Segment saved to {}", output.display());
            println!(
                "Saved {} frames ({} bytes) to {}",
                segment.frames,
                segment.size_bytes(),
                output.display()
            );
        }
        ClientCommand::Shutdown => {
            let message = client.shutdown()?;
            println!("{}", message);
        }
    }

    Ok(())
}
