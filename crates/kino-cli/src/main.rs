//! Kino CLI - Headless renderer build and manifest inspection tool
//!
//! Features:
//! - Manifest analysis (variants, subtitles, device selection)
//! - Full renderer builds against a live stream
//! - Bitrate ceiling and display emulation

use clap::{Parser, Subcommand};

mod commands;
mod output;

use output::OutputFormat;

/// Kino CLI - HLS renderer toolkit
#[derive(Parser)]
#[command(name = "kino-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "HLS renderer build and manifest inspection toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an HLS manifest and the variants this device would enable
    Analyze {
        /// URL to manifest
        manifest: String,

        /// Display size as WIDTHxHEIGHT
        #[arg(short, long, default_value = "1920x1080")]
        display: String,

        /// The display cannot rotate
        #[arg(long)]
        fixed_orientation: bool,

        /// User agent sent with the manifest request
        #[arg(short, long, default_value = commands::DEFAULT_USER_AGENT)]
        user_agent: String,
    },

    /// Build the renderer set for a stream and report it
    Build {
        /// URL to manifest
        manifest: String,

        /// User agent sent with every request
        #[arg(short, long, default_value = commands::DEFAULT_USER_AGENT)]
        user_agent: String,

        /// Bitrate ceiling in bits per second
        #[arg(short = 'b', long)]
        max_bitrate: Option<u64>,

        /// Display size as WIDTHxHEIGHT
        #[arg(short, long, default_value = "1920x1080")]
        display: String,

        /// The display cannot rotate
        #[arg(long)]
        fixed_orientation: bool,

        /// Buffer segment size in bytes
        #[arg(long, default_value_t = kino_renderer::config::DEFAULT_SEGMENT_SIZE)]
        segment_size: usize,

        /// Buffer segments for video, audio and metadata
        #[arg(long, default_value_t = kino_renderer::config::DEFAULT_SEGMENT_COUNT)]
        segments: usize,

        /// Buffer segments for manifest subtitles
        #[arg(long, default_value_t = kino_renderer::config::DEFAULT_TEXT_SEGMENT_COUNT)]
        text_segments: usize,

        /// Give up after this many seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    kino_renderer::init();
    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Analyze {
            manifest,
            display,
            fixed_orientation,
            user_agent,
        } => {
            let display = commands::parse_display(&display, fixed_orientation)?;
            commands::analyze(&manifest, &user_agent, display, format).await?;
        }
        Commands::Build {
            manifest,
            user_agent,
            max_bitrate,
            display,
            fixed_orientation,
            segment_size,
            segments,
            text_segments,
            timeout,
        } => {
            let options = commands::BuildOptions {
                user_agent,
                max_bitrate,
                display: commands::parse_display(&display, fixed_orientation)?,
                segment_size,
                segments,
                text_segments,
                timeout: std::time::Duration::from_secs(timeout),
            };
            commands::build(&manifest, options, format).await?;
        }
    }

    Ok(())
}
