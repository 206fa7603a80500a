use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use h264_rtp_streamer::config::StreamConfig;
use h264_rtp_streamer::error::StreamError;
use h264_rtp_streamer::{byte_source::ByteSource, pipeline, sdp};

/// Stream a raw Annex B H.264 elementary stream as RTP over localhost UDP.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// File containing a raw Annex B H.264 elementary stream.
    input_path: PathBuf,

    /// Frame rate used to derive the RTP timestamp step (90000 / fps).
    #[arg(default_value_t = 30)]
    fps: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = StreamConfig::new(cli.input_path.clone(), cli.fps)?;

    write_sdp_companion(&config)?;

    pipeline::run(config).await?;
    Ok(())
}

/// Scans the input for SPS/PPS and writes the `.sdp` file alongside it.
fn write_sdp_companion(config: &StreamConfig) -> Result<(), StreamError> {
    let bytes = ByteSource::open(&config.input_path)?;
    let params = sdp::scan_parameter_sets(&bytes);

    let body = sdp::render(
        &config.destination.ip().to_string(),
        config.destination.port(),
        &params,
    );

    let sdp_path = config.input_path.with_extension("sdp");
    std::fs::write(&sdp_path, body)?;
    Ok(())
}
