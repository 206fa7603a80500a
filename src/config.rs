use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{StreamError, StreamResult};

/// RTP clock rate used for H.264 (RFC 6184): one second = 90000 ticks.
pub const CLOCK_RATE: u32 = 90_000;

/// Fixed SSRC this streamer identifies itself with.
pub const DEFAULT_SSRC: u32 = 0x00066E64;

/// Default UDP MTU budget; effective RTP payload is `mtu - 12`.
pub const DEFAULT_MTU: u32 = 1500;

/// Default streaming destination: localhost, standard-ish RTP video port.
pub const DEFAULT_DESTINATION: &str = "127.0.0.1:5004";

/// Fully validated, derived configuration for one streaming run.
///
/// Construction is the only place `fps` is checked; everything downstream
/// trusts `timestamp_step > 0`.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub input_path: PathBuf,
    pub fps: u32,
    pub timestamp_step: u32,
    pub ssrc: u32,
    pub mtu: u32,
    pub destination: SocketAddr,
}

impl StreamConfig {
    pub fn new(input_path: PathBuf, fps: u32) -> StreamResult<Self> {
        if fps == 0 || fps > CLOCK_RATE {
            return Err(StreamError::Config(format!(
                "fps must be in 1..={CLOCK_RATE}, got {fps}"
            )));
        }

        let destination = DEFAULT_DESTINATION
            .parse()
            .map_err(|e| StreamError::Config(format!("invalid destination address: {e}")))?;

        Ok(StreamConfig {
            input_path,
            fps,
            timestamp_step: CLOCK_RATE / fps,
            ssrc: DEFAULT_SSRC,
            mtu: DEFAULT_MTU,
            destination,
        })
    }

}
