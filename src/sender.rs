//! Paced UDP Sender. Serializes packet descriptors bit-exactly and
//! schedules transmission against the 90 kHz media clock.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace, warn};
use tokio::net::UdpSocket;
use tokio::time::Duration;

use crate::byte_source::ByteSource;
use crate::config::CLOCK_RATE;
use crate::error::{StreamError, StreamResult};
use crate::queue::QueueReceiver;
use crate::rtp::RtpPacket;

/// Never sleep for >= 1s between packets: a gap that large signals a
/// timestamp discontinuity, not real pacing.
const MAX_SANE_DELTA_TICKS: u32 = CLOCK_RATE;

pub struct Sender {
    socket: UdpSocket,
    destination: SocketAddr,
    bytes: Arc<ByteSource>,
    input: QueueReceiver<RtpPacket>,
    previous_timestamp: Option<u32>,
}

impl Sender {
    pub async fn bind(
        destination: SocketAddr,
        bytes: Arc<ByteSource>,
        input: QueueReceiver<RtpPacket>,
    ) -> StreamResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| StreamError::Network(format!("bind failed: {e}")))?;
        socket
            .connect(destination)
            .await
            .map_err(|e| StreamError::Network(format!("connect failed: {e}")))?;

        Ok(Sender {
            socket,
            destination,
            bytes,
            input,
            previous_timestamp: None,
        })
    }

    /// Consumes packet descriptors until the queue is closed and drained,
    /// sending each as one UDP datagram.
    pub async fn run(&mut self) -> StreamResult<()> {
        let mut wire = Vec::with_capacity(1500);
        let mut start_time = Instant::now();

        while let Some(packet) = self.input.get_async().await {
            self.pace(packet.header.timestamp, &mut start_time).await;

            packet.serialize(&self.bytes, &mut wire);
            self.socket
                .send(&wire)
                .await
                .map_err(|e| StreamError::Network(format!("send to {} failed: {e}", self.destination)))?;

            trace!(
                "sent seq={} ts={} marker={} bytes={}",
                packet.header.sequence_number,
                packet.header.timestamp,
                packet.header.marker,
                wire.len()
            );

            self.previous_timestamp = Some(packet.header.timestamp);
        }

        debug!("packet queue drained, sender stopping");
        Ok(())
    }

    async fn pace(&mut self, timestamp: u32, start_time: &mut Instant) {
        if let Some(previous) = self.previous_timestamp {
            let delta_ticks = timestamp.wrapping_sub(previous);
            if delta_ticks >= MAX_SANE_DELTA_TICKS {
                warn!(
                    "pacing gap of {delta_ticks} ticks exceeds sanity bound, not sleeping \
                     (timestamp discontinuity?)"
                );
            } else if let Some(target_ns) = target_sleep_ns(delta_ticks) {
                let elapsed_ns = start_time.elapsed().as_nanos() as u64;
                if target_ns > elapsed_ns {
                    tokio::time::sleep(Duration::from_nanos(target_ns - elapsed_ns)).await;
                }
            }
        }
        *start_time = Instant::now();
    }
}

/// How long to hold back transmission for a gap of `delta_ticks` on the
/// 90 kHz media clock, or `None` if the gap is zero (no pacing needed).
/// `delta_ticks` must already be sanity-filtered by the caller.
fn target_sleep_ns(delta_ticks: u32) -> Option<u64> {
    if delta_ticks == 0 {
        return None;
    }
    Some((delta_ticks as u64) * 1_000_000_000 / CLOCK_RATE as u64)
}
