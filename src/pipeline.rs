//! Coordinator wiring the three stages and two queues: opens the Byte
//! Source, spawns the Parser and Packetizer as blocking tasks and the
//! Sender as an async task, and awaits all three, propagating the first
//! error.

use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;

use log::{error, info};

use crate::byte_source::ByteSource;
use crate::config::StreamConfig;
use crate::error::{StreamError, StreamResult};
use crate::nal::{Nal, NalParser};
use crate::packetizer::Packetizer;
use crate::queue::{self, DEFAULT_CAPACITY};
use crate::rtp::RtpPacket;
use crate::sender::Sender;

fn join_error(e: tokio::task::JoinError) -> StreamError {
    StreamError::Io(IoError::new(ErrorKind::Other, e.to_string()))
}

/// Runs the full pipeline to completion: opens the Byte Source, spawns
/// Parser and Packetizer as blocking tasks, runs the Sender as an async
/// task, and awaits all three.
pub async fn run(config: StreamConfig) -> StreamResult<()> {
    let bytes = Arc::new(ByteSource::open(&config.input_path)?);

    if bytes.is_empty() {
        info!("input file is empty, nothing to stream");
        return Ok(());
    }

    let ssrc = config.ssrc;
    let mtu = config.mtu;
    let timestamp_step = config.timestamp_step;
    let destination = config.destination;

    let (nal_tx, nal_rx) = queue::channel::<Nal>(DEFAULT_CAPACITY);
    let (packet_tx, packet_rx) = queue::channel::<RtpPacket>(DEFAULT_CAPACITY);

    let parser_bytes = Arc::clone(&bytes);
    let parser_handle = tokio::task::spawn_blocking(move || run_parser(&parser_bytes, nal_tx));

    let packetizer_handle = tokio::task::spawn_blocking(move || {
        run_packetizer(nal_rx, packet_tx, ssrc, mtu, timestamp_step)
    });

    let sender_bytes = Arc::clone(&bytes);
    let sender_handle = tokio::task::spawn(async move {
        let mut sender = Sender::bind(destination, sender_bytes, packet_rx).await?;
        sender.run().await
    });

    let parser_result = parser_handle.await.map_err(join_error)?;
    let sender_result = sender_handle.await.map_err(join_error)?;
    packetizer_handle.await.map_err(join_error)?;

    parser_result?;
    sender_result?;

    info!("pipeline complete");
    Ok(())
}

fn run_parser(bytes: &ByteSource, output: queue::QueueSender<Nal>) -> StreamResult<()> {
    let mut parser = NalParser::new(bytes);
    let mut count = 0u64;
    while let Some(nal) = parser.next_nal() {
        if output.put(nal).is_err() {
            // Downstream closed early (cancellation); stop scanning.
            return Ok(());
        }
        count += 1;
    }
    output.close();
    info!("parser emitted {count} NALs");
    Ok(())
}

fn run_packetizer(
    input: queue::QueueReceiver<Nal>,
    output: queue::QueueSender<RtpPacket>,
    ssrc: u32,
    mtu: u32,
    timestamp_step: u32,
) {
    let mut packetizer = Packetizer::new(input, ssrc, mtu, timestamp_step);
    let mut count = 0u64;
    while let Some(packet) = packetizer.next_packet() {
        if output.put(packet).is_err() {
            error!("packet queue closed early while packetizer still had output");
            return;
        }
        count += 1;
    }
    output.close();
    info!("packetizer emitted {count} packets");
}
