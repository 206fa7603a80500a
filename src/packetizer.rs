//! RFC 6184 packetizer: single-NAL vs FU-A decision, parameter-set
//! cache/resend policy, and RTP sequence/timestamp state.
//!
//! Field layout favors explicit flags over an enum state machine
//! (`pending_sps`, `pending_pps`, `held_nal`, and so on), one flag per
//! decision the scheduler in `next_packet` has to make on each call.

use log::debug;

use crate::nal::{kind, Nal};
use crate::queue::QueueReceiver;
use crate::rtp::{FuAHeader, FuAIndicator, RtpHeader, RtpPacket, RtpPayload};

/// How many non-SPS/PPS-bearing NALs may pass before a cached parameter
/// set is proactively resent.
const PARAM_RESEND_INTERVAL: u32 = 100;

pub struct Packetizer {
    input: QueueReceiver<Nal>,

    sequence_number: u16,
    timestamp: u32,
    ssrc: u32,
    mtu: u32,
    timestamp_step: u32,

    /// The NAL currently being fragmented, and how many payload bytes of
    /// it (excluding the header byte) have already been emitted.
    current_nal: Option<Nal>,
    fragment_offset: u32,

    cached_sps: Option<Nal>,
    cached_pps: Option<Nal>,
    pending_sps: bool,
    pending_pps: bool,
    packets_since_param_resend: u32,

    /// A NAL already pulled off the queue whose own emission is deferred
    /// until pending SPS/PPS resends drain (an IDR or a periodic resend
    /// trigger holds its NAL here while the cached parameter sets go out
    /// first, expressed as a loop rather than recursion).
    held_nal: Option<Nal>,
}

impl Packetizer {
    pub fn new(input: QueueReceiver<Nal>, ssrc: u32, mtu: u32, timestamp_step: u32) -> Self {
        Packetizer {
            input,
            sequence_number: 0,
            timestamp: 0,
            ssrc,
            mtu,
            timestamp_step,
            current_nal: None,
            fragment_offset: 0,
            cached_sps: None,
            cached_pps: None,
            pending_sps: false,
            pending_pps: false,
            packets_since_param_resend: 0,
            held_nal: None,
        }
    }

    fn single_nal_budget(&self) -> u32 {
        self.mtu - crate::rtp::RTP_HEADER_LEN
    }

    fn fragment_budget(&self) -> u32 {
        self.mtu - crate::rtp::RTP_HEADER_LEN - crate::rtp::FUA_HEADER_LEN
    }

    fn next_sequence(&mut self) -> u16 {
        let seq = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);
        seq
    }

    /// Returns the next packet, or `None` once the NAL queue is closed and
    /// drained and no fragment or pending parameter set remains.
    pub fn next_packet(&mut self) -> Option<RtpPacket> {
        loop {
            if self.current_nal.is_some() {
                return Some(self.emit_fragment());
            }

            if self.pending_sps {
                self.pending_sps = false;
                self.packets_since_param_resend = 0;
                if let Some(nal) = self.cached_sps {
                    return Some(self.emit_nal(nal));
                }
                continue;
            }

            if self.pending_pps {
                self.pending_pps = false;
                self.packets_since_param_resend = 0;
                if let Some(nal) = self.cached_pps {
                    return Some(self.emit_nal(nal));
                }
                continue;
            }

            // A held NAL already ran through its per-NAL processing below
            // once (that is what produced the hold); only its deferred
            // "Finally" emission remains, so skip straight to it instead
            // of re-matching its kind (which would re-trigger the very
            // resend that deferred it).
            if let Some(nal) = self.held_nal.take() {
                return Some(self.emit_nal(nal));
            }

            let nal = match self.input.get() {
                Some(nal) => nal,
                None => return None,
            };

            match nal.header.kind() {
                kind::SPS => {
                    debug!("cached SPS updated (offset={})", nal.start_off);
                    self.cached_sps = Some(nal);
                    return Some(self.emit_nal(nal));
                }
                kind::PPS => {
                    debug!("cached PPS updated (offset={})", nal.start_off);
                    self.cached_pps = Some(nal);
                    return Some(self.emit_nal(nal));
                }
                kind::SLICE_IDR => {
                    self.pending_sps = self.cached_sps.is_some();
                    self.pending_pps = self.cached_pps.is_some();
                    if self.pending_sps || self.pending_pps {
                        debug!("IDR triggers cached parameter-set resend");
                        // Defer this IDR's own emission until the cached
                        // parameter sets have been resent.
                        self.held_nal = Some(nal);
                        continue;
                    }
                    return Some(self.emit_nal(nal));
                }
                _ => {
                    self.packets_since_param_resend += 1;
                    if self.packets_since_param_resend >= PARAM_RESEND_INTERVAL
                        && (self.cached_sps.is_some() || self.cached_pps.is_some())
                    {
                        debug!("periodic parameter-set resend interval reached");
                        self.pending_sps = self.cached_sps.is_some();
                        self.pending_pps = self.cached_pps.is_some();
                        self.held_nal = Some(nal);
                        continue;
                    }
                    return Some(self.emit_nal(nal));
                }
            }
        }
    }

    fn emit_nal(&mut self, nal: Nal) -> RtpPacket {
        self.timestamp = self.timestamp.wrapping_add(self.timestamp_step);
        if nal.size() as u32 <= self.single_nal_budget() {
            self.emit_single_nal(nal)
        } else {
            self.current_nal = Some(nal);
            self.fragment_offset = 0;
            self.emit_fragment()
        }
    }

    fn emit_single_nal(&mut self, nal: Nal) -> RtpPacket {
        let marker = nal.header.is_vcl();
        let header = RtpHeader {
            marker,
            sequence_number: self.next_sequence(),
            timestamp: self.timestamp,
            ssrc: self.ssrc,
        };
        RtpPacket {
            header,
            payload: RtpPayload::SingleNal {
                nal_offset: nal.start_off,
                nal_len: nal.size() as u32,
            },
        }
    }

    fn emit_fragment(&mut self) -> RtpPacket {
        let nal = self.current_nal.expect("emit_fragment requires current_nal");
        let payload_total = nal.payload_len() as u32;
        let remaining = payload_total - self.fragment_offset;
        let take = remaining.min(self.fragment_budget());

        let start = self.fragment_offset == 0;
        let end = self.fragment_offset + take == payload_total;

        let payload_offset = nal.payload_start() + self.fragment_offset as u64;

        let marker = end && nal.header.is_vcl();
        let header = RtpHeader {
            marker,
            sequence_number: self.next_sequence(),
            timestamp: self.timestamp,
            ssrc: self.ssrc,
        };
        let payload = RtpPayload::FuA {
            indicator: FuAIndicator {
                nal_ref_idc: nal.header.nal_ref_idc(),
            },
            fu_header: FuAHeader {
                start,
                end,
                original_kind: nal.header.kind(),
            },
            payload_offset,
            payload_len: take,
        };

        self.fragment_offset += take;
        if start {
            debug!("fragmentation start (nal size={})", nal.size());
        }
        if end {
            debug!("fragmentation end");
            self.current_nal = None;
            self.fragment_offset = 0;
        }

        RtpPacket { header, payload }
    }
}

impl Iterator for Packetizer {
    type Item = RtpPacket;

    fn next(&mut self) -> Option<RtpPacket> {
        self.next_packet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nal::NalHeader;
    use crate::queue;
    use crate::rtp::RtpPayload;

    fn nal(kind: u8, start_off: u64, size: u64) -> Nal {
        Nal {
            header: NalHeader::from_byte(kind),
            start_off,
            end_off: start_off + size,
        }
    }

    fn feed(nals: Vec<Nal>) -> Packetizer {
        let (tx, rx) = queue::channel(1024);
        for n in nals {
            tx.put(n).unwrap();
        }
        tx.close();
        Packetizer::new(rx, 0x1122_3344, 1500, 3000)
    }

    /// SPS, PPS, IDR in the stream produces SPS-update, PPS-update,
    /// cache-resend-SPS, cache-resend-PPS, IDR (five packets for three
    /// source NALs): an in-stream parameter set both updates the cache and
    /// is itself emitted, and the following IDR still triggers a resend of
    /// that (identical) cached data.
    #[test]
    fn idr_triggers_resend_of_cached_parameter_sets() {
        let sps = nal(kind::SPS, 4, 2);
        let pps = nal(kind::PPS, 9, 2);
        let idr = nal(kind::SLICE_IDR, 15, 3);
        let mut p = feed(vec![sps, pps, idr]);

        let p1 = p.next_packet().unwrap();
        assert_eq!(p1.payload, RtpPayload::SingleNal { nal_offset: 4, nal_len: 2 });

        let p2 = p.next_packet().unwrap();
        assert_eq!(p2.payload, RtpPayload::SingleNal { nal_offset: 9, nal_len: 2 });

        let p3 = p.next_packet().unwrap();
        assert_eq!(p3.payload, RtpPayload::SingleNal { nal_offset: 4, nal_len: 2 });

        let p4 = p.next_packet().unwrap();
        assert_eq!(p4.payload, RtpPayload::SingleNal { nal_offset: 9, nal_len: 2 });

        let p5 = p.next_packet().unwrap();
        assert_eq!(p5.payload, RtpPayload::SingleNal { nal_offset: 15, nal_len: 3 });

        assert!(p.next_packet().is_none());

        // Sequence numbers strictly increase by one.
        for (i, pkt) in [p1, p2, p3, p4, p5].iter().enumerate() {
            assert_eq!(pkt.header.sequence_number, i as u16);
        }
    }

    /// mtu=1200, payload budget = 1188 (incl. header byte). A NAL of
    /// exactly that size is SingleNal; one byte larger fragments into two,
    /// tiling the 1188 payload bytes as 1186 + 2 (fragment budget is
    /// mtu - 12 - 2 = 1186, so `take = min(remaining, mtu - 14)`).
    #[test]
    fn fragments_at_mtu_boundary() {
        let (tx, rx) = queue::channel(8);
        tx.put(nal(kind::SLICE_NON_IDR, 0, 1188)).unwrap();
        tx.close();
        let mut p = Packetizer::new(rx, 1, 1200, 3000);
        let pkt = p.next_packet().unwrap();
        assert_eq!(
            pkt.payload,
            RtpPayload::SingleNal { nal_offset: 0, nal_len: 1188 }
        );
        assert!(p.next_packet().is_none());

        let (tx, rx) = queue::channel(8);
        tx.put(nal(kind::SLICE_NON_IDR, 0, 1189)).unwrap();
        tx.close();
        let mut p = Packetizer::new(rx, 1, 1200, 3000);
        let f1 = p.next_packet().unwrap();
        let f2 = p.next_packet().unwrap();
        assert!(p.next_packet().is_none());
        match (f1.payload, f2.payload) {
            (
                RtpPayload::FuA { payload_len: l1, fu_header: h1, .. },
                RtpPayload::FuA { payload_len: l2, fu_header: h2, .. },
            ) => {
                assert_eq!(l1, 1186);
                assert_eq!(l2, 2);
                assert!(h1.start && !h1.end);
                assert!(!h2.start && h2.end);
            }
            _ => panic!("expected two FU-A fragments"),
        }
        assert!(!f1.header.marker);
        assert!(f2.header.marker);
    }

    /// 200 non-VCL NALs then an IDR, nothing cached: the periodic resend
    /// interval passes with no effect, and the IDR emits alone.
    #[test]
    fn no_cached_parameter_sets_means_no_resend() {
        let mut nals: Vec<Nal> = (0..200)
            .map(|i| nal(kind::SEI, i * 10, 4))
            .collect();
        nals.push(nal(kind::SLICE_IDR, 2100, 5));
        let count = nals.len();
        let mut p = feed(nals);
        let mut emitted = 0;
        while p.next_packet().is_some() {
            emitted += 1;
        }
        assert_eq!(emitted, count);
    }

    /// fps=30 => timestamp_step=3000. Five 500-byte VCL NALs emit as
    /// five SingleNal packets with increasing timestamps and marker=1.
    #[test]
    fn single_nal_timestamps_advance_by_step_with_marker_set() {
        let nals: Vec<Nal> = (0..5)
            .map(|i| nal(kind::SLICE_NON_IDR, i * 1000, 500))
            .collect();
        let mut p = feed(nals);
        for i in 0..5u32 {
            let pkt = p.next_packet().unwrap();
            assert_eq!(pkt.header.timestamp, (i + 1) * 3000);
            assert_eq!(pkt.header.sequence_number, i as u16);
            assert!(pkt.header.marker);
        }
        assert!(p.next_packet().is_none());
    }

    /// One 5000-byte VCL NAL, mtu=1200 => ceil(4999/1186) = 5 FU-A
    /// fragments tiling [1, 5000), S only on first, E only on last.
    #[test]
    fn large_nal_fragments_tile_payload_exactly() {
        let (tx, rx) = queue::channel(8);
        tx.put(nal(kind::SLICE_IDR, 100, 5000)).unwrap();
        tx.close();
        let mut p = Packetizer::new(rx, 1, 1200, 3000);

        let mut fragments = Vec::new();
        while let Some(pkt) = p.next_packet() {
            fragments.push(pkt);
        }
        assert_eq!(fragments.len(), 5);

        let first_ts = fragments[0].header.timestamp;
        let mut cursor = 101u64; // payload_start = start_off + 1
        for (i, pkt) in fragments.iter().enumerate() {
            assert_eq!(pkt.header.timestamp, first_ts);
            match pkt.payload {
                RtpPayload::FuA {
                    fu_header,
                    payload_offset,
                    payload_len,
                    ..
                } => {
                    assert_eq!(payload_offset, cursor);
                    assert_eq!(fu_header.start, i == 0);
                    assert_eq!(fu_header.end, i == fragments.len() - 1);
                    cursor += payload_len as u64;
                }
                _ => panic!("expected FU-A"),
            }
        }
        assert_eq!(cursor, 100 + 5000); // tiled exactly [1,5000) relative to NAL start
        assert!(fragments[4].header.marker);
        assert!(!fragments[0..4].iter().any(|p| p.header.marker));
    }
}
