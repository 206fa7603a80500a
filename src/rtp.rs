//! RTP header, FU-A header, and the `RtpPacket` wire descriptor (RFC 3550 +
//! RFC 6184): the 12-byte header layout, the FU-A indicator/header bit
//! positions, and the convention that a NAL's header byte is the first
//! byte of a single-NAL payload.

pub const RTP_HEADER_LEN: u32 = 12;
pub const FUA_HEADER_LEN: u32 = 2;
pub const PAYLOAD_TYPE: u8 = 96;
pub const FUA_TYPE: u8 = 28;

/// 12-byte RTP header (RFC 3550 §5.1). Sequence and timestamp wrap modulo
/// 2^16 / 2^32 and are never otherwise bounds-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        // version=2, padding=0, extension=0, csrc_count=0
        out.push(0b1000_0000);
        out.push(((self.marker as u8) << 7) | PAYLOAD_TYPE);
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
    }
}

/// FU indicator byte: `F(1)=0 | NRI(2) | Type(5)=28`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuAIndicator {
    pub nal_ref_idc: u8,
}

impl FuAIndicator {
    pub fn byte(&self) -> u8 {
        (self.nal_ref_idc & 0b11) << 5 | FUA_TYPE
    }
}

/// FU header byte: `S(1) | E(1) | R(1)=0 | Type(5)=original NAL kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuAHeader {
    pub start: bool,
    pub end: bool,
    pub original_kind: u8,
}

impl FuAHeader {
    pub fn byte(&self) -> u8 {
        ((self.start as u8) << 7) | ((self.end as u8) << 6) | (self.original_kind & 0b0001_1111)
    }
}

/// One RTP packet's worth of work: a header plus a payload addressed by
/// offsets into the Byte Source. No payload bytes are copied until the
/// Sender serializes the packet onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpPayload {
    /// The NAL's header byte plus its full body, read verbatim as the RTP
    /// payload (RFC 6184 §5.6): `[nal_offset, nal_offset + nal_len)`.
    SingleNal { nal_offset: u64, nal_len: u32 },
    /// One FU-A fragment: FU indicator + FU header, followed by
    /// `[payload_offset, payload_offset + payload_len)`.
    FuA {
        indicator: FuAIndicator,
        fu_header: FuAHeader,
        payload_offset: u64,
        payload_len: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: RtpPayload,
}

impl RtpPacket {
    /// Serializes this packet bit-exactly, reading payload bytes
    /// positionally from `bytes`.
    pub fn serialize(&self, bytes: &crate::byte_source::ByteSource, out: &mut Vec<u8>) {
        out.clear();
        self.header.write_to(out);
        match self.payload {
            RtpPayload::SingleNal { nal_offset, nal_len } => {
                out.extend_from_slice(bytes.slice(nal_offset, nal_offset + nal_len as u64));
            }
            RtpPayload::FuA {
                indicator,
                fu_header,
                payload_offset,
                payload_len,
            } => {
                out.push(indicator.byte());
                out.push(fu_header.byte());
                out.extend_from_slice(
                    bytes.slice(payload_offset, payload_offset + payload_len as u64),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::ByteSource;
    use std::io::Write;

    #[test]
    fn header_serializes_bit_exact() {
        let header = RtpHeader {
            marker: true,
            sequence_number: 0x1234,
            timestamp: 0xAABBCCDD,
            ssrc: 0x00066E64,
        };
        let mut out = Vec::new();
        header.write_to(&mut out);
        assert_eq!(out.len(), 12);
        assert_eq!(out[0], 0b1000_0000);
        assert_eq!(out[1], 0b1110_0000); // marker=1, pt=96=0b1100000
        assert_eq!(&out[2..4], &[0x12, 0x34]);
        assert_eq!(&out[4..8], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&out[8..12], &[0x00, 0x06, 0x6E, 0x64]);
    }

    #[test]
    fn fua_indicator_and_header_bits() {
        let indicator = FuAIndicator { nal_ref_idc: 3 };
        assert_eq!(indicator.byte(), 0b0111_1100);

        let start = FuAHeader {
            start: true,
            end: false,
            original_kind: 5,
        };
        assert_eq!(start.byte(), 0b1000_0101);

        let end = FuAHeader {
            start: false,
            end: true,
            original_kind: 5,
        };
        assert_eq!(end.byte(), 0b0100_0101);
    }

    #[test]
    fn single_nal_serializes_header_byte_as_first_payload_byte() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0x65, 0xAA, 0xBB]).unwrap();
        f.flush().unwrap();
        let src = ByteSource::open(f.path()).unwrap();

        let packet = RtpPacket {
            header: RtpHeader {
                marker: true,
                sequence_number: 0,
                timestamp: 3000,
                ssrc: 1,
            },
            payload: RtpPayload::SingleNal {
                nal_offset: 0,
                nal_len: 3,
            },
        };
        let mut out = Vec::new();
        packet.serialize(&src, &mut out);
        assert_eq!(out.len(), 15);
        assert_eq!(&out[12..], &[0x65, 0xAA, 0xBB]);
    }
}
