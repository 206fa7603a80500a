//! SDP companion contract: the scan for SPS/PPS that seeds
//! `sprop-parameter-sets`. Writing the `.sdp` file itself is a one-line
//! `std::fs::write` left to `main.rs`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::byte_source::ByteSource;
use crate::nal::{kind, NalParser};

/// The SPS/PPS bytes (full NAL, header byte included) found by scanning
/// the input, if any.
#[derive(Debug, Default, Clone)]
pub struct ParameterSets {
    pub sps: Option<Vec<u8>>,
    pub pps: Option<Vec<u8>>,
}

/// Scans the input for the first NAL of kind 7 (SPS) and kind 8 (PPS).
pub fn scan_parameter_sets(bytes: &ByteSource) -> ParameterSets {
    let mut found = ParameterSets::default();
    let mut parser = NalParser::new(bytes);

    while let Some(nal) = parser.next_nal() {
        match nal.header.kind() {
            kind::SPS if found.sps.is_none() => {
                found.sps = Some(bytes.slice(nal.start_off, nal.end_off).to_vec());
            }
            kind::PPS if found.pps.is_none() => {
                found.pps = Some(bytes.slice(nal.start_off, nal.end_off).to_vec());
            }
            _ => {}
        }
        if found.sps.is_some() && found.pps.is_some() {
            break;
        }
    }

    found
}

/// Renders the SDP session description. `host` and `port` describe the
/// RTP destination; `a=fmtp` is omitted when no SPS/PPS was found.
pub fn render(host: &str, port: u16, params: &ParameterSets) -> String {
    let mut sdp = format!(
        "v=0\r\n\
         o=- 0 0 IN IP4 {host}\r\n\
         s=H264 RTP stream\r\n\
         c=IN IP4 {host}\r\n\
         t=0 0\r\n\
         m=video {port} RTP/AVP 96\r\n\
         a=rtpmap:96 H264/90000\r\n"
    );

    if let (Some(sps), Some(pps)) = (&params.sps, &params.pps) {
        let sps_b64 = BASE64.encode(sps);
        let pps_b64 = BASE64.encode(pps);
        sdp.push_str(&format!(
            "a=fmtp:96 packetization-mode=1; sprop-parameter-sets={sps_b64},{pps_b64}\r\n"
        ));
    }

    sdp
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source(bytes: &[u8]) -> (tempfile::NamedTempFile, ByteSource) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        let src = ByteSource::open(f.path()).unwrap();
        (f, src)
    }

    #[test]
    fn finds_first_sps_and_pps() {
        let bytes = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x11, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x00, 0x00,
            0x00, 0x01, 0x65, 0xAA, 0xBB,
        ];
        let (_f, src) = source(&bytes);
        let params = scan_parameter_sets(&src);
        assert_eq!(params.sps.as_deref(), Some(&[0x67, 0x42, 0x11][..]));
        assert_eq!(params.pps.as_deref(), Some(&[0x68, 0xCE][..]));
    }

    #[test]
    fn omits_fmtp_when_nothing_found() {
        let (_f, src) = source(b"no start codes here");
        let params = scan_parameter_sets(&src);
        let sdp = render("127.0.0.1", 5004, &params);
        assert!(!sdp.contains("a=fmtp"));
        assert!(sdp.contains("m=video 5004 RTP/AVP 96"));
    }

    #[test]
    fn includes_fmtp_when_both_found() {
        let bytes = [
            0x00, 0x00, 0x01, 0x67, 0xAA, 0x00, 0x00, 0x01, 0x68, 0xBB,
        ];
        let (_f, src) = source(&bytes);
        let params = scan_parameter_sets(&src);
        let sdp = render("127.0.0.1", 5004, &params);
        assert!(sdp.contains("a=fmtp:96 packetization-mode=1; sprop-parameter-sets="));
    }
}
