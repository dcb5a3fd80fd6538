//! Wire format for frame packets.
//!
//! Every datagram carries one slice of a compressed image behind a fixed
//! 12-byte header (little-endian):
//!
//! ```text
//! frame_id:       u32  (4)
//! total_packets:  u16  (2)
//! packet_index:   u16  (2)   0-based
//! payload_len:    u32  (4)
//! payload:        [u8] (payload_len)
//! ```
//!
//! The frame identifier is carried at its full 32-bit width through the
//! whole engine; two frames whose ids share the low 16 bits are still
//! distinct frames.

use crate::error::{CoreError, Rejection};

// ── Constants ────────────────────────────────────────────────────

/// Size of the fixed packet header.
pub const HEADER_SIZE: usize = 12;

/// Start-of-image marker; the payload of packet 0 must begin with it.
pub const SOI_MARKER: [u8; 2] = [0xFF, 0xD8];

/// End-of-image marker; must appear near the end of a finalized frame.
pub const EOI_MARKER: [u8; 2] = [0xFF, 0xD9];

// ── PacketHeader ─────────────────────────────────────────────────

/// Fixed header prepended to every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub frame_id: u32,
    pub total_packets: u16,
    pub index: u16,
    pub payload_len: u32,
}

impl PacketHeader {
    /// Encoded size on the wire.
    pub const SIZE: usize = HEADER_SIZE;

    /// Serialize to bytes (little-endian).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.frame_id.to_le_bytes());
        buf[4..6].copy_from_slice(&self.total_packets.to_le_bytes());
        buf[6..8].copy_from_slice(&self.index.to_le_bytes());
        buf[8..12].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    /// Deserialize from the front of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, Rejection> {
        let Some(h) = data.get(..Self::SIZE) else {
            return Err(Rejection::MalformedHeader { len: data.len() });
        };
        Ok(Self {
            frame_id: u32::from_le_bytes([h[0], h[1], h[2], h[3]]),
            total_packets: u16::from_le_bytes([h[4], h[5]]),
            index: u16::from_le_bytes([h[6], h[7]]),
            payload_len: u32::from_le_bytes([h[8], h[9], h[10], h[11]]),
        })
    }
}

// ── Packet ───────────────────────────────────────────────────────

/// A parsed, borrowed view of one datagram.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    header: PacketHeader,
    payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Parse a datagram and check every header field that can be checked
    /// without engine state.
    ///
    /// `max_packets` is the number of packet indices the receipt record
    /// can track; frames declaring more are refused outright.
    pub fn parse(datagram: &'a [u8], max_packets: usize) -> Result<Self, Rejection> {
        let header = PacketHeader::decode(datagram)?;
        let payload = &datagram[HEADER_SIZE..];

        if header.payload_len as usize != payload.len() {
            return Err(Rejection::SizeMismatch {
                declared: header.payload_len,
                actual: payload.len(),
            });
        }
        if header.total_packets == 0 || header.total_packets as usize > max_packets {
            return Err(Rejection::BadTotalCount {
                total: header.total_packets,
            });
        }
        if header.index >= header.total_packets {
            return Err(Rejection::IndexOutOfRange {
                index: header.index,
                total: header.total_packets,
            });
        }

        Ok(Self { header, payload })
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn frame_id(&self) -> u32 {
        self.header.frame_id
    }

    pub fn index(&self) -> u16 {
        self.header.index
    }

    pub fn total_packets(&self) -> u16 {
        self.header.total_packets
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Whether this packet opens a new frame.
    pub fn is_first(&self) -> bool {
        self.header.index == 0
    }
}

// ── Packetizing ──────────────────────────────────────────────────

/// Split `frame` into datagrams of at most `max_payload` payload bytes.
///
/// This mirrors what a sender does; the receiver never calls it, but it
/// is the easiest way to produce well-formed traffic for tests and
/// loopback tools.
pub fn packetize(frame_id: u32, frame: &[u8], max_payload: usize) -> Result<Vec<Vec<u8>>, CoreError> {
    if max_payload == 0 {
        return Err(CoreError::InvalidConfig("max_payload must be non-zero".into()));
    }

    let count = frame.len().div_ceil(max_payload).max(1);
    let total = u16::try_from(count).map_err(|_| CoreError::TooManyPackets {
        packets: count,
        max: u16::MAX as usize,
    })?;

    let mut chunks: Vec<&[u8]> = frame.chunks(max_payload).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }

    let packets = chunks
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| {
            let header = PacketHeader {
                frame_id,
                total_packets: total,
                index: idx as u16,
                payload_len: chunk.len() as u32,
            };
            let mut pkt = Vec::with_capacity(HEADER_SIZE + chunk.len());
            pkt.extend_from_slice(&header.encode());
            pkt.extend_from_slice(chunk);
            pkt
        })
        .collect();

    Ok(packets)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn datagram(frame_id: u32, total: u16, index: u16, declared: u32, payload: &[u8]) -> Vec<u8> {
        let header = PacketHeader {
            frame_id,
            total_packets: total,
            index,
            payload_len: declared,
        };
        let mut out = header.encode().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn header_layout_is_little_endian() {
        let hdr = PacketHeader {
            frame_id: 0x0403_0201,
            total_packets: 0x0605,
            index: 0x0807,
            payload_len: 0x0C0B_0A09,
        };
        assert_eq!(hdr.encode(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(PacketHeader::decode(&hdr.encode()).unwrap(), hdr);
    }

    #[test]
    fn short_datagram_is_malformed() {
        let err = Packet::parse(&[0u8; 11], 500).unwrap_err();
        assert_eq!(err, Rejection::MalformedHeader { len: 11 });
    }

    #[test]
    fn declared_length_must_match() {
        let dg = datagram(1, 1, 0, 100, &[0xAA; 90]);
        let err = Packet::parse(&dg, 500).unwrap_err();
        assert_eq!(
            err,
            Rejection::SizeMismatch {
                declared: 100,
                actual: 90
            }
        );
    }

    #[test]
    fn index_beyond_total_is_rejected() {
        let dg = datagram(1, 3, 5, 4, &[1, 2, 3, 4]);
        let err = Packet::parse(&dg, 500).unwrap_err();
        assert_eq!(err, Rejection::IndexOutOfRange { index: 5, total: 3 });
    }

    #[test]
    fn zero_or_excessive_total_is_rejected() {
        let dg = datagram(1, 0, 0, 0, &[]);
        assert_eq!(
            Packet::parse(&dg, 500).unwrap_err(),
            Rejection::BadTotalCount { total: 0 }
        );

        let dg = datagram(1, 501, 0, 0, &[]);
        assert_eq!(
            Packet::parse(&dg, 500).unwrap_err(),
            Rejection::BadTotalCount { total: 501 }
        );
    }

    #[test]
    fn parse_exposes_fields() {
        let dg = datagram(0xDEAD_BEEF, 4, 2, 3, &[7, 8, 9]);
        let pkt = Packet::parse(&dg, 500).unwrap();
        assert_eq!(pkt.frame_id(), 0xDEAD_BEEF);
        assert_eq!(pkt.index(), 2);
        assert_eq!(pkt.total_packets(), 4);
        assert_eq!(pkt.payload(), &[7, 8, 9]);
        assert!(!pkt.is_first());
    }

    #[test]
    fn packetize_splits_on_payload_boundary() {
        let frame: Vec<u8> = (0..=250u8).collect();
        let packets = packetize(9, &frame, 100).unwrap();
        assert_eq!(packets.len(), 3);

        let last = Packet::parse(&packets[2], 500).unwrap();
        assert_eq!(last.total_packets(), 3);
        assert_eq!(last.index(), 2);
        assert_eq!(last.payload().len(), 51);
    }

    #[test]
    fn packetize_refuses_zero_payload() {
        assert!(packetize(1, &[1, 2, 3], 0).is_err());
    }
}
