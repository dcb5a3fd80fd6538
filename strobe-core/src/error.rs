//! Error types for the strobe engine.
//!
//! Two families live here:
//!
//! - [`CoreError`]: returned by fallible setup operations (configuration,
//!   buffer allocation, socket I/O). Startup failures are fatal to the
//!   caller; nothing in the engine runs in a degraded mode.
//! - [`Rejection`]: the reason a single packet was refused by the
//!   assembler. Rejections are outcomes, not failures: lossy transport
//!   noise is expected and never propagated with `?`.

use thiserror::Error;

/// The canonical error type for engine setup and I/O.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Resources ────────────────────────────────────────────────
    /// Not enough free memory to allocate the fixed-capacity buffers.
    #[error("insufficient memory: need {needed} bytes, {available} available")]
    InsufficientMemory { needed: u64, available: u64 },

    /// A fixed-capacity buffer could not be reserved.
    #[error("failed to allocate {what} ({bytes} bytes)")]
    Allocation { what: &'static str, bytes: usize },

    // ── Framing ──────────────────────────────────────────────────
    /// A frame needs more packets than the wire format can index.
    #[error("frame too large to packetize: {packets} packets (max {max})")]
    TooManyPackets { packets: usize, max: usize },

    // ── I/O ──────────────────────────────────────────────────────
    /// The socket or filesystem layer reported an error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Rejection ────────────────────────────────────────────────────

/// Why the assembler refused a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The datagram is shorter than the fixed header.
    #[error("malformed header: {len} bytes")]
    MalformedHeader { len: usize },

    /// Declared payload length differs from the bytes actually received.
    #[error("payload size mismatch: declared {declared}, received {actual}")]
    SizeMismatch { declared: u32, actual: usize },

    /// Packet index is not below the declared total.
    #[error("packet index {index} out of range (total {total})")]
    IndexOutOfRange { index: u16, total: u16 },

    /// Total packet count is zero or above the trackable maximum.
    #[error("bad total packet count: {total}")]
    BadTotalCount { total: u16 },

    /// This index was already received for the in-flight frame.
    #[error("duplicate packet index {index}")]
    DuplicateIndex { index: u16 },

    /// Continuation packet for a frame that is not being assembled.
    #[error("packet for frame {frame_id} does not match the in-flight frame")]
    FrameMismatch { frame_id: u32 },

    /// Appending the payload would exceed the frame capacity.
    #[error("frame would exceed {max} bytes")]
    Overflow { max: usize },

    /// First packet of a frame lacks the start-of-image marker.
    #[error("first packet lacks the start-of-image marker")]
    InvalidLeadingMarker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = CoreError::InsufficientMemory {
            needed: 90_000,
            available: 40_000,
        };
        assert!(e.to_string().contains("90000"));
        assert!(e.to_string().contains("40000"));

        let r = Rejection::SizeMismatch {
            declared: 100,
            actual: 90,
        };
        assert!(r.to_string().contains("100"));
        assert!(r.to_string().contains("90"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let e: CoreError = io_err.into();
        assert!(matches!(e, CoreError::Io(_)));
    }
}
