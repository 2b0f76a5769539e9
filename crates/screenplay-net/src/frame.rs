// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pure byte-level framing: `u32 endpoint_id, u32 payload_size, payload`,
//! all big-endian. Kept free of sockets so the accumulator logic is
//! testable against plain buffers.

/// Size in bytes of a frame header (two big-endian `u32`s).
pub const HEADER_LEN: usize = 8;

/// Encode a single frame: header followed by `payload`.
#[must_use]
pub fn encode(endpoint_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&endpoint_id.to_be_bytes());
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// A decoded frame header, read without yet knowing the full payload has
/// arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// The endpoint this frame targets.
    pub endpoint_id: u32,
    /// The declared payload length.
    pub payload_size: u32,
}

/// Parse a header from the first [`HEADER_LEN`] bytes of `buf`, if present.
#[must_use]
pub fn read_header(buf: &[u8]) -> Option<Header> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let endpoint_id = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let payload_size = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    Some(Header {
        endpoint_id,
        payload_size,
    })
}

/// What [`FrameAccumulator::poll_frame`] learned from the bytes fed so far.
#[derive(Debug)]
pub enum PollOutcome<R> {
    /// Not enough bytes are buffered yet to make a decision.
    Pending,
    /// A frame whose header passed validation, with its full payload.
    Frame(Header, Vec<u8>),
    /// A frame whose header failed validation. Its declared payload is now
    /// being discarded as it arrives rather than buffered; the header and
    /// the validator's rejection reason are returned for logging.
    Rejected(Header, R),
}

/// Accumulates bytes read off a socket and pops off complete frames.
///
/// A rejected frame's payload is discarded as it streams in rather than
/// buffered in full first: `discard_remaining` tracks how many more bytes
/// of a rejected frame are still owed, so a peer that declares an
/// oversize `payload_size` is never allowed to grow `buf` past its
/// header.
#[derive(Default)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    discard_remaining: usize,
}

impl FrameAccumulator {
    /// A fresh, empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            discard_remaining: 0,
        }
    }

    /// Append freshly-read bytes. Bytes still owed to a rejected frame's
    /// discard are dropped immediately rather than buffered.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.discard_remaining == 0 {
            self.buf.extend_from_slice(bytes);
            return;
        }
        let skip = self.discard_remaining.min(bytes.len());
        self.discard_remaining -= skip;
        self.buf.extend_from_slice(&bytes[skip..]);
    }

    /// Peek the next frame's header without consuming it, if a full header
    /// has arrived.
    #[must_use]
    pub fn peek_header(&self) -> Option<Header> {
        read_header(&self.buf)
    }

    /// Pop the next complete frame's payload, if the full frame (header +
    /// declared payload) has arrived. Consumes exactly that many bytes.
    /// Performs no validation of its own — see [`Self::poll_frame`] for the
    /// cap-before-buffering variant connections actually drive on.
    pub fn pop_frame(&mut self) -> Option<(Header, Vec<u8>)> {
        let header = read_header(&self.buf)?;
        let total = HEADER_LEN + header.payload_size as usize;
        if self.buf.len() < total {
            return None;
        }
        let payload = self.buf[HEADER_LEN..total].to_vec();
        self.buf.drain(..total);
        Some((header, payload))
    }

    /// Poll for the next frame, running `validate` against its header the
    /// moment the header is readable — before any of the declared payload
    /// is buffered. A validator rejection switches the accumulator into
    /// discard mode for exactly `payload_size` more bytes and returns
    /// immediately; it never waits for a rejected frame's payload to
    /// finish arriving, so a peer lying about a multi-gigabyte payload is
    /// never buffered past its 8-byte header.
    pub fn poll_frame<R>(&mut self, mut validate: impl FnMut(&Header) -> Result<(), R>) -> PollOutcome<R> {
        if self.discard_remaining > 0 {
            return PollOutcome::Pending;
        }
        let Some(header) = self.peek_header() else {
            return PollOutcome::Pending;
        };
        if let Err(reason) = validate(&header) {
            self.buf.drain(..HEADER_LEN);
            let to_discard = header.payload_size as usize;
            let buffered = to_discard.min(self.buf.len());
            self.buf.drain(..buffered);
            self.discard_remaining = to_discard - buffered;
            return PollOutcome::Rejected(header, reason);
        }
        let total = HEADER_LEN + header.payload_size as usize;
        if self.buf.len() < total {
            return PollOutcome::Pending;
        }
        let payload = self.buf[HEADER_LEN..total].to_vec();
        self.buf.drain(..total);
        PollOutcome::Frame(header, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_pop_round_trips() {
        let frame = encode(42, b"hello");
        let mut acc = FrameAccumulator::new();
        acc.feed(&frame);
        let (header, payload) = acc.pop_frame().expect("frame present");
        assert_eq!(header.endpoint_id, 42);
        assert_eq!(header.payload_size, 5);
        assert_eq!(payload, b"hello");
        assert!(acc.pop_frame().is_none());
    }

    #[test]
    fn partial_header_yields_nothing() {
        let mut acc = FrameAccumulator::new();
        acc.feed(&[0, 0, 0, 1]);
        assert!(acc.pop_frame().is_none());
    }

    #[test]
    fn partial_payload_yields_nothing_then_completes() {
        let frame = encode(7, b"payload-bytes");
        let mut acc = FrameAccumulator::new();
        acc.feed(&frame[..frame.len() - 3]);
        assert!(acc.pop_frame().is_none());
        acc.feed(&frame[frame.len() - 3..]);
        let (header, payload) = acc.pop_frame().expect("frame present");
        assert_eq!(header.endpoint_id, 7);
        assert_eq!(payload, b"payload-bytes");
    }

    #[test]
    fn two_frames_back_to_back_both_pop() {
        let mut bytes = encode(1, b"a");
        bytes.extend_from_slice(&encode(2, b"bb"));
        let mut acc = FrameAccumulator::new();
        acc.feed(&bytes);
        let (h1, p1) = acc.pop_frame().expect("first frame");
        assert_eq!((h1.endpoint_id, p1.as_slice()), (1, b"a".as_slice()));
        let (h2, p2) = acc.pop_frame().expect("second frame");
        assert_eq!((h2.endpoint_id, p2.as_slice()), (2, b"bb".as_slice()));
    }

    #[test]
    fn zero_length_payload_pops_immediately() {
        let mut acc = FrameAccumulator::new();
        acc.feed(&encode(900, &[]));
        let (header, payload) = acc.pop_frame().expect("frame present");
        assert_eq!(header.payload_size, 0);
        assert!(payload.is_empty());
    }

    #[test]
    fn poll_frame_accepts_a_valid_header() {
        let mut acc = FrameAccumulator::new();
        acc.feed(&encode(42, b"hi"));
        match acc.poll_frame(|_: &Header| Ok::<(), ()>(())) {
            PollOutcome::Frame(header, payload) => {
                assert_eq!(header.endpoint_id, 42);
                assert_eq!(payload, b"hi");
            }
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn poll_frame_rejects_before_the_payload_is_buffered() {
        let header_bytes = encode(7, &[]);
        let mut acc = FrameAccumulator::new();
        // Feed only the 8-byte header of a frame declaring a huge payload
        // that never actually arrives.
        acc.feed(&[&header_bytes[..4], &0xFFFF_FFFFu32.to_be_bytes()].concat());
        match acc.poll_frame(|h: &Header| if h.payload_size > 16 { Err("too big") } else { Ok(()) }) {
            PollOutcome::Rejected(header, reason) => {
                assert_eq!(header.payload_size, 0xFFFF_FFFF);
                assert_eq!(reason, "too big");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        // The declared payload was never buffered.
        assert!(acc.buf.is_empty());
        assert_eq!(acc.discard_remaining, 0xFFFF_FFFF);
    }

    #[test]
    fn poll_frame_discards_a_rejected_payload_as_it_arrives() {
        let frame = encode(7, b"reject-me");
        let mut acc = FrameAccumulator::new();
        acc.feed(&frame[..HEADER_LEN]);
        assert!(matches!(
            acc.poll_frame(|_: &Header| Err::<(), _>("nope")),
            PollOutcome::Rejected(_, "nope")
        ));
        acc.feed(&frame[HEADER_LEN..]);
        assert!(acc.buf.is_empty());
        assert_eq!(acc.discard_remaining, 0);
    }

    #[test]
    fn poll_frame_resumes_normal_parsing_after_a_discard() {
        let mut bytes = encode(1, b"rejected");
        bytes.extend_from_slice(&encode(2, b"kept"));
        let mut acc = FrameAccumulator::new();
        acc.feed(&bytes);
        assert!(matches!(
            acc.poll_frame(|h: &Header| if h.endpoint_id == 1 { Err("bad") } else { Ok(()) }),
            PollOutcome::Rejected(_, "bad")
        ));
        match acc.poll_frame(|_: &Header| Ok::<(), &str>(())) {
            PollOutcome::Frame(header, payload) => {
                assert_eq!(header.endpoint_id, 2);
                assert_eq!(payload, b"kept");
            }
            other => panic!("expected Frame, got {other:?}"),
        }
    }
}
