use super::packet::{DATA_HEADER_SIZE, MAX_PACKET_SIZE};
use std::time::Duration;

const DEFAULT_MAX_SEQ: u16 = 60000;
const DEFAULT_WINDOW_SIZE: u16 = 2500; // bytes
const DEFAULT_CHUNK_SIZE: usize = 500; // bytes
const DEFAULT_RETRANSMIT_TIMEOUT: u64 = 500; // ms

/// Protocol knobs shared by the sender and receiver engines.
/// Both ends of a transfer must agree on the window size.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Upper bound of the sequence space; reaching it triggers an epoch reset
    max_seq: u16,

    /// The span of bytes permitted in flight beyond the cumulative boundary
    window_size: u16,

    /// Payload bytes cut from the source per data packet
    chunk_size: usize,

    /// How long an unacknowledged chunk may wait before being resent.
    /// Also bounds each acknowledgement receive attempt.
    retransmit_timeout: Duration,
}

impl TransferConfig {
    pub fn default() -> Self {
        Self {
            max_seq: DEFAULT_MAX_SEQ,
            window_size: DEFAULT_WINDOW_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retransmit_timeout: Duration::from_millis(DEFAULT_RETRANSMIT_TIMEOUT),
        }
    }

    pub fn max_seq(&self) -> u16 {
        self.max_seq
    }

    pub fn with_max_seq(mut self, value: u16) -> Self {
        self.max_seq = value;
        self.assert_seq_space_fits();

        self
    }

    pub fn window_size(&self) -> u16 {
        self.window_size
    }

    pub fn with_window_size(mut self, value: u16) -> Self {
        self.window_size = value;
        self.assert_seq_space_fits();

        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn with_chunk_size(mut self, value: usize) -> Self {
        // The length field on the wire is 12 bits wide and the whole
        // packet must fit in a single datagram.
        assert!(value > 0 && value < 4096);
        assert!(value + DATA_HEADER_SIZE <= MAX_PACKET_SIZE);

        self.chunk_size = value;
        self.assert_seq_space_fits();

        self
    }

    pub fn retransmit_timeout(&self) -> Duration {
        self.retransmit_timeout
    }

    pub fn with_retransmit_timeout(mut self, value: Duration) -> Self {
        self.retransmit_timeout = value;

        self
    }

    fn assert_seq_space_fits(&self) {
        // Sequence arithmetic is 16-bit: the window may extend past
        // max_seq and the final chunk of an epoch may overshoot it by
        // one chunk, but neither may wrap.
        assert!(
            self.max_seq as u32 + self.window_size as u32 + self.chunk_size as u32
                <= u16::MAX as u32
        );
    }
}
