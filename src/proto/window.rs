use super::packet::DataChunk;
use anyhow::Result;
use std::time::{Duration, Instant};

/// One transmitted chunk awaiting acknowledgement.
#[derive(Debug, Clone)]
struct WindowSlot {
    chunk: DataChunk,
    sent_at: Instant,
    acked: bool,
}

/// The sender's record of every chunk transmitted in the current epoch,
/// in creation order. Slots are retained until the epoch resets so the
/// cumulative boundary can always be recomputed from the epoch start.
#[derive(Debug)]
pub struct SendWindow {
    slots: Vec<WindowSlot>,
}

impl SendWindow {
    pub fn new() -> Self {
        Self { slots: vec![] }
    }

    pub fn append(&mut self, chunk: DataChunk, sent_at: Instant) {
        self.slots.push(WindowSlot {
            chunk,
            sent_at,
            acked: false,
        });
    }

    /// Marks the chunk with the matching sequence number as acknowledged.
    /// An acknowledgement for an unknown sequence number is ignored.
    pub fn mark_acked(&mut self, seq_num: u16) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.chunk.seq_num == seq_num) {
            slot.acked = true;
        }
    }

    /// The end of the acknowledged run at the head of the window, or 0
    /// when the head itself is still outstanding.
    pub fn cumulative_ack(&self) -> u16 {
        self.slots
            .iter()
            .take_while(|s| s.acked)
            .last()
            .map(|s| s.chunk.end_seq_num())
            .unwrap_or(0)
    }

    pub fn unacked_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.acked).count()
    }

    /// Total payload bytes not yet acknowledged.
    pub fn unacked_bytes(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !s.acked)
            .map(|s| s.chunk.payload.len())
            .sum()
    }

    /// Resends every unacknowledged chunk whose last transmission is
    /// older than `rto`, refreshing its timestamp. Each slot expires
    /// independently, so several chunks may be resent in one pass.
    pub fn retransmit_expired<F>(&mut self, now: Instant, rto: Duration, mut resend: F) -> Result<usize>
    where
        F: FnMut(&DataChunk) -> Result<()>,
    {
        let mut resent = 0;

        for slot in self.slots.iter_mut() {
            if slot.acked || now.duration_since(slot.sent_at) <= rto {
                continue;
            }

            resend(&slot.chunk)?;
            slot.sent_at = now;
            resent += 1;
        }

        Ok(resent)
    }

    /// Releases every slot, ready for a new epoch.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
