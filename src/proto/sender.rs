use super::channel::DatagramChannel;
use super::config::TransferConfig;
use super::loss::LossGate;
use super::packet::{AckMessage, DataChunk};
use super::window::SendWindow;
use crate::storage::ByteSource;
use anyhow::Result;
use log::*;
use std::time::Instant;

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum SenderState {
    /// The window has room for more chunks from the source
    Filling,
    /// Waiting on acknowledgements or retransmitting
    Draining,
    Done,
}

/// Drives a byte source across the channel: cuts chunks, transmits them
/// within the sliding window, collects acknowledgements, retransmits on
/// timeout and resets the sequence space whenever it is exhausted.
pub struct SenderEngine<C, S, L> {
    config: TransferConfig,
    channel: C,
    source: S,
    loss: L,
    window: SendWindow,

    /// Next-to-send byte offset within the current epoch
    seq_num: u16,

    /// Cumulative acknowledged boundary within the current epoch
    acc_seq_num: u16,

    /// Total bytes consumed from the source across all epochs
    source_offset: u64,

    /// Whether the most recently cut chunk exhausted the source
    reached_end: bool,

    state: SenderState,
}

impl<C, S, L> SenderEngine<C, S, L>
where
    C: DatagramChannel,
    S: ByteSource,
    L: LossGate,
{
    pub fn new(channel: C, source: S, loss: L, config: TransferConfig) -> Self {
        Self {
            config,
            channel,
            source,
            loss,
            window: SendWindow::new(),
            seq_num: 0,
            acc_seq_num: 0,
            source_offset: 0,
            reached_end: false,
            state: SenderState::Filling,
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Runs the engine to completion. Retransmission is unbounded: the
    /// loop exits only once every byte has been acknowledged.
    pub fn run(&mut self) -> Result<()> {
        while self.step()? != SenderState::Done {}

        info!("file transfer complete");

        Ok(())
    }

    /// One outer iteration of the transfer loop.
    pub fn step(&mut self) -> Result<SenderState> {
        if self.state == SenderState::Done {
            return Ok(self.state);
        }

        self.reset_epoch_if_exhausted();
        self.admit_chunks()?;
        self.collect_acks()?;

        self.state = if self.acc_seq_num == self.seq_num && self.reached_end {
            SenderState::Done
        } else if self.can_admit() {
            SenderState::Filling
        } else {
            SenderState::Draining
        };

        Ok(self.state)
    }

    /// Once every byte of the sequence space is acknowledged the window
    /// is released and both offsets return to zero; the source stream
    /// continues into the new epoch.
    fn reset_epoch_if_exhausted(&mut self) {
        if self.acc_seq_num == self.seq_num && self.seq_num >= self.config.max_seq() {
            debug!(
                "sequence space exhausted at {}, starting new epoch",
                self.seq_num
            );

            self.window.clear();
            self.seq_num = 0;
            self.acc_seq_num = 0;
        }
    }

    fn can_admit(&self) -> bool {
        let left_side = self.acc_seq_num as u32;
        let right_side = left_side + self.config.window_size() as u32;
        let seq_num = self.seq_num as u32;

        !self.reached_end
            && seq_num >= left_side
            && seq_num < right_side
            && self.seq_num < self.config.max_seq()
    }

    fn admit_chunks(&mut self) -> Result<()> {
        while self.can_admit() {
            let chunk = self.next_chunk()?;
            let sent_at = self.transmit(&chunk)?;

            self.reached_end = chunk.last;
            self.window.append(chunk, sent_at);
        }

        Ok(())
    }

    /// Cuts the next chunk from the source, advancing the sequence
    /// number by its length.
    fn next_chunk(&mut self) -> Result<DataChunk> {
        let mut buff = vec![0u8; self.config.chunk_size()];

        let first = self.source_offset == 0;
        let length = self.source.read(&mut buff)?;
        buff.truncate(length);

        self.source_offset += length as u64;
        let last = self.source.at_end()?;

        let chunk = DataChunk {
            seq_num: self.seq_num,
            first,
            last,
            payload: buff,
        };

        self.seq_num += chunk.len();

        Ok(chunk)
    }

    fn transmit(&mut self, chunk: &DataChunk) -> Result<Instant> {
        transmit_chunk(&mut self.channel, &mut self.loss, chunk)?;

        Ok(Instant::now())
    }

    /// Takes one receive attempt per outstanding chunk, marks whatever
    /// acknowledgements made it through, then resends any chunk whose
    /// timeout has expired. Near the end of the sequence space this
    /// repeats until the window has fully drained, since an epoch can
    /// only reset once nothing from the old one is in flight.
    fn collect_acks(&mut self) -> Result<()> {
        loop {
            let mut attempts = self.window.unacked_count();

            while attempts > 0 {
                attempts -= 1;

                let data = match self.channel.recv(Some(self.config.retransmit_timeout()))? {
                    Some(data) => data,
                    None => continue,
                };

                if self.loss.should_drop() {
                    debug!("ack loss");
                    continue;
                }

                let ack = match AckMessage::parse(&data) {
                    Ok(ack) => ack,
                    Err(err) => {
                        warn!("discarding malformed ack: {}", err);
                        continue;
                    }
                };

                debug!(
                    "received ack [seq: {}, acc: {}]",
                    ack.seq_num, ack.acc_seq_num
                );

                self.window.mark_acked(ack.seq_num);
            }

            self.acc_seq_num = self.window.cumulative_ack();

            if self.acc_seq_num < self.seq_num {
                let now = Instant::now();
                let rto = self.config.retransmit_timeout();

                let Self {
                    window,
                    channel,
                    loss,
                    ..
                } = self;

                let resent = window.retransmit_expired(now, rto, |chunk| {
                    transmit_chunk(channel, loss, chunk)
                })?;

                if resent > 0 {
                    debug!("resent {} expired chunks", resent);
                }
            }

            if self.acc_seq_num >= self.seq_num || self.seq_num < self.config.max_seq() {
                break;
            }
        }

        Ok(())
    }
}

/// Sends a framed chunk through the loss gate. A gated chunk still
/// counts as transmitted: it was lost on the wire, not withheld.
fn transmit_chunk<C: DatagramChannel, L: LossGate>(
    channel: &mut C,
    loss: &mut L,
    chunk: &DataChunk,
) -> Result<()> {
    if loss.should_drop() {
        debug!("packet loss {}", chunk.seq_num);
        return Ok(());
    }

    debug!(
        "sending chunk [seq: {}, len: {}, first: {}, last: {}]",
        chunk.seq_num,
        chunk.len(),
        chunk.first,
        chunk.last
    );

    channel.send(&chunk.to_vec())
}
