use super::assembly::{InsertOutcome, ReassemblyQueue};
use super::channel::DatagramChannel;
use super::config::TransferConfig;
use super::loss::LossGate;
use super::packet::{AckMessage, DataChunk};
use crate::storage::ByteSink;
use anyhow::Result;
use log::*;

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum ReceiverState {
    Receiving,
    /// The transfer has been fully reassembled and flushed to the store.
    /// The engine keeps listening; there is no shutdown signal.
    Done,
}

/// Accepts chunks off the channel, orders them in the reassembly queue,
/// acknowledges each one and flushes the assembled bytes to the store
/// at epoch resets and at completion.
pub struct ReceiverEngine<C, S, L> {
    config: TransferConfig,
    channel: C,
    sink: S,
    loss: L,
    queue: ReassemblyQueue,

    /// Contiguous-from-zero boundary of the current epoch
    acc_seq_num: u16,

    /// End offset of the transfer, learned from the chunk marked last
    end_seq_num: Option<u16>,

    complete: bool,
    state: ReceiverState,
}

impl<C, S, L> ReceiverEngine<C, S, L>
where
    C: DatagramChannel,
    S: ByteSink,
    L: LossGate,
{
    pub fn new(channel: C, sink: S, loss: L, config: TransferConfig) -> Self {
        Self {
            config,
            channel,
            sink,
            loss,
            queue: ReassemblyQueue::new(),
            acc_seq_num: 0,
            end_seq_num: None,
            complete: false,
            state: ReceiverState::Receiving,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Listens forever. Completion only marks that the reassembled file
    /// has been flushed; late retransmissions and further epochs are
    /// still answered.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.step()?;
        }
    }

    /// Waits for one inbound datagram and processes it.
    pub fn step(&mut self) -> Result<ReceiverState> {
        let data = match self.channel.recv(None)? {
            Some(data) => data,
            None => return Ok(self.state),
        };

        self.handle_datagram(&data)
    }

    /// Runs the admission, reassembly and acknowledgement pipeline for
    /// a single datagram.
    pub fn handle_datagram(&mut self, data: &[u8]) -> Result<ReceiverState> {
        if self.loss.should_drop() {
            debug!("packet loss");
            return Ok(self.state);
        }

        let chunk = match DataChunk::parse(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!("discarding malformed packet: {}", err);
                return Ok(self.state);
            }
        };

        debug!(
            "received chunk [seq: {}, len: {}, first: {}, last: {}, acc: {}]",
            chunk.seq_num,
            chunk.len(),
            chunk.first,
            chunk.last,
            self.acc_seq_num
        );

        let window_left = self.acc_seq_num as u32;
        let window_right = window_left + self.config.window_size() as u32;

        if chunk.seq_num as u32 >= window_right {
            // Too far ahead to buffer; the sender will retransmit
            return Ok(self.state);
        }

        if (chunk.seq_num as u32) < window_left && chunk.seq_num > 0 {
            // Stale retransmission of an already assembled chunk:
            // re-acknowledge it so the sender can advance its window
            self.send_ack(chunk.seq_num)?;
            return Ok(self.state);
        }

        if chunk.seq_num == 0 && !chunk.first {
            // The sequence space was reset, so everything queued belongs
            // to the finished epoch and precedes the new chunk in the
            // stream
            debug!(
                "new epoch detected, flushing {} queued chunks",
                self.queue.len()
            );

            self.queue.flush_to(&mut self.sink)?;
            self.acc_seq_num = 0;
        }

        let seq_num = chunk.seq_num;
        let end_seq_num = chunk.end_seq_num();
        let last = chunk.last;

        if self.queue.insert(chunk) == InsertOutcome::Duplicate {
            debug!("duplicate chunk {}", seq_num);
        }

        self.acc_seq_num = self.queue.contiguous_boundary();
        self.send_ack(seq_num)?;

        if last {
            self.end_seq_num = Some(end_seq_num);
        }

        if Some(self.acc_seq_num) == self.end_seq_num && !self.complete {
            self.queue.flush_to(&mut self.sink)?;
            self.complete = true;
            self.state = ReceiverState::Done;

            info!("file transfer complete");
        }

        Ok(self.state)
    }

    fn send_ack(&mut self, seq_num: u16) -> Result<()> {
        let ack = AckMessage {
            seq_num,
            acc_seq_num: self.acc_seq_num,
        };

        debug!("sending ack [seq: {}, acc: {}]", ack.seq_num, ack.acc_seq_num);

        self.channel.send(&ack.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::super::channel::MemoryChannel;
    use super::super::loss::RandomLoss;
    use super::*;
    use crate::storage::MemorySink;
    use std::time::Duration;

    fn new_engine() -> (
        ReceiverEngine<MemoryChannel, MemorySink, RandomLoss>,
        MemoryChannel,
    ) {
        let (channel, peer) = MemoryChannel::pair();

        (
            ReceiverEngine::new(
                channel,
                MemorySink::new(),
                RandomLoss::new(0),
                TransferConfig::default(),
            ),
            peer,
        )
    }

    fn chunk(seq_num: u16, payload: Vec<u8>) -> DataChunk {
        DataChunk {
            seq_num,
            first: seq_num == 0,
            last: false,
            payload,
        }
    }

    fn recv_ack(peer: &mut MemoryChannel) -> Option<AckMessage> {
        peer.recv(Some(Duration::from_millis(1)))
            .unwrap()
            .map(|data| AckMessage::parse(&data).unwrap())
    }

    #[test]
    fn test_in_order_chunks_are_acked_cumulatively() {
        let (mut engine, mut peer) = new_engine();

        engine.handle_datagram(&chunk(0, vec![1; 500]).to_vec()).unwrap();
        engine.handle_datagram(&chunk(500, vec![2; 500]).to_vec()).unwrap();

        assert_eq!(
            recv_ack(&mut peer),
            Some(AckMessage {
                seq_num: 0,
                acc_seq_num: 500
            })
        );
        assert_eq!(
            recv_ack(&mut peer),
            Some(AckMessage {
                seq_num: 500,
                acc_seq_num: 1000
            })
        );
        assert_eq!(engine.state(), ReceiverState::Receiving);
    }

    #[test]
    fn test_out_of_order_chunk_stalls_the_boundary() {
        let (mut engine, mut peer) = new_engine();

        engine.handle_datagram(&chunk(500, vec![2; 500]).to_vec()).unwrap();

        assert_eq!(
            recv_ack(&mut peer),
            Some(AckMessage {
                seq_num: 500,
                acc_seq_num: 0
            })
        );

        engine.handle_datagram(&chunk(0, vec![1; 500]).to_vec()).unwrap();

        assert_eq!(
            recv_ack(&mut peer),
            Some(AckMessage {
                seq_num: 0,
                acc_seq_num: 1000
            })
        );
    }

    #[test]
    fn test_chunk_beyond_window_is_silently_discarded() {
        let (mut engine, mut peer) = new_engine();

        engine.handle_datagram(&chunk(3000, vec![1; 500]).to_vec()).unwrap();

        assert_eq!(recv_ack(&mut peer), None);
        assert_eq!(engine.queue.is_empty(), true);
    }

    #[test]
    fn test_stale_chunk_is_reacked_but_not_queued() {
        let (mut engine, mut peer) = new_engine();

        engine.handle_datagram(&chunk(0, vec![1; 500]).to_vec()).unwrap();
        engine.handle_datagram(&chunk(500, vec![2; 500]).to_vec()).unwrap();
        recv_ack(&mut peer);
        recv_ack(&mut peer);

        // A retransmission from behind the window
        engine.acc_seq_num = 1000;

        engine.handle_datagram(&chunk(500, vec![2; 500]).to_vec()).unwrap();

        assert_eq!(
            recv_ack(&mut peer),
            Some(AckMessage {
                seq_num: 500,
                acc_seq_num: 1000
            })
        );
        assert_eq!(engine.queue.len(), 2);
    }

    #[test]
    fn test_duplicate_chunk_is_reacked_and_discarded() {
        let (mut engine, mut peer) = new_engine();

        engine.handle_datagram(&chunk(0, vec![1; 500]).to_vec()).unwrap();
        recv_ack(&mut peer);

        engine.handle_datagram(&chunk(0, vec![1; 500]).to_vec()).unwrap();

        assert_eq!(
            recv_ack(&mut peer),
            Some(AckMessage {
                seq_num: 0,
                acc_seq_num: 500
            })
        );
        assert_eq!(engine.queue.len(), 1);
    }

    #[test]
    fn test_completion_flushes_reassembled_bytes() {
        let (mut engine, mut peer) = new_engine();

        let mut final_chunk = chunk(500, vec![2; 200]);
        final_chunk.last = true;

        // The last chunk arrives ahead of the gap before it
        let state = engine.handle_datagram(&final_chunk.to_vec()).unwrap();

        assert_eq!(state, ReceiverState::Receiving);
        assert_eq!(engine.sink().bytes().is_empty(), true);

        let state = engine.handle_datagram(&chunk(0, vec![1; 500]).to_vec()).unwrap();

        assert_eq!(state, ReceiverState::Done);

        let mut expected = vec![1u8; 500];
        expected.extend(vec![2u8; 200]);

        assert_eq!(engine.sink().bytes(), expected.as_slice());
        assert_eq!(recv_ack(&mut peer).unwrap().acc_seq_num, 0);
        assert_eq!(recv_ack(&mut peer).unwrap().acc_seq_num, 700);
    }

    #[test]
    fn test_completion_flush_happens_only_once() {
        let (mut engine, mut peer) = new_engine();

        let mut final_chunk = chunk(0, vec![1; 300]);
        final_chunk.last = true;

        engine.handle_datagram(&final_chunk.to_vec()).unwrap();

        assert_eq!(engine.sink().bytes(), vec![1u8; 300].as_slice());

        // A retransmission of the completing chunk must not flush again
        engine.handle_datagram(&final_chunk.to_vec()).unwrap();

        assert_eq!(engine.sink().bytes(), vec![1u8; 300].as_slice());
        assert_eq!(engine.state(), ReceiverState::Done);
        assert_eq!(recv_ack(&mut peer).unwrap().acc_seq_num, 300);
        assert_eq!(recv_ack(&mut peer).unwrap().acc_seq_num, 300);
    }

    #[test]
    fn test_epoch_reset_flushes_previous_queue() {
        let (mut engine, mut peer) = new_engine();

        engine.handle_datagram(&chunk(0, vec![1; 500]).to_vec()).unwrap();
        engine.handle_datagram(&chunk(500, vec![2; 500]).to_vec()).unwrap();
        recv_ack(&mut peer);
        recv_ack(&mut peer);

        assert_eq!(engine.sink().bytes().is_empty(), true);

        // Sequence number zero without the first flag signals that the
        // sender wrapped into a new epoch
        let wrapped = DataChunk {
            seq_num: 0,
            first: false,
            last: false,
            payload: vec![3; 500],
        };

        engine.handle_datagram(&wrapped.to_vec()).unwrap();

        let mut expected = vec![1u8; 500];
        expected.extend(vec![2u8; 500]);

        assert_eq!(engine.sink().bytes(), expected.as_slice());
        assert_eq!(engine.queue.len(), 1);
        assert_eq!(
            recv_ack(&mut peer),
            Some(AckMessage {
                seq_num: 0,
                acc_seq_num: 500
            })
        );
    }

    #[test]
    fn test_malformed_datagram_is_discarded_without_ack() {
        let (mut engine, mut peer) = new_engine();

        engine.handle_datagram(&[1, 2, 3]).unwrap();

        // Declares more payload than the datagram carries
        engine.handle_datagram(&[0, 0, 0, 80, 1]).unwrap();

        assert_eq!(recv_ack(&mut peer), None);
        assert_eq!(engine.queue.is_empty(), true);
    }

    #[test]
    fn test_gated_datagram_is_dropped() {
        let (channel, mut peer) = MemoryChannel::pair();
        let mut engine = ReceiverEngine::new(
            channel,
            MemorySink::new(),
            RandomLoss::new(100),
            TransferConfig::default(),
        );

        engine.handle_datagram(&chunk(0, vec![1; 500]).to_vec()).unwrap();

        assert_eq!(recv_ack(&mut peer), None);
        assert_eq!(engine.queue.is_empty(), true);
    }

    #[test]
    fn test_step_processes_queued_datagram() {
        let (mut engine, mut peer) = new_engine();

        peer.send(&chunk(0, vec![9; 100]).to_vec()).unwrap();

        engine.step().unwrap();

        assert_eq!(
            recv_ack(&mut peer),
            Some(AckMessage {
                seq_num: 0,
                acc_seq_num: 100
            })
        );
    }
}
