use super::packet::DataChunk;
use crate::storage::ByteSink;
use std::io;

/// Outcome of offering a chunk to the queue.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum InsertOutcome {
    Inserted,
    /// A chunk with the same sequence number is already queued;
    /// the offered chunk was discarded.
    Duplicate,
}

/// Holds received chunks on the receiver side, ordered by sequence
/// number, until they form a contiguous run from the start of the epoch
/// and can be flushed to the store.
#[derive(Debug)]
pub struct ReassemblyQueue {
    chunks: Vec<DataChunk>,
}

impl ReassemblyQueue {
    pub fn new() -> Self {
        Self { chunks: vec![] }
    }

    /// Splices the chunk into the queue keeping ascending sequence
    /// number order. A chunk whose sequence number is already present
    /// is dropped and reported as a duplicate.
    pub fn insert(&mut self, chunk: DataChunk) -> InsertOutcome {
        if self.chunks.iter().any(|c| c.seq_num == chunk.seq_num) {
            return InsertOutcome::Duplicate;
        }

        let insert_at = self
            .chunks
            .iter()
            .take_while(|c| c.seq_num < chunk.seq_num)
            .count();

        self.chunks.insert(insert_at, chunk);

        InsertOutcome::Inserted
    }

    /// The cumulative acknowledgement value: the end of the contiguous
    /// run starting at sequence number zero, or 0 when no such run
    /// exists yet.
    pub fn contiguous_boundary(&self) -> u16 {
        let mut run_end = match self.chunks.first() {
            Some(head) if head.seq_num == 0 => head,
            _ => return 0,
        };

        for chunk in self.chunks.iter().skip(1) {
            if run_end.end_seq_num() != chunk.seq_num {
                break;
            }

            run_end = chunk;
        }

        run_end.end_seq_num()
    }

    /// Appends every queued payload to the sink in sequence order and
    /// empties the queue.
    pub fn flush_to<S: ByteSink>(&mut self, sink: &mut S) -> io::Result<()> {
        for chunk in self.chunks.drain(..) {
            if !chunk.payload.is_empty() {
                sink.append(&chunk.payload)?;
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
