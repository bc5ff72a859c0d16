use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use thiserror::Error;

/// Size cap of a single datagram on the wire
pub const MAX_PACKET_SIZE: usize = 1000;
pub(crate) const DATA_HEADER_SIZE: usize = 2 + 2;
pub(crate) const ACK_PACKET_SIZE: usize = 2 + 2;

/// A contiguous slice of the source carried in one data packet.
#[derive(Debug, PartialEq, Clone)]
pub struct DataChunk {
    /// Byte offset of the first payload byte within the current epoch
    pub seq_num: u16,

    /// Whether the chunk was cut from offset zero of the underlying source.
    /// A chunk with `seq_num == 0` but `first` unset signals to the receiver
    /// that the sequence space was reset.
    pub first: bool,

    /// Whether the source was exhausted after this chunk's bytes
    pub last: bool,

    // The payload of the chunk, at most the configured chunk size
    pub payload: Vec<u8>,
}

/// Acknowledgement for a single received data chunk.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct AckMessage {
    /// Echo of the sequence number that triggered the acknowledgement
    pub seq_num: u16,

    /// The contiguous-from-zero byte offset fully assembled by the receiver
    pub acc_seq_num: u16,
}

#[derive(Error, Debug)]
pub enum PacketParseError {
    #[error("received packet is too small: {0} bytes")]
    BufferTooSmall(usize),
    #[error("received packet payload length mismatch, expected {0} != actual {1}")]
    PayloadLengthMismatch(usize, usize),
}

impl DataChunk {
    pub fn parse(data: &[u8]) -> Result<DataChunk, PacketParseError> {
        if data.len() < DATA_HEADER_SIZE {
            return Err(PacketParseError::BufferTooSmall(data.len()));
        }

        let mut cursor = Cursor::new(data);

        let seq_num = cursor.read_u16::<BigEndian>().unwrap();
        let packed = cursor.read_u16::<BigEndian>().unwrap();

        // The second header field packs the payload length in the top
        // 12 bits and the first/last flags in the bottom two.
        let length = (packed >> 4) as usize;
        let first = packed & 0b10 != 0;
        let last = packed & 0b01 != 0;

        let payload_start = cursor.position() as usize;
        let payload_end = payload_start + length;
        let data = cursor.into_inner();

        if data.len() < payload_end {
            return Err(PacketParseError::PayloadLengthMismatch(
                length,
                data.len() - payload_start,
            ));
        }

        let payload = data[payload_start..payload_end].to_vec();

        Ok(DataChunk {
            seq_num,
            first,
            last,
            payload,
        })
    }

    pub fn to_vec(&self) -> Vec<u8> {
        use std::io::Write;

        let buff = Vec::with_capacity(DATA_HEADER_SIZE + self.payload.len());
        let packed =
            ((self.payload.len() as u16) << 4) | ((self.first as u16) << 1) | self.last as u16;

        let mut cursor = Cursor::new(buff);
        cursor.write_u16::<BigEndian>(self.seq_num).unwrap();
        cursor.write_u16::<BigEndian>(packed).unwrap();
        cursor.write_all(self.payload.as_slice()).unwrap();

        cursor.into_inner()
    }

    /// The number of payload bytes carried by the chunk
    pub fn len(&self) -> u16 {
        self.payload.len() as u16
    }

    pub fn end_seq_num(&self) -> u16 {
        self.seq_num + self.len()
    }
}

impl AckMessage {
    pub fn parse(data: &[u8]) -> Result<AckMessage, PacketParseError> {
        if data.len() < ACK_PACKET_SIZE {
            return Err(PacketParseError::BufferTooSmall(data.len()));
        }

        let mut cursor = Cursor::new(data);

        let seq_num = cursor.read_u16::<BigEndian>().unwrap();
        let acc_seq_num = cursor.read_u16::<BigEndian>().unwrap();

        Ok(AckMessage {
            seq_num,
            acc_seq_num,
        })
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let buff = Vec::with_capacity(ACK_PACKET_SIZE);

        let mut cursor = Cursor::new(buff);
        cursor.write_u16::<BigEndian>(self.seq_num).unwrap();
        cursor.write_u16::<BigEndian>(self.acc_seq_num).unwrap();

        cursor.into_inner()
    }
}
