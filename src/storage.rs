use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::path::Path;

/// Sequential byte supply consumed by the sender engine.
pub trait ByteSource {
    /// Reads as many bytes as fit in `buff`, short only at the end of
    /// the source.
    fn read(&mut self, buff: &mut [u8]) -> io::Result<usize>;

    /// Whether the source has no bytes left beyond the current position.
    fn at_end(&mut self) -> io::Result<bool>;
}

/// Append-only byte store fed by the receiver engine at flush events.
pub trait ByteSink {
    fn append(&mut self, data: &[u8]) -> io::Result<()>;
}

pub struct FileSource {
    reader: BufReader<File>,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("cannot open file: {}", path.as_ref().display()))?;

        Ok(Self {
            reader: BufReader::new(file),
        })
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buff: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;

        // A single read may return short at the buffered reader's
        // internal boundary, so fill until the buffer is full or the
        // file ends.
        while filled < buff.len() {
            let read = self.reader.read(&mut buff[filled..])?;

            if read == 0 {
                break;
            }

            filled += read;
        }

        Ok(filled)
    }

    fn at_end(&mut self) -> io::Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }
}

pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .with_context(|| format!("cannot open file: {}", path.as_ref().display()))?;

        Ok(Self { file })
    }
}

impl ByteSink for FileSink {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }
}

/// In-memory source over a byte buffer, used to drive the sender engine
/// in tests.
pub struct MemorySource {
    cursor: Cursor<Vec<u8>>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buff: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buff)
    }

    fn at_end(&mut self) -> io::Result<bool> {
        Ok(self.cursor.position() >= self.cursor.get_ref().len() as u64)
    }
}

/// In-memory sink collecting flushed bytes, used in tests.
pub struct MemorySink {
    bytes: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self { bytes: vec![] }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..]
    }
}

impl ByteSink for MemorySink {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.bytes.extend_from_slice(data);

        Ok(())
    }
}
