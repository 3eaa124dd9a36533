//! Wire format of the output stream: every frame becomes a 4-byte big-endian length
//! followed by exactly that many payload bytes. There is no stream header, trailer or
//! end marker.

use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;

/// Size of the length prefix in front of every payload.
pub const HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("payload of {0} bytes does not fit a 32-bit length field")]
    TooLong(usize),
    #[error("record declares {len} bytes, more than the allowed {max}")]
    Oversized { len: usize, max: usize },
    #[error("stream ended inside a record")]
    Truncated,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<RecordError> for io::Error {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Io(err) => err,
            other => io::Error::new(ErrorKind::InvalidData, other),
        }
    }
}

/// Encodes the length prefix for a payload of `len` bytes.
pub fn encode_header(len: usize) -> Result<[u8; HEADER_LEN], RecordError> {
    let len = u32::try_from(len).map_err(|_| RecordError::TooLong(len))?;
    Ok(len.to_be_bytes())
}

/// Writes one record (prefix, then payload) to `sink`. Flushing is left to the caller.
pub fn write_record<W: Write + ?Sized>(sink: &mut W, payload: &[u8]) -> Result<(), RecordError> {
    let header = encode_header(payload.len())?;
    sink.write_all(&header)?;
    sink.write_all(payload)?;
    Ok(())
}

/// Decodes records from the consumer side of the stream.
pub struct RecordReader<R> {
    inner: R,
    max_len: usize,
}

impl<R: Read> RecordReader<R> {
    /// Reader refusing records that declare more than `max_len` payload bytes.
    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self { inner, max_len }
    }

    /// Returns the next payload, or `None` when the stream ends cleanly between records.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>, RecordError> {
        let mut header = [0; HEADER_LEN];
        if !self.fill_or_eof(&mut header)? {
            return Ok(None);
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_len {
            return Err(RecordError::Oversized {
                len,
                max: self.max_len,
            });
        }

        let mut payload = vec![0; len];
        self.inner.read_exact(&mut payload).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                RecordError::Truncated
            } else {
                RecordError::Io(err)
            }
        })?;
        Ok(Some(payload))
    }

    /// Fills `buf` completely; `false` if the stream was already at its end.
    fn fill_or_eof(&mut self, buf: &mut [u8]) -> Result<bool, RecordError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(RecordError::Truncated),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
