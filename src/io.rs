/// Buffered RESP reading and writing over arbitrary byte streams.
///
/// `RespReader` accumulates socket bytes in a `BytesMut` and hands them
/// to the incremental parser in `protocol`; it is generic over `Read` so
/// tests can drive it from a `Cursor`. A short read or peer close
/// surfaces as `RespError::Incomplete`.

use std::io::{Read, Write};

use bytes::{Buf, BytesMut};

use crate::error::RespError;
use crate::protocol::{self, DataType};

/// Size of one fill from the underlying reader.
const READ_CHUNK_SIZE: usize = 2048;

pub struct RespReader<R: Read> {
    reader: R,
    buffer: BytesMut,
}

impl<R: Read> RespReader<R> {
    pub fn new(reader: R) -> RespReader<R> {
        RespReader {
            reader,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// Decode the next complete message, filling from the underlying
    /// reader as needed.
    pub fn read_message(&mut self) -> Result<DataType, RespError> {
        loop {
            if let Some((message, consumed)) = protocol::parse(&self.buffer)? {
                self.buffer.advance(consumed);
                return Ok(message);
            }
            self.fill()?;
        }
    }

    /// Consume the RDB bulk payload a primary sends after FULLRESYNC:
    /// `$<len>\r\n` followed by exactly `len` raw bytes and, unlike a
    /// normal bulk string, no trailing CRLF.
    pub fn read_rdb_payload(&mut self) -> Result<Vec<u8>, RespError> {
        let (header_len, payload_len) = loop {
            if let Some(found) = parse_rdb_header(&self.buffer)? {
                break found;
            }
            self.fill()?;
        };
        while self.buffer.len() < header_len + payload_len {
            self.fill()?;
        }
        self.buffer.advance(header_len);
        let payload = self.buffer.split_to(payload_len);
        Ok(payload.to_vec())
    }

    fn fill(&mut self) -> Result<(), RespError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match self.reader.read(&mut chunk) {
            Ok(0) => Err(RespError::Incomplete),
            Ok(read_bytes) => {
                self.buffer.extend_from_slice(&chunk[..read_bytes]);
                Ok(())
            }
            // Read timeouts and resets both end the framing attempt.
            Err(_) => Err(RespError::Incomplete),
        }
    }
}

fn parse_rdb_header(input: &[u8]) -> Result<Option<(usize, usize)>, RespError> {
    let first = match input.first() {
        Some(byte) => *byte,
        None => return Ok(None),
    };
    if first != b'$' {
        return Err(RespError::Protocol(format!(
            "expected RDB bulk, got leading byte {:?}",
            first as char
        )));
    }
    let mut index = 1;
    while index + 1 < input.len() {
        if input[index] == b'\r' && input[index + 1] == b'\n' {
            let length = std::str::from_utf8(&input[1..index])
                .ok()
                .and_then(|text| text.parse::<usize>().ok())
                .ok_or_else(|| RespError::Protocol("invalid RDB payload length".to_string()))?;
            return Ok(Some((index + 2, length)));
        }
        index += 1;
    }
    Ok(None)
}

pub struct RespWriter<W: Write> {
    writer: W,
}

impl<W: Write> RespWriter<W> {
    pub fn new(writer: W) -> RespWriter<W> {
        RespWriter { writer }
    }

    pub fn write_message(&mut self, message: &DataType) -> Result<(), std::io::Error> {
        self.writer.write_all(&message.serialize())
    }

    /// Raw write, used for already-serialized propagation frames and the
    /// RDB transfer.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.writer.write_all(bytes)
    }
}

impl RespWriter<std::net::TcpStream> {
    /// Half-close: shut down the write side, leaving reads open.
    pub fn close_write(&mut self) -> Result<(), std::io::Error> {
        self.writer.shutdown(std::net::Shutdown::Write)
    }
}
