/// RESP protocol data types, parsing and serialization.
///
/// Five frame kinds identified by the leading byte (`+` `-` `:` `$` `*`),
/// plus the raw RDB frame a primary sends right after FULLRESYNC. The
/// parser works over a plain byte slice and reports "need more bytes"
/// separately from "malformed", so the buffered reader in `io` can feed
/// it incrementally.

use crate::error::RespError;

#[derive(Debug, PartialEq, Clone)]
pub enum DataType {
    SimpleString { value: Vec<u8> },
    SimpleError { value: Vec<u8> },
    Integer { value: i64 },
    /// `None` is the null bulk string `$-1\r\n`; `Some(vec![])` is the
    /// empty-but-present bulk string `$0\r\n\r\n`.
    BulkString { value: Option<Vec<u8>> },
    Array { elements: Vec<DataType> },
    /// The null array `*-1\r\n`.
    NullArray,
    /// Replication-only: `$<len>\r\n<bytes>` with no trailing CRLF.
    /// Never produced by `parse`; see `io::RespReader::read_rdb_payload`.
    Rdb { value: Vec<u8> },
}

pub fn simple_string(value: &str) -> DataType {
    DataType::SimpleString {
        value: value.as_bytes().to_vec(),
    }
}

pub fn simple_error(value: &str) -> DataType {
    DataType::SimpleError {
        value: value.as_bytes().to_vec(),
    }
}

pub fn integer(value: i64) -> DataType {
    DataType::Integer { value }
}

pub fn bulk_string(value: &str) -> DataType {
    DataType::BulkString {
        value: Some(value.as_bytes().to_vec()),
    }
}

pub fn bulk_string_from_bytes(value: Vec<u8>) -> DataType {
    DataType::BulkString { value: Some(value) }
}

pub fn null_bulk_string() -> DataType {
    DataType::BulkString { value: None }
}

pub fn array(elements: Vec<DataType>) -> DataType {
    DataType::Array { elements }
}

impl DataType {
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            DataType::SimpleString { value } => {
                let mut result = vec![b'+'];
                result.extend_from_slice(value);
                result.extend_from_slice(b"\r\n");
                result
            }
            DataType::SimpleError { value } => {
                let mut result = vec![b'-'];
                result.extend_from_slice(value);
                result.extend_from_slice(b"\r\n");
                result
            }
            DataType::Integer { value } => format!(":{}\r\n", value).into_bytes(),
            DataType::BulkString { value: None } => b"$-1\r\n".to_vec(),
            DataType::BulkString { value: Some(value) } => {
                let mut result = format!("${}\r\n", value.len()).into_bytes();
                result.extend_from_slice(value);
                result.extend_from_slice(b"\r\n");
                result
            }
            DataType::Array { elements } => {
                let mut result = format!("*{}\r\n", elements.len()).into_bytes();
                for element in elements {
                    result.extend(element.serialize());
                }
                result
            }
            DataType::NullArray => b"*-1\r\n".to_vec(),
            DataType::Rdb { value } => {
                let mut result = format!("${}\r\n", value.len()).into_bytes();
                result.extend_from_slice(value);
                result
            }
        }
    }

    /// Exact number of wire bytes this message occupies when serialized.
    /// Replicas use this to advance their processed-bytes offset in
    /// lockstep with the primary's write stream.
    pub fn byte_size(&self) -> usize {
        self.serialize().len()
    }

    /// Text content of a scalar frame. A null bulk string reads as the
    /// empty string.
    pub fn as_string(&self) -> Result<String, anyhow::Error> {
        match self {
            DataType::SimpleString { value } | DataType::SimpleError { value } => {
                Ok(String::from_utf8(value.clone())?)
            }
            DataType::Integer { value } => Ok(value.to_string()),
            DataType::BulkString { value: Some(value) } => Ok(String::from_utf8(value.clone())?),
            DataType::BulkString { value: None } => Ok(String::new()),
            other => Err(anyhow::anyhow!("not a scalar frame: {:?}", other)),
        }
    }

    /// Array elements rendered as strings, for command argument handling.
    pub fn as_vec(&self) -> Result<Vec<String>, anyhow::Error> {
        match self {
            DataType::Array { elements } => elements.iter().map(|e| e.as_string()).collect(),
            other => Err(anyhow::anyhow!("not an array frame: {:?}", other)),
        }
    }
}

/// Try to decode one message from the front of `input`.
///
/// Returns `Ok(None)` when the input is a valid prefix of a message and
/// more bytes are needed, `Ok(Some((message, consumed)))` on success, and
/// `Err` only for input that can never become valid RESP.
pub fn parse(input: &[u8]) -> Result<Option<(DataType, usize)>, RespError> {
    parse_at(input, 0)
}

fn parse_at(input: &[u8], pos: usize) -> Result<Option<(DataType, usize)>, RespError> {
    let first = match input.get(pos) {
        Some(byte) => *byte,
        None => return Ok(None),
    };
    match first {
        b'+' => Ok(parse_line(input, pos + 1).map(|(line, next)| {
            (DataType::SimpleString { value: line }, next)
        })),
        b'-' => Ok(parse_line(input, pos + 1).map(|(line, next)| {
            (DataType::SimpleError { value: line }, next)
        })),
        b':' => {
            let (line, next) = match parse_line(input, pos + 1) {
                Some(found) => found,
                None => return Ok(None),
            };
            let value = parse_decimal(&line)?;
            Ok(Some((DataType::Integer { value }, next)))
        }
        b'$' => {
            let (line, next) = match parse_line(input, pos + 1) {
                Some(found) => found,
                None => return Ok(None),
            };
            let declared = parse_decimal(&line)?;
            if declared == -1 {
                return Ok(Some((DataType::BulkString { value: None }, next)));
            }
            if declared < 0 {
                return Err(RespError::Protocol(format!(
                    "negative bulk string length {}",
                    declared
                )));
            }
            let length = declared as usize;
            // The declared length governs the read: the payload may itself
            // contain CRLF bytes.
            if input.len() < next + length + 2 {
                return Ok(None);
            }
            if &input[next + length..next + length + 2] != b"\r\n" {
                return Err(RespError::Protocol(
                    "bulk string missing trailing CRLF".to_string(),
                ));
            }
            Ok(Some((
                DataType::BulkString {
                    value: Some(input[next..next + length].to_vec()),
                },
                next + length + 2,
            )))
        }
        b'*' => {
            let (line, next) = match parse_line(input, pos + 1) {
                Some(found) => found,
                None => return Ok(None),
            };
            let declared = parse_decimal(&line)?;
            if declared == -1 {
                return Ok(Some((DataType::NullArray, next)));
            }
            if declared < 0 {
                return Err(RespError::Protocol(format!(
                    "negative array length {}",
                    declared
                )));
            }
            let mut elements = Vec::with_capacity(declared as usize);
            let mut cursor = next;
            for _ in 0..declared {
                match parse_at(input, cursor)? {
                    Some((element, after)) => {
                        elements.push(element);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((DataType::Array { elements }, cursor)))
        }
        other => Err(RespError::Protocol(format!(
            "unknown payload identifier: {:?}",
            other as char
        ))),
    }
}

/// Bytes up to the next CRLF, starting at `pos`, and the position just
/// past the CRLF. `None` when no CRLF has arrived yet.
fn parse_line(input: &[u8], pos: usize) -> Option<(Vec<u8>, usize)> {
    let mut index = pos;
    while index + 1 < input.len() {
        if input[index] == b'\r' && input[index + 1] == b'\n' {
            return Some((input[pos..index].to_vec(), index + 2));
        }
        index += 1;
    }
    None
}

fn parse_decimal(line: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| {
            RespError::Protocol(format!(
                "invalid decimal line: {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}
