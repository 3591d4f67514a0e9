//! RDB snapshot decoding and encoding.
//!
//! The loader understands the subset of the format real Redis 7.x writes
//! for plain string keys: AUX (0xFA), SELECTDB (0xFE), RESIZEDB (0xFB),
//! EXPIRETIMEMS (0xFC), EXPIRETIME (0xFD), EOF (0xFF), all four length
//! encodings and the integer string specials. LZF-compressed strings are
//! rejected with a clean error. The encoder writes the same subset and is
//! used only to build the PSYNC bulk payload.
//!
//! Spec reference: https://rdb.fnordig.de/file_format.html

use std::io::{Cursor, Read};
use std::path::Path;

use log::*;

use crate::error::RdbError;
use crate::storage::{Storage, StoredValue};
use crate::util::now_ms;

const RDB_VERSION: &str = "0009";

// Opcodes
const RDB_OPCODE_AUX: u8 = 0xFA;
const RDB_OPCODE_RESIZEDB: u8 = 0xFB;
const RDB_OPCODE_EXPIRETIMEMS: u8 = 0xFC;
const RDB_OPCODE_EXPIRETIME: u8 = 0xFD;
const RDB_OPCODE_SELECTDB: u8 = 0xFE;
const RDB_OPCODE_EOF: u8 = 0xFF;

// Value type codes; only strings are loaded.
const RDB_TYPE_STRING: u8 = 0;

// Special encoding subtypes (within the 0b11 length-encoding prefix)
const RDB_ENC_INT8: u8 = 0;
const RDB_ENC_INT16: u8 = 1;
const RDB_ENC_INT32: u8 = 2;
const RDB_ENC_LZF: u8 = 3;

#[derive(Debug, PartialEq)]
enum LengthOrSpecial {
    Length(usize),
    /// Special encoding subtype: 0=int8, 1=int16, 2=int32, 3=LZF
    Special(u8),
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8, RdbError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn decode_length_or_special<R: Read>(reader: &mut R) -> Result<LengthOrSpecial, RdbError> {
    let first = read_u8(reader)?;
    match first >> 6 {
        0b00 => Ok(LengthOrSpecial::Length((first & 0x3F) as usize)),
        0b01 => {
            let second = read_u8(reader)?;
            let length = ((first & 0x3F) as usize) << 8 | second as usize;
            Ok(LengthOrSpecial::Length(length))
        }
        0b10 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            Ok(LengthOrSpecial::Length(u32::from_be_bytes(buf) as usize))
        }
        _ => Ok(LengthOrSpecial::Special(first & 0x3F)),
    }
}

/// Decode a plain length; special encodings are not lengths.
fn decode_length<R: Read>(reader: &mut R) -> Result<usize, RdbError> {
    match decode_length_or_special(reader)? {
        LengthOrSpecial::Length(length) => Ok(length),
        LengthOrSpecial::Special(subtype) => Err(RdbError::Unsupported(format!(
            "special encoding {} where a length was expected",
            subtype
        ))),
    }
}

pub fn encode_length(length: usize) -> Vec<u8> {
    if length < 1 << 6 {
        vec![length as u8]
    } else if length < 1 << 14 {
        vec![0x40 | (length >> 8) as u8, (length & 0xFF) as u8]
    } else {
        let mut encoded = vec![0x80];
        encoded.extend_from_slice(&(length as u32).to_be_bytes());
        encoded
    }
}

/// Read an RDB-encoded string: either a length-prefixed byte run or an
/// integer special rendered as its decimal representation.
fn read_string<R: Read>(reader: &mut R) -> Result<Vec<u8>, RdbError> {
    match decode_length_or_special(reader)? {
        LengthOrSpecial::Length(length) => {
            let mut buf = vec![0u8; length];
            reader.read_exact(&mut buf)?;
            Ok(buf)
        }
        LengthOrSpecial::Special(encoding) => match encoding {
            RDB_ENC_INT8 => {
                let byte = read_u8(reader)?;
                Ok(format!("{}", byte as i8).into_bytes())
            }
            RDB_ENC_INT16 => {
                let mut buf = [0u8; 2];
                reader.read_exact(&mut buf)?;
                Ok(format!("{}", i16::from_le_bytes(buf)).into_bytes())
            }
            RDB_ENC_INT32 => {
                let mut buf = [0u8; 4];
                reader.read_exact(&mut buf)?;
                Ok(format!("{}", i32::from_le_bytes(buf)).into_bytes())
            }
            RDB_ENC_LZF => Err(RdbError::Unsupported(
                "LZF-compressed string".to_string(),
            )),
            other => Err(RdbError::Unsupported(format!(
                "string encoding {}",
                other
            ))),
        },
    }
}

pub fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend(encode_length(data.len()));
    buf.extend_from_slice(data);
}

/// Load the snapshot at `path`. An absent file is a normal cold start and
/// yields an empty keyspace; a present-but-malformed file is fatal.
pub fn load_file(path: &Path) -> Result<Storage, RdbError> {
    if !path.is_file() {
        info!("no snapshot at {}, starting empty", path.display());
        return Ok(Storage::default());
    }
    let bytes = std::fs::read(path)?;
    load_bytes(&bytes)
}

/// Decode an RDB byte stream into a keyspace. Keys already expired at
/// load time are discarded.
pub fn load_bytes(bytes: &[u8]) -> Result<Storage, RdbError> {
    if bytes.len() < 9 {
        return Err(RdbError::Truncated);
    }
    if &bytes[0..5] != b"REDIS" {
        return Err(RdbError::BadMagic);
    }
    let version: u32 = std::str::from_utf8(&bytes[5..9])
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(RdbError::BadMagic)?;
    debug!("reading RDB version {:04}", version);

    let mut storage = Storage::default();
    let mut cursor = Cursor::new(bytes);
    cursor.set_position(9);

    loop {
        let opcode = read_u8(&mut cursor)?;
        match opcode {
            RDB_OPCODE_AUX => {
                let key = read_string(&mut cursor)?;
                let value = read_string(&mut cursor)?;
                debug!(
                    "RDB aux: {} = {}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
            RDB_OPCODE_SELECTDB => {
                let db_number = decode_length(&mut cursor)?;
                if db_number != 0 {
                    warn!(
                        "RDB selects database {}, loading its keys into the single keyspace",
                        db_number
                    );
                }
            }
            RDB_OPCODE_RESIZEDB => {
                let db_size = decode_length(&mut cursor)?;
                let expires_size = decode_length(&mut cursor)?;
                debug!(
                    "RDB resize hint: {} keys, {} with expiry",
                    db_size, expires_size
                );
                storage.data.reserve(db_size);
            }
            RDB_OPCODE_EXPIRETIMEMS => {
                let mut buf = [0u8; 8];
                cursor.read_exact(&mut buf)?;
                let expires_at_ms = u64::from_le_bytes(buf);
                let value_type = read_u8(&mut cursor)?;
                read_entry(&mut cursor, &mut storage, value_type, Some(expires_at_ms))?;
            }
            RDB_OPCODE_EXPIRETIME => {
                let mut buf = [0u8; 4];
                cursor.read_exact(&mut buf)?;
                let expires_at_ms = u32::from_le_bytes(buf) as u64 * 1000;
                let value_type = read_u8(&mut cursor)?;
                read_entry(&mut cursor, &mut storage, value_type, Some(expires_at_ms))?;
            }
            RDB_OPCODE_EOF => {
                verify_checksum(bytes, cursor.position() as usize)?;
                break;
            }
            value_type => {
                read_entry(&mut cursor, &mut storage, value_type, None)?;
            }
        }
    }

    info!("loaded {} keys from RDB snapshot", storage.data.len());
    Ok(storage)
}

fn read_entry<R: Read>(
    reader: &mut R,
    storage: &mut Storage,
    value_type: u8,
    expires_at_ms: Option<u64>,
) -> Result<(), RdbError> {
    if value_type != RDB_TYPE_STRING {
        return Err(RdbError::Unsupported(format!(
            "value type {}",
            value_type
        )));
    }
    let key = String::from_utf8_lossy(&read_string(reader)?).into_owned();
    let value = read_string(reader)?;
    let stored = StoredValue::string(value, expires_at_ms);
    if stored.is_expired(now_ms()) {
        debug!("skipping key '{}': already expired at load time", key);
    } else {
        storage.data.insert(key, stored);
    }
    Ok(())
}

/// The 8 bytes after EOF, when present, are a little-endian CRC64 over
/// everything up to and including the EOF opcode. All zeros means the
/// checksum is disabled.
fn verify_checksum(bytes: &[u8], eof_end: usize) -> Result<(), RdbError> {
    let trailer = &bytes[eof_end..];
    if trailer.len() < 8 {
        return Ok(());
    }
    let mut checksum_bytes = [0u8; 8];
    checksum_bytes.copy_from_slice(&trailer[..8]);
    let stored = u64::from_le_bytes(checksum_bytes);
    if stored == 0 {
        return Ok(());
    }
    let computed = crc64::crc64(0, &bytes[..eof_end]);
    if computed != stored {
        return Err(RdbError::ChecksumMismatch { stored, computed });
    }
    Ok(())
}

/// Serialize the string keys of `storage` as an RDB image, used as the
/// PSYNC full-resync payload. Stream keys live only in memory and are
/// not snapshotted.
pub fn serialize(storage: &Storage) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"REDIS");
    buf.extend_from_slice(RDB_VERSION.as_bytes());

    write_aux_field(&mut buf, b"redis-ver", b"7.0.0");
    write_aux_field(&mut buf, b"redis-bits", b"64");

    buf.push(RDB_OPCODE_SELECTDB);
    buf.extend(encode_length(0));

    let pairs = storage.string_pairs();
    let expiring = pairs.iter().filter(|(_, _, expiry)| expiry.is_some()).count();
    buf.push(RDB_OPCODE_RESIZEDB);
    buf.extend(encode_length(pairs.len()));
    buf.extend(encode_length(expiring));

    for (key, value, expires_at_ms) in pairs {
        if let Some(expires_at) = expires_at_ms {
            buf.push(RDB_OPCODE_EXPIRETIMEMS);
            buf.extend_from_slice(&expires_at.to_le_bytes());
        }
        buf.push(RDB_TYPE_STRING);
        write_string(&mut buf, key.as_bytes());
        write_string(&mut buf, &value);
    }

    buf.push(RDB_OPCODE_EOF);
    let checksum = crc64::crc64(0, &buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

fn write_aux_field(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    buf.push(RDB_OPCODE_AUX);
    write_string(buf, key);
    write_string(buf, value);
}
