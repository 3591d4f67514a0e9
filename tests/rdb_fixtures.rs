/// Integration tests for RDB snapshot loading.
///
/// These tests hand-craft binary fixtures covering the format features
/// described at https://rdb.fnordig.de/file_format.html and verify the
/// loader's behaviour for each, including the startup file path.

use std::fs;
use std::path::PathBuf;

use miniredis::rdb::{encode_length, load_bytes, load_file, serialize, write_string};
use miniredis::storage::Storage;
use miniredis::util::now_ms;

const OPCODE_AUX: u8 = 0xFA;
const OPCODE_RESIZEDB: u8 = 0xFB;
const OPCODE_EXPIRETIMEMS: u8 = 0xFC;
const OPCODE_EXPIRETIME: u8 = 0xFD;
const OPCODE_SELECTDB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;
const TYPE_STRING: u8 = 0;

/// Build a complete RDB image: header + body + EOF + CRC64.
fn build_rdb(body: &[u8]) -> Vec<u8> {
    let mut rdb = Vec::new();
    rdb.extend_from_slice(b"REDIS0009");
    rdb.extend_from_slice(body);
    rdb.push(OPCODE_EOF);
    let checksum = crc64::crc64(0, &rdb);
    rdb.extend_from_slice(&checksum.to_le_bytes());
    rdb
}

fn preamble() -> Vec<u8> {
    let mut body = Vec::new();
    body.push(OPCODE_AUX);
    write_string(&mut body, b"redis-ver");
    write_string(&mut body, b"7.0.0");
    body.push(OPCODE_SELECTDB);
    body.extend(encode_length(0));
    body
}

#[test]
fn loads_a_single_string_key() {
    let mut body = preamble();
    body.push(TYPE_STRING);
    write_string(&mut body, b"mykey");
    write_string(&mut body, b"hello");

    let mut loaded = load_bytes(&build_rdb(&body)).unwrap();
    assert_eq!(loaded.get("mykey").unwrap(), Some(b"hello".to_vec()));
}

#[test]
fn loads_keys_after_resize_hints() {
    let mut body = preamble();
    body.push(OPCODE_RESIZEDB);
    body.extend(encode_length(2));
    body.extend(encode_length(0));
    for (key, value) in [("alpha", "1"), ("beta", "2")] {
        body.push(TYPE_STRING);
        write_string(&mut body, key.as_bytes());
        write_string(&mut body, value.as_bytes());
    }

    let mut loaded = load_bytes(&build_rdb(&body)).unwrap();
    assert_eq!(loaded.get("alpha").unwrap(), Some(b"1".to_vec()));
    assert_eq!(loaded.get("beta").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn loads_millisecond_expiry() {
    let far_future_ms: u64 = 4_102_444_800_000; // ~year 2100
    let mut body = preamble();
    body.push(OPCODE_EXPIRETIMEMS);
    body.extend_from_slice(&far_future_ms.to_le_bytes());
    body.push(TYPE_STRING);
    write_string(&mut body, b"session");
    write_string(&mut body, b"active");

    let loaded = load_bytes(&build_rdb(&body)).unwrap();
    assert_eq!(
        loaded.data.get("session").unwrap().expires_at_ms,
        Some(far_future_ms)
    );
}

#[test]
fn loads_second_expiry_scaled_to_milliseconds() {
    let far_future_sec: u32 = 4_102_444_800;
    let mut body = preamble();
    body.push(OPCODE_EXPIRETIME);
    body.extend_from_slice(&far_future_sec.to_le_bytes());
    body.push(TYPE_STRING);
    write_string(&mut body, b"persistent");
    write_string(&mut body, b"data");

    let loaded = load_bytes(&build_rdb(&body)).unwrap();
    assert_eq!(
        loaded.data.get("persistent").unwrap().expires_at_ms,
        Some(far_future_sec as u64 * 1000)
    );
}

#[test]
fn filters_keys_already_expired_at_load_time() {
    let past_ms: u64 = 946_684_800_000; // year 2000
    let mut body = preamble();
    body.push(OPCODE_EXPIRETIMEMS);
    body.extend_from_slice(&past_ms.to_le_bytes());
    body.push(TYPE_STRING);
    write_string(&mut body, b"expired_key");
    write_string(&mut body, b"gone");
    body.push(TYPE_STRING);
    write_string(&mut body, b"alive_key");
    write_string(&mut body, b"here");

    let mut loaded = load_bytes(&build_rdb(&body)).unwrap();
    assert!(loaded.data.get("expired_key").is_none());
    assert_eq!(loaded.get("alive_key").unwrap(), Some(b"here".to_vec()));
}

#[test]
fn loads_integer_encoded_values_as_decimal_strings() {
    let mut body = preamble();

    body.push(TYPE_STRING);
    write_string(&mut body, b"int8_key");
    body.push(0xC0);
    body.push(42);

    body.push(TYPE_STRING);
    write_string(&mut body, b"int16_key");
    body.push(0xC1);
    body.extend_from_slice(&1000i16.to_le_bytes());

    body.push(TYPE_STRING);
    write_string(&mut body, b"int32_key");
    body.push(0xC2);
    body.extend_from_slice(&1_000_000i32.to_le_bytes());

    let mut loaded = load_bytes(&build_rdb(&body)).unwrap();
    assert_eq!(loaded.get("int8_key").unwrap(), Some(b"42".to_vec()));
    assert_eq!(loaded.get("int16_key").unwrap(), Some(b"1000".to_vec()));
    assert_eq!(loaded.get("int32_key").unwrap(), Some(b"1000000".to_vec()));
}

#[test]
fn loads_fourteen_bit_length_strings() {
    let long_value = vec![b'x'; 300];
    let mut body = preamble();
    body.push(TYPE_STRING);
    write_string(&mut body, b"long");
    write_string(&mut body, &long_value);

    let mut loaded = load_bytes(&build_rdb(&body)).unwrap();
    assert_eq!(loaded.get("long").unwrap(), Some(long_value));
}

#[test]
fn loads_thirty_two_bit_length_strings() {
    let very_long_value = vec![b'y'; 20_000];
    let mut body = preamble();
    body.push(TYPE_STRING);
    write_string(&mut body, b"verylong");
    write_string(&mut body, &very_long_value);

    let mut loaded = load_bytes(&build_rdb(&body)).unwrap();
    assert_eq!(loaded.get("verylong").unwrap(), Some(very_long_value));
}

#[test]
fn rejects_lzf_compressed_strings_cleanly() {
    let mut body = preamble();
    body.push(TYPE_STRING);
    write_string(&mut body, b"compressed");
    body.push(0xC3); // LZF special encoding
    body.extend(encode_length(4));
    body.extend(encode_length(10));
    body.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    assert!(load_bytes(&build_rdb(&body)).is_err());
}

#[test]
fn rejects_non_string_value_types() {
    let mut body = preamble();
    body.push(4); // hash
    write_string(&mut body, b"myhash");

    assert!(load_bytes(&build_rdb(&body)).is_err());
}

#[test]
fn rejects_bad_magic() {
    assert!(load_bytes(b"NOTRDB0009\xFF").is_err());
}

#[test]
fn rejects_truncated_input() {
    let image = build_rdb(&preamble());
    assert!(load_bytes(&image[..image.len() - 12]).is_err());
}

#[test]
fn accepts_the_canned_empty_snapshot_a_primary_sends() {
    // The exact minimal RDB image real primaries ship during PSYNC:
    // header, five aux fields (with int8/int32 specials), EOF, CRC64.
    const EMPTY_RDB_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a\
72656469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000\
fa08616f662d62617365c000fff06e3bfec0ff5aa2";
    let bytes = hex_to_bytes(EMPTY_RDB_HEX);
    let loaded = load_bytes(&bytes).unwrap();
    assert!(loaded.data.is_empty());
}

#[test]
fn startup_load_of_missing_file_yields_empty_keyspace() {
    let storage = load_file(&PathBuf::from("/nonexistent/dir/dump.rdb")).unwrap();
    assert!(storage.data.is_empty());
}

#[test]
fn startup_load_reads_a_file_from_disk() {
    let mut storage = Storage::default();
    storage.set("mykey", b"hello".to_vec(), None);
    storage.set("session", b"data".to_vec(), Some(now_ms() + 3_600_000));
    let image = serialize(&storage);

    let path = std::env::temp_dir().join(format!("miniredis-fixture-{}.rdb", std::process::id()));
    fs::write(&path, &image).unwrap();
    let mut loaded = load_file(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(loaded.get("mykey").unwrap(), Some(b"hello".to_vec()));
    assert_eq!(loaded.get("session").unwrap(), Some(b"data".to_vec()));
}

#[test]
fn startup_load_of_malformed_file_fails() {
    let path = std::env::temp_dir().join(format!("miniredis-bad-{}.rdb", std::process::id()));
    fs::write(&path, b"definitely not an rdb file").unwrap();
    let result = load_file(&path);
    fs::remove_file(&path).ok();
    assert!(result.is_err());
}

fn hex_to_bytes(hex: &str) -> Vec<u8> {
    let cleaned: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).unwrap();
            u8::from_str_radix(text, 16).unwrap()
        })
        .collect()
}
