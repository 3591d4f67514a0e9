use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Random identifier of `length` lowercase alphanumeric characters,
/// as used for the master replication id.
pub fn random_id(length: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut generator = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[generator.gen_range(0..CHARSET.len())] as char)
        .collect()
}
