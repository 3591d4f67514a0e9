/// Expiry option parsing and the active expiry sweep.
///
/// Lazy expiry inside `Storage` is what guarantees correctness; the
/// sweep here just keeps long-dead keys from piling up.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use log::*;

use crate::error::StorageError;
use crate::storage::Storage;
use crate::util::now_ms;

/// Default cadence of the background sweep.
pub const ACTIVE_EXPIRY_INTERVAL: Duration = Duration::from_secs(60);

/// Absolute expiry timestamp for a SET command, from the arguments after
/// key and value: `EX <seconds>` or `PX <milliseconds>`, case-insensitive.
/// No option means the key never expires.
pub fn expiry_from_args(options: &[String]) -> Result<Option<u64>, StorageError> {
    if options.is_empty() {
        return Ok(None);
    }
    if options.len() != 2 {
        return Err(StorageError::Syntax);
    }
    let amount: u64 = options[1].parse().map_err(|_| StorageError::Syntax)?;
    match options[0].to_lowercase().as_str() {
        "ex" => Ok(Some(now_ms() + amount * 1000)),
        "px" => Ok(Some(now_ms() + amount)),
        _ => Err(StorageError::Syntax),
    }
}

/// Periodically remove expired keys. Runs on its own thread for the
/// lifetime of the process.
pub fn active_expiry_loop(storage: &Mutex<Storage>, interval: Duration) {
    loop {
        thread::sleep(interval);
        let removed = match storage.lock() {
            Ok(mut storage) => storage.remove_expired(now_ms()),
            Err(_) => return,
        };
        if removed > 0 {
            debug!("active expiry removed {} keys", removed);
        }
    }
}
