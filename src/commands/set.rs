/// SET command - sets a key to hold a value.
///
/// Syntax: SET <key> <value> [EX <seconds> | PX <milliseconds>]
/// Returns: +OK on success
///
/// On a primary the dispatcher appends the original frame to the
/// replication backlog after a successful apply.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use log::*;

use crate::expiry;
use crate::protocol;
use crate::storage::Storage;
use super::RedisCommand;

pub struct Set<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for Set<'_> {
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let key = super::argument_string(self.message, 1);
        let value = super::argument_bytes(self.message, 2);
        let (key, value) = match (key, value) {
            (Some(key), Some(value)) => (key, value),
            _ => return Ok(super::wrong_arguments("set")),
        };

        let mut options = Vec::new();
        for index in 3..super::argument_count(self.message) {
            match super::argument_string(self.message, index) {
                Some(option) => options.push(option),
                None => return Ok(vec![protocol::simple_error("ERR syntax error")]),
            }
        }
        let expires_at_ms = match expiry::expiry_from_args(&options) {
            Ok(expiry) => expiry,
            Err(error) => return Ok(vec![protocol::simple_error(&error.to_string())]),
        };

        debug!(
            "SET {} ({} bytes, expires_at = {:?})",
            key,
            value.len(),
            expires_at_ms
        );

        let mut data = storage
            .lock()
            .map_err(|e| anyhow!("Failed to lock storage: {}", e))?;
        data.set(&key, value, expires_at_ms);

        Ok(vec![protocol::simple_string("OK")])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        true
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::thread;
    use std::time::Duration;

    fn create_test_storage() -> Arc<Mutex<Storage>> {
        Arc::new(Mutex::new(Storage::new(HashMap::new())))
    }

    #[test]
    fn test_set_command_basic() {
        let message = protocol::array(vec![
            protocol::bulk_string("SET"),
            protocol::bulk_string("key1"),
            protocol::bulk_string("value1"),
        ]);
        let cmd = Set { message: &message };

        let storage = create_test_storage();
        let result = cmd.execute(&storage).unwrap();

        assert_eq!(result[0].as_string().unwrap(), "OK");
        assert!(cmd.is_propagated_to_replicas());

        let mut data = storage.lock().unwrap();
        assert_eq!(data.get("key1").unwrap(), Some(b"value1".to_vec()));
    }

    #[test]
    fn test_set_command_with_px_expiration() {
        let message = protocol::array(vec![
            protocol::bulk_string("SET"),
            protocol::bulk_string("expiring_key"),
            protocol::bulk_string("expiring_value"),
            protocol::bulk_string("px"),
            protocol::bulk_string("100"),
        ]);
        let cmd = Set { message: &message };

        let storage = create_test_storage();
        let result = cmd.execute(&storage).unwrap();
        assert_eq!(result[0].as_string().unwrap(), "OK");

        {
            let mut data = storage.lock().unwrap();
            assert_eq!(
                data.get("expiring_key").unwrap(),
                Some(b"expiring_value".to_vec())
            );
        }

        thread::sleep(Duration::from_millis(150));

        let mut data = storage.lock().unwrap();
        assert_eq!(data.get("expiring_key").unwrap(), None);
    }

    #[test]
    fn test_set_command_with_ex_expiration() {
        let message = protocol::array(vec![
            protocol::bulk_string("SET"),
            protocol::bulk_string("session"),
            protocol::bulk_string("data"),
            protocol::bulk_string("EX"),
            protocol::bulk_string("100"),
        ]);
        let cmd = Set { message: &message };

        let storage = create_test_storage();
        cmd.execute(&storage).unwrap();

        let expires_at = storage
            .lock()
            .unwrap()
            .data
            .get("session")
            .unwrap()
            .expires_at_ms;
        assert!(expires_at.unwrap() > crate::util::now_ms() + 90_000);
    }

    #[test]
    fn test_set_command_binary_value() {
        let payload = vec![0u8, 1, 2, 13, 10, 255];
        let message = protocol::array(vec![
            protocol::bulk_string("SET"),
            protocol::bulk_string("binary"),
            protocol::bulk_string_from_bytes(payload.clone()),
        ]);
        let cmd = Set { message: &message };

        let storage = create_test_storage();
        cmd.execute(&storage).unwrap();

        let mut data = storage.lock().unwrap();
        assert_eq!(data.get("binary").unwrap(), Some(payload));
    }

    #[test]
    fn test_set_command_missing_value_is_arity_error() {
        let message = protocol::array(vec![
            protocol::bulk_string("SET"),
            protocol::bulk_string("key_only"),
        ]);
        let cmd = Set { message: &message };

        let result = cmd.execute(&create_test_storage()).unwrap();
        assert!(matches!(
            result[0],
            protocol::DataType::SimpleError { .. }
        ));
    }

    #[test]
    fn test_set_command_bad_option_is_syntax_error() {
        let message = protocol::array(vec![
            protocol::bulk_string("SET"),
            protocol::bulk_string("key"),
            protocol::bulk_string("value"),
            protocol::bulk_string("KEEPTTL"),
            protocol::bulk_string("1"),
        ]);
        let cmd = Set { message: &message };

        let result = cmd.execute(&create_test_storage()).unwrap();
        assert_eq!(
            result[0],
            protocol::simple_error("ERR syntax error")
        );
    }
}
