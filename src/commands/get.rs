/// GET command - returns the value of a key.
///
/// Syntax: GET <key>
/// Returns: the value as a bulk string, or the null bulk string if the
/// key is absent or expired. Stream keys reply WRONGTYPE.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::protocol;
use crate::storage::Storage;
use super::RedisCommand;

pub struct Get<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for Get<'_> {
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let key = match super::argument_string(self.message, 1) {
            Some(key) => key,
            None => return Ok(super::wrong_arguments("get")),
        };

        let mut data = storage
            .lock()
            .map_err(|e| anyhow!("Failed to lock storage: {}", e))?;

        let reply = match data.get(&key) {
            Ok(Some(value)) => protocol::bulk_string_from_bytes(value),
            Ok(None) => protocol::null_bulk_string(),
            Err(error) => protocol::simple_error(&error.to_string()),
        };
        Ok(vec![reply])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{IdSpec, StreamId};
    use std::collections::HashMap;

    fn create_test_storage() -> Arc<Mutex<Storage>> {
        Arc::new(Mutex::new(Storage::new(HashMap::new())))
    }

    fn get_message(key: &str) -> protocol::DataType {
        protocol::array(vec![
            protocol::bulk_string("GET"),
            protocol::bulk_string(key),
        ])
    }

    #[test]
    fn test_get_command_found() {
        let storage = create_test_storage();
        storage
            .lock()
            .unwrap()
            .set("mykey", b"myvalue".to_vec(), None);

        let message = get_message("mykey");
        let result = Get { message: &message }.execute(&storage).unwrap();
        assert_eq!(result[0].as_string().unwrap(), "myvalue");
    }

    #[test]
    fn test_get_command_missing_key_is_null_bulk() {
        let message = get_message("nonexistent");
        let result = Get { message: &message }
            .execute(&create_test_storage())
            .unwrap();
        assert_eq!(result[0], protocol::null_bulk_string());
        assert_eq!(result[0].serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_get_command_on_stream_is_wrong_type() {
        let storage = create_test_storage();
        storage
            .lock()
            .unwrap()
            .xadd(
                "events",
                IdSpec::Explicit(StreamId { ms: 1, seq: 1 }),
                vec![(b"a".to_vec(), b"1".to_vec())],
            )
            .unwrap();

        let message = get_message("events");
        let result = Get { message: &message }.execute(&storage).unwrap();
        assert_eq!(
            result[0],
            protocol::simple_error(
                "WRONGTYPE Operation against a key holding the wrong kind of value"
            )
        );
    }

    #[test]
    fn test_get_command_without_key_is_arity_error() {
        let message = protocol::array(vec![protocol::bulk_string("GET")]);
        let result = Get { message: &message }
            .execute(&create_test_storage())
            .unwrap();
        assert!(matches!(
            result[0],
            protocol::DataType::SimpleError { .. }
        ));
    }

    #[test]
    fn test_get_preserves_binary_data() {
        let storage = create_test_storage();
        let binary = vec![0u8, 1, 2, 3, 255, 254];
        storage.lock().unwrap().set("binary_key", binary.clone(), None);

        let message = get_message("binary_key");
        let result = Get { message: &message }.execute(&storage).unwrap();
        assert_eq!(result[0], protocol::bulk_string_from_bytes(binary));
    }
}
