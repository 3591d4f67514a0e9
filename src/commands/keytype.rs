/// TYPE command - reports the kind of value a key holds.
///
/// Syntax: TYPE <key>
/// Returns: simple string `string`, `stream` or `none`

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::protocol;
use crate::storage::Storage;
use super::RedisCommand;

pub struct KeyType<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for KeyType<'_> {
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let key = match super::argument_string(self.message, 1) {
            Some(key) => key,
            None => return Ok(super::wrong_arguments("type")),
        };
        let mut data = storage
            .lock()
            .map_err(|e| anyhow!("Failed to lock storage: {}", e))?;
        Ok(vec![protocol::simple_string(data.type_of(&key))])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}
