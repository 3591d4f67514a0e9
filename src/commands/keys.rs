/// KEYS command - lists live keys.
///
/// Syntax: KEYS *
/// Only the `*` pattern is supported; the reply is an array of all keys
/// that have not expired.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::protocol;
use crate::storage::Storage;
use super::RedisCommand;

pub struct Keys<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for Keys<'_> {
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let pattern = match super::argument_string(self.message, 1) {
            Some(pattern) => pattern,
            None => return Ok(super::wrong_arguments("keys")),
        };
        if pattern != "*" {
            return Ok(vec![protocol::simple_error(
                "ERR only the '*' pattern is supported",
            )]);
        }
        let mut data = storage
            .lock()
            .map_err(|e| anyhow!("Failed to lock storage: {}", e))?;
        let keys = data
            .keys()
            .into_iter()
            .map(|key| protocol::bulk_string(&key))
            .collect();
        Ok(vec![protocol::array(keys)])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}
