/// XREAD command - reads stream entries after a given id.
///
/// Syntax: XREAD STREAMS <key> <id>
/// The start is exclusive: only entries with ids strictly greater than
/// the given one are returned, wrapped as `[[key, [entries...]]]`.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::protocol;
use crate::storage::{Storage, StreamId};
use super::RedisCommand;

pub struct XRead<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for XRead<'_> {
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let marker = super::argument_string(self.message, 1);
        let key = super::argument_string(self.message, 2);
        let id_raw = super::argument_string(self.message, 3);
        let (marker, key, id_raw) = match (marker, key, id_raw) {
            (Some(marker), Some(key), Some(id)) => (marker, key, id),
            _ => return Ok(super::wrong_arguments("xread")),
        };
        if !marker.eq_ignore_ascii_case("streams") {
            return Ok(vec![protocol::simple_error("ERR syntax error")]);
        }

        let after: StreamId = match id_raw.parse() {
            Ok(after) => after,
            Err(error) => return Ok(vec![protocol::simple_error(&error.to_string())]),
        };

        let data = storage
            .lock()
            .map_err(|e| anyhow!("Failed to lock storage: {}", e))?;
        let reply = match data.xread(&key, after) {
            Ok(entries) => protocol::array(vec![protocol::array(vec![
                protocol::bulk_string(&key),
                protocol::array(entries.iter().map(super::entry_frame).collect()),
            ])]),
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
