/// XRANGE command - reads an inclusive id range from a stream.
///
/// Syntax: XRANGE <key> <start> <end>
/// `-` is the stream start, `+` the stream end; a bare millisecond part
/// covers the whole millisecond. Entries come back ascending, each as
/// `[id, [field, value, ...]]`.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::protocol;
use crate::storage::{Storage, StreamId};
use super::RedisCommand;

pub struct XRange<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for XRange<'_> {
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let key = super::argument_string(self.message, 1);
        let start_raw = super::argument_string(self.message, 2);
        let end_raw = super::argument_string(self.message, 3);
        let (key, start_raw, end_raw) = match (key, start_raw, end_raw) {
            (Some(key), Some(start), Some(end)) => (key, start, end),
            _ => return Ok(super::wrong_arguments("xrange")),
        };

        let bounds = StreamId::parse_range_start(&start_raw)
            .and_then(|start| StreamId::parse_range_end(&end_raw).map(|end| (start, end)));
        let (start, end) = match bounds {
            Ok(bounds) => bounds,
            Err(error) => return Ok(vec![protocol::simple_error(&error.to_string())]),
        };

        let data = storage
            .lock()
            .map_err(|e| anyhow!("Failed to lock storage: {}", e))?;
        let reply = match data.xrange(&key, start, end) {
            Ok(entries) => {
                protocol::array(entries.iter().map(super::entry_frame).collect())
            }
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
