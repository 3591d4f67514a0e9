/// COMMAND command - connection bootstrap convenience.
///
/// `redis-cli` probes this on connect; replying +OK keeps it quiet.

use std::sync::{Arc, Mutex};

use crate::protocol;
use crate::storage::Storage;
use super::RedisCommand;

pub struct Command<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for Command<'_> {
    fn execute(
        &self,
        _: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        Ok(vec![protocol::simple_string("OK")])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}
