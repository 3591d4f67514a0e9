/// PING command - tests server connectivity.
///
/// Syntax: PING
/// Returns: +PONG

use std::sync::{Arc, Mutex};

use crate::protocol;
use crate::storage::Storage;
use super::RedisCommand;

pub struct Ping<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for Ping<'_> {
    fn execute(
        &self,
        _: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        Ok(vec![protocol::simple_string("PONG")])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}
