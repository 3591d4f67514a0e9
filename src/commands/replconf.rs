/// REPLCONF command - replication configuration during handshake.
///
/// Syntax: REPLCONF <subcommand> [arguments]
/// A primary acknowledges `listening-port` and `capa` with +OK.
/// `REPLCONF GETACK *` never reaches this handler: on a replica it is
/// answered inside the apply loop with the processed-bytes offset.

use std::sync::{Arc, Mutex};

use crate::protocol;
use crate::storage::Storage;
use super::RedisCommand;

pub struct ReplConf<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for ReplConf<'_> {
    fn execute(
        &self,
        _: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        if super::argument_string(self.message, 1).is_none() {
            return Ok(super::wrong_arguments("replconf"));
        }
        Ok(vec![protocol::simple_string("OK")])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}
