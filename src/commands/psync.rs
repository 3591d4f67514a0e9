/// PSYNC command - full resynchronization for replication.
///
/// Syntax: PSYNC <replication_id> <offset>
/// Returns: `+FULLRESYNC <replid> 0` followed by the raw RDB payload of
/// the current keyspace. The dispatcher registers the connection as a
/// replica right after these replies are written.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use log::*;

use crate::protocol;
use crate::rdb;
use crate::server_state::ServerState;
use crate::storage::Storage;
use super::RedisCommand;

pub struct PSync<'a> {
    pub message: &'a protocol::DataType,
    pub server_state: &'a ServerState,
}

impl RedisCommand for PSync<'_> {
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let requested_id = super::argument_string(self.message, 1);
        let requested_offset = super::argument_string(self.message, 2);
        info!(
            "serving PSYNC: requested id = {:?}, offset = {:?}",
            requested_id, requested_offset
        );

        let replication_id = self
            .server_state
            .master_replication_id
            .clone()
            .ok_or_else(|| anyhow!("PSYNC served by a node without a replication id"))?;

        let snapshot = {
            let data = storage
                .lock()
                .map_err(|e| anyhow!("Failed to lock storage: {}", e))?;
            rdb::serialize(&data)
        };

        Ok(vec![
            protocol::simple_string(&format!("FULLRESYNC {} 0", replication_id)),
            protocol::DataType::Rdb { value: snapshot },
        ])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}
