/// CONFIG command - reads startup configuration values.
///
/// Syntax: CONFIG GET <name>
/// Returns: `[name, value]`, with a null bulk value for unknown names.

use std::sync::{Arc, Mutex};

use crate::protocol;
use crate::server_state::ServerState;
use crate::storage::Storage;
use super::RedisCommand;

pub struct Config<'a> {
    pub message: &'a protocol::DataType,
    pub server_state: &'a ServerState,
}

impl RedisCommand for Config<'_> {
    fn execute(
        &self,
        _: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let subcommand = match super::argument_string(self.message, 1) {
            Some(subcommand) => subcommand,
            None => return Ok(super::wrong_arguments("config")),
        };
        if !subcommand.eq_ignore_ascii_case("get") {
            return Ok(vec![protocol::simple_error(&format!(
                "ERR unknown CONFIG subcommand '{}'",
                subcommand
            ))]);
        }
        let name = match super::argument_string(self.message, 2) {
            Some(name) => name,
            None => return Ok(super::wrong_arguments("config|get")),
        };
        let value = match self.server_state.config.get(&name) {
            Some(value) => protocol::bulk_string(value),
            None => protocol::null_bulk_string(),
        };
        Ok(vec![protocol::array(vec![
            protocol::bulk_string(&name),
            value,
        ])])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}
