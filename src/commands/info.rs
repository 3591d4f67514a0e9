/// INFO command - returns server information.
///
/// Syntax: INFO [section]
/// Returns: a bulk string of `key:value` lines under a `# Section`
/// header. Only the replication fields are populated.

use std::sync::{Arc, Mutex};

use crate::protocol;
use crate::server_state::ServerState;
use crate::storage::Storage;
use super::RedisCommand;

pub struct Info<'a> {
    pub message: &'a protocol::DataType,
    pub server_state: &'a ServerState,
}

impl RedisCommand for Info<'_> {
    fn execute(
        &self,
        _: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let section = super::argument_string(self.message, 1)
            .unwrap_or_else(|| "replication".to_string());
        let role = if self.server_state.is_master() {
            "master"
        } else {
            "slave"
        };

        let mut body = format!("# {}\r\nrole:{}", capitalize(&section), role);
        if let Some(replication_id) = &self.server_state.master_replication_id {
            body.push_str(&format!(
                "\r\nmaster_replid:{}\r\nmaster_repl_offset:{}",
                replication_id,
                self.server_state.master_offset()
            ));
        }

        Ok(vec![protocol::bulk_string(&body)])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
