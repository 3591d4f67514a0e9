/// Redis command trait and utilities.
///
/// This module defines the interface for Redis commands and exports
/// all available command implementations.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::protocol::{self, DataType};
use crate::storage::{Storage, StreamEntry};

pub mod command;
pub mod config;
pub mod echo;
pub mod get;
pub mod info;
pub mod keys;
pub mod keytype;
pub mod ping;
pub mod psync;
pub mod replconf;
pub mod set;
pub mod wait;
pub mod xadd;
pub mod xrange;
pub mod xread;

pub use command::Command;
pub use config::Config;
pub use echo::Echo;
pub use get::Get;
pub use info::Info;
pub use keys::Keys;
pub use keytype::KeyType;
pub use ping::Ping;
pub use psync::PSync;
pub use replconf::ReplConf;
pub use set::Set;
pub use wait::Wait;
pub use xadd::XAdd;
pub use xrange::XRange;
pub use xread::XRead;

/// Trait for implementing Redis commands.
///
/// All Redis commands must implement this trait to be handled by the
/// server. Semantic violations are returned as `SimpleError` replies,
/// not as `Err`; `Err` is reserved for internal failures that should
/// close the connection.
pub trait RedisCommand {
    /// Execute the command and return response(s) to send to the client.
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<DataType>, anyhow::Error>;

    /// Whether a primary should append this command to the replication
    /// backlog after a successful local apply.
    fn is_propagated_to_replicas(&self) -> bool;

    /// The RESP wire form of this command, as propagated to replicas.
    fn serialize(&self) -> Vec<u8>;
}

/// The command verb of a received array, or an error if the frame is not
/// an array at all. Matching is done case-insensitively by the caller.
pub fn parse_command_name(message: &DataType) -> Result<String, anyhow::Error> {
    match message {
        DataType::Array { elements } => match elements.first() {
            Some(first) => first.as_string(),
            None => Ok(String::new()),
        },
        other => Err(anyhow!("command frame is not an array: {:?}", other)),
    }
}

/// The `index`-th element of a command array as raw bytes.
pub(crate) fn argument_bytes(message: &DataType, index: usize) -> Option<Vec<u8>> {
    match message {
        DataType::Array { elements } => match elements.get(index) {
            Some(DataType::BulkString { value: Some(bytes) }) => Some(bytes.clone()),
            Some(DataType::SimpleString { value }) => Some(value.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// The `index`-th element of a command array as UTF-8 text.
pub(crate) fn argument_string(message: &DataType, index: usize) -> Option<String> {
    match message {
        DataType::Array { elements } => {
            elements.get(index).and_then(|element| element.as_string().ok())
        }
        _ => None,
    }
}

pub(crate) fn argument_count(message: &DataType) -> usize {
    match message {
        DataType::Array { elements } => elements.len(),
        _ => 0,
    }
}

/// The standard arity error reply.
pub(crate) fn wrong_arguments(name: &str) -> Vec<DataType> {
    vec![protocol::simple_error(&format!(
        "ERR wrong number of arguments for '{}' command",
        name
    ))]
}

/// One stream entry rendered as `[id, [f1, v1, f2, v2, …]]`.
pub(crate) fn entry_frame(entry: &StreamEntry) -> DataType {
    let mut flat = Vec::with_capacity(entry.fields.len() * 2);
    for (field, value) in &entry.fields {
        flat.push(protocol::bulk_string_from_bytes(field.clone()));
        flat.push(protocol::bulk_string_from_bytes(value.clone()));
    }
    protocol::array(vec![
        protocol::bulk_string(&entry.id.to_string()),
        protocol::array(flat),
    ])
}
