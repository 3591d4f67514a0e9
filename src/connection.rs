/// Connection handling for incoming client connections.
///
/// One thread per accepted socket: frame a message, dispatch on the
/// command verb, write the replies. Framing errors close the connection;
/// semantic errors are replies and the loop continues. Writes on a
/// primary are appended to the replication backlog after a successful
/// local apply.

use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use log::*;

use crate::commands::{self, RedisCommand};
use crate::error::RespError;
use crate::io::{RespReader, RespWriter};
use crate::protocol::{self, DataType};
use crate::server_state::ServerState;
use crate::storage::Storage;

pub fn handle_connection(
    stream: TcpStream,
    storage: &Arc<Mutex<Storage>>,
    server_state: &Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let mut reader = RespReader::new(stream.try_clone()?);
    let mut writer = RespWriter::new(stream.try_clone()?);
    loop {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(RespError::Incomplete) => {
                debug!("client disconnected");
                return Ok(());
            }
            Err(RespError::Protocol(reason)) => {
                warn!("closing connection on protocol error: {}", reason);
                let _ = writer.close_write();
                return Ok(());
            }
        };
        if !matches!(message, DataType::Array { .. }) {
            debug!("ignoring non-array frame from client");
            continue;
        }

        let command_name = commands::parse_command_name(&message)?.to_uppercase();
        let state = server_state.as_ref();
        let command: Option<Box<dyn RedisCommand + '_>> = match command_name.as_str() {
            "PING" => Some(Box::new(commands::Ping { message: &message })),
            "ECHO" => Some(Box::new(commands::Echo { message: &message })),
            "COMMAND" => Some(Box::new(commands::Command { message: &message })),
            "SET" => Some(Box::new(commands::Set { message: &message })),
            "GET" => Some(Box::new(commands::Get { message: &message })),
            "TYPE" => Some(Box::new(commands::KeyType { message: &message })),
            "KEYS" => Some(Box::new(commands::Keys { message: &message })),
            "CONFIG" => Some(Box::new(commands::Config {
                message: &message,
                server_state: state,
            })),
            "INFO" => Some(Box::new(commands::Info {
                message: &message,
                server_state: state,
            })),
            "REPLCONF" => Some(Box::new(commands::ReplConf { message: &message })),
            "PSYNC" => Some(Box::new(commands::PSync {
                message: &message,
                server_state: state,
            })),
            "WAIT" => Some(Box::new(commands::Wait {
                message: &message,
                server_state: state,
            })),
            "XADD" => Some(Box::new(commands::XAdd { message: &message })),
            "XRANGE" => Some(Box::new(commands::XRange { message: &message })),
            "XREAD" => Some(Box::new(commands::XRead { message: &message })),
            _ => None,
        };

        match command {
            Some(command) => {
                let reply = command.execute(storage)?;
                let rejected = reply
                    .iter()
                    .any(|frame| matches!(frame, DataType::SimpleError { .. }));
                for frame in &reply {
                    writer.write_message(frame)?;
                }
                if !rejected
                    && server_state.is_master()
                    && command.is_propagated_to_replicas()
                {
                    server_state.enqueue_write(command.serialize());
                }
                if command_name == "PSYNC" {
                    // From here on the socket belongs to the replication
                    // engine: the propagation drain writes to it and WAIT
                    // reads ACKs from it.
                    server_state.register_replica(stream.try_clone()?);
                    info!("replica registered");
                    return Ok(());
                }
            }
            None => {
                warn!("unknown command '{}'", command_name);
                writer.write_message(&protocol::simple_error(&format!(
                    "ERR unknown command '{}'",
                    command_name
                )))?;
            }
        }
    }
}
