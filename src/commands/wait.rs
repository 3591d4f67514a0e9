/// WAIT command - counts replicas that acknowledged the current offset.
///
/// Syntax: WAIT <numreplicas> <timeout_ms>
/// If the primary has never propagated a write, every connected replica
/// is trivially up to date and the count is returned at once. Otherwise
/// a `REPLCONF GETACK *` is fanned out, acknowledgements are collected
/// under a short per-response deadline, and if the count falls short of
/// `numreplicas` the remainder of `timeout_ms` is slept out before the
/// (unchanged) count is returned.

use std::io::Write;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use log::*;

use crate::io::RespReader;
use crate::protocol;
use crate::server_state::ServerState;
use crate::storage::Storage;
use super::RedisCommand;

/// Deadline for each individual GETACK response.
const ACK_DEADLINE: Duration = Duration::from_millis(125);

pub struct Wait<'a> {
    pub message: &'a protocol::DataType,
    pub server_state: &'a ServerState,
}

impl RedisCommand for Wait<'_> {
    fn execute(
        &self,
        _: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let numreplicas = super::argument_string(self.message, 1);
        let timeout_ms = super::argument_string(self.message, 2);
        let (numreplicas, timeout_ms) = match (numreplicas, timeout_ms) {
            (Some(n), Some(t)) => (n, t),
            _ => return Ok(super::wrong_arguments("wait")),
        };
        let (numreplicas, timeout_ms): (usize, u64) =
            match (numreplicas.parse(), timeout_ms.parse()) {
                (Ok(n), Ok(t)) => (n, t),
                _ => {
                    return Ok(vec![protocol::simple_error(
                        "ERR value is not an integer or out of range",
                    )])
                }
            };

        let master_offset = self.server_state.master_offset();
        if master_offset == 0 {
            // No write has ever been propagated, so every replica is
            // caught up by definition.
            return Ok(vec![protocol::integer(
                self.server_state.replica_count() as i64
            )]);
        }

        let started = Instant::now();
        let getack = protocol::array(vec![
            protocol::bulk_string("REPLCONF"),
            protocol::bulk_string("GETACK"),
            protocol::bulk_string("*"),
        ])
        .serialize();

        let mut acked = 0usize;
        {
            let mut replicas = self
                .server_state
                .replica_connections
                .lock()
                .map_err(|e| anyhow!("Failed to lock replica connections: {}", e))?;
            for replica in replicas.iter_mut() {
                if let Err(error) = replica.write_all(&getack) {
                    warn!("replica unreachable during WAIT: {}", error);
                }
            }
            for replica in replicas.iter_mut() {
                match read_acknowledged_offset(replica) {
                    Some(offset) if offset >= master_offset => acked += 1,
                    Some(offset) => {
                        debug!("replica acked {} behind master offset {}", offset, master_offset)
                    }
                    None => debug!("no ACK from replica within deadline"),
                }
            }
        }

        if acked < numreplicas {
            let timeout = Duration::from_millis(timeout_ms);
            let elapsed = started.elapsed();
            if elapsed < timeout {
                thread::sleep(timeout - elapsed);
            }
        }
        Ok(vec![protocol::integer(acked as i64)])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}

/// One `REPLCONF ACK <offset>` read with a bounded deadline. Anything
/// else, including silence, counts as "not acknowledged".
fn read_acknowledged_offset(stream: &mut TcpStream) -> Option<u64> {
    stream.set_read_timeout(Some(ACK_DEADLINE)).ok()?;
    let mut reader = RespReader::new(stream.try_clone().ok()?);
    let message = reader.read_message().ok()?;
    let parts = message.as_vec().ok()?;
    if parts.len() == 3
        && parts[0].eq_ignore_ascii_case("replconf")
        && parts[1].eq_ignore_ascii_case("ack")
    {
        parts[2].parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::TcpListener;

    fn wait_message(numreplicas: &str, timeout_ms: &str) -> protocol::DataType {
        protocol::array(vec![
            protocol::bulk_string("WAIT"),
            protocol::bulk_string(numreplicas),
            protocol::bulk_string(timeout_ms),
        ])
    }

    #[test]
    fn test_wait_with_no_writes_returns_replica_count_immediately() {
        let server_state = ServerState::new(None, 6379, HashMap::new());

        // A loopback socket pair stands in for a connected replica.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let _client = TcpStream::connect(address).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        server_state.register_replica(server_side);

        let message = wait_message("3", "500");
        let cmd = Wait {
            message: &message,
            server_state: &server_state,
        };

        let storage = Arc::new(Mutex::new(Storage::new(HashMap::new())));
        let started = Instant::now();
        let result = cmd.execute(&storage).unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(result[0], protocol::integer(1));
    }

    #[test]
    fn test_wait_with_no_replicas_and_no_writes_returns_zero() {
        let server_state = ServerState::new(None, 6379, HashMap::new());
        let message = wait_message("0", "100");
        let cmd = Wait {
            message: &message,
            server_state: &server_state,
        };

        let storage = Arc::new(Mutex::new(Storage::new(HashMap::new())));
        let result = cmd.execute(&storage).unwrap();
        assert_eq!(result[0], protocol::integer(0));
    }

    #[test]
    fn test_wait_with_bad_arguments_is_an_error_reply() {
        let server_state = ServerState::new(None, 6379, HashMap::new());
        let message = wait_message("many", "soon");
        let cmd = Wait {
            message: &message,
            server_state: &server_state,
        };

        let storage = Arc::new(Mutex::new(Storage::new(HashMap::new())));
        let result = cmd.execute(&storage).unwrap();
        assert_eq!(
            result[0],
            protocol::simple_error("ERR value is not an integer or out of range")
        );
    }
}
