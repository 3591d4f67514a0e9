/// Replication: handshake, the replica apply loop and primary-side
/// propagation.
///
/// A replica opens one upstream connection, walks the PING → REPLCONF →
/// PSYNC handshake, bootstraps from the RDB payload and then applies
/// propagated frames forever, keeping a byte offset in lockstep with the
/// primary's write stream. A primary pushes serialized writes into a
/// FIFO backlog which a background thread drains to every registered
/// replica.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, ensure};
use log::*;

use crate::commands::{self, RedisCommand};
use crate::error::RespError;
use crate::io::{RespReader, RespWriter};
use crate::protocol::{self, DataType};
use crate::rdb;
use crate::server_state::ServerState;
use crate::storage::Storage;

/// Read timeout while the handshake is in flight.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Cadence of the propagation drain.
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound on frames shipped per drain tick, so a deep backlog
/// cannot monopolize the replica sockets.
const MAX_FRAMES_PER_TICK: usize = 64;

/// Connect to the primary, perform the handshake and run the apply loop
/// until the link drops. Automatic reconnection is deliberately not
/// attempted.
pub fn join_cluster(
    primary_address: &str,
    server_state: &Arc<ServerState>,
    storage: &Arc<Mutex<Storage>>,
) -> Result<(), anyhow::Error> {
    let stream = TcpStream::connect(primary_address)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let mut reader = RespReader::new(stream.try_clone()?);
    let mut writer = RespWriter::new(stream.try_clone()?);

    // Step 1: PING
    writer.write_message(&protocol::array(vec![protocol::bulk_string("PING")]))?;
    expect_simple_reply(&mut reader, "PONG")?;

    // Step 2: REPLCONF listening-port
    writer.write_message(&protocol::array(vec![
        protocol::bulk_string("REPLCONF"),
        protocol::bulk_string("listening-port"),
        protocol::bulk_string(&server_state.port.to_string()),
    ]))?;
    expect_simple_reply(&mut reader, "OK")?;

    // Step 3: capabilities, doubled as real replicas send them
    writer.write_message(&protocol::array(vec![
        protocol::bulk_string("REPLCONF"),
        protocol::bulk_string("capa"),
        protocol::bulk_string("psync2"),
        protocol::bulk_string("capa"),
        protocol::bulk_string("psync2"),
    ]))?;
    expect_simple_reply(&mut reader, "OK")?;

    // Step 4: PSYNC ? -1 expects +FULLRESYNC <replid> <offset>
    writer.write_message(&protocol::array(vec![
        protocol::bulk_string("PSYNC"),
        protocol::bulk_string("?"),
        protocol::bulk_string("-1"),
    ]))?;
    let reply = reader
        .read_message()
        .map_err(|e| anyhow!("reading FULLRESYNC reply: {}", e))?;
    let reply_text = reply.as_string()?;
    ensure!(
        reply_text.starts_with("FULLRESYNC"),
        "expected FULLRESYNC from the primary, got {:?}",
        reply_text
    );
    if let Some(replication_id) = reply_text.split(' ').nth(1) {
        info!("primary replication id: {}", replication_id);
    }

    // Step 5: the RDB snapshot, length-prefixed with no trailing CRLF
    let snapshot = reader
        .read_rdb_payload()
        .map_err(|e| anyhow!("reading RDB payload: {}", e))?;
    match rdb::load_bytes(&snapshot) {
        Ok(loaded) => {
            info!(
                "bootstrapped {} keys from the primary's snapshot",
                loaded.data.len()
            );
            storage
                .lock()
                .map_err(|e| anyhow!("Failed to lock storage: {}", e))?
                .merge(loaded);
        }
        Err(error) => warn!("could not parse the primary's RDB payload: {}", error),
    }

    // Step 6: apply propagated commands; reads now block indefinitely.
    stream.set_read_timeout(None)?;
    info!("replica applying commands from {}", primary_address);
    apply_loop(&mut reader, &mut writer, storage)
}

fn expect_simple_reply(
    reader: &mut RespReader<TcpStream>,
    expected: &str,
) -> Result<(), anyhow::Error> {
    let reply = reader
        .read_message()
        .map_err(|e| anyhow!("handshake read failed: {}", e))?;
    ensure!(
        reply.as_string()? == expected,
        "expected +{} from the primary, got {:?}",
        expected,
        reply
    );
    Ok(())
}

/// Apply frames from the primary until the link drops. Writes go through
/// the same command handlers the client path uses, with replies
/// discarded; only `REPLCONF GETACK *` is answered, and the byte offset
/// advances after each frame is handled.
pub fn apply_loop<R: Read, W: Write>(
    reader: &mut RespReader<R>,
    writer: &mut RespWriter<W>,
    storage: &Arc<Mutex<Storage>>,
) -> Result<(), anyhow::Error> {
    let mut processed_bytes: u64 = 0;
    loop {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(RespError::Incomplete) => {
                warn!("lost connection to the primary");
                return Ok(());
            }
            Err(RespError::Protocol(reason)) => {
                error!("protocol error on the replication link: {}", reason);
                return Ok(());
            }
        };
        apply_frame(&message, processed_bytes, writer, storage)?;
        processed_bytes += message.byte_size() as u64;
    }
}

fn apply_frame<W: Write>(
    message: &DataType,
    processed_bytes: u64,
    writer: &mut RespWriter<W>,
    storage: &Arc<Mutex<Storage>>,
) -> Result<(), anyhow::Error> {
    if !matches!(message, DataType::Array { .. }) {
        return Ok(());
    }
    let verb = commands::parse_command_name(message)
        .unwrap_or_default()
        .to_uppercase();
    match verb.as_str() {
        "SET" => {
            let _ = commands::Set { message }.execute(storage)?;
        }
        "XADD" => {
            let _ = commands::XAdd { message }.execute(storage)?;
        }
        "REPLCONF" => {
            let is_getack = commands::argument_string(message, 1)
                .map(|subcommand| subcommand.eq_ignore_ascii_case("getack"))
                .unwrap_or(false);
            if is_getack {
                // The reported offset excludes the GETACK frame itself.
                writer.write_message(&protocol::array(vec![
                    protocol::bulk_string("REPLCONF"),
                    protocol::bulk_string("ACK"),
                    protocol::bulk_string(&processed_bytes.to_string()),
                ]))?;
            }
        }
        other => debug!("replica ignoring propagated '{}'", other),
    }
    Ok(())
}

/// Primary-side drain: ship backlogged write frames to every registered
/// replica, in registration order, dropping replicas whose socket fails.
/// Runs on its own thread for the lifetime of the process.
pub fn propagation_loop(server_state: &ServerState) {
    loop {
        thread::sleep(DRAIN_INTERVAL);
        let frames = drain_backlog(server_state, MAX_FRAMES_PER_TICK);
        if !frames.is_empty() {
            fan_out(server_state, &frames);
        }
    }
}

fn drain_backlog(server_state: &ServerState, limit: usize) -> Vec<Vec<u8>> {
    match server_state.replication_backlog.lock() {
        Ok(mut backlog) => {
            let take = backlog.len().min(limit);
            backlog.drain(..take).collect()
        }
        Err(_) => Vec::new(),
    }
}

fn fan_out(server_state: &ServerState, frames: &[Vec<u8>]) {
    let mut replicas = match server_state.replica_connections.lock() {
        Ok(replicas) => replicas,
        Err(_) => return,
    };
    let mut dead: Vec<usize> = Vec::new();
    for frame in frames {
        for (index, replica) in replicas.iter_mut().enumerate() {
            if dead.contains(&index) {
                continue;
            }
            if let Err(error) = replica.write_all(frame) {
                warn!("dropping replica after failed write: {}", error);
                dead.push(index);
            }
        }
    }
    dead.sort_unstable_by(|a, b| b.cmp(a));
    for index in dead {
        replicas.remove(index);
    }
}
