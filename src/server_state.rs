/// Process-wide server state shared by every connection task.
///
/// Owns the role, the startup configuration map, the master replication
/// id/offset, the registry of connected replica sockets and the FIFO
/// backlog of serialized write frames awaiting propagation.

use std::collections::{HashMap, VecDeque};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::util::random_id;

pub struct ServerState {
    /// `host:port` of the upstream primary; `None` on a primary.
    pub replica_of: Option<String>,
    pub port: u16,
    /// Read-only after startup: `dir`, `dbfilename`.
    pub config: HashMap<String, String>,
    pub master_replication_id: Option<String>,
    master_repl_offset: AtomicU64,
    pub replica_connections: Mutex<Vec<TcpStream>>,
    pub replication_backlog: Mutex<VecDeque<Vec<u8>>>,
}

impl ServerState {
    const REPLICATION_ID_LENGTH: usize = 40;

    pub fn new(
        replica_of: Option<String>,
        port: u16,
        config: HashMap<String, String>,
    ) -> ServerState {
        let master_replication_id = match replica_of {
            Some(_) => None,
            None => Some(random_id(ServerState::REPLICATION_ID_LENGTH)),
        };
        ServerState {
            replica_of,
            port,
            config,
            master_replication_id,
            master_repl_offset: AtomicU64::new(0),
            replica_connections: Mutex::new(Vec::new()),
            replication_backlog: Mutex::new(VecDeque::new()),
        }
    }

    pub fn is_master(&self) -> bool {
        self.replica_of.is_none()
    }

    pub fn master_offset(&self) -> u64 {
        self.master_repl_offset.load(Ordering::SeqCst)
    }

    /// Queue a serialized write frame for propagation and advance the
    /// master offset by its wire length.
    pub fn enqueue_write(&self, frame: Vec<u8>) {
        self.master_repl_offset
            .fetch_add(frame.len() as u64, Ordering::SeqCst);
        if let Ok(mut backlog) = self.replication_backlog.lock() {
            backlog.push_back(frame);
        }
    }

    pub fn register_replica(&self, stream: TcpStream) {
        if let Ok(mut replicas) = self.replica_connections.lock() {
            replicas.push(stream);
        }
    }

    pub fn replica_count(&self) -> usize {
        self.replica_connections
            .lock()
            .map(|replicas| replicas.len())
            .unwrap_or(0)
    }
}
