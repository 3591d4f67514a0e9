use std::collections::HashMap;
use std::env;
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

use log::*;

use miniredis::cli;
use miniredis::connection;
use miniredis::expiry;
use miniredis::rdb;
use miniredis::replication;
use miniredis::server_state::ServerState;
use miniredis::storage::Storage;

const DEFAULT_PORT: u16 = 6379;

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let port = cli::get_port(&args)?.unwrap_or(DEFAULT_PORT);
    let replica_of = cli::get_replica_of(&args)?;

    let mut config: HashMap<String, String> = HashMap::new();
    if let Some(dir) = cli::get_dir(&args) {
        config.insert("dir".to_string(), dir);
    }
    if let Some(dbfilename) = cli::get_dbfilename(&args) {
        config.insert("dbfilename".to_string(), dbfilename);
    }

    // Both --dir and --dbfilename are needed to locate a snapshot; a
    // malformed file is fatal, an absent one is a cold start.
    let initial = match (config.get("dir"), config.get("dbfilename")) {
        (Some(dir), Some(dbfilename)) => rdb::load_file(&Path::new(dir).join(dbfilename))?,
        _ => Storage::default(),
    };

    let storage = Arc::new(Mutex::new(initial));
    let server_state = Arc::new(ServerState::new(replica_of, port, config));

    if let Some(primary_address) = server_state.replica_of.clone() {
        let server_state = Arc::clone(&server_state);
        let storage = Arc::clone(&storage);
        thread::spawn(move || {
            if let Err(error) =
                replication::join_cluster(&primary_address, &server_state, &storage)
            {
                error!("replication link failed: {:#}", error);
            }
        });
    } else {
        let server_state = Arc::clone(&server_state);
        thread::spawn(move || replication::propagation_loop(&server_state));
    }

    {
        let storage = Arc::clone(&storage);
        thread::spawn(move || {
            expiry::active_expiry_loop(&storage, expiry::ACTIVE_EXPIRY_INTERVAL)
        });
    }

    let listener = TcpListener::bind(("127.0.0.1", port))?;
    info!(
        "listening on 127.0.0.1:{} as {}",
        port,
        if server_state.is_master() {
            "primary"
        } else {
            "replica"
        }
    );

    for incoming_connection in listener.incoming() {
        let stream = incoming_connection?;
        let storage = Arc::clone(&storage);
        let server_state = Arc::clone(&server_state);
        thread::spawn(move || {
            if let Err(error) = connection::handle_connection(stream, &storage, &server_state) {
                warn!("connection handler failed: {:#}", error);
            }
        });
    }
    Ok(())
}
