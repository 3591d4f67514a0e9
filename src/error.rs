/// Error taxonomy for the server.
///
/// Three families with different policies:
/// - `RespError`: wire-level failures; the connection is closed, never
///   reported back to the client.
/// - `StorageError`: command-level violations; the `Display` text is the
///   exact RESP simple-error payload sent to the client, and the
///   connection stays open.
/// - `RdbError`: snapshot decoding failures; fatal at startup.

use thiserror::Error;

/// Failure while framing RESP input.
#[derive(Debug, Error, PartialEq)]
pub enum RespError {
    /// The peer closed the connection, either cleanly or mid-frame.
    #[error("incomplete input: peer closed mid-frame")]
    Incomplete,
    /// The input cannot be RESP (unknown leading byte, bad length line).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Command-level violation. `Display` is the client-visible message.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum StorageError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("ERR The ID specified in XADD must be greater than 0-0")]
    StreamIdZero,
    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdTooSmall,
    #[error("ERR Invalid stream ID specified as stream command argument")]
    BadStreamId,
    #[error("ERR syntax error")]
    Syntax,
}

/// Failure while decoding an RDB snapshot.
#[derive(Debug, Error)]
pub enum RdbError {
    #[error("not an RDB file: missing REDIS magic")]
    BadMagic,
    #[error("truncated RDB file")]
    Truncated,
    #[error("unsupported RDB feature: {0}")]
    Unsupported(String),
    #[error("RDB checksum mismatch: stored {stored:016x}, computed {computed:016x}")]
    ChecksumMismatch { stored: u64, computed: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
