/// In-memory keyspace with expiration and stream support.
///
/// Values are either opaque byte strings or streams of field-value
/// entries ordered by `StreamId`. Expiry is an absolute millisecond
/// timestamp; every read path removes keys it finds expired (lazy
/// expiry), and the background sweeper in `expiry` covers the rest.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;
use crate::util::now_ms;

/// Identifier of one stream entry, ordered lexicographically on
/// (milliseconds, sequence). `0-0` is never a legal entry id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    /// XRANGE start bound: `-` is the stream start, a bare `<ms>`
    /// defaults the sequence to 0.
    pub fn parse_range_start(input: &str) -> Result<StreamId, StorageError> {
        if input == "-" {
            Ok(StreamId::ZERO)
        } else {
            input.parse()
        }
    }

    /// XRANGE end bound: `+` is the stream end, a bare `<ms>` defaults
    /// the sequence to the maximum so the whole millisecond is included.
    pub fn parse_range_end(input: &str) -> Result<StreamId, StorageError> {
        if input == "+" {
            Ok(StreamId::MAX)
        } else if input.contains('-') {
            input.parse()
        } else {
            let ms = input.parse().map_err(|_| StorageError::BadStreamId)?;
            Ok(StreamId { ms, seq: u64::MAX })
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = StorageError;

    fn from_str(input: &str) -> Result<StreamId, StorageError> {
        match input.split_once('-') {
            Some((ms, seq)) => Ok(StreamId {
                ms: ms.parse().map_err(|_| StorageError::BadStreamId)?,
                seq: seq.parse().map_err(|_| StorageError::BadStreamId)?,
            }),
            None => Ok(StreamId {
                ms: input.parse().map_err(|_| StorageError::BadStreamId)?,
                seq: 0,
            }),
        }
    }
}

/// The id argument of XADD before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSpec {
    /// `*`: both parts auto-generated from the clock.
    Auto,
    /// `<ms>-*`: caller fixes the milliseconds, sequence auto-generated.
    AutoSeq(u64),
    /// `<ms>-<seq>`: used verbatim.
    Explicit(StreamId),
}

impl IdSpec {
    pub fn parse(input: &str) -> Result<IdSpec, StorageError> {
        if input == "*" {
            return Ok(IdSpec::Auto);
        }
        match input.split_once('-') {
            Some((ms, "*")) => Ok(IdSpec::AutoSeq(
                ms.parse().map_err(|_| StorageError::BadStreamId)?,
            )),
            _ => Ok(IdSpec::Explicit(input.parse()?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    /// Field-value pairs in insertion order.
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

#[derive(Debug, PartialEq)]
pub enum Value {
    String(Vec<u8>),
    Stream(Vec<StreamEntry>),
}

/// A single keyspace slot: the value plus an optional absolute expiry.
#[derive(Debug, PartialEq)]
pub struct StoredValue {
    pub value: Value,
    /// Absolute wall-clock expiry in milliseconds; `None` never expires.
    pub expires_at_ms: Option<u64>,
}

impl StoredValue {
    pub fn string(value: Vec<u8>, expires_at_ms: Option<u64>) -> StoredValue {
        StoredValue {
            value: Value::String(value),
            expires_at_ms,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        match self.expires_at_ms {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}

/// The shared keyspace. One instance lives behind an `Arc<Mutex<_>>`;
/// each command handler holds the lock from decode to reply, which is
/// the single-writer granularity the rest of the server relies on.
#[derive(Debug, Default, PartialEq)]
pub struct Storage {
    pub data: HashMap<String, StoredValue>,
}

impl Storage {
    pub fn new(data: HashMap<String, StoredValue>) -> Storage {
        Storage { data }
    }

    /// Merge a loaded snapshot into the live keyspace, overwriting
    /// colliding keys.
    pub fn merge(&mut self, other: Storage) {
        for (key, value) in other.data.into_iter() {
            self.data.insert(key, value);
        }
    }

    pub fn set(&mut self, key: &str, value: Vec<u8>, expires_at_ms: Option<u64>) {
        self.data
            .insert(key.to_owned(), StoredValue::string(value, expires_at_ms));
    }

    /// String value of `key`, removing it first if its TTL has lapsed.
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.expire_if_due(key) {
            return Ok(None);
        }
        match self.data.get(key) {
            None => Ok(None),
            Some(StoredValue {
                value: Value::String(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(StoredValue {
                value: Value::Stream(_),
                ..
            }) => Err(StorageError::WrongType),
        }
    }

    pub fn type_of(&mut self, key: &str) -> &'static str {
        if self.expire_if_due(key) {
            return "none";
        }
        match self.data.get(key) {
            Some(StoredValue {
                value: Value::String(_),
                ..
            }) => "string",
            Some(StoredValue {
                value: Value::Stream(_),
                ..
            }) => "stream",
            None => "none",
        }
    }

    /// All live keys; expired ones are removed on the way.
    pub fn keys(&mut self) -> Vec<String> {
        let now = now_ms();
        self.data.retain(|_, stored| !stored.is_expired(now));
        self.data.keys().cloned().collect()
    }

    /// Append an entry to the stream at `key`, creating the stream if the
    /// key is absent. Resolves auto-generated id parts and enforces the
    /// strict ordering invariant.
    pub fn xadd(
        &mut self,
        key: &str,
        id_spec: IdSpec,
        fields: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<StreamId, StorageError> {
        self.expire_if_due(key);
        let stored = self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| StoredValue {
                value: Value::Stream(Vec::new()),
                expires_at_ms: None,
            });
        let entries = match &mut stored.value {
            Value::Stream(entries) => entries,
            Value::String(_) => return Err(StorageError::WrongType),
        };
        let last = entries.last().map(|entry| entry.id);
        let id = match id_spec {
            IdSpec::Explicit(id) => id,
            IdSpec::AutoSeq(ms) => StreamId {
                ms,
                seq: auto_sequence(ms, last),
            },
            IdSpec::Auto => {
                let ms = now_ms();
                StreamId {
                    ms,
                    seq: auto_sequence(ms, last),
                }
            }
        };
        if id == StreamId::ZERO {
            return Err(StorageError::StreamIdZero);
        }
        if let Some(last) = last {
            if id <= last {
                return Err(StorageError::StreamIdTooSmall);
            }
        }
        entries.push(StreamEntry { id, fields });
        Ok(id)
    }

    /// Entries with ids in the inclusive range `[start, end]`, ascending.
    pub fn xrange(
        &self,
        key: &str,
        start: StreamId,
        end: StreamId,
    ) -> Result<Vec<StreamEntry>, StorageError> {
        match self.data.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue {
                value: Value::Stream(entries),
                ..
            }) => Ok(entries
                .iter()
                .filter(|entry| entry.id >= start && entry.id <= end)
                .cloned()
                .collect()),
            Some(_) => Err(StorageError::WrongType),
        }
    }

    /// Entries with ids strictly greater than `after`, ascending.
    pub fn xread(&self, key: &str, after: StreamId) -> Result<Vec<StreamEntry>, StorageError> {
        match self.data.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue {
                value: Value::Stream(entries),
                ..
            }) => Ok(entries
                .iter()
                .filter(|entry| entry.id > after)
                .cloned()
                .collect()),
            Some(_) => Err(StorageError::WrongType),
        }
    }

    /// Drop every key expired as of `now`. Returns how many were removed.
    pub fn remove_expired(&mut self, now: u64) -> usize {
        let before = self.data.len();
        self.data.retain(|_, stored| !stored.is_expired(now));
        before - self.data.len()
    }

    /// String keys and their values, for snapshot serialization.
    pub fn string_pairs(&self) -> Vec<(String, Vec<u8>, Option<u64>)> {
        let mut pairs = Vec::new();
        for (key, stored) in self.data.iter() {
            if let Value::String(value) = &stored.value {
                pairs.push((key.clone(), value.clone(), stored.expires_at_ms));
            }
        }
        pairs
    }

    fn expire_if_due(&mut self, key: &str) -> bool {
        let due = matches!(self.data.get(key), Some(stored) if stored.is_expired(now_ms()));
        if due {
            self.data.remove(key);
        }
        due
    }
}

fn auto_sequence(ms: u64, last: Option<StreamId>) -> u64 {
    match last {
        Some(last) if last.ms == ms => last.seq + 1,
        // A fresh millisecond starts at 0, except ms 0 where 0-0 is
        // reserved and the first legal id is 0-1.
        _ => {
            if ms == 0 {
                1
            } else {
                0
            }
        }
    }
}
