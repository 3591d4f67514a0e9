/// XADD command - appends an entry to a stream.
///
/// Syntax: XADD <key> <id> <field> <value> [<field> <value> ...]
/// The id is `*`, `<ms>-*` or `<ms>-<seq>`. Returns the resolved id as
/// a bulk string, or the exact ordering error when the id does not
/// advance the stream.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::protocol;
use crate::storage::{IdSpec, Storage};
use super::RedisCommand;

pub struct XAdd<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for XAdd<'_> {
    fn execute(
        &self,
        storage: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        let key = super::argument_string(self.message, 1);
        let id_raw = super::argument_string(self.message, 2);
        let count = super::argument_count(self.message);
        let (key, id_raw) = match (key, id_raw) {
            (Some(key), Some(id_raw)) if count >= 5 && (count - 3) % 2 == 0 => (key, id_raw),
            _ => return Ok(super::wrong_arguments("xadd")),
        };

        let mut fields = Vec::with_capacity((count - 3) / 2);
        for index in (3..count).step_by(2) {
            let field = super::argument_bytes(self.message, index);
            let value = super::argument_bytes(self.message, index + 1);
            match (field, value) {
                (Some(field), Some(value)) => fields.push((field, value)),
                _ => return Ok(super::wrong_arguments("xadd")),
            }
        }

        let id_spec = match IdSpec::parse(&id_raw) {
            Ok(id_spec) => id_spec,
            Err(error) => return Ok(vec![protocol::simple_error(&error.to_string())]),
        };

        let mut data = storage
            .lock()
            .map_err(|e| anyhow!("Failed to lock storage: {}", e))?;
        let reply = match data.xadd(&key, id_spec, fields) {
            Ok(id) => protocol::bulk_string(&id.to_string()),
            Err(error) => protocol::simple_error(&error.to_string()),
        };
        Ok(vec![reply])
    }

    fn is_propagated_to_replicas(&self) -> bool {
        true
    }

    fn serialize(&self) -> Vec<u8> {
        self.message.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn create_test_storage() -> Arc<Mutex<Storage>> {
        Arc::new(Mutex::new(Storage::new(HashMap::new())))
    }

    fn xadd_message(key: &str, id: &str, pairs: &[(&str, &str)]) -> protocol::DataType {
        let mut elements = vec![
            protocol::bulk_string("XADD"),
            protocol::bulk_string(key),
            protocol::bulk_string(id),
        ];
        for (field, value) in pairs {
            elements.push(protocol::bulk_string(field));
            elements.push(protocol::bulk_string(value));
        }
        protocol::array(elements)
    }

    #[test]
    fn test_xadd_explicit_id() {
        let storage = create_test_storage();
        let message = xadd_message("s", "5-0", &[("a", "1")]);
        let result = XAdd { message: &message }.execute(&storage).unwrap();
        assert_eq!(result[0], protocol::bulk_string("5-0"));
        assert!(XAdd { message: &message }.is_propagated_to_replicas());
    }

    #[test]
    fn test_xadd_rejects_equal_or_smaller_id() {
        let storage = create_test_storage();
        let first = xadd_message("s", "5-0", &[("a", "1")]);
        XAdd { message: &first }.execute(&storage).unwrap();

        let second = xadd_message("s", "5-0", &[("a", "2")]);
        let result = XAdd { message: &second }.execute(&storage).unwrap();
        assert_eq!(
            result[0],
            protocol::simple_error(
                "ERR The ID specified in XADD is equal or smaller than the target stream top item"
            )
        );
    }

    #[test]
    fn test_xadd_rejects_zero_id() {
        let storage = create_test_storage();
        let message = xadd_message("s", "0-0", &[("a", "1")]);
        let result = XAdd { message: &message }.execute(&storage).unwrap();
        assert_eq!(
            result[0],
            protocol::simple_error("ERR The ID specified in XADD must be greater than 0-0")
        );
    }

    #[test]
    fn test_xadd_auto_sequence_at_ms_zero() {
        let storage = create_test_storage();
        let message = xadd_message("s", "0-*", &[("x", "y")]);
        let result = XAdd { message: &message }.execute(&storage).unwrap();
        assert_eq!(result[0], protocol::bulk_string("0-1"));

        let result = XAdd { message: &message }.execute(&storage).unwrap();
        assert_eq!(result[0], protocol::bulk_string("0-2"));
    }

    #[test]
    fn test_xadd_fully_auto_id() {
        let storage = create_test_storage();
        let message = xadd_message("s", "*", &[("a", "1")]);
        let result = XAdd { message: &message }.execute(&storage).unwrap();
        let id = result[0].as_string().unwrap();
        assert!(id.contains('-'));
    }

    #[test]
    fn test_xadd_bad_id_is_an_error_reply() {
        let storage = create_test_storage();
        let message = xadd_message("s", "abc", &[("a", "1")]);
        let result = XAdd { message: &message }.execute(&storage).unwrap();
        assert_eq!(
            result[0],
            protocol::simple_error(
                "ERR Invalid stream ID specified as stream command argument"
            )
        );
    }

    #[test]
    fn test_xadd_unpaired_fields_is_arity_error() {
        let storage = create_test_storage();
        let message = protocol::array(vec![
            protocol::bulk_string("XADD"),
            protocol::bulk_string("s"),
            protocol::bulk_string("1-1"),
            protocol::bulk_string("orphan"),
        ]);
        let result = XAdd { message: &message }.execute(&storage).unwrap();
        assert!(matches!(
            result[0],
            protocol::DataType::SimpleError { .. }
        ));
    }
}
