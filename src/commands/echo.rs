/// ECHO command - echoes the argument back to the client.
///
/// Syntax: ECHO <message>
/// Returns: the argument as a bulk string

use std::sync::{Arc, Mutex};

use crate::protocol;
use crate::storage::Storage;
use super::RedisCommand;

pub struct Echo<'a> {
    pub message: &'a protocol::DataType,
}

impl RedisCommand for Echo<'_> {
    fn execute(
        &self,
        _: &Arc<Mutex<Storage>>,
    ) -> Result<Vec<protocol::DataType>, anyhow::Error> {
        match super::argument_bytes(self.message, 1) {
            Some(bytes) => Ok(vec![protocol::bulk_string_from_bytes(bytes)]),
            None => Ok(super::wrong_arguments("echo")),
        }
    }

    fn is_propagated_to_replicas(&self) -> bool {
        false
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

    #[test]
    fn test_echo_returns_argument() {
        let message = protocol::array(vec![
            protocol::bulk_string("ECHO"),
            protocol::bulk_string("Hello Redis!"),
        ]);
        let cmd = Echo { message: &message };

        let result = cmd.execute(&create_test_storage()).unwrap();
        assert_eq!(result[0].as_string().unwrap(), "Hello Redis!");
    }

    #[test]
    fn test_echo_is_binary_safe() {
        let payload = vec![0u8, 13, 10, 200];
        let message = protocol::array(vec![
            protocol::bulk_string("ECHO"),
            protocol::bulk_string_from_bytes(payload.clone()),
        ]);
        let cmd = Echo { message: &message };

        let result = cmd.execute(&create_test_storage()).unwrap();
        assert_eq!(
            result[0],
            protocol::bulk_string_from_bytes(payload)
        );
    }

    #[test]
    fn test_echo_without_argument_is_an_arity_error() {
        let message = protocol::array(vec![protocol::bulk_string("ECHO")]);
        let cmd = Echo { message: &message };

        let result = cmd.execute(&create_test_storage()).unwrap();
        assert!(matches!(
            result[0],
            protocol::DataType::SimpleError { .. }
        ));
    }
}
