/// CLI argument parsing for the server.
///
/// Flags: `--port <n>`, `--replicaof <host> <port>` (the quoted
/// `--replicaof "host port"` form also works), `--dir <path>` and
/// `--dbfilename <name>`.

use anyhow::anyhow;

/// Extracts an option value from command-line arguments.
///
/// Looks for `--{option_name}` and returns the following argument.
fn get_option_value(option_name: &str, args: &[String]) -> Option<String> {
    let option_flag = format!("--{}", option_name);
    if let Some(option_position) = args.iter().position(|x| x == &option_flag) {
        args.get(option_position + 1).cloned()
    } else {
        None
    }
}

/// Parses the port from command-line arguments.
///
/// # Examples
/// ```
/// let args = vec!["prog".to_string(), "--port".to_string(), "6380".to_string()];
/// assert_eq!(miniredis::cli::get_port(&args).unwrap(), Some(6380));
/// ```
pub fn get_port(args: &[String]) -> Result<Option<u16>, anyhow::Error> {
    match get_option_value("port", args) {
        Some(p) => p.parse().map(Some).map_err(Into::into),
        None => Ok(None),
    }
}

/// Parses the primary's address from `--replicaof`, normalized to
/// `host:port`. Accepts `--replicaof host port` and the single quoted
/// argument `--replicaof "host port"`.
pub fn get_replica_of(args: &[String]) -> Result<Option<String>, anyhow::Error> {
    let flag = "--replicaof".to_string();
    let position = match args.iter().position(|x| x == &flag) {
        Some(position) => position,
        None => return Ok(None),
    };
    let first = args
        .get(position + 1)
        .ok_or_else(|| anyhow!("--replicaof requires <host> <port>"))?;
    let (host, port) = match first.split_once(' ') {
        Some((host, port)) => (host.to_string(), port.to_string()),
        None => {
            let port = args
                .get(position + 2)
                .ok_or_else(|| anyhow!("--replicaof requires <host> <port>"))?;
            (first.clone(), port.clone())
        }
    };
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid --replicaof port: {:?}", port))?;
    Ok(Some(format!("{}:{}", host, port)))
}

pub fn get_dir(args: &[String]) -> Option<String> {
    get_option_value("dir", args)
}

pub fn get_dbfilename(args: &[String]) -> Option<String> {
    get_option_value("dbfilename", args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_option_value_found() {
        assert_eq!(
            get_option_value("port", &args(&["prog", "--port", "6380"])),
            Some("6380".to_string())
        );
    }

    #[test]
    fn test_get_option_value_not_found() {
        assert_eq!(
            get_option_value("port", &args(&["prog", "--other", "value"])),
            None
        );
    }

    #[test]
    fn test_get_port_valid() {
        assert_eq!(
            get_port(&args(&["prog", "--port", "6380"])).unwrap(),
            Some(6380)
        );
    }

    #[test]
    fn test_get_port_not_provided() {
        assert_eq!(get_port(&args(&["prog"])).unwrap(), None);
    }

    #[test]
    fn test_get_port_invalid() {
        assert!(get_port(&args(&["prog", "--port", "not-a-port"])).is_err());
    }

    #[test]
    fn test_get_replica_of_two_arguments() {
        assert_eq!(
            get_replica_of(&args(&["prog", "--replicaof", "localhost", "6379"])).unwrap(),
            Some("localhost:6379".to_string())
        );
    }

    #[test]
    fn test_get_replica_of_quoted_argument() {
        assert_eq!(
            get_replica_of(&args(&["prog", "--replicaof", "localhost 6379"])).unwrap(),
            Some("localhost:6379".to_string())
        );
    }

    #[test]
    fn test_get_replica_of_absent() {
        assert_eq!(get_replica_of(&args(&["prog"])).unwrap(), None);
    }

    #[test]
    fn test_get_replica_of_bad_port() {
        assert!(get_replica_of(&args(&["prog", "--replicaof", "localhost", "xyz"])).is_err());
    }

    #[test]
    fn test_get_dir_and_dbfilename() {
        let arguments = args(&["prog", "--dir", "/tmp", "--dbfilename", "dump.rdb"]);
        assert_eq!(get_dir(&arguments), Some("/tmp".to_string()));
        assert_eq!(get_dbfilename(&arguments), Some("dump.rdb".to_string()));
    }
}
