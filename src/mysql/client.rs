//! MySQL connection pool setup.

use crate::config::RiverConfig;
use mysql_async::{OptsBuilder, Pool};

const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Create a connection pool for the configured source database.
pub fn new_mysql_pool(config: &RiverConfig) -> Pool {
    let (host, port) = split_host_port(&config.hostname);
    let opts = OptsBuilder::default()
        .ip_or_hostname(host)
        .tcp_port(port)
        .user(Some(config.username.clone()))
        .pass(Some(config.password.clone()))
        .db_name(Some(config.database.clone()));
    Pool::new(opts)
}

/// Split an optional `:port` suffix off the configured hostname.
fn split_host_port(hostname: &str) -> (String, u16) {
    if let Some((host, port)) = hostname.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return (host.to_string(), port);
        }
    }
    (hostname.to_string(), DEFAULT_MYSQL_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_without_port_uses_default() {
        assert_eq!(
            split_host_port("db.example.com"),
            ("db.example.com".to_string(), 3306)
        );
    }

    #[test]
    fn hostname_with_port_is_split() {
        assert_eq!(
            split_host_port("db.example.com:3307"),
            ("db.example.com".to_string(), 3307)
        );
    }

    #[test]
    fn non_numeric_suffix_is_part_of_the_host() {
        assert_eq!(
            split_host_port("db.example.com:replica"),
            ("db.example.com:replica".to_string(), 3306)
        );
    }
}
