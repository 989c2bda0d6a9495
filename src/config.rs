//! River configuration.
//!
//! The CLI surface resolves into a validated [`RiverConfig`] before any cycle
//! runs. Required settings are checked here rather than by the argument
//! parser so that an embedding host can construct [`RiverOpts`] from its own
//! settings store and still get the same validation.

use crate::error::ConfigError;
use clap::Parser;
use std::time::Duration;

/// Source and river settings, as supplied by the host or the CLI.
#[derive(Parser, Clone, Debug)]
pub struct RiverOpts {
    /// Name of this river instance; also the default target index
    #[arg(long, default_value = "mysql-river", env = "RIVER_NAME")]
    pub name: String,

    /// MySQL hostname, optionally with a `:port` suffix
    #[arg(long, env = "MYSQL_HOSTNAME")]
    pub hostname: Option<String>,

    /// MySQL database name
    #[arg(long, env = "MYSQL_DATABASE")]
    pub database: Option<String>,

    /// MySQL username
    #[arg(long, env = "MYSQL_USERNAME")]
    pub username: Option<String>,

    /// MySQL password
    #[arg(long, env = "MYSQL_PASSWORD")]
    pub password: Option<String>,

    /// SQL executed on every cycle
    #[arg(long, env = "RIVER_QUERY")]
    pub query: Option<String>,

    /// Target index (defaults to the river name)
    #[arg(long)]
    pub index: Option<String>,

    /// Target document type
    #[arg(long = "type", default_value = "data")]
    pub doc_type: String,

    /// Source column whose value becomes the document id
    #[arg(long)]
    pub unique_id_field: Option<String>,

    /// Delete documents that were not refreshed by the latest run
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub delete_old_entries: bool,

    /// Milliseconds between cycle starts; zero or negative runs exactly once
    #[arg(long, default_value_t = 600_000)]
    pub interval: i64,
}

/// Validated river configuration, created once at startup.
#[derive(Debug, Clone)]
pub struct RiverConfig {
    pub name: String,
    pub hostname: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub query: String,
    pub index: String,
    pub doc_type: String,
    pub unique_id_field: Option<String>,
    pub delete_old_entries: bool,
    pub interval_ms: i64,
}

impl RiverConfig {
    /// Validate resolved settings into a config, rejecting missing or empty
    /// required keys before the scheduler ever starts.
    pub fn resolve(opts: RiverOpts) -> Result<Self, ConfigError> {
        let hostname = required(opts.hostname, "hostname")?;
        let database = required(opts.database, "database")?;
        let username = required(opts.username, "username")?;
        let password = required(opts.password, "password")?;
        let query = required(opts.query, "query")?;

        let index = match opts.index {
            Some(index) if !index.trim().is_empty() => index,
            _ => opts.name.clone(),
        };
        let unique_id_field = opts.unique_id_field.filter(|f| !f.trim().is_empty());

        Ok(RiverConfig {
            name: opts.name,
            hostname,
            database,
            username,
            password,
            query,
            index,
            doc_type: opts.doc_type,
            unique_id_field,
            delete_old_entries: opts.delete_old_entries,
            interval_ms: opts.interval,
        })
    }

    /// Whether the scheduler should run a single cycle and exit.
    pub fn one_shot(&self) -> bool {
        self.interval_ms <= 0
    }

    /// Time between cycle starts. `None` in one-shot mode.
    pub fn interval(&self) -> Option<Duration> {
        (!self.one_shot()).then(|| Duration::from_millis(self.interval_ms as u64))
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingSetting(key)),
    }
}
