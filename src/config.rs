use std::net::SocketAddr;

use anyhow::{bail, Context};

pub const DB_CONN_ENV: &str = "DB_CONN_STR";
pub const LISTEN_PORT: u16 = 3131;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite location: a file path or `:memory:`.
    pub db_conn_str: String,
    pub listen_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let db_conn_str = std::env::var(DB_CONN_ENV)
            .with_context(|| format!("{DB_CONN_ENV} must be set"))?;
        Self::new(db_conn_str)
    }

    fn new(db_conn_str: String) -> anyhow::Result<Self> {
        if db_conn_str.trim().is_empty() {
            bail!("{DB_CONN_ENV} is empty");
        }
        Ok(Self {
            db_conn_str,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], LISTEN_PORT)),
        })
    }
}
