use clap::Parser;
use serde::Deserialize;
use std::fs::read_to_string;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Deserialize, Debug)]
pub struct Server {
    /// the address and port the TCP listener binds.
    #[serde(default = "Server::listen")]
    pub listen: SocketAddr,

    /// maximum concurrent connections admitted at once; further accepts
    /// block until one disconnects.
    #[serde(default = "Server::max_clients")]
    pub max_clients: usize,

    /// minutes a pending login challenge stays valid before its waiter
    /// removes it.
    #[serde(default = "Server::login_timeout_mins")]
    pub login_timeout_mins: u64,

    /// minutes a connection may sit idle before a read times out.
    #[serde(default = "Server::read_timeout_mins")]
    pub read_timeout_mins: u64,

    /// minutes a reusable token survives after its connection drops.
    #[serde(default = "Server::token_expiration_mins")]
    pub token_expiration_mins: u64,
}

impl Server {
    fn listen() -> SocketAddr {
        "0.0.0.0:6217".parse().unwrap()
    }

    fn max_clients() -> usize {
        1024
    }

    fn login_timeout_mins() -> u64 {
        2
    }

    fn read_timeout_mins() -> u64 {
        10
    }

    fn token_expiration_mins() -> u64 {
        30
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
            max_clients: Self::max_clients(),
            login_timeout_mins: Self::login_timeout_mins(),
            read_timeout_mins: Self::read_timeout_mins(),
            token_expiration_mins: Self::token_expiration_mins(),
        }
    }
}

impl Server {
    pub fn hub_options(&self) -> hub::HubOptions {
        hub::HubOptions {
            max_clients: self.max_clients,
            login_timeout: Duration::from_secs(self.login_timeout_mins * 60),
            read_timeout: Duration::from_secs(self.read_timeout_mins * 60),
            token_expiration: Duration::from_secs(self.token_expiration_mins * 60),
        }
    }
}

#[derive(Deserialize, Debug)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub log: Log,
}

#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    /// path to a json5 configuration file.
    #[arg(long)]
    config: Option<String>,
}

impl Config {
    /// Loads CLI flags, then the configuration file they point at if any;
    /// every field falls back to its default when absent.
    pub fn load() -> anyhow::Result<Self> {
        let cli = Cli::parse();

        Ok(match cli.config {
            Some(path) => serde_json5::from_str(&read_to_string(path)?)?,
            None => Self::default(),
        })
    }
}
