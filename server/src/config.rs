//! Startup configuration read from arguments, the environment and the
//! environment directory.

use crate::error::Error;
use clap::{value_parser, Arg, ArgMatches, Command};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Networks with an environment directory.
pub const NETWORKS: [&str; 4] = ["mainnet", "testnet", "nightly", "local"];

/// Settings fixed for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct Settings {
    pub network: String,
    pub port: u16,
    pub alpha: usize,
    pub passphrase: String,
    pub dyno: String,
    pub env_dir: PathBuf,
    pub log_level: Level,
    pub json: bool,
}

/// Endpoints of one network, read from `<env-dir>/<network>/config.json`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    /// Base URL of the registry gateway.
    pub registry: String,
    /// Base URLs of the discovery bootstrap nodes.
    pub bootstrap: Vec<String>,
    /// Seconds a resolved darknode address is reused.
    #[serde(default = "default_discovery_ttl")]
    pub discovery_ttl: u64,
}

fn default_discovery_ttl() -> u64 {
    60
}

pub fn command() -> Command {
    Command::new("darkpool-ingress")
        .about("accept order submissions and fan their fragments out to darknodes")
        .arg(
            Arg::new("network")
                .long("network")
                .env("NETWORK")
                .default_value("local")
                .value_parser(NETWORKS),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .env("PORT")
                .default_value("18515")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("alpha")
                .long("alpha")
                .env("ALPHA")
                .default_value("5")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("keystore-passphrase")
                .long("keystore-passphrase")
                .env("KEYSTORE_PASSPHRASE")
                .hide_env_values(true)
                .default_value(""),
        )
        .arg(
            Arg::new("dyno")
                .long("dyno")
                .env("DYNO")
                .default_value(""),
        )
        .arg(
            Arg::new("env-dir")
                .long("env-dir")
                .default_value("env")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("info")
                .value_parser(value_parser!(Level)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(clap::ArgAction::SetTrue),
        )
}

impl Settings {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, Error> {
        let network = matches
            .get_one::<String>("network")
            .cloned()
            .unwrap_or_default();
        if !NETWORKS.contains(&network.as_str()) {
            return Err(Error::UnknownNetwork(network));
        }
        Ok(Self {
            network,
            port: matches.get_one::<u16>("port").copied().unwrap_or(18515),
            alpha: matches.get_one::<usize>("alpha").copied().unwrap_or(5),
            passphrase: matches
                .get_one::<String>("keystore-passphrase")
                .cloned()
                .unwrap_or_default(),
            dyno: matches
                .get_one::<String>("dyno")
                .cloned()
                .unwrap_or_default(),
            env_dir: matches
                .get_one::<PathBuf>("env-dir")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("env")),
            log_level: matches
                .get_one::<Level>("log-level")
                .copied()
                .unwrap_or(Level::INFO),
            json: matches.get_flag("json"),
        })
    }

    fn network_dir(&self) -> PathBuf {
        self.env_dir.join(&self.network)
    }

    /// Path of the keystore for this dyno.
    pub fn keystore_path(&self) -> PathBuf {
        let file = if self.dyno.is_empty() {
            "keystore.json".to_string()
        } else {
            format!("keystore.{}.json", self.dyno)
        };
        self.network_dir().join(file)
    }

    pub fn load_network(&self) -> Result<Network, Error> {
        load_network(&self.network_dir().join("config.json"))
    }
}

fn load_network(path: &Path) -> Result<Network, Error> {
    let raw = std::fs::read(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&raw)?)
}
