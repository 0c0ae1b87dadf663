use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use config::{Config as Cfg, ConfigError, Environment};
use serde::Deserialize;

/// Upper bound on how long an idle session may linger past its TTL.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_address: BindAddress,
    pub allow_origins: Vec<String>,
    pub static_dir: PathBuf,
    pub session_ttl_secs: u64,
    pub log_level: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_environment(Environment::default())
    }

    pub fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let settings = Cfg::builder()
            .set_default("port", 8080)?
            .set_default("bind_address", "all")?
            .set_default("allow_origins", Vec::<String>::new())?
            .set_default("static_dir", "static")?
            .set_default("session_ttl_secs", 1800)?
            .set_default("log_level", "info")?
            .add_source(
                env.try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allow_origins"),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address.ip(), self.port)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        (self.session_ttl() / 2).clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL)
    }
}

/// Listening interface. `all` suits containers, `loopback` local runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum BindAddress {
    All,
    Loopback,
    Ip(IpAddr),
}

impl BindAddress {
    pub fn ip(&self) -> IpAddr {
        match self {
            BindAddress::All => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            BindAddress::Loopback => IpAddr::V4(Ipv4Addr::LOCALHOST),
            BindAddress::Ip(ip) => *ip,
        }
    }
}

impl FromStr for BindAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "any" => Ok(BindAddress::All),
            "loopback" | "local" | "localhost" => Ok(BindAddress::Loopback),
            other => other
                .parse::<IpAddr>()
                .map(BindAddress::Ip)
                .map_err(|_| format!("unrecognized bind address `{}`", s)),
        }
    }
}

impl TryFrom<String> for BindAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip())
    }
}
