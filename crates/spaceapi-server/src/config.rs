//! Server configuration
//!
//! Every flag falls back to an environment variable, then to a default.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use spaceapi_core::{WatchdogConfig, WatchdogError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default status file
pub const DEFAULT_DATA_FILE: &str = "api.json";

/// Default listen port
pub const DEFAULT_PORT: u16 = 5000;

/// Default space name written by `--init`
pub const DEFAULT_SPACE_NAME: &str = "Odenwilusenz";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid host address: {0}")]
    InvalidHost(String),

    #[error(transparent)]
    Watchdog(#[from] WatchdogError),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Status document path
    pub data_file: PathBuf,
    /// Listen address
    pub bind: SocketAddr,
    /// Token required by the update endpoints
    pub api_token: Option<String>,
    /// Keepalive timing
    pub watchdog: WatchdogConfig,
    /// `EnvFilter` directive
    pub log_level: String,
    /// Write a template document if the file is absent
    pub init: bool,
    /// Space name used by the template document
    pub space_name: String,
}

impl ServerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = path.into();
        self
    }

    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// With API token; an empty token disables auth
    #[must_use]
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    #[must_use]
    pub fn with_watchdog(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = watchdog;
        self
    }

    #[must_use]
    pub fn with_init(mut self, space_name: impl Into<String>) -> Self {
        self.init = true;
        self.space_name = space_name.into();
        self
    }

    /// Build from parsed command-line arguments
    ///
    /// # Errors
    /// `ConfigError` on an unparseable host or inconsistent watchdog timing
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        let host = matches
            .get_one::<String>("host")
            .map_or("0.0.0.0", String::as_str);
        let ip: IpAddr = host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(host.to_string()))?;
        let port = matches.get_one::<u16>("port").copied().unwrap_or(DEFAULT_PORT);

        let mut watchdog = WatchdogConfig::new();
        if let Some(secs) = matches.get_one::<u64>("keepalive-timeout") {
            watchdog = watchdog.with_timeout(Duration::from_secs(*secs))?;
        }
        if let Some(secs) = matches.get_one::<u64>("poll-interval") {
            watchdog = watchdog.with_poll_interval(Duration::from_secs(*secs))?;
        }
        watchdog.validate()?;

        let mut config = Self::new()
            .with_bind(SocketAddr::new(ip, port))
            .with_api_token(matches.get_one::<String>("api-token").cloned())
            .with_watchdog(watchdog);

        if let Some(path) = matches.get_one::<PathBuf>("data-file") {
            config = config.with_data_file(path.clone());
        }
        if let Some(level) = matches.get_one::<String>("log-level") {
            config.log_level = level.clone();
        }
        if matches.get_flag("init") {
            let name = matches
                .get_one::<String>("space-name")
                .map_or(DEFAULT_SPACE_NAME, String::as_str);
            config = config.with_init(name);
        }

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            api_token: None,
            watchdog: WatchdogConfig::default(),
            log_level: "info".to_string(),
            init: false,
            space_name: DEFAULT_SPACE_NAME.to_string(),
        }
    }
}

/// Command-line interface of the server binary
#[must_use]
pub fn command() -> Command {
    Command::new("spaceapi-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("SpaceAPI status endpoint backed by a JSON file")
        .arg(
            Arg::new("data-file")
                .long("data-file")
                .env("SPACEAPI_FILE")
                .default_value(DEFAULT_DATA_FILE)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the status document"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .env("HOST")
                .default_value("0.0.0.0")
                .help("Address to listen on"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .env("PORT")
                .default_value("5000")
                .value_parser(value_parser!(u16))
                .help("Port to listen on"),
        )
        .arg(
            Arg::new("api-token")
                .long("api-token")
                .env("API_TOKEN")
                .hide_env_values(true)
                .help("Token required in the X-API-Token header of update requests"),
        )
        .arg(
            Arg::new("keepalive-timeout")
                .long("keepalive-timeout")
                .env("KEEPALIVE_TIMEOUT")
                .default_value("60")
                .value_parser(value_parser!(u64).range(1..))
                .help("Seconds without keepalive before the space is closed"),
        )
        .arg(
            Arg::new("poll-interval")
                .long("poll-interval")
                .env("KEEPALIVE_POLL_INTERVAL")
                .default_value("5")
                .value_parser(value_parser!(u64).range(1..))
                .help("Seconds between keepalive checks"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .env("RUST_LOG")
                .default_value("info")
                .help("Log filter directive"),
        )
        .arg(
            Arg::new("init")
                .long("init")
                .action(ArgAction::SetTrue)
                .help("Create a template status document if the file does not exist"),
        )
        .arg(
            Arg::new("space-name")
                .long("space-name")
                .env("SPACE_NAME")
                .default_value(DEFAULT_SPACE_NAME)
                .help("Space name used by --init"),
        )
}
