//! Server configuration: CLI flags with environment fallbacks.
//!
//! Flags win over environment variables, which win over defaults. The
//! recognised variables mirror the reference deployment: `HOST`,
//! `PORT`, `TEST_PORT` (overrides `PORT`, used by test harnesses),
//! `TURN_TIMEOUT`, `BOARD_SIZE`, `KEY` (hex) and `DEBUG`.

use std::time::Duration;

use clap::Parser;

use beer_match::MatchConfig;

use crate::ServerError;

/// Key used by `--secure` when no inline key and no `KEY` variable is
/// given. Good enough for a LAN game night, nothing more.
pub const DEFAULT_KEY_HEX: &str = "00112233445566778899AABBCCDDEEFF";

/// Command-line interface of `beer-server`.
#[derive(Parser, Debug)]
#[command(name = "beer-server", version, about = "BEER battleship server")]
pub struct Cli {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Enable AES-CTR payload encryption; optionally pass the key as
    /// hex inline (falls back to $KEY, then to the built-in default).
    #[arg(long, value_name = "HEX", num_args = 0..=1, default_missing_value = "")]
    pub secure: Option<String>,

    /// Play the single-ship variant (one Destroyer per board).
    #[arg(long = "one-ship")]
    pub one_ship: bool,

    /// Verbose logging.
    #[arg(long)]
    pub debug: bool,

    /// Suppress everything but errors.
    #[arg(short = 'q', long = "silent")]
    pub silent: bool,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Symmetric key; `Some` enables payload encryption.
    pub key: Option<Vec<u8>>,
    pub one_ship: bool,
    pub debug: bool,
    pub silent: bool,
    pub board_size: usize,
    pub handshake_timeout: Duration,
    pub turn_timeout: Duration,
    pub place_timeout: Duration,
    pub reconnect_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            key: None,
            one_ship: false,
            debug: false,
            silent: false,
            board_size: beer_board::DEFAULT_BOARD_SIZE,
            handshake_timeout: Duration::from_secs(10),
            turn_timeout: Duration::from_secs(60),
            place_timeout: Duration::from_secs(60),
            reconnect_timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Merges CLI flags with the environment.
    pub fn resolve(cli: Cli) -> Result<Self, ServerError> {
        let mut config = Self {
            host: cli.host,
            port: cli.port,
            one_ship: cli.one_ship,
            silent: cli.silent,
            ..Self::default()
        };

        if let Some(port) = env_var("TEST_PORT") {
            config.port = parse_env("TEST_PORT", &port)?;
        }
        if let Some(secs) = env_var("TURN_TIMEOUT") {
            config.turn_timeout =
                Duration::from_secs(parse_env("TURN_TIMEOUT", &secs)?);
        }
        if let Some(size) = env_var("BOARD_SIZE") {
            config.board_size = parse_env("BOARD_SIZE", &size)?;
        }
        config.debug = cli.debug
            || env_var("DEBUG").is_some_and(|v| v != "0" && !v.is_empty());

        config.key = match cli.secure {
            None => None,
            Some(inline) => {
                let hex = if !inline.is_empty() {
                    inline
                } else if let Some(from_env) = env_var("KEY") {
                    from_env
                } else {
                    DEFAULT_KEY_HEX.to_string()
                };
                Some(parse_hex("KEY", &hex)?)
            }
        };

        Ok(config)
    }

    /// The `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The per-match slice of this configuration.
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            board_size: self.board_size,
            one_ship: self.one_ship,
            turn_timeout: self.turn_timeout,
            place_timeout: self.place_timeout,
            reconnect_timeout: self.reconnect_timeout,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(
    name: &'static str,
    value: &str,
) -> Result<T, ServerError> {
    value.parse().map_err(|_| ServerError::Config {
        name,
        value: value.to_string(),
    })
}

fn parse_hex(
    name: &'static str,
    hex: &str,
) -> Result<Vec<u8>, ServerError> {
    let bad = || ServerError::Config {
        name,
        value: hex.to_string(),
    };
    if hex.len() % 2 != 0 || hex.is_empty() {
        return Err(bad());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad()))
        .collect()
}

// =========================================================================
// Tests
// =========================================================================
