//! Environment-variable configuration (§4.8). Three inputs, each with a
//! default, validated at load time with a typed error rather than a panic —
//! following the validator-function style this codebase uses for CLI
//! argument parsing, applied here to env vars instead.

use std::env;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub source_addr: String,
    pub client_addr: String,
    pub first_sequence_id: u64,
}

const SOURCE_ADDR_VAR: &str = "SOURCE_ADDR";
const CLIENT_ADDR_VAR: &str = "CLIENT_ADDR";
const EVENT_SEQUENCE_ID_VAR: &str = "EVENT_SEQUENCE_ID";

const DEFAULT_SOURCE_ADDR: &str = "localhost:9090";
const DEFAULT_CLIENT_ADDR: &str = "localhost:9099";
const DEFAULT_FIRST_SEQUENCE_ID: &str = "1";

fn env_or_default(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_owned())
}

/// A socket address is valid if it resolves to at least one address when
/// split into host and port; we don't eagerly resolve DNS here (the
/// listener bind call does that), only check shape.
fn validate_addr(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.rsplit_once(':').is_some_and(|(_host, port)| port.parse::<u16>().is_ok()) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            var,
            value,
            reason: "expected host:port with a valid port number",
        })
    }
}

fn validate_sequence_id(value: String) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ConfigError::InvalidValue {
            var: EVENT_SEQUENCE_ID_VAR,
            value,
            reason: "expected a positive integer",
        }),
    }
}

/// Load configuration from the environment, falling back to defaults and
/// failing with a `ConfigError` on any invalid value.
pub fn load_config() -> Result<Config, ConfigError> {
    let source_addr = validate_addr(
        SOURCE_ADDR_VAR,
        env_or_default(SOURCE_ADDR_VAR, DEFAULT_SOURCE_ADDR),
    )?;
    let client_addr = validate_addr(
        CLIENT_ADDR_VAR,
        env_or_default(CLIENT_ADDR_VAR, DEFAULT_CLIENT_ADDR),
    )?;
    let first_sequence_id = validate_sequence_id(env_or_default(
        EVENT_SEQUENCE_ID_VAR,
        DEFAULT_FIRST_SEQUENCE_ID,
    ))?;

    Ok(Config {
        source_addr,
        client_addr,
        first_sequence_id,
    })
}
