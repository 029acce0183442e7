//! Error taxonomy for the follower-maze core, one variant family per
//! component boundary named in the design (config, parsing, client hello,
//! and the top-level server lifecycle).

use std::fmt;

/// Failure loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// A source line that does not match the event grammar in §4.1.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("malformed event {line:?}: {reason}")]
pub struct EventParseError {
    pub line: String,
    pub reason: EventParseReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventParseReason {
    TooFewFields,
    WrongFieldCount,
    UnknownKind,
    BadInteger,
}

impl fmt::Display for EventParseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventParseReason::TooFewFields => "fewer than 2 pipe-separated fields",
            EventParseReason::WrongFieldCount => "wrong field count for event kind",
            EventParseReason::UnknownKind => "unknown event kind letter",
            EventParseReason::BadInteger => "id field is not a non-negative integer",
        };
        f.write_str(s)
    }
}

/// The first line sent by a client was not a valid decimal client id.
#[derive(Debug, thiserror::Error)]
#[error("malformed client hello {line:?}")]
pub struct ClientHelloError {
    pub line: String,
}

/// Errors from the `Server` process-lifecycle API (§4.10).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Startup {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server already stopped")]
    AlreadyStopped,
}
