//! Event parsing (§4.1).
//!
//! One line of source text maps to exactly one [`Event`]. The wire grammar is
//! pipe-separated: `seq|kind[|from[|to]]`, with the field count fixed per
//! kind letter. Parsing never panics — any malformed shape produces an
//! [`EventParseError`] naming the offending line.

use std::convert::TryFrom;

use crate::error::{EventParseError, EventParseReason};

/// The five event kinds the source can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Follow,
    Unfollow,
    Broadcast,
    PrivateMsg,
    StatusUpdate,
}

/// One parsed, immutable event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub sequence_id: u64,
    pub kind: EventKind,
    /// Absent only for `Broadcast`.
    pub from_id: Option<u64>,
    /// Present only for `Follow`, `Unfollow`, `PrivateMsg`.
    pub to_id: Option<u64>,
    /// The original line with a single trailing `\n` appended — the exact
    /// bytes delivered to recipients.
    pub raw_line: String,
}

fn parse_id(field: &str, line: &str) -> Result<u64, EventParseError> {
    field.parse::<u64>().map_err(|_| EventParseError {
        line: line.to_owned(),
        reason: EventParseReason::BadInteger,
    })
}

impl TryFrom<&str> for Event {
    type Error = EventParseError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 2 {
            return Err(EventParseError {
                line: line.to_owned(),
                reason: EventParseReason::TooFewFields,
            });
        }
        let sequence_id = parse_id(fields[0], line)?;
        let raw_line = format!("{line}\n");

        let wrong_count = || EventParseError {
            line: line.to_owned(),
            reason: EventParseReason::WrongFieldCount,
        };

        let (kind, from_id, to_id) = match fields[1] {
            "F" => {
                if fields.len() != 4 {
                    return Err(wrong_count());
                }
                (
                    EventKind::Follow,
                    Some(parse_id(fields[2], line)?),
                    Some(parse_id(fields[3], line)?),
                )
            }
            "U" => {
                if fields.len() != 4 {
                    return Err(wrong_count());
                }
                (
                    EventKind::Unfollow,
                    Some(parse_id(fields[2], line)?),
                    Some(parse_id(fields[3], line)?),
                )
            }
            "B" => {
                if fields.len() != 2 {
                    return Err(wrong_count());
                }
                (EventKind::Broadcast, None, None)
            }
            "P" => {
                if fields.len() != 4 {
                    return Err(wrong_count());
                }
                (
                    EventKind::PrivateMsg,
                    Some(parse_id(fields[2], line)?),
                    Some(parse_id(fields[3], line)?),
                )
            }
            "S" => {
                if fields.len() != 3 {
                    return Err(wrong_count());
                }
                (EventKind::StatusUpdate, Some(parse_id(fields[2], line)?), None)
            }
            _ => {
                return Err(EventParseError {
                    line: line.to_owned(),
                    reason: EventParseReason::UnknownKind,
                });
            }
        };

        Ok(Event {
            sequence_id,
            kind,
            from_id,
            to_id,
            raw_line,
        })
    }
}
