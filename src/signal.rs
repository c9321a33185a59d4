// MIT License

//! Join signal types and values, and the connection lifecycle states.

use std::fmt;

use crate::constants::MAX_JOIN;
use crate::error::{CipError, Result};

/// The three kinds of join a processor exposes.
///
/// The single-character tag is part of the subscription key and mirrors
/// the letters Crestron programmers use for join columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalType {
    /// Boolean state per join ("D").
    Digital,
    /// 16-bit unsigned value per join ("A").
    Analog,
    /// ASCII text per join, 1-255 bytes ("S").
    Serial,
}

impl SignalType {
    pub fn tag(&self) -> char {
        match self {
            Self::Digital => 'D',
            Self::Analog => 'A',
            Self::Serial => 'S',
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A join value delivered to subscribers.
///
/// The arm always matches the signal type of the join it arrived on:
/// Digital delivers `Bool`, Analog delivers `U16`, Serial delivers
/// `Text`. Consumers demultiplexing in a polymorphic callback can rely
/// on that pairing without defensive unwrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalValue {
    Bool(bool),
    U16(u16),
    Text(String),
}

impl SignalValue {
    pub fn signal_type(&self) -> SignalType {
        match self {
            Self::Bool(_) => SignalType::Digital,
            Self::U16(_) => SignalType::Analog,
            Self::Text(_) => SignalType::Serial,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", if *v { "high" } else { "low" }),
            Self::U16(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Connection lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Retrying = 3,
}

impl ConnectionState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Retrying,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Retrying => "retrying",
        };
        write!(f, "{}", s)
    }
}

/// Validate a join number against the public API range.
pub fn validate_join(join: u16) -> Result<()> {
    if join == 0 || join > MAX_JOIN {
        return Err(CipError::InvalidJoinNumber { join });
    }
    Ok(())
}
