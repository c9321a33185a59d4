// MIT License

use crate::signal::ConnectionState;

/// All errors that can occur in the cip-xpanel library.
#[derive(Debug, thiserror::Error)]
pub enum CipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connect timeout")]
    ConnectTimeout,

    #[error("Write timeout")]
    WriteTimeout,

    /// Join number outside 1..=4000. Rejected before any bytes are encoded.
    #[error("Invalid join number {join} (valid range 1-4000)")]
    InvalidJoinNumber { join: u16 },

    /// Serial string empty or longer than 255 bytes.
    #[error("Invalid serial string length {len} (valid range 1-255 bytes)")]
    InvalidStringLength { len: usize },

    /// Serial joins carry ASCII only; non-ASCII input is rejected rather
    /// than transcoded.
    #[error("Serial string contains non-ASCII characters")]
    NonAsciiString,

    /// A send operation was attempted while not connected and registered.
    #[error("Not ready to send: state {state}, registered={registered}")]
    NotReady {
        state: ConnectionState,
        registered: bool,
    },

    /// Inbound frame with an impossible length or truncated payload.
    /// The connection is dropped rather than resynchronised by guesswork.
    #[error("Framing error: {details}")]
    Framing { details: String },

    /// The processor's program has no panel slot for this IPID.
    #[error("Registration rejected: IPID 0x{ipid:02X} does not exist")]
    IpidRejected { ipid: u8 },

    #[error("Registration failed: unknown response")]
    UnknownRegistrationResponse,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Socket disconnected")]
    Disconnected,

    #[error("Outbound channel closed")]
    ChannelClosed,
}

impl CipError {
    /// Whether this error is transient and the connection should be retried.
    ///
    /// `IpidRejected` is deliberately not retryable: the configuration is
    /// wrong and retrying would loop forever against the same refusal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CipError::Io(_)
                | CipError::ConnectTimeout
                | CipError::WriteTimeout
                | CipError::Framing { .. }
                | CipError::UnknownRegistrationResponse
                | CipError::Disconnected
                | CipError::ChannelClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, CipError>;
