// MIT License

//! Wire-level constants for the CIP protocol.

use std::time::Duration;

/// Frame type bytes. Every frame on the wire is
/// `[type:u8][length:u16 BE][payload]`.
pub const FRAME_HEARTBEAT: u8 = 0x0D;
pub const FRAME_HEARTBEAT_ALT: u8 = 0x0E;
/// Digital/analog join updates, update-request subframes, date/time.
pub const FRAME_DATA: u8 = 0x05;
pub const FRAME_SERIAL: u8 = 0x12;
/// Processor asks the panel to identify itself.
pub const FRAME_REGISTRATION_REQUEST: u8 = 0x0F;
/// Processor accepts or refuses the panel's registration.
pub const FRAME_REGISTRATION_RESPONSE: u8 = 0x02;
/// Control-system-initiated disconnect.
pub const FRAME_DISCONNECT: u8 = 0x03;
/// Client registration frame carrying the IPID.
pub const FRAME_CLIENT_REGISTRATION: u8 = 0x01;

/// Sub-type byte of a data (0x05) frame, at payload offset 3.
pub const DATA_DIGITAL: u8 = 0x00;
pub const DATA_UPDATE: u8 = 0x03;
pub const DATA_DATETIME: u8 = 0x08;
pub const DATA_ANALOG: u8 = 0x14;

/// Update subframe ids, at payload offset 4 of an update data frame.
pub const UPDATE_STANDARD: u8 = 0x00;
pub const UPDATE_PENULTIMATE: u8 = 0x16;
pub const UPDATE_END_OF_QUERY: u8 = 0x1C;
pub const UPDATE_END_OF_QUERY_ACK: u8 = 0x1D;

/// Kind byte for a momentary (button-style) digital join.
pub const DIGITAL_KIND_BUTTON: u8 = 0x27;
/// Kind byte for a latched digital join.
pub const DIGITAL_KIND_LATCHED: u8 = 0x00;

/// Outbound heartbeat, sent every heartbeat interval while registered.
pub const HEARTBEAT_FRAME: [u8; 5] = [0x0D, 0x00, 0x02, 0x00, 0x00];
/// Asks the processor to re-broadcast the current value of every join.
/// The same bytes are sent once after a successful registration.
pub const UPDATE_REQUEST_FRAME: [u8; 8] = [0x05, 0x00, 0x05, 0x00, 0x00, 0x02, 0x03, 0x00];
/// First half of the end-of-query acknowledgement pair.
pub const END_OF_QUERY_ACK_FRAME: [u8; 8] = [0x05, 0x00, 0x05, 0x00, 0x00, 0x02, 0x03, 0x1D];

/// Joins are numbered 1..=4000 in the public API.
pub const MAX_JOIN: u16 = 4000;
/// Serial join payloads carry 1..=255 ASCII bytes.
pub const MAX_SERIAL_LEN: usize = 255;

/// Default CIP TCP port.
pub const DEFAULT_PORT: u16 = 41794;

/// Pause after every outbound frame. The processor drops messages issued
/// too closely back-to-back.
pub const WRITE_PACING: Duration = Duration::from_millis(1);

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 15_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 2_000;
