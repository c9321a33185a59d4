// MIT License

//! Pure encode/decode of CIP frames and join payloads.
//!
//! No I/O, no state. Every function here is byte-exact with the wire
//! contract spoken by Crestron control processors; the odd corners
//! (byte-swapped digital join index, the state flag folded into a length
//! byte's high bit) are part of that contract and must not be "fixed".

use crate::constants::{
    DATA_ANALOG, DATA_DATETIME, DATA_DIGITAL, DATA_UPDATE, DIGITAL_KIND_BUTTON,
    DIGITAL_KIND_LATCHED, FRAME_CLIENT_REGISTRATION, FRAME_DATA, FRAME_DISCONNECT,
    FRAME_HEARTBEAT, FRAME_HEARTBEAT_ALT, FRAME_REGISTRATION_REQUEST,
    FRAME_REGISTRATION_RESPONSE, FRAME_SERIAL, MAX_SERIAL_LEN, UPDATE_END_OF_QUERY,
    UPDATE_END_OF_QUERY_ACK, UPDATE_PENULTIMATE, UPDATE_STANDARD,
};
use crate::error::{CipError, Result};
use crate::signal::validate_join;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Types 0x0D/0x0E. Acknowledged by silence; the outbound timer alone
    /// maintains liveness.
    Heartbeat,
    /// Digital join update.
    Digital { join: u16, high: bool },
    /// Analog join update.
    Analog { join: u16, value: u16 },
    /// Serial join update.
    Serial { join: u16, text: String },
    /// Update-request subframe inside a data frame.
    Update(UpdateKind),
    /// Date/time broadcast. Logged, never replied to.
    DateTime,
    /// The processor asks the panel to identify itself.
    RegistrationRequest,
    /// Registration accepted.
    RegistrationAccepted,
    /// Registration refused: no panel slot for this IPID.
    RegistrationRejected,
    /// Registration response that matches no known shape.
    RegistrationUnknown,
    /// Control-system-initiated disconnect.
    Disconnect,
    /// Data subframe this client does not understand.
    UnknownData { subtype: u8 },
    /// Frame type this client does not understand.
    Unknown { frame_type: u8 },
}

/// The stages of the end-of-query update handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Standard update request; no reply.
    Standard,
    /// "Penultimate update". Semantics undocumented; acknowledged with
    /// silence, matching processor expectations.
    Penultimate,
    /// End of the update burst; requires the two-frame acknowledgement.
    EndOfQuery,
    /// Acknowledgement of an end-of-query reply; no further reply.
    EndOfQueryAck,
    Other(u8),
}

impl UpdateKind {
    fn from_byte(b: u8) -> Self {
        match b {
            UPDATE_STANDARD => Self::Standard,
            UPDATE_PENULTIMATE => Self::Penultimate,
            UPDATE_END_OF_QUERY => Self::EndOfQuery,
            UPDATE_END_OF_QUERY_ACK => Self::EndOfQueryAck,
            other => Self::Other(other),
        }
    }
}

/// Encode a digital join set.
///
/// The join index is transmitted byte-swapped: the low byte of
/// `join - 1` lands in the wire high byte, and the "low" state flag is
/// OR-ed into bit 7 of the packed value. Wire contract, not an
/// implementation choice.
pub fn encode_digital(join: u16, high: bool, button_style: bool) -> Result<Vec<u8>> {
    validate_join(join)?;
    let c = join - 1;
    let mut packed = (c / 256) | ((c % 256) << 8);
    if !high {
        packed |= 0x80;
    }
    let kind = if button_style {
        DIGITAL_KIND_BUTTON
    } else {
        DIGITAL_KIND_LATCHED
    };
    Ok(vec![
        FRAME_DATA,
        0x00,
        0x06,
        0x00,
        0x00,
        0x03,
        kind,
        (packed >> 8) as u8,
        packed as u8,
    ])
}

/// Encode an analog join set. Join index and value are plain big-endian.
pub fn encode_analog(join: u16, value: u16) -> Result<Vec<u8>> {
    validate_join(join)?;
    let j = join - 1;
    Ok(vec![
        FRAME_DATA,
        0x00,
        0x08,
        0x00,
        0x00,
        0x05,
        DATA_ANALOG,
        (j >> 8) as u8,
        j as u8,
        (value >> 8) as u8,
        value as u8,
    ])
}

/// Encode a serial join send. The text must be 1-255 ASCII bytes.
pub fn encode_serial(join: u16, text: &str) -> Result<Vec<u8>> {
    validate_join(join)?;
    let n = text.len();
    if n == 0 || n > MAX_SERIAL_LEN {
        return Err(CipError::InvalidStringLength { len: n });
    }
    if !text.is_ascii() {
        return Err(CipError::NonAsciiString);
    }

    let l = (n + 8) as u16; // frame payload length
    let p = (n + 4) as u16; // inner sub-length
    let j = join - 1;
    let mut frame = Vec::with_capacity(11 + n);
    frame.extend_from_slice(&[
        FRAME_SERIAL,
        (l >> 8) as u8,
        l as u8,
        0x00,
        0x00,
        (p >> 8) as u8,
        p as u8,
        0x34,
        (j >> 8) as u8,
        j as u8,
        0x03,
    ]);
    frame.extend_from_slice(text.as_bytes());
    Ok(frame)
}

/// The registration frame sent after the processor's registration request.
pub fn encode_registration(ipid: u8) -> Vec<u8> {
    vec![
        FRAME_CLIENT_REGISTRATION,
        0x00,
        0x0B,
        0x00,
        0x00,
        0x00,
        0x00,
        0x00,
        ipid,
        0x40,
        0xFF,
        0xFF,
        0xF1,
        0x01,
    ]
}

/// Decode one whole frame into an [`InboundMessage`].
///
/// Truncated payloads for recognised frame types are framing errors: the
/// caller is expected to drop the connection rather than resynchronise by
/// guesswork.
pub fn decode(frame_type: u8, payload: &[u8]) -> Result<InboundMessage> {
    match frame_type {
        FRAME_HEARTBEAT | FRAME_HEARTBEAT_ALT => Ok(InboundMessage::Heartbeat),
        FRAME_DATA => decode_data(payload),
        FRAME_SERIAL => decode_serial(payload),
        FRAME_REGISTRATION_REQUEST => Ok(InboundMessage::RegistrationRequest),
        FRAME_REGISTRATION_RESPONSE => Ok(decode_registration_response(payload)),
        FRAME_DISCONNECT => Ok(InboundMessage::Disconnect),
        other => Ok(InboundMessage::Unknown { frame_type: other }),
    }
}

fn decode_data(payload: &[u8]) -> Result<InboundMessage> {
    if payload.len() < 4 {
        return Err(truncated("data", payload.len()));
    }
    match payload[3] {
        DATA_DIGITAL => {
            if payload.len() < 6 {
                return Err(truncated("digital join", payload.len()));
            }
            // Inverse of encode_digital: payload[4] is the low byte of the
            // 0-indexed join, payload[5] carries the high bits plus the
            // state flag in bit 7 (set means low).
            let lo = payload[4] as u16;
            let packed_hi = payload[5];
            let join = (((packed_hi & 0x7F) as u16) << 8 | lo) + 1;
            let high = ((packed_hi & 0x80) >> 7) ^ 1 == 1;
            Ok(InboundMessage::Digital { join, high })
        }
        DATA_ANALOG => {
            if payload.len() < 8 {
                return Err(truncated("analog join", payload.len()));
            }
            let join = ((payload[4] as u16) << 8 | payload[5] as u16) + 1;
            let value = (payload[6] as u16) << 8 | payload[7] as u16;
            Ok(InboundMessage::Analog { join, value })
        }
        DATA_UPDATE => {
            if payload.len() < 5 {
                return Err(truncated("update subframe", payload.len()));
            }
            Ok(InboundMessage::Update(UpdateKind::from_byte(payload[4])))
        }
        DATA_DATETIME => Ok(InboundMessage::DateTime),
        other => Ok(InboundMessage::UnknownData { subtype: other }),
    }
}

fn decode_serial(payload: &[u8]) -> Result<InboundMessage> {
    if payload.len() < 9 {
        return Err(truncated("serial join", payload.len()));
    }
    let join = ((payload[5] as u16) << 8 | payload[6] as u16) + 1;
    let text = String::from_utf8_lossy(&payload[8..]).into_owned();
    Ok(InboundMessage::Serial { join, text })
}

fn decode_registration_response(payload: &[u8]) -> InboundMessage {
    match payload {
        [0xFF, 0xFF, 0x02] => InboundMessage::RegistrationRejected,
        [0x00, 0x00, 0x00, 0x1F] => InboundMessage::RegistrationAccepted,
        _ => InboundMessage::RegistrationUnknown,
    }
}

fn truncated(what: &str, len: usize) -> CipError {
    CipError::Framing {
        details: format!("truncated {what} payload ({len} bytes)"),
    }
}

/// Render a byte slice as space-separated uppercase hex, the format used
/// by the high debug level's frame dumps.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02X}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{END_OF_QUERY_ACK_FRAME, HEARTBEAT_FRAME, UPDATE_REQUEST_FRAME};

    fn hex(bytes: &str) -> Vec<u8> {
        bytes
            .split_whitespace()
            .map(|b| u8::from_str_radix(b, 16).unwrap())
            .collect()
    }

    #[test]
    fn digital_golden_vectors() {
        let cases = [
            (1u16, true, true, "05 00 06 00 00 03 27 00 00"),
            (1, false, true, "05 00 06 00 00 03 27 00 80"),
            (1, true, false, "05 00 06 00 00 03 00 00 00"),
            (1, false, false, "05 00 06 00 00 03 00 00 80"),
            (2000, true, true, "05 00 06 00 00 03 27 CF 07"),
        ];
        for (join, high, button, expected) in cases {
            assert_eq!(
                encode_digital(join, high, button).unwrap(),
                hex(expected),
                "digital(join={join}, high={high}, button={button})"
            );
        }
    }

    #[test]
    fn analog_golden_vectors() {
        let cases = [
            (1u16, 130u16, "05 00 08 00 00 05 14 00 00 00 82"),
            (1, 0, "05 00 08 00 00 05 14 00 00 00 00"),
            (1, 65535, "05 00 08 00 00 05 14 00 00 FF FF"),
        ];
        for (join, value, expected) in cases {
            assert_eq!(encode_analog(join, value).unwrap(), hex(expected));
        }
    }

    #[test]
    fn serial_golden_vectors() {
        assert_eq!(
            encode_serial(1, "foo").unwrap(),
            hex("12 00 0B 00 00 00 07 34 00 00 03 66 6F 6F")
        );
        assert_eq!(
            encode_serial(2000, "foo").unwrap(),
            hex("12 00 0B 00 00 00 07 34 07 CF 03 66 6F 6F")
        );
    }

    #[test]
    fn serial_max_length_frame() {
        let text: String = std::iter::repeat('x').take(255).collect();
        let frame = encode_serial(1, &text).unwrap();
        assert_eq!(frame.len(), 11 + 255);
        // Declared payload length 263 = 0x0107, inner length 259 = 0x0103.
        assert_eq!(&frame[1..3], &[0x01, 0x07]);
        assert_eq!(&frame[5..7], &[0x01, 0x03]);
    }

    #[test]
    fn fixed_frames() {
        assert_eq!(UPDATE_REQUEST_FRAME.to_vec(), hex("05 00 05 00 00 02 03 00"));
        assert_eq!(HEARTBEAT_FRAME.to_vec(), hex("0D 00 02 00 00"));
        assert_eq!(END_OF_QUERY_ACK_FRAME.to_vec(), hex("05 00 05 00 00 02 03 1D"));
        assert_eq!(
            encode_registration(0x0A),
            hex("01 00 0B 00 00 00 00 00 0A 40 FF FF F1 01")
        );
    }

    #[test]
    fn encoders_reject_invalid_joins() {
        for join in [0u16, 4001, 65535] {
            assert!(matches!(
                encode_digital(join, true, false),
                Err(CipError::InvalidJoinNumber { .. })
            ));
            assert!(matches!(
                encode_analog(join, 1),
                Err(CipError::InvalidJoinNumber { .. })
            ));
            assert!(matches!(
                encode_serial(join, "x"),
                Err(CipError::InvalidJoinNumber { .. })
            ));
        }
    }

    #[test]
    fn serial_rejects_bad_strings() {
        assert!(matches!(
            encode_serial(1, ""),
            Err(CipError::InvalidStringLength { len: 0 })
        ));
        let long: String = std::iter::repeat('a').take(256).collect();
        assert!(matches!(
            encode_serial(1, &long),
            Err(CipError::InvalidStringLength { len: 256 })
        ));
        assert!(matches!(
            encode_serial(1, "héllo"),
            Err(CipError::NonAsciiString)
        ));
    }

    #[test]
    fn digital_decode_roundtrip() {
        for (join, high) in [(1u16, true), (1, false), (2000, true), (2000, false), (4000, true)] {
            let frame = encode_digital(join, high, false).unwrap();
            let decoded = decode(frame[0], &frame[3..]).unwrap();
            assert_eq!(decoded, InboundMessage::Digital { join, high });
        }
    }

    #[test]
    fn analog_decode_roundtrip() {
        for (join, value) in [(1u16, 130u16), (1, 0), (1, 65535), (2000, 4242)] {
            let frame = encode_analog(join, value).unwrap();
            let decoded = decode(frame[0], &frame[3..]).unwrap();
            assert_eq!(decoded, InboundMessage::Analog { join, value });
        }
    }

    #[test]
    fn serial_decode_roundtrip() {
        for (join, text) in [(1u16, "foo"), (2000, "hello world"), (4000, "x")] {
            let frame = encode_serial(join, text).unwrap();
            let decoded = decode(frame[0], &frame[3..]).unwrap();
            assert_eq!(
                decoded,
                InboundMessage::Serial {
                    join,
                    text: text.to_string()
                }
            );
        }
    }

    #[test]
    fn registration_response_shapes() {
        assert_eq!(
            decode(0x02, &[0xFF, 0xFF, 0x02]).unwrap(),
            InboundMessage::RegistrationRejected
        );
        assert_eq!(
            decode(0x02, &[0x00, 0x00, 0x00, 0x1F]).unwrap(),
            InboundMessage::RegistrationAccepted
        );
        assert_eq!(
            decode(0x02, &[0x01, 0x02]).unwrap(),
            InboundMessage::RegistrationUnknown
        );
    }

    #[test]
    fn update_subframes() {
        let base = |sub: u8| vec![0x00, 0x00, 0x02, 0x03, sub];
        assert_eq!(
            decode(0x05, &base(0x00)).unwrap(),
            InboundMessage::Update(UpdateKind::Standard)
        );
        assert_eq!(
            decode(0x05, &base(0x16)).unwrap(),
            InboundMessage::Update(UpdateKind::Penultimate)
        );
        assert_eq!(
            decode(0x05, &base(0x1C)).unwrap(),
            InboundMessage::Update(UpdateKind::EndOfQuery)
        );
        assert_eq!(
            decode(0x05, &base(0x1D)).unwrap(),
            InboundMessage::Update(UpdateKind::EndOfQueryAck)
        );
        assert_eq!(
            decode(0x05, &base(0x42)).unwrap(),
            InboundMessage::Update(UpdateKind::Other(0x42))
        );
    }

    #[test]
    fn misc_frame_types() {
        assert_eq!(decode(0x0D, &[0x00, 0x00]).unwrap(), InboundMessage::Heartbeat);
        assert_eq!(decode(0x0E, &[0x00, 0x00]).unwrap(), InboundMessage::Heartbeat);
        assert_eq!(decode(0x0F, &[0x02]).unwrap(), InboundMessage::RegistrationRequest);
        assert_eq!(decode(0x03, &[]).unwrap(), InboundMessage::Disconnect);
        assert_eq!(
            decode(0x05, &[0x00, 0x00, 0x00, 0x08, 0x01]).unwrap(),
            InboundMessage::DateTime
        );
        assert_eq!(
            decode(0x99, &[]).unwrap(),
            InboundMessage::Unknown { frame_type: 0x99 }
        );
        assert_eq!(
            decode(0x05, &[0x00, 0x00, 0x00, 0x77, 0x00]).unwrap(),
            InboundMessage::UnknownData { subtype: 0x77 }
        );
    }

    #[test]
    fn truncated_payloads_are_framing_errors() {
        assert!(matches!(
            decode(0x05, &[0x00, 0x00]),
            Err(CipError::Framing { .. })
        ));
        assert!(matches!(
            decode(0x05, &[0x00, 0x00, 0x03, 0x00, 0x01]),
            Err(CipError::Framing { .. })
        ));
        assert!(matches!(
            decode(0x12, &[0x00, 0x00, 0x00, 0x07]),
            Err(CipError::Framing { .. })
        ));
    }

    #[test]
    fn hex_dump_format() {
        assert_eq!(hex_dump(&[0x05, 0x00, 0x6A]), "05 00 6A");
        assert_eq!(hex_dump(&[]), "");
    }
}
