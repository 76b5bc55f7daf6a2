//! Frame-level protocol: headers, frame types and typed bodies.
//!
//! Every frame opens with a 30-bit firmware millisecond counter and a
//! 3-bit frame type. The counter wraps every ~12.4 days; receivers keep a
//! widened 64-bit clock and reconstruct the wrap with [`extend_millis`].

use crate::bits::{BitReader, BitWriter};
use crate::telemetry::DeltaDecoder;
use crate::error::Result;

/// Wrap period of the firmware millisecond counter.
pub const MILLIS_WRAP: u64 = 1 << 30;

/// Frame type carried in the 3-bit header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Invalid = 0,
    Data = 1,
    Event = 2,
    Reply = 3,
    TroubleCode = 4,
    Obd = 5,
    Message = 6,
}

impl FrameType {
    pub fn from_wire(value: u32) -> Option<FrameType> {
        match value {
            0 => Some(FrameType::Invalid),
            1 => Some(FrameType::Data),
            2 => Some(FrameType::Event),
            3 => Some(FrameType::Reply),
            4 => Some(FrameType::TroubleCode),
            5 => Some(FrameType::Obd),
            6 => Some(FrameType::Message),
            _ => None,
        }
    }
}

const EVENT_NAMES: [&str; 23] = [
    "PWROFF",
    "PWRON",
    "DCOFF",
    "DCON",
    "CCUP",
    "CCDN",
    "CCPWR",
    "CCCANCEL",
    "VOLUP",
    "VOLDN",
    "TRACKUP",
    "TRACKDN",
    "SRC",
    "VOICE",
    "MUTE",
    "DCCMDOFF",
    "DCCMDON",
    "BUS_INACTIVE",
    "BUS_ACTIVE",
    "KEYOFF",
    "KEYON",
    "UNLOCK",
    "LOCK",
];

/// A 6-bit firmware event code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCode(pub u8);

impl EventCode {
    pub const PWR_OFF: EventCode = EventCode(0);
    pub const PWR_ON: EventCode = EventCode(1);
    pub const BUS_INACTIVE: EventCode = EventCode(17);
    pub const BUS_ACTIVE: EventCode = EventCode(18);
    pub const KEY_OFF: EventCode = EventCode(19);
    pub const KEY_ON: EventCode = EventCode(20);
    pub const UNLOCK: EventCode = EventCode(21);
    pub const LOCK: EventCode = EventCode(22);

    /// Symbolic name, or `EVENT_<n>` for codes newer than this build.
    pub fn name(self) -> String {
        EVENT_NAMES
            .get(usize::from(self.0))
            .map(|s| (*s).to_string())
            .unwrap_or_else(|| format!("EVENT_{}", self.0))
    }
}

/// Parsed body of one protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// Telemetry payload, already applied to the delta decoder.
    Data(crate::telemetry::DeltaOutcome),
    /// Firmware event notification.
    Event(EventCode),
    /// Reply to an earlier command, tagged with the command letter. The
    /// handler-specific fields stay on the caller's bit cursor.
    Reply { tag: char },
    /// Diagnostic trouble codes from one module scan step.
    TroubleCode {
        responding_mod: u8,
        total_count: u8,
        dtc1: u16,
        dtc2: u16,
    },
    /// Raw OBD PID query result.
    Obd {
        module: u8,
        pid: u16,
        data: [u8; 4],
    },
    /// Pass-through text message, tagged with a type character.
    Message { kind: char, text: String },
    /// Reserved frame type zero, or a type this build does not know.
    Invalid { raw_type: u32 },
}

/// Header of one protocol frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw 30-bit firmware millisecond counter.
    pub raw_millis: u32,
    pub frame_type: Option<FrameType>,
    raw_type: u32,
}

/// Read the 33-bit header from the front of a frame.
pub fn read_header(bits: &mut BitReader<'_>) -> FrameHeader {
    let raw_millis = bits.read_bits(30);
    let raw_type = bits.read_bits(3);
    FrameHeader {
        raw_millis,
        frame_type: FrameType::from_wire(raw_type),
        raw_type,
    }
}

/// Parse the frame body following `header`.
///
/// Data frames mutate `telemetry`; a desync there surfaces as an error so
/// the caller can request a full frame.
pub fn parse_body(
    header: &FrameHeader,
    bits: &mut BitReader<'_>,
    telemetry: &mut DeltaDecoder,
) -> Result<FrameBody> {
    let body = match header.frame_type {
        Some(FrameType::Data) => FrameBody::Data(telemetry.decode(bits)?),
        Some(FrameType::Event) => {
            let code = bits.read_bits(6) as u8;
            FrameBody::Event(EventCode(code))
        }
        Some(FrameType::Reply) => {
            let tag = char::from(bits.read_bits(7) as u8);
            FrameBody::Reply { tag }
        }
        Some(FrameType::TroubleCode) => FrameBody::TroubleCode {
            responding_mod: bits.read_bits(3) as u8,
            total_count: bits.read_bits(8) as u8,
            dtc1: bits.read_bits(16) as u16,
            dtc2: bits.read_bits(16) as u16,
        },
        Some(FrameType::Obd) => {
            let module = bits.read_bits(3) as u8;
            let pid = bits.read_bits(16) as u16;
            // Wire order is b, a, c, d; presented in natural a..d order.
            let vb = bits.read_bits(8) as u8;
            let va = bits.read_bits(8) as u8;
            let vc = bits.read_bits(8) as u8;
            let vd = bits.read_bits(8) as u8;
            FrameBody::Obd {
                module,
                pid,
                data: [va, vb, vc, vd],
            }
        }
        Some(FrameType::Message) => {
            let kind = char::from(bits.read_bits(7) as u8);
            let mut text = String::new();
            loop {
                let b = bits.read_bits(7);
                if b == 0 {
                    break;
                }
                text.push(char::from(b as u8));
            }
            FrameBody::Message { kind, text }
        }
        Some(FrameType::Invalid) | None => FrameBody::Invalid {
            raw_type: header.raw_type,
        },
    };
    Ok(body)
}

/// Write a frame header.
pub fn write_header(out: &mut BitWriter, raw_millis: u32, frame_type: FrameType) {
    out.write_bits(raw_millis & (MILLIS_WRAP as u32 - 1), 30);
    out.write_bits(frame_type as u32, 3);
}

/// Widen a raw 30-bit counter reading against the current 64-bit clock.
///
/// The counter is monotonic at the sender, so a reading below the current
/// low bits means one more wrap has happened.
pub fn extend_millis(current: u64, raw: u32) -> u64 {
    let mut base = current;
    if u64::from(raw) < (base & (MILLIS_WRAP - 1)) {
        base += MILLIS_WRAP;
    }
    (base & !(MILLIS_WRAP - 1)) | u64::from(raw)
}

/// Render a 16-bit diagnostic trouble code as the standard letter form,
/// e.g. `P0420` or `U3FFF`.
pub fn format_dtc(dtc: u16) -> String {
    let letter = b"PCBU"[usize::from((dtc >> 14) & 3)] as char;
    format!("{letter}{:04X}", dtc & 0x3FFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FieldId, Snapshot, DeltaEncoder};

    #[test]
    fn header_round_trip() {
        let mut writer = BitWriter::new();
        write_header(&mut writer, 123_456_789, FrameType::Event);
        writer.write_bits(u32::from(EventCode::KEY_ON.0), 6);
        let bytes = writer.finish();

        let mut bits = BitReader::new(&bytes);
        let header = read_header(&mut bits);
        assert_eq!(header.raw_millis, 123_456_789);
        assert_eq!(header.frame_type, Some(FrameType::Event));

        let mut telemetry = DeltaDecoder::new();
        let body = parse_body(&header, &mut bits, &mut telemetry).unwrap();
        assert_eq!(body, FrameBody::Event(EventCode::KEY_ON));
    }

    #[test]
    fn reply_leaves_cursor_for_handler() {
        let mut writer = BitWriter::new();
        write_header(&mut writer, 7, FrameType::Reply);
        writer.write_bits(u32::from(b'v'), 7);
        writer.write_bits(0x1234, 16);
        let bytes = writer.finish();

        let mut bits = BitReader::new(&bytes);
        let header = read_header(&mut bits);
        let mut telemetry = DeltaDecoder::new();
        let body = parse_body(&header, &mut bits, &mut telemetry).unwrap();
        assert_eq!(body, FrameBody::Reply { tag: 'v' });
        assert_eq!(bits.read_bits(16), 0x1234);
    }

    #[test]
    fn data_frame_flows_through_delta_decoder() {
        let mut snap = Snapshot::new();
        snap.set(FieldId::Rpm, 2500);
        snap.set(FieldId::Gear, 3);

        let mut writer = BitWriter::new();
        write_header(&mut writer, 99, FrameType::Data);
        let mut enc = DeltaEncoder::new();
        enc.encode_full(&snap, &mut writer);
        let bytes = writer.finish();

        let mut bits = BitReader::new(&bytes);
        let header = read_header(&mut bits);
        let mut telemetry = DeltaDecoder::new();
        match parse_body(&header, &mut bits, &mut telemetry).unwrap() {
            FrameBody::Data(out) => {
                assert!(out.full);
                assert_eq!(out.snapshot, snap);
            }
            other => panic!("expected data body, got {other:?}"),
        }
    }

    #[test]
    fn obd_wire_order_is_swapped() {
        let mut writer = BitWriter::new();
        write_header(&mut writer, 0, FrameType::Obd);
        writer.write_bits(2, 3);
        writer.write_bits(0x1A4C, 16);
        for v in [0xBBu32, 0xAA, 0xCC, 0xDD] {
            writer.write_bits(v, 8);
        }
        let bytes = writer.finish();

        let mut bits = BitReader::new(&bytes);
        let header = read_header(&mut bits);
        let mut telemetry = DeltaDecoder::new();
        match parse_body(&header, &mut bits, &mut telemetry).unwrap() {
            FrameBody::Obd { module, pid, data } => {
                assert_eq!(module, 2);
                assert_eq!(pid, 0x1A4C);
                assert_eq!(data, [0xAA, 0xBB, 0xCC, 0xDD]);
            }
            other => panic!("expected obd body, got {other:?}"),
        }
    }

    #[test]
    fn message_stops_at_terminator() {
        let mut writer = BitWriter::new();
        write_header(&mut writer, 0, FrameType::Message);
        writer.write_bits(u32::from(b'g'), 7);
        for &b in b"42.33,-83.04" {
            writer.write_bits(u32::from(b), 7);
        }
        writer.write_bits(0, 7);
        let bytes = writer.finish();

        let mut bits = BitReader::new(&bytes);
        let header = read_header(&mut bits);
        let mut telemetry = DeltaDecoder::new();
        match parse_body(&header, &mut bits, &mut telemetry).unwrap() {
            FrameBody::Message { kind, text } => {
                assert_eq!(kind, 'g');
                assert_eq!(text, "42.33,-83.04");
            }
            other => panic!("expected message body, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_message_ends_at_payload() {
        // No explicit terminator; the zero-fill past the payload ends it.
        let mut writer = BitWriter::new();
        write_header(&mut writer, 0, FrameType::Message);
        writer.write_bits(u32::from(b'm'), 7);
        writer.write_bits(u32::from(b'k'), 7);
        let bytes = writer.finish();

        let mut bits = BitReader::new(&bytes);
        let header = read_header(&mut bits);
        let mut telemetry = DeltaDecoder::new();
        match parse_body(&header, &mut bits, &mut telemetry).unwrap() {
            FrameBody::Message { kind, text } => {
                assert_eq!(kind, 'm');
                assert_eq!(text, "k");
            }
            other => panic!("expected message body, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_invalid() {
        let mut writer = BitWriter::new();
        writer.write_bits(0, 30);
        writer.write_bits(7, 3);
        let bytes = writer.finish();
        let mut bits = BitReader::new(&bytes);
        let header = read_header(&mut bits);
        assert_eq!(header.frame_type, None);
        let mut telemetry = DeltaDecoder::new();
        assert_eq!(
            parse_body(&header, &mut bits, &mut telemetry).unwrap(),
            FrameBody::Invalid { raw_type: 7 }
        );
    }

    #[test]
    fn millis_extension_handles_wrap() {
        assert_eq!(extend_millis(0, 500), 500);
        assert_eq!(extend_millis(1000, 999), MILLIS_WRAP + 999);
        let cur = 3 * MILLIS_WRAP + 100;
        assert_eq!(extend_millis(cur, 50), 4 * MILLIS_WRAP + 50);
        assert_eq!(extend_millis(cur, 200), 3 * MILLIS_WRAP + 200);
    }

    #[test]
    fn dtc_letters() {
        assert_eq!(format_dtc(0x0420), "P0420");
        assert_eq!(format_dtc(0x4420), "C0420");
        assert_eq!(format_dtc(0x8001), "B0001");
        assert_eq!(format_dtc(0xFFFF), "U3FFF");
    }

    #[test]
    fn event_names() {
        assert_eq!(EventCode::PWR_OFF.name(), "PWROFF");
        assert_eq!(EventCode::LOCK.name(), "LOCK");
        assert_eq!(EventCode(60).name(), "EVENT_60");
    }
}
