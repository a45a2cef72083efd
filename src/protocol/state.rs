use serde::{Deserialize, Serialize};

use crate::core::{BuiltinEffect, Error, LedMode, PresetPattern, Result};

/// Wire-protocol variant spoken by a device.
///
/// The variant, the checksum flag and the query-response length are
/// negotiated together during detection and stay fixed for the life of
/// the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// Current-generation protocol, 7-byte set messages
    #[default]
    EightByte,
    /// Current-generation protocol with independent cold white, 8-byte
    /// set messages
    NineByte,
    /// Original LEDENET protocol: direct RGB messages, no checksum
    Legacy,
}

/// Device types that accept one combined color+white write
const RGBW_SINGLE_WRITE_TYPES: [u8; 3] = [0x04, 0x33, 0x81];

/// Device types that actually drive an RGBW head.
///
/// Overlaps with but does not equal the single-write set; the two are
/// independent predicates.
const RGBW_CAPABLE_TYPES: [u8; 4] = [0x04, 0x25, 0x33, 0x81];

/// Device types that use the nine-byte set protocol
const NINE_BYTE_TYPES: [u8; 3] = [0x25, 0x27, 0x35];

/// Device type of the original LEDENET controller
const LEGACY_TYPE: u8 = 0x01;

/// Returns true when the device accepts a combined color+white write
pub fn is_rgbw_single_write(device_type: u8) -> bool {
    RGBW_SINGLE_WRITE_TYPES.contains(&device_type)
}

/// Returns true when the device drives an RGBW head
pub fn is_rgbw_capable(device_type: u8) -> bool {
    RGBW_CAPABLE_TYPES.contains(&device_type)
}

/// Returns true when the device speaks the nine-byte set protocol
pub fn is_nine_byte(device_type: u8) -> bool {
    NINE_BYTE_TYPES.contains(&device_type)
}

/// Returns true for the original LEDENET controller type
pub fn is_legacy(device_type: u8) -> bool {
    device_type == LEGACY_TYPE
}

/// Derives the operating mode from the pattern-code and warm-white
/// state bytes.
///
/// Codes 0x61/0x62 are ambiguous between color and warm-white operation
/// and are disambiguated by capability and level.
pub fn determine_mode(pattern_code: u8, ww_level: u8, rgbw_capable: bool) -> LedMode {
    match pattern_code {
        0x61 | 0x62 => {
            if rgbw_capable || ww_level == 0 {
                LedMode::Color
            } else {
                LedMode::WarmWhite
            }
        }
        0x60 => LedMode::Custom,
        0x41 => LedMode::Color,
        code if PresetPattern::from_code(code).is_some() => LedMode::Preset,
        code if code == BuiltinEffect::Sunrise.code() => LedMode::Sunrise,
        code if code == BuiltinEffect::Sunset.code() => LedMode::Sunset,
        _ => LedMode::Unknown,
    }
}

/// Raw state bytes from the last successful query.
///
/// Layout (modern variants, 14 bytes; the legacy variant stops after
/// the warm-white byte plus checksum):
///
/// ```text
/// pos  0     1     2      3        4  5      6    7      8     9   10
///      head  type  power  pattern  ?  speed  red  green  blue  ww  cold/ck
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawState(Vec<u8>);

impl RawState {
    /// Wraps a query response
    pub fn new(bytes: Vec<u8>) -> Self {
        RawState(bytes)
    }

    /// The raw response bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn get(&self, idx: usize) -> u8 {
        self.0.get(idx).copied().unwrap_or(0)
    }

    pub fn device_type(&self) -> u8 {
        self.get(1)
    }

    pub fn pattern_code(&self) -> u8 {
        self.get(3)
    }

    pub fn speed(&self) -> u8 {
        self.get(5)
    }

    pub fn red(&self) -> u8 {
        self.get(6)
    }

    pub fn green(&self) -> u8 {
        self.get(7)
    }

    pub fn blue(&self) -> u8 {
        self.get(8)
    }

    pub fn warm_white(&self) -> u8 {
        self.get(9)
    }

    pub fn cold_white(&self) -> u8 {
        self.get(10)
    }
}

/// Everything a single query response says about the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Device type byte
    pub device_type: u8,
    /// Accepts a combined color+white write
    pub rgbw_single_write: bool,
    /// Drives an RGBW head
    pub rgbw_capable: bool,
    /// Speaks the nine-byte set protocol
    pub nine_byte: bool,
    /// Original LEDENET controller; also disables the checksum
    pub legacy: bool,
    /// Operating mode per the decision table
    pub mode: LedMode,
    /// Power flag; `None` when the power byte matches neither sentinel
    pub power: Option<bool>,
}

impl StateSnapshot {
    /// Interprets a query response.
    ///
    /// Pure: no session state is read or written, so the decision table
    /// can be exercised without a device.
    pub fn parse(response: &[u8]) -> Result<Self> {
        if response.len() < 10 {
            return Err(Error::protocol(format!(
                "state response too short: {} bytes",
                response.len()
            )));
        }

        let device_type = response[1];
        let rgbw_capable = is_rgbw_capable(device_type);
        let mode = determine_mode(response[3], response[9], rgbw_capable);
        let power = match response[2] {
            0x23 => Some(true),
            0x24 => Some(false),
            _ => None,
        };

        Ok(StateSnapshot {
            device_type,
            rgbw_single_write: is_rgbw_single_write(device_type),
            rgbw_capable,
            nine_byte: is_nine_byte(device_type),
            legacy: is_legacy(device_type),
            mode,
            power,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A 5-channel controller response: type 0x25, powered on, color mode
    const RGBW_RESPONSE: [u8; 14] = [
        0x81, 0x25, 0x23, 0x61, 0x21, 0x06, 0x38, 0x05, 0x06, 0xf9, 0x01, 0x00, 0x0f, 0x9d,
    ];

    // An original LEDENET response: type 0x01, powered on
    const LEGACY_RESPONSE: [u8; 11] = [
        0x66, 0x01, 0x23, 0x41, 0x21, 0x0a, 0xff, 0x00, 0x00, 0x00, 0x99,
    ];

    #[test]
    fn test_rgbw_controller_snapshot() {
        let snapshot = StateSnapshot::parse(&RGBW_RESPONSE).unwrap();
        assert_eq!(snapshot.device_type, 0x25);
        assert!(snapshot.rgbw_capable);
        assert!(snapshot.nine_byte);
        assert!(!snapshot.rgbw_single_write);
        assert!(!snapshot.legacy);
        assert_eq!(snapshot.mode, LedMode::Color);
        assert_eq!(snapshot.power, Some(true));
    }

    #[test]
    fn test_legacy_controller_snapshot() {
        let snapshot = StateSnapshot::parse(&LEGACY_RESPONSE).unwrap();
        assert!(snapshot.legacy);
        assert!(!snapshot.rgbw_capable);
        assert!(!snapshot.nine_byte);
        assert_eq!(snapshot.mode, LedMode::Color);
        assert_eq!(snapshot.power, Some(true));
    }

    #[test]
    fn test_capability_sets_are_independent() {
        // 0x25 is rgbw-capable but not single-write
        assert!(is_rgbw_capable(0x25));
        assert!(!is_rgbw_single_write(0x25));

        // 0x04, 0x33 and 0x81 are both
        for device_type in [0x04, 0x33, 0x81] {
            assert!(is_rgbw_capable(device_type));
            assert!(is_rgbw_single_write(device_type));
        }

        // 0x27 and 0x35 are nine-byte without being rgbw-capable
        for device_type in [0x27, 0x35] {
            assert!(is_nine_byte(device_type));
            assert!(!is_rgbw_capable(device_type));
        }
    }

    #[test]
    fn test_mode_decision_table() {
        // Ambiguous codes split on capability and warm-white level
        assert_eq!(determine_mode(0x61, 0x00, false), LedMode::Color);
        assert_eq!(determine_mode(0x61, 0x40, false), LedMode::WarmWhite);
        assert_eq!(determine_mode(0x61, 0x40, true), LedMode::Color);
        assert_eq!(determine_mode(0x62, 0x00, false), LedMode::Color);
        assert_eq!(determine_mode(0x62, 0x40, false), LedMode::WarmWhite);

        assert_eq!(determine_mode(0x60, 0x00, false), LedMode::Custom);
        assert_eq!(determine_mode(0x41, 0xff, false), LedMode::Color);
        assert_eq!(determine_mode(0x25, 0x00, false), LedMode::Preset);
        assert_eq!(determine_mode(0x38, 0x00, false), LedMode::Preset);
        assert_eq!(determine_mode(0xa1, 0x00, false), LedMode::Sunrise);
        assert_eq!(determine_mode(0xa2, 0x00, false), LedMode::Sunset);

        assert_eq!(determine_mode(0x00, 0x00, false), LedMode::Unknown);
        assert_eq!(determine_mode(0x99, 0x00, true), LedMode::Unknown);
    }

    #[test]
    fn test_power_byte_sentinels() {
        let mut response = RGBW_RESPONSE;
        response[2] = 0x24;
        assert_eq!(StateSnapshot::parse(&response).unwrap().power, Some(false));

        // Anything else leaves the flag unchanged
        response[2] = 0x99;
        assert_eq!(StateSnapshot::parse(&response).unwrap().power, None);
    }

    #[test]
    fn test_parse_rejects_short_response() {
        assert!(StateSnapshot::parse(&[0x81, 0x25]).is_err());
    }

    #[test]
    fn test_raw_state_accessors() {
        let raw = RawState::new(RGBW_RESPONSE.to_vec());
        assert_eq!(raw.device_type(), 0x25);
        assert_eq!(raw.pattern_code(), 0x61);
        assert_eq!(raw.red(), 0x38);
        assert_eq!(raw.green(), 0x05);
        assert_eq!(raw.blue(), 0x06);
        assert_eq!(raw.warm_white(), 0xf9);
        assert_eq!(raw.cold_white(), 0x01);

        // Accessors past the end of a short legacy response read as zero
        let raw = RawState::new(vec![0x66, 0x01]);
        assert_eq!(raw.warm_white(), 0);
    }
}
