use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// An RGB color with channels normalized to the 0.0..=1.0 range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbColor {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
}

impl RgbColor {
    /// Creates a color from normalized channel values
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        RgbColor { r, g, b }
    }

    /// Creates a color from raw channel bytes
    pub fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        RgbColor {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
        }
    }

    /// Returns the raw channel bytes
    pub fn as_bytes(&self) -> (u8, u8, u8) {
        (
            (self.r * 255.0).round() as u8,
            (self.g * 255.0).round() as u8,
            (self.b * 255.0).round() as u8,
        )
    }

    /// Returns the brightness of this color.
    ///
    /// This is the V component of the HSV representation, which reduces
    /// to the maximum of the three channels.
    pub fn brightness(&self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    /// Returns the brightness as a raw byte
    pub fn brightness_byte(&self) -> u8 {
        (self.brightness() * 255.0).round() as u8
    }

    /// Rescales all channels so the brightness hits `target`, preserving
    /// hue and saturation
    pub fn with_brightness_byte(&self, target: u8) -> Self {
        let mut hsv = self.to_hsv();
        hsv.v = f32::from(target) / 255.0;
        hsv.to_rgb()
    }

    fn to_hsv(self) -> Hsv {
        let maxc = self.r.max(self.g).max(self.b);
        let minc = self.r.min(self.g).min(self.b);

        let v = maxc;
        if minc == maxc {
            return Hsv { h: 0.0, s: 0.0, v };
        }

        let s = (maxc - minc) / maxc;
        let rc = (maxc - self.r) / (maxc - minc);
        let gc = (maxc - self.g) / (maxc - minc);
        let bc = (maxc - self.b) / (maxc - minc);

        let h = if self.r == maxc {
            bc - gc
        } else if self.g == maxc {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };

        Hsv {
            h: (h / 6.0).rem_euclid(1.0),
            s,
            v,
        }
    }
}

/// HSV representation used internally for brightness rescaling.
///
/// Conversion follows the classic colorsys algorithm.
struct Hsv {
    h: f32,
    s: f32,
    v: f32,
}

impl Hsv {
    fn to_rgb(&self) -> RgbColor {
        if self.s == 0.0 {
            return RgbColor::new(self.v, self.v, self.v);
        }

        let i = (self.h * 6.0).floor();
        let f = self.h * 6.0 - i;
        let p = self.v * (1.0 - self.s);
        let q = self.v * (1.0 - self.s * f);
        let t = self.v * (1.0 - self.s * (1.0 - f));

        match (i as i32).rem_euclid(6) {
            0 => RgbColor::new(self.v, t, p),
            1 => RgbColor::new(q, self.v, p),
            2 => RgbColor::new(p, self.v, t),
            3 => RgbColor::new(p, q, self.v),
            4 => RgbColor::new(t, p, self.v),
            _ => RgbColor::new(self.v, p, q),
        }
    }
}

/// Warm/cold white channel pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhiteColor {
    /// Warm white level
    pub warm: u8,
    /// Cold white level
    pub cold: u8,
}

impl WhiteColor {
    /// Creates a white value from a warm level alone.
    ///
    /// Cold white defaults to the warm level, matching firmware that has
    /// no independent cold-white channel.
    pub fn new(warm: u8) -> Self {
        WhiteColor { warm, cold: warm }
    }

    /// Creates a white value with independent warm and cold levels
    pub fn with_cold(warm: u8, cold: u8) -> Self {
        WhiteColor { warm, cold }
    }
}

/// Operating mode decoded from the device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LedMode {
    /// State bytes matched no known mode
    #[default]
    Unknown,
    /// Solid RGB color
    Color,
    /// Warm white only
    WarmWhite,
    /// Custom user pattern
    Custom,
    /// One of the built-in preset patterns
    Preset,
    /// Built-in sunrise effect
    Sunrise,
    /// Built-in sunset effect
    Sunset,
}

/// Built-in preset animation patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PresetPattern {
    SevenColorCrossFade = 0x25,
    RedGradualChange = 0x26,
    GreenGradualChange = 0x27,
    BlueGradualChange = 0x28,
    YellowGradualChange = 0x29,
    CyanGradualChange = 0x2a,
    PurpleGradualChange = 0x2b,
    WhiteGradualChange = 0x2c,
    RedGreenCrossFade = 0x2d,
    RedBlueCrossFade = 0x2e,
    GreenBlueCrossFade = 0x2f,
    SevenColorStrobeFlash = 0x30,
    RedStrobeFlash = 0x31,
    GreenStrobeFlash = 0x32,
    BlueStrobeFlash = 0x33,
    YellowStrobeFlash = 0x34,
    CyanStrobeFlash = 0x35,
    PurpleStrobeFlash = 0x36,
    WhiteStrobeFlash = 0x37,
    SevenColorJumping = 0x38,
}

impl PresetPattern {
    /// Returns the wire code for this pattern
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks up a pattern by its wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x25 => Some(PresetPattern::SevenColorCrossFade),
            0x26 => Some(PresetPattern::RedGradualChange),
            0x27 => Some(PresetPattern::GreenGradualChange),
            0x28 => Some(PresetPattern::BlueGradualChange),
            0x29 => Some(PresetPattern::YellowGradualChange),
            0x2a => Some(PresetPattern::CyanGradualChange),
            0x2b => Some(PresetPattern::PurpleGradualChange),
            0x2c => Some(PresetPattern::WhiteGradualChange),
            0x2d => Some(PresetPattern::RedGreenCrossFade),
            0x2e => Some(PresetPattern::RedBlueCrossFade),
            0x2f => Some(PresetPattern::GreenBlueCrossFade),
            0x30 => Some(PresetPattern::SevenColorStrobeFlash),
            0x31 => Some(PresetPattern::RedStrobeFlash),
            0x32 => Some(PresetPattern::GreenStrobeFlash),
            0x33 => Some(PresetPattern::BlueStrobeFlash),
            0x34 => Some(PresetPattern::YellowStrobeFlash),
            0x35 => Some(PresetPattern::CyanStrobeFlash),
            0x36 => Some(PresetPattern::PurpleStrobeFlash),
            0x37 => Some(PresetPattern::WhiteStrobeFlash),
            0x38 => Some(PresetPattern::SevenColorJumping),
            _ => None,
        }
    }
}

/// Built-in sunrise/sunset effects used by timers and mode detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuiltinEffect {
    Sunrise = 0xa1,
    Sunset = 0xa2,
}

impl BuiltinEffect {
    /// Returns the wire code for this effect
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks up an effect by its wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0xa1 => Some(BuiltinEffect::Sunrise),
            0xa2 => Some(BuiltinEffect::Sunset),
            _ => None,
        }
    }
}

/// Repeat-day bitmask for timer schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepeatDays(pub u8);

impl RepeatDays {
    pub const NONE: RepeatDays = RepeatDays(0x00);
    pub const MONDAY: RepeatDays = RepeatDays(0x02);
    pub const TUESDAY: RepeatDays = RepeatDays(0x04);
    pub const WEDNESDAY: RepeatDays = RepeatDays(0x08);
    pub const THURSDAY: RepeatDays = RepeatDays(0x10);
    pub const FRIDAY: RepeatDays = RepeatDays(0x20);
    pub const SATURDAY: RepeatDays = RepeatDays(0x40);
    pub const SUNDAY: RepeatDays = RepeatDays(0x80);
    pub const WEEKDAYS: RepeatDays = RepeatDays(0x02 | 0x04 | 0x08 | 0x10 | 0x20);
    pub const WEEKEND: RepeatDays = RepeatDays(0x40 | 0x80);
    pub const EVERYDAY: RepeatDays = RepeatDays(0xfe);

    /// Returns true when no repeat day is set
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true when every day in `other` is set in `self`
    pub fn contains(self, other: RepeatDays) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the raw mask byte
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for RepeatDays {
    type Output = RepeatDays;

    fn bitor(self, rhs: RepeatDays) -> RepeatDays {
        RepeatDays(self.0 | rhs.0)
    }
}

/// A controller that answered the discovery broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredBulb {
    /// The controller's network address
    pub addr: IpAddr,
    /// Hardware identifier reported by the controller
    pub id: String,
    /// Model string reported by the controller
    pub model: String,
}

/// Configuration for one device session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Receive timeout applied to every read
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub timeout: Duration,
    /// Extra attempts for a failed state query
    pub retries: u32,
    /// Extra attempts for the protocol-detection probe
    pub detection_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timeout: super::DEFAULT_TIMEOUT,
            retries: super::DEFAULT_RETRIES,
            detection_retries: super::DEFAULT_RETRIES,
        }
    }
}

/// Configuration for a discovery scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Address the announce payload is sent to
    pub target: std::net::SocketAddr,
    /// How long to collect replies
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            target: std::net::SocketAddr::from((
                std::net::Ipv4Addr::BROADCAST,
                super::DISCOVERY_PORT,
            )),
            timeout: super::DEFAULT_TIMEOUT,
        }
    }
}
