//! ledenet: client driver for LEDENET-family WiFi LED bulb controllers
//!
//! These controllers speak a small checksum-framed binary protocol over
//! a TCP control connection, with a UDP broadcast handshake for
//! discovery. At least three incompatible wire-protocol variants exist
//! across firmware revisions; a session probes the device once and
//! fixes the variant, checksum behavior and response framing for its
//! lifetime.

pub mod core;

pub mod device;
pub mod network;
pub mod protocol;
pub mod util;

// Re-export commonly used items
pub use self::core::{
    BuiltinEffect, DiscoveredBulb, Error, LedMode, PresetPattern, RepeatDays, Result, RgbColor,
    ScanConfig, SessionConfig, WhiteColor,
};
pub use self::device::LedBulb;
pub use self::network::Scanner;
pub use self::protocol::{ProtocolVariant, Schedule, TimerPayload, TimerSlot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
