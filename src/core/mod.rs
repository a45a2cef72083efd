//! Core types and traits for the LEDENET driver
//!
//! This module contains the fundamental building blocks used throughout
//! the library.

pub mod error;
pub mod serde;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{
    BuiltinEffect, DiscoveredBulb, LedMode, PresetPattern, RepeatDays, RgbColor, ScanConfig,
    SessionConfig, WhiteColor,
};

use std::time::Duration;

/// TCP port the control connection uses
pub const CONTROL_PORT: u16 = 5577;

/// UDP port the discovery handshake uses
pub const DISCOVERY_PORT: u16 = 48899;

/// Default receive timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default retry bound for state queries and protocol detection
pub const DEFAULT_RETRIES: u32 = 2;

/// Number of slots in the on-device timer table
pub const TIMER_SLOT_COUNT: usize = 6;
