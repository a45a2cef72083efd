//! Utility module
//!
//! Pure unit conversions between the wire representation (raw bytes,
//! inverted delay values) and the caller-facing percentages.

use crate::core::{Error, Result};

/// Highest delay byte the preset-pattern speed maps onto
const MAX_DELAY: u8 = 0x1f;

/// Converts a raw level byte to a 0-100 percentage
pub fn byte_to_percent(value: u8) -> u8 {
    (u32::from(value) * 100 / 255) as u8
}

/// Converts a 0-100 percentage to a raw level byte
pub fn percent_to_byte(percent: u8) -> Result<u8> {
    if percent > 100 {
        return Err(Error::invalid_argument(format!(
            "percent must be between 0 and 100, got {}",
            percent
        )));
    }
    Ok((u32::from(percent) * 255 / 100) as u8)
}

/// Converts a pattern delay byte (1-31, lower is faster) to a 0-100 speed
pub fn delay_to_speed(delay: u8) -> Result<u8> {
    if !(1..=MAX_DELAY).contains(&delay) {
        return Err(Error::invalid_argument(format!(
            "delay must be between 1 and 31, got {}",
            delay
        )));
    }
    let inv_speed = u32::from(delay - 1) * 100 / u32::from(MAX_DELAY - 1);
    Ok((100 - inv_speed) as u8)
}

/// Converts a 0-100 speed to a pattern delay byte (1-31, lower is faster)
pub fn speed_to_delay(speed: u8) -> Result<u8> {
    if speed > 100 {
        return Err(Error::invalid_argument(format!(
            "speed must be between 0 and 100, got {}",
            speed
        )));
    }
    let inv_speed = u32::from(100 - speed);
    Ok((inv_speed * u32::from(MAX_DELAY - 1) / 100) as u8 + 1)
}
