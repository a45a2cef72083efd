use serde::{Deserialize, Serialize};

use crate::core::{BuiltinEffect, Error, PresetPattern, RepeatDays, Result, RgbColor};
use crate::util;

/// Size of one encoded timer slot
pub const TIMER_SLOT_LEN: usize = 14;

/// Byte 0 sentinel for an active slot
const ACTIVE_SENTINEL: u8 = 0xf0;
/// Byte 0 sentinel for an inactive slot
const INACTIVE_SENTINEL: u8 = 0x0f;
/// Terminator byte for a slot that turns the light on
const TURN_ON_TERMINATOR: u8 = 0xf0;
/// Terminator byte marking a turn-off slot
const TURN_OFF_TERMINATOR: u8 = 0x0f;

/// When a timer fires: once at an absolute date, or repeating on a day mask.
///
/// One-shot fields are kept raw rather than as a calendar date: device
/// templates ship with zeroed month/day fields, which must survive a
/// decode/encode cycle byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schedule {
    /// Fires once at the given date and time
    OneShot {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
    },
    /// Fires on every set day; the wire format carries no time of day
    /// for repeating slots
    Repeat(RepeatDays),
}

impl Schedule {
    /// One-shot schedule at the given time of day
    pub fn once(year: u16, month: u8, day: u8, hour: u8, minute: u8) -> Self {
        Schedule::OneShot {
            year,
            month,
            day,
            hour,
            minute,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::OneShot {
            year: 2000,
            month: 0,
            day: 0,
            hour: 0,
            minute: 0,
        }
    }
}

/// What a timer slot does when it fires.
///
/// The payload kinds are mutually exclusive; decode derives the kind from
/// the terminator and pattern-code bytes, never by guessing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TimerPayload {
    /// Turns the light off
    TurnOff,
    /// Turns the light on with no further payload
    TurnOn,
    /// Turns the light on with a solid color
    Color(RgbColor),
    /// Runs a built-in sunrise/sunset ramp
    Effect {
        effect: BuiltinEffect,
        /// Ramp duration in minutes
        duration: u8,
        /// Raw start brightness; percentage view via [`util::byte_to_percent`]
        start_brightness: u8,
        /// Raw end brightness
        end_brightness: u8,
    },
    /// Runs a preset pattern
    Preset {
        pattern: PresetPattern,
        /// Raw delay byte; percentage view via [`util::delay_to_speed`]
        delay: u8,
    },
    /// Turns on the warm white channel only
    WarmWhite {
        /// Raw warm white level
        level: u8,
    },
}

impl TimerPayload {
    /// Builds an effect payload from percentages
    pub fn effect(
        effect: BuiltinEffect,
        duration: u8,
        start_percent: u8,
        end_percent: u8,
    ) -> Result<Self> {
        Ok(TimerPayload::Effect {
            effect,
            duration,
            start_brightness: util::percent_to_byte(start_percent)?,
            end_brightness: util::percent_to_byte(end_percent)?,
        })
    }

    /// Builds a preset payload from a 0-100 speed
    pub fn preset(pattern: PresetPattern, speed: u8) -> Result<Self> {
        Ok(TimerPayload::Preset {
            pattern,
            delay: util::speed_to_delay(speed)?,
        })
    }

    /// Builds a warm-white payload from a percentage
    pub fn warm_white(percent: u8) -> Result<Self> {
        Ok(TimerPayload::WarmWhite {
            level: util::percent_to_byte(percent)?,
        })
    }
}

/// One slot of the six-slot on-device timer table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimerSlot {
    /// Whether the device evaluates this slot
    pub active: bool,
    /// When the slot fires
    pub schedule: Schedule,
    /// What the slot does
    pub payload: TimerPayload,
}

impl TimerSlot {
    /// Creates a slot
    pub fn new(active: bool, schedule: Schedule, payload: TimerPayload) -> Self {
        TimerSlot {
            active,
            schedule,
            payload,
        }
    }

    /// The inactive turn-off slot used to pad short tables
    pub fn turn_off() -> Self {
        TimerSlot {
            active: false,
            schedule: Schedule::default(),
            payload: TimerPayload::TurnOff,
        }
    }
}

/// Decodes one 14-byte slot.
///
/// Dispatch order matters: the off-marker terminator wins over any
/// pattern code, and the pattern-code byte is inspected before the
/// warmth fallback. An unrecognized layout is an error for this slot,
/// never a guessed default.
pub fn decode_slot(bytes: &[u8]) -> Result<TimerSlot> {
    if bytes.len() != TIMER_SLOT_LEN {
        return Err(Error::protocol(format!(
            "timer slot must be {} bytes, got {}",
            TIMER_SLOT_LEN,
            bytes.len()
        )));
    }

    let active = bytes[0] == ACTIVE_SENTINEL;
    let schedule = if bytes[7] == 0 {
        Schedule::OneShot {
            year: 2000 + u16::from(bytes[1]),
            month: bytes[2],
            day: bytes[3],
            hour: bytes[4],
            minute: bytes[5],
        }
    } else {
        // The date bytes are unused when a repeat mask is present
        Schedule::Repeat(RepeatDays(bytes[7]))
    };

    if bytes[13] == TURN_OFF_TERMINATOR {
        return Ok(TimerSlot::new(active, schedule, TimerPayload::TurnOff));
    }

    let code = bytes[8];
    let payload = if code == 0x00 {
        if bytes[12] != 0 {
            TimerPayload::WarmWhite { level: bytes[12] }
        } else {
            TimerPayload::TurnOn
        }
    } else if code == 0x61 {
        TimerPayload::Color(RgbColor::from_bytes(bytes[9], bytes[10], bytes[11]))
    } else if let Some(effect) = BuiltinEffect::from_code(code) {
        TimerPayload::Effect {
            effect,
            duration: bytes[9],
            start_brightness: bytes[10],
            end_brightness: bytes[11],
        }
    } else if let Some(pattern) = PresetPattern::from_code(code) {
        TimerPayload::Preset {
            pattern,
            delay: bytes[9],
        }
    } else if bytes[12] != 0 {
        TimerPayload::WarmWhite { level: bytes[12] }
    } else {
        return Err(Error::UnrecognizedTimerFormat(code));
    };

    Ok(TimerSlot::new(active, schedule, payload))
}

/// Encodes one slot to its 14-byte wire form.
///
/// A one-shot schedule leaves the repeat mask zero and a repeat schedule
/// leaves the date bytes zero; the wire format cannot carry both.
pub fn encode_slot(slot: &TimerSlot) -> [u8; TIMER_SLOT_LEN] {
    let mut bytes = [0u8; TIMER_SLOT_LEN];

    bytes[0] = if slot.active {
        ACTIVE_SENTINEL
    } else {
        INACTIVE_SENTINEL
    };

    match slot.schedule {
        Schedule::OneShot {
            year,
            month,
            day,
            hour,
            minute,
        } => {
            bytes[1] = year.saturating_sub(2000) as u8;
            bytes[2] = month;
            bytes[3] = day;
            bytes[4] = hour;
            bytes[5] = minute;
        }
        Schedule::Repeat(days) => {
            bytes[7] = days.bits();
        }
    }

    bytes[13] = TURN_ON_TERMINATOR;
    match slot.payload {
        TimerPayload::TurnOff => {
            bytes[13] = TURN_OFF_TERMINATOR;
        }
        TimerPayload::TurnOn => {}
        TimerPayload::Color(color) => {
            let (r, g, b) = color.as_bytes();
            bytes[8] = 0x61;
            bytes[9] = r;
            bytes[10] = g;
            bytes[11] = b;
        }
        TimerPayload::Effect {
            effect,
            duration,
            start_brightness,
            end_brightness,
        } => {
            bytes[8] = effect.code();
            bytes[9] = duration;
            bytes[10] = start_brightness;
            bytes[11] = end_brightness;
        }
        TimerPayload::Preset { pattern, delay } => {
            bytes[8] = pattern.code();
            bytes[9] = delay;
        }
        TimerPayload::WarmWhite { level } => {
            bytes[12] = level;
        }
    }

    bytes
}

/// Decodes a full timer-table response: a 2-byte header followed by six
/// 14-byte slots.
///
/// A slot that fails to decode yields its own error entry; the other
/// slots still decode.
pub fn decode_table(response: &[u8]) -> Result<Vec<Result<TimerSlot>>> {
    let needed = 2 + crate::core::TIMER_SLOT_COUNT * TIMER_SLOT_LEN;
    if response.len() < needed {
        return Err(Error::protocol(format!(
            "timer table response too short: {} bytes, need {}",
            response.len(),
            needed
        )));
    }

    Ok((0..crate::core::TIMER_SLOT_COUNT)
        .map(|i| {
            let start = 2 + i * TIMER_SLOT_LEN;
            decode_slot(&response[start..start + TIMER_SLOT_LEN])
        })
        .collect())
}
