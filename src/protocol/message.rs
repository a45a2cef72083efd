use bytes::{BufMut, BytesMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use super::state::ProtocolVariant;
use crate::core::{Error, Result, RgbColor, WhiteColor};

/// State query for the current-generation protocol
pub const NEW_QUERY_MSG: [u8; 3] = [0x81, 0x8a, 0x8b];
/// State query for the original LEDENET protocol
pub const OLD_QUERY_MSG: [u8; 3] = [0xef, 0x01, 0x77];

/// Power-on command, current-generation protocol
pub const NEW_ON_MSG: [u8; 3] = [0x71, 0x23, 0x0f];
/// Power-off command, current-generation protocol
pub const NEW_OFF_MSG: [u8; 3] = [0x71, 0x24, 0x0f];
/// Power-on command, original protocol
pub const OLD_ON_MSG: [u8; 3] = [0xcc, 0x23, 0x33];
/// Power-off command, original protocol
pub const OLD_OFF_MSG: [u8; 3] = [0xcc, 0x24, 0x33];

/// Clock query
pub const GET_CLOCK_MSG: [u8; 4] = [0x11, 0x1a, 0x1b, 0x0f];
/// Timer-table query
pub const GET_TIMERS_MSG: [u8; 4] = [0x22, 0x2a, 0x2b, 0x0f];

/// Write mask selecting the color channels only
pub const COLOR_ONLY_WRITEMASK: u8 = 0xf0;
/// Write mask selecting the white channels only
pub const WHITE_ONLY_WRITEMASK: u8 = 0x0f;
/// Write mask selecting color and white channels together
pub const COLOR_AND_WHITE_WRITEMASK: u8 = 0x00;

/// Finalizes an outbound message.
///
/// When `use_checksum` is set, appends a single byte holding the low byte
/// of the sum of all payload bytes. The payload is never truncated or
/// padded otherwise.
pub fn build_message(payload: &[u8], use_checksum: bool) -> Vec<u8> {
    if !use_checksum {
        return payload.to_vec();
    }

    let mut msg = BytesMut::with_capacity(payload.len() + 1);
    msg.put_slice(payload);
    let sum: u32 = payload.iter().map(|&b| u32::from(b)).sum();
    msg.put_u8(sum as u8);
    msg.to_vec()
}

/// Returns the state-query message for a protocol variant
pub fn query_message(variant: ProtocolVariant) -> &'static [u8] {
    match variant {
        ProtocolVariant::Legacy => &OLD_QUERY_MSG,
        _ => &NEW_QUERY_MSG,
    }
}

/// Returns the power command for a protocol variant
pub fn power_message(variant: ProtocolVariant, turn_on: bool) -> &'static [u8] {
    match (variant, turn_on) {
        (ProtocolVariant::Legacy, true) => &OLD_ON_MSG,
        (ProtocolVariant::Legacy, false) => &OLD_OFF_MSG,
        (_, true) => &NEW_ON_MSG,
        (_, false) => &NEW_OFF_MSG,
    }
}

/// Builds the empty set-command scaffold for a modern variant.
///
/// The 8-byte variant carries 7 payload bytes with the write mask at
/// index 5; the 9-byte variant carries 8 payload bytes (independent
/// cold-white) with the mask at index 6. Devices that accept a single
/// combined color+white write never get a mask.
fn set_scaffold(
    variant: ProtocolVariant,
    single_write: bool,
    persist: bool,
    write_mask: u8,
) -> Result<Vec<u8>> {
    let mask_idx = match variant {
        ProtocolVariant::EightByte => 5,
        ProtocolVariant::NineByte => 6,
        ProtocolVariant::Legacy => {
            return Err(Error::unsupported(
                "original-protocol devices take direct RGB messages only",
            ))
        }
    };

    let mut msg = vec![0u8; mask_idx + 2];
    msg[0] = if persist { 0x31 } else { 0x41 };
    if !single_write {
        msg[mask_idx] = write_mask;
    }
    msg[mask_idx + 1] = 0x0f;
    Ok(msg)
}

/// Builds a color set message.
///
/// Legacy devices use the fixed 5-byte direct-RGB form; modern variants
/// use the masked scaffold.
pub fn color_message(
    variant: ProtocolVariant,
    single_write: bool,
    persist: bool,
    color: RgbColor,
) -> Vec<u8> {
    let (r, g, b) = color.as_bytes();
    let mask_idx = match variant {
        ProtocolVariant::Legacy => return vec![0x56, r, g, b, 0xaa],
        ProtocolVariant::EightByte => 5,
        ProtocolVariant::NineByte => 6,
    };

    let mut msg = vec![0u8; mask_idx + 2];
    msg[0] = if persist { 0x31 } else { 0x41 };
    msg[1] = r;
    msg[2] = g;
    msg[3] = b;
    if !single_write {
        msg[mask_idx] = COLOR_ONLY_WRITEMASK;
    }
    msg[mask_idx + 1] = 0x0f;
    msg
}

/// Builds a white set message. Not available on the original protocol.
pub fn white_message(
    variant: ProtocolVariant,
    single_write: bool,
    persist: bool,
    white: WhiteColor,
) -> Result<Vec<u8>> {
    let mut msg = set_scaffold(variant, single_write, persist, WHITE_ONLY_WRITEMASK)?;
    msg[4] = white.warm;
    if variant == ProtocolVariant::NineByte {
        msg[5] = white.cold;
    }
    Ok(msg)
}

/// Builds a combined color+white set message.
///
/// Only devices with the single-write capability accept this form.
pub fn rgbw_message(
    variant: ProtocolVariant,
    single_write: bool,
    persist: bool,
    color: RgbColor,
    white: WhiteColor,
) -> Result<Vec<u8>> {
    if !single_write {
        return Err(Error::unsupported(
            "device does not support setting color and white simultaneously",
        ));
    }

    let mut msg = set_scaffold(variant, single_write, persist, COLOR_AND_WHITE_WRITEMASK)?;
    let (r, g, b) = color.as_bytes();
    msg[1] = r;
    msg[2] = g;
    msg[3] = b;
    msg[4] = white.warm;
    if variant == ProtocolVariant::NineByte {
        msg[5] = white.cold;
    }
    Ok(msg)
}

/// Builds a preset-pattern command from a pattern code and raw delay byte
pub fn pattern_message(pattern_code: u8, delay: u8) -> [u8; 4] {
    [0x61, pattern_code, delay, 0x0f]
}

/// Builds the clock set message.
///
/// The weekday byte is ISO-numbered, with Sunday carried as 7 rather
/// than 0.
pub fn clock_set_message(clock: &NaiveDateTime) -> [u8; 11] {
    [
        0x10,
        0x14,
        (clock.year() - 2000) as u8,
        clock.month() as u8,
        clock.day() as u8,
        clock.hour() as u8,
        clock.minute() as u8,
        clock.second() as u8,
        clock.weekday().number_from_monday() as u8,
        0x00,
        0x0f,
    ]
}

/// Parses a clock query response into a date-time.
///
/// The reply carries year-offset/month/day/hour/minute/second starting
/// at offset 3.
pub fn parse_clock_response(response: &[u8]) -> Result<NaiveDateTime> {
    if response.len() < 9 {
        return Err(Error::protocol(format!(
            "clock response too short: {} bytes",
            response.len()
        )));
    }

    let year = 2000 + i32::from(response[3]);
    NaiveDate::from_ymd_opt(year, u32::from(response[4]), u32::from(response[5]))
        .and_then(|date| {
            date.and_hms_opt(
                u32::from(response[6]),
                u32::from(response[7]),
                u32::from(response[8]),
            )
        })
        .ok_or_else(|| Error::protocol("clock response carries an invalid date"))
}

/// Frames an encoded six-slot timer table for writing.
///
/// Fixed start byte, six 14-byte slots, two-byte terminator. The
/// checksum, when enabled, is appended by [`build_message`].
pub fn timer_table_message(slots: &[[u8; 14]]) -> Vec<u8> {
    let mut msg = BytesMut::with_capacity(1 + slots.len() * 14 + 2);
    msg.put_u8(0x21);
    for slot in slots {
        msg.put_slice(slot);
    }
    msg.put_u8(0x00);
    msg.put_u8(0xf0);
    msg.to_vec()
}
