//! Protocol implementation module
//!
//! This module defines the LEDENET wire vocabulary: message framing and
//! constant tables, the timer-table codec, and the pure interpretation
//! of state-query responses.

pub mod codec;
pub mod message;
pub mod state;

pub use self::codec::{Schedule, TimerPayload, TimerSlot};
pub use self::state::{ProtocolVariant, RawState, StateSnapshot};

/// Query-response length for the current-generation protocols
pub const NEW_QUERY_RESPONSE_LEN: usize = 14;

/// Query-response length for the original LEDENET protocol
pub const OLD_QUERY_RESPONSE_LEN: usize = 11;

/// Length of the probe read used during protocol detection
pub const DETECTION_PROBE_LEN: usize = 2;

/// Length of a clock query response
pub const CLOCK_RESPONSE_LEN: usize = 12;

/// Length of a timer-table query response
pub const TIMER_RESPONSE_LEN: usize = 88;
