//! Network management module
//!
//! This module owns the stream transport to a controller's fixed
//! control port and the UDP discovery handshake.

pub mod connection;
pub mod discovery;

pub use self::connection::Connection;
pub use self::discovery::{Scanner, ANNOUNCE_PAYLOAD};
