//! Device session module
//!
//! One [`LedBulb`] drives one physical controller over an exclusive
//! stream connection: lazy protocol-variant detection, state queries
//! with bounded reconnect-and-retry, command encoding, and the clock
//! and timer-table operations.

use std::io;
use std::net::{IpAddr, SocketAddr};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::core::{
    self, DiscoveredBulb, Error, LedMode, PresetPattern, Result, RgbColor, SessionConfig,
    WhiteColor,
};
use crate::network::Connection;
use crate::protocol::{
    self, codec, message, ProtocolVariant, RawState, StateSnapshot, TimerSlot,
};
use crate::util;

/// A session with one WiFi LED bulb controller.
///
/// The protocol has no request identifiers, so all operations are
/// strictly request/response on one connection; `&mut self` receivers
/// keep a second request from being issued mid-flight. Drive multiple
/// bulbs with one session each.
pub struct LedBulb {
    addr: SocketAddr,
    id: String,
    model: String,
    config: SessionConfig,
    connection: Option<Connection>,
    variant: ProtocolVariant,
    use_checksum: bool,
    /// Expected state-query response length; zero until detection ran
    query_len: usize,
    rgbw_single_write: bool,
    rgbw_capable: bool,
    is_on: bool,
    mode: LedMode,
    raw_state: Option<RawState>,
}

impl LedBulb {
    /// Creates a session for a controller on the standard control port
    pub fn new(ip: IpAddr, id: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_config(
            SocketAddr::new(ip, core::CONTROL_PORT),
            id,
            model,
            SessionConfig::default(),
        )
    }

    /// Creates a session with an explicit address and configuration
    pub fn with_config(
        addr: SocketAddr,
        id: impl Into<String>,
        model: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        LedBulb {
            addr,
            id: id.into(),
            model: model.into(),
            config,
            connection: None,
            variant: ProtocolVariant::default(),
            use_checksum: true,
            query_len: 0,
            rgbw_single_write: false,
            rgbw_capable: false,
            is_on: false,
            mode: LedMode::Unknown,
            raw_state: None,
        }
    }

    /// Creates a session from a discovery reply
    pub fn from_discovery(bulb: &DiscoveredBulb) -> Self {
        Self::new(bulb.addr, bulb.id.clone(), bulb.model.clone())
    }

    /// Hardware identifier reported at discovery
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Model string reported at discovery
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Control address of the device
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Last known power flag
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Last decoded operating mode
    pub fn mode(&self) -> LedMode {
        self.mode
    }

    /// Whether the device drives an RGBW head
    pub fn rgbw_capable(&self) -> bool {
        self.rgbw_capable
    }

    /// Whether the device accepts one combined color+white write
    pub fn rgbw_single_write(&self) -> bool {
        self.rgbw_single_write
    }

    /// Negotiated protocol variant
    pub fn protocol_variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Whether outbound messages carry a checksum byte
    pub fn checksum_enabled(&self) -> bool {
        self.use_checksum
    }

    /// Raw bytes of the last successful state query
    pub fn raw_state(&self) -> Option<&RawState> {
        self.raw_state.as_ref()
    }

    /// Whether a connection is currently held
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens the control connection.
    ///
    /// Idempotent: an existing connection is discarded and a fresh one
    /// opened, so callers always get clean framing.
    pub async fn connect(&mut self) -> Result<()> {
        self.connection = None;
        let connection = Connection::open(self.addr, self.config.timeout).await?;
        self.connection = Some(connection);
        Ok(())
    }

    /// Forces the next operation to re-run protocol detection.
    ///
    /// Only meaningful before state-changing commands are issued; the
    /// negotiated variant must stay fixed afterwards.
    pub fn force_redetect(&mut self) {
        self.connection = None;
        self.variant = ProtocolVariant::default();
        self.use_checksum = true;
        self.query_len = 0;
    }

    /// Queries the device and refreshes the cached state.
    ///
    /// Transport failures are retried with a fresh connection up to the
    /// configured bound and then absorbed: the session is marked off and
    /// the cached state cleared, since an unreachable device is an
    /// expected steady state. An undecodable operating mode, by
    /// contrast, is an error.
    pub async fn update_state(&mut self) -> Result<()> {
        let mut mode_retries = self.config.retries;

        loop {
            let response = match self.query_state().await? {
                Some(response) => response,
                None => {
                    warn!(addr = %self.addr, "device unreachable, marking session off");
                    self.is_on = false;
                    self.raw_state = None;
                    return Ok(());
                }
            };

            let snapshot = StateSnapshot::parse(&response)?;
            self.rgbw_single_write = snapshot.rgbw_single_write;
            self.rgbw_capable = snapshot.rgbw_capable;
            if snapshot.nine_byte {
                self.variant = ProtocolVariant::NineByte;
            }
            if snapshot.legacy {
                self.variant = ProtocolVariant::Legacy;
                self.use_checksum = false;
            }

            if snapshot.mode == LedMode::Unknown {
                if mode_retries == 0 {
                    return Err(Error::UnknownMode);
                }
                mode_retries -= 1;
                debug!(addr = %self.addr, "operating mode unknown, retrying query");
                continue;
            }

            self.mode = snapshot.mode;
            if let Some(on) = snapshot.power {
                self.is_on = on;
            }
            self.raw_state = Some(RawState::new(response));
            return Ok(());
        }
    }

    /// Turns the light on
    pub async fn turn_on(&mut self) -> Result<()> {
        self.set_power(true).await
    }

    /// Turns the light off
    pub async fn turn_off(&mut self) -> Result<()> {
        self.set_power(false).await
    }

    /// Color from the last state query.
    ///
    /// Outside color mode the device reports no meaningful channels and
    /// full white is returned.
    pub fn rgb_color(&self) -> RgbColor {
        match (&self.raw_state, self.mode) {
            (Some(raw), LedMode::Color) => {
                RgbColor::from_bytes(raw.red(), raw.green(), raw.blue())
            }
            _ => RgbColor::from_bytes(255, 255, 255),
        }
    }

    /// White levels from the last state query
    pub fn white_color(&self) -> WhiteColor {
        match (&self.raw_state, self.mode) {
            (Some(raw), LedMode::Color) => {
                WhiteColor::with_cold(raw.warm_white(), raw.cold_white())
            }
            _ => WhiteColor::with_cold(255, 255),
        }
    }

    /// Current brightness byte.
    ///
    /// In warm-white mode this is the raw level; otherwise it derives
    /// from the color channels.
    pub fn brightness(&self) -> u8 {
        if self.mode == LedMode::WarmWhite {
            if let Some(raw) = &self.raw_state {
                return raw.warm_white();
            }
        }
        self.rgb_color().brightness_byte()
    }

    /// Sets a solid color, then re-queries to verify
    pub async fn set_rgb(&mut self, color: RgbColor, persist: bool) -> Result<()> {
        self.ensure_ready().await?;
        let msg = message::color_message(self.variant, self.rgbw_single_write, persist, color);
        self.send_msg(&msg).await?;
        self.update_state().await
    }

    /// Sets the white channels, then re-queries to verify.
    ///
    /// Original-protocol devices have no white channel; the call is
    /// rejected before any I/O.
    pub async fn set_white(&mut self, white: WhiteColor, persist: bool) -> Result<()> {
        if self.variant == ProtocolVariant::Legacy {
            return Err(Error::unsupported(
                "this device does not support warm white settings",
            ));
        }
        self.ensure_ready().await?;
        let msg = message::white_message(self.variant, self.rgbw_single_write, persist, white)?;
        self.send_msg(&msg).await?;
        self.update_state().await
    }

    /// Sets color and white in one write, then re-queries to verify.
    ///
    /// Requires the combined-write capability; rejected before any I/O
    /// otherwise.
    pub async fn set_rgbw(
        &mut self,
        color: RgbColor,
        white: WhiteColor,
        persist: bool,
    ) -> Result<()> {
        if self.variant == ProtocolVariant::Legacy {
            return Err(Error::unsupported(
                "this device does not support warm white settings",
            ));
        }
        self.ensure_ready().await?;
        let msg =
            message::rgbw_message(self.variant, self.rgbw_single_write, persist, color, white)?;
        self.send_msg(&msg).await?;
        self.update_state().await
    }

    /// Starts a preset pattern at a 0-100 speed, then re-queries
    pub async fn set_preset_pattern(&mut self, pattern: PresetPattern, speed: u8) -> Result<()> {
        let delay = util::speed_to_delay(speed)?;
        self.ensure_ready().await?;
        let msg = message::pattern_message(pattern.code(), delay);
        self.send_msg(&msg).await?;
        self.update_state().await
    }

    /// Reads the device clock
    pub async fn clock(&mut self) -> Result<NaiveDateTime> {
        self.ensure_ready().await?;
        self.send_msg(&message::GET_CLOCK_MSG).await?;
        let response = self.read_msg(protocol::CLOCK_RESPONSE_LEN).await?;
        message::parse_clock_response(&response)
    }

    /// Sets the device clock
    pub async fn set_clock(&mut self, clock: &NaiveDateTime) -> Result<()> {
        self.ensure_ready().await?;
        self.send_msg(&message::clock_set_message(clock)).await
    }

    /// Reads the six-slot timer table.
    ///
    /// Slots decode independently; one unrecognized slot yields its own
    /// error entry without hiding the others.
    pub async fn timers(&mut self) -> Result<Vec<Result<TimerSlot>>> {
        self.ensure_ready().await?;
        self.send_msg(&message::GET_TIMERS_MSG).await?;
        let response = self.read_msg(protocol::TIMER_RESPONSE_LEN).await?;
        codec::decode_table(&response)
    }

    /// Writes the timer table.
    ///
    /// Short tables are padded to six slots with inactive turn-off
    /// entries, and active slots are moved ahead of inactive ones with
    /// relative order otherwise preserved.
    pub async fn set_timers(&mut self, slots: &[TimerSlot]) -> Result<()> {
        if slots.len() > core::TIMER_SLOT_COUNT {
            return Err(Error::invalid_argument(format!(
                "at most {} timer slots, got {}",
                core::TIMER_SLOT_COUNT,
                slots.len()
            )));
        }

        let mut table = slots.to_vec();
        table.resize(core::TIMER_SLOT_COUNT, TimerSlot::turn_off());
        // sort_by_key is stable, so equally-active slots keep their order
        table.sort_by_key(|slot| !slot.active);

        let encoded: Vec<[u8; codec::TIMER_SLOT_LEN]> =
            table.iter().map(codec::encode_slot).collect();
        let msg = message::timer_table_message(&encoded);

        self.ensure_ready().await?;
        self.send_msg(&msg).await?;

        // Two short acknowledgements follow; their content is not
        // interpreted
        self.read_msg(1).await?;
        self.read_msg(3).await?;
        Ok(())
    }

    async fn set_power(&mut self, turn_on: bool) -> Result<()> {
        self.ensure_ready().await?;
        self.send_msg(message::power_message(self.variant, turn_on))
            .await?;
        self.is_on = turn_on;
        Ok(())
    }

    /// Connects and runs protocol detection if either is still pending
    async fn ensure_ready(&mut self) -> Result<()> {
        self.ensure_connected().await?;
        self.ensure_detected().await
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.connection.is_none() {
            self.connect().await?;
        }
        Ok(())
    }

    async fn ensure_detected(&mut self) -> Result<()> {
        if self.query_len == 0 {
            self.detect_protocol().await?;
        }
        Ok(())
    }

    /// Establishes the protocol variant, checksum flag and expected
    /// query length together, retrying the whole probe up to the bound.
    async fn detect_protocol(&mut self) -> Result<()> {
        for attempt in 0..=self.config.detection_retries {
            if attempt > 0 {
                debug!(addr = %self.addr, attempt, "retrying protocol detection");
                if self.connect().await.is_err() {
                    continue;
                }
            }

            match self.run_detection_probe().await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(err) => debug!(addr = %self.addr, error = %err, "detection probe failed"),
            }
        }

        Err(Error::protocol_detection(
            "unable to determine the protocol variant",
        ))
    }

    /// One detection round: new-generation probe, then the legacy probe.
    ///
    /// A timed-out or short reply falls through to the next step rather
    /// than aborting; a silent legacy device would otherwise never be
    /// detected.
    async fn run_detection_probe(&mut self) -> Result<bool> {
        self.send_msg(&message::NEW_QUERY_MSG).await?;
        match self.read_msg(protocol::DETECTION_PROBE_LEN).await {
            Ok(reply) if reply.len() == protocol::DETECTION_PROBE_LEN => {
                self.query_len = protocol::NEW_QUERY_RESPONSE_LEN;
                info!(addr = %self.addr, "current-generation protocol detected");
                return Ok(true);
            }
            Ok(_) | Err(_) => {}
        }

        self.send_msg(&message::OLD_QUERY_MSG).await?;
        match self.read_msg(protocol::DETECTION_PROBE_LEN).await {
            Ok(reply) if reply.len() >= protocol::DETECTION_PROBE_LEN => {
                if reply[1] == 0x01 {
                    self.variant = ProtocolVariant::Legacy;
                    self.use_checksum = false;
                    self.query_len = protocol::OLD_QUERY_RESPONSE_LEN;
                    info!(addr = %self.addr, "original LEDENET protocol detected");
                    return Ok(true);
                }
                self.use_checksum = true;
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Runs the state query with the transport retry policy.
    ///
    /// `None` means the retry bound was exhausted on transport failures;
    /// fatal conditions come back as errors.
    async fn query_state(&mut self) -> Result<Option<Vec<u8>>> {
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                debug!(addr = %self.addr, attempt, "retrying state query");
            }
            match self.try_query_state().await {
                Ok(response) => return Ok(Some(response)),
                Err(err) if err.is_transport() => {
                    debug!(addr = %self.addr, error = %err, "transport failure during query");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(None)
    }

    async fn try_query_state(&mut self) -> Result<Vec<u8>> {
        self.ensure_connected().await?;
        self.ensure_detected().await?;

        // A fresh connection keeps leftover probe bytes out of the reply
        self.connect().await?;
        self.send_msg(message::query_message(self.variant)).await?;
        let response = self.read_msg(self.query_len).await?;
        if response.len() < self.query_len {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "short state response: {} of {} bytes",
                    response.len(),
                    self.query_len
                ),
            )));
        }
        Ok(response)
    }

    /// Frames and sends one message on the current connection
    async fn send_msg(&mut self, payload: &[u8]) -> Result<()> {
        let msg = message::build_message(payload, self.use_checksum);
        self.active_connection()?.send(&msg).await
    }

    async fn read_msg(&mut self, expected: usize) -> Result<Vec<u8>> {
        self.active_connection()?.recv(expected).await
    }

    fn active_connection(&mut self) -> Result<&mut Connection> {
        self.connection
            .as_mut()
            .ok_or_else(|| Error::protocol("session is not connected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::NaiveDate;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use crate::core::RepeatDays;
    use crate::protocol::codec::{Schedule, TimerPayload};

    // A 5-channel controller response: type 0x25, powered on, color mode
    const RGBW_STATE: [u8; 14] = [
        0x81, 0x25, 0x23, 0x61, 0x21, 0x06, 0x38, 0x05, 0x06, 0xf9, 0x01, 0x00, 0x0f, 0x9d,
    ];

    // An original LEDENET response: type 0x01, powered on, color mode
    const LEGACY_STATE: [u8; 11] = [
        0x66, 0x01, 0x23, 0x41, 0x21, 0x0a, 0xff, 0x00, 0x00, 0x00, 0x99,
    ];

    fn test_config() -> SessionConfig {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        SessionConfig {
            timeout: Duration::from_millis(200),
            retries: 2,
            detection_retries: 2,
        }
    }

    /// Serves canned state bytes in response to every new-protocol query
    /// and ignores everything else, across any number of connections.
    async fn spawn_state_server(state: Vec<u8>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => break,
                };
                let mut buf = [0u8; 128];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if n >= 3 && buf[0] == 0x81 && buf[1] == 0x8a {
                                let _ = stream.write_all(&state).await;
                            }
                        }
                    }
                }
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_modern_detection_and_state_query() {
        let addr = spawn_state_server(RGBW_STATE.to_vec()).await;
        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());

        bulb.update_state().await.unwrap();

        // Device type 0x25: rgbw-capable, nine-byte protocol, checksum
        // stays enabled, no combined write
        assert!(bulb.rgbw_capable());
        assert!(!bulb.rgbw_single_write());
        assert_eq!(bulb.protocol_variant(), ProtocolVariant::NineByte);
        assert!(bulb.checksum_enabled());

        assert!(bulb.is_on());
        assert_eq!(bulb.mode(), LedMode::Color);
        assert_eq!(bulb.rgb_color().as_bytes(), (0x38, 0x05, 0x06));
        assert_eq!(bulb.white_color(), WhiteColor::with_cold(0xf9, 0x01));
        assert_eq!(bulb.brightness(), 0x38);
    }

    #[tokio::test]
    async fn test_set_rgb_verifies_by_requerying() {
        let addr = spawn_state_server(RGBW_STATE.to_vec()).await;
        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());

        bulb.update_state().await.unwrap();
        bulb.set_rgb(RgbColor::from_bytes(10, 20, 30), true)
            .await
            .unwrap();

        // The follow-up query refreshed the cached state
        assert!(bulb.raw_state().is_some());
        assert!(bulb.is_on());
    }

    #[tokio::test]
    async fn test_turn_off_updates_cached_flag() {
        let addr = spawn_state_server(RGBW_STATE.to_vec()).await;
        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());

        bulb.update_state().await.unwrap();
        assert!(bulb.is_on());

        bulb.turn_off().await.unwrap();
        assert!(!bulb.is_on());
    }

    #[tokio::test]
    async fn test_unknown_mode_is_fatal_after_retries() {
        // Pattern code 0x99 matches no mode
        let mut state = RGBW_STATE.to_vec();
        state[3] = 0x99;
        let addr = spawn_state_server(state).await;
        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());

        let err = bulb.update_state().await.unwrap_err();
        assert!(matches!(err, Error::UnknownMode));
    }

    #[tokio::test]
    async fn test_legacy_detection_and_capability_gating() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // Probe connection: stay silent on the new-generation query
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut probe = [0u8; 4];
            stream.read_exact(&mut probe).await.unwrap();
            assert_eq!(probe, [0x81, 0x8a, 0x8b, 0x96]);

            // The legacy probe arrives after the read timeout, still
            // checksummed
            let mut old_probe = [0u8; 4];
            stream.read_exact(&mut old_probe).await.unwrap();
            assert_eq!(old_probe, [0xef, 0x01, 0x77, 0x67]);
            stream.write_all(&[0x81, 0x01]).await.unwrap();

            // Fresh connection for the state query, now without checksum
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut query = [0u8; 3];
            stream.read_exact(&mut query).await.unwrap();
            assert_eq!(query, [0xef, 0x01, 0x77]);
            stream.write_all(&LEGACY_STATE).await.unwrap();
        });

        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());
        bulb.update_state().await.unwrap();

        assert_eq!(bulb.protocol_variant(), ProtocolVariant::Legacy);
        assert!(!bulb.checksum_enabled());
        assert!(bulb.is_on());
        assert_eq!(bulb.mode(), LedMode::Color);

        // White is a capability violation on this variant, rejected
        // before any I/O
        let err = bulb
            .set_white(WhiteColor::new(0x80), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let err = bulb
            .set_rgbw(RgbColor::from_bytes(1, 2, 3), WhiteColor::new(4), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_unreachable_device_degrades_without_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());
        bulb.update_state().await.unwrap();

        assert!(!bulb.is_on());
        assert!(bulb.raw_state().is_none());
    }

    #[tokio::test]
    async fn test_set_timers_pads_and_orders() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut probe = [0u8; 4];
            stream.read_exact(&mut probe).await.unwrap();
            stream.write_all(&[0x81, 0x25]).await.unwrap();

            let mut table = vec![0u8; 88];
            stream.read_exact(&mut table).await.unwrap();
            stream.write_all(&[0x30]).await.unwrap();
            stream.write_all(&[0x00, 0x30, 0x30]).await.unwrap();
            tx.send(table).unwrap();
        });

        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());

        let schedule = Schedule::once(2021, 6, 1, 8, 0);
        let slots = vec![
            TimerSlot::new(true, schedule, TimerPayload::Color(RgbColor::from_bytes(1, 0, 0))),
            TimerSlot::new(false, schedule, TimerPayload::Color(RgbColor::from_bytes(2, 0, 0))),
            TimerSlot::new(
                true,
                Schedule::Repeat(RepeatDays::WEEKDAYS),
                TimerPayload::Color(RgbColor::from_bytes(3, 0, 0)),
            ),
            TimerSlot::new(true, schedule, TimerPayload::TurnOff),
        ];
        bulb.set_timers(&slots).await.unwrap();

        let table = rx.await.unwrap();
        assert_eq!(table.len(), 88);
        assert_eq!(table[0], 0x21);

        // Active slots first, relative order preserved, then the
        // inactive one, then turn-off padding
        let expected = [
            codec::encode_slot(&slots[0]),
            codec::encode_slot(&slots[2]),
            codec::encode_slot(&slots[3]),
            codec::encode_slot(&slots[1]),
            codec::encode_slot(&TimerSlot::turn_off()),
            codec::encode_slot(&TimerSlot::turn_off()),
        ];
        for (i, slot_bytes) in expected.iter().enumerate() {
            let start = 1 + i * 14;
            assert_eq!(&table[start..start + 14], &slot_bytes[..], "slot {}", i);
        }

        assert_eq!(&table[85..87], &[0x00, 0xf0]);
        let checksum = table[..87].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(table[87], checksum);
    }

    #[tokio::test]
    async fn test_set_timers_rejects_oversized_table() {
        let addr = spawn_state_server(RGBW_STATE.to_vec()).await;
        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());

        let slots = vec![TimerSlot::turn_off(); 7];
        let err = bulb.set_timers(&slots).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_timers_round_trip_through_device() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let color_slot = TimerSlot::new(
            true,
            Schedule::once(2021, 6, 1, 7, 30),
            TimerPayload::Color(RgbColor::from_bytes(255, 0, 0)),
        );

        let response_slot = color_slot;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut probe = [0u8; 4];
            stream.read_exact(&mut probe).await.unwrap();
            stream.write_all(&[0x81, 0x25]).await.unwrap();

            // Timer query: 5 bytes with checksum
            let mut query = [0u8; 5];
            stream.read_exact(&mut query).await.unwrap();
            assert_eq!(query, [0x22, 0x2a, 0x2b, 0x0f, 0x86]);

            let mut response = vec![0x0f, 0x22];
            response.extend_from_slice(&codec::encode_slot(&response_slot));
            for _ in 0..5 {
                response.extend_from_slice(&codec::encode_slot(&TimerSlot::turn_off()));
            }
            // Two trailing bytes round the reply out to 88
            response.extend_from_slice(&[0x00, 0xf0]);
            stream.write_all(&response).await.unwrap();
        });

        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());
        let slots = bulb.timers().await.unwrap();

        assert_eq!(slots.len(), 6);
        assert_eq!(*slots[0].as_ref().unwrap(), color_slot);
        for slot in &slots[1..] {
            assert_eq!(slot.as_ref().unwrap().payload, TimerPayload::TurnOff);
        }
    }

    #[tokio::test]
    async fn test_clock_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut probe = [0u8; 4];
            stream.read_exact(&mut probe).await.unwrap();
            stream.write_all(&[0x81, 0x25]).await.unwrap();

            // Clock query: 4 bytes plus checksum
            let mut query = [0u8; 5];
            stream.read_exact(&mut query).await.unwrap();
            assert_eq!(query, [0x11, 0x1a, 0x1b, 0x0f, 0x55]);
            let response = [0x0f, 0x11, 0x14, 21, 3, 14, 15, 9, 26, 7, 0x00, 0x00];
            stream.write_all(&response).await.unwrap();

            // Clock set: 11 bytes plus checksum
            let mut set = [0u8; 12];
            stream.read_exact(&mut set).await.unwrap();
            tx.send(set.to_vec()).unwrap();
        });

        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());
        let clock = bulb.clock().await.unwrap();
        assert_eq!(
            clock,
            NaiveDate::from_ymd_opt(2021, 3, 14)
                .unwrap()
                .and_hms_opt(15, 9, 26)
                .unwrap()
        );

        bulb.set_clock(&clock).await.unwrap();
        let set = rx.await.unwrap();
        assert_eq!(&set[..11], &message::clock_set_message(&clock));
        let checksum = set[..11].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(set[11], checksum);
    }

    #[tokio::test]
    async fn test_invalid_speed_is_rejected_before_io() {
        // Unreachable address: the range check must fire first
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut bulb = LedBulb::with_config(addr, "id", "model", test_config());
        let err = bulb
            .set_preset_pattern(PresetPattern::SevenColorCrossFade, 101)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
