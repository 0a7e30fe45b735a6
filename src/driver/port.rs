//! Core DMX port driver.
//!
//! [`DmxDriver`] owns one UART port's complete state: the 513-octet packet
//! buffer, the TX/RX cursor, the flag word shared with the interrupt
//! handlers, RDM classification of the buffered frame, and (with the `rdm`
//! feature) the parameter store.
//!
//! Methods here are the *non-blocking* halves of the public operations.
//! They assume the caller already holds the port's critical section; the
//! blocking loops that wait on spacing windows, packet arrival, and TX
//! completion live in [`crate::sync::SharedDmx`]. The interrupt-side halves
//! live in [`engine`](super::engine).

use super::config::{DmxConfig, State};
use super::flags::DriverFlags;
use crate::constants::{
    DMX_MAX_PACKET_SIZE, RDM_HEADER_SIZE, RDM_PREAMBLE_BYTE, RDM_PREAMBLE_SEPARATOR,
    RDM_RESPONDER_RESPONSE_LOST_TIMEOUT_US, RDM_BROADCAST_PACKET_SPACING_US,
    RDM_CONTROLLER_RESPONSE_LOST_TIMEOUT_US, RDM_DISCOVERY_NO_RESPONSE_PACKET_SPACING_US,
    RDM_REQUEST_NO_RESPONSE_PACKET_SPACING_US, RDM_RESPOND_TO_REQUEST_PACKET_SPACING_US,
    DMX_BAUD_RATE,
};
use crate::error::{ConfigError, IoError, Result};
use crate::hal::{BusClock, BusDirection, BusTimer, DmxHal, DmxUart, EventSet};
use crate::rdm::message::{OFFSET_CC, OFFSET_DEST_UID, OFFSET_PID};
use crate::rdm::types::{CommandClass, SC_RDM, SC_SUB_MESSAGE, pid};
use crate::rdm::uid::{DeviceUid, UID_SIZE};

#[cfg(feature = "rdm")]
use crate::rdm::store::ParameterStore;

// =============================================================================
// Packet Record
// =============================================================================

/// Summary of one received frame, filled by `receive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketInfo {
    /// Start code of the frame, or `-1` when no frame arrived
    pub sc: i16,
    /// Fault observed while the frame was on the wire
    pub err: IoError,
    /// Number of octets received, including the start code
    pub size: usize,
    /// `true` when the start code is the RDM start code
    pub is_rdm: bool,
}

impl PacketInfo {
    /// An empty record: no frame, no error.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            sc: -1,
            err: IoError::Ok,
            size: 0,
            is_rdm: false,
        }
    }

    pub(crate) const fn timed_out() -> Self {
        Self {
            sc: -1,
            err: IoError::Timeout,
            size: 0,
            is_rdm: false,
        }
    }
}

impl Default for PacketInfo {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Frame Classification
// =============================================================================

/// What the buffered outbound frame is, derived from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameClass {
    pub is_rdm: bool,
    pub is_request: bool,
    pub is_response: bool,
    pub is_broadcast: bool,
    pub is_disc_unique_branch: bool,
    /// Discovery responses use preamble framing and take the no-break path
    pub is_disc_response_frame: bool,
}

impl FrameClass {
    const NON_RDM: Self = Self {
        is_rdm: false,
        is_request: false,
        is_response: false,
        is_broadcast: false,
        is_disc_unique_branch: false,
        is_disc_response_frame: false,
    };
}

/// Classification of the most recent completed send, for spacing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum LastTx {
    #[default]
    None,
    NonRdm,
    DiscRequest,
    BroadcastRequest,
    UnicastRequest,
    Response,
}

/// Outcome of the pre-send checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendClearance {
    /// The response window has closed; abort and report 0 bytes.
    Abort,
    /// Clear to start once `now_us` reaches the carried instant.
    After(u64),
}

/// Outcome of the pre-receive checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RxClearance {
    /// A frame is already buffered.
    Data,
    /// The response-lost window has already elapsed; report 0 bytes now.
    Expired,
    /// Wait, but no longer than the carried instant.
    Deadline(u64),
    /// Wait for the caller's own timeout only.
    Indefinite,
}

/// What the hardware timer is currently armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum TimerRole {
    #[default]
    Idle,
    /// Driving the break/MAB reset sequence; the payload is the next step.
    BreakSequence,
    /// Cutting a receive wait at the RDM response-lost deadline.
    RxTimeout,
    /// Waking an async sender once the inter-packet spacing has elapsed.
    TxSpacing,
}

// =============================================================================
// Driver
// =============================================================================

/// DMX512/RDM port driver.
///
/// One instance drives one UART port. The port identity is the HAL type
/// `H`; multi-port devices declare one driver (wrapped in a
/// [`SharedDmx`](crate::sync::SharedDmx)) per port, which keeps ports
/// independently testable.
///
/// # Type Parameters
/// * `MAX_PIDS` - Capacity of the RDM parameter table
/// * `PD_SIZE` - Size of the RDM parameter slab in bytes
/// * `QUEUE` - Capacity of the RDM pending-notification queue
pub struct DmxDriver<H: DmxHal, const MAX_PIDS: usize = 24, const PD_SIZE: usize = 320, const QUEUE: usize = 16> {
    pub(crate) hal: H,
    pub(crate) config: DmxConfig,
    state: State,
    /// The packet buffer: slot 0 is the start code.
    pub(crate) buffer: [u8; DMX_MAX_PACKET_SIZE],
    /// TX: slots already pushed to the FIFO. RX: slots accumulated since
    /// the last break; `-1` while awaiting a break.
    pub(crate) head: i32,
    /// Size of the most recently completed inbound frame.
    pub(crate) rx_size: usize,
    /// Fault stamped by the RX interrupt path.
    pub(crate) rx_err: IoError,
    /// Intended size of the next outbound frame; sticky until overwritten.
    pub(crate) tx_size: usize,
    pub(crate) flags: DriverFlags,
    /// Timestamp of the last observed byte boundary (TX done or last RX byte).
    pub(crate) last_slot_ts: u64,
    pub(crate) last_tx: LastTx,
    /// Whether a frame arrived after our last request went out.
    pub(crate) responded: bool,
    /// Next step of the break/MAB sequence.
    pub(crate) break_step: u8,
    pub(crate) timer_role: TimerRole,
    /// RDM transaction number for outbound requests.
    pub(crate) tn: u8,
    pub(crate) discovery_muted: bool,
    #[cfg(feature = "rdm")]
    pub(crate) store: ParameterStore<MAX_PIDS, PD_SIZE, QUEUE>,
}

impl<H: DmxHal, const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize>
    DmxDriver<H, MAX_PIDS, PD_SIZE, QUEUE>
{
    /// Create an uninstalled driver around `hal`. Const-compatible.
    pub const fn new(hal: H) -> Self {
        Self {
            hal,
            config: DmxConfig::new(),
            state: State::Uninstalled,
            buffer: [0u8; DMX_MAX_PACKET_SIZE],
            head: -1,
            rx_size: 0,
            rx_err: IoError::Ok,
            tx_size: 1,
            flags: DriverFlags::NONE,
            last_slot_ts: 0,
            last_tx: LastTx::None,
            responded: false,
            break_step: 0,
            timer_role: TimerRole::Idle,
            tn: 0,
            discovery_muted: false,
            #[cfg(feature = "rdm")]
            store: ParameterStore::new(),
        }
    }

    // =========================================================================
    // State Accessors
    // =========================================================================

    /// Current lifecycle state.
    #[inline(always)]
    pub fn state(&self) -> State {
        self.state
    }

    /// Active configuration.
    #[inline(always)]
    pub fn config(&self) -> &DmxConfig {
        &self.config
    }

    /// This responder's UID.
    #[inline(always)]
    pub fn uid(&self) -> DeviceUid {
        self.config.uid
    }

    /// `true` while an outbound frame is in its break, MAB, or data phase.
    #[inline(always)]
    pub fn is_sending(&self) -> bool {
        self.flags.intersects(DriverFlags::IS_SENDING)
    }

    /// `true` when a completed inbound frame is waiting to be taken.
    #[inline(always)]
    pub fn has_data(&self) -> bool {
        self.flags.intersects(DriverFlags::HAS_DATA)
    }

    /// Current RDM transaction number.
    #[inline(always)]
    pub fn transaction_number(&self) -> u8 {
        self.tn
    }

    /// Whether discovery responses are muted.
    #[inline(always)]
    pub fn discovery_muted(&self) -> bool {
        self.discovery_muted
    }

    #[cfg(feature = "rdm")]
    /// The RDM parameter store.
    #[inline(always)]
    pub fn parameters(&self) -> &ParameterStore<MAX_PIDS, PD_SIZE, QUEUE> {
        &self.store
    }

    #[cfg(feature = "rdm")]
    /// Mutable access to the RDM parameter store.
    #[inline(always)]
    pub fn parameters_mut(&mut self) -> &mut ParameterStore<MAX_PIDS, PD_SIZE, QUEUE> {
        &mut self.store
    }

    // =========================================================================
    // Install / Uninstall
    // =========================================================================

    /// Install the driver: claim and program the UART, register the
    /// mandatory RDM parameters, and start listening.
    ///
    /// # Errors
    /// - `AlreadyInstalled` - the port is already driven
    /// - `InvalidBreak` / `InvalidMab` / `InvalidArg` - bad configuration
    pub fn install(&mut self, config: DmxConfig) -> Result<()> {
        if self.state != State::Uninstalled {
            return Err(ConfigError::AlreadyInstalled.into());
        }
        config.check()?;
        self.config = config;

        self.hal.init();
        self.hal.set_baud(DMX_BAUD_RATE);
        self.hal.set_bus_direction(BusDirection::Receive);
        self.hal.rxfifo_reset();
        self.hal.clear_events(EventSet::RX_ALL | EventSet::TX_ALL);
        self.hal.enable_events(EventSet::RX_ALL);

        self.head = -1;
        self.rx_size = 0;
        self.rx_err = IoError::Ok;
        self.flags = DriverFlags::NONE;
        self.state = State::Enabled;

        #[cfg(feature = "rdm")]
        self.register_default_parameters()?;

        #[cfg(feature = "log")]
        log::info!("dmx driver installed (uid {})", self.config.uid);

        Ok(())
    }

    /// Uninstall the driver and release the hardware.
    pub fn uninstall(&mut self) {
        if self.state == State::Uninstalled {
            return;
        }
        self.hal.disable_events(EventSet::RX_ALL | EventSet::TX_ALL);
        self.hal.stop();
        self.hal.set_bus_direction(BusDirection::Receive);
        self.state = State::Uninstalled;
        self.flags = DriverFlags::NONE;
        self.timer_role = TimerRole::Idle;
    }

    /// Quiesce the port without losing configuration or parameters.
    pub fn disable(&mut self) -> Result<()> {
        if self.state == State::Uninstalled {
            return Err(ConfigError::NotInstalled.into());
        }
        self.hal.disable_events(EventSet::RX_ALL | EventSet::TX_ALL);
        self.hal.stop();
        self.timer_role = TimerRole::Idle;
        self.flags
            .clear(DriverFlags::IS_SENDING | DriverFlags::IS_IN_BREAK | DriverFlags::TIMER_RUNNING);
        self.state = State::Disabled;
        Ok(())
    }

    /// Re-arm a disabled port.
    pub fn enable(&mut self) -> Result<()> {
        if self.state == State::Uninstalled {
            return Err(ConfigError::NotInstalled.into());
        }
        self.hal.rxfifo_reset();
        self.hal.clear_events(EventSet::RX_ALL | EventSet::TX_ALL);
        self.hal.enable_events(EventSet::RX_ALL);
        self.head = -1;
        self.state = State::Enabled;
        Ok(())
    }

    /// Change the outbound break duration.
    pub fn set_break_len(&mut self, break_len_us: u32) -> Result<()> {
        let candidate = DmxConfig {
            break_len_us,
            ..self.config
        };
        candidate.check()?;
        self.config.break_len_us = break_len_us;
        Ok(())
    }

    /// Change the wire baud rate (useful for timing-tolerance test rigs;
    /// DMX512 itself is fixed at 250 kbit/s).
    pub fn set_baud(&mut self, baud: u32) -> Result<()> {
        if self.state == State::Uninstalled {
            return Err(ConfigError::NotInstalled.into());
        }
        self.hal.set_baud(baud);
        Ok(())
    }

    /// Change the outbound mark-after-break duration.
    pub fn set_mab_len(&mut self, mab_len_us: u32) -> Result<()> {
        let candidate = DmxConfig {
            mab_len_us,
            ..self.config
        };
        candidate.check()?;
        self.config.mab_len_us = mab_len_us;
        Ok(())
    }

    // =========================================================================
    // Slot I/O
    // =========================================================================

    /// Copy slots out of the packet buffer.
    ///
    /// Returns the number of bytes copied: `min(dst.len(), 513 - offset)`,
    /// or 0 on a precondition failure. The snapshot is not synchronized
    /// against a frame arriving mid-copy; monitoring callers accept that.
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> usize {
        if self.state == State::Uninstalled || offset >= DMX_MAX_PACKET_SIZE {
            return 0;
        }
        let n = dst.len().min(DMX_MAX_PACKET_SIZE - offset);
        dst[..n].copy_from_slice(&self.buffer[offset..offset + n]);
        n
    }

    /// Copy slots into the packet buffer and establish the next TX size.
    ///
    /// Refused (returns 0) while an RDM frame is being sent, so a response
    /// is never mutated mid-flight. If the port is listening, this flips
    /// the transceiver to drive-TX; it is the only implicit direction
    /// change in the API.
    pub fn write(&mut self, offset: usize, src: &[u8]) -> usize {
        if self.state != State::Enabled || offset >= DMX_MAX_PACKET_SIZE {
            return 0;
        }
        if self
            .flags
            .contains(DriverFlags::IS_SENDING | DriverFlags::RDM_VALID)
        {
            #[cfg(feature = "log")]
            log::warn!("write refused: rdm frame in flight");
            return 0;
        }
        if self.hal.bus_direction() == BusDirection::Receive {
            self.hal.set_bus_direction(BusDirection::Transmit);
        }

        let n = src.len().min(DMX_MAX_PACKET_SIZE - offset);
        self.buffer[offset..offset + n].copy_from_slice(&src[..n]);
        self.tx_size = (offset + n).max(1);
        n
    }

    /// Read one slot; `-1` on precondition failure.
    pub fn read_slot(&self, slot: usize) -> i32 {
        let mut byte = [0u8; 1];
        if self.read(slot, &mut byte) == 1 {
            byte[0] as i32
        } else {
            -1
        }
    }

    /// Write one slot; `-1` on precondition failure.
    pub fn write_slot(&mut self, slot: usize, value: u8) -> i32 {
        if self.write(slot, &[value]) == 1 {
            value as i32
        } else {
            -1
        }
    }

    // =========================================================================
    // Send Path (caller half)
    // =========================================================================

    /// Classify the buffered frame as it would go onto the wire.
    pub(crate) fn classify_buffer(&self, size: usize) -> FrameClass {
        if size == 0 {
            return FrameClass::NON_RDM;
        }
        let sc = self.buffer[0];
        if sc == RDM_PREAMBLE_BYTE || sc == RDM_PREAMBLE_SEPARATOR {
            return FrameClass {
                is_rdm: true,
                is_disc_response_frame: true,
                is_response: true,
                ..FrameClass::NON_RDM
            };
        }
        if sc != SC_RDM || size < RDM_HEADER_SIZE || self.buffer[1] != SC_SUB_MESSAGE {
            return FrameClass::NON_RDM;
        }

        let Some(cc) = CommandClass::from_raw(self.buffer[OFFSET_CC]) else {
            return FrameClass::NON_RDM;
        };
        let dest: [u8; UID_SIZE] = self.buffer[OFFSET_DEST_UID..OFFSET_DEST_UID + UID_SIZE]
            .try_into()
            .unwrap_or([0; UID_SIZE]);
        let dest = DeviceUid::from_bytes(&dest);
        let pid_raw = u16::from_be_bytes([self.buffer[OFFSET_PID], self.buffer[OFFSET_PID + 1]]);

        FrameClass {
            is_rdm: true,
            is_request: cc.is_request(),
            is_response: cc.is_response(),
            is_broadcast: dest.is_broadcast(),
            is_disc_unique_branch: cc == CommandClass::DiscoveryCommand
                && pid_raw == pid::DISC_UNIQUE_BRANCH,
            is_disc_response_frame: false,
        }
    }

    /// Pre-send check: decide whether the frame may go out and from when.
    ///
    /// Applies the responder response-window abort and the inter-packet
    /// spacing required after the previous send.
    pub(crate) fn send_clearance(&mut self, size: usize) -> SendClearance {
        let now = self.hal.now_us();
        let effective = if size > 0 { size } else { self.tx_size };
        let class = self.classify_buffer(effective);

        if class.is_rdm && class.is_response && !class.is_disc_response_frame {
            let elapsed = now.saturating_sub(self.last_slot_ts);
            if elapsed >= RDM_RESPONDER_RESPONSE_LOST_TIMEOUT_US as u64 {
                return SendClearance::Abort;
            }
        }

        let spacing = if class.is_rdm && class.is_response {
            RDM_RESPOND_TO_REQUEST_PACKET_SPACING_US
        } else {
            match self.last_tx {
                LastTx::DiscRequest if !self.responded => {
                    RDM_DISCOVERY_NO_RESPONSE_PACKET_SPACING_US
                }
                LastTx::BroadcastRequest => RDM_BROADCAST_PACKET_SPACING_US,
                LastTx::UnicastRequest if !self.responded => {
                    RDM_REQUEST_NO_RESPONSE_PACKET_SPACING_US
                }
                _ => 0,
            }
        };

        SendClearance::After(self.last_slot_ts.saturating_add(spacing as u64))
    }

    /// Begin transmitting the buffered frame.
    ///
    /// Updates `tx_size` when `size > 0`, classifies the frame, arbitrates
    /// bus direction, and launches either the break/MAB timer sequence or
    /// the preamble-framed discovery-response path. Returns the frame size
    /// being sent.
    pub(crate) fn start_send(&mut self, size: usize) -> Result<usize> {
        if self.state == State::Uninstalled {
            return Err(ConfigError::NotInstalled.into());
        }
        if self.state != State::Enabled {
            return Err(ConfigError::NotEnabled.into());
        }
        if size > DMX_MAX_PACKET_SIZE {
            return Err(ConfigError::InvalidArg.into());
        }
        if self.flags.intersects(DriverFlags::COLLIDED) {
            self.flags.clear(DriverFlags::COLLIDED);
            #[cfg(feature = "log")]
            log::warn!("previous frame dropped by rs485 collision");
        }

        if size > 0 {
            self.tx_size = size;
        }
        let class = self.classify_buffer(self.tx_size);

        self.flags.clear(DriverFlags::RDM_CLASS);
        if class.is_rdm {
            self.flags.set(DriverFlags::RDM_VALID);
        }
        self.flags.assign(DriverFlags::RDM_REQUEST, class.is_request);
        self.flags
            .assign(DriverFlags::RDM_BROADCAST, class.is_broadcast);
        self.flags.assign(
            DriverFlags::RDM_DISC_UNIQUE_BRANCH,
            class.is_disc_unique_branch,
        );

        self.last_tx = if !class.is_rdm {
            LastTx::NonRdm
        } else if class.is_disc_unique_branch {
            LastTx::DiscRequest
        } else if class.is_request && class.is_broadcast {
            LastTx::BroadcastRequest
        } else if class.is_request {
            LastTx::UnicastRequest
        } else {
            LastTx::Response
        };

        if class.is_request {
            self.tn = self.tn.wrapping_add(1);
            self.responded = false;
        }

        self.hal.set_bus_direction(BusDirection::Transmit);
        self.head = 0;
        self.flags
            .clear(DriverFlags::HAS_DATA | DriverFlags::SENT_LAST);
        self.flags.set(DriverFlags::IS_SENDING);

        if class.is_disc_response_frame {
            // Discovery responses carry no break: the preamble does the
            // delimiting, and a break would collide with the controller's
            // in-flight request timing.
            self.write_tx_chunk();
            self.hal.clear_events(EventSet::TX_ALL);
            self.hal.enable_events(EventSet::TX_ALL);
        } else {
            self.flags.set(DriverFlags::IS_IN_BREAK | DriverFlags::TIMER_RUNNING);
            self.break_step = 1;
            self.timer_role = TimerRole::BreakSequence;
            self.hal.invert_tx(true);
            self.hal.set_count(0);
            self.hal
                .set_alarm(self.config.break_len_us as u64, false);
            self.hal.start();
        }

        Ok(self.tx_size)
    }

    // =========================================================================
    // Receive Path (caller half)
    // =========================================================================

    /// Pre-receive check: flip to listen if needed and decide how to wait.
    pub(crate) fn rx_clearance(&mut self) -> RxClearance {
        if self.hal.bus_direction() == BusDirection::Transmit {
            self.hal.set_bus_direction(BusDirection::Receive);
            self.head = -1;
            self.flags.clear(DriverFlags::HAS_DATA);
            self.hal.rxfifo_reset();
        }

        if self.flags.intersects(DriverFlags::HAS_DATA) {
            return RxClearance::Data;
        }

        let expecting_response = self.flags.intersects(DriverFlags::SENT_LAST)
            && matches!(self.last_tx, LastTx::DiscRequest | LastTx::UnicastRequest)
            && !self.responded;
        if expecting_response {
            let now = self.hal.now_us();
            let deadline = self
                .last_slot_ts
                .saturating_add(RDM_CONTROLLER_RESPONSE_LOST_TIMEOUT_US as u64);
            if now >= deadline {
                return RxClearance::Expired;
            }
            // Arm the hardware timer so an async waiter is woken even when
            // nothing else arrives.
            self.timer_role = TimerRole::RxTimeout;
            self.flags.set(DriverFlags::TIMER_RUNNING);
            self.hal.set_count(0);
            self.hal.set_alarm(deadline - now, false);
            self.hal.start();
            return RxClearance::Deadline(deadline);
        }

        RxClearance::Indefinite
    }

    /// Arm the hardware timer to wake an async sender after `delay_us`.
    #[cfg(feature = "async")]
    pub(crate) fn arm_spacing_alarm(&mut self, delay_us: u64) {
        self.timer_role = TimerRole::TxSpacing;
        self.flags.set(DriverFlags::TIMER_RUNNING);
        self.hal.set_count(0);
        self.hal.set_alarm(delay_us, false);
        self.hal.start();
    }

    /// Consume the buffered frame, if any.
    pub(crate) fn take_packet(&mut self) -> Option<PacketInfo> {
        if !self.flags.intersects(DriverFlags::HAS_DATA) {
            return None;
        }
        self.flags.clear(DriverFlags::HAS_DATA);
        if self.timer_role == TimerRole::RxTimeout {
            self.hal.stop();
            self.timer_role = TimerRole::Idle;
            self.flags.clear(DriverFlags::TIMER_RUNNING);
        }
        self.head = -1;

        let size = self.rx_size;
        let err = self.rx_err;
        self.rx_err = IoError::Ok;

        let sc = if size > 0 { self.buffer[0] as i16 } else { -1 };
        Some(PacketInfo {
            sc,
            err,
            size,
            is_rdm: size > 0 && self.buffer[0] == SC_RDM,
        })
    }
}
