//! ISR-safe DMX port wrappers using critical sections.
//!
//! [`SharedDmx`] is the primary API of this crate: a `static`-friendly
//! wrapper that owns a [`DmxDriver`] behind a critical-section cell and
//! implements the blocking `send` / `receive` / `wait_sent` contracts on
//! top of it.
//!
//! # Blocking model
//!
//! Callers block by polling the driver state between short
//! [`DelayNs`](embedded_hal::delay::DelayNs) naps; every probe runs in its
//! own critical section, so interrupt handlers stay live the whole time.
//! Spacing windows and the RDM timeouts are measured against the HAL's
//! monotonic microsecond clock.
//!
//! Only one task may drive a port's blocking API at a time. The contract
//! is the same one the underlying notification hardware imposes: a second
//! concurrent waiter would steal the first one's completion.
//!
//! # Interrupt wiring
//!
//! ```ignore
//! static DMX1: SharedDmxDefault<Uart1Hal> = SharedDmx::new(Uart1Hal::new());
//!
//! #[handler]
//! fn uart1_isr() {
//!     DMX1.on_uart_interrupt();
//! }
//!
//! #[handler]
//! fn timg0_isr() {
//!     DMX1.on_timer_interrupt();
//! }
//! ```

use embedded_hal::delay::DelayNs;

use super::primitives::CriticalSectionCell;
use crate::constants::DMX_SLOT_TIME_US;
use crate::driver::config::{DmxConfig, State};
use crate::driver::port::{DmxDriver, PacketInfo, RxClearance, SendClearance};
use crate::error::Result;
use crate::hal::{BusClock, DmxHal};

#[cfg(feature = "async")]
use super::primitives::AtomicWaker;

/// Poll interval of the blocking loops: one DMX slot time.
const POLL_INTERVAL_US: u32 = DMX_SLOT_TIME_US;

/// ISR-safe DMX port wrapper using critical sections.
///
/// All access goes through `critical_section::with()`, disabling interrupts
/// for the duration of the closure.
///
/// # Example
///
/// ```ignore
/// static DMX1: SharedDmxDefault<Uart1Hal> = SharedDmx::new(Uart1Hal::new());
///
/// DMX1.install(DmxConfig::new())?;
/// DMX1.write(0, &frame);
/// DMX1.send(frame.len(), &mut delay)?;
/// ```
pub struct SharedDmx<
    H: DmxHal,
    const MAX_PIDS: usize = 24,
    const PD_SIZE: usize = 320,
    const QUEUE: usize = 16,
> {
    inner: CriticalSectionCell<DmxDriver<H, MAX_PIDS, PD_SIZE, QUEUE>>,
    #[cfg(feature = "async")]
    pub(crate) tx_waker: AtomicWaker,
    #[cfg(feature = "async")]
    pub(crate) rx_waker: AtomicWaker,
}

impl<H: DmxHal, const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize>
    SharedDmx<H, MAX_PIDS, PD_SIZE, QUEUE>
{
    /// Create a new shared port (const, suitable for static initialization).
    pub const fn new(hal: H) -> Self {
        Self {
            inner: CriticalSectionCell::new(DmxDriver::new(hal)),
            #[cfg(feature = "async")]
            tx_waker: AtomicWaker::new(),
            #[cfg(feature = "async")]
            rx_waker: AtomicWaker::new(),
        }
    }

    /// Execute a closure with exclusive access to the driver.
    ///
    /// Interrupts are disabled for the duration of the closure.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut DmxDriver<H, MAX_PIDS, PD_SIZE, QUEUE>) -> R,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut DmxDriver<H, MAX_PIDS, PD_SIZE, QUEUE>) -> R,
    {
        self.inner.try_with(f)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Install the port. See [`DmxDriver::install`].
    pub fn install(&self, config: DmxConfig) -> Result<()> {
        self.with(|driver| driver.install(config))
    }

    /// Uninstall the port and release the hardware.
    pub fn uninstall(&self) {
        self.with(DmxDriver::uninstall);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.with(|driver| driver.state())
    }

    /// Change the outbound break duration. See [`DmxDriver::set_break_len`].
    pub fn set_break_len(&self, break_len_us: u32) -> Result<()> {
        self.with(|driver| driver.set_break_len(break_len_us))
    }

    /// Change the outbound mark-after-break duration. See
    /// [`DmxDriver::set_mab_len`].
    pub fn set_mab_len(&self, mab_len_us: u32) -> Result<()> {
        self.with(|driver| driver.set_mab_len(mab_len_us))
    }

    // =========================================================================
    // Interrupt Glue
    // =========================================================================

    /// UART interrupt entry point: forward to the bus engine and wake any
    /// async waiters.
    pub fn on_uart_interrupt(&self) {
        let wake = self.with(DmxDriver::on_uart_event);
        #[cfg(feature = "async")]
        {
            if wake.tx_complete {
                self.tx_waker.wake();
            }
            if wake.rx_complete {
                self.rx_waker.wake();
            }
        }
        #[cfg(not(feature = "async"))]
        let _ = wake;
    }

    /// Hardware timer interrupt entry point.
    pub fn on_timer_interrupt(&self) {
        let wake = self.with(DmxDriver::on_timer_alarm);
        #[cfg(feature = "async")]
        {
            if wake.rx_complete {
                self.rx_waker.wake();
            }
        }
        #[cfg(not(feature = "async"))]
        let _ = wake;
    }

    // =========================================================================
    // Slot I/O
    // =========================================================================

    /// Copy slots out of the packet buffer. See [`DmxDriver::read`].
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> usize {
        self.with(|driver| driver.read(offset, dst))
    }

    /// Copy slots into the packet buffer. See [`DmxDriver::write`].
    pub fn write(&self, offset: usize, src: &[u8]) -> usize {
        self.with(|driver| driver.write(offset, src))
    }

    /// Read one slot; `-1` on precondition failure.
    pub fn read_slot(&self, slot: usize) -> i32 {
        self.with(|driver| driver.read_slot(slot))
    }

    /// Write one slot; `-1` on precondition failure.
    pub fn write_slot(&self, slot: usize, value: u8) -> i32 {
        self.with(|driver| driver.write_slot(slot, value))
    }

    // =========================================================================
    // Blocking Operations
    // =========================================================================

    fn now_us(&self) -> u64 {
        self.with(|driver| driver.hal.now_us())
    }

    /// Block until the in-flight frame (if any) has been fully accepted.
    ///
    /// Returns `true` iff the driver is idle; `false` when `wait_us`
    /// elapsed first. `wait_us == 0` polls once.
    pub fn wait_sent<D: DelayNs>(&self, wait_us: u64, delay: &mut D) -> bool {
        let start = self.now_us();
        loop {
            if !self.with(|driver| driver.is_sending()) {
                return true;
            }
            if self.now_us().saturating_sub(start) >= wait_us {
                return false;
            }
            delay.delay_us(POLL_INTERVAL_US);
        }
    }

    fn wait_sent_indefinite<D: DelayNs>(&self, delay: &mut D) {
        while self.with(|driver| driver.is_sending()) {
            delay.delay_us(POLL_INTERVAL_US);
        }
    }

    /// Send the buffered frame.
    ///
    /// Blocks until any in-flight frame completes and the RDM inter-packet
    /// spacing required after the previous frame has elapsed, then launches
    /// the transmission and returns the frame size. `size == 0` reuses the
    /// previous frame size.
    ///
    /// Returns `Ok(0)` without sending when the buffered frame is an RDM
    /// response whose response window has already closed.
    pub fn send<D: DelayNs>(&self, size: usize, delay: &mut D) -> Result<usize> {
        self.wait_sent_indefinite(delay);

        match self.with(|driver| driver.send_clearance(size)) {
            SendClearance::Abort => {
                #[cfg(feature = "log")]
                log::warn!("rdm response window closed, send aborted");
                return Ok(0);
            }
            SendClearance::After(ready_at) => loop {
                let now = self.now_us();
                if now >= ready_at {
                    break;
                }
                let remaining = (ready_at - now).min(POLL_INTERVAL_US as u64) as u32;
                delay.delay_us(remaining.max(1));
            },
        }

        self.with(|driver| driver.start_send(size))
    }

    /// Receive one frame.
    ///
    /// Blocks until a frame completes, the RDM response-lost window closes,
    /// or `wait_us` elapses; fills `packet` and returns the received size
    /// (0 on timeout, with `packet.err` set accordingly).
    ///
    /// When the frame is a well-formed RDM request addressed to this
    /// device, the responder dispatches it and emits the reply before
    /// returning, so the caller observes request and response as one
    /// transaction.
    pub fn receive<D: DelayNs>(
        &self,
        packet: &mut PacketInfo,
        wait_us: u64,
        delay: &mut D,
    ) -> Result<usize> {
        self.wait_sent_indefinite(delay);

        let start = self.now_us();
        let deadline = match self.with(|driver| driver.rx_clearance()) {
            RxClearance::Expired => {
                *packet = PacketInfo::timed_out();
                return Ok(0);
            }
            RxClearance::Deadline(t) => Some(t),
            RxClearance::Data | RxClearance::Indefinite => None,
        };

        loop {
            if let Some(taken) = self.with(|driver| driver.take_packet()) {
                *packet = taken;
                break;
            }
            let now = self.now_us();
            if deadline.is_some_and(|t| now >= t) {
                *packet = PacketInfo::timed_out();
                return Ok(0);
            }
            if now.saturating_sub(start) >= wait_us {
                *packet = PacketInfo::timed_out();
                return Ok(0);
            }
            delay.delay_us(POLL_INTERVAL_US);
        }

        #[cfg(feature = "rdm")]
        if packet.is_rdm && packet.err.is_ok() {
            let response = self.with(|driver| driver.rdm_dispatch(packet.size));
            if let Some(response_size) = response {
                // Emit the staged reply through the normal send path so the
                // turnaround spacing and response window both apply.
                let _ = self.send(response_size, delay)?;
            }
        }

        Ok(packet.size)
    }
}

impl<H: DmxHal + Default, const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize> Default
    for SharedDmx<H, MAX_PIDS, PD_SIZE, QUEUE>
{
    fn default() -> Self {
        Self::new(H::default())
    }
}

/// Default shared port configuration (24 PIDs, 320-byte slab, 16 queue).
pub type SharedDmxDefault<H> = SharedDmx<H, 24, 320, 16>;

/// Small shared port for memory-constrained responders.
pub type SharedDmxSmall<H> = SharedDmx<H, 12, 160, 8>;

/// Large shared port for parameter-heavy responders.
pub type SharedDmxLarge<H> = SharedDmx<H, 48, 1024, 32>;

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::driver::flags::DriverFlags;
    use crate::error::IoError;
    use crate::hal::EventSet;
    use crate::hal::mock::MockHal;
    use crate::rdm::message::{PD_OFFSET, RdmHeader};
    use crate::rdm::types::{CommandClass, ResponseType, SUB_DEVICE_ROOT, pid};
    use crate::rdm::uid::DeviceUid;

    type Shared = SharedDmx<MockHal, 24, 320, 16>;

    const OWN_UID: DeviceUid = DeviceUid::new(0x05E0, 0x1234_5678);

    /// Delay double that advances the mock clock, so blocking loops make
    /// progress on the host.
    struct MockDelay<'a> {
        dmx: &'a Shared,
    }

    impl DelayNs for MockDelay<'_> {
        fn delay_ns(&mut self, ns: u32) {
            let us = (ns as u64 / 1_000).max(1);
            self.dmx.with(|driver| driver.hal.advance(us));
        }
    }

    fn installed() -> Shared {
        let shared = SharedDmx::new(MockHal::new());
        shared.install(DmxConfig::new().with_uid(OWN_UID)).unwrap();
        shared
    }

    /// Run the break/MAB sequence and the acceptance interrupt for an
    /// in-flight frame, as the hardware would.
    fn complete_tx(shared: &Shared) {
        shared.with(|driver| {
            driver.on_timer_alarm();
            driver.on_timer_alarm();
            driver.hal.drain_tx_fifo();
            driver.hal.raise(EventSet::TX_FIFO_EMPTY);
        });
        shared.on_uart_interrupt();
    }

    #[test]
    fn wait_sent_idle_returns_immediately() {
        let shared = installed();
        let mut delay = MockDelay { dmx: &shared };
        assert!(shared.wait_sent(0, &mut delay));
    }

    #[test]
    fn wait_sent_times_out_while_sending() {
        let shared = installed();
        shared.with(|driver| driver.flags.set(DriverFlags::IS_SENDING));
        let mut delay = MockDelay { dmx: &shared };
        assert!(!shared.wait_sent(1_000, &mut delay));
    }

    #[test]
    fn send_launches_frame() {
        let shared = installed();
        let mut delay = MockDelay { dmx: &shared };
        shared.write(0, &[0x00, 255, 128, 0]);
        assert_eq!(shared.send(4, &mut delay).unwrap(), 4);
        assert!(shared.with(|driver| driver.is_sending()));

        complete_tx(&shared);
        assert!(shared.wait_sent(1_000, &mut delay));
        assert_eq!(
            shared.with(|driver| driver.hal.tx_sink.clone()),
            [0x00, 255, 128, 0]
        );
    }

    #[test]
    fn receive_with_zero_wait_returns_empty() {
        let shared = installed();
        let mut delay = MockDelay { dmx: &shared };
        let mut packet = PacketInfo::empty();
        assert_eq!(shared.receive(&mut packet, 0, &mut delay).unwrap(), 0);
        assert_eq!(packet.err, IoError::Timeout);
        assert_eq!(packet.size, 0);
    }

    #[test]
    fn receive_picks_up_buffered_frame() {
        let shared = installed();
        let mut delay = MockDelay { dmx: &shared };

        shared.with(|driver| {
            driver.hal.raise(EventSet::RX_BREAK);
            driver.on_uart_event();
            driver.hal.push_rx(&[0x00, 1, 2, 3, 4, 5, 6, 7]);
            driver.hal.raise(EventSet::RX_FIFO_TOUT);
            driver.on_uart_event();
        });

        let mut packet = PacketInfo::empty();
        let size = shared.receive(&mut packet, 100_000, &mut delay).unwrap();
        assert_eq!(size, 8);
        assert_eq!(packet.sc, 0);
        assert_eq!(packet.err, IoError::Ok);

        let mut out = [0u8; 8];
        assert_eq!(shared.read(0, &mut out), 8);
        assert_eq!(out, [0x00, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn receive_returns_early_after_unanswered_request() {
        let shared = installed();
        let mut delay = MockDelay { dmx: &shared };

        // stage and send a DISC_UNIQUE_BRANCH request
        let header = RdmHeader {
            dest_uid: DeviceUid::BROADCAST_ALL,
            src_uid: OWN_UID,
            tn: 0,
            port_id: 1,
            message_count: 0,
            sub_device: SUB_DEVICE_ROOT,
            cc: CommandClass::DiscoveryCommand,
            pid: pid::DISC_UNIQUE_BRANCH,
            pdl: 12,
        };
        let size = shared.with(|driver| {
            driver.buffer[PD_OFFSET..PD_OFFSET + 12].fill(0);
            header.encode(&mut driver.buffer)
        });
        shared.send(size, &mut delay).unwrap();
        complete_tx(&shared);

        let sent_at = shared.with(|driver| driver.last_slot_ts);

        // no reply ever arrives: receive must cut the wait at 2.8 ms
        let mut packet = PacketInfo::empty();
        let received = shared.receive(&mut packet, 100_000, &mut delay).unwrap();
        let now = shared.with(|driver| driver.hal.now_us());

        assert_eq!(received, 0);
        assert_eq!(packet.err, IoError::Timeout);
        let waited = now - sent_at;
        assert!((2_800..3_000).contains(&waited), "waited {waited} us");
    }

    #[test]
    fn receive_dispatches_rdm_and_emits_response() {
        let shared = installed();
        let mut delay = MockDelay { dmx: &shared };

        // a GET DEVICE_INFO request lands on the wire
        let request = RdmHeader {
            dest_uid: OWN_UID,
            src_uid: DeviceUid::new(0x0011, 0x2233_4455),
            tn: 9,
            port_id: 1,
            message_count: 0,
            sub_device: SUB_DEVICE_ROOT,
            cc: CommandClass::GetCommand,
            pid: pid::DEVICE_INFO,
            pdl: 0,
        };
        shared.with(|driver| {
            let mut frame = [0u8; 64];
            let size = request.encode(&mut frame);
            driver.hal.raise(EventSet::RX_BREAK);
            driver.on_uart_event();
            driver.hal.push_rx(&frame[..size]);
            driver.hal.raise(EventSet::RX_FIFO_FULL);
            driver.on_uart_event();
            assert!(driver.has_data());
        });

        let mut packet = PacketInfo::empty();
        let size = shared.receive(&mut packet, 100_000, &mut delay).unwrap();
        assert_eq!(size, 26);
        assert!(packet.is_rdm);

        // the response is now in flight; finish it and inspect the wire
        assert!(shared.with(|driver| driver.is_sending()));
        complete_tx(&shared);

        let (sink, invert_log) = shared
            .with(|driver| (driver.hal.tx_sink.clone(), driver.hal.invert_log.clone()));
        // normal response frames do get a break sequence
        assert_eq!(invert_log, std::vec![true, false]);

        let response = RdmHeader::decode(&sink).unwrap();
        assert_eq!(response.cc, CommandClass::GetResponse);
        assert_eq!(response.tn, 9);
        assert_eq!(response.port_id, ResponseType::Ack as u8);
        assert_eq!(response.pdl, 19);
        assert_eq!(response.dest_uid, DeviceUid::new(0x0011, 0x2233_4455));
        assert_eq!(response.src_uid, OWN_UID);
    }

    #[test]
    fn response_send_after_window_returns_zero() {
        let shared = installed();
        let mut delay = MockDelay { dmx: &shared };

        // stage a GET_RESPONSE while the 2 ms responder window is long gone
        let response = RdmHeader {
            dest_uid: DeviceUid::new(0x0011, 0x2233_4455),
            src_uid: OWN_UID,
            tn: 1,
            port_id: ResponseType::Ack as u8,
            message_count: 0,
            sub_device: SUB_DEVICE_ROOT,
            cc: CommandClass::GetResponse,
            pid: pid::DEVICE_INFO,
            pdl: 0,
        };
        let size = shared.with(|driver| {
            driver.hal.now = 50_000;
            response.encode(&mut driver.buffer)
        });

        assert_eq!(shared.send(size, &mut delay).unwrap(), 0);
        assert!(!shared.with(|driver| driver.is_sending()));
    }

    #[test]
    fn discovery_spacing_blocks_second_send() {
        let shared = installed();
        let mut delay = MockDelay { dmx: &shared };

        let header = RdmHeader {
            dest_uid: DeviceUid::BROADCAST_ALL,
            src_uid: OWN_UID,
            tn: 0,
            port_id: 1,
            message_count: 0,
            sub_device: SUB_DEVICE_ROOT,
            cc: CommandClass::DiscoveryCommand,
            pid: pid::DISC_UNIQUE_BRANCH,
            pdl: 12,
        };
        let size = shared.with(|driver| {
            driver.buffer[PD_OFFSET..PD_OFFSET + 12].fill(0);
            header.encode(&mut driver.buffer)
        });
        shared.send(size, &mut delay).unwrap();
        complete_tx(&shared);
        let sent_at = shared.with(|driver| driver.last_slot_ts);

        // second frame must not start until 5.8 ms after the probe
        shared.write(0, &[0x00, 1, 2, 3]);
        shared.send(4, &mut delay).unwrap();
        let started = shared.with(|driver| driver.hal.now_us());
        assert!(
            started - sent_at >= 5_800,
            "started after {} us",
            started - sent_at
        );
    }
}
