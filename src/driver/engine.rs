//! Interrupt-side bus engine.
//!
//! These methods are the UART and timer interrupt bodies. The application
//! registers two ISRs with its runtime and forwards them here through the
//! port's [`SharedDmx`](crate::sync::SharedDmx) critical section:
//!
//! ```ignore
//! #[handler]
//! fn uart1_isr() {
//!     let wake = DMX1.with(|d| d.on_uart_event());
//!     DMX1.notify(wake);
//! }
//! ```
//!
//! Nothing here blocks or allocates. Faults are stamped onto the packet
//! record and surfaced when the caller takes the packet.

use super::flags::DriverFlags;
use super::port::{DmxDriver, TimerRole};
use crate::constants::{DMX_MAX_PACKET_SIZE, RDM_CHECKSUM_SIZE, RDM_HEADER_SIZE};
use crate::error::IoError;
use crate::hal::{BusClock, BusTimer, DmxHal, DmxUart, EventSet};
use crate::rdm::types::{SC_RDM, SC_SUB_MESSAGE};

/// What an interrupt body observed, so the ISR glue can wake waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineWake {
    /// The outbound frame was fully accepted (or dropped by a collision).
    pub tx_complete: bool,
    /// An inbound frame completed or the receive deadline fired.
    pub rx_complete: bool,
}

impl EngineWake {
    /// `true` when anything happened that a waiter cares about.
    #[inline(always)]
    #[must_use]
    pub const fn any(&self) -> bool {
        self.tx_complete || self.rx_complete
    }
}

impl<H: DmxHal, const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize>
    DmxDriver<H, MAX_PIDS, PD_SIZE, QUEUE>
{
    // =========================================================================
    // UART Interrupt
    // =========================================================================

    /// UART interrupt body. Call from the port's UART ISR.
    pub fn on_uart_event(&mut self) -> EngineWake {
        let events = self.hal.events();
        self.hal.clear_events(events);
        let mut wake = EngineWake::default();

        if events.is_empty() {
            return wake;
        }

        // --- TX path -------------------------------------------------------

        if events.contains(EventSet::RS485_COLLISION)
            && self.flags.intersects(DriverFlags::IS_SENDING)
        {
            // Frame is lost on the wire; the next send observes the flag.
            self.hal.disable_events(EventSet::TX_ALL);
            self.flags.set(DriverFlags::COLLIDED);
            self.flags
                .clear(DriverFlags::IS_SENDING | DriverFlags::IS_IN_BREAK);
            wake.tx_complete = true;
            #[cfg(feature = "defmt")]
            defmt::warn!("rs485 collision during send");
        }

        if events.contains(EventSet::TX_FIFO_EMPTY)
            && self.flags.intersects(DriverFlags::IS_SENDING)
        {
            self.write_tx_chunk();
            if self.head as usize >= self.tx_size {
                // Every byte is accepted; the buffer is reusable even
                // though the shifter is still draining the tail.
                self.hal.disable_events(EventSet::TX_FIFO_EMPTY);
                self.flags.clear(DriverFlags::IS_SENDING);
                self.flags.set(DriverFlags::SENT_LAST);
                self.last_slot_ts = self.hal.now_us();
                wake.tx_complete = true;
            }
        }

        if events.contains(EventSet::TX_DONE) {
            // Last stop bit on the wire: the accurate byte boundary.
            self.hal.disable_events(EventSet::TX_DONE);
            self.last_slot_ts = self.hal.now_us();
        }

        // --- RX path -------------------------------------------------------

        if events.contains(EventSet::RX_BREAK) {
            if self.head > 0 {
                // A new break delimits the previous frame. The newest
                // frame wins if the caller never took the old one.
                self.drain_rx();
                self.finalize_rx(IoError::Ok);
                wake.rx_complete = true;
            }
            self.hal.rxfifo_reset();
            self.head = 0;
            self.rx_err = IoError::Ok;
        }

        if events.intersects(EventSet::RX_FIFO_FULL | EventSet::RX_FIFO_TOUT) {
            if self.head < 0 {
                // Mid-frame join: discard until a break aligns us.
                self.hal.rxfifo_reset();
            } else {
                self.drain_rx();
                let head = self.head.max(0) as usize;
                if head >= self.expected_rx_size()
                    || (events.contains(EventSet::RX_FIFO_TOUT) && head > 0)
                {
                    self.finalize_rx(IoError::Ok);
                    wake.rx_complete = true;
                }
            }
        }

        if events.contains(EventSet::RX_FIFO_OVF) {
            self.hal.rxfifo_reset();
            if self.head >= 0 {
                self.finalize_rx(IoError::DataOverflow);
                wake.rx_complete = true;
            }
        }

        if events.intersects(EventSet::RX_FRAME_ERR | EventSet::RX_PARITY_ERR) {
            if self.head >= 0 {
                self.drain_rx();
                self.hal.rxfifo_reset();
                self.finalize_rx(IoError::ImproperSlot);
                wake.rx_complete = true;
            } else {
                self.hal.rxfifo_reset();
            }
        }

        wake
    }

    // =========================================================================
    // Timer Interrupt
    // =========================================================================

    /// Hardware timer alarm body. Call from the timer ISR.
    ///
    /// Advances the break/MAB reset sequence on TX, or cuts a receive wait
    /// at the RDM response-lost deadline.
    pub fn on_timer_alarm(&mut self) -> EngineWake {
        let mut wake = EngineWake::default();

        match self.timer_role {
            TimerRole::BreakSequence => match self.break_step {
                1 => {
                    // Break is over: release the line for the MAB.
                    self.hal.invert_tx(false);
                    self.hal.set_count(0);
                    self.hal.set_alarm(self.config.mab_len_us as u64, false);
                    self.hal.start();
                    self.break_step = 2;
                }
                _ => {
                    // MAB is over: hand the frame to the UART.
                    self.hal.stop();
                    self.timer_role = TimerRole::Idle;
                    self.break_step = 0;
                    self.flags
                        .clear(DriverFlags::IS_IN_BREAK | DriverFlags::TIMER_RUNNING);
                    self.write_tx_chunk();
                    self.hal.clear_events(EventSet::TX_ALL);
                    self.hal.enable_events(EventSet::TX_ALL);
                }
            },
            TimerRole::RxTimeout => {
                self.hal.stop();
                self.timer_role = TimerRole::Idle;
                self.flags.clear(DriverFlags::TIMER_RUNNING);
                // The waiter re-checks the deadline against the clock; this
                // exists to cut the wait for notification-driven waiters.
                wake.rx_complete = true;
            }
            TimerRole::TxSpacing => {
                self.hal.stop();
                self.timer_role = TimerRole::Idle;
                self.flags.clear(DriverFlags::TIMER_RUNNING);
                wake.tx_complete = true;
            }
            TimerRole::Idle => {
                self.hal.stop();
            }
        }

        wake
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Push the next chunk of `buffer[head..tx_size]` into the TX FIFO.
    pub(crate) fn write_tx_chunk(&mut self) {
        let head = self.head.max(0) as usize;
        if head >= self.tx_size {
            return;
        }
        let n = self.hal.write_txfifo(&self.buffer[head..self.tx_size]);
        self.head = (head + n) as i32;
    }

    /// Drain the RX FIFO into `buffer[head..]`, truncating at the buffer
    /// end and stamping `PacketSize` when bytes will not fit.
    fn drain_rx(&mut self) {
        let head = self.head.max(0) as usize;
        if head < DMX_MAX_PACKET_SIZE {
            let n = self.hal.read_rxfifo(&mut self.buffer[head..DMX_MAX_PACKET_SIZE]);
            self.head = (head + n) as i32;
        }
        if self.hal.rxfifo_len() > 0 && self.head as usize >= DMX_MAX_PACKET_SIZE {
            self.hal.rxfifo_reset();
            self.rx_err = IoError::PacketSize;
        }
    }

    /// Frame size at which RX completes without waiting for the next break.
    fn expected_rx_size(&self) -> usize {
        if self.config.rx_expected > 0 {
            return self.config.rx_expected;
        }
        let head = self.head.max(0) as usize;
        if head >= RDM_HEADER_SIZE
            && self.buffer[0] == SC_RDM
            && self.buffer[1] == SC_SUB_MESSAGE
        {
            return (self.buffer[2] as usize + RDM_CHECKSUM_SIZE).min(DMX_MAX_PACKET_SIZE);
        }
        DMX_MAX_PACKET_SIZE
    }

    /// Complete the inbound frame: record its size and fault, stamp the
    /// byte-boundary timestamp, and mark data available.
    fn finalize_rx(&mut self, err: IoError) {
        self.rx_size = self.head.max(0) as usize;
        if self.rx_err.is_ok() {
            self.rx_err = err;
        }
        self.flags.set(DriverFlags::HAS_DATA);
        self.last_slot_ts = self.hal.now_us();

        // A frame landing after our request means the spacing rules for
        // an unanswered request no longer apply.
        if self.flags.intersects(DriverFlags::SENT_LAST) {
            self.responded = true;
            self.flags.clear(DriverFlags::SENT_LAST);
        }
    }
}
