//! Hardware Abstraction Layer
//!
//! This module defines the seam between the bus engine and the chip. The
//! engine is written entirely against three small traits:
//!
//! - [`DmxUart`]: register-level UART operations (FIFOs, interrupt mask,
//!   line inversion, RS-485 direction)
//! - [`BusTimer`]: a one-shot/periodic hardware timer with an alarm
//! - [`BusClock`]: a monotonic microsecond clock
//!
//! The [`DmxHal`] umbrella trait bundles all three; the register backend in
//! [`crate::register`] implements it for each on-chip UART, and the test
//! suite drives the engine through a scripted mock.
//!
//! # Delay Integration
//!
//! Blocking calls use `embedded_hal::delay::DelayNs` directly. Pass any
//! delay implementation from your HAL (e.g., `esp_hal::delay::Delay`).

pub mod event;
#[cfg(test)]
pub(crate) mod mock;

pub use event::EventSet;

/// RS-485 transceiver direction.
///
/// Maps to the RTS line: level 0 drives the bus, level 1 listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusDirection {
    /// Driver enabled; the port owns the bus.
    Transmit,
    /// Driver released; the port listens.
    #[default]
    Receive,
}

/// Register-level UART operations consumed by the bus engine.
///
/// Implementations must be callable from interrupt context: no blocking, no
/// allocation, no locks. All methods operate on one UART port; the port
/// identity is the implementing type.
pub trait DmxUart {
    /// One-time port setup: 250 kbit/s, 8N2, FIFO thresholds, all
    /// interrupt causes disabled and cleared.
    fn init(&mut self);

    /// Change the wire baud rate.
    fn set_baud(&mut self, baud: u32);

    /// Pending interrupt causes, masked by the current enable set.
    fn events(&mut self) -> EventSet;

    /// Enable interrupt causes; causes outside `events` are unaffected.
    fn enable_events(&mut self, events: EventSet);

    /// Disable interrupt causes; causes outside `events` are unaffected.
    fn disable_events(&mut self, events: EventSet);

    /// Acknowledge (clear) pending interrupt causes.
    fn clear_events(&mut self, events: EventSet);

    /// Number of bytes waiting in the RX FIFO.
    fn rxfifo_len(&mut self) -> usize;

    /// Number of bytes occupying the TX FIFO.
    fn txfifo_len(&mut self) -> usize;

    /// Drain up to `dst.len()` bytes from the RX FIFO. Returns bytes read.
    fn read_rxfifo(&mut self, dst: &mut [u8]) -> usize;

    /// Push up to `src.len()` bytes into the TX FIFO. Returns bytes
    /// accepted; the remainder must be retried after TX-empty.
    fn write_txfifo(&mut self, src: &[u8]) -> usize;

    /// Discard everything in the RX FIFO.
    fn rxfifo_reset(&mut self);

    /// Invert the TX line. Inverted-and-idle reads as a break on the wire.
    fn invert_tx(&mut self, invert: bool);

    /// Current RS-485 transceiver direction (the RTS level).
    fn bus_direction(&self) -> BusDirection;

    /// Drive the RS-485 transceiver direction (the RTS level).
    fn set_bus_direction(&mut self, direction: BusDirection);

    /// Instantaneous logic level of the RX line.
    fn rx_level(&self) -> bool;
}

/// One-shot/periodic hardware timer driving the break/MAB sequence and the
/// RDM early-timeout alarm.
///
/// The timer counts microseconds from [`set_count`](Self::set_count) and
/// fires its interrupt when the count reaches the programmed alarm.
pub trait BusTimer {
    /// Load the counter.
    fn set_count(&mut self, count_us: u64);

    /// Program the alarm. With `auto_reload` the counter restarts from zero
    /// at each alarm; otherwise the timer needs a new
    /// [`start`](Self::start).
    fn set_alarm(&mut self, alarm_us: u64, auto_reload: bool);

    /// Start counting.
    fn start(&mut self);

    /// Stop counting. Pending alarms are dropped.
    fn stop(&mut self);
}

/// Monotonic microsecond clock.
///
/// All RDM spacing and timeout windows are measured against this clock; it
/// must never go backwards and must keep counting in interrupt context.
pub trait BusClock {
    /// Microseconds since boot.
    fn now_us(&self) -> u64;
}

/// Everything the driver needs from the hardware, in one bound.
pub trait DmxHal: DmxUart + BusTimer + BusClock {}

impl<T: DmxUart + BusTimer + BusClock> DmxHal for T {}
