//! Scripted HAL double for host tests.
//!
//! Records every side effect the engine performs (FIFO writes, direction
//! flips, line inversion, timer programming) and lets tests inject RX bytes
//! and interrupt causes, then step time by hand.

extern crate std;

use std::collections::VecDeque;
use std::vec::Vec;

use super::{BusClock, BusDirection, BusTimer, DmxUart, EventSet};
use crate::constants::UART_TX_FIFO_DEPTH;

/// Test double implementing [`DmxUart`] + [`BusTimer`] + [`BusClock`].
pub(crate) struct MockHal {
    /// Manually advanced microsecond clock.
    pub now: u64,
    /// Currently enabled interrupt causes.
    pub enabled: EventSet,
    /// Raw pending causes (unmasked).
    pub pending: EventSet,
    /// Bytes waiting in the RX FIFO.
    pub rx_fifo: VecDeque<u8>,
    /// Every byte the engine pushed to the TX FIFO, in order.
    pub tx_sink: Vec<u8>,
    /// Bytes currently occupying the TX FIFO.
    pub tx_fifo_level: usize,
    /// TX line inversion state.
    pub tx_inverted: bool,
    /// Chronological log of inversion changes.
    pub invert_log: Vec<bool>,
    /// Current RS-485 direction.
    pub direction: BusDirection,
    /// Chronological log of direction changes.
    pub direction_log: Vec<BusDirection>,
    /// Instantaneous RX line level.
    pub rx_line: bool,
    /// Programmed alarm value and auto-reload flag.
    pub timer_alarm: Option<(u64, bool)>,
    /// Chronological log of programmed alarm values.
    pub alarm_log: Vec<u64>,
    /// Whether the timer is counting.
    pub timer_running: bool,
    /// Current timer count.
    pub timer_count: u64,
    /// Number of RX FIFO resets.
    pub rxfifo_resets: usize,
    /// Last configured baud rate.
    pub baud: u32,
    /// Whether `init` ran.
    pub inited: bool,
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            now: 0,
            enabled: EventSet::NONE,
            pending: EventSet::NONE,
            rx_fifo: VecDeque::new(),
            tx_sink: Vec::new(),
            tx_fifo_level: 0,
            tx_inverted: false,
            invert_log: Vec::new(),
            direction: BusDirection::Receive,
            direction_log: Vec::new(),
            rx_line: true,
            timer_alarm: None,
            alarm_log: Vec::new(),
            timer_running: false,
            timer_count: 0,
            rxfifo_resets: 0,
            baud: 0,
            inited: false,
        }
    }

    /// Mark interrupt causes pending, as hardware would.
    pub fn raise(&mut self, events: EventSet) {
        self.pending |= events;
    }

    /// Queue bytes on the RX FIFO without raising any cause.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx_fifo.extend(bytes.iter().copied());
    }

    /// Simulate the shifter draining the TX FIFO onto the wire.
    pub fn drain_tx_fifo(&mut self) {
        self.tx_fifo_level = 0;
    }

    /// Advance the clock (and a running timer) by `us`.
    pub fn advance(&mut self, us: u64) {
        self.now += us;
        if self.timer_running {
            self.timer_count += us;
        }
    }

    /// `true` once a running timer has reached its alarm.
    pub fn alarm_due(&self) -> bool {
        match self.timer_alarm {
            Some((alarm, _)) => self.timer_running && self.timer_count >= alarm,
            None => false,
        }
    }
}

impl DmxUart for MockHal {
    fn init(&mut self) {
        self.inited = true;
        self.baud = crate::constants::DMX_BAUD_RATE;
        self.enabled = EventSet::NONE;
        self.pending = EventSet::NONE;
    }

    fn set_baud(&mut self, baud: u32) {
        self.baud = baud;
    }

    fn events(&mut self) -> EventSet {
        self.pending.intersection(self.enabled)
    }

    fn enable_events(&mut self, events: EventSet) {
        self.enabled |= events;
    }

    fn disable_events(&mut self, events: EventSet) {
        self.enabled = self.enabled.difference(events);
    }

    fn clear_events(&mut self, events: EventSet) {
        self.pending = self.pending.difference(events);
    }

    fn rxfifo_len(&mut self) -> usize {
        self.rx_fifo.len()
    }

    fn txfifo_len(&mut self) -> usize {
        self.tx_fifo_level
    }

    fn read_rxfifo(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.rx_fifo.len());
        for slot in dst.iter_mut().take(n) {
            *slot = self.rx_fifo.pop_front().unwrap();
        }
        n
    }

    fn write_txfifo(&mut self, src: &[u8]) -> usize {
        let space = UART_TX_FIFO_DEPTH - self.tx_fifo_level;
        let n = src.len().min(space);
        self.tx_sink.extend_from_slice(&src[..n]);
        self.tx_fifo_level += n;
        n
    }

    fn rxfifo_reset(&mut self) {
        self.rx_fifo.clear();
        self.rxfifo_resets += 1;
    }

    fn invert_tx(&mut self, invert: bool) {
        self.tx_inverted = invert;
        self.invert_log.push(invert);
    }

    fn bus_direction(&self) -> BusDirection {
        self.direction
    }

    fn set_bus_direction(&mut self, direction: BusDirection) {
        self.direction = direction;
        self.direction_log.push(direction);
    }

    fn rx_level(&self) -> bool {
        self.rx_line
    }
}

impl BusTimer for MockHal {
    fn set_count(&mut self, count_us: u64) {
        self.timer_count = count_us;
    }

    fn set_alarm(&mut self, alarm_us: u64, auto_reload: bool) {
        self.timer_alarm = Some((alarm_us, auto_reload));
        self.alarm_log.push(alarm_us);
    }

    fn start(&mut self) {
        self.timer_running = true;
    }

    fn stop(&mut self) {
        self.timer_running = false;
    }
}

impl BusClock for MockHal {
    fn now_us(&self) -> u64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_masked_by_enable_set() {
        let mut hal = MockHal::new();
        hal.raise(EventSet::RX_BREAK | EventSet::TX_DONE);
        assert!(hal.events().is_empty());

        hal.enable_events(EventSet::RX_BREAK);
        assert_eq!(hal.events(), EventSet::RX_BREAK);
    }

    #[test]
    fn clear_drops_pending_cause() {
        let mut hal = MockHal::new();
        hal.enable_events(EventSet::RX_BREAK);
        hal.raise(EventSet::RX_BREAK);
        hal.clear_events(EventSet::RX_BREAK);
        assert!(hal.events().is_empty());
    }

    #[test]
    fn tx_fifo_respects_depth() {
        let mut hal = MockHal::new();
        let big = [0xAAu8; 200];
        let accepted = hal.write_txfifo(&big);
        assert_eq!(accepted, UART_TX_FIFO_DEPTH);
        assert_eq!(hal.txfifo_len(), UART_TX_FIFO_DEPTH);

        hal.drain_tx_fifo();
        assert_eq!(hal.write_txfifo(&big[accepted..]), 200 - accepted);
    }

    #[test]
    fn rx_fifo_round_trip() {
        let mut hal = MockHal::new();
        hal.push_rx(&[1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(hal.read_rxfifo(&mut buf), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(hal.rxfifo_len(), 0);
    }

    #[test]
    fn timer_counts_only_while_running() {
        let mut hal = MockHal::new();
        hal.set_count(0);
        hal.set_alarm(100, false);
        hal.advance(50);
        assert!(!hal.alarm_due());

        hal.start();
        hal.advance(100);
        assert!(hal.alarm_due());

        hal.stop();
        assert!(!hal.alarm_due());
    }
}
