//! UART register operations and the register-level [`DmxHal`] backend.
//!
//! [`Esp32DmxHal`] binds one UART block to one timer group and implements
//! the [`crate::hal`] traits over raw register access: timer 0 of the
//! group serves the break/MAB and deadline alarms, timer 1 free-runs at
//! 1 MHz as the monotonic clock.

use super::timer::TimgTimer;
use super::{APB_CLK_HZ, TIMG0_BASE, UART0_BASE, UART1_BASE, UART2_BASE, modify_reg, read_reg, write_reg};
use crate::constants::{DMX_BAUD_RATE, RX_FIFO_FULL_THRESHOLD, RX_TIMEOUT_SLOTS};
use crate::hal::{BusClock, BusDirection, BusTimer, DmxUart, EventSet};

// =============================================================================
// Register Offsets
// =============================================================================

const UART_FIFO: usize = 0x00;
const UART_INT_RAW: usize = 0x04;
const UART_INT_ST: usize = 0x08;
const UART_INT_ENA: usize = 0x0C;
const UART_INT_CLR: usize = 0x10;
const UART_CLKDIV: usize = 0x14;
const UART_STATUS: usize = 0x1C;
const UART_CONF0: usize = 0x20;
const UART_CONF1: usize = 0x24;
const UART_RS485_CONF: usize = 0x44;

// =============================================================================
// Interrupt Bits
// =============================================================================

const INT_RXFIFO_FULL: u32 = 1 << 0;
const INT_TXFIFO_EMPTY: u32 = 1 << 1;
const INT_PARITY_ERR: u32 = 1 << 2;
const INT_FRM_ERR: u32 = 1 << 3;
const INT_RXFIFO_OVF: u32 = 1 << 4;
const INT_BRK_DET: u32 = 1 << 7;
const INT_RXFIFO_TOUT: u32 = 1 << 8;
const INT_TX_DONE: u32 = 1 << 14;
const INT_RS485_CLASH: u32 = 1 << 17;

// =============================================================================
// CONF0 Bits
// =============================================================================

const CONF0_BIT_NUM_8: u32 = 0b11 << 2;
const CONF0_STOP_BIT_2: u32 = 0b11 << 4;
const CONF0_SW_RTS: u32 = 1 << 6;
const CONF0_TXD_INV: u32 = 1 << 22;
const CONF0_RXFIFO_RST: u32 = 1 << 17;

// CONF1 fields
const CONF1_RXFIFO_FULL_SHIFT: u32 = 0;
const CONF1_RX_TOUT_SHIFT: u32 = 24;
const CONF1_RX_TOUT_EN: u32 = 1 << 31;

// STATUS fields
const STATUS_RXFIFO_CNT_MASK: u32 = 0xFF;
const STATUS_TXFIFO_CNT_SHIFT: u32 = 16;
const STATUS_TXFIFO_CNT_MASK: u32 = 0xFF;
const STATUS_RXD_LEVEL: u32 = 1 << 30;

// RS485_CONF bits
const RS485_EN: u32 = 1 << 0;
const RS485_RX_DURING_TX: u32 = 1 << 4;

/// Pack the [`EventSet`] causes into the chip's interrupt bit layout.
fn to_hw_bits(events: EventSet) -> u32 {
    let mut bits = 0;
    if events.contains(EventSet::TX_FIFO_EMPTY) {
        bits |= INT_TXFIFO_EMPTY;
    }
    if events.contains(EventSet::TX_DONE) {
        bits |= INT_TX_DONE;
    }
    if events.contains(EventSet::RX_FIFO_FULL) {
        bits |= INT_RXFIFO_FULL;
    }
    if events.contains(EventSet::RX_FIFO_TOUT) {
        bits |= INT_RXFIFO_TOUT;
    }
    if events.contains(EventSet::RX_BREAK) {
        bits |= INT_BRK_DET;
    }
    if events.contains(EventSet::RX_FRAME_ERR) {
        bits |= INT_FRM_ERR;
    }
    if events.contains(EventSet::RX_PARITY_ERR) {
        bits |= INT_PARITY_ERR;
    }
    if events.contains(EventSet::RX_FIFO_OVF) {
        bits |= INT_RXFIFO_OVF;
    }
    if events.contains(EventSet::RS485_COLLISION) {
        bits |= INT_RS485_CLASH;
    }
    bits
}

/// Unpack the chip's interrupt bits into [`EventSet`] causes.
fn from_hw_bits(bits: u32) -> EventSet {
    let mut events = EventSet::NONE;
    if bits & INT_TXFIFO_EMPTY != 0 {
        events |= EventSet::TX_FIFO_EMPTY;
    }
    if bits & INT_TX_DONE != 0 {
        events |= EventSet::TX_DONE;
    }
    if bits & INT_RXFIFO_FULL != 0 {
        events |= EventSet::RX_FIFO_FULL;
    }
    if bits & INT_RXFIFO_TOUT != 0 {
        events |= EventSet::RX_FIFO_TOUT;
    }
    if bits & INT_BRK_DET != 0 {
        events |= EventSet::RX_BREAK;
    }
    if bits & INT_FRM_ERR != 0 {
        events |= EventSet::RX_FRAME_ERR;
    }
    if bits & INT_PARITY_ERR != 0 {
        events |= EventSet::RX_PARITY_ERR;
    }
    if bits & INT_RXFIFO_OVF != 0 {
        events |= EventSet::RX_FIFO_OVF;
    }
    if bits & INT_RS485_CLASH != 0 {
        events |= EventSet::RS485_COLLISION;
    }
    events
}

/// Register-level HAL for one UART port.
///
/// `UART_BASE` selects the UART block, `TIMG_BASE` the timer group whose
/// timer 0 becomes the driver's alarm timer and whose timer 1 free-runs as
/// the microsecond clock.
///
/// The type is a unit struct: constructing a second value for the same
/// base addresses aliases the hardware, so keep one per port, owned by its
/// `SharedDmx` static.
pub struct Esp32DmxHal<const UART_BASE: usize, const TIMG_BASE: usize>;

impl<const UART_BASE: usize, const TIMG_BASE: usize> Esp32DmxHal<UART_BASE, TIMG_BASE> {
    /// Create the HAL value. Const-compatible.
    pub const fn new() -> Self {
        Self
    }

    const fn reg(offset: usize) -> usize {
        UART_BASE + offset
    }
}

impl<const UART_BASE: usize, const TIMG_BASE: usize> Default for Esp32DmxHal<UART_BASE, TIMG_BASE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const UART_BASE: usize, const TIMG_BASE: usize> DmxUart for Esp32DmxHal<UART_BASE, TIMG_BASE> {
    fn init(&mut self) {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        unsafe {
            // 8 data bits, 2 stop bits, no parity; RS-485 mode with the
            // receiver kept live during TX so collisions are observable.
            write_reg(Self::reg(UART_CONF0), CONF0_BIT_NUM_8 | CONF0_STOP_BIT_2);
            write_reg(Self::reg(UART_RS485_CONF), RS485_EN | RS485_RX_DURING_TX);
            write_reg(
                Self::reg(UART_CONF1),
                ((RX_FIFO_FULL_THRESHOLD as u32) << CONF1_RXFIFO_FULL_SHIFT)
                    | ((RX_TIMEOUT_SLOTS as u32) << CONF1_RX_TOUT_SHIFT)
                    | CONF1_RX_TOUT_EN,
            );
            write_reg(Self::reg(UART_INT_ENA), 0);
            write_reg(Self::reg(UART_INT_CLR), u32::MAX);
        }
        self.set_baud(DMX_BAUD_RATE);

        TimgTimer::<TIMG_BASE, 0>::init_1mhz();
        TimgTimer::<TIMG_BASE, 1>::init_1mhz();
        TimgTimer::<TIMG_BASE, 1>::set_count(0);
        TimgTimer::<TIMG_BASE, 1>::start();
    }

    fn set_baud(&mut self, baud: u32) {
        let divider = APB_CLK_HZ / baud;
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        unsafe {
            write_reg(Self::reg(UART_CLKDIV), divider);
        }
    }

    fn events(&mut self) -> EventSet {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        let bits = unsafe { read_reg(Self::reg(UART_INT_ST)) };
        from_hw_bits(bits)
    }

    fn enable_events(&mut self, events: EventSet) {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        unsafe {
            modify_reg(Self::reg(UART_INT_ENA), |v| v | to_hw_bits(events));
        }
    }

    fn disable_events(&mut self, events: EventSet) {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        unsafe {
            modify_reg(Self::reg(UART_INT_ENA), |v| v & !to_hw_bits(events));
        }
    }

    fn clear_events(&mut self, events: EventSet) {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        unsafe {
            write_reg(Self::reg(UART_INT_CLR), to_hw_bits(events));
        }
    }

    fn rxfifo_len(&mut self) -> usize {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        let status = unsafe { read_reg(Self::reg(UART_STATUS)) };
        (status & STATUS_RXFIFO_CNT_MASK) as usize
    }

    fn txfifo_len(&mut self) -> usize {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        let status = unsafe { read_reg(Self::reg(UART_STATUS)) };
        ((status >> STATUS_TXFIFO_CNT_SHIFT) & STATUS_TXFIFO_CNT_MASK) as usize
    }

    fn read_rxfifo(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.rxfifo_len());
        for slot in dst.iter_mut().take(n) {
            // SAFETY: UART_BASE selects a valid UART block for the target chip.
            *slot = unsafe { read_reg(Self::reg(UART_FIFO)) } as u8;
        }
        n
    }

    fn write_txfifo(&mut self, src: &[u8]) -> usize {
        let space = crate::constants::UART_TX_FIFO_DEPTH - self.txfifo_len();
        let n = src.len().min(space);
        for &byte in &src[..n] {
            // SAFETY: UART_BASE selects a valid UART block for the target chip.
            unsafe {
                write_reg(Self::reg(UART_FIFO), byte as u32);
            }
        }
        n
    }

    fn rxfifo_reset(&mut self) {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        unsafe {
            modify_reg(Self::reg(UART_CONF0), |v| v | CONF0_RXFIFO_RST);
            modify_reg(Self::reg(UART_CONF0), |v| v & !CONF0_RXFIFO_RST);
        }
    }

    fn invert_tx(&mut self, invert: bool) {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        unsafe {
            modify_reg(Self::reg(UART_CONF0), |v| {
                if invert {
                    v | CONF0_TXD_INV
                } else {
                    v & !CONF0_TXD_INV
                }
            });
        }
    }

    fn bus_direction(&self) -> BusDirection {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        let conf0 = unsafe { read_reg(Self::reg(UART_CONF0)) };
        // RTS is active-low on the transceiver: SW_RTS set drives the bus.
        if conf0 & CONF0_SW_RTS != 0 {
            BusDirection::Transmit
        } else {
            BusDirection::Receive
        }
    }

    fn set_bus_direction(&mut self, direction: BusDirection) {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        unsafe {
            modify_reg(Self::reg(UART_CONF0), |v| match direction {
                BusDirection::Transmit => v | CONF0_SW_RTS,
                BusDirection::Receive => v & !CONF0_SW_RTS,
            });
        }
    }

    fn rx_level(&self) -> bool {
        // SAFETY: UART_BASE selects a valid UART block for the target chip.
        let status = unsafe { read_reg(Self::reg(UART_STATUS)) };
        status & STATUS_RXD_LEVEL != 0
    }
}

impl<const UART_BASE: usize, const TIMG_BASE: usize> BusTimer for Esp32DmxHal<UART_BASE, TIMG_BASE> {
    fn set_count(&mut self, count_us: u64) {
        TimgTimer::<TIMG_BASE, 0>::set_count(count_us);
    }

    fn set_alarm(&mut self, alarm_us: u64, auto_reload: bool) {
        TimgTimer::<TIMG_BASE, 0>::set_alarm(alarm_us, auto_reload);
    }

    fn start(&mut self) {
        TimgTimer::<TIMG_BASE, 0>::start();
    }

    fn stop(&mut self) {
        TimgTimer::<TIMG_BASE, 0>::stop();
    }
}

impl<const UART_BASE: usize, const TIMG_BASE: usize> BusClock for Esp32DmxHal<UART_BASE, TIMG_BASE> {
    fn now_us(&self) -> u64 {
        TimgTimer::<TIMG_BASE, 1>::count()
    }
}

/// UART0 backed by timer group 0.
pub type Uart0Dmx = Esp32DmxHal<UART0_BASE, TIMG0_BASE>;

/// UART1 backed by timer group 0.
pub type Uart1Dmx = Esp32DmxHal<UART1_BASE, TIMG0_BASE>;

/// UART2 backed by timer group 0.
pub type Uart2Dmx = Esp32DmxHal<UART2_BASE, TIMG0_BASE>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bit_mapping_round_trips() {
        let all = EventSet::RX_ALL | EventSet::TX_ALL;
        assert_eq!(from_hw_bits(to_hw_bits(all)), all);

        let some = EventSet::RX_BREAK | EventSet::RS485_COLLISION;
        assert_eq!(from_hw_bits(to_hw_bits(some)), some);
    }

    #[test]
    fn event_bits_match_hardware_layout() {
        assert_eq!(to_hw_bits(EventSet::RX_FIFO_FULL), 1 << 0);
        assert_eq!(to_hw_bits(EventSet::TX_FIFO_EMPTY), 1 << 1);
        assert_eq!(to_hw_bits(EventSet::RX_BREAK), 1 << 7);
        assert_eq!(to_hw_bits(EventSet::RX_FIFO_TOUT), 1 << 8);
        assert_eq!(to_hw_bits(EventSet::TX_DONE), 1 << 14);
        assert_eq!(to_hw_bits(EventSet::RS485_COLLISION), 1 << 17);
    }

    #[test]
    fn baud_divider_for_dmx() {
        assert_eq!(APB_CLK_HZ / DMX_BAUD_RATE, 320);
    }
}
