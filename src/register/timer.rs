//! Timer group (TIMG) register operations.
//!
//! Each timer group carries two 64-bit general-purpose timers. The driver
//! uses one as the break/MAB and RDM-deadline alarm and the other as a
//! free-running 1 MHz monotonic clock.

use super::{modify_reg, read_reg, write_reg};

// =============================================================================
// Register Offsets (per timer; unit 1 adds UNIT_STRIDE)
// =============================================================================

const T_CONFIG: usize = 0x00;
const T_LO: usize = 0x04;
const T_HI: usize = 0x08;
const T_UPDATE: usize = 0x0C;
const T_ALARM_LO: usize = 0x10;
const T_ALARM_HI: usize = 0x14;
const T_LOAD_LO: usize = 0x18;
const T_LOAD_HI: usize = 0x1C;
const T_LOAD: usize = 0x20;

/// Byte stride between timer 0 and timer 1 register banks.
const UNIT_STRIDE: usize = 0x24;

/// Interrupt enable / clear registers (group-wide).
const INT_ENA: usize = 0x98;
const INT_CLR: usize = 0xA4;

// T_CONFIG bits
const CONFIG_EN: u32 = 1 << 31;
const CONFIG_INCREASE: u32 = 1 << 30;
const CONFIG_AUTORELOAD: u32 = 1 << 29;
const CONFIG_DIVIDER_SHIFT: u32 = 13;
const CONFIG_LEVEL_INT_EN: u32 = 1 << 11;
const CONFIG_ALARM_EN: u32 = 1 << 10;

/// Prescaler producing a 1 MHz tick from the 80 MHz APB clock.
const DIVIDER_1MHZ: u32 = 80;

/// One timer unit inside a timer group.
///
/// `BASE` is the group base address; `UNIT` selects timer 0 or 1.
pub struct TimgTimer<const BASE: usize, const UNIT: usize>;

impl<const BASE: usize, const UNIT: usize> TimgTimer<BASE, UNIT> {
    const fn reg(offset: usize) -> usize {
        BASE + UNIT * UNIT_STRIDE + offset
    }

    /// Program the prescaler for 1 MHz up-counting and leave the timer
    /// stopped with alarms disabled.
    pub fn init_1mhz() {
        // SAFETY: BASE selects a valid TIMG block for the target chip.
        unsafe {
            write_reg(
                Self::reg(T_CONFIG),
                CONFIG_INCREASE | (DIVIDER_1MHZ << CONFIG_DIVIDER_SHIFT),
            );
        }
    }

    /// Load the 64-bit counter.
    pub fn set_count(value: u64) {
        // SAFETY: BASE selects a valid TIMG block for the target chip.
        unsafe {
            write_reg(Self::reg(T_LOAD_LO), value as u32);
            write_reg(Self::reg(T_LOAD_HI), (value >> 32) as u32);
            // any write latches the load registers into the counter
            write_reg(Self::reg(T_LOAD), 1);
        }
    }

    /// Latch and read the 64-bit counter.
    pub fn count() -> u64 {
        // SAFETY: BASE selects a valid TIMG block for the target chip.
        unsafe {
            write_reg(Self::reg(T_UPDATE), 1);
            let lo = read_reg(Self::reg(T_LO)) as u64;
            let hi = read_reg(Self::reg(T_HI)) as u64;
            (hi << 32) | lo
        }
    }

    /// Program the alarm value and re-arm the alarm.
    pub fn set_alarm(value: u64, auto_reload: bool) {
        // SAFETY: BASE selects a valid TIMG block for the target chip.
        unsafe {
            write_reg(Self::reg(T_ALARM_LO), value as u32);
            write_reg(Self::reg(T_ALARM_HI), (value >> 32) as u32);
            modify_reg(Self::reg(T_CONFIG), |v| {
                let v = if auto_reload {
                    v | CONFIG_AUTORELOAD
                } else {
                    v & !CONFIG_AUTORELOAD
                };
                v | CONFIG_ALARM_EN | CONFIG_LEVEL_INT_EN
            });
            set_int_enabled::<BASE, UNIT>(true);
        }
    }

    /// Start counting.
    pub fn start() {
        // SAFETY: BASE selects a valid TIMG block for the target chip.
        unsafe {
            modify_reg(Self::reg(T_CONFIG), |v| v | CONFIG_EN);
        }
    }

    /// Stop counting and drop any pending alarm.
    pub fn stop() {
        // SAFETY: BASE selects a valid TIMG block for the target chip.
        unsafe {
            modify_reg(Self::reg(T_CONFIG), |v| v & !(CONFIG_EN | CONFIG_ALARM_EN));
            set_int_enabled::<BASE, UNIT>(false);
            clear_interrupt::<BASE, UNIT>();
        }
    }
}

/// Enable or disable the unit's alarm interrupt line.
///
/// # Safety
/// `BASE` must select a valid TIMG block for the target chip.
unsafe fn set_int_enabled<const BASE: usize, const UNIT: usize>(enabled: bool) {
    let bit = 1u32 << UNIT;
    // SAFETY: forwarded from the caller.
    unsafe {
        modify_reg(BASE + INT_ENA, |v| if enabled { v | bit } else { v & !bit });
    }
}

/// Acknowledge the unit's alarm interrupt.
///
/// # Safety
/// `BASE` must select a valid TIMG block for the target chip.
unsafe fn clear_interrupt<const BASE: usize, const UNIT: usize>() {
    // SAFETY: forwarded from the caller.
    unsafe {
        write_reg(BASE + INT_CLR, 1u32 << UNIT);
    }
}

/// Acknowledge the alarm interrupt from the timer ISR.
pub fn ack_alarm<const BASE: usize, const UNIT: usize>() {
    // SAFETY: BASE selects a valid TIMG block for the target chip.
    unsafe {
        clear_interrupt::<BASE, UNIT>();
    }
}
