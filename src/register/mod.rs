//! Memory-mapped register definitions for the ESP32 UART and timer group.
//!
//! This module provides the register-level backend implementing the
//! [`crate::hal`] traits for the on-chip UARTs. All register access is
//! volatile to ensure proper hardware interaction.

pub mod timer;
pub mod uart;

pub use uart::{Esp32DmxHal, Uart0Dmx, Uart1Dmx, Uart2Dmx};

// ESP32 and ESP32-S3 are mutually exclusive; if both are enabled, prefer ESP32

/// UART0 register block base address
#[cfg(any(feature = "esp32", not(feature = "esp32s3")))]
pub const UART0_BASE: usize = 0x3FF4_0000;

/// UART1 register block base address
#[cfg(any(feature = "esp32", not(feature = "esp32s3")))]
pub const UART1_BASE: usize = 0x3FF5_0000;

/// UART2 register block base address
#[cfg(any(feature = "esp32", not(feature = "esp32s3")))]
pub const UART2_BASE: usize = 0x3FF6_E000;

/// Timer group 0 register block base address
#[cfg(any(feature = "esp32", not(feature = "esp32s3")))]
pub const TIMG0_BASE: usize = 0x3FF5_F000;

/// Timer group 1 register block base address
#[cfg(any(feature = "esp32", not(feature = "esp32s3")))]
pub const TIMG1_BASE: usize = 0x3FF6_0000;

/// UART0 register block base address (ESP32-S3)
#[cfg(all(feature = "esp32s3", not(feature = "esp32")))]
pub const UART0_BASE: usize = 0x6000_0000;

/// UART1 register block base address (ESP32-S3)
#[cfg(all(feature = "esp32s3", not(feature = "esp32")))]
pub const UART1_BASE: usize = 0x6001_0000;

/// UART2 register block base address (ESP32-S3)
#[cfg(all(feature = "esp32s3", not(feature = "esp32")))]
pub const UART2_BASE: usize = 0x6002_E000;

/// Timer group 0 register block base address (ESP32-S3)
#[cfg(all(feature = "esp32s3", not(feature = "esp32")))]
pub const TIMG0_BASE: usize = 0x6001_F000;

/// Timer group 1 register block base address (ESP32-S3)
#[cfg(all(feature = "esp32s3", not(feature = "esp32")))]
pub const TIMG1_BASE: usize = 0x6002_0000;

/// APB clock feeding the UART baud generator and the timer prescalers.
pub const APB_CLK_HZ: u32 = 80_000_000;

/// Read a 32-bit register at the given address
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn read_reg(addr: usize) -> u32 {
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

/// Write a 32-bit value to a register at the given address
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn write_reg(addr: usize, value: u32) {
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

/// Modify a register using a read-modify-write operation
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn modify_reg<F>(addr: usize, f: F)
where
    F: FnOnce(u32) -> u32,
{
    // SAFETY: caller guarantees address validity
    let value = unsafe { read_reg(addr) };
    unsafe { write_reg(addr, f(value)) }
}

/// Set bits in a register (read-modify-write)
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn set_bits(addr: usize, bits: u32) {
    // SAFETY: caller guarantees address validity
    unsafe { modify_reg(addr, |v| v | bits) }
}

/// Clear bits in a register (read-modify-write)
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn clear_bits(addr: usize, bits: u32) {
    // SAFETY: caller guarantees address validity
    unsafe { modify_reg(addr, |v| v & !bits) }
}
