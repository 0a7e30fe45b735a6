//! Synchronization and Concurrency Support
//!
//! This module provides synchronization primitives and concurrency-safe
//! wrappers for the DMX driver. It includes:
//!
//! - **Primitives** (`primitives`): Low-level synchronization types
//!   - [`CriticalSectionCell`] - ISR-safe interior mutability
//!   - [`AtomicWaker`] - Async waker storage for interrupts
//!
//! - **Shared Wrappers** (`shared`): ISR-safe port wrappers
//!   - [`SharedDmx`] - critical-section protected port with the blocking
//!     `send` / `receive` / `wait_sent` API
//!
//! - **Async Support** (`asynch`): waker-driven `send_async` /
//!   `receive_async` on [`SharedDmx`]
//!
//! # Feature Flags
//!
//! - `critical-section`: Enables this module
//! - `async`: Enables the `asynch` module (also requires `critical-section`)
//!
//! # Example
//!
//! ```ignore
//! use ph_esp32_dmx::sync::SharedDmx;
//!
//! static DMX1: SharedDmxDefault<Uart1Hal> = SharedDmx::new(Uart1Hal::new());
//!
//! fn main() {
//!     DMX1.install(DmxConfig::new()).unwrap();
//!     DMX1.write(0, &[0x00, 255, 128, 0]);
//!     DMX1.send(4, &mut delay).unwrap();
//! }
//!
//! #[interrupt]
//! fn UART1_IRQ() {
//!     DMX1.on_uart_interrupt();
//! }
//! ```

// Primitives module (requires critical-section)
mod primitives;

#[cfg(feature = "async")]
pub use primitives::AtomicWaker;
pub use primitives::CriticalSectionCell;

// Shared wrappers (requires critical-section)
mod shared;

pub use shared::{SharedDmx, SharedDmxDefault, SharedDmxLarge, SharedDmxSmall};

// Async support (requires async feature)
#[cfg(feature = "async")]
pub mod asynch;
