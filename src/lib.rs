//! ESP32 DMX512/RDM Driver
//!
//! A `no_std`, `no_alloc` Rust implementation of a DMX512 (ANSI E1.11) and
//! RDM (ANSI E1.20) bus driver for the ESP32's UART peripherals over an
//! RS-485 transceiver.
//!
//! # Architecture
//!
//! The driver is organized into four layers:
//!
//! 1. **Driver Layer** ([`driver`]): Per-port state, slot I/O, and the bus
//!    engine split into caller-side and interrupt-side halves
//! 2. **RDM Layer** ([`rdm`]): Wire codec, parameter store, and responder
//!    dispatch
//! 3. **Sync Layer** ([`sync`]): ISR-safe [`SharedDmx`] wrapper carrying
//!    the blocking (and optionally async) `send`/`receive` API
//! 4. **HAL Layer** ([`hal`]): Traits the engine is written against, with
//!    the register-level backend in [`register`]
//!
//! ## Standard Compliance
//!
//! - **ANSI E1.11 (DMX512-A)**: 250 kbit/s 8N2 framing, break and
//!   mark-after-break shaping, 513-octet packets
//! - **ANSI E1.20 (RDM)**: message codec and checksum, responder dispatch,
//!   discovery with preamble-framed responses, inter-packet spacing and
//!   response-window timing
//! - **ESP32-specific**: UART and timer-group register layout
//!
//! # Features
//!
//! - `esp32` (default): Target the original ESP32
//! - `esp32s3`: Target the ESP32-S3
//! - `rdm` (default): RDM responder layer (parameter store + dispatcher)
//! - `critical-section` (default): ISR-safe [`SharedDmx`] wrapper
//! - `async`: Async/await `send_async`/`receive_async` with wakers
//! - `sniffer`: Break/MAB edge-timing sniffer
//! - `defmt`: Enable defmt formatting for driver types
//! - `log`: Task-side diagnostics via the `log` facade
//!
//! # Example
//!
//! ```ignore
//! use ph_esp32_dmx::{DmxConfig, DeviceUid, PacketInfo};
//! use ph_esp32_dmx::register::Uart1Dmx;
//! use ph_esp32_dmx::sync::{SharedDmx, SharedDmxDefault};
//!
//! static DMX1: SharedDmxDefault<Uart1Dmx> = SharedDmx::new(Uart1Dmx::new());
//!
//! // Wire the interrupt handlers to the driver (esp-hal shown).
//! #[handler]
//! fn uart1_isr() {
//!     DMX1.on_uart_interrupt();
//! }
//! #[handler]
//! fn timg0_t0_isr() {
//!     ph_esp32_dmx::register::timer::ack_alarm::<{ ph_esp32_dmx::register::TIMG0_BASE }, 0>();
//!     DMX1.on_timer_interrupt();
//! }
//!
//! let mut delay = /* your DelayNs implementation */;
//!
//! DMX1.install(
//!     DmxConfig::new().with_uid(DeviceUid::new(0x05E0, 0x0000_0001)),
//! )?;
//!
//! // Transmit one DMX frame
//! DMX1.write(0, &[0x00, 255, 128, 0]);
//! DMX1.send(4, &mut delay)?;
//! DMX1.wait_sent(100_000, &mut delay);
//!
//! // Respond to RDM: receive dispatches requests automatically
//! let mut packet = PacketInfo::empty();
//! DMX1.receive(&mut packet, 1_000_000, &mut delay)?;
//! ```
//!
//! # Memory Requirements
//!
//! With default capacities (24 parameters, 320-byte slab, 16-deep queue)
//! one port costs a little over 1.5 KB of SRAM, dominated by the 513-octet
//! packet buffer and the parameter slab.

#![cfg_attr(docsrs, doc(cfg_hide(feature = "esp32s3")))]
#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in clippy.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]
#[cfg(all(feature = "esp32", feature = "esp32s3"))]
compile_error!("Features 'esp32' and 'esp32s3' are mutually exclusive.");

#[cfg(not(any(feature = "esp32", feature = "esp32s3")))]
compile_error!("Either feature 'esp32' or 'esp32s3' must be enabled. The default is 'esp32'.");

// =============================================================================
// Modules
// =============================================================================

pub mod constants;
pub mod driver;
pub mod error;
pub mod hal;
pub mod rdm;

#[cfg(any(feature = "esp32", feature = "esp32s3"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "esp32", feature = "esp32s3"))))]
pub mod register;

#[cfg(feature = "critical-section")]
#[cfg_attr(docsrs, doc(cfg(feature = "critical-section")))]
pub mod sync;

#[cfg(feature = "sniffer")]
#[cfg_attr(docsrs, doc(cfg(feature = "sniffer")))]
pub mod sniffer;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::{
    DmxConfig, DmxDriver, DmxDriverDefault, DmxDriverLarge, DmxDriverSmall, PacketInfo, State,
};
pub use error::{ConfigError, ConfigResult, Error, IoError, IoResult, RdmError, RdmResult, Result};
pub use hal::{BusClock, BusDirection, BusTimer, DmxHal, DmxUart, EventSet};
pub use rdm::{CommandClass, DeviceUid, NackReason, ResponseType};

#[cfg(feature = "rdm")]
pub use rdm::{HandlerResult, ParameterDefinition, ParameterStore, PidContext};

// Re-export sync types when critical-section is enabled
#[cfg(feature = "critical-section")]
pub use sync::{SharedDmx, SharedDmxDefault, SharedDmxLarge, SharedDmxSmall};

#[cfg(feature = "sniffer")]
pub use sniffer::{Sniffer, SnifferMetadata};

// =============================================================================
// Macro Helpers
// =============================================================================

/// Declare a static, ISR-safe DMX port for synchronous use.
///
/// This macro expands to a [`SharedDmx`] static with default capacities,
/// reducing boilerplate for the common one-port bring-up. The HAL type
/// must have a `const fn new()`.
///
/// # Examples
///
/// ```ignore
/// ph_esp32_dmx::dmx_static_sync!(DMX1, ph_esp32_dmx::register::Uart1Dmx);
///
/// DMX1.install(DmxConfig::new()).unwrap();
/// ```
#[cfg(feature = "critical-section")]
#[macro_export]
macro_rules! dmx_static_sync {
    ($name:ident, $hal:ty) => {
        static $name: $crate::sync::SharedDmxDefault<$hal> =
            $crate::sync::SharedDmx::new(<$hal>::new());
    };
}
