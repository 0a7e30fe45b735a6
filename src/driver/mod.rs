//! Core DMX driver components.
//!
//! This module contains the building blocks for configuring and operating
//! one DMX512/RDM port.
//!
//! # Overview
//!
//! - [`config`]: Configuration types and builder patterns
//! - [`flags`]: The flag word shared between task code and the ISRs
//! - [`port`]: The per-port driver state and caller-side operations
//! - [`engine`]: The interrupt-side bus engine
//!
//! # Usage
//!
//! ```ignore
//! use ph_esp32_dmx::driver::{DmxConfig, DmxDriver};
//!
//! let config = DmxConfig::new()
//!     .with_uid(DeviceUid::new(0x05E0, 0x0000_0001));
//! let mut driver: DmxDriver<Uart1Hal> = DmxDriver::new(Uart1Hal::new());
//! driver.install(config)?;
//! ```
//!
//! # See Also
//!
//! - [`crate::sync::SharedDmx`] for the ISR-safe blocking facade

// Submodules
pub mod config;
pub mod engine;
pub mod flags;
pub mod port;

// Re-exports for convenience
pub use config::{DmxConfig, SOFTWARE_VERSION_LABEL_MAX, State};
pub use engine::EngineWake;
pub use flags::DriverFlags;
pub use port::{DmxDriver, PacketInfo};

/// Default-capacity driver (24 PIDs, 320-byte slab, 16-deep queue).
pub type DmxDriverDefault<H> = DmxDriver<H, 24, 320, 16>;

/// Small driver for memory-constrained responders.
pub type DmxDriverSmall<H> = DmxDriver<H, 12, 160, 8>;

/// Large driver for parameter-heavy responders.
pub type DmxDriverLarge<H> = DmxDriver<H, 48, 1024, 32>;
