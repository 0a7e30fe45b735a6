//! Error types for the ESP32 DMX512/RDM driver
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Installation and configuration failures
//! - [`IoError`]: Runtime TX/RX failures observed on the bus
//! - [`RdmError`]: RDM parameter-store and dispatch failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods. Faults detected inside interrupt handlers are
//! never returned from the ISR; they are stamped onto the packet record
//! and surfaced from `receive` as an [`IoError`].

// =============================================================================
// Configuration Errors
// =============================================================================

/// Installation and configuration errors
///
/// These errors occur while installing a port, changing baud or break
/// timing, or registering RDM parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Driver already installed on this port
    AlreadyInstalled,
    /// Driver not installed
    NotInstalled,
    /// Driver installed but not enabled
    NotEnabled,
    /// Invalid argument (offset, size, or port out of range)
    InvalidArg,
    /// Break duration outside the 92-176 us legal range
    InvalidBreak,
    /// Mark-after-break duration outside the 12-88 us legal range
    InvalidMab,
    /// Hardware timer could not be claimed or programmed
    TimerError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::AlreadyInstalled => "already installed",
            ConfigError::NotInstalled => "driver not installed",
            ConfigError::NotEnabled => "driver not enabled",
            ConfigError::InvalidArg => "invalid argument",
            ConfigError::InvalidBreak => "break length out of range",
            ConfigError::InvalidMab => "mark-after-break length out of range",
            ConfigError::TimerError => "hardware timer error",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime TX/RX errors
///
/// These errors describe the outcome of one frame on the wire. They are
/// recorded by the receive path and carried in [`PacketInfo`](crate::driver::PacketInfo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// No error
    #[default]
    Ok,
    /// Operation timed out before a frame completed
    Timeout,
    /// The UART RX FIFO overflowed and data was lost
    DataOverflow,
    /// A slot failed framing or parity checks
    ImproperSlot,
    /// The incoming frame exceeded the 513-octet packet buffer
    PacketSize,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Ok => "ok",
            IoError::Timeout => "operation timed out",
            IoError::DataOverflow => "rx fifo overflowed",
            IoError::ImproperSlot => "framing or parity error",
            IoError::PacketSize => "packet exceeded buffer",
        }
    }

    /// `true` when the frame completed without a fault.
    #[inline(always)]
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, IoError::Ok)
    }
}

// =============================================================================
// RDM Errors
// =============================================================================

/// RDM parameter-store and dispatch errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdmError {
    /// Parameter table is full
    TableFull,
    /// Parameter-data slab is exhausted
    SlabExhausted,
    /// PID already registered
    DuplicatePid,
    /// PID not found in the parameter table
    UnknownPid,
    /// Alias offset falls outside the aliased parameter's storage
    AliasOutOfRange,
    /// Pending-notification queue is full
    QueueFull,
    /// Inbound message failed header or checksum validation
    MalformedMessage,
}

impl core::fmt::Display for RdmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RdmError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RdmError::TableFull => "parameter table full",
            RdmError::SlabExhausted => "parameter data slab exhausted",
            RdmError::DuplicatePid => "pid already registered",
            RdmError::UnknownPid => "pid not registered",
            RdmError::AliasOutOfRange => "alias offset out of range",
            RdmError::QueueFull => "rdm queue full",
            RdmError::MalformedMessage => "malformed rdm message",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::NotInstalled)) => { /* ... */ }
///     Err(Error::Io(IoError::Timeout)) => { /* ... */ }
///     Err(Error::Rdm(RdmError::UnknownPid)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// I/O error
    Io(IoError),
    /// RDM error
    Rdm(RdmError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
            Error::Rdm(e) => write!(f, "rdm: {}", e.as_str()),
        }
    }
}

// From impls for automatic conversion
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<RdmError> for Error {
    fn from(e: RdmError) -> Self {
        Error::Rdm(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

/// Result type alias for RDM operations
pub type RdmResult<T> = core::result::Result<T, RdmError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    use super::*;

    // =========================================================================
    // ConfigError Tests
    // =========================================================================

    #[test]
    fn config_error_as_str_non_empty() {
        let variants = [
            ConfigError::AlreadyInstalled,
            ConfigError::NotInstalled,
            ConfigError::NotEnabled,
            ConfigError::InvalidArg,
            ConfigError::InvalidBreak,
            ConfigError::InvalidMab,
            ConfigError::TimerError,
        ];

        for variant in variants {
            let s = variant.as_str();
            assert!(!s.is_empty(), "ConfigError::{:?} has empty string", variant);
        }
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidBreak;
        let display = format!("{}", err);
        assert_eq!(display, "break length out of range");
    }

    #[test]
    fn config_error_equality() {
        assert_eq!(ConfigError::NotInstalled, ConfigError::NotInstalled);
        assert_ne!(ConfigError::NotInstalled, ConfigError::NotEnabled);
    }

    // =========================================================================
    // IoError Tests
    // =========================================================================

    #[test]
    fn io_error_as_str_non_empty() {
        let variants = [
            IoError::Ok,
            IoError::Timeout,
            IoError::DataOverflow,
            IoError::ImproperSlot,
            IoError::PacketSize,
        ];

        for variant in variants {
            let s = variant.as_str();
            assert!(!s.is_empty(), "IoError::{:?} has empty string", variant);
        }
    }

    #[test]
    fn io_error_default_is_ok() {
        assert_eq!(IoError::default(), IoError::Ok);
        assert!(IoError::Ok.is_ok());
        assert!(!IoError::Timeout.is_ok());
    }

    #[test]
    fn io_error_display() {
        let err = IoError::ImproperSlot;
        let display = format!("{}", err);
        assert_eq!(display, "framing or parity error");
    }

    // =========================================================================
    // RdmError Tests
    // =========================================================================

    #[test]
    fn rdm_error_as_str_non_empty() {
        let variants = [
            RdmError::TableFull,
            RdmError::SlabExhausted,
            RdmError::DuplicatePid,
            RdmError::UnknownPid,
            RdmError::AliasOutOfRange,
            RdmError::QueueFull,
            RdmError::MalformedMessage,
        ];

        for variant in variants {
            let s = variant.as_str();
            assert!(!s.is_empty(), "RdmError::{:?} has empty string", variant);
        }
    }

    #[test]
    fn rdm_error_display() {
        let err = RdmError::UnknownPid;
        let display = format!("{}", err);
        assert_eq!(display, "pid not registered");
    }

    // =========================================================================
    // Unified Error Tests
    // =========================================================================

    #[test]
    fn error_from_config_error() {
        let config_err = ConfigError::InvalidArg;
        let err: Error = config_err.into();

        match err {
            Error::Config(e) => assert_eq!(e, ConfigError::InvalidArg),
            _ => panic!("Expected Error::Config"),
        }
    }

    #[test]
    fn error_from_io_error() {
        let io_err = IoError::DataOverflow;
        let err: Error = io_err.into();

        match err {
            Error::Io(e) => assert_eq!(e, IoError::DataOverflow),
            _ => panic!("Expected Error::Io"),
        }
    }

    #[test]
    fn error_from_rdm_error() {
        let rdm_err = RdmError::SlabExhausted;
        let err: Error = rdm_err.into();

        match err {
            Error::Rdm(e) => assert_eq!(e, RdmError::SlabExhausted),
            _ => panic!("Expected Error::Rdm"),
        }
    }

    #[test]
    fn error_display_config() {
        let err = Error::Config(ConfigError::TimerError);
        let display = format!("{}", err);
        assert!(display.contains("config"));
        assert!(display.contains("timer"));
    }

    #[test]
    fn error_display_io() {
        let err = Error::Io(IoError::PacketSize);
        let display = format!("{}", err);
        assert!(display.contains("io"));
        assert!(display.contains("packet"));
    }

    #[test]
    fn error_display_rdm() {
        let err = Error::Rdm(RdmError::QueueFull);
        let display = format!("{}", err);
        assert!(display.contains("rdm"));
        assert!(display.contains("queue"));
    }

    #[test]
    fn error_equality() {
        let err1 = Error::Io(IoError::Timeout);
        let err2 = Error::Io(IoError::Timeout);
        let err3 = Error::Io(IoError::DataOverflow);

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    // =========================================================================
    // Result Type Alias Tests
    // =========================================================================

    #[test]
    fn result_type_works() {
        fn test_fn() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(test_fn().unwrap(), 42);
    }

    #[test]
    fn io_result_type_works() {
        fn test_fn() -> IoResult<u32> {
            Err(IoError::Timeout)
        }

        assert!(test_fn().is_err());
    }

    #[test]
    fn rdm_result_type_works() {
        fn test_fn() -> RdmResult<u32> {
            Err(RdmError::TableFull)
        }

        assert!(test_fn().is_err());
    }
}
