//! Configuration types for the ESP32 DMX512/RDM driver

use crate::constants::{
    DMX_BREAK_LEN_MAX_US, DMX_BREAK_LEN_MIN_US, DMX_BREAK_LEN_US, DMX_MAB_LEN_MAX_US,
    DMX_MAB_LEN_MIN_US, DMX_MAB_LEN_US, DMX_MAX_PACKET_SIZE,
};
use crate::error::ConfigError;
use crate::rdm::DeviceUid;

/// Driver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Driver not installed; no hardware claimed
    #[default]
    Uninstalled,
    /// Installed and driving the bus
    Enabled,
    /// Installed but quiescent; interrupts masked
    Disabled,
}

/// Longest software version label carried in RDM responses.
pub const SOFTWARE_VERSION_LABEL_MAX: usize = 32;

/// DMX port configuration
///
/// Built with the `with_*` methods and validated by [`check`](Self::check)
/// at install time.
///
/// # Example
/// ```ignore
/// let config = DmxConfig::new()
///     .with_break_len(176)
///     .with_mab_len(12)
///     .with_uid(DeviceUid::new(0x05E0, 0x1234_5678));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmxConfig {
    /// Outbound break duration in microseconds (92-176)
    pub break_len_us: u32,
    /// Outbound mark-after-break duration in microseconds (12-88)
    pub mab_len_us: u32,
    /// This responder's UID (source UID of every RDM response)
    pub uid: DeviceUid,
    /// RDM device model id
    pub model_id: u16,
    /// RDM product category (ANSI E1.20 Table A-5)
    pub product_category: u16,
    /// RDM software version id
    pub software_version_id: u32,
    /// RDM software version label (at most 32 bytes of ASCII)
    pub software_version_label: &'static str,
    /// Number of consecutive DMX slots this device occupies
    pub footprint: u16,
    /// Expected inbound frame size; `0` disables early RX termination and
    /// a full 513-octet frame is assumed
    pub rx_expected: usize,
}

impl DmxConfig {
    /// Create a configuration with DMX512-A default timing.
    pub const fn new() -> Self {
        Self {
            break_len_us: DMX_BREAK_LEN_US,
            mab_len_us: DMX_MAB_LEN_US,
            uid: DeviceUid::new(0x05E0, 0),
            model_id: 0,
            product_category: 0x0100,
            software_version_id: 0,
            software_version_label: "ph-esp32-dmx",
            footprint: 1,
            rx_expected: 0,
        }
    }

    /// Set the outbound break duration.
    #[must_use]
    pub const fn with_break_len(mut self, break_len_us: u32) -> Self {
        self.break_len_us = break_len_us;
        self
    }

    /// Set the outbound mark-after-break duration.
    #[must_use]
    pub const fn with_mab_len(mut self, mab_len_us: u32) -> Self {
        self.mab_len_us = mab_len_us;
        self
    }

    /// Set the responder UID.
    #[must_use]
    pub const fn with_uid(mut self, uid: DeviceUid) -> Self {
        self.uid = uid;
        self
    }

    /// Set the RDM device model id.
    #[must_use]
    pub const fn with_model_id(mut self, model_id: u16) -> Self {
        self.model_id = model_id;
        self
    }

    /// Set the RDM product category.
    #[must_use]
    pub const fn with_product_category(mut self, product_category: u16) -> Self {
        self.product_category = product_category;
        self
    }

    /// Set the RDM software version id.
    #[must_use]
    pub const fn with_software_version(mut self, id: u32, label: &'static str) -> Self {
        self.software_version_id = id;
        self.software_version_label = label;
        self
    }

    /// Set the DMX footprint.
    #[must_use]
    pub const fn with_footprint(mut self, footprint: u16) -> Self {
        self.footprint = footprint;
        self
    }

    /// Terminate RX early once `rx_expected` slots have arrived.
    #[must_use]
    pub const fn with_rx_expected(mut self, rx_expected: usize) -> Self {
        self.rx_expected = rx_expected;
        self
    }

    /// Validate the configuration.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.break_len_us < DMX_BREAK_LEN_MIN_US || self.break_len_us > DMX_BREAK_LEN_MAX_US {
            return Err(ConfigError::InvalidBreak);
        }
        if self.mab_len_us < DMX_MAB_LEN_MIN_US || self.mab_len_us > DMX_MAB_LEN_MAX_US {
            return Err(ConfigError::InvalidMab);
        }
        if self.footprint as usize >= DMX_MAX_PACKET_SIZE {
            return Err(ConfigError::InvalidArg);
        }
        if self.rx_expected > DMX_MAX_PACKET_SIZE {
            return Err(ConfigError::InvalidArg);
        }
        if self.software_version_label.len() > SOFTWARE_VERSION_LABEL_MAX {
            return Err(ConfigError::InvalidArg);
        }
        Ok(())
    }
}

impl Default for DmxConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DmxConfig::new().check().is_ok());
        assert!(DmxConfig::default().check().is_ok());
    }

    #[test]
    fn default_timing_matches_dmx512a() {
        let config = DmxConfig::new();
        assert_eq!(config.break_len_us, 176);
        assert_eq!(config.mab_len_us, 12);
    }

    #[test]
    fn builder_methods_chain() {
        let uid = DeviceUid::new(0x7FF0, 42);
        let config = DmxConfig::new()
            .with_break_len(100)
            .with_mab_len(20)
            .with_uid(uid)
            .with_model_id(7)
            .with_footprint(16);

        assert_eq!(config.break_len_us, 100);
        assert_eq!(config.mab_len_us, 20);
        assert_eq!(config.uid, uid);
        assert_eq!(config.model_id, 7);
        assert_eq!(config.footprint, 16);
        assert!(config.check().is_ok());
    }

    #[test]
    fn break_out_of_range_rejected() {
        assert_eq!(
            DmxConfig::new().with_break_len(91).check(),
            Err(ConfigError::InvalidBreak)
        );
        assert_eq!(
            DmxConfig::new().with_break_len(177).check(),
            Err(ConfigError::InvalidBreak)
        );
    }

    #[test]
    fn mab_out_of_range_rejected() {
        assert_eq!(
            DmxConfig::new().with_mab_len(11).check(),
            Err(ConfigError::InvalidMab)
        );
        assert_eq!(
            DmxConfig::new().with_mab_len(89).check(),
            Err(ConfigError::InvalidMab)
        );
    }

    #[test]
    fn oversized_rx_expected_rejected() {
        assert_eq!(
            DmxConfig::new().with_rx_expected(514).check(),
            Err(ConfigError::InvalidArg)
        );
        assert!(DmxConfig::new().with_rx_expected(513).check().is_ok());
    }

    #[test]
    fn boundary_timings_accepted() {
        assert!(
            DmxConfig::new()
                .with_break_len(92)
                .with_mab_len(12)
                .check()
                .is_ok()
        );
        assert!(
            DmxConfig::new()
                .with_break_len(176)
                .with_mab_len(88)
                .check()
                .is_ok()
        );
    }

    #[test]
    fn state_default_is_uninstalled() {
        assert_eq!(State::default(), State::Uninstalled);
    }
}
