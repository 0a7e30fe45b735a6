//! RDM protocol enums and parameter-id constants (ANSI E1.20).

// =============================================================================
// Start Codes
// =============================================================================

/// Null start code: a plain DMX512 dimmer frame.
pub const SC_DMX: u8 = 0x00;

/// RDM start code.
pub const SC_RDM: u8 = 0xCC;

/// RDM sub-start code (second byte of every RDM message).
pub const SC_SUB_MESSAGE: u8 = 0x01;

/// Root device sub-device number.
pub const SUB_DEVICE_ROOT: u16 = 0x0000;

/// Broadcast to all sub-devices.
pub const SUB_DEVICE_ALL: u16 = 0xFFFF;

// =============================================================================
// Command Classes
// =============================================================================

/// RDM command class (message header offset 20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandClass {
    /// Discovery request
    DiscoveryCommand = 0x10,
    /// Discovery response
    DiscoveryResponse = 0x11,
    /// GET request
    GetCommand = 0x20,
    /// GET response
    GetResponse = 0x21,
    /// SET request
    SetCommand = 0x30,
    /// SET response
    SetResponse = 0x31,
}

impl CommandClass {
    /// Decode from the raw header byte.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x10 => Some(CommandClass::DiscoveryCommand),
            0x11 => Some(CommandClass::DiscoveryResponse),
            0x20 => Some(CommandClass::GetCommand),
            0x21 => Some(CommandClass::GetResponse),
            0x30 => Some(CommandClass::SetCommand),
            0x31 => Some(CommandClass::SetResponse),
            _ => None,
        }
    }

    /// `true` for the controller-to-responder classes.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(
            self,
            CommandClass::DiscoveryCommand | CommandClass::GetCommand | CommandClass::SetCommand
        )
    }

    /// `true` for the responder-to-controller classes.
    #[must_use]
    pub const fn is_response(&self) -> bool {
        !self.is_request()
    }

    /// The response class paired with a request class (request + 1).
    #[must_use]
    pub const fn response_class(&self) -> Self {
        match self {
            CommandClass::DiscoveryCommand | CommandClass::DiscoveryResponse => {
                CommandClass::DiscoveryResponse
            }
            CommandClass::GetCommand | CommandClass::GetResponse => CommandClass::GetResponse,
            CommandClass::SetCommand | CommandClass::SetResponse => CommandClass::SetResponse,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Response type field of an RDM response (header offset 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResponseType {
    /// Request handled
    Ack = 0x00,
    /// Request accepted; result available after the carried delay
    AckTimer = 0x01,
    /// Request refused; PDL carries a [`NackReason`]
    NackReason = 0x02,
    /// Request handled; more data remains for a follow-up GET
    AckOverflow = 0x03,
}

impl ResponseType {
    /// Decode from the raw header byte.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(ResponseType::Ack),
            0x01 => Some(ResponseType::AckTimer),
            0x02 => Some(ResponseType::NackReason),
            0x03 => Some(ResponseType::AckOverflow),
            _ => None,
        }
    }
}

// =============================================================================
// NACK Reasons
// =============================================================================

/// NACK reason codes (ANSI E1.20 Table A-17).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum NackReason {
    /// Responder does not support the requested PID
    UnknownPid = 0x0000,
    /// Parameter data malformed
    FormatError = 0x0001,
    /// Responder could not act due to an internal fault
    HardwareFault = 0x0002,
    /// Proxy cannot relay the message
    ProxyReject = 0x0003,
    /// SET refused; parameter is write-protected
    WriteProtect = 0x0004,
    /// Command class unsupported for this PID
    UnsupportedCommandClass = 0x0005,
    /// Parameter data value out of range
    DataOutOfRange = 0x0006,
    /// Responder out of buffer space
    BufferFull = 0x0007,
    /// Packet exceeds the responder's capacity
    PacketSizeUnsupported = 0x0008,
    /// Sub-device out of range
    SubDeviceOutOfRange = 0x0009,
    /// Proxy queue full
    ProxyBufferFull = 0x000A,
}

impl NackReason {
    /// Big-endian wire encoding carried as the NACK PDL.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        (self as u16).to_be_bytes()
    }
}

/// Command classes a registered parameter responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcSupport {
    /// GET only
    Get,
    /// SET only
    Set,
    /// GET and SET
    GetSet,
    /// Discovery commands only
    Disc,
}

impl CcSupport {
    /// `true` when a request of class `cc` is in this support set.
    #[must_use]
    pub const fn supports(&self, cc: CommandClass) -> bool {
        match cc {
            CommandClass::GetCommand => matches!(self, CcSupport::Get | CcSupport::GetSet),
            CommandClass::SetCommand => matches!(self, CcSupport::Set | CcSupport::GetSet),
            CommandClass::DiscoveryCommand => matches!(self, CcSupport::Disc),
            _ => false,
        }
    }
}

// =============================================================================
// Parameter Data Types
// =============================================================================

/// RDM parameter data types (ANSI E1.20 Table A-15, abridged to the types
/// this driver stores).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ParamDataType {
    /// Unspecified or composite data
    #[default]
    NotDefined = 0x00,
    /// Bit field
    BitField = 0x01,
    /// ASCII text
    Ascii = 0x02,
    /// Unsigned 8-bit
    UnsignedByte = 0x03,
    /// Unsigned 16-bit
    UnsignedWord = 0x06,
    /// Unsigned 32-bit
    UnsignedDword = 0x08,
}

// =============================================================================
// Parameter IDs
// =============================================================================

/// Parameter-id constants (ANSI E1.20 Table A-3, the set this driver
/// registers or recognizes by default).
pub mod pid {
    /// Binary-search discovery probe
    pub const DISC_UNIQUE_BRANCH: u16 = 0x0001;
    /// Mute discovery responses
    pub const DISC_MUTE: u16 = 0x0002;
    /// Un-mute discovery responses
    pub const DISC_UN_MUTE: u16 = 0x0003;
    /// List of supported PIDs
    pub const SUPPORTED_PARAMETERS: u16 = 0x0050;
    /// Descriptor for a manufacturer-specific PID
    pub const PARAMETER_DESCRIPTION: u16 = 0x0051;
    /// Device information block
    pub const DEVICE_INFO: u16 = 0x0060;
    /// Software version label string
    pub const SOFTWARE_VERSION_LABEL: u16 = 0x00C0;
    /// DMX512 start address
    pub const DMX_START_ADDRESS: u16 = 0x00F0;
    /// Identify device state
    pub const IDENTIFY_DEVICE: u16 = 0x1000;
}

/// PDL of a DISC_UNIQUE_BRANCH request (two bounding UIDs).
pub const DISC_UNIQUE_BRANCH_PDL: usize = 12;

/// PDL of a DISC_MUTE / DISC_UN_MUTE response control field.
pub const DISC_MUTE_PDL: usize = 2;

/// PDL of a DEVICE_INFO response.
pub const DEVICE_INFO_PDL: usize = 19;
