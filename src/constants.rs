//! Internal constants for the DMX512/RDM driver.
//!
//! Wire-level sizes and timings come from ANSI E1.11 (DMX512-A) and
//! ANSI E1.20 (RDM). Timing values are in microseconds unless noted.

// =============================================================================
// Frame / Buffer Sizes
// =============================================================================

/// Maximum DMX packet size: start code plus 512 slots.
pub const DMX_MAX_PACKET_SIZE: usize = 513;

/// Minimum legal outbound frame size (the start code alone).
pub const DMX_MIN_PACKET_SIZE: usize = 1;

/// DMX wire rate in bit/s.
pub const DMX_BAUD_RATE: u32 = 250_000;

/// Duration of one slot on the wire (1 start + 8 data + 2 stop bits at 250k).
pub const DMX_SLOT_TIME_US: u32 = 44;

// =============================================================================
// Break / Mark-After-Break
// =============================================================================

/// Default outbound break duration.
pub const DMX_BREAK_LEN_US: u32 = 176;

/// Default outbound mark-after-break duration.
pub const DMX_MAB_LEN_US: u32 = 12;

/// Shortest break a transmitter may generate.
pub const DMX_BREAK_LEN_MIN_US: u32 = 92;

/// Longest break this driver will generate.
pub const DMX_BREAK_LEN_MAX_US: u32 = 176;

/// Shortest mark-after-break a transmitter may generate.
pub const DMX_MAB_LEN_MIN_US: u32 = 12;

/// Longest mark-after-break this driver will generate.
pub const DMX_MAB_LEN_MAX_US: u32 = 88;

// =============================================================================
// RDM Message Layout
// =============================================================================

/// Size of the RDM message header (start code through PDL).
pub const RDM_HEADER_SIZE: usize = 24;

/// Maximum parameter data length in one RDM message.
pub const RDM_MAX_PDL: usize = 231;

/// Size of the trailing 16-bit additive checksum.
pub const RDM_CHECKSUM_SIZE: usize = 2;

/// Maximum encoded RDM packet size (header + PDL + checksum).
pub const RDM_MAX_PACKET_SIZE: usize = RDM_HEADER_SIZE + RDM_MAX_PDL + RDM_CHECKSUM_SIZE;

/// Size of an encoded discovery response: 7-byte preamble, separator,
/// 12-byte EUID, 4-byte encoded checksum.
pub const RDM_DISC_RESPONSE_SIZE: usize = 7 + 1 + 12 + 4;

/// Preamble byte repeated ahead of a discovery response.
pub const RDM_PREAMBLE_BYTE: u8 = 0xFE;

/// Separator terminating the discovery response preamble.
pub const RDM_PREAMBLE_SEPARATOR: u8 = 0xAA;

// =============================================================================
// RDM Timing (ANSI E1.20 Table 3-2)
// =============================================================================

/// How long a controller waits for a response before giving up.
pub const RDM_CONTROLLER_RESPONSE_LOST_TIMEOUT_US: u32 = 2_800;

/// How long a responder has to get its response onto the wire.
pub const RDM_RESPONDER_RESPONSE_LOST_TIMEOUT_US: u32 = 2_000;

/// Spacing after a discovery request that drew no response.
pub const RDM_DISCOVERY_NO_RESPONSE_PACKET_SPACING_US: u32 = 5_800;

/// Spacing after a unicast request that drew no response.
pub const RDM_REQUEST_NO_RESPONSE_PACKET_SPACING_US: u32 = 3_000;

/// Spacing after a broadcast request.
pub const RDM_BROADCAST_PACKET_SPACING_US: u32 = 176;

/// Minimum turnaround before responding to a received request.
pub const RDM_RESPOND_TO_REQUEST_PACKET_SPACING_US: u32 = 176;

// =============================================================================
// FIFO Tuning
// =============================================================================

/// RX FIFO fill level that triggers a drain interrupt.
pub const RX_FIFO_FULL_THRESHOLD: usize = 120;

/// Idle slots on the RX line before a FIFO-timeout interrupt.
pub const RX_TIMEOUT_SLOTS: u8 = 2;

/// TX FIFO depth on the ESP32 UARTs.
pub const UART_TX_FIFO_DEPTH: usize = 128;
