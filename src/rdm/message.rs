//! RDM message header codec and discovery-response framing.
//!
//! An RDM message is laid out as:
//!
//! | offset | field |
//! |--------|-------|
//! | 0      | start code (`0xCC`) |
//! | 1      | sub-start code (`0x01`) |
//! | 2      | message length (header + PDL) |
//! | 3..9   | destination UID |
//! | 9..15  | source UID |
//! | 15     | transaction number |
//! | 16     | port id (requests) / response type (responses) |
//! | 17     | message count |
//! | 18..20 | sub-device |
//! | 20     | command class |
//! | 21..23 | parameter id |
//! | 23     | PDL |
//! | 24..   | parameter data, then 16-bit additive checksum |
//!
//! Discovery responses are not RDM messages: they are a preamble of up to
//! seven `0xFE` bytes, a `0xAA` separator, the 12-byte encoded EUID, and a
//! 4-byte encoded checksum, sent without a break so that in-flight collisions
//! stay detectable.

use super::types::{CommandClass, SC_RDM, SC_SUB_MESSAGE};
use super::uid::{DeviceUid, UID_SIZE};
use crate::constants::{
    RDM_CHECKSUM_SIZE, RDM_DISC_RESPONSE_SIZE, RDM_HEADER_SIZE, RDM_MAX_PDL,
    RDM_PREAMBLE_BYTE, RDM_PREAMBLE_SEPARATOR,
};
use crate::error::RdmError;

// =============================================================================
// Header Field Offsets
// =============================================================================

/// Offset of the message length byte.
pub const OFFSET_MESSAGE_LEN: usize = 2;
/// Offset of the destination UID.
pub const OFFSET_DEST_UID: usize = 3;
/// Offset of the source UID.
pub const OFFSET_SRC_UID: usize = 9;
/// Offset of the transaction number.
pub const OFFSET_TN: usize = 15;
/// Offset of the port id / response type byte.
pub const OFFSET_PORT_ID: usize = 16;
/// Offset of the message count.
pub const OFFSET_MESSAGE_COUNT: usize = 17;
/// Offset of the sub-device field.
pub const OFFSET_SUB_DEVICE: usize = 18;
/// Offset of the command class.
pub const OFFSET_CC: usize = 20;
/// Offset of the parameter id.
pub const OFFSET_PID: usize = 21;
/// Offset of the PDL byte.
pub const OFFSET_PDL: usize = 23;
/// Offset of the parameter data.
pub const PD_OFFSET: usize = RDM_HEADER_SIZE;

// =============================================================================
// Header
// =============================================================================

/// Decoded RDM message header.
///
/// `port_id` carries the controller port id on requests and the response
/// type on responses; the dispatcher rewrites it when composing a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RdmHeader {
    /// Destination UID
    pub dest_uid: DeviceUid,
    /// Source UID
    pub src_uid: DeviceUid,
    /// Transaction number
    pub tn: u8,
    /// Port id (requests) or response type (responses)
    pub port_id: u8,
    /// Count of queued messages the responder holds
    pub message_count: u8,
    /// Addressed sub-device
    pub sub_device: u16,
    /// Command class
    pub cc: CommandClass,
    /// Parameter id
    pub pid: u16,
    /// Parameter data length
    pub pdl: u8,
}

impl RdmHeader {
    /// Total encoded size of a message with this header.
    #[must_use]
    pub const fn packet_size(&self) -> usize {
        RDM_HEADER_SIZE + self.pdl as usize + RDM_CHECKSUM_SIZE
    }

    /// Decode and validate a header from a received frame.
    ///
    /// Verifies the start codes, length fields, command class, and the
    /// trailing checksum over the whole message.
    pub fn decode(frame: &[u8]) -> Result<Self, RdmError> {
        if frame.len() < RDM_HEADER_SIZE + RDM_CHECKSUM_SIZE {
            return Err(RdmError::MalformedMessage);
        }
        if frame[0] != SC_RDM || frame[1] != SC_SUB_MESSAGE {
            return Err(RdmError::MalformedMessage);
        }

        let message_len = frame[OFFSET_MESSAGE_LEN] as usize;
        let pdl = frame[OFFSET_PDL] as usize;
        if message_len != RDM_HEADER_SIZE + pdl || pdl > RDM_MAX_PDL {
            return Err(RdmError::MalformedMessage);
        }
        if frame.len() < message_len + RDM_CHECKSUM_SIZE {
            return Err(RdmError::MalformedMessage);
        }

        let expected = checksum(&frame[..message_len]);
        let received = u16::from_be_bytes([frame[message_len], frame[message_len + 1]]);
        if expected != received {
            return Err(RdmError::MalformedMessage);
        }

        let cc = CommandClass::from_raw(frame[OFFSET_CC]).ok_or(RdmError::MalformedMessage)?;

        let dest: [u8; UID_SIZE] = frame[OFFSET_DEST_UID..OFFSET_DEST_UID + UID_SIZE]
            .try_into()
            .map_err(|_| RdmError::MalformedMessage)?;
        let src: [u8; UID_SIZE] = frame[OFFSET_SRC_UID..OFFSET_SRC_UID + UID_SIZE]
            .try_into()
            .map_err(|_| RdmError::MalformedMessage)?;

        Ok(Self {
            dest_uid: DeviceUid::from_bytes(&dest),
            src_uid: DeviceUid::from_bytes(&src),
            tn: frame[OFFSET_TN],
            port_id: frame[OFFSET_PORT_ID],
            message_count: frame[OFFSET_MESSAGE_COUNT],
            sub_device: u16::from_be_bytes([frame[OFFSET_SUB_DEVICE], frame[OFFSET_SUB_DEVICE + 1]]),
            cc,
            pid: u16::from_be_bytes([frame[OFFSET_PID], frame[OFFSET_PID + 1]]),
            pdl: pdl as u8,
        })
    }

    /// Encode this header into `frame` and seal the message.
    ///
    /// The parameter data must already sit at `frame[24..24 + pdl]`; this
    /// writes the header around it, fixes up the message length, appends
    /// the checksum, and returns the total packet size.
    pub fn encode(&self, frame: &mut [u8]) -> usize {
        let message_len = RDM_HEADER_SIZE + self.pdl as usize;

        frame[0] = SC_RDM;
        frame[1] = SC_SUB_MESSAGE;
        frame[OFFSET_MESSAGE_LEN] = message_len as u8;
        frame[OFFSET_DEST_UID..OFFSET_DEST_UID + UID_SIZE].copy_from_slice(&self.dest_uid.to_bytes());
        frame[OFFSET_SRC_UID..OFFSET_SRC_UID + UID_SIZE].copy_from_slice(&self.src_uid.to_bytes());
        frame[OFFSET_TN] = self.tn;
        frame[OFFSET_PORT_ID] = self.port_id;
        frame[OFFSET_MESSAGE_COUNT] = self.message_count;
        frame[OFFSET_SUB_DEVICE..OFFSET_SUB_DEVICE + 2]
            .copy_from_slice(&self.sub_device.to_be_bytes());
        frame[OFFSET_CC] = self.cc as u8;
        frame[OFFSET_PID..OFFSET_PID + 2].copy_from_slice(&self.pid.to_be_bytes());
        frame[OFFSET_PDL] = self.pdl;

        let cs = checksum(&frame[..message_len]);
        frame[message_len..message_len + RDM_CHECKSUM_SIZE].copy_from_slice(&cs.to_be_bytes());

        message_len + RDM_CHECKSUM_SIZE
    }
}

/// 16-bit additive checksum over `bytes`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

// =============================================================================
// Discovery Response Framing
// =============================================================================

/// Encode a DISC_UNIQUE_BRANCH response for `uid` into `frame`.
///
/// Returns the encoded size. `frame` must hold at least
/// [`RDM_DISC_RESPONSE_SIZE`] bytes.
pub fn encode_disc_response(uid: DeviceUid, frame: &mut [u8]) -> usize {
    let mut at = 0;
    for _ in 0..7 {
        frame[at] = RDM_PREAMBLE_BYTE;
        at += 1;
    }
    frame[at] = RDM_PREAMBLE_SEPARATOR;
    at += 1;

    let euid_start = at;
    for byte in uid.to_bytes() {
        frame[at] = byte | 0xAA;
        frame[at + 1] = byte | 0x55;
        at += 2;
    }

    let cs = checksum(&frame[euid_start..at]);
    let [hi, lo] = cs.to_be_bytes();
    frame[at] = hi | 0xAA;
    frame[at + 1] = hi | 0x55;
    frame[at + 2] = lo | 0xAA;
    frame[at + 3] = lo | 0x55;
    at += 4;

    debug_assert_eq!(at, RDM_DISC_RESPONSE_SIZE);
    at
}

/// Decode a DISC_UNIQUE_BRANCH response, tolerating a shortened preamble.
///
/// Returns the responding UID, or `None` if the framing or checksum is
/// invalid (e.g. two responders collided on the wire).
#[must_use]
pub fn decode_disc_response(frame: &[u8]) -> Option<DeviceUid> {
    // Up to 7 preamble bytes, then the mandatory separator.
    let sep = frame
        .iter()
        .take(8)
        .position(|&b| b == RDM_PREAMBLE_SEPARATOR)?;
    let body = &frame[sep + 1..];
    if body.len() < 16 {
        return None;
    }

    let mut uid_bytes = [0u8; UID_SIZE];
    for (i, slot) in uid_bytes.iter_mut().enumerate() {
        *slot = body[2 * i] & body[2 * i + 1];
    }

    let expected = checksum(&body[..12]);
    let hi = body[12] & body[13];
    let lo = body[14] & body[15];
    if expected != u16::from_be_bytes([hi, lo]) {
        return None;
    }

    Some(DeviceUid::from_bytes(&uid_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdm::types::SUB_DEVICE_ROOT;

    fn sample_header() -> RdmHeader {
        RdmHeader {
            dest_uid: DeviceUid::new(0x05E0, 0x1234_5678),
            src_uid: DeviceUid::new(0x0011, 0x2233_4455),
            tn: 7,
            port_id: 1,
            message_count: 0,
            sub_device: SUB_DEVICE_ROOT,
            cc: CommandClass::GetCommand,
            pid: 0x0060,
            pdl: 0,
        }
    }

    #[test]
    fn header_encode_decode_round_trip() {
        let header = sample_header();
        let mut frame = [0u8; 64];
        let size = header.encode(&mut frame);
        assert_eq!(size, 26);
        assert_eq!(frame[0], SC_RDM);
        assert_eq!(frame[1], SC_SUB_MESSAGE);
        assert_eq!(frame[OFFSET_MESSAGE_LEN], 24);

        let decoded = RdmHeader::decode(&frame[..size]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_with_pd_round_trip() {
        let mut header = sample_header();
        header.cc = CommandClass::SetCommand;
        header.pid = 0x00F0;
        header.pdl = 2;

        let mut frame = [0u8; 64];
        frame[PD_OFFSET] = 0x01;
        frame[PD_OFFSET + 1] = 0x9A;
        let size = header.encode(&mut frame);
        assert_eq!(size, 28);

        let decoded = RdmHeader::decode(&frame[..size]).unwrap();
        assert_eq!(decoded.pdl, 2);
        assert_eq!(&frame[PD_OFFSET..PD_OFFSET + 2], &[0x01, 0x9A]);
    }

    #[test]
    fn corrupted_checksum_rejected() {
        let header = sample_header();
        let mut frame = [0u8; 64];
        let size = header.encode(&mut frame);
        frame[size - 1] ^= 0x01;
        assert_eq!(
            RdmHeader::decode(&frame[..size]),
            Err(RdmError::MalformedMessage)
        );
    }

    #[test]
    fn wrong_start_code_rejected() {
        let header = sample_header();
        let mut frame = [0u8; 64];
        let size = header.encode(&mut frame);
        frame[0] = 0x00;
        assert_eq!(
            RdmHeader::decode(&frame[..size]),
            Err(RdmError::MalformedMessage)
        );
    }

    #[test]
    fn truncated_frame_rejected() {
        let header = sample_header();
        let mut frame = [0u8; 64];
        let size = header.encode(&mut frame);
        assert_eq!(
            RdmHeader::decode(&frame[..size - 3]),
            Err(RdmError::MalformedMessage)
        );
    }

    #[test]
    fn inconsistent_pdl_rejected() {
        let header = sample_header();
        let mut frame = [0u8; 64];
        let size = header.encode(&mut frame);
        frame[OFFSET_PDL] = 4; // message_len still says 24
        // re-seal checksum so only the length inconsistency trips
        let cs = checksum(&frame[..24]);
        frame[24..26].copy_from_slice(&cs.to_be_bytes());
        assert_eq!(
            RdmHeader::decode(&frame[..size]),
            Err(RdmError::MalformedMessage)
        );
    }

    #[test]
    fn checksum_is_additive() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xFF; 300]), (300u32 * 0xFF) as u16);
    }

    #[test]
    fn disc_response_round_trip() {
        let uid = DeviceUid::new(0x05E0, 0xAABB_CCDD);
        let mut frame = [0u8; RDM_DISC_RESPONSE_SIZE];
        let size = encode_disc_response(uid, &mut frame);
        assert_eq!(size, RDM_DISC_RESPONSE_SIZE);
        assert_eq!(&frame[..7], &[RDM_PREAMBLE_BYTE; 7]);
        assert_eq!(frame[7], RDM_PREAMBLE_SEPARATOR);

        assert_eq!(decode_disc_response(&frame), Some(uid));
    }

    #[test]
    fn disc_response_euid_bits() {
        // Every encoded EUID byte has the 0xAA or 0x55 pattern folded in.
        let uid = DeviceUid::new(0, 0);
        let mut frame = [0u8; RDM_DISC_RESPONSE_SIZE];
        encode_disc_response(uid, &mut frame);
        for pair in frame[8..20].chunks(2) {
            assert_eq!(pair[0] & 0xAA, 0xAA);
            assert_eq!(pair[1] & 0x55, 0x55);
        }
    }

    #[test]
    fn disc_response_short_preamble_tolerated() {
        let uid = DeviceUid::new(0x7FF0, 1);
        let mut frame = [0u8; RDM_DISC_RESPONSE_SIZE];
        let size = encode_disc_response(uid, &mut frame);
        // A receiver may observe fewer preamble bytes.
        assert_eq!(decode_disc_response(&frame[5..size]), Some(uid));
    }

    #[test]
    fn disc_response_collision_rejected() {
        let uid = DeviceUid::new(0x05E0, 0x0000_0001);
        let mut frame = [0u8; RDM_DISC_RESPONSE_SIZE];
        let size = encode_disc_response(uid, &mut frame);
        frame[10] |= 0x04; // a colliding responder flips a bit
        assert_eq!(decode_disc_response(&frame[..size]), None);
    }
}
