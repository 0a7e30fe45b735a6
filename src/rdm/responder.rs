//! RDM responder: request dispatch and the built-in parameter handlers.
//!
//! `receive` forwards every well-formed RDM request addressed to this
//! device here. Dispatch looks the PID up in the parameter store, runs its
//! response handler, applies the broadcast/discovery suppression policy,
//! and composes the reply in the driver buffer for `send` to emit.
//!
//! Handlers never emit anything themselves; they only report an outcome.
//! That keeps re-entrant sends out of the picture by construction.

use super::format;
use super::message::{self, PD_OFFSET, RdmHeader};
use super::store::{HandlerResult, ParameterDefinition, PidContext};
use super::types::{
    CcSupport, CommandClass, DEVICE_INFO_PDL, DISC_MUTE_PDL, DISC_UNIQUE_BRANCH_PDL, NackReason,
    ParamDataType, ResponseType, SUB_DEVICE_ALL, SUB_DEVICE_ROOT, pid,
};
use super::uid::{DeviceUid, UID_SIZE};
use crate::constants::RDM_MAX_PDL;
use crate::driver::port::DmxDriver;
use crate::error::Result;
use crate::hal::DmxHal;

/// PIDs every responder carries; SUPPORTED_PARAMETERS must not list them.
const REQUIRED_PIDS: [u16; 9] = [
    pid::DISC_UNIQUE_BRANCH,
    pid::DISC_MUTE,
    pid::DISC_UN_MUTE,
    pid::SUPPORTED_PARAMETERS,
    pid::PARAMETER_DESCRIPTION,
    pid::DEVICE_INFO,
    pid::SOFTWARE_VERSION_LABEL,
    pid::DMX_START_ADDRESS,
    pid::IDENTIFY_DEVICE,
];

/// Byte offset of the DMX start address inside the DEVICE_INFO block.
pub(crate) const DEVICE_INFO_START_ADDRESS_OFFSET: usize = 14;

// =============================================================================
// Built-in Handlers
// =============================================================================

/// Format-driven GET/SET handler for storage-backed parameters.
///
/// GET packs the parameter storage onto the wire; SET unpacks the request
/// data into storage. ASCII parameters are trimmed at their nul on GET.
pub fn simple_response_handler(
    ctx: &mut PidContext<'_>,
    header: &RdmHeader,
    pd_in: &[u8],
    pd_out: &mut [u8],
) -> HandlerResult {
    match header.cc {
        CommandClass::GetCommand => {
            let Some(param) = ctx.param.as_deref() else {
                return HandlerResult::Invalid;
            };
            let mut n = format::pack(ctx.format, param, pd_out);
            if ctx.format.as_bytes() == b"s" {
                n = pd_out[..n].iter().position(|&b| b == 0).unwrap_or(n);
            }
            HandlerResult::Ack(n)
        }
        CommandClass::SetCommand => {
            let Some(param) = ctx.param.as_deref_mut() else {
                return HandlerResult::Invalid;
            };
            if pd_in.len() != format::pass_size(ctx.format, param.len()) {
                return HandlerResult::Nack(NackReason::FormatError);
            }
            format::unpack(ctx.format, pd_in, param);
            HandlerResult::Ack(0)
        }
        _ => HandlerResult::Nack(NackReason::UnsupportedCommandClass),
    }
}

/// IDENTIFY_DEVICE handler: a strict boolean SET over a one-byte store.
pub fn identify_response_handler(
    ctx: &mut PidContext<'_>,
    header: &RdmHeader,
    pd_in: &[u8],
    pd_out: &mut [u8],
) -> HandlerResult {
    match header.cc {
        CommandClass::GetCommand => {
            let Some(param) = ctx.param.as_deref() else {
                return HandlerResult::Invalid;
            };
            pd_out[0] = param[0];
            HandlerResult::Ack(1)
        }
        CommandClass::SetCommand => {
            let Some(param) = ctx.param.as_deref_mut() else {
                return HandlerResult::Invalid;
            };
            if pd_in.len() != 1 {
                return HandlerResult::Nack(NackReason::FormatError);
            }
            if pd_in[0] > 1 {
                return HandlerResult::Nack(NackReason::DataOutOfRange);
            }
            param[0] = pd_in[0];
            HandlerResult::Ack(0)
        }
        _ => HandlerResult::Nack(NackReason::UnsupportedCommandClass),
    }
}

/// DISC_UNIQUE_BRANCH handler: answer only when un-muted and inside the
/// probed UID range. Discovery never NACKs; any irregularity is silence.
pub fn disc_unique_branch_handler(
    ctx: &mut PidContext<'_>,
    _header: &RdmHeader,
    pd_in: &[u8],
    _pd_out: &mut [u8],
) -> HandlerResult {
    if pd_in.len() != DISC_UNIQUE_BRANCH_PDL || *ctx.discovery_muted {
        return HandlerResult::None;
    }
    let lower: [u8; UID_SIZE] = pd_in[..UID_SIZE].try_into().unwrap();
    let upper: [u8; UID_SIZE] = pd_in[UID_SIZE..].try_into().unwrap();
    let lower = DeviceUid::from_bytes(&lower);
    let upper = DeviceUid::from_bytes(&upper);

    if lower <= ctx.uid && ctx.uid <= upper {
        HandlerResult::Ack(0)
    } else {
        HandlerResult::None
    }
}

/// DISC_MUTE handler: mute and report an empty control field.
pub fn disc_mute_handler(
    ctx: &mut PidContext<'_>,
    _header: &RdmHeader,
    pd_in: &[u8],
    pd_out: &mut [u8],
) -> HandlerResult {
    if !pd_in.is_empty() {
        return HandlerResult::None;
    }
    *ctx.discovery_muted = true;
    pd_out[..DISC_MUTE_PDL].fill(0);
    HandlerResult::Ack(DISC_MUTE_PDL)
}

/// DISC_UN_MUTE handler: un-mute and report an empty control field.
pub fn disc_un_mute_handler(
    ctx: &mut PidContext<'_>,
    _header: &RdmHeader,
    pd_in: &[u8],
    pd_out: &mut [u8],
) -> HandlerResult {
    if !pd_in.is_empty() {
        return HandlerResult::None;
    }
    *ctx.discovery_muted = false;
    pd_out[..DISC_MUTE_PDL].fill(0);
    HandlerResult::Ack(DISC_MUTE_PDL)
}

/// SUPPORTED_PARAMETERS handler: list the optional registered PIDs.
pub fn supported_parameters_handler(
    ctx: &mut PidContext<'_>,
    header: &RdmHeader,
    _pd_in: &[u8],
    pd_out: &mut [u8],
) -> HandlerResult {
    if header.cc != CommandClass::GetCommand {
        return HandlerResult::Nack(NackReason::UnsupportedCommandClass);
    }
    let mut n = 0;
    for &p in ctx.supported {
        if REQUIRED_PIDS.contains(&p) {
            continue;
        }
        if n + 2 > RDM_MAX_PDL {
            break;
        }
        pd_out[n..n + 2].copy_from_slice(&p.to_be_bytes());
        n += 2;
    }
    HandlerResult::Ack(n)
}

// =============================================================================
// Registration and Dispatch
// =============================================================================

impl<H: DmxHal, const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize>
    DmxDriver<H, MAX_PIDS, PD_SIZE, QUEUE>
{
    /// Register the mandatory responder parameters from the port
    /// configuration. Runs once at install.
    pub(crate) fn register_default_parameters(&mut self) -> Result<()> {
        let config = self.config;

        // DEVICE_INFO block, native byte order; DMX_START_ADDRESS aliases
        // the two start-address bytes inside it.
        let mut info = [0u8; DEVICE_INFO_PDL];
        info[0..2].copy_from_slice(&0x0100u16.to_le_bytes()); // RDM protocol 1.0
        info[2..4].copy_from_slice(&config.model_id.to_le_bytes());
        info[4..6].copy_from_slice(&config.product_category.to_le_bytes());
        info[6..10].copy_from_slice(&config.software_version_id.to_le_bytes());
        info[10..12].copy_from_slice(&config.footprint.to_le_bytes());
        info[12] = 1; // current personality
        info[13] = 1; // personality count
        info[DEVICE_INFO_START_ADDRESS_OFFSET..DEVICE_INFO_START_ADDRESS_OFFSET + 2]
            .copy_from_slice(&1u16.to_le_bytes());
        // sub-device count and sensor count stay zero

        self.store.add_new(
            ParameterDefinition::new(
                pid::DEVICE_INFO,
                ParamDataType::NotDefined,
                CcSupport::Get,
                DEVICE_INFO_PDL as u16,
            ),
            "wwwlwbbwwb$",
            false,
            simple_response_handler,
            Some(&info),
        )?;

        self.store.add_alias(
            ParameterDefinition::new(
                pid::DMX_START_ADDRESS,
                ParamDataType::UnsignedWord,
                CcSupport::GetSet,
                2,
            ),
            "w",
            true,
            simple_response_handler,
            pid::DEVICE_INFO,
            DEVICE_INFO_START_ADDRESS_OFFSET,
        )?;

        self.store.add_new(
            ParameterDefinition::new(
                pid::SOFTWARE_VERSION_LABEL,
                ParamDataType::Ascii,
                CcSupport::Get,
                33,
            ),
            "s",
            false,
            simple_response_handler,
            Some(config.software_version_label.as_bytes()),
        )?;

        self.store.add_new(
            ParameterDefinition::new(
                pid::IDENTIFY_DEVICE,
                ParamDataType::UnsignedByte,
                CcSupport::GetSet,
                1,
            ),
            "b",
            false,
            identify_response_handler,
            None,
        )?;

        self.store.add_deterministic(
            ParameterDefinition::new(
                pid::SUPPORTED_PARAMETERS,
                ParamDataType::UnsignedWord,
                CcSupport::Get,
                0,
            ),
            "w",
            supported_parameters_handler,
        )?;

        self.store.add_deterministic(
            ParameterDefinition::new(
                pid::DISC_UNIQUE_BRANCH,
                ParamDataType::NotDefined,
                CcSupport::Disc,
                0,
            ),
            "",
            disc_unique_branch_handler,
        )?;

        self.store.add_deterministic(
            ParameterDefinition::new(pid::DISC_MUTE, ParamDataType::NotDefined, CcSupport::Disc, 0),
            "w",
            disc_mute_handler,
        )?;

        self.store.add_deterministic(
            ParameterDefinition::new(
                pid::DISC_UN_MUTE,
                ParamDataType::NotDefined,
                CcSupport::Disc,
                0,
            ),
            "w",
            disc_un_mute_handler,
        )?;

        Ok(())
    }

    /// Dispatch a received RDM request and stage the reply.
    ///
    /// Returns the size of the response staged in the driver buffer, or
    /// `None` when policy suppresses the reply. Responses to
    /// DISC_UNIQUE_BRANCH probes are staged in preamble framing.
    pub(crate) fn rdm_dispatch(&mut self, size: usize) -> Option<usize> {
        let header = RdmHeader::decode(&self.buffer[..size]).ok()?;
        if !header.cc.is_request() {
            // A response on the wire: controller-side traffic, nothing to do.
            return None;
        }
        if !self.config.uid.is_target_of(&header.dest_uid) {
            return None;
        }

        let is_broadcast = header.dest_uid.is_broadcast();
        let is_discovery = header.cc == CommandClass::DiscoveryCommand;
        let is_dub = is_discovery && header.pid == pid::DISC_UNIQUE_BRANCH;

        // Root-only responder: anything addressed past the root sub-device
        // is refused (discovery stays silent instead).
        let sub_device_ok = header.sub_device == SUB_DEVICE_ROOT
            || (header.sub_device == SUB_DEVICE_ALL && header.cc == CommandClass::SetCommand);
        if !sub_device_ok {
            if is_discovery || is_broadcast {
                return None;
            }
            return Some(self.stage_nack(&header, NackReason::SubDeviceOutOfRange));
        }

        // The handler reads request data from the same buffer the response
        // is composed in, so snapshot it first.
        let pdl = header.pdl as usize;
        let mut pd_in = [0u8; RDM_MAX_PDL];
        pd_in[..pdl].copy_from_slice(&self.buffer[PD_OFFSET..PD_OFFSET + pdl]);

        let record = self.store.find(header.pid).copied();
        let mut pd_out = [0u8; RDM_MAX_PDL];

        let result = match record {
            None => {
                if is_discovery {
                    HandlerResult::None
                } else {
                    HandlerResult::Nack(NackReason::UnknownPid)
                }
            }
            Some(rec) if !rec.definition.cc.supports(header.cc) => {
                HandlerResult::Nack(NackReason::UnsupportedCommandClass)
            }
            Some(rec) => {
                let mut pids_list = [0u16; MAX_PIDS];
                let n_pids = self.store.list(&mut pids_list);
                let queued = self.store.queue_len() as u8;
                let uid = self.config.uid;
                let mut muted = self.discovery_muted;

                let result = {
                    let param = rec.data.map(|range| self.store.slab_slice_mut(range));
                    let mut ctx = PidContext {
                        uid,
                        param,
                        format: rec.format,
                        discovery_muted: &mut muted,
                        queued,
                        supported: &pids_list[..n_pids],
                    };
                    (rec.handler)(&mut ctx, &header, &pd_in[..pdl], &mut pd_out)
                };
                self.discovery_muted = muted;

                // SET side effects: user notification once storage changed.
                if header.cc == CommandClass::SetCommand
                    && matches!(result, HandlerResult::Ack(_))
                {
                    if let (Some(callback), Some(data)) =
                        (rec.callback, self.store.get(header.pid))
                    {
                        callback(header.pid, data);
                    }
                }
                result
            }
        };

        // Suppression policy: broadcasts never get a reply (except DUB
        // probes, which answer with the preamble frame), and discovery
        // silence stays silent.
        if is_broadcast && !is_dub {
            return None;
        }
        if is_discovery && matches!(result, HandlerResult::None) {
            return None;
        }

        if is_dub {
            return match result {
                HandlerResult::Ack(_) => {
                    let frame_size =
                        message::encode_disc_response(self.config.uid, &mut self.buffer);
                    self.tx_size = frame_size;
                    Some(frame_size)
                }
                _ => None,
            };
        }

        let (response_type, payload_len) = match result {
            HandlerResult::Ack(n) => (ResponseType::Ack, n),
            HandlerResult::AckOverflow(n) => (ResponseType::AckOverflow, n),
            HandlerResult::AckTimer(delay) => {
                pd_out[..2].copy_from_slice(&delay.to_be_bytes());
                (ResponseType::AckTimer, 2)
            }
            HandlerResult::Nack(reason) => {
                pd_out[..2].copy_from_slice(&reason.to_bytes());
                (ResponseType::NackReason, 2)
            }
            HandlerResult::None | HandlerResult::Invalid => {
                #[cfg(feature = "log")]
                log::warn!("pid {:#06x}: handler failed, nacking", header.pid);
                pd_out[..2].copy_from_slice(&NackReason::HardwareFault.to_bytes());
                (ResponseType::NackReason, 2)
            }
        };

        Some(self.stage_response(&header, response_type, &pd_out[..payload_len]))
    }

    /// Compose a response header around `payload` in the driver buffer.
    fn stage_response(
        &mut self,
        request: &RdmHeader,
        response_type: ResponseType,
        payload: &[u8],
    ) -> usize {
        let response = RdmHeader {
            dest_uid: request.src_uid,
            src_uid: self.config.uid,
            tn: request.tn,
            port_id: response_type as u8,
            message_count: self.store.queue_len() as u8,
            sub_device: request.sub_device,
            cc: request.cc.response_class(),
            pid: request.pid,
            pdl: payload.len() as u8,
        };
        self.buffer[PD_OFFSET..PD_OFFSET + payload.len()].copy_from_slice(payload);
        let size = response.encode(&mut self.buffer);
        self.tx_size = size;
        size
    }

    fn stage_nack(&mut self, request: &RdmHeader, reason: NackReason) -> usize {
        let payload = reason.to_bytes();
        self.stage_response(request, ResponseType::NackReason, &payload)
    }
}
