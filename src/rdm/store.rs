//! RDM parameter store.
//!
//! An append-only table of parameter records with a bump-allocated storage
//! slab. Records never move once added, so an alias record may safely point
//! into another record's storage at a fixed offset (how DMX_START_ADDRESS
//! shares the DEVICE_INFO block). Deterministic records carry no storage;
//! their handler computes the value on demand.
//!
//! The table is searched linearly. With the typical couple dozen entries
//! that beats any hashing scheme, and it preserves the first-registered-wins
//! lookup order aliases rely on.

use super::types::{CcSupport, NackReason, ParamDataType};
use super::uid::DeviceUid;
use crate::error::{RdmError, RdmResult};
use crate::rdm::message::RdmHeader;

// =============================================================================
// Definitions and Records
// =============================================================================

/// Static description of one registered parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParameterDefinition {
    /// Parameter id
    pub pid: u16,
    /// Data type reported in PARAMETER_DESCRIPTION
    pub data_type: ParamDataType,
    /// Command classes this parameter answers
    pub cc: CcSupport,
    /// Storage (and maximum response PDL) size in bytes
    pub pdl_size: u16,
}

impl ParameterDefinition {
    /// Shorthand constructor.
    #[must_use]
    pub const fn new(pid: u16, data_type: ParamDataType, cc: CcSupport, pdl_size: u16) -> Self {
        Self {
            pid,
            data_type,
            cc,
            pdl_size,
        }
    }
}

/// Range into the parameter-data slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlabRange {
    offset: u16,
    len: u16,
}

/// Outcome of a response handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandlerResult {
    /// No response should be sent
    None,
    /// ACK with this many bytes written to `pd_out`
    Ack(usize),
    /// ACK_TIMER with the carried delay in 100 ms units
    AckTimer(u16),
    /// NACK with the carried reason
    Nack(NackReason),
    /// ACK_OVERFLOW with this many bytes written to `pd_out`
    AckOverflow(usize),
    /// The handler could not interpret the request
    Invalid,
}

/// Everything a response handler may touch.
///
/// Handlers run on the caller task inside `receive`; they must not re-enter
/// the driver. Response emission is the dispatcher's job after the handler
/// returns.
pub struct PidContext<'a> {
    /// This responder's UID
    pub uid: DeviceUid,
    /// The record's slab storage, if it has any
    pub param: Option<&'a mut [u8]>,
    /// The record's format string
    pub format: &'static str,
    /// Discovery mute flag
    pub discovery_muted: &'a mut bool,
    /// Depth of the pending-notification queue
    pub queued: u8,
    /// PIDs currently registered, in registration order
    pub supported: &'a [u16],
}

/// Per-PID response handler.
pub type ResponseHandler =
    fn(ctx: &mut PidContext<'_>, header: &RdmHeader, pd_in: &[u8], pd_out: &mut [u8]) -> HandlerResult;

/// User notification invoked after a SET changes a parameter.
pub type SetCallback = fn(pid: u16, data: &[u8]);

/// One entry in the parameter table.
#[derive(Clone, Copy)]
pub struct ParameterRecord {
    /// Static description
    pub definition: ParameterDefinition,
    /// Storage range, `None` for deterministic parameters
    pub(crate) data: Option<SlabRange>,
    /// On-wire packing descriptor
    pub format: &'static str,
    /// Whether SETs persist to non-volatile storage
    pub nvs: bool,
    /// Response handler
    pub handler: ResponseHandler,
    /// Optional user notification on SET
    pub callback: Option<SetCallback>,
}

// =============================================================================
// Store
// =============================================================================

/// Append-only parameter table with bump-allocated backing storage.
///
/// # Type Parameters
/// * `MAX_PIDS` - Capacity of the parameter table
/// * `PD_SIZE` - Size of the storage slab in bytes
/// * `QUEUE` - Capacity of the pending-notification queue
pub struct ParameterStore<const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize> {
    records: [Option<ParameterRecord>; MAX_PIDS],
    num_params: usize,
    pd: [u8; PD_SIZE],
    pd_head: usize,
    queue: [u16; QUEUE],
    queue_len: usize,
}

impl<const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize>
    ParameterStore<MAX_PIDS, PD_SIZE, QUEUE>
{
    /// Create an empty store. Const-compatible.
    pub const fn new() -> Self {
        Self {
            records: [None; MAX_PIDS],
            num_params: 0,
            pd: [0u8; PD_SIZE],
            pd_head: 0,
            queue: [0u16; QUEUE],
            queue_len: 0,
        }
    }

    /// Number of registered parameters.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.num_params
    }

    /// `true` when no parameter is registered.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.num_params == 0
    }

    /// Bytes of slab consumed so far.
    #[inline(always)]
    pub fn slab_used(&self) -> usize {
        self.pd_head
    }

    /// First record registered under `pid`.
    pub fn find(&self, pid: u16) -> Option<&ParameterRecord> {
        self.records[..self.num_params]
            .iter()
            .flatten()
            .find(|r| r.definition.pid == pid)
    }

    fn find_mut(&mut self, pid: u16) -> Option<&mut ParameterRecord> {
        self.records[..self.num_params]
            .iter_mut()
            .flatten()
            .find(|r| r.definition.pid == pid)
    }

    fn push_record(&mut self, record: ParameterRecord) -> RdmResult<()> {
        if self.num_params >= MAX_PIDS {
            return Err(RdmError::TableFull);
        }
        self.records[self.num_params] = Some(record);
        self.num_params += 1;
        Ok(())
    }

    /// Register a storage-backed parameter.
    ///
    /// Allocates `definition.pdl_size` bytes from the slab and initializes
    /// them from `default_value` (zero-filled when `None`; an over-long
    /// ASCII default is truncated rather than rejected).
    pub fn add_new(
        &mut self,
        definition: ParameterDefinition,
        format: &'static str,
        nvs: bool,
        handler: ResponseHandler,
        default_value: Option<&[u8]>,
    ) -> RdmResult<()> {
        if self.find(definition.pid).is_some() {
            return Err(RdmError::DuplicatePid);
        }
        if self.num_params >= MAX_PIDS {
            return Err(RdmError::TableFull);
        }

        let len = definition.pdl_size as usize;
        if self.pd_head + len > PD_SIZE {
            return Err(RdmError::SlabExhausted);
        }

        let range = SlabRange {
            offset: self.pd_head as u16,
            len: definition.pdl_size,
        };
        self.pd_head += len;

        let storage = &mut self.pd[range.offset as usize..range.offset as usize + len];
        match default_value {
            Some(value) => {
                let n = if definition.data_type == ParamDataType::Ascii {
                    // keep ASCII defaults nul-terminated within the slot
                    value.len().min(len.saturating_sub(1))
                } else {
                    value.len().min(len)
                };
                storage[..n].copy_from_slice(&value[..n]);
                storage[n..].fill(0);
            }
            None => storage.fill(0),
        }

        self.push_record(ParameterRecord {
            definition,
            data: Some(range),
            format,
            nvs,
            handler,
            callback: None,
        })
    }

    /// Register a parameter sharing another parameter's storage.
    ///
    /// The new record's storage is `alias_pid`'s storage starting at
    /// `offset`. Fails when the alias target is absent, deterministic, or
    /// too small to contain the new record.
    pub fn add_alias(
        &mut self,
        definition: ParameterDefinition,
        format: &'static str,
        nvs: bool,
        handler: ResponseHandler,
        alias_pid: u16,
        offset: usize,
    ) -> RdmResult<()> {
        if self.find(definition.pid).is_some() {
            return Err(RdmError::DuplicatePid);
        }

        let target = self.find(alias_pid).ok_or(RdmError::UnknownPid)?;
        let target_range = target.data.ok_or(RdmError::AliasOutOfRange)?;
        let len = definition.pdl_size as usize;
        if offset + len > target_range.len as usize {
            return Err(RdmError::AliasOutOfRange);
        }

        let range = SlabRange {
            offset: target_range.offset + offset as u16,
            len: definition.pdl_size,
        };

        self.push_record(ParameterRecord {
            definition,
            data: Some(range),
            format,
            nvs,
            handler,
            callback: None,
        })
    }

    /// Register a parameter whose value is computed by its handler.
    pub fn add_deterministic(
        &mut self,
        definition: ParameterDefinition,
        format: &'static str,
        handler: ResponseHandler,
    ) -> RdmResult<()> {
        if self.find(definition.pid).is_some() {
            return Err(RdmError::DuplicatePid);
        }

        self.push_record(ParameterRecord {
            definition,
            data: None,
            format,
            nvs: false,
            handler,
            callback: None,
        })
    }

    /// Replace the response handler of a registered parameter.
    pub fn update_response_handler(
        &mut self,
        pid: u16,
        handler: ResponseHandler,
    ) -> RdmResult<()> {
        let record = self.find_mut(pid).ok_or(RdmError::UnknownPid)?;
        record.handler = handler;
        Ok(())
    }

    /// Install or replace the SET notification callback of a parameter.
    pub fn update_callback(&mut self, pid: u16, callback: Option<SetCallback>) -> RdmResult<()> {
        let record = self.find_mut(pid).ok_or(RdmError::UnknownPid)?;
        record.callback = callback;
        Ok(())
    }

    /// Read access to a parameter's storage.
    pub fn get(&self, pid: u16) -> Option<&[u8]> {
        let range = self.find(pid)?.data?;
        Some(&self.pd[range.offset as usize..(range.offset + range.len) as usize])
    }

    /// Overwrite a parameter's storage.
    ///
    /// A no-op on deterministic parameters; `data` beyond the record's
    /// storage is truncated.
    pub fn set(&mut self, pid: u16, data: &[u8]) -> RdmResult<()> {
        let record = self.find(pid).ok_or(RdmError::UnknownPid)?;
        let Some(range) = record.data else {
            return Ok(());
        };
        let storage = &mut self.pd[range.offset as usize..(range.offset + range.len) as usize];
        let n = data.len().min(storage.len());
        storage[..n].copy_from_slice(&data[..n]);
        Ok(())
    }

    /// Mutable view of a record's storage range.
    pub(crate) fn slab_slice_mut(&mut self, range: SlabRange) -> &mut [u8] {
        &mut self.pd[range.offset as usize..(range.offset + range.len) as usize]
    }

    /// Queue `pid` for asynchronous reporting. Idempotent: re-queueing a
    /// pending PID returns its existing index.
    pub fn enqueue(&mut self, pid: u16) -> RdmResult<usize> {
        if let Some(index) = self.queue[..self.queue_len].iter().position(|&p| p == pid) {
            return Ok(index);
        }
        if self.queue_len >= QUEUE {
            return Err(RdmError::QueueFull);
        }
        self.queue[self.queue_len] = pid;
        self.queue_len += 1;
        Ok(self.queue_len - 1)
    }

    /// Depth of the pending-notification queue.
    #[inline(always)]
    pub fn queue_len(&self) -> usize {
        self.queue_len
    }

    /// Pop the oldest pending PID.
    pub fn queue_pop(&mut self) -> Option<u16> {
        if self.queue_len == 0 {
            return None;
        }
        let pid = self.queue[0];
        self.queue.copy_within(1..self.queue_len, 0);
        self.queue_len -= 1;
        Some(pid)
    }

    /// Copy up to `out.len()` registered PIDs into `out`, in registration
    /// order. Returns the count copied.
    pub fn list(&self, out: &mut [u16]) -> usize {
        let n = self.num_params.min(out.len());
        for (slot, record) in out.iter_mut().zip(self.records[..n].iter().flatten()) {
            *slot = record.definition.pid;
        }
        n
    }
}

impl<const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize> Default
    for ParameterStore<MAX_PIDS, PD_SIZE, QUEUE>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdm::types::pid;

    fn nop_handler(
        _ctx: &mut PidContext<'_>,
        _header: &RdmHeader,
        _pd_in: &[u8],
        _pd_out: &mut [u8],
    ) -> HandlerResult {
        HandlerResult::Ack(0)
    }

    type Store = ParameterStore<8, 64, 4>;

    fn word_param(pid: u16) -> ParameterDefinition {
        ParameterDefinition::new(pid, ParamDataType::UnsignedWord, CcSupport::GetSet, 2)
    }

    #[test]
    fn add_and_get_round_trip() {
        let mut store = Store::new();
        store
            .add_new(word_param(0x8000), "w", false, nop_handler, Some(&[0x34, 0x12]))
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0x8000), Some(&[0x34u8, 0x12][..]));
        assert_eq!(store.slab_used(), 2);
    }

    #[test]
    fn default_value_zero_fills() {
        let mut store = Store::new();
        store
            .add_new(word_param(0x8000), "w", false, nop_handler, None)
            .unwrap();
        assert_eq!(store.get(0x8000), Some(&[0u8, 0][..]));
    }

    #[test]
    fn duplicate_pid_rejected_slab_unchanged() {
        let mut store = Store::new();
        store
            .add_new(word_param(0x8000), "w", false, nop_handler, None)
            .unwrap();
        let used = store.slab_used();

        assert_eq!(
            store.add_new(word_param(0x8000), "w", false, nop_handler, None),
            Err(RdmError::DuplicatePid)
        );
        assert_eq!(store.slab_used(), used);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn slab_exhaustion_rejected() {
        let mut store: ParameterStore<8, 4, 4> = ParameterStore::new();
        store
            .add_new(
                ParameterDefinition::new(1, ParamDataType::NotDefined, CcSupport::Get, 4),
                "b",
                false,
                nop_handler,
                None,
            )
            .unwrap();
        assert_eq!(
            store.add_new(word_param(2), "w", false, nop_handler, None),
            Err(RdmError::SlabExhausted)
        );
    }

    #[test]
    fn table_full_rejected() {
        let mut store: ParameterStore<2, 64, 4> = ParameterStore::new();
        store
            .add_new(word_param(1), "w", false, nop_handler, None)
            .unwrap();
        store
            .add_new(word_param(2), "w", false, nop_handler, None)
            .unwrap();
        assert_eq!(
            store.add_new(word_param(3), "w", false, nop_handler, None),
            Err(RdmError::TableFull)
        );
    }

    #[test]
    fn alias_shares_storage() {
        let mut store = Store::new();
        store
            .add_new(
                ParameterDefinition::new(pid::DEVICE_INFO, ParamDataType::NotDefined, CcSupport::Get, 19),
                "wwwlwbbwwb$",
                false,
                nop_handler,
                None,
            )
            .unwrap();
        store
            .add_alias(
                word_param(pid::DMX_START_ADDRESS),
                "w",
                true,
                nop_handler,
                pid::DEVICE_INFO,
                14,
            )
            .unwrap();

        // writing through the alias shows up inside the target block
        store.set(pid::DMX_START_ADDRESS, &[0x9A, 0x01]).unwrap();
        let info = store.get(pid::DEVICE_INFO).unwrap();
        assert_eq!(&info[14..16], &[0x9A, 0x01]);

        // aliases consume no new slab space
        assert_eq!(store.slab_used(), 19);
    }

    #[test]
    fn alias_out_of_range_rejected() {
        let mut store = Store::new();
        store
            .add_new(
                ParameterDefinition::new(pid::DEVICE_INFO, ParamDataType::NotDefined, CcSupport::Get, 19),
                "wwwlwbbwwb$",
                false,
                nop_handler,
                None,
            )
            .unwrap();
        assert_eq!(
            store.add_alias(word_param(0x8001), "w", false, nop_handler, pid::DEVICE_INFO, 18),
            Err(RdmError::AliasOutOfRange)
        );
        assert_eq!(
            store.add_alias(word_param(0x8002), "w", false, nop_handler, 0x4242, 0),
            Err(RdmError::UnknownPid)
        );
    }

    #[test]
    fn deterministic_has_no_storage() {
        let mut store = Store::new();
        store
            .add_deterministic(word_param(0x8000), "w", nop_handler)
            .unwrap();
        assert_eq!(store.get(0x8000), None);
        assert_eq!(store.slab_used(), 0);

        // set is a silent no-op
        assert_eq!(store.set(0x8000, &[1, 2]), Ok(()));
        assert_eq!(store.get(0x8000), None);
    }

    #[test]
    fn set_unknown_pid_fails() {
        let mut store = Store::new();
        assert_eq!(store.set(0x4242, &[0]), Err(RdmError::UnknownPid));
    }

    #[test]
    fn update_handler_requires_registration() {
        let mut store = Store::new();
        assert_eq!(
            store.update_response_handler(0x4242, nop_handler),
            Err(RdmError::UnknownPid)
        );

        store
            .add_new(word_param(0x8000), "w", false, nop_handler, None)
            .unwrap();
        assert!(store.update_response_handler(0x8000, nop_handler).is_ok());
        assert!(store.update_callback(0x8000, None).is_ok());
    }

    #[test]
    fn enqueue_is_idempotent() {
        let mut store = Store::new();
        let first = store.enqueue(0x8000).unwrap();
        let second = store.enqueue(0x8000).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.queue_len(), 1);

        store.enqueue(0x8001).unwrap();
        assert_eq!(store.queue_len(), 2);
    }

    #[test]
    fn enqueue_full_rejected() {
        let mut store: ParameterStore<8, 64, 2> = ParameterStore::new();
        store.enqueue(1).unwrap();
        store.enqueue(2).unwrap();
        assert_eq!(store.enqueue(3), Err(RdmError::QueueFull));
    }

    #[test]
    fn queue_pops_in_order() {
        let mut store = Store::new();
        store.enqueue(0x10).unwrap();
        store.enqueue(0x20).unwrap();
        assert_eq!(store.queue_pop(), Some(0x10));
        assert_eq!(store.queue_pop(), Some(0x20));
        assert_eq!(store.queue_pop(), None);
    }

    #[test]
    fn list_returns_registration_order() {
        let mut store = Store::new();
        store
            .add_new(word_param(0x30), "w", false, nop_handler, None)
            .unwrap();
        store
            .add_new(word_param(0x10), "w", false, nop_handler, None)
            .unwrap();
        store
            .add_deterministic(word_param(0x20), "w", nop_handler)
            .unwrap();

        let mut out = [0u16; 8];
        let n = store.list(&mut out);
        assert_eq!(n, 3);
        assert_eq!(&out[..3], &[0x30, 0x10, 0x20]);
    }

    #[test]
    fn find_returns_first_inserted() {
        let mut store = Store::new();
        store
            .add_new(word_param(0x8000), "w", false, nop_handler, None)
            .unwrap();
        let record = store.find(0x8000).unwrap();
        assert_eq!(record.definition.pid, 0x8000);
        assert!(store.find(0x4242).is_none());
    }
}
