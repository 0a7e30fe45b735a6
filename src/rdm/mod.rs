//! RDM (ANSI E1.20) protocol layer.
//!
//! The protocol vocabulary ([`types`], [`uid`], [`message`]) is always
//! compiled: the bus engine needs it to classify outbound frames and to
//! time inter-packet spacing even on pure controllers. The responder layer
//! ([`store`], [`responder`]) sits behind the `rdm` feature.
//!
//! # Overview
//!
//! - [`uid`]: 48-bit unique identifiers and broadcast targeting
//! - [`types`]: start codes, command classes, response types, NACK reasons
//! - [`message`]: header codec, checksum, discovery-response framing
//! - [`format`]: format-string parameter packing
//! - [`store`]: the per-port parameter table, slab, and queue
//! - [`responder`]: request dispatch and the built-in handlers

pub mod format;
pub mod message;
pub mod types;
pub mod uid;

#[cfg(feature = "rdm")]
#[cfg_attr(docsrs, doc(cfg(feature = "rdm")))]
pub mod responder;
#[cfg(feature = "rdm")]
#[cfg_attr(docsrs, doc(cfg(feature = "rdm")))]
pub mod store;

pub use message::RdmHeader;
pub use types::{CcSupport, CommandClass, NackReason, ParamDataType, ResponseType};
pub use uid::DeviceUid;

#[cfg(feature = "rdm")]
pub use store::{
    HandlerResult, ParameterDefinition, ParameterRecord, ParameterStore, PidContext,
    ResponseHandler, SetCallback,
};
