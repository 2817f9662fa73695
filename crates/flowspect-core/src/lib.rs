//! Flowspect Core - Flow identity, evidence and decision model.
//!
//! This crate defines the data types shared by every flowspect crate:
//!
//! - [`flow`] - Flow addresses, per-flow context and routing decisions
//! - [`protocol`] - Application protocol tags produced by detection
//!
//! The types here carry no behavior beyond bookkeeping; the inspection
//! pipeline itself lives in `flowspect-engine` and the DNS machinery in
//! `flowspect-dns`.

pub mod flow;
pub mod protocol;

pub use flow::{
    AddrError, FlowContext, FlowDecision, FlowDirection, FlowIp, FlowType, PathDecision,
};
pub use protocol::Protocol;
