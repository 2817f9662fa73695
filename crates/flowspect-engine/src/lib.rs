//! Flowspect Engine - per-flow inspection pipeline.
//!
//! The engine drives one pipeline over every packet of a flow:
//!
//! ```text
//! Host ──ctx,pkt──▶ FlowEngine ──▶ DNS flow?  ──▶ DnsEngine (cache, index)
//!                        │
//!                        └──▶ resolve_domain (reverse index, then payload
//!                             parse) ──▶ reevaluate_decision
//! ```
//!
//! Resolution mutates evidence only; the decision is a pure function of the
//! evidence. Every fact source - the reverse DNS index, TLS SNI, the HTTP
//! `Host:` header - looks the same to the decision step.
//!
//! ## Modules
//!
//! - [`config`] - construction-time tunables
//! - [`detect`] - protocol detection and domain extractors
//! - [`engine`] - the [`FlowEngine`] itself
//!
//! ## Usage
//!
//! ```
//! use flowspect_core::{FlowContext, FlowDirection, FlowType};
//! use flowspect_engine::FlowEngine;
//!
//! let engine = FlowEngine::new();
//! let mut ctx = FlowContext::new(
//!     FlowType::Tcp,
//!     FlowDirection::Outbound,
//!     "93.184.216.34".parse().unwrap(),
//!     80,
//! );
//!
//! engine.flow_arrive(&mut ctx);
//! engine.flow_send(&mut ctx, b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
//! assert_eq!(ctx.domains, vec!["example.com"]);
//! ```

pub mod config;
pub mod detect;
pub mod engine;

pub use config::{EngineConfig, DEFAULT_HTTP_SCAN_LIMIT};
pub use detect::Detector;
pub use engine::FlowEngine;
