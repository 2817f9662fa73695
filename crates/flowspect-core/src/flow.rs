//! Flow addresses, per-flow context and routing decisions.
//!
//! A [`FlowContext`] is created by the host when a flow's identity becomes
//! known, threaded through every engine call for that flow, and discarded
//! after close. The engine mutates the evidence (`domains`) and the two
//! decision fields; everything else is host-provided identity.
//!
//! ## Usage
//!
//! ```
//! use flowspect_core::{FlowContext, FlowDirection, FlowIp, FlowType};
//!
//! let mut ctx = FlowContext::new(
//!     FlowType::Tcp,
//!     FlowDirection::Outbound,
//!     "93.184.216.34".parse().unwrap(),
//!     443,
//! );
//!
//! assert!(!ctx.is_dns());
//! assert!(ctx.add_domain("example.com"));
//! assert!(!ctx.add_domain("example.com")); // duplicates are ignored
//! assert_eq!(ctx.raw_ip_string(), "93.184.216.34");
//! ```

use std::cell::OnceCell;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a textual address cannot be parsed into a [`FlowIp`].
#[derive(Debug, Error)]
#[error("invalid IP address: {0:?}")]
pub struct AddrError(pub String);

// =============================================================================
// FlowIp
// =============================================================================

/// Destination address of a flow.
///
/// Parsing a textual address yields the narrowest form: an IPv4-mapped IPv6
/// address (`::ffff:a.b.c.d`) collapses to the `V4` branch. `Unknown` is the
/// state before the host has learned the address; it never participates in
/// the reverse DNS index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FlowIp {
    /// Address not (yet) known.
    #[default]
    Unknown,
    /// IPv4 address.
    V4(Ipv4Addr),
    /// IPv6 address.
    V6(Ipv6Addr),
}

impl FlowIp {
    /// Builds an IPv4 address from its big-endian integer form
    /// (`u32::from_be_bytes` over the wire octets).
    pub fn from_ipv4(addr: u32) -> Self {
        FlowIp::V4(Ipv4Addr::from(addr))
    }

    /// Builds an IPv6 address from its two big-endian 64-bit halves.
    pub fn from_ipv6(hi: u64, lo: u64) -> Self {
        FlowIp::V6(Ipv6Addr::from(((hi as u128) << 64) | lo as u128))
    }

    /// Returns true if the address is not known.
    pub fn is_unknown(&self) -> bool {
        matches!(self, FlowIp::Unknown)
    }

    /// Returns true for an IPv4 address.
    pub fn is_v4(&self) -> bool {
        matches!(self, FlowIp::V4(_))
    }

    /// Returns true for an IPv6 address.
    pub fn is_v6(&self) -> bool {
        matches!(self, FlowIp::V6(_))
    }

    /// Canonical textual form without brackets, suitable as an index key.
    ///
    /// `Unknown` yields the empty string, which the reverse index rejects.
    pub fn raw_string(&self) -> String {
        match self {
            FlowIp::Unknown => String::new(),
            FlowIp::V4(addr) => addr.to_string(),
            FlowIp::V6(addr) => addr.to_string(),
        }
    }
}

impl fmt::Display for FlowIp {
    /// Display form for logs: IPv6 is enclosed in brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowIp::Unknown => write!(f, "unknown"),
            FlowIp::V4(addr) => write!(f, "{addr}"),
            FlowIp::V6(addr) => write!(f, "[{addr}]"),
        }
    }
}

impl From<IpAddr> for FlowIp {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => FlowIp::V4(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => FlowIp::V4(v4),
                None => FlowIp::V6(v6),
            },
        }
    }
}

impl FromStr for FlowIp {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>()
            .map(FlowIp::from)
            .map_err(|_| AddrError(s.to_string()))
    }
}

// =============================================================================
// Transport and decision enums
// =============================================================================

/// Transport classification of a flow as handed in by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    /// TCP flow.
    #[default]
    Tcp,
    /// UDP flow.
    Udp,
    /// DNS flow (the host may tag port-53 traffic up front).
    Dns,
}

impl FlowType {
    /// Returns the flow type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Dns => "dns",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a flow relative to the inspected host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    /// Locally initiated, towards a remote peer.
    #[default]
    Outbound,
    /// Remotely initiated, towards the local host.
    Inbound,
}

impl FlowDirection {
    /// Returns the direction as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::Inbound => "inbound",
        }
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Admission decision for a flow.
///
/// The engine only ever writes this from `reevaluate_decision`; a malformed
/// packet can never flip an allowed flow to blocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDecision {
    /// Drop the flow.
    Block,
    /// Let the flow through.
    #[default]
    Allow,
}

impl FlowDecision {
    /// Returns the decision as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Allow => "allow",
        }
    }
}

impl fmt::Display for FlowDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Routing path selected for an allowed flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathDecision {
    /// No path selected yet.
    None,
    /// Bypass the proxy entirely.
    Direct,
    /// Handle on the local proxy path.
    #[default]
    Local,
    /// Forward through the configured gateway.
    Gateway,
}

impl PathDecision {
    /// Returns the path as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Direct => "direct",
            Self::Local => "local",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for PathDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// FlowContext
// =============================================================================

/// Mutable per-flow record threaded through the inspection engine.
///
/// The context is owned by one caller at a time; the engine never retains a
/// reference past a call. Identity fields are informational and set by the
/// host; `domains` and the two decision fields are engine-owned between
/// `flow_arrive` and `flow_close`.
#[derive(Debug, Clone, Default)]
pub struct FlowContext {
    /// Opaque host-assigned session identifier.
    pub session_id: u64,
    /// Flow creation timestamp in nanoseconds (host clock).
    pub timestamp_ns: u64,
    /// Originating process id.
    pub pid: u32,
    /// Originating process name.
    pub process_name: String,
    /// Originating process executable path.
    pub process_path: String,
    /// Transport classification.
    pub flow_type: FlowType,
    /// Flow direction.
    pub direction: FlowDirection,
    /// Destination address. Set this before the first call that formats it;
    /// the memoized strings are computed once.
    pub dst_ip: FlowIp,
    /// Destination port.
    pub dst_port: u16,
    /// Accumulated server names, insertion-ordered and deduplicated.
    pub domains: Vec<String>,
    /// Admission decision, defaults to [`FlowDecision::Allow`].
    pub flow_decision: FlowDecision,
    /// Path decision, defaults to [`PathDecision::Local`].
    pub path_decision: PathDecision,

    ip_display: OnceCell<String>,
    ip_raw: OnceCell<String>,
}

impl FlowContext {
    /// Creates a context from the transport tuple; identity fields start at
    /// their defaults and can be filled in directly.
    pub fn new(
        flow_type: FlowType,
        direction: FlowDirection,
        dst_ip: FlowIp,
        dst_port: u16,
    ) -> Self {
        Self {
            flow_type,
            direction,
            dst_ip,
            dst_port,
            ..Self::default()
        }
    }

    /// Returns true if this flow targets the DNS port.
    pub fn is_dns(&self) -> bool {
        self.dst_port == 53
    }

    /// Returns true once at least one domain has been learned.
    pub fn has_domain(&self) -> bool {
        !self.domains.is_empty()
    }

    /// Appends a domain unless it is empty or already present.
    ///
    /// Returns true if the list grew.
    pub fn add_domain(&mut self, domain: impl Into<String>) -> bool {
        let domain = domain.into();
        if domain.is_empty() || self.domains.contains(&domain) {
            return false;
        }
        self.domains.push(domain);
        true
    }

    /// Appends every new domain from `domains`, preserving insertion order.
    ///
    /// Returns true if at least one domain was added.
    pub fn add_domains<I, S>(&mut self, domains: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = false;
        for domain in domains {
            added |= self.add_domain(domain);
        }
        added
    }

    /// Destination address for display, memoized. IPv6 is bracketed.
    pub fn ip_string(&self) -> &str {
        self.ip_display.get_or_init(|| self.dst_ip.to_string())
    }

    /// Destination address without brackets, memoized. Used as the reverse
    /// index key.
    pub fn raw_ip_string(&self) -> &str {
        self.ip_raw.get_or_init(|| self.dst_ip.raw_string())
    }

    /// One-line summary for debugging and host-side logging.
    pub fn description(&self) -> String {
        let domain = self.domains.first().map(String::as_str).unwrap_or("-");
        format!(
            "flow {:#x} {} {} -> {}:{} proc={} domain={} decision={}/{}",
            self.session_id,
            self.flow_type,
            self.direction,
            self.ip_string(),
            self.dst_port,
            if self.process_name.is_empty() {
                "?"
            } else {
                self.process_name.as_str()
            },
            domain,
            self.flow_decision,
            self.path_decision,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
