//! The per-flow inspection engine.
//!
//! The engine owns the DNS sub-engine and the protocol detector and drives
//! the per-packet pipeline: resolve the flow's domain from whatever evidence
//! is available, then recompute the decision. Resolution mutates evidence
//! only; the decision is a pure function of the context.
//!
//! Thread model: any method may be called from any thread, but a single
//! [`FlowContext`] must not be mutated concurrently - ownership passes to
//! the engine for the duration of a call and cleanly back to the host. The
//! only cross-flow shared state is the DNS sub-engine, which serializes
//! internally.

use std::sync::OnceLock;

use flowspect_core::{FlowContext, FlowDecision, PathDecision};
use flowspect_dns::DnsEngine;

use crate::config::EngineConfig;
use crate::detect::Detector;

/// Per-flow inspection engine.
///
/// One instance per process is the normal deployment (see
/// [`FlowEngine::shared`]); tests construct isolated instances so cache
/// state never leaks between them.
#[derive(Debug, Default)]
pub struct FlowEngine {
    dns: DnsEngine,
    detector: Detector,
}

impl FlowEngine {
    /// Creates an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine from explicit configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            dns: DnsEngine::with_capacity(config.dns_cache_capacity),
            detector: Detector::with_http_scan_limit(config.http_scan_limit),
        }
    }

    /// Process-wide shared instance, lazily initialized on first access.
    ///
    /// All flows handled through the shared instance see the same DNS cache
    /// and reverse index, which is what makes arrive-time domain resolution
    /// work across flows.
    pub fn shared() -> &'static FlowEngine {
        static ENGINE: OnceLock<FlowEngine> = OnceLock::new();
        ENGINE.get_or_init(FlowEngine::new)
    }

    /// The DNS sub-engine, for hosts that pre-seed or inspect its caches.
    pub fn dns(&self) -> &DnsEngine {
        &self.dns
    }

    /// Resets the DNS response cache and the reverse index. The engine
    /// itself stays alive.
    pub fn clear_cache(&self) {
        self.dns.clear_cache();
    }

    /// Called when a flow's identity is first known, before any payload.
    ///
    /// Resolves the domain from the reverse index if possible, then makes
    /// the initial decision. Calling it again on an unchanged context leaves
    /// the context unchanged.
    pub fn flow_arrive(&self, ctx: &mut FlowContext) {
        self.resolve_domain_from_cache(ctx);
        self.reevaluate_decision(ctx);
    }

    /// Called when a flow is about to open. Reserved extension point.
    pub fn flow_open(&self, ctx: &mut FlowContext) {
        if ctx.flow_decision == FlowDecision::Block {
            // Blocked flows get no further processing.
            return;
        }
    }

    /// Processes an outbound packet.
    ///
    /// DNS queries go to the sub-engine for domain bookkeeping (any cached
    /// response is discarded - use [`FlowEngine::flow_send_probe_dns`] to
    /// receive it). Other traffic runs the resolve/reevaluate pipeline.
    pub fn flow_send(&self, ctx: &mut FlowContext, packet: &[u8]) {
        if packet.is_empty() {
            return;
        }
        if ctx.is_dns() {
            let _ = self.dns.handle_query(ctx, packet);
            return;
        }
        if self.resolve_domain(ctx, packet) {
            self.reevaluate_decision(ctx);
        }
    }

    /// Processes an outbound packet, probing the DNS cache.
    ///
    /// For a DNS flow, returns the cached response image on a hit; the
    /// caller must send those bytes back to the client instead of forwarding
    /// the query upstream. Always `None` for non-DNS traffic.
    pub fn flow_send_probe_dns(&self, ctx: &mut FlowContext, packet: &[u8]) -> Option<Vec<u8>> {
        if packet.is_empty() {
            return None;
        }
        if ctx.is_dns() {
            return self.dns.handle_query(ctx, packet);
        }
        if self.resolve_domain(ctx, packet) {
            self.reevaluate_decision(ctx);
        }
        None
    }

    /// Processes an inbound packet.
    ///
    /// DNS responses feed the sub-engine (reverse index and response cache);
    /// other traffic runs the resolve/reevaluate pipeline.
    pub fn flow_recv(&self, ctx: &mut FlowContext, packet: &[u8]) {
        if packet.is_empty() {
            return;
        }
        if ctx.is_dns() {
            self.dns.handle_response(ctx, packet);
            return;
        }
        if self.resolve_domain(ctx, packet) {
            self.reevaluate_decision(ctx);
        }
    }

    /// Called when a flow closes. Reserved extension point.
    pub fn flow_close(&self, ctx: &mut FlowContext) {
        tracing::trace!(session = ctx.session_id, "flow closed");
    }

    /// Fills the domain list from the reverse index by destination address.
    ///
    /// Returns true when new domains were learned. Flows that already carry
    /// a domain, and flows without a known address, are left alone.
    fn resolve_domain_from_cache(&self, ctx: &mut FlowContext) -> bool {
        if ctx.has_domain() || ctx.dst_ip.is_unknown() {
            return false;
        }
        let domains = self.dns.domains_for_ip(ctx.raw_ip_string());
        if domains.is_empty() {
            return false;
        }
        tracing::debug!(
            ip = ctx.raw_ip_string(),
            count = domains.len(),
            "resolved domains from reverse index"
        );
        ctx.add_domains(domains)
    }

    /// Fills the domain list from the reverse index, falling back to payload
    /// parsing. Returns true when new domains were learned.
    fn resolve_domain(&self, ctx: &mut FlowContext, packet: &[u8]) -> bool {
        if ctx.has_domain() {
            return false;
        }
        if self.resolve_domain_from_cache(ctx) {
            return true;
        }
        let (_protocol, domain) = self.detector.extract_domain(ctx, packet);
        match domain {
            Some(domain) => ctx.add_domain(domain),
            None => false,
        }
    }

    /// Recomputes the flow and path decisions from the context.
    ///
    /// Sole writer of both decision fields, so future policy rules (domain
    /// blocklists, port rules) have exactly one home. Pure in the context
    /// and idempotent: identical evidence yields identical decisions. The
    /// current policy admits everything on the local path.
    fn reevaluate_decision(&self, ctx: &mut FlowContext) {
        ctx.flow_decision = FlowDecision::Allow;
        ctx.path_decision = PathDecision::Local;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{build_client_hello, build_dns_a_response, build_dns_query};
    use flowspect_core::{FlowDirection, FlowType};

    fn dns_ctx() -> FlowContext {
        FlowContext::new(
            FlowType::Udp,
            FlowDirection::Outbound,
            "8.8.8.8".parse().unwrap(),
            53,
        )
    }

    fn tcp_ctx(ip: &str, port: u16) -> FlowContext {
        FlowContext::new(
            FlowType::Tcp,
            FlowDirection::Outbound,
            ip.parse().unwrap(),
            port,
        )
    }

    // ==================== DNS Path Tests ====================

    #[test]
    fn dns_cache_hit_rewrites_transaction_id() {
        let engine = FlowEngine::new();
        let response = build_dns_a_response(0x1234, "example.com", &[[93, 184, 216, 34]], 300);
        engine.flow_recv(&mut dns_ctx(), &response);

        let mut ctx = dns_ctx();
        let query = build_dns_query(0xABCD, "example.com", 1);
        let hit = engine.flow_send_probe_dns(&mut ctx, &query).unwrap();

        assert_eq!(&hit[0..2], &[0xAB, 0xCD]);
        assert_eq!(&hit[2..], &response[2..]);
        assert_eq!(ctx.domains, vec!["example.com"]);
    }

    #[test]
    fn dns_flow_send_without_probe_still_learns_domain() {
        let engine = FlowEngine::new();
        let mut ctx = dns_ctx();
        engine.flow_send(&mut ctx, &build_dns_query(1, "example.com", 1));
        assert_eq!(ctx.domains, vec!["example.com"]);
    }

    #[test]
    fn reverse_index_spans_cname_chain() {
        // www.baidu.com CNAME www.a.shifen.com with two A records.
        let mut response = build_dns_query(2, "www.baidu.com", 1);
        response[2] = 0x81;
        response[3] = 0x80;
        response[6..8].copy_from_slice(&3u16.to_be_bytes());
        let cname_rdata = crate::testutil::encode_name("www.a.shifen.com");
        response.extend_from_slice(&[0xC0, 0x0C]);
        response.extend_from_slice(&5u16.to_be_bytes());
        response.extend_from_slice(&1u16.to_be_bytes());
        response.extend_from_slice(&120u32.to_be_bytes());
        response.extend_from_slice(&(cname_rdata.len() as u16).to_be_bytes());
        response.extend_from_slice(&cname_rdata);
        for ip in [[183, 2, 172, 177], [183, 2, 172, 17]] {
            response.extend_from_slice(&crate::testutil::encode_name("www.a.shifen.com"));
            response.extend_from_slice(&1u16.to_be_bytes());
            response.extend_from_slice(&1u16.to_be_bytes());
            response.extend_from_slice(&300u32.to_be_bytes());
            response.extend_from_slice(&4u16.to_be_bytes());
            response.extend_from_slice(&ip);
        }

        let engine = FlowEngine::new();
        let mut ctx = dns_ctx();
        engine.flow_recv(&mut ctx, &response);

        for ip in ["183.2.172.177", "183.2.172.17"] {
            let domains = engine.dns().domains_for_ip(ip);
            assert!(domains.contains(&"www.baidu.com".to_string()), "{ip}");
            assert!(domains.contains(&"www.a.shifen.com".to_string()), "{ip}");
        }
        assert!(ctx.domains.contains(&"www.baidu.com".to_string()));
        assert!(ctx.domains.contains(&"www.a.shifen.com".to_string()));
    }

    #[test]
    fn malformed_dns_response_is_ignored() {
        let engine = FlowEngine::new();
        let mut ctx = dns_ctx();

        let mut state = 0x1F123BB5u32;
        let mut garbage = Vec::with_capacity(200);
        for _ in 0..200 {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            garbage.push((state >> 24) as u8);
        }
        garbage[2] = 0x80;
        garbage[4] = 0;
        garbage[5] = 1;
        garbage[12] = 0xC0; // question name points at itself
        garbage[13] = 0x0C;

        engine.flow_recv(&mut ctx, &garbage);

        assert!(ctx.domains.is_empty());
        assert_eq!(engine.dns().cache_len(), 0);
        assert_eq!(engine.dns().index_len(), 0);
        assert_eq!(ctx.flow_decision, FlowDecision::Allow);
    }

    // ==================== Payload Extraction Tests ====================

    #[test]
    fn sni_extraction_over_https_flow() {
        let engine = FlowEngine::new();
        let mut ctx = tcp_ctx("220.181.174.34", 443);
        engine.flow_send(&mut ctx, &build_client_hello(Some("www.baidu.com")));

        assert_eq!(ctx.domains, vec!["www.baidu.com"]);
        assert_eq!(ctx.flow_decision, FlowDecision::Allow);
        assert_eq!(ctx.path_decision, PathDecision::Local);
    }

    #[test]
    fn host_extraction_over_http_flow() {
        let engine = FlowEngine::new();
        let mut ctx = tcp_ctx("93.184.216.34", 80);
        engine.flow_send(&mut ctx, b"GET / HTTP/1.1\r\nHost: api.example.com\r\n\r\n");
        assert_eq!(ctx.domains, vec!["api.example.com"]);
    }

    #[test]
    fn existing_domain_short_circuits_parsing() {
        let engine = FlowEngine::new();
        let mut ctx = tcp_ctx("93.184.216.34", 80);
        ctx.add_domain("already.example.com");
        engine.flow_send(&mut ctx, b"GET / HTTP/1.1\r\nHost: other.example.com\r\n\r\n");
        assert_eq!(ctx.domains, vec!["already.example.com"]);
    }

    #[test]
    fn probe_dns_returns_none_for_non_dns_traffic() {
        let engine = FlowEngine::new();
        let mut ctx = tcp_ctx("93.184.216.34", 80);
        let result = engine.flow_send_probe_dns(
            &mut ctx,
            b"GET / HTTP/1.1\r\nHost: api.example.com\r\n\r\n",
        );
        assert!(result.is_none());
        assert_eq!(ctx.domains, vec!["api.example.com"]);
    }

    // ==================== Arrive / Reverse Lookup Tests ====================

    #[test]
    fn arrive_resolves_domain_from_reverse_index() {
        let engine = FlowEngine::new();
        let response = build_dns_a_response(1, "example.com", &[[93, 184, 216, 34]], 300);
        engine.flow_recv(&mut dns_ctx(), &response);

        let mut ctx = tcp_ctx("93.184.216.34", 443);
        engine.flow_arrive(&mut ctx);

        // No packet was inspected and the domain is already known.
        assert_eq!(ctx.domains, vec!["example.com"]);
        assert_eq!(ctx.flow_decision, FlowDecision::Allow);
        assert_eq!(ctx.path_decision, PathDecision::Local);
    }

    #[test]
    fn arrive_twice_is_idempotent() {
        let engine = FlowEngine::new();
        let response = build_dns_a_response(1, "example.com", &[[93, 184, 216, 34]], 300);
        engine.flow_recv(&mut dns_ctx(), &response);

        let mut ctx = tcp_ctx("93.184.216.34", 443);
        engine.flow_arrive(&mut ctx);
        let domains = ctx.domains.clone();
        let decision = (ctx.flow_decision, ctx.path_decision);

        engine.flow_arrive(&mut ctx);
        assert_eq!(ctx.domains, domains);
        assert_eq!((ctx.flow_decision, ctx.path_decision), decision);
    }

    #[test]
    fn arrive_with_unknown_ip_is_a_noop_resolution() {
        let engine = FlowEngine::new();
        let mut ctx = FlowContext::default();
        ctx.dst_port = 443;
        engine.flow_arrive(&mut ctx);
        assert!(ctx.domains.is_empty());
        assert_eq!(ctx.flow_decision, FlowDecision::Allow);
    }

    #[test]
    fn arrive_probes_v6_destinations() {
        // AAAA response indexes the IPv6 address; a later v6 flow resolves.
        let mut response = build_dns_query(3, "v6.example.com", 28);
        response[2] = 0x81;
        response[3] = 0x80;
        response[6..8].copy_from_slice(&1u16.to_be_bytes());
        let mut rdata = [0u8; 16];
        rdata[0] = 0x20;
        rdata[1] = 0x01;
        rdata[15] = 0x07;
        response.extend_from_slice(&[0xC0, 0x0C]);
        response.extend_from_slice(&28u16.to_be_bytes());
        response.extend_from_slice(&1u16.to_be_bytes());
        response.extend_from_slice(&60u32.to_be_bytes());
        response.extend_from_slice(&16u16.to_be_bytes());
        response.extend_from_slice(&rdata);
        let engine = FlowEngine::new();
        engine.flow_recv(&mut dns_ctx(), &response);

        let mut ctx = tcp_ctx("2001::7", 443);
        engine.flow_arrive(&mut ctx);
        assert_eq!(ctx.domains, vec!["v6.example.com"]);
    }

    // ==================== Lifecycle / Decision Tests ====================

    #[test]
    fn empty_packets_mutate_nothing() {
        let engine = FlowEngine::new();
        let mut ctx = tcp_ctx("93.184.216.34", 80);
        engine.flow_send(&mut ctx, &[]);
        engine.flow_recv(&mut ctx, &[]);
        assert!(engine.flow_send_probe_dns(&mut ctx, &[]).is_none());
        assert!(ctx.domains.is_empty());
    }

    #[test]
    fn decision_is_pure_in_the_context() {
        let engine = FlowEngine::new();
        let mut a = tcp_ctx("93.184.216.34", 443);
        let mut b = tcp_ctx("93.184.216.34", 443);
        a.add_domain("example.com");
        b.add_domain("example.com");

        engine.reevaluate_decision(&mut a);
        engine.reevaluate_decision(&mut b);

        assert_eq!(a.flow_decision, b.flow_decision);
        assert_eq!(a.path_decision, b.path_decision);
    }

    #[test]
    fn open_and_close_are_noops() {
        let engine = FlowEngine::new();
        let mut ctx = tcp_ctx("93.184.216.34", 443);
        ctx.add_domain("example.com");
        let before = ctx.domains.clone();

        engine.flow_open(&mut ctx);
        engine.flow_close(&mut ctx);

        assert_eq!(ctx.domains, before);
        assert_eq!(ctx.flow_decision, FlowDecision::Allow);
    }

    #[test]
    fn clear_cache_forgets_reverse_index() {
        let engine = FlowEngine::new();
        let response = build_dns_a_response(1, "example.com", &[[93, 184, 216, 34]], 300);
        engine.flow_recv(&mut dns_ctx(), &response);
        engine.clear_cache();

        let mut ctx = tcp_ctx("93.184.216.34", 443);
        engine.flow_arrive(&mut ctx);
        assert!(ctx.domains.is_empty());
        assert!(engine.dns().domains_for_ip("93.184.216.34").is_empty());
    }

    #[test]
    fn shared_instance_is_a_singleton() {
        let a = FlowEngine::shared() as *const FlowEngine;
        let b = FlowEngine::shared() as *const FlowEngine;
        assert_eq!(a, b);
    }

    #[test]
    fn isolated_engines_do_not_share_state() {
        let a = FlowEngine::new();
        let b = FlowEngine::new();
        a.flow_recv(
            &mut dns_ctx(),
            &build_dns_a_response(1, "example.com", &[[93, 184, 216, 34]], 300),
        );
        assert!(!a.dns().domains_for_ip("93.184.216.34").is_empty());
        assert!(b.dns().domains_for_ip("93.184.216.34").is_empty());
    }

    #[test]
    fn concurrent_flows_share_the_dns_engine() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(FlowEngine::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                thread::spawn(move || {
                    let name = format!("host{i}.test");
                    let response =
                        build_dns_a_response(i as u16, &name, &[[10, 0, 0, i as u8]], 300);
                    engine.flow_recv(&mut dns_ctx(), &response);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            assert_eq!(
                engine.dns().domains_for_ip(&format!("10.0.0.{i}")),
                vec![format!("host{i}.test")]
            );
        }
    }
}
