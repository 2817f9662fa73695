//! Construction-time engine tunables.
//!
//! The library defines no CLI, environment variables or on-disk state;
//! loading a configuration from wherever the host keeps it is host concern.
//! This struct is the full surface the engine exposes.

use serde::{Deserialize, Serialize};

use flowspect_dns::DEFAULT_CACHE_CAPACITY;

/// How many bytes of an HTTP packet the `Host:` scan inspects.
pub const DEFAULT_HTTP_SCAN_LIMIT: usize = 2048;

/// Engine construction parameters.
///
/// ```
/// use flowspect_engine::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.dns_cache_capacity, 2048);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of cached DNS responses.
    pub dns_cache_capacity: usize,
    /// Byte budget for the HTTP `Host:` header scan. A header that straddles
    /// this boundary is silently missed.
    pub http_scan_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dns_cache_capacity: DEFAULT_CACHE_CAPACITY,
            http_scan_limit: DEFAULT_HTTP_SCAN_LIMIT,
        }
    }
}
