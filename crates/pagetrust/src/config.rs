//! Configuration types for trust evaluation and OCSP revocation checking

use serde::{Deserialize, Serialize};

/// Policy applied when an OCSP check is inconclusive (responder returned
/// `unknown`, the response was malformed, or the fetch failed/timed out).
///
/// This is a security posture decision: fail-open preserves availability at
/// the cost of strict revocation checking, fail-closed does the opposite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevocationPolicy {
    /// Accept the connection but flag it as having unverified revocation
    /// status (`Disposition::AcceptWithWarning`).
    FailOpen,

    /// Reject the connection whenever revocation status cannot be confirmed.
    FailClosed,
}

/// Default revocation posture. Fail-open matches the behavior of browsers
/// that treat OCSP as advisory; operators who need strict revocation
/// checking must set [`RevocationPolicy::FailClosed`] explicitly.
pub const DEFAULT_REVOCATION_POLICY: RevocationPolicy = RevocationPolicy::FailOpen;

/// Trust evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Behavior when revocation status cannot be determined
    #[serde(default = "default_policy")]
    pub revocation_policy: RevocationPolicy,

    /// OCSP client configuration
    #[serde(default)]
    pub ocsp: OcspConfig,

    /// Decision cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl EvaluatorConfig {
    /// Configuration with strict revocation checking (fail-closed)
    pub fn strict() -> Self {
        Self {
            revocation_policy: RevocationPolicy::FailClosed,
            ..Self::default()
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            revocation_policy: DEFAULT_REVOCATION_POLICY,
            ocsp: OcspConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// OCSP client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OcspConfig {
    /// Per-request timeout in seconds. Every OCSP fetch is bounded by this;
    /// there is no unbounded wait.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Maximum allowed OCSP response size in bytes
    #[serde(default = "default_max_response_size")]
    pub max_response_size_bytes: usize,

    /// Maximum number of concurrent OCSP fetches within one evaluation
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Include a random nonce in each request and require the responder to
    /// echo it (replay protection). Some public responders pre-generate
    /// responses and do not support nonces.
    #[serde(default)]
    pub enable_nonce: bool,
}

impl Default for OcspConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            max_response_size_bytes: default_max_response_size(),
            max_concurrent_requests: default_max_concurrent(),
            enable_nonce: false,
        }
    }
}

/// Decision cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached decisions (oldest evicted when full)
    #[serde(default = "default_max_cache_entries")]
    pub max_entries: usize,

    /// TTL in seconds for decisions whose OCSP response carried no
    /// `nextUpdate`
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_cache_entries(),
            default_ttl_secs: default_cache_ttl(),
        }
    }
}

// Default value functions for serde

fn default_policy() -> RevocationPolicy {
    DEFAULT_REVOCATION_POLICY
}

fn default_http_timeout() -> u64 {
    5
}

fn default_max_response_size() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_cache_entries() -> usize {
    256
}

fn default_cache_ttl() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_fail_open() {
        let config = EvaluatorConfig::default();
        assert_eq!(config.revocation_policy, RevocationPolicy::FailOpen);
        assert_eq!(config.revocation_policy, DEFAULT_REVOCATION_POLICY);
    }

    #[test]
    fn test_strict_config() {
        let config = EvaluatorConfig::strict();
        assert_eq!(config.revocation_policy, RevocationPolicy::FailClosed);
    }

    #[test]
    fn test_ocsp_config_defaults() {
        let config = OcspConfig::default();
        assert_eq!(config.http_timeout_secs, 5);
        assert_eq!(config.max_response_size_bytes, 1024 * 1024);
        assert_eq!(config.max_concurrent_requests, 4);
        assert!(!config.enable_nonce);
    }

    #[test]
    fn test_policy_serialization() {
        let json = serde_json::to_string(&RevocationPolicy::FailOpen).unwrap();
        assert_eq!(json, "\"fail_open\"");

        let json = serde_json::to_string(&RevocationPolicy::FailClosed).unwrap();
        assert_eq!(json, "\"fail_closed\"");
    }

    #[test]
    fn test_config_round_trip() {
        let config = EvaluatorConfig::strict();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EvaluatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EvaluatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EvaluatorConfig::default());
    }
}
