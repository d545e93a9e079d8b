//! Trust-evaluation error types
//!
//! This module defines the error taxonomy for certificate parsing, chain
//! validation and OCSP revocation checking.

/// Errors that can occur during trust evaluation
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// Certificate DER/ASN.1 decoding failed
    #[error("certificate parse error: {0}")]
    CertificateParse(String),

    /// An X.509v3 extension (e.g. Authority Information Access) is malformed.
    /// Degrades to "no OCSP for this link", it does not abort the evaluation.
    #[error("extension parse error: {0}")]
    ExtensionParse(String),

    /// Baseline chain-of-trust validation failed (signature chain, root
    /// anchor or name matching). Always a hard reject.
    #[error("chain validation failed: {0}")]
    ChainValidation(String),

    /// OCSP network failure or timeout. Soft, governed by the configured
    /// revocation policy.
    #[error("OCSP transport error: {0}")]
    OcspTransport(String),

    /// OCSP response is malformed, of an unsupported type, or failed the
    /// nonce check. Treated as status `unknown` under the soft policy.
    #[error("OCSP response error: {0}")]
    OcspResponse(String),

    /// `evaluate` was called a second time on the same request. Caller bug.
    #[error("trust evaluation already performed for this request")]
    AlreadyEvaluated,

    /// Invalid OCSP responder URL
    #[error("invalid OCSP responder URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl TrustError {
    /// True for errors the evaluator absorbs into the soft-fail policy
    /// instead of propagating as a hard reject.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            TrustError::OcspTransport(_)
                | TrustError::OcspResponse(_)
                | TrustError::ExtensionParse(_)
        )
    }
}
