//! TLS trust evaluation for a page loader
//!
//! This crate decides whether a TLS server should be trusted for a page
//! load: baseline chain-of-trust validation over a caller-provided root
//! store, OCSP revocation checking (RFC 6960) across every chain link that
//! names a responder, Extended Validation recognition by policy OID, and a
//! weak-signature deny-list. Every evaluation completes exactly once and
//! can be cancelled when the page load is abandoned.
//!
//! # Example
//!
//! ```rust,no_run
//! use pagetrust::{
//!     CertificateChain, Disposition, EvaluatorConfig, HttpTransport, TrustEvaluation,
//!     TrustEvaluator, WebPkiChainValidator,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     roots: Arc<rustls::RootCertStore>,
//! #     leaf_der: Vec<u8>,
//! #     issuer_der: Vec<u8>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = EvaluatorConfig::default();
//! let evaluator = TrustEvaluator::new(
//!     config.clone(),
//!     Arc::new(WebPkiChainValidator::new(roots)?),
//!     Arc::new(HttpTransport::new(&config.ocsp)?),
//! );
//!
//! let chain = CertificateChain::new(vec![leaf_der, issuer_der]);
//! let evaluation = TrustEvaluation::new(
//!     chain,
//!     "example.com",
//!     Box::new(|disposition, credential| {
//!         if disposition == Disposition::Reject {
//!             eprintln!("connection rejected");
//!         } else if let Some(credential) = credential {
//!             println!("serial: {}", credential.certificate.serial_hex());
//!         }
//!     }),
//! );
//!
//! evaluator.evaluate(&evaluation).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cert;
pub mod chain;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod ocsp;
pub mod policy;

pub use cache::{CacheKey, DecisionCache, RevocationVerdict};
pub use cert::{Certificate, EvInfo, RdnKey, TlsVersion};
pub use chain::{CertificateChain, ChainValidator, WebPkiChainValidator};
pub use config::{
    CacheConfig, EvaluatorConfig, OcspConfig, RevocationPolicy, DEFAULT_REVOCATION_POLICY,
};
pub use error::TrustError;
pub use evaluator::{
    CompletionFn, Disposition, EvaluationHandle, LoggerSink, ServerCredential, TrustEvaluation,
    TrustEvaluator,
};
pub use ocsp::{HttpTransport, OcspRequest, OcspRequestBuilder, OcspResponse, OcspTransport};
pub use policy::{EvPolicyTable, SignaturePolicy};
