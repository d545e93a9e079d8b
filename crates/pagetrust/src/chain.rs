//! Trust chain abstraction and baseline chain-of-trust validation
//!
//! The platform hands us an ordered list of DER-encoded certificates, leaf
//! first. Baseline validation (signature lineage, root anchor, host name
//! matching) sits behind [`ChainValidator`] so the evaluator can be driven
//! by whatever trust store the embedding application provides;
//! [`WebPkiChainValidator`] is the stock implementation on top of rustls.

use crate::error::TrustError;
use chrono::{DateTime, Utc};
use pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::RootCertStore;
use std::sync::Arc;
use std::time::Duration;

/// An ordered certificate chain, leaf first, as surfaced by the TLS layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certs: Vec<Vec<u8>>,
}

impl CertificateChain {
    /// Build a chain from DER-encoded certificates ordered leaf first
    pub fn new(certs: Vec<Vec<u8>>) -> Self {
        Self { certs }
    }

    /// The end-entity certificate, if the chain is non-empty
    pub fn leaf(&self) -> Option<&[u8]> {
        self.certs.first().map(Vec::as_slice)
    }

    /// Number of certificates in the chain
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Certificate at position `i` (0 = leaf)
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.certs.get(i).map(Vec::as_slice)
    }

    /// Iterate over (subject, direct issuer) pairs: each non-root
    /// certificate together with the next certificate up the chain
    pub fn issuer_links(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.certs
            .windows(2)
            .map(|w| (w[0].as_slice(), w[1].as_slice()))
    }

    /// All certificates, leaf first
    pub fn certs(&self) -> &[Vec<u8>] {
        &self.certs
    }
}

/// Baseline chain-of-trust validation.
///
/// Implementations check the signature chain up to a trusted anchor and the
/// host name binding. They do not perform revocation checking; that is the
/// evaluator's job.
pub trait ChainValidator: Send + Sync {
    /// Validate `chain` for a connection to `host` at time `now`.
    ///
    /// A failure is always reported as [`TrustError::ChainValidation`] and
    /// is a hard reject for the evaluation.
    fn validate(
        &self,
        chain: &CertificateChain,
        host: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TrustError>;
}

/// [`ChainValidator`] backed by rustls's webpki server-certificate verifier
/// over a caller-provided root store.
#[derive(Debug)]
pub struct WebPkiChainValidator {
    verifier: Arc<WebPkiServerVerifier>,
}

impl WebPkiChainValidator {
    /// Create a validator trusting the anchors in `roots`
    pub fn new(roots: Arc<RootCertStore>) -> Result<Self, TrustError> {
        let verifier = WebPkiServerVerifier::builder(roots)
            .build()
            .map_err(|e| TrustError::Config(format!("failed to build webpki verifier: {}", e)))?;
        Ok(Self { verifier })
    }
}

impl ChainValidator for WebPkiChainValidator {
    fn validate(
        &self,
        chain: &CertificateChain,
        host: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TrustError> {
        let leaf = chain
            .leaf()
            .ok_or_else(|| TrustError::ChainValidation("empty certificate chain".to_string()))?;

        let end_entity = CertificateDer::from(leaf.to_vec());
        let intermediates: Vec<CertificateDer<'static>> = chain.certs()[1..]
            .iter()
            .map(|c| CertificateDer::from(c.clone()))
            .collect();

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| TrustError::ChainValidation(format!("invalid host name: {}", e)))?;

        let unix_time = UnixTime::since_unix_epoch(Duration::from_secs(now.timestamp().max(0) as u64));

        self.verifier
            .verify_server_cert(&end_entity, &intermediates, &server_name, &[], unix_time)
            .map_err(|e| TrustError::ChainValidation(e.to_string()))?;

        Ok(())
    }
}
