//! Trust evaluation pipeline
//!
//! One [`TrustEvaluation`] is created per TLS handshake and completed
//! exactly once: baseline chain validation first, then OCSP revocation
//! checking across every link that names a responder, then a single
//! disposition delivered through the completion callback. Evaluations can
//! be cancelled (page load abandoned) at any point before completion, in
//! which case the callback never fires.

use crate::cache::{CacheKey, DecisionCache, RevocationVerdict};
use crate::cert::{Certificate, EvInfo, TlsVersion};
use crate::chain::{CertificateChain, ChainValidator};
use crate::config::{EvaluatorConfig, RevocationPolicy};
use crate::error::TrustError;
use crate::ocsp::request::{build_link_requests, OcspRequest};
use crate::ocsp::response::{CertificateStatus, OcspResponse};
use crate::ocsp::transport::OcspTransport;
use crate::policy::{EvPolicyTable, SignaturePolicy};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// Final verdict for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Chain is trusted and revocation status was confirmed good (or there
    /// was nothing to check)
    Accept,
    /// Chain is trusted but revocation status could not be confirmed;
    /// allowed under the fail-open policy
    AcceptWithWarning,
    /// Connection must not proceed
    Reject,
}

/// What the page loader learns about the server once evaluation finishes
#[derive(Debug, Clone)]
pub struct ServerCredential {
    /// Parsed leaf certificate
    pub certificate: Certificate,
    /// Extended Validation match, if the leaf carries a known EV policy OID
    pub ev: Option<EvInfo>,
    /// The leaf is signed with a deny-listed algorithm
    pub weak_signature: bool,
}

/// Sink for user-visible evaluation messages (browser console and the like).
/// Diagnostic logging goes through `tracing` regardless.
pub type LoggerSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Invoked exactly once when an evaluation completes (never after a cancel)
pub type CompletionFn = Box<dyn FnOnce(Disposition, Option<ServerCredential>) + Send>;

const STATE_PENDING: u8 = 0;
const STATE_EVALUATING: u8 = 1;
const STATE_COMPLETED: u8 = 2;
const STATE_CANCELLED: u8 = 3;

struct EvalShared {
    state: AtomicU8,
    callback: Mutex<Option<CompletionFn>>,
    cancelled: Notify,
}

impl std::fmt::Debug for TrustEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustEvaluation")
            .field("host", &self.host)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// One pending trust decision for one TLS handshake
pub struct TrustEvaluation {
    chain: CertificateChain,
    host: String,
    negotiated: Option<(TlsVersion, String)>,
    shared: Arc<EvalShared>,
}

impl TrustEvaluation {
    /// Create an evaluation for `chain` presented by `host`. The callback
    /// runs exactly once when the evaluation completes; it never runs if the
    /// evaluation is cancelled first.
    pub fn new(chain: CertificateChain, host: impl Into<String>, on_complete: CompletionFn) -> Self {
        Self {
            chain,
            host: host.into(),
            negotiated: None,
            shared: Arc::new(EvalShared {
                state: AtomicU8::new(STATE_PENDING),
                callback: Mutex::new(Some(on_complete)),
                cancelled: Notify::new(),
            }),
        }
    }

    /// Record the negotiated protocol and cipher for display in the
    /// resulting credential
    pub fn with_negotiated(mut self, protocol: TlsVersion, cipher: impl Into<String>) -> Self {
        self.negotiated = Some((protocol, cipher.into()));
        self
    }

    /// A handle that can cancel this evaluation from another task
    pub fn handle(&self) -> EvaluationHandle {
        EvaluationHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// True once the evaluation has completed or been cancelled
    pub fn is_finished(&self) -> bool {
        matches!(
            self.shared.state.load(Ordering::Acquire),
            STATE_COMPLETED | STATE_CANCELLED
        )
    }
}

/// Cancellation handle for a [`TrustEvaluation`]
#[derive(Clone)]
pub struct EvaluationHandle {
    shared: Arc<EvalShared>,
}

impl EvaluationHandle {
    /// Cancel the evaluation.
    ///
    /// Returns `true` if the completion callback is guaranteed never to run
    /// (the evaluation was still pending or in flight), `false` if it had
    /// already completed.
    pub fn cancel(&self) -> bool {
        loop {
            let current = self.shared.state.load(Ordering::Acquire);
            match current {
                STATE_COMPLETED => return false,
                STATE_CANCELLED => return true,
                _ => {
                    if self
                        .shared
                        .state
                        .compare_exchange(
                            current,
                            STATE_CANCELLED,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        // Release whatever the callback captured
                        self.shared.callback.lock().expect("callback lock").take();
                        self.shared.cancelled.notify_waiters();
                        return true;
                    }
                }
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == STATE_CANCELLED
    }
}

/// Revocation outcome for one chain link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkOutcome {
    /// A responder confirmed the certificate good
    Good,
    /// A responder reported the certificate revoked
    Revoked,
    /// Every responder for this link was unreachable, stale or returned
    /// `unknown`
    Inconclusive,
    /// The certificate names no OCSP responder
    NotChecked,
}

/// Evaluates trust chains: baseline validation plus OCSP revocation
/// checking, with a shared verdict cache.
pub struct TrustEvaluator {
    config: EvaluatorConfig,
    validator: Arc<dyn ChainValidator>,
    transport: Arc<dyn OcspTransport>,
    cache: DecisionCache,
    connectivity: Option<watch::Receiver<bool>>,
    ev_table: EvPolicyTable,
    signature_policy: SignaturePolicy,
    logger: Option<LoggerSink>,
}

impl TrustEvaluator {
    pub fn new(
        config: EvaluatorConfig,
        validator: Arc<dyn ChainValidator>,
        transport: Arc<dyn OcspTransport>,
    ) -> Self {
        let cache = DecisionCache::new(config.cache.max_entries);
        Self {
            config,
            validator,
            transport,
            cache,
            connectivity: None,
            ev_table: EvPolicyTable::builtin(),
            signature_policy: SignaturePolicy::default(),
            logger: None,
        }
    }

    /// Subscribe to a connectivity signal; while it reads `false`, OCSP
    /// fetches are skipped and revocation is treated as unconfirmed
    pub fn with_connectivity(mut self, rx: watch::Receiver<bool>) -> Self {
        self.connectivity = Some(rx);
        self
    }

    pub fn with_ev_table(mut self, table: EvPolicyTable) -> Self {
        self.ev_table = table;
        self
    }

    pub fn with_signature_policy(mut self, policy: SignaturePolicy) -> Self {
        self.signature_policy = policy;
        self
    }

    pub fn with_logger(mut self, logger: LoggerSink) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The shared verdict cache (exposed for cache management)
    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Run an evaluation to completion.
    ///
    /// Returns the disposition delivered to the callback, `Ok(None)` if the
    /// evaluation was cancelled before it finished (no callback fired), or
    /// [`TrustError::AlreadyEvaluated`] if this evaluation was already run.
    pub async fn evaluate(
        &self,
        evaluation: &TrustEvaluation,
    ) -> Result<Option<Disposition>, TrustError> {
        let shared = &evaluation.shared;
        if shared
            .state
            .compare_exchange(
                STATE_PENDING,
                STATE_EVALUATING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return match shared.state.load(Ordering::Acquire) {
                STATE_CANCELLED => Ok(None),
                _ => Err(TrustError::AlreadyEvaluated),
            };
        }

        let cancelled = shared.cancelled.notified();
        tokio::pin!(cancelled);
        // notify_waiters only reaches registered waiters, so register before
        // re-checking for a cancel that landed after the state exchange
        cancelled.as_mut().enable();
        if shared.state.load(Ordering::Acquire) == STATE_CANCELLED {
            return Ok(None);
        }

        tokio::select! {
            _ = &mut cancelled => {
                tracing::debug!(host = %evaluation.host, "evaluation cancelled");
                Ok(None)
            }
            (disposition, credential) = self.run(evaluation) => {
                Ok(self.complete(evaluation, disposition, credential))
            }
        }
    }

    async fn run(&self, evaluation: &TrustEvaluation) -> (Disposition, Option<ServerCredential>) {
        let host = &evaluation.host;

        let mut certificate = match Certificate::leaf_from_chain(&evaluation.chain) {
            Ok(cert) => cert,
            Err(e) => {
                self.log(&format!("{}: unusable server certificate: {}", host, e));
                return (Disposition::Reject, None);
            }
        };
        if let Some((protocol, cipher)) = &evaluation.negotiated {
            certificate.set_negotiated(*protocol, cipher.clone());
        }

        let weak_signature = certificate.has_weak_signature_algorithm(&self.signature_policy);
        let ev = certificate.ev_status(&self.ev_table);
        if let Some(info) = &ev {
            tracing::debug!(host = %host, oid = %info.policy_oid, ca = %info.ca_name, "EV policy OID matched");
        }

        let credential = ServerCredential {
            certificate,
            ev,
            weak_signature,
        };

        let now = Utc::now();
        if let Err(e) = self.validator.validate(&evaluation.chain, host, now) {
            self.log(&format!("{}: {}", host, e));
            return (Disposition::Reject, Some(credential));
        }

        if weak_signature {
            self.log(&format!(
                "{}: certificate signed with weak algorithm {}",
                host,
                credential.certificate.signature_algorithm()
            ));
            if self.signature_policy.hard_fail() {
                return (Disposition::Reject, Some(credential));
            }
        }

        if let Some(rx) = &self.connectivity {
            if !*rx.borrow() {
                self.log(&format!(
                    "{}: offline, skipping revocation check",
                    host
                ));
                return (self.unconfirmed_disposition(), Some(credential));
            }
        }

        let mut disposition = self.check_revocation(&evaluation.chain, host, now).await;
        // A weak signature never upgrades a reject, but it does taint a
        // clean accept
        if weak_signature && disposition == Disposition::Accept {
            disposition = Disposition::AcceptWithWarning;
        }
        (disposition, Some(credential))
    }

    /// Check every issuer link concurrently, then combine: any revoked
    /// verdict rejects, any inconclusive link falls to the configured
    /// policy, and only an all-clear yields a clean accept.
    async fn check_revocation(
        &self,
        chain: &CertificateChain,
        host: &str,
        now: DateTime<Utc>,
    ) -> Disposition {
        let link_checks: Vec<_> = chain
            .issuer_links()
            .map(|(subject, issuer)| self.check_link(subject, issuer, host, now))
            .collect();
        let outcomes: Vec<LinkOutcome> = stream::iter(link_checks)
            .buffer_unordered(self.config.ocsp.max_concurrent_requests.max(1))
            .collect()
            .await;

        let revoked = outcomes.iter().any(|o| *o == LinkOutcome::Revoked);
        let inconclusive = outcomes.iter().any(|o| *o == LinkOutcome::Inconclusive);

        if revoked {
            self.log(&format!("{}: certificate revoked", host));
            Disposition::Reject
        } else if inconclusive {
            self.log(&format!(
                "{}: revocation status could not be confirmed",
                host
            ));
            self.unconfirmed_disposition()
        } else {
            Disposition::Accept
        }
    }

    async fn check_link(
        &self,
        subject: &[u8],
        issuer: &[u8],
        host: &str,
        now: DateTime<Utc>,
    ) -> LinkOutcome {
        let requests = match build_link_requests(subject, issuer, self.config.ocsp.enable_nonce) {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "failed to build OCSP request");
                return LinkOutcome::Inconclusive;
            }
        };
        if requests.is_empty() {
            tracing::debug!(host = %host, "certificate names no OCSP responder");
            return LinkOutcome::NotChecked;
        }

        let key = CacheKey::new(issuer, &requests[0].serial);
        match self.cache.lookup(&key) {
            Some(RevocationVerdict::Good) => {
                tracing::debug!(host = %host, "cached good verdict");
                return LinkOutcome::Good;
            }
            Some(RevocationVerdict::Revoked) => {
                tracing::warn!(host = %host, "cached revoked verdict");
                return LinkOutcome::Revoked;
            }
            None => {}
        }

        // Try responders in AIA order; the first definitive answer wins
        for request in &requests {
            match self.query_responder(request, now).await {
                Ok(response) => {
                    let ttl = response.cache_ttl(
                        now,
                        Duration::from_secs(self.config.cache.default_ttl_secs),
                    );
                    match response.status {
                        CertificateStatus::Good => {
                            self.cache.store(key, RevocationVerdict::Good, ttl);
                            return LinkOutcome::Good;
                        }
                        CertificateStatus::Revoked { revocation_time, .. } => {
                            tracing::warn!(
                                host = %host,
                                url = %request.url,
                                revoked_at = %revocation_time.to_rfc3339(),
                                "responder reports certificate revoked"
                            );
                            self.cache.store(key, RevocationVerdict::Revoked, ttl);
                            return LinkOutcome::Revoked;
                        }
                        CertificateStatus::Unknown => {
                            tracing::debug!(host = %host, url = %request.url, "responder has no record");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(host = %host, url = %request.url, error = %e, "OCSP query failed");
                }
            }
        }

        LinkOutcome::Inconclusive
    }

    async fn query_responder(
        &self,
        request: &OcspRequest,
        now: DateTime<Utc>,
    ) -> Result<OcspResponse, TrustError> {
        let timeout = Duration::from_secs(self.config.ocsp.http_timeout_secs);
        let body = tokio::time::timeout(timeout, self.transport.fetch(&request.url, &request.der))
            .await
            .map_err(|_| {
                TrustError::OcspTransport(format!(
                    "{} timed out after {}s",
                    request.url,
                    timeout.as_secs()
                ))
            })??;

        let response = OcspResponse::parse(&body, &request.serial)?;

        // A responder that echoes a nonce must echo ours; one that omits it
        // simply does not support the extension
        if let (Some(sent), Some(echoed)) = (&request.nonce, &response.nonce) {
            if sent != echoed {
                return Err(TrustError::OcspResponse("nonce mismatch".to_string()));
            }
        }

        if !response.is_fresh(now) {
            return Err(TrustError::OcspResponse("response is stale".to_string()));
        }

        Ok(response)
    }

    fn unconfirmed_disposition(&self) -> Disposition {
        match self.config.revocation_policy {
            RevocationPolicy::FailOpen => Disposition::AcceptWithWarning,
            RevocationPolicy::FailClosed => Disposition::Reject,
        }
    }

    /// Deliver the verdict unless a cancel won the race
    fn complete(
        &self,
        evaluation: &TrustEvaluation,
        disposition: Disposition,
        credential: Option<ServerCredential>,
    ) -> Option<Disposition> {
        let shared = &evaluation.shared;
        if shared
            .state
            .compare_exchange(
                STATE_EVALUATING,
                STATE_COMPLETED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return None;
        }

        tracing::info!(host = %evaluation.host, disposition = ?disposition, "trust evaluation complete");
        if let Some(callback) = shared.callback.lock().expect("callback lock").take() {
            callback(disposition, credential);
        }
        Some(disposition)
    }

    fn log(&self, message: &str) {
        tracing::debug!("{}", message);
        if let Some(sink) = &self.logger {
            sink(message);
        }
    }
}
