//! X.509 certificate model
//!
//! Parses one DER-encoded certificate into an immutable value exposing the
//! fields the page loader needs: serial number, signature algorithm,
//! subject/issuer RDNs, validity window, policy OIDs and the derived EV
//! indicator. Parsing is all-or-nothing: a certificate that fails to decode
//! any exposed field is rejected outright, never partially populated.

use crate::chain::CertificateChain;
use crate::error::TrustError;
use crate::policy::{EvPolicyTable, SignaturePolicy};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use x509_parser::prelude::*;

/// Relative Distinguished Name keys surfaced from subject/issuer names.
///
/// This is the fixed set shown in certificate detail views; RDN attributes
/// outside it are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RdnKey {
    CommonName,
    Organization,
    OrganizationalUnit,
    Locality,
    StateOrProvince,
    Country,
    SerialNumber,
    StreetAddress,
    PostalCode,
    BusinessCategory,
}

impl RdnKey {
    /// Map an attribute type OID (dotted form) to an RDN key
    fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            "2.5.4.3" => Some(Self::CommonName),
            "2.5.4.10" => Some(Self::Organization),
            "2.5.4.11" => Some(Self::OrganizationalUnit),
            "2.5.4.7" => Some(Self::Locality),
            "2.5.4.8" => Some(Self::StateOrProvince),
            "2.5.4.6" => Some(Self::Country),
            "2.5.4.5" => Some(Self::SerialNumber),
            "2.5.4.9" => Some(Self::StreetAddress),
            "2.5.4.17" => Some(Self::PostalCode),
            "2.5.4.15" => Some(Self::BusinessCategory),
            _ => None,
        }
    }

    /// Human-readable field name for display in certificate detail lists
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CommonName => "Common Name (CN)",
            Self::Organization => "Organization (O)",
            Self::OrganizationalUnit => "Organizational Unit Number (OU)",
            Self::Locality => "Locality (L)",
            Self::StateOrProvince => "State/Province (ST)",
            Self::Country => "Country (C)",
            Self::SerialNumber => "Serial Number",
            Self::StreetAddress => "Street Address",
            Self::PostalCode => "Postal Code",
            Self::BusinessCategory => "Business Category",
        }
    }
}

/// Negotiated TLS protocol version, set post-handshake for display only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    Ssl3,
    Tls10,
    Tls11,
    Tls12,
    Tls13,
    Unknown,
}

impl TlsVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssl3 => "SSL 3.0",
            Self::Tls10 => "TLS 1.0",
            Self::Tls11 => "TLS 1.1",
            Self::Tls12 => "TLS 1.2",
            Self::Tls13 => "TLS 1.3",
            Self::Unknown => "Unknown",
        }
    }
}

/// Extended Validation match for a leaf certificate.
///
/// Derived by policy OID lookup, see [`EvPolicyTable`]. The organization is
/// read from the subject `O` RDN, not from any separately vetted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvInfo {
    /// The matched EV policy OID
    pub policy_oid: String,
    /// CA name the OID is registered to
    pub ca_name: String,
    /// Organization name from the subject RDN, if present
    pub organization: Option<String>,
}

/// Parameters negotiated during the TLS handshake, presentation-only
#[derive(Debug, Clone, PartialEq, Eq)]
struct NegotiatedSession {
    protocol: TlsVersion,
    cipher_suite: String,
}

/// An immutable parsed X.509 certificate
#[derive(Debug, Clone)]
pub struct Certificate {
    version: u32,
    serial: Vec<u8>,
    serial_hex: String,
    signature_algorithm: String,
    issuer: BTreeMap<RdnKey, String>,
    subject: BTreeMap<RdnKey, String>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    policy_oids: Vec<String>,
    der: Vec<u8>,
    negotiated: Option<NegotiatedSession>,
}

impl Certificate {
    /// Parse a certificate from a DER-encoded buffer.
    ///
    /// Fails with [`TrustError::CertificateParse`] on any malformed input,
    /// including trailing bytes after the certificate structure and a
    /// validity window with `notBefore > notAfter`.
    pub fn from_der(der: &[u8]) -> Result<Self, TrustError> {
        let (rem, cert) = parse_x509_certificate(der)
            .map_err(|e| TrustError::CertificateParse(format!("DER decode failed: {}", e)))?;

        if !rem.is_empty() {
            return Err(TrustError::CertificateParse(format!(
                "{} trailing bytes after certificate",
                rem.len()
            )));
        }

        let not_before = asn1_time_to_chrono(&cert.validity().not_before).ok_or_else(|| {
            TrustError::CertificateParse("invalid notBefore timestamp".to_string())
        })?;
        let not_after = asn1_time_to_chrono(&cert.validity().not_after).ok_or_else(|| {
            TrustError::CertificateParse("invalid notAfter timestamp".to_string())
        })?;

        if not_before > not_after {
            return Err(TrustError::CertificateParse(format!(
                "validity window is inverted: notBefore={} notAfter={}",
                not_before.to_rfc3339(),
                not_after.to_rfc3339()
            )));
        }

        let serial = cert.raw_serial().to_vec();
        let serial_hex: String = serial.iter().map(|b| format!("{:02x}", b)).collect();

        Ok(Self {
            version: cert.version().0,
            serial,
            serial_hex,
            signature_algorithm: cert.signature_algorithm.algorithm.to_id_string(),
            issuer: rdn_map(cert.issuer()),
            subject: rdn_map(cert.subject()),
            not_before,
            not_after,
            policy_oids: extract_policy_oids(&cert)?,
            der: der.to_vec(),
            negotiated: None,
        })
    }

    /// Parse the leaf (first) certificate of a trust chain
    pub fn leaf_from_chain(chain: &CertificateChain) -> Result<Self, TrustError> {
        let leaf = chain
            .leaf()
            .ok_or_else(|| TrustError::CertificateParse("empty certificate chain".to_string()))?;
        Self::from_der(leaf)
    }

    /// X.509 version (0 = v1, 2 = v3)
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Serial number as raw big-endian bytes
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Serial number as lowercase hex (arbitrary precision)
    pub fn serial_hex(&self) -> &str {
        &self.serial_hex
    }

    /// Signature algorithm OID in dotted form
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    pub fn issuer(&self) -> &BTreeMap<RdnKey, String> {
        &self.issuer
    }

    pub fn subject(&self) -> &BTreeMap<RdnKey, String> {
        &self.subject
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Certificate policy OIDs (dotted form) from the certificatePolicies
    /// extension, empty if the extension is absent
    pub fn policy_oids(&self) -> &[String] {
        &self.policy_oids
    }

    /// The DER encoding this certificate was parsed from
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// True iff `now` falls outside the `[notBefore, notAfter]` window.
    /// Pure function of the stored timestamps, no network access.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now < self.not_before || now > self.not_after
    }

    /// [`Certificate::is_expired_at`] evaluated at the current time
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// True iff the signature algorithm is on the policy's deny-list
    pub fn has_weak_signature_algorithm(&self, policy: &SignaturePolicy) -> bool {
        policy.is_weak(&self.signature_algorithm)
    }

    /// Match this certificate's policy OIDs against the EV table.
    ///
    /// Returns the first match, or `None` when no policy OID is a known EV
    /// OID. A match is a heuristic EV indicator, not a signed guarantee.
    pub fn ev_status(&self, table: &EvPolicyTable) -> Option<EvInfo> {
        for oid in &self.policy_oids {
            if let Some(ca_name) = table.ca_for(oid) {
                return Some(EvInfo {
                    policy_oid: oid.clone(),
                    ca_name: ca_name.to_string(),
                    organization: self.subject.get(&RdnKey::Organization).cloned(),
                });
            }
        }
        None
    }

    /// Record the negotiated protocol and cipher suite after the handshake.
    /// Display-only, carries no security semantics.
    pub fn set_negotiated(&mut self, protocol: TlsVersion, cipher_suite: impl Into<String>) {
        self.negotiated = Some(NegotiatedSession {
            protocol,
            cipher_suite: cipher_suite.into(),
        });
    }

    /// Human-readable negotiated protocol, "Unknown" before the handshake
    pub fn negotiated_protocol_string(&self) -> &str {
        self.negotiated
            .as_ref()
            .map(|n| n.protocol.as_str())
            .unwrap_or("Unknown")
    }

    /// Human-readable negotiated cipher suite, "Unknown" before the handshake
    pub fn negotiated_cipher_string(&self) -> &str {
        self.negotiated
            .as_ref()
            .map(|n| n.cipher_suite.as_str())
            .unwrap_or("Unknown")
    }
}

/// Collect the recognized RDN attributes of a name into a key/value map
fn rdn_map(name: &X509Name<'_>) -> BTreeMap<RdnKey, String> {
    let mut map = BTreeMap::new();
    for rdn in name.iter() {
        for attr in rdn.iter() {
            let Some(key) = RdnKey::from_oid(&attr.attr_type().to_id_string()) else {
                continue;
            };
            if let Ok(value) = attr.attr_value().as_str() {
                map.entry(key).or_insert_with(|| value.to_string());
            }
        }
    }
    map
}

/// Extract certificate policy OIDs from the certificatePolicies extension
/// (2.5.29.32). Absent extension yields an empty list; a malformed one makes
/// the whole certificate unparseable.
fn extract_policy_oids(cert: &X509Certificate<'_>) -> Result<Vec<String>, TrustError> {
    use x509_parser::oid_registry::asn1_rs::oid;

    let policies_oid = oid!(2.5.29.32);
    for ext in cert.extensions() {
        if ext.oid != policies_oid {
            continue;
        }
        return match ext.parsed_extension() {
            ParsedExtension::CertificatePolicies(policies) => Ok(policies
                .iter()
                .map(|info| info.policy_id.to_id_string())
                .collect()),
            _ => Err(TrustError::CertificateParse(
                "malformed certificatePolicies extension".to_string(),
            )),
        };
    }
    Ok(Vec::new())
}

/// Convert ASN.1 time (UTCTime or GeneralizedTime) to chrono DateTime
fn asn1_time_to_chrono(asn1_time: &ASN1Time) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(asn1_time.timestamp(), 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const LEAF: &[u8] = include_bytes!("../testdata/leaf.der");
    const WEAK: &[u8] = include_bytes!("../testdata/weak.der");
    const EV: &[u8] = include_bytes!("../testdata/ev.der");
    const CA: &[u8] = include_bytes!("../testdata/ca.der");

    #[test]
    fn test_parse_leaf_fields() {
        let cert = Certificate::from_der(LEAF).unwrap();

        assert_eq!(cert.serial_hex(), "0123456789abcdef");
        assert_eq!(cert.signature_algorithm(), "1.2.840.113549.1.1.11");
        assert_eq!(
            cert.subject().get(&RdnKey::CommonName).map(String::as_str),
            Some("example.test")
        );
        assert_eq!(
            cert.subject()
                .get(&RdnKey::Organization)
                .map(String::as_str),
            Some("Example Test Org")
        );
        assert_eq!(
            cert.subject().get(&RdnKey::Locality).map(String::as_str),
            Some("Springfield")
        );
        assert_eq!(
            cert.issuer().get(&RdnKey::CommonName).map(String::as_str),
            Some("Pagetrust Test Root CA")
        );
        assert_eq!(cert.not_before().timestamp(), 1704067200); // 2024-01-01T00:00:00Z
        assert_eq!(cert.not_after().timestamp(), 2019686400); // 2034-01-01T00:00:00Z
    }

    #[test]
    fn test_parse_rejects_truncated_and_corrupt_input() {
        assert!(matches!(
            Certificate::from_der(&LEAF[..LEAF.len() / 2]),
            Err(TrustError::CertificateParse(_))
        ));
        assert!(matches!(
            Certificate::from_der(&[0x30, 0x03, 0x01, 0x01, 0xff]),
            Err(TrustError::CertificateParse(_))
        ));
        assert!(matches!(
            Certificate::from_der(&[]),
            Err(TrustError::CertificateParse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_trailing_bytes() {
        let mut padded = LEAF.to_vec();
        padded.extend_from_slice(&[0x00, 0x00]);
        assert!(matches!(
            Certificate::from_der(&padded),
            Err(TrustError::CertificateParse(_))
        ));
    }

    #[test]
    fn test_is_expired_window_boundaries() {
        let cert = Certificate::from_der(LEAF).unwrap();
        let not_before = cert.not_before();
        let not_after = cert.not_after();

        assert!(cert.is_expired_at(not_before - Duration::seconds(1)));
        assert!(!cert.is_expired_at(not_before));
        assert!(!cert.is_expired_at(not_after));
        assert!(cert.is_expired_at(not_after + Duration::seconds(1)));
    }

    #[test]
    fn test_weak_signature_algorithm() {
        let policy = SignaturePolicy::default();

        let weak = Certificate::from_der(WEAK).unwrap();
        assert_eq!(weak.signature_algorithm(), "1.2.840.113549.1.1.5");
        assert!(weak.has_weak_signature_algorithm(&policy));

        let modern = Certificate::from_der(LEAF).unwrap();
        assert!(!modern.has_weak_signature_algorithm(&policy));
    }

    #[test]
    fn test_ev_detection() {
        let table = EvPolicyTable::builtin();

        let ev = Certificate::from_der(EV).unwrap();
        let info = ev.ev_status(&table).expect("EV policy OID should match");
        assert_eq!(info.policy_oid, "2.16.840.1.114412.2.1");
        assert_eq!(info.ca_name, "DigiCert");
        assert_eq!(info.organization.as_deref(), Some("Extended Example Inc"));

        let plain = Certificate::from_der(LEAF).unwrap();
        assert!(plain.ev_status(&table).is_none());

        // No match against an empty table, regardless of policy OIDs
        assert!(ev.ev_status(&EvPolicyTable::empty()).is_none());
    }

    #[test]
    fn test_policy_oids_absent() {
        let cert = Certificate::from_der(CA).unwrap();
        assert!(cert.policy_oids().is_empty());
    }

    #[test]
    fn test_negotiated_session_strings() {
        let mut cert = Certificate::from_der(LEAF).unwrap();
        assert_eq!(cert.negotiated_protocol_string(), "Unknown");
        assert_eq!(cert.negotiated_cipher_string(), "Unknown");

        cert.set_negotiated(TlsVersion::Tls13, "TLS_AES_128_GCM_SHA256");
        assert_eq!(cert.negotiated_protocol_string(), "TLS 1.3");
        assert_eq!(cert.negotiated_cipher_string(), "TLS_AES_128_GCM_SHA256");
    }

    #[test]
    fn test_rdn_display_names() {
        assert_eq!(RdnKey::CommonName.display_name(), "Common Name (CN)");
        assert_eq!(RdnKey::BusinessCategory.display_name(), "Business Category");
    }
}
