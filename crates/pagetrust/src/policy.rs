//! Algorithm and EV policy tables
//!
//! Both tables are data, not code: evaluation logic consults them but never
//! hard-codes individual OIDs, so deployments can extend or replace entries
//! without touching the evaluator.

use std::collections::HashMap;

/// Deny-list of signature algorithm OIDs considered too weak for use on a
/// served certificate (MD2/MD5/SHA-1 based signing).
///
/// A match is surfaced as a warning by default; [`SignaturePolicy::rejecting`]
/// turns it into a hard failure instead.
#[derive(Debug, Clone)]
pub struct SignaturePolicy {
    weak_oids: Vec<String>,
    hard_fail: bool,
}

impl SignaturePolicy {
    /// Empty deny-list (nothing is flagged)
    pub fn permissive() -> Self {
        Self {
            weak_oids: Vec::new(),
            hard_fail: false,
        }
    }

    /// Default deny-list, with a match treated as a hard failure
    pub fn rejecting() -> Self {
        Self {
            hard_fail: true,
            ..Self::default()
        }
    }

    /// Add an algorithm OID to the deny-list
    pub fn deny(&mut self, oid: impl Into<String>) {
        self.weak_oids.push(oid.into());
    }

    /// True if the given signature algorithm OID is on the deny-list
    pub fn is_weak(&self, oid: &str) -> bool {
        self.weak_oids.iter().any(|w| w == oid)
    }

    /// True if a deny-list match should fail the evaluation outright
    /// instead of downgrading it to a warning
    pub fn hard_fail(&self) -> bool {
        self.hard_fail
    }
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        Self {
            hard_fail: false,
            weak_oids: vec![
                "1.2.840.113549.1.1.2".to_string(),  // md2WithRSAEncryption
                "1.2.840.113549.1.1.3".to_string(),  // md4WithRSAEncryption
                "1.2.840.113549.1.1.4".to_string(),  // md5WithRSAEncryption
                "1.2.840.113549.1.1.5".to_string(),  // sha1WithRSAEncryption
                "1.2.840.10040.4.3".to_string(),     // dsa-with-sha1
                "1.2.840.10045.4.1".to_string(),     // ecdsa-with-SHA1
                "1.3.14.3.2.29".to_string(),         // sha1WithRSASignature (legacy OIW)
            ],
        }
    }
}

/// Table mapping CA-specific Extended Validation policy OIDs to the issuing
/// CA's name.
///
/// EV recognition here is a heuristic, not a signed assertion: a match means
/// the leaf carries a policy OID some CA is known to use for EV issuance,
/// and the displayed organization comes from the subject `O` RDN. CA EV
/// policy OIDs change over time, so the table is mutable at runtime rather
/// than baked into evaluation logic.
#[derive(Debug, Clone, Default)]
pub struct EvPolicyTable {
    entries: HashMap<String, String>,
}

impl EvPolicyTable {
    /// Empty table (EV recognition disabled)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table pre-populated with well-known CA EV policy OIDs, including the
    /// CA/Browser Forum EV OID
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (oid, ca) in [
            ("2.23.140.1.1", "CA/Browser Forum"),
            ("1.3.6.1.4.1.6449.1.2.1.5.1", "Comodo"),
            ("2.16.840.1.114412.2.1", "DigiCert"),
            ("2.16.840.1.114028.10.1.2", "Entrust"),
            ("1.3.6.1.4.1.14370.1.6", "GeoTrust"),
            ("1.3.6.1.4.1.4146.1.1", "GlobalSign"),
            ("2.16.840.1.114413.1.7.23.3", "Go Daddy"),
            ("1.3.6.1.4.1.8024.0.2.100.1.2", "QuoVadis"),
            ("1.3.6.1.4.1.23223.1.1.1", "StartCom"),
            ("2.16.840.1.114414.1.7.23.3", "Starfield"),
            ("2.16.840.1.113733.1.7.23.6", "VeriSign"),
            ("2.16.840.1.113733.1.7.48.1", "Thawte"),
            ("1.3.6.1.4.1.34697.2.1", "AffirmTrust"),
            ("1.3.6.1.4.1.17326.10.14.2.1.2", "Camerfirma"),
            ("2.16.756.1.89.1.2.1.1", "SwissSign"),
        ] {
            table.insert(oid, ca);
        }
        table
    }

    /// Register (or replace) an EV policy OID
    pub fn insert(&mut self, oid: impl Into<String>, ca_name: impl Into<String>) {
        self.entries.insert(oid.into(), ca_name.into());
    }

    /// Remove an EV policy OID, returning the CA name it mapped to
    pub fn remove(&mut self, oid: &str) -> Option<String> {
        self.entries.remove(oid)
    }

    /// Look up the CA name for an EV policy OID
    pub fn ca_for(&self, oid: &str) -> Option<&str> {
        self.entries.get(oid).map(String::as_str)
    }

    /// Number of registered EV policy OIDs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
