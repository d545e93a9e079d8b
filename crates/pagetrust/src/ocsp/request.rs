//! OCSP request building (RFC 6960 section 4.1)
//!
//! Requests are minimal and unsigned: a single CertID per request, SHA-256
//! hashes, and an optional nonce extension. The DER encoding is hand-rolled
//! from the inside out (CertID, Request, TBSRequest, OCSPRequest) since the
//! structure is small and fixed.

use crate::chain::CertificateChain;
use crate::error::TrustError;
use rand::RngCore;
use sha2::{Digest, Sha256};
use x509_parser::oid_registry::asn1_rs::oid;
use x509_parser::prelude::*;

/// A ready-to-send OCSP request, bound to the responder URL it was built for
#[derive(Debug, Clone)]
pub struct OcspRequest {
    /// Responder URL from the certificate's AIA extension
    pub url: String,
    /// DER-encoded OCSPRequest
    pub der: Vec<u8>,
    /// Serial number of the certificate being checked
    pub serial: Vec<u8>,
    /// DER of the direct issuer certificate (for response matching and
    /// cache keying)
    pub issuer_der: Vec<u8>,
    /// Nonce included in the request, if any
    pub nonce: Option<Vec<u8>>,
}

/// Builds a minimal unsigned OCSP request for a single certificate
pub struct OcspRequestBuilder {
    serial_number: Vec<u8>,
    issuer_name_hash: Vec<u8>,
    issuer_key_hash: Vec<u8>,
    nonce: Option<Vec<u8>>,
}

impl OcspRequestBuilder {
    /// Extract the CertID components (serial, issuer name hash, issuer key
    /// hash) from a certificate and its direct issuer, both DER-encoded.
    pub fn new(cert: &[u8], issuer: &[u8]) -> Result<Self, TrustError> {
        let (_, cert_parsed) = parse_x509_certificate(cert)
            .map_err(|e| TrustError::CertificateParse(format!("subject: {}", e)))?;
        let (_, issuer_parsed) = parse_x509_certificate(issuer)
            .map_err(|e| TrustError::CertificateParse(format!("issuer: {}", e)))?;

        let serial_number = cert_parsed.serial.to_bytes_be();

        // issuerNameHash is over the issuer's subject DN exactly as encoded
        let issuer_name_hash = Sha256::digest(issuer_parsed.subject().as_raw()).to_vec();

        // issuerKeyHash is over the subjectPublicKey BIT STRING contents,
        // without tag, length or unused-bits byte
        let issuer_key_hash =
            Sha256::digest(&issuer_parsed.public_key().subject_public_key.data).to_vec();

        Ok(Self {
            serial_number,
            issuer_name_hash,
            issuer_key_hash,
            nonce: None,
        })
    }

    /// Attach a nonce for replay protection
    pub fn with_nonce(mut self, nonce: Vec<u8>) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Attach a freshly generated random 16-byte nonce
    pub fn with_random_nonce(self) -> Self {
        let mut nonce = vec![0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.with_nonce(nonce)
    }

    pub fn serial(&self) -> &[u8] {
        &self.serial_number
    }

    pub fn nonce(&self) -> Option<&[u8]> {
        self.nonce.as_deref()
    }

    /// Encode the OCSPRequest to DER
    pub fn build(&self) -> Vec<u8> {
        let cert_id = self.build_cert_id();
        // Request ::= SEQUENCE { reqCert CertID, ... } with no extensions
        let request = der_sequence(&cert_id);
        let tbs_request = self.build_tbs_request(&request);
        // OCSPRequest ::= SEQUENCE { tbsRequest, optionalSignature OPTIONAL };
        // we never sign
        der_sequence(&tbs_request)
    }

    /// CertID ::= SEQUENCE { hashAlgorithm, issuerNameHash, issuerKeyHash,
    /// serialNumber }
    fn build_cert_id(&self) -> Vec<u8> {
        let mut cert_id = Vec::new();

        // AlgorithmIdentifier for SHA-256 with NULL parameters
        let mut hash_algo = Vec::new();
        hash_algo.extend_from_slice(&der_oid(&[2, 16, 840, 1, 101, 3, 4, 2, 1]));
        hash_algo.extend_from_slice(&der_null());
        cert_id.extend_from_slice(&der_sequence(&hash_algo));

        cert_id.extend_from_slice(&der_octet_string(&self.issuer_name_hash));
        cert_id.extend_from_slice(&der_octet_string(&self.issuer_key_hash));
        cert_id.extend_from_slice(&der_integer(&self.serial_number));

        der_sequence(&cert_id)
    }

    /// TBSRequest ::= SEQUENCE { version [0] DEFAULT v1, requestorName [1]
    /// OPTIONAL, requestList, requestExtensions [2] OPTIONAL }
    fn build_tbs_request(&self, request: &[u8]) -> Vec<u8> {
        let mut tbs = Vec::new();

        // version and requestorName omitted

        tbs.extend_from_slice(&der_sequence(request));

        if let Some(ref nonce) = self.nonce {
            let ext = self.build_nonce_extension(nonce);
            tbs.extend_from_slice(&der_explicit_context(2, &ext));
        }

        der_sequence(&tbs)
    }

    /// Extensions ::= SEQUENCE OF Extension; the nonce extension value is an
    /// OCTET STRING wrapping the nonce OCTET STRING (RFC 6960 section 4.4.1)
    fn build_nonce_extension(&self, nonce: &[u8]) -> Vec<u8> {
        let mut ext = Vec::new();
        // id-pkix-ocsp-nonce
        ext.extend_from_slice(&der_oid(&[1, 3, 6, 1, 5, 5, 7, 48, 1, 2]));
        // critical omitted (default FALSE)
        let inner = der_octet_string(nonce);
        ext.extend_from_slice(&der_octet_string(&inner));

        let extension = der_sequence(&ext);
        der_sequence(&extension)
    }
}

/// Extract all distinct OCSP responder URLs from a certificate's Authority
/// Information Access extension.
///
/// Returns an empty list when the extension is absent. A present-but-
/// malformed AIA extension yields [`TrustError::ExtensionParse`].
pub fn extract_ocsp_urls(cert: &[u8]) -> Result<Vec<String>, TrustError> {
    let (_, parsed) = parse_x509_certificate(cert)
        .map_err(|e| TrustError::CertificateParse(e.to_string()))?;

    let aia_oid = oid!(1.3.6.1.5.5.7.1.1);
    let ocsp_method = oid!(1.3.6.1.5.5.7.48.1);

    let mut urls: Vec<String> = Vec::new();
    for ext in parsed.extensions() {
        if ext.oid != aia_oid {
            continue;
        }
        match ext.parsed_extension() {
            ParsedExtension::AuthorityInfoAccess(aia) => {
                for desc in aia.accessdescs.iter() {
                    if desc.access_method != ocsp_method {
                        continue;
                    }
                    if let GeneralName::URI(uri) = &desc.access_location {
                        if !urls.iter().any(|u| u == uri) {
                            urls.push(uri.to_string());
                        }
                    }
                }
            }
            _ => {
                return Err(TrustError::ExtensionParse(
                    "authority information access extension is malformed".to_string(),
                ));
            }
        }
    }

    Ok(urls)
}

/// Build the OCSP requests for one chain link (subject plus direct issuer).
///
/// One request per distinct responder URL. `Ok(vec![])` means the subject
/// carries no OCSP responder and there is nothing to check.
pub fn build_link_requests(
    subject: &[u8],
    issuer: &[u8],
    enable_nonce: bool,
) -> Result<Vec<OcspRequest>, TrustError> {
    let urls = extract_ocsp_urls(subject)?;
    if urls.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = OcspRequestBuilder::new(subject, issuer)?;
    if enable_nonce {
        builder = builder.with_random_nonce();
    }
    let der = builder.build();

    Ok(urls
        .into_iter()
        .map(|url| OcspRequest {
            url,
            der: der.clone(),
            serial: builder.serial().to_vec(),
            issuer_der: issuer.to_vec(),
            nonce: builder.nonce().map(<[u8]>::to_vec),
        })
        .collect())
}

/// Build OCSP requests for every link in the chain, flattened.
///
/// The root (last certificate) has no issuer in the chain and is never
/// checked.
pub fn build_chain_requests(
    chain: &CertificateChain,
    enable_nonce: bool,
) -> Result<Vec<OcspRequest>, TrustError> {
    let mut requests = Vec::new();
    for (subject, issuer) in chain.issuer_links() {
        requests.extend(build_link_requests(subject, issuer, enable_nonce)?);
    }
    Ok(requests)
}

// DER encoding helpers

fn der_sequence(contents: &[u8]) -> Vec<u8> {
    der_tlv(0x30, contents)
}

fn der_octet_string(contents: &[u8]) -> Vec<u8> {
    der_tlv(0x04, contents)
}

fn der_integer(value: &[u8]) -> Vec<u8> {
    // Serials are unsigned; a leading set high bit needs a zero pad so the
    // INTEGER does not read as negative
    let needs_pad = value.first().is_some_and(|b| b & 0x80 != 0);
    let mut contents = Vec::with_capacity(value.len() + 1);
    if needs_pad {
        contents.push(0x00);
    }
    contents.extend_from_slice(value);
    der_tlv(0x02, &contents)
}

fn der_oid(components: &[u64]) -> Vec<u8> {
    let mut encoded = Vec::new();
    if let [first, second, rest @ ..] = components {
        // First two arcs share one octet
        encoded.push((first * 40 + second) as u8);
        for &arc in rest {
            encode_base128(arc, &mut encoded);
        }
    }
    der_tlv(0x06, &encoded)
}

fn der_null() -> Vec<u8> {
    vec![0x05, 0x00]
}

fn der_explicit_context(tag: u8, contents: &[u8]) -> Vec<u8> {
    der_tlv(0xA0 | tag, contents)
}

fn der_tlv(tag: u8, contents: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(contents.len() + 4);
    out.push(tag);
    out.extend_from_slice(&der_length(contents.len()));
    out.extend_from_slice(contents);
    out
}

fn der_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    // Long form: leading octet carries the count of length octets
    let octets = length.to_be_bytes();
    let skip = octets.iter().take_while(|&&b| b == 0).count();
    let mut out = vec![0x80 | (octets.len() - skip) as u8];
    out.extend_from_slice(&octets[skip..]);
    out
}

fn encode_base128(value: u64, out: &mut Vec<u8>) {
    let mut shift = 63;
    while shift > 0 && (value >> shift) & 0x7F == 0 {
        shift -= 7;
    }
    while shift > 0 {
        out.push(0x80 | ((value >> shift) & 0x7F) as u8);
        shift -= 7;
    }
    out.push((value & 0x7F) as u8);
}
