use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_parser::certificate::X509Certificate;
use x509_parser::error::X509Error;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::FromDer;
use x509_parser::revocation_list::CertificateRevocationList as X509Crl;
use x509_parser::time::ASN1Time;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::model::{Certificate, CertificateRevocationList, KeyUsage};
use crate::validator::SignatureVerifier;

/// Errors while decoding DER certificate or CRL bytes into model types.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),

    #[error("timestamp out of range in {0}")]
    Timestamp(&'static str),
}

fn asn1_time(t: ASN1Time, field: &'static str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(t.timestamp(), 0).ok_or(DecodeError::Timestamp(field))
}

/// Decode a DER-encoded certificate into the verification model.
///
/// Subject and issuer are kept in display form, the serial in decimal; the
/// raw DER is retained for signature verification.
pub fn decode_certificate(der: &[u8]) -> Result<Certificate, DecodeError> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| DecodeError::X509(e.into()))?;

    let mut is_ca = false;
    let mut path_len_constraint = None;
    let mut key_usage = None;
    for ext in cert.tbs_certificate.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => {
                is_ca = bc.ca;
                path_len_constraint = bc.path_len_constraint;
            }
            ParsedExtension::KeyUsage(usage) => {
                key_usage = Some(KeyUsage {
                    digital_signature: usage.digital_signature(),
                    key_cert_sign: usage.key_cert_sign(),
                    crl_sign: usage.crl_sign(),
                });
            }
            _ => {}
        }
    }

    Ok(Certificate {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.tbs_certificate.serial.to_string(),
        not_before: asn1_time(cert.validity().not_before, "notBefore")?,
        not_after: asn1_time(cert.validity().not_after, "notAfter")?,
        public_key: cert.public_key().raw.to_vec(),
        is_ca,
        path_len_constraint,
        key_usage,
        raw: Arc::new(der.to_vec()),
    })
}

/// Decode a DER-encoded CRL into the verification model.
pub fn decode_crl(der: &[u8]) -> Result<CertificateRevocationList, DecodeError> {
    let (_, crl) = X509Crl::from_der(der).map_err(|e| DecodeError::X509(e.into()))?;

    let mut revoked = HashMap::new();
    for entry in &crl.tbs_cert_list.revoked_certificates {
        let serial = entry.user_certificate.to_string();
        let revoked_at = asn1_time(entry.revocation_date, "revocationDate")?;
        revoked.insert(serial, revoked_at);
    }

    let next_update = match crl.tbs_cert_list.next_update {
        Some(t) => Some(asn1_time(t, "nextUpdate")?),
        None => None,
    };

    Ok(CertificateRevocationList {
        issuer: crl.tbs_cert_list.issuer.to_string(),
        this_update: asn1_time(crl.tbs_cert_list.this_update, "thisUpdate")?,
        next_update,
        revoked,
        raw: Arc::new(der.to_vec()),
    })
}

/// Default [`SignatureVerifier`]: re-parses the retained DER and verifies
/// the certificate signature against the issuer's SubjectPublicKeyInfo.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerSignatureVerifier;

impl SignatureVerifier for DerSignatureVerifier {
    fn verify_signature(&self, cert: &Certificate, issuer_public_key: &[u8]) -> bool {
        let Ok((_, parsed)) = X509Certificate::from_der(&cert.raw) else {
            return false;
        };
        let Ok((_, spki)) = SubjectPublicKeyInfo::from_der(issuer_public_key) else {
            return false;
        };
        parsed.verify_signature(Some(&spki)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use rcgen::{
        BasicConstraints, CertificateParams, CertificateRevocationListParams,
        DistinguishedName, DnType, IsCa, Issuer, KeyIdMethod, KeyPair, KeyUsagePurpose,
        RevocationReason, RevokedCertParams, SerialNumber,
    };
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::context::VerificationContext;
    use crate::truststore::TrustStore;
    use crate::validator::{ErrorKind, Verdict};

    fn validity() -> (OffsetDateTime, OffsetDateTime) {
        let now = OffsetDateTime::now_utc();
        (now - Duration::days(1), now + Duration::days(365))
    }

    fn ca_params(cn: &str, serial: u8, path_len: Option<u8>) -> CertificateParams {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        params.serial_number = Some(SerialNumber::from(vec![serial]));
        let (not_before, not_after) = validity();
        params.not_before = not_before;
        params.not_after = not_after;
        params.is_ca = match path_len {
            Some(n) => IsCa::Ca(BasicConstraints::Constrained(n)),
            None => IsCa::Ca(BasicConstraints::Unconstrained),
        };
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        params
    }

    fn gen_crl(
        issuer: &Issuer<'static, KeyPair>,
        revoked_serials: &[u8],
    ) -> CertificateRevocationList {
        let now = OffsetDateTime::now_utc();
        let params = CertificateRevocationListParams {
            this_update: now - Duration::days(1),
            next_update: now + Duration::days(30),
            crl_number: SerialNumber::from(vec![0x01]),
            issuing_distribution_point: None,
            revoked_certs: revoked_serials
                .iter()
                .map(|&serial| RevokedCertParams {
                    serial_number: SerialNumber::from(vec![serial]),
                    revocation_time: now - Duration::hours(1),
                    reason_code: Some(RevocationReason::KeyCompromise),
                    invalidity_date: None,
                })
                .collect(),
            key_identifier_method: KeyIdMethod::Sha256,
        };
        let crl = params.signed_by(issuer).unwrap();
        decode_crl(crl.der()).unwrap()
    }

    /// Root -> issuing CA -> leaf, with CRLs for every level so the strict
    /// default policy is satisfiable.
    fn hierarchy(revoke_leaf: bool) -> (TrustStore, Certificate) {
        let root_params = ca_params("Test Root CA", 1, None);
        let root_key = KeyPair::generate().unwrap();
        let root_cert = root_params.self_signed(&root_key).unwrap();
        let root_model = decode_certificate(root_cert.der()).unwrap();
        let root_issuer = Issuer::new(root_params, root_key);

        let int_params = ca_params("Test Issuing CA", 2, Some(0));
        let int_key = KeyPair::generate().unwrap();
        let int_cert = int_params.signed_by(&int_key, &root_issuer).unwrap();
        let int_model = decode_certificate(int_cert.der()).unwrap();
        let int_issuer = Issuer::new(int_params, int_key);

        let mut leaf_params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "client.example.org");
        leaf_params.distinguished_name = dn;
        leaf_params.serial_number = Some(SerialNumber::from(vec![3]));
        let (not_before, not_after) = validity();
        leaf_params.not_before = not_before;
        leaf_params.not_after = not_after;
        leaf_params.is_ca = IsCa::NoCa;
        let leaf_key = KeyPair::generate().unwrap();
        let leaf_cert = leaf_params.signed_by(&leaf_key, &int_issuer).unwrap();
        let leaf_model = decode_certificate(leaf_cert.der()).unwrap();

        let revoked: &[u8] = if revoke_leaf { &[3] } else { &[] };
        let mut store = TrustStore::new();
        store.add_trusted_root(root_model);
        store.add_intermediate(int_model);
        store.add_crl(gen_crl(&root_issuer, &[]));
        store.add_crl(gen_crl(&int_issuer, revoked));

        (store, leaf_model)
    }

    #[test]
    fn test_decode_certificate_fields() {
        let params = ca_params("Test Root CA", 1, Some(2));
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();

        let model = decode_certificate(cert.der()).unwrap();
        assert!(model.subject.contains("Test Root CA"));
        assert_eq!(model.subject, model.issuer);
        assert_eq!(model.serial, "1");
        assert!(model.is_ca);
        assert_eq!(model.path_len_constraint, Some(2));
        let usage = model.key_usage.unwrap();
        assert!(usage.key_cert_sign);
        assert!(usage.crl_sign);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_certificate(&[0u8; 16]).is_err());
        assert!(decode_crl(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_decode_crl_entries() {
        let root_params = ca_params("Test Root CA", 1, None);
        let root_key = KeyPair::generate().unwrap();
        let root_issuer = Issuer::new(root_params, root_key);

        let crl = gen_crl(&root_issuer, &[7]);
        assert!(crl.issuer.contains("Test Root CA"));
        assert!(crl.revocation_time("7").is_some());
        assert!(crl.revocation_time("8").is_none());
        assert!(crl.is_current_at(Utc::now()));
    }

    #[test]
    fn test_der_signature_verifier() {
        let (store, leaf) = hierarchy(false);
        let issuing_ca = store.issuer_candidates(&leaf.issuer)[0];
        let root = store.issuer_candidates(&issuing_ca.issuer)[0];

        let verifier = DerSignatureVerifier;
        assert!(verifier.verify_signature(&leaf, &issuing_ca.public_key));
        // The wrong issuer key must not verify.
        assert!(!verifier.verify_signature(&leaf, &root.public_key));
        assert!(!verifier.verify_signature(&leaf, b"not a key"));
    }

    #[test]
    fn test_verify_full_hierarchy() {
        let (store, leaf) = hierarchy(false);
        let verifier = DerSignatureVerifier;
        let ctx = VerificationContext::new(&store, &verifier);

        let outcome = ctx.verify(&leaf);
        assert_eq!(outcome.verdict, Verdict::Valid { anchor_index: 2 });
        assert_eq!(outcome.chains_tried, 1);
    }

    #[test]
    fn test_verify_revoked_leaf() {
        let (store, leaf) = hierarchy(true);
        let verifier = DerSignatureVerifier;
        let ctx = VerificationContext::new(&store, &verifier);

        let outcome = ctx.verify(&leaf);
        match outcome.verdict {
            Verdict::Invalid { kind, index, .. } => {
                assert_eq!(kind, ErrorKind::Revoked);
                assert_eq!(index, 0);
            }
            Verdict::Valid { .. } => panic!("revoked leaf must not verify"),
        }
    }
}
