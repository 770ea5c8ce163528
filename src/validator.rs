use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::chain::Chain;
use crate::model::Certificate;
use crate::policy::VerifyPolicy;
use crate::truststore::TrustStore;

/// Cryptographic signature verification, supplied by the caller.
///
/// The validator hands over the certificate and the DER-encoded
/// SubjectPublicKeyInfo of its issuer (the next certificate on the chain,
/// or the certificate's own key for a self-signed anchor) and expects a
/// plain yes/no. See [`crate::x509::DerSignatureVerifier`] for the default
/// implementation.
pub trait SignatureVerifier {
    fn verify_signature(&self, cert: &Certificate, issuer_public_key: &[u8]) -> bool;
}

/// Why a chain was rejected. Every kind is a terminal, non-retryable
/// verdict for the given inputs and verification time.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[error("certificate has expired")]
    Expired,

    #[error("certificate is not yet valid")]
    NotYetValid,

    #[error("certificate signature verification failed")]
    SignatureInvalid,

    #[error("certificate violates X.509 path constraints")]
    ConstraintViolation,

    #[error("no CRL available for the certificate's issuer")]
    CrlMissing,

    #[error("the CRL for the certificate's issuer has expired")]
    CrlExpired,

    #[error("certificate has been revoked")]
    Revoked,

    #[error("chain does not terminate at a trusted root")]
    UntrustedRoot,

    #[error("no path from the leaf certificate to a trust anchor")]
    NoPathToTrustAnchor,

    #[error("certificate chain exceeds the configured maximum length")]
    ChainTooLong,
}

/// Outcome of validating one candidate chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Every certificate passed every check; `anchor_index` is the chain
    /// position of the trusted root used.
    Valid { anchor_index: usize },
    /// Validation stopped at the certificate at `index`. The detail string
    /// names the certificate and the rule violated, sufficient for audit
    /// logging without re-running verification.
    Invalid {
        kind: ErrorKind,
        index: usize,
        detail: String,
    },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }

    fn invalid(kind: ErrorKind, index: usize, detail: String) -> Self {
        tracing::warn!(%kind, index, %detail, "chain validation failed");
        Verdict::Invalid {
            kind,
            index,
            detail,
        }
    }
}

/// Walks a candidate chain leaf to root, applying per-certificate checks
/// in a fixed order and stopping at the first failure. A chain is never
/// `Valid` on ambiguous or incomplete information: under the default
/// policy a missing or expired CRL is a hard failure, not a skip.
pub struct ChainValidator<'a, V> {
    store: &'a TrustStore,
    verifier: &'a V,
    policy: &'a VerifyPolicy,
}

impl<'a, V: SignatureVerifier> ChainValidator<'a, V> {
    pub fn new(store: &'a TrustStore, verifier: &'a V, policy: &'a VerifyPolicy) -> Self {
        Self {
            store,
            verifier,
            policy,
        }
    }

    /// Validate `chain` as of time `now`.
    pub fn validate_at(&self, chain: &Chain<'_>, now: DateTime<Utc>) -> Verdict {
        if chain.is_empty() {
            return Verdict::invalid(
                ErrorKind::NoPathToTrustAnchor,
                0,
                "empty certificate chain".to_string(),
            );
        }
        for (index, cert) in chain.iter().enumerate() {
            if let Some(verdict) = self.check_validity_period(cert, index, now) {
                return verdict;
            }
            if let Some(verdict) = self.check_signature(chain, cert, index) {
                return verdict;
            }
            if let Some(verdict) = self.check_constraints(cert, index) {
                return verdict;
            }
            if let Some(verdict) = self.check_revocation(cert, index, now) {
                return verdict;
            }
            // Terminal certificate must itself be a trust anchor, by full
            // identity and not merely by subject.
            if index == chain.len() - 1 && !self.store.contains_root(cert) {
                return Verdict::invalid(
                    ErrorKind::UntrustedRoot,
                    index,
                    format!(
                        "certificate {index} ({}) terminates the chain but is not a trust anchor",
                        cert.subject
                    ),
                );
            }
        }

        let anchor_index = chain.len() - 1;
        tracing::debug!(anchor_index, "chain validation succeeded");
        Verdict::Valid { anchor_index }
    }

    fn check_validity_period(
        &self,
        cert: &Certificate,
        index: usize,
        now: DateTime<Utc>,
    ) -> Option<Verdict> {
        if now < cert.not_before {
            return Some(Verdict::invalid(
                ErrorKind::NotYetValid,
                index,
                format!(
                    "certificate {index} ({}) is not valid before {}, checked at {now}",
                    cert.subject, cert.not_before
                ),
            ));
        }
        if now > cert.not_after {
            return Some(Verdict::invalid(
                ErrorKind::Expired,
                index,
                format!(
                    "certificate {index} ({}) expired at {}, checked at {now}",
                    cert.subject, cert.not_after
                ),
            ));
        }
        None
    }

    fn check_signature(
        &self,
        chain: &Chain<'_>,
        cert: &Certificate,
        index: usize,
    ) -> Option<Verdict> {
        // The issuer key is the next certificate's; the terminal
        // certificate is checked against its own key (self-signed anchor).
        let issuer_key = match chain.get(index + 1) {
            Some(issuer) => &issuer.public_key,
            None => &cert.public_key,
        };
        if !self.verifier.verify_signature(cert, issuer_key) {
            return Some(Verdict::invalid(
                ErrorKind::SignatureInvalid,
                index,
                format!(
                    "certificate {index} ({}) signature does not verify against issuer {}",
                    cert.subject, cert.issuer
                ),
            ));
        }
        None
    }

    fn check_constraints(&self, cert: &Certificate, index: usize) -> Option<Verdict> {
        // The leaf is exempt from CA constraints.
        if index == 0 {
            return None;
        }
        if !cert.is_ca {
            return Some(Verdict::invalid(
                ErrorKind::ConstraintViolation,
                index,
                format!(
                    "certificate {index} ({}) issues certificates but is not a CA",
                    cert.subject
                ),
            ));
        }
        if let Some(max) = cert.path_len_constraint {
            // Intermediates strictly below this certificate, the leaf
            // excluded.
            let below = index - 1;
            if below > max as usize {
                return Some(Verdict::invalid(
                    ErrorKind::ConstraintViolation,
                    index,
                    format!(
                        "certificate {index} ({}) allows {max} intermediate level(s) but has {below}",
                        cert.subject
                    ),
                ));
            }
        }
        if let Some(usage) = &cert.key_usage
            && !usage.key_cert_sign
        {
            return Some(Verdict::invalid(
                ErrorKind::ConstraintViolation,
                index,
                format!(
                    "certificate {index} ({}) lacks the keyCertSign usage",
                    cert.subject
                ),
            ));
        }
        None
    }

    fn check_revocation(
        &self,
        cert: &Certificate,
        index: usize,
        now: DateTime<Utc>,
    ) -> Option<Verdict> {
        if !self.policy.crl_check_enabled {
            return None;
        }
        let Some(crl) = self.store.find_crl(&cert.issuer) else {
            if self.policy.crl_required {
                return Some(Verdict::invalid(
                    ErrorKind::CrlMissing,
                    index,
                    format!(
                        "no CRL available for issuer {} of certificate {index} ({})",
                        cert.issuer, cert.subject
                    ),
                ));
            }
            tracing::debug!(index, issuer = %cert.issuer, "no CRL for issuer, skipping");
            return None;
        };
        if !crl.is_current_at(now) {
            if !self.policy.allow_expired_crl {
                return Some(Verdict::invalid(
                    ErrorKind::CrlExpired,
                    index,
                    format!(
                        "CRL for issuer {} of certificate {index} is outside its update window at {now}",
                        cert.issuer
                    ),
                ));
            }
            tracing::debug!(index, issuer = %cert.issuer, "CRL expired, skipping under lenient policy");
            return None;
        }
        if let Some(revoked_at) = crl.revocation_time(&cert.serial) {
            return Some(Verdict::invalid(
                ErrorKind::Revoked,
                index,
                format!(
                    "certificate {index} ({}, serial {}) was revoked at {revoked_at}",
                    cert.subject, cert.serial
                ),
            ));
        }
        None
    }
}
