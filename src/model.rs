use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Key usage flags relevant to path validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyUsage {
    pub digital_signature: bool,
    pub key_cert_sign: bool,
    pub crl_sign: bool,
}

/// A parsed X.509 certificate, reduced to the fields path validation needs.
///
/// Instances are immutable once constructed. The raw DER bytes are retained
/// so a [`SignatureVerifier`](crate::validator::SignatureVerifier)
/// implementation can re-verify the signature without the model carrying
/// any cryptographic state itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Subject distinguished name, display form.
    pub subject: String,
    /// Issuer distinguished name, display form.
    pub issuer: String,
    /// Serial number as a decimal string.
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// DER-encoded SubjectPublicKeyInfo.
    pub public_key: Vec<u8>,
    /// Basic constraints: may this certificate act as a CA.
    pub is_ca: bool,
    /// Basic constraints: maximum number of intermediate certificates
    /// allowed below this one, if constrained.
    pub path_len_constraint: Option<u32>,
    /// Key usage extension, if present.
    pub key_usage: Option<KeyUsage>,
    /// Raw DER bytes of the whole certificate.
    pub raw: Arc<Vec<u8>>,
}

impl Certificate {
    /// Whether the validity window contains `at`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Subject and issuer name the same entity.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    /// Certificate identity for cycle prevention and revocation lookups:
    /// (issuer, serial) uniquely names a certificate.
    pub fn same_identity(&self, other: &Certificate) -> bool {
        self.issuer == other.issuer && self.serial == other.serial
    }
}

/// A parsed certificate revocation list.
///
/// Usable only while the verification time lies within the
/// `[this_update, next_update]` window; a CRL without `next_update` does
/// not expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRevocationList {
    /// Issuer distinguished name, display form.
    pub issuer: String,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    /// Revoked serial numbers mapped to their revocation time.
    pub revoked: HashMap<String, DateTime<Utc>>,
    /// Raw DER bytes, retained for external signature verification.
    pub raw: Arc<Vec<u8>>,
}

impl CertificateRevocationList {
    /// Whether this CRL may be consulted at `at`.
    pub fn is_current_at(&self, at: DateTime<Utc>) -> bool {
        if at < self.this_update {
            return false;
        }
        self.next_update.is_none_or(|next| at <= next)
    }

    /// Revocation time for `serial`, if that serial is revoked.
    pub fn revocation_time(&self, serial: &str) -> Option<DateTime<Utc>> {
        self.revoked.get(serial).copied()
    }
}
