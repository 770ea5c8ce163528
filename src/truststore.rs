use std::collections::HashMap;

use crate::model::{Certificate, CertificateRevocationList};

/// Holds the material one verification session runs against: trusted root
/// certificates, untrusted intermediates usable for chain building, and
/// CRLs keyed by issuer.
///
/// The store is built once and read-only during verification; sharing one
/// instance across concurrent verifications is safe as long as no mutation
/// happens concurrently with reads.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    /// Trusted roots keyed by subject. Multiple roots may share a subject
    /// (cross-signed); all are retained in insertion order.
    roots: HashMap<String, Vec<Certificate>>,
    /// Untrusted chain-building candidates keyed by subject.
    intermediates: HashMap<String, Vec<Certificate>>,
    /// Current CRL per issuer.
    crls: HashMap<String, CertificateRevocationList>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trust anchor.
    pub fn add_trusted_root(&mut self, cert: Certificate) {
        tracing::debug!(subject = %cert.subject, serial = %cert.serial, "adding trusted root");
        self.roots.entry(cert.subject.clone()).or_default().push(cert);
    }

    /// Add an untrusted certificate usable as chain-building material.
    pub fn add_intermediate(&mut self, cert: Certificate) {
        tracing::debug!(subject = %cert.subject, serial = %cert.serial, "adding intermediate");
        self.intermediates
            .entry(cert.subject.clone())
            .or_default()
            .push(cert);
    }

    /// Add a CRL. If a CRL for the same issuer is already present, the one
    /// with the later `this_update` wins.
    pub fn add_crl(&mut self, crl: CertificateRevocationList) {
        match self.crls.get(&crl.issuer) {
            Some(existing) if existing.this_update >= crl.this_update => {
                tracing::debug!(
                    issuer = %crl.issuer,
                    "keeping existing CRL with later this_update"
                );
            }
            _ => {
                tracing::debug!(issuer = %crl.issuer, "storing CRL");
                self.crls.insert(crl.issuer.clone(), crl);
            }
        }
    }

    /// All certificates whose subject equals `issuer`, roots first, each
    /// group in insertion order. Deterministic so chain selection is
    /// reproducible.
    pub fn issuer_candidates(&self, issuer: &str) -> Vec<&Certificate> {
        let roots = self.roots.get(issuer).into_iter().flatten();
        let intermediates = self.intermediates.get(issuer).into_iter().flatten();
        roots.chain(intermediates).collect()
    }

    /// The current CRL for `issuer`, if any.
    pub fn find_crl(&self, issuer: &str) -> Option<&CertificateRevocationList> {
        self.crls.get(issuer)
    }

    /// Whether `cert` itself is a trust anchor. Identity comparison, not a
    /// mere subject match: subject, serial and public key must all equal a
    /// stored root.
    pub fn contains_root(&self, cert: &Certificate) -> bool {
        self.roots
            .get(&cert.subject)
            .is_some_and(|roots| {
                roots.iter().any(|root| {
                    root.serial == cert.serial && root.public_key == cert.public_key
                })
            })
    }

    pub fn root_count(&self) -> usize {
        self.roots.values().map(Vec::len).sum()
    }

    pub fn intermediate_count(&self) -> usize {
        self.intermediates.values().map(Vec::len).sum()
    }

    pub fn crl_count(&self) -> usize {
        self.crls.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn cert(subject: &str, issuer: &str, serial: &str) -> Certificate {
        Certificate {
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            serial: serial.to_string(),
            not_before: at(2024, 1, 1),
            not_after: at(2030, 1, 1),
            public_key: format!("key:{subject}:{serial}").into_bytes(),
            is_ca: true,
            path_len_constraint: None,
            key_usage: None,
            raw: Arc::new(vec![]),
        }
    }

    fn crl(issuer: &str, this_update: DateTime<Utc>) -> CertificateRevocationList {
        CertificateRevocationList {
            issuer: issuer.to_string(),
            this_update,
            next_update: None,
            revoked: HashMap::new(),
            raw: Arc::new(vec![]),
        }
    }

    #[test]
    fn test_issuer_candidates_roots_first_insertion_order() {
        let mut store = TrustStore::new();
        store.add_intermediate(cert("CN=CA", "CN=Root", "10"));
        store.add_intermediate(cert("CN=CA", "CN=Other Root", "11"));
        store.add_trusted_root(cert("CN=CA", "CN=CA", "1"));

        let candidates = store.issuer_candidates("CN=CA");
        let serials: Vec<_> = candidates.iter().map(|c| c.serial.as_str()).collect();
        assert_eq!(serials, ["1", "10", "11"]);

        assert!(store.issuer_candidates("CN=Unknown").is_empty());
    }

    #[test]
    fn test_cross_signed_roots_all_retained() {
        let mut store = TrustStore::new();
        store.add_trusted_root(cert("CN=Root", "CN=Root", "1"));
        store.add_trusted_root(cert("CN=Root", "CN=Bridge", "2"));
        assert_eq!(store.root_count(), 2);
        assert_eq!(store.issuer_candidates("CN=Root").len(), 2);
    }

    #[test]
    fn test_newer_crl_replaces_older() {
        let mut store = TrustStore::new();
        store.add_crl(crl("CN=CA", at(2025, 1, 1)));
        store.add_crl(crl("CN=CA", at(2025, 6, 1)));
        assert_eq!(
            store.find_crl("CN=CA").unwrap().this_update,
            at(2025, 6, 1)
        );

        // An older CRL must not displace the current one.
        store.add_crl(crl("CN=CA", at(2024, 1, 1)));
        assert_eq!(
            store.find_crl("CN=CA").unwrap().this_update,
            at(2025, 6, 1)
        );
        assert_eq!(store.crl_count(), 1);
    }

    #[test]
    fn test_contains_root_requires_full_identity() {
        let mut store = TrustStore::new();
        store.add_trusted_root(cert("CN=Root", "CN=Root", "1"));

        assert!(store.contains_root(&cert("CN=Root", "CN=Root", "1")));
        // Same subject, different serial: an impostor, not the anchor.
        assert!(!store.contains_root(&cert("CN=Root", "CN=Root", "2")));
        assert!(!store.contains_root(&cert("CN=Other", "CN=Other", "1")));
    }
}
