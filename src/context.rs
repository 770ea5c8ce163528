use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chain::{ChainBuildError, ChainBuilder};
use crate::model::Certificate;
use crate::policy::VerifyPolicy;
use crate::truststore::TrustStore;
use crate::validator::{ChainValidator, ErrorKind, SignatureVerifier, Verdict};

/// The overall verification result: the verdict plus how many candidate
/// chains were validated to reach it. Serializable so callers can emit
/// the whole outcome into audit logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    pub chains_tried: usize,
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        self.verdict.is_valid()
    }
}

/// Orchestrates chain building and validation for one leaf certificate
/// against one trust store.
///
/// The default mode validates the first chain the builder produces; with
/// `exhaustive_search` every candidate chain is tried and the first
/// `Valid` verdict wins. When all candidates fail, the verdict of the last
/// one tried is returned, the most-complete path being the most
/// informative failure.
pub struct VerificationContext<'a, V> {
    store: &'a TrustStore,
    verifier: &'a V,
    policy: VerifyPolicy,
}

impl<'a, V: SignatureVerifier> VerificationContext<'a, V> {
    pub fn new(store: &'a TrustStore, verifier: &'a V) -> Self {
        Self::with_policy(store, verifier, VerifyPolicy::default())
    }

    pub fn with_policy(store: &'a TrustStore, verifier: &'a V, policy: VerifyPolicy) -> Self {
        Self {
            store,
            verifier,
            policy,
        }
    }

    pub fn policy(&self) -> &VerifyPolicy {
        &self.policy
    }

    /// Verify `leaf` as of the current wall-clock time.
    pub fn verify(&self, leaf: &Certificate) -> VerificationOutcome {
        self.verify_at(leaf, Utc::now())
    }

    /// Verify `leaf` as of the given time. Deterministic for identical
    /// inputs and time.
    pub fn verify_at(&self, leaf: &Certificate, now: DateTime<Utc>) -> VerificationOutcome {
        let builder = ChainBuilder::new(self.store, self.policy.max_chain_length);

        let chains = if self.policy.exhaustive_search {
            builder.build_all(leaf)
        } else {
            builder.build(leaf).map(|chain| vec![chain])
        };

        let chains = match chains {
            Ok(chains) => chains,
            Err(err) => {
                // No chain exists to validate; the build failure is the
                // verdict. The leaf index is the only meaningful one.
                tracing::warn!(subject = %leaf.subject, %err, "chain building failed");
                let kind = match err {
                    ChainBuildError::NoPathToTrustAnchor => ErrorKind::NoPathToTrustAnchor,
                    ChainBuildError::ChainTooLong => ErrorKind::ChainTooLong,
                };
                return VerificationOutcome {
                    verdict: Verdict::Invalid {
                        kind,
                        index: 0,
                        detail: format!("leaf certificate {}: {err}", leaf.subject),
                    },
                    chains_tried: 0,
                };
            }
        };

        let validator = ChainValidator::new(self.store, self.verifier, &self.policy);
        let mut last_verdict = None;
        let mut tried = 0;

        for chain in &chains {
            tried += 1;
            let verdict = validator.validate_at(chain, now);
            if verdict.is_valid() {
                tracing::debug!(
                    subject = %leaf.subject,
                    chains_tried = tried,
                    "verification succeeded"
                );
                return VerificationOutcome {
                    verdict,
                    chains_tried: tried,
                };
            }
            last_verdict = Some(verdict);
        }

        // The builder never returns an empty set, so a verdict exists.
        let verdict = last_verdict.unwrap_or_else(|| Verdict::Invalid {
            kind: ErrorKind::NoPathToTrustAnchor,
            index: 0,
            detail: format!("no candidate chain for leaf {}", leaf.subject),
        });
        tracing::warn!(subject = %leaf.subject, chains_tried = tried, "verification failed");
        VerificationOutcome {
            verdict,
            chains_tried: tried,
        }
    }
}
