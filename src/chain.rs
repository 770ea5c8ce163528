use thiserror::Error;

use crate::model::Certificate;
use crate::truststore::TrustStore;

/// Errors from chain construction, before any validation runs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChainBuildError {
    #[error("no path from the leaf certificate to a trust anchor")]
    NoPathToTrustAnchor,

    #[error("certificate chain exceeds the configured maximum length")]
    ChainTooLong,
}

/// An ordered certificate path from leaf (index 0) to a trust anchor
/// (last index). Holds borrowed references into the trust store and the
/// leaf; built by [`ChainBuilder`] and consumed by the validator.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    certs: Vec<&'a Certificate>,
}

impl<'a> Chain<'a> {
    pub fn new(certs: Vec<&'a Certificate>) -> Self {
        Self { certs }
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Certificate> {
        self.certs.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Certificate> + '_ {
        self.certs.iter().copied()
    }

    /// The end-entity certificate, unless the chain is empty.
    pub fn leaf(&self) -> Option<&'a Certificate> {
        self.get(0)
    }

    /// The trust-anchor end of the chain, unless the chain is empty.
    pub fn terminal(&self) -> Option<&'a Certificate> {
        self.certs.last().copied()
    }
}

/// Depth-first search from a leaf certificate through issuer links to a
/// certificate present in the store's trusted-root mapping.
pub struct ChainBuilder<'a> {
    store: &'a TrustStore,
    max_length: usize,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(store: &'a TrustStore, max_length: usize) -> Self {
        Self { store, max_length }
    }

    /// Build the first complete path found in issuer-candidate order.
    /// Deterministic, not optimal.
    pub fn build<'b>(&self, leaf: &'b Certificate) -> Result<Chain<'b>, ChainBuildError>
    where
        'a: 'b,
    {
        let mut found = self.search(leaf, false)?;
        Ok(found.swap_remove(0))
    }

    /// Enumerate every complete path. Used for diagnostics and exhaustive
    /// verification; candidate order is the same as [`build`](Self::build).
    pub fn build_all<'b>(&self, leaf: &'b Certificate) -> Result<Vec<Chain<'b>>, ChainBuildError>
    where
        'a: 'b,
    {
        self.search(leaf, true)
    }

    fn search<'b>(
        &self,
        leaf: &'b Certificate,
        exhaustive: bool,
    ) -> Result<Vec<Chain<'b>>, ChainBuildError>
    where
        'a: 'b,
    {
        let mut path: Vec<&'b Certificate> = vec![leaf];
        let mut found = Vec::new();
        let mut truncated = false;
        self.extend(&mut path, &mut found, exhaustive, &mut truncated);

        if found.is_empty() {
            // A branch pruned by the depth bound is the more informative
            // failure: the pool may well contain a longer valid path.
            if truncated {
                return Err(ChainBuildError::ChainTooLong);
            }
            return Err(ChainBuildError::NoPathToTrustAnchor);
        }
        tracing::debug!(paths = found.len(), "chain building complete");
        Ok(found)
    }

    /// Returns true when the search should stop (first path found and the
    /// caller did not ask for all of them).
    fn extend<'b>(
        &self,
        path: &mut Vec<&'b Certificate>,
        found: &mut Vec<Chain<'b>>,
        exhaustive: bool,
        truncated: &mut bool,
    ) -> bool
    where
        'a: 'b,
    {
        let tail = *path.last().unwrap();

        if self.store.contains_root(tail) {
            tracing::debug!(
                anchor = %tail.subject,
                depth = path.len(),
                "reached trust anchor"
            );
            found.push(Chain::new(path.clone()));
            return !exhaustive;
        }

        if path.len() >= self.max_length {
            *truncated = true;
            return false;
        }

        for candidate in self.store.issuer_candidates(&tail.issuer) {
            // Cycle prevention: never revisit a certificate already on the
            // path. Issuer pools are untrusted input and may be cyclic.
            if path.iter().any(|on_path| on_path.same_identity(candidate)) {
                continue;
            }
            path.push(candidate);
            let stop = self.extend(path, found, exhaustive, truncated);
            path.pop();
            if stop {
                return true;
            }
        }
        false
    }
}
