use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_max_chain_length() -> usize {
    10
}

/// Policy knobs for one verification session.
///
/// The defaults are the strict ones: revocation is checked at every chain
/// level and a missing or expired CRL fails the chain rather than being
/// skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPolicy {
    /// Consult CRLs for every certificate on the chain.
    #[serde(default = "default_true")]
    pub crl_check_enabled: bool,
    /// Fail with `CrlMissing` when no CRL exists for an issuer; when
    /// false, revocation is skipped for that certificate only.
    #[serde(default = "default_true")]
    pub crl_required: bool,
    /// Consult a CRL even when the verification time is outside its
    /// update window instead of failing with `CrlExpired`.
    #[serde(default)]
    pub allow_expired_crl: bool,
    /// Maximum certificates on a chain, the leaf included.
    #[serde(default = "default_max_chain_length")]
    pub max_chain_length: usize,
    /// Try every candidate chain instead of the first one built.
    #[serde(default)]
    pub exhaustive_search: bool,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            crl_check_enabled: true,
            crl_required: true,
            allow_expired_crl: false,
            max_chain_length: 10,
            exhaustive_search: false,
        }
    }
}

impl VerifyPolicy {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    /// Load the policy from defaults, an optional `config/policy` file and
    /// the environment. A provided `env_vars` map replaces the system
    /// environment, keeping tests isolated from ambient variables.
    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("crl_check_enabled", true)?
            .set_default("crl_required", true)?
            .set_default("allow_expired_crl", false)?
            .set_default("max_chain_length", 10)?
            .set_default("exhaustive_search", false)?
            .add_source(File::with_name("config/policy").required(false));

        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Environment variables in the form CERTPATH_CRL_REQUIRED.
            builder = builder.add_source(Environment::with_prefix("CERTPATH").prefix_separator("_"));
        }

        builder.build()?.try_deserialize()
    }
}
