//! Engine configuration.
//!
//! Every replica validating a transaction must run with the same
//! configuration, otherwise their results diverge.
//!
//! ```toml
//! [issuance]
//! require_open = true
//!
//! [reveal]
//! duplicates = "reject"
//! max_combinations = 10000000
//!
//! [transient]
//! vote_field = "vote"
//! reveal_field = "reveal"
//!
//! [events]
//! enabled = true
//! ```

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub issuance: IssuanceConfig,
    pub reveal: RevealConfig,
    pub transient: TransientConfig,
    pub events: EventConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IssuanceConfig {
    /// Only issue vote tokens while the poll is open.
    pub require_open: bool,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self { require_open: true }
    }
}

/// How repeated transaction ids or secrets in a reveal are treated.
///
/// Distinct `(tx, secret, option)` triples never hash alike, so a stored
/// commitment can only match more than one candidate when the reveal
/// lists an entry more than once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the whole reveal with `MalformedInput`.
    #[default]
    Reject,
    /// Drop repeats, so each commitment counts at most once.
    Collapse,
    /// Keep repeats: a commitment counts once per repeated candidate.
    /// Overcounts.
    CountEach,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevealConfig {
    pub duplicates: DuplicatePolicy,

    /// Upper bound on the candidate hashes a reveal may compute,
    /// `tx_ids * secrets * options`.
    pub max_combinations: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            duplicates: DuplicatePolicy::default(),
            max_combinations: 10_000_000,
        }
    }
}

/// Names of the transient map fields carrying anonymous payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransientConfig {
    pub vote_field: String,
    pub reveal_field: String,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            vote_field: "vote".to_string(),
            reveal_field: "reveal".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventConfig {
    pub enabled: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl EngineConfig {
    /// Load a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::Error::Config(format!("reading {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reveal.max_combinations == 0 {
            return Err(crate::Error::Config(
                "reveal.max_combinations must be positive".into(),
            ));
        }
        if self.transient.vote_field.is_empty() || self.transient.reveal_field.is_empty() {
            return Err(crate::Error::Config(
                "transient field names must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.issuance.require_open);
        assert_eq!(config.reveal.duplicates, DuplicatePolicy::Reject);
        assert_eq!(config.transient.vote_field, "vote");
    }

    #[test]
    fn partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            [issuance]
            require_open = false

            [reveal]
            duplicates = "collapse"
            "#,
        )
        .unwrap();
        assert!(!config.issuance.require_open);
        assert_eq!(config.reveal.duplicates, DuplicatePolicy::Collapse);
        assert_eq!(config.reveal.max_combinations, 10_000_000);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = EngineConfig::from_toml_str("[issuance]\nrequire_opne = true\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn zero_budget_rejected() {
        let err = EngineConfig::from_toml_str("[reveal]\nmax_combinations = 0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("ezpoll-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[events]\nenabled = false\n").unwrap();
        let config = EngineConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert!(!config.events.enabled);
        assert_eq!(config.reveal, RevealConfig::default());
    }

    #[test]
    fn load_missing_file() {
        let err = EngineConfig::load("/nonexistent/ezpoll.toml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
