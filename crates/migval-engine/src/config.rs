use std::fmt;
use std::str::FromStr;

use migval_crypto::DigestAlgorithm;
use serde::{Deserialize, Serialize};

/// Which source versions are compared against which target resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Every source version against the target version at the same position.
    #[default]
    FullHistory,
    /// Only the HEAD version; the target must hold exactly one version.
    HeadOnly,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullHistory => f.write_str("full-history"),
            Self::HeadOnly => f.write_str("head-only"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-history" => Ok(Self::FullHistory),
            "head-only" => Ok(Self::HeadOnly),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Settings that shape the comparison of one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub strategy: Strategy,
    /// Compare content digests of managed datastreams.
    pub checksum: bool,
    pub digest_algorithm: DigestAlgorithm,
    /// Treat inactive objects and datastreams as deleted.
    pub inactive_as_deleted: bool,
    /// Prepended to a source pid to form the target object id.
    pub target_id_prefix: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::FullHistory,
            checksum: true,
            digest_algorithm: DigestAlgorithm::Sha512,
            inactive_as_deleted: false,
            target_id_prefix: "info:fedora/".into(),
        }
    }
}

impl ValidationConfig {
    pub fn head_only() -> Self {
        Self {
            strategy: Strategy::HeadOnly,
            ..Default::default()
        }
    }

    /// Target object id for a source pid.
    pub fn target_object_id(&self, pid: &str) -> String {
        format!("{}{pid}", self.target_id_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ValidationConfig::default();
        assert_eq!(config.strategy, Strategy::FullHistory);
        assert!(config.checksum);
        assert_eq!(config.target_object_id("demo:1"), "info:fedora/demo:1");
    }

    #[test]
    fn strategy_names() {
        for s in [Strategy::FullHistory, Strategy::HeadOnly] {
            assert_eq!(s.to_string().parse::<Strategy>().unwrap(), s);
        }
        assert!("latest".parse::<Strategy>().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ValidationConfig = toml::from_str(
            r#"
            strategy = "head-only"
            digest_algorithm = "sha-256"
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy, Strategy::HeadOnly);
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha256);
        assert!(config.checksum);
        assert_eq!(config.target_id_prefix, "info:fedora/");
    }
}
