//! Rule configuration
//!
//! The scoring rules read every threshold and weight from [`Config`]. A
//! config is built once at process start (defaults or a TOML file, then
//! environment overrides through [`load_config`]) and passed by reference
//! into every assessment.

use crate::{Decision, Error, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Environment variable overriding `score_to_decision.reject_at`
pub const REJECT_AT_ENV: &str = "REJECT_AT";

/// Environment variable overriding `score_to_decision.review_at`
pub const REVIEW_AT_ENV: &str = "REVIEW_AT";

/// Largest weight magnitude a config may carry
pub const MAX_WEIGHT_MAGNITUDE: i32 = 1_000;

/// Rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Latency (ms) at or above which a transaction is penalised
    pub latency_ms_extreme: Decimal,

    /// Chargeback count that, together with a high-risk IP, hard blocks
    pub chargeback_hard_block: u32,

    /// IP risk level that participates in the hard block
    #[serde(default = "default_hard_block_ip_risk")]
    pub hard_block_ip_risk: String,

    /// High-amount thresholds per product type
    pub amount_thresholds: AmountThresholds,

    /// Weight tables for categorical signals
    pub score_weights: ScoreWeights,

    /// Score cut points
    pub score_to_decision: ScoreToDecision,
}

fn default_hard_block_ip_risk() -> String {
    "high".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latency_ms_extreme: dec!(2500),
            chargeback_hard_block: 2,
            hard_block_ip_risk: default_hard_block_ip_risk(),
            amount_thresholds: AmountThresholds::default(),
            score_weights: ScoreWeights::default(),
            score_to_decision: ScoreToDecision::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config is usable for scoring
    pub fn validate(&self) -> Result<()> {
        let cut = &self.score_to_decision;
        if cut.review_at > cut.reject_at {
            return Err(Error::InvalidConfig(format!(
                "review_at ({}) must not exceed reject_at ({})",
                cut.review_at, cut.reject_at
            )));
        }

        let thresholds = &self.amount_thresholds;
        if let Some((product, _)) = thresholds
            .by_product
            .iter()
            .find(|(_, amount)| amount.is_sign_negative())
        {
            return Err(Error::InvalidConfig(format!(
                "Negative amount threshold for product type {}",
                product
            )));
        }
        if thresholds.default.is_sign_negative() || self.latency_ms_extreme.is_sign_negative() {
            return Err(Error::InvalidConfig(
                "Thresholds must not be negative".to_string(),
            ));
        }

        for (field, table) in self.score_weights.tables() {
            if let Some((level, weight)) = table
                .iter()
                .find(|(_, weight)| weight.unsigned_abs() > MAX_WEIGHT_MAGNITUDE.unsigned_abs())
            {
                return Err(Error::InvalidConfig(format!(
                    "Weight {}.{} = {} exceeds +/-{}",
                    field, level, weight, MAX_WEIGHT_MAGNITUDE
                )));
            }
        }

        Ok(())
    }
}

/// High-amount thresholds, keyed by product type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountThresholds {
    /// Threshold for product types without their own entry
    #[serde(rename = "_default")]
    pub default: Decimal,

    /// Per-product thresholds
    #[serde(flatten)]
    pub by_product: BTreeMap<String, Decimal>,
}

impl AmountThresholds {
    /// Threshold for `product_type`, falling back to `_default`
    pub fn threshold_for(&self, product_type: &str) -> Decimal {
        self.by_product
            .get(product_type)
            .copied()
            .unwrap_or(self.default)
    }
}

impl Default for AmountThresholds {
    fn default() -> Self {
        let by_product = BTreeMap::from([
            ("digital".to_string(), dec!(2500)),
            ("physical".to_string(), dec!(6000)),
            ("subscription".to_string(), dec!(1500)),
        ]);

        Self {
            default: dec!(4000),
            by_product,
        }
    }
}

/// Weight table: categorical level -> signed score delta
pub type WeightTable = BTreeMap<String, i32>;

/// Weight tables for the categorical signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weights by IP risk level
    pub ip_risk: WeightTable,
    /// Weights by email risk level
    pub email_risk: WeightTable,
    /// Weights by device fingerprint risk level
    pub device_fingerprint_risk: WeightTable,
    /// Weights by user reputation
    pub user_reputation: WeightTable,
}

impl ScoreWeights {
    /// Every table with its field name
    pub fn tables(&self) -> [(&'static str, &WeightTable); 4] {
        [
            ("ip_risk", &self.ip_risk),
            ("email_risk", &self.email_risk),
            ("device_fingerprint_risk", &self.device_fingerprint_risk),
            ("user_reputation", &self.user_reputation),
        ]
    }
}

fn weight_table(entries: &[(&str, i32)]) -> WeightTable {
    entries
        .iter()
        .map(|(level, weight)| (level.to_string(), *weight))
        .collect()
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            ip_risk: weight_table(&[("low", 0), ("medium", 2), ("high", 4)]),
            email_risk: weight_table(&[("low", 0), ("medium", 1), ("high", 3), ("new_domain", 2)]),
            device_fingerprint_risk: weight_table(&[("low", 0), ("medium", 2), ("high", 4)]),
            user_reputation: weight_table(&[
                ("trusted", -2),
                ("recurrent", -1),
                ("new", 0),
                ("high_risk", 4),
            ]),
        }
    }
}

/// Score cut points for the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreToDecision {
    /// Scores at or above this go to review
    pub review_at: i32,

    /// Scores at or above this are rejected
    pub reject_at: i32,
}

impl Default for ScoreToDecision {
    fn default() -> Self {
        Self {
            review_at: 4,
            reject_at: 10,
        }
    }
}

impl ScoreToDecision {
    /// Map a final score to a decision.
    ///
    /// Rejection is checked first so an inverted pair of cut points (only
    /// reachable through overrides) still yields a single answer.
    pub fn decide(&self, score: i32) -> Decision {
        if score >= self.reject_at {
            Decision::Rejected
        } else if score >= self.review_at {
            Decision::InReview
        } else {
            Decision::Accepted
        }
    }
}

/// Decision cut point overrides, usually taken from the environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replacement for `score_to_decision.review_at`
    pub review_at: Option<i32>,
    /// Replacement for `score_to_decision.reject_at`
    pub reject_at: Option<i32>,
}

impl ConfigOverrides {
    /// Read `REVIEW_AT` / `REJECT_AT` from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary variable lookup.
    ///
    /// Values that do not parse as integers are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            review_at: parse_override(REVIEW_AT_ENV, lookup(REVIEW_AT_ENV)),
            reject_at: parse_override(REJECT_AT_ENV, lookup(REJECT_AT_ENV)),
        }
    }

    /// True when no override is set
    pub fn is_empty(&self) -> bool {
        self.review_at.is_none() && self.reject_at.is_none()
    }
}

fn parse_override(key: &str, raw: Option<String>) -> Option<i32> {
    let raw = raw?;
    match raw.trim().parse::<i32>() {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

/// Apply overrides on top of a base config
pub fn load_config(base: Config, overrides: ConfigOverrides) -> Config {
    let mut config = base;

    if let Some(review_at) = overrides.review_at {
        config.score_to_decision.review_at = review_at;
    }

    if let Some(reject_at) = overrides.reject_at {
        config.score_to_decision.reject_at = reject_at;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        let thresholds = &config.amount_thresholds;
        assert_eq!(thresholds.threshold_for("digital"), dec!(2500));
        assert_eq!(thresholds.threshold_for("physical"), dec!(6000));
        assert_eq!(thresholds.threshold_for("subscription"), dec!(1500));
        assert_eq!(thresholds.threshold_for("gift_card"), dec!(4000));

        assert_eq!(config.chargeback_hard_block, 2);
        assert_eq!(config.hard_block_ip_risk, "high");
        assert_eq!(config.score_weights.ip_risk["high"], 4);
        assert_eq!(config.score_weights.email_risk["new_domain"], 2);
        assert_eq!(config.score_weights.user_reputation["trusted"], -2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_decide_boundaries() {
        let cut = ScoreToDecision {
            review_at: 4,
            reject_at: 10,
        };

        assert_eq!(cut.decide(3), Decision::Accepted);
        assert_eq!(cut.decide(4), Decision::InReview);
        assert_eq!(cut.decide(9), Decision::InReview);
        assert_eq!(cut.decide(10), Decision::Rejected);
        assert_eq!(cut.decide(-5), Decision::Accepted);
    }

    #[test]
    fn test_decide_with_inverted_cut_points() {
        let cut = ScoreToDecision {
            review_at: 8,
            reject_at: 5,
        };

        assert_eq!(cut.decide(6), Decision::Rejected);
        assert_eq!(cut.decide(4), Decision::Accepted);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let overrides =
            ConfigOverrides::from_lookup(lookup_from(&[("REJECT_AT", "15"), ("REVIEW_AT", "8")]));

        assert_eq!(overrides.reject_at, Some(15));
        assert_eq!(overrides.review_at, Some(8));

        let config = load_config(Config::default(), overrides);
        assert_eq!(config.score_to_decision.reject_at, 15);
        assert_eq!(config.score_to_decision.review_at, 8);
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let overrides = ConfigOverrides::from_lookup(lookup_from(&[
            ("REJECT_AT", "lots"),
            ("REVIEW_AT", "7.5"),
        ]));
        assert!(overrides.is_empty());

        let config = load_config(Config::default(), overrides);
        assert_eq!(config.score_to_decision, ScoreToDecision::default());
    }

    #[test]
    fn test_partial_override() {
        let overrides = ConfigOverrides::from_lookup(lookup_from(&[("REVIEW_AT", " 6 ")]));
        let config = load_config(Config::default(), overrides);

        assert_eq!(config.score_to_decision.review_at, 6);
        assert_eq!(config.score_to_decision.reject_at, 10);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_src = r#"
            latency_ms_extreme = 1800
            chargeback_hard_block = 3

            [amount_thresholds]
            _default = 5000
            digital = 2000.5

            [score_weights]
            ip_risk = { medium = 3, high = 5 }
            email_risk = { high = 3 }
            device_fingerprint_risk = { high = 4 }
            user_reputation = { trusted = -3 }

            [score_to_decision]
            review_at = 5
            reject_at = 12
        "#;

        let config: Config = toml::from_str(toml_src).unwrap();

        assert_eq!(config.latency_ms_extreme, dec!(1800));
        assert_eq!(config.chargeback_hard_block, 3);
        assert_eq!(config.hard_block_ip_risk, "high");
        assert_eq!(config.amount_thresholds.threshold_for("digital"), dec!(2000.5));
        assert_eq!(config.amount_thresholds.threshold_for("physical"), dec!(5000));
        assert_eq!(config.score_weights.ip_risk["medium"], 3);
        assert_eq!(config.score_to_decision.reject_at, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_rejects_inverted_cut_points() {
        let mut config = Config::default();
        config.score_to_decision = ScoreToDecision {
            review_at: 11,
            reject_at: 10,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_from_file_rejects_oversized_weight() {
        let mut config = Config::default();
        config.score_weights.ip_risk.insert("high".to_string(), i32::MAX);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("ip_risk.high")));
    }

    #[test]
    fn test_negative_weight_within_bound_is_valid() {
        let mut config = Config::default();
        config.score_weights.user_reputation.insert("trusted".to_string(), -MAX_WEIGHT_MAGNITUDE);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_round_trips_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, toml::to_string(&Config::default()).unwrap()).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
    }
}
