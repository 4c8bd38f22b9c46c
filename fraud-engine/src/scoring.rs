//! Risk scoring engine
//!
//! Rules run in a fixed order over a resolved transaction and accumulate a
//! signed integer score plus one reason token per fired rule. The only
//! early exit is the hard block.

use crate::config::{AmountThresholds, Config, WeightTable};
use crate::types::{Assessment, Decision, ResolvedTransaction, Transaction};
use rust_decimal::Decimal;
use tracing::debug;

/// Score forced by the hard block
pub const HARD_BLOCK_SCORE: i32 = 100;

const NIGHT_HOUR_WEIGHT: i32 = 1;
const GEO_MISMATCH_WEIGHT: i32 = 2;
const HIGH_AMOUNT_WEIGHT: i32 = 2;
const NEW_USER_HIGH_AMOUNT_WEIGHT: i32 = 2;
const LATENCY_EXTREME_WEIGHT: i32 = 2;
const FREQUENCY_BUFFER_WEIGHT: i32 = -1;

/// Trailing-30-day transactions needed for the frequency buffer
const FREQUENCY_BUFFER_MIN_TXN: u32 = 3;

/// Night window: 22:00 through 05:59
pub fn is_night(hour: i64) -> bool {
    hour >= 22 || hour <= 5
}

/// True when `amount` reaches the threshold for `product_type`
pub fn high_amount(amount: Decimal, product_type: &str, thresholds: &AmountThresholds) -> bool {
    amount >= thresholds.threshold_for(product_type)
}

/// Running score and fired rules
#[derive(Debug, Default)]
struct ScoreCard {
    score: i32,
    reasons: Vec<String>,
}

impl ScoreCard {
    // Saturates so an oversized configured weight cannot overflow
    fn add(&mut self, delta: i32, reason: String) {
        self.score = self.score.saturating_add(delta);
        self.reasons.push(reason);
    }

    /// Look `level` up in `table`; non-zero weights are applied
    fn weigh(&mut self, field: &str, level: Option<&str>, table: &WeightTable) {
        let Some(level) = level else {
            return;
        };

        match table.get(level) {
            Some(&weight) if weight != 0 => {
                self.add(weight, format!("{}:{}({:+})", field, level, weight));
            }
            _ => {}
        }
    }
}

/// Assess a transaction against `config`.
///
/// Never fails: absent fields take their defaults and unknown categorical
/// levels contribute nothing.
pub fn assess(txn: &Transaction, config: &Config) -> Assessment {
    let txn = txn.resolve();

    if let Some(assessment) = hard_block(&txn, config) {
        return assessment;
    }

    let weights = &config.score_weights;
    let mut card = ScoreCard::default();

    if is_night(txn.hour) {
        card.add(
            NIGHT_HOUR_WEIGHT,
            format!("night_hour:{}({:+})", txn.hour, NIGHT_HOUR_WEIGHT),
        );
    }

    if let (Some(bin), Some(ip)) = (txn.bin_country, txn.ip_country) {
        if bin != ip {
            card.add(
                GEO_MISMATCH_WEIGHT,
                format!("geo_mismatch:{}!={}({:+})", bin, ip, GEO_MISMATCH_WEIGHT),
            );
        }
    }

    let is_high_amount = high_amount(txn.amount_mxn, txn.product_type, &config.amount_thresholds);
    if is_high_amount {
        card.add(
            HIGH_AMOUNT_WEIGHT,
            format!(
                "high_amount:{}:{}({:+})",
                txn.product_type,
                format_amount(txn.amount_mxn),
                HIGH_AMOUNT_WEIGHT
            ),
        );
    }

    card.weigh("ip_risk", txn.ip_risk, &weights.ip_risk);
    card.weigh("email_risk", txn.email_risk, &weights.email_risk);
    card.weigh(
        "device_fingerprint_risk",
        txn.device_fingerprint_risk,
        &weights.device_fingerprint_risk,
    );
    card.weigh("user_reputation", txn.user_reputation, &weights.user_reputation);

    if txn.user_reputation == Some("new") && is_high_amount {
        card.add(
            NEW_USER_HIGH_AMOUNT_WEIGHT,
            format!("new_user_high_amount({:+})", NEW_USER_HIGH_AMOUNT_WEIGHT),
        );
    }

    if txn.latency_ms >= config.latency_ms_extreme {
        card.add(
            LATENCY_EXTREME_WEIGHT,
            format!(
                "latency_extreme:{}ms({:+})",
                txn.latency_ms.normalize(),
                LATENCY_EXTREME_WEIGHT
            ),
        );
    }

    let established = matches!(txn.user_reputation, Some("trusted") | Some("recurrent"));
    if card.score > 0
        && established
        && txn.customer_txn_30d >= Decimal::from(FREQUENCY_BUFFER_MIN_TXN)
    {
        card.add(
            FREQUENCY_BUFFER_WEIGHT,
            format!("frequency_buffer({:+})", FREQUENCY_BUFFER_WEIGHT),
        );
    }

    let decision = config.score_to_decision.decide(card.score);
    debug!(
        "Risk score {} (decision: {}) from {} rule(s)",
        card.score,
        decision,
        card.reasons.len()
    );

    Assessment {
        risk_score: card.score,
        decision,
        reasons: card.reasons,
    }
}

fn hard_block(txn: &ResolvedTransaction<'_>, config: &Config) -> Option<Assessment> {
    let blocked = txn.chargeback_count >= Decimal::from(config.chargeback_hard_block)
        && txn.ip_risk == Some(config.hard_block_ip_risk.as_str());
    if !blocked {
        return None;
    }

    debug!(
        "Hard block: {} chargebacks with ip_risk={}",
        txn.chargeback_count, config.hard_block_ip_risk
    );

    Some(Assessment {
        risk_score: HARD_BLOCK_SCORE,
        decision: Decision::Rejected,
        reasons: vec![format!(
            "hard_block:chargebacks>={}+ip_{}",
            config.chargeback_hard_block, config.hard_block_ip_risk
        )],
    })
}

/// Render an amount the way a float prints: `3000` -> `3000.0`
fn format_amount(amount: Decimal) -> String {
    let rendered = amount.normalize().to_string();
    if rendered.contains('.') {
        rendered
    } else {
        format!("{}.0", rendered)
    }
}

/// Risk assessor bound to one configuration
#[derive(Debug, Clone, Default)]
pub struct RiskAssessor {
    config: Config,
}

impl RiskAssessor {
    /// Create new assessor
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Assess one transaction
    pub fn assess(&self, txn: &Transaction) -> Assessment {
        assess(txn, &self.config)
    }
}
