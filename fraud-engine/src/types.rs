//! Core types for fraud engine

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Product type assumed when a record carries none
pub const DEFAULT_PRODUCT_TYPE: &str = "_default";

/// Hour assumed when a record carries none (daytime)
pub const DEFAULT_HOUR: i64 = 12;

/// Separator used when reasons are flattened into one cell
pub const REASON_SEPARATOR: &str = ";";

/// Payment transaction as received from the batch input.
///
/// Every field is optional. Absent values are resolved to their defaults
/// exactly once, through [`Transaction::resolve`], before any rule runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    /// Amount in MXN (default 0)
    pub amount_mxn: Option<Decimal>,

    /// Product type, e.g. `digital`, `physical`, `subscription`
    pub product_type: Option<String>,

    /// Hour of day, 0-23 (default 12)
    pub hour: Option<i64>,

    /// Chargebacks on record for the customer (default 0)
    pub chargeback_count: Option<Decimal>,

    /// IP risk level: `low`, `medium`, `high`
    pub ip_risk: Option<String>,

    /// Email risk level: `low`, `medium`, `high`, `new_domain`
    pub email_risk: Option<String>,

    /// Device fingerprint risk level: `low`, `medium`, `high`
    pub device_fingerprint_risk: Option<String>,

    /// User reputation: `trusted`, `recurrent`, `new`, `high_risk`
    pub user_reputation: Option<String>,

    /// Customer transactions over the trailing 30 days (default 0)
    pub customer_txn_30d: Option<Decimal>,

    /// Processing latency in milliseconds (default 0)
    pub latency_ms: Option<Decimal>,

    /// Issuing country of the card BIN
    pub bin_country: Option<String>,

    /// Country the request IP geolocates to
    pub ip_country: Option<String>,
}

impl Transaction {
    /// Build a transaction from `(column, value)` pairs of a tabular row.
    ///
    /// Unknown columns are skipped. Blank or unparseable cells leave the
    /// field absent, so a bad cell degrades to the field default instead of
    /// failing the row.
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut txn = Transaction::default();

        for (name, raw) in fields {
            let value = raw.trim();
            if value.is_empty() {
                continue;
            }

            match name.trim() {
                "amount_mxn" => txn.amount_mxn = parse_decimal(value),
                "product_type" => txn.product_type = Some(value.to_string()),
                "hour" => txn.hour = parse_hour(value),
                "chargeback_count" => txn.chargeback_count = parse_decimal(value),
                "ip_risk" => txn.ip_risk = Some(value.to_string()),
                "email_risk" => txn.email_risk = Some(value.to_string()),
                "device_fingerprint_risk" => txn.device_fingerprint_risk = Some(value.to_string()),
                "user_reputation" => txn.user_reputation = Some(value.to_string()),
                "customer_txn_30d" => txn.customer_txn_30d = parse_decimal(value),
                "latency_ms" => txn.latency_ms = parse_decimal(value),
                "bin_country" => txn.bin_country = Some(value.to_string()),
                "ip_country" => txn.ip_country = Some(value.to_string()),
                _ => {}
            }
        }

        txn
    }

    /// Resolve every absent field to its default
    pub fn resolve(&self) -> ResolvedTransaction<'_> {
        ResolvedTransaction {
            amount_mxn: self.amount_mxn.unwrap_or(Decimal::ZERO),
            product_type: non_empty(&self.product_type).unwrap_or(DEFAULT_PRODUCT_TYPE),
            hour: self.hour.unwrap_or(DEFAULT_HOUR),
            chargeback_count: self.chargeback_count.unwrap_or(Decimal::ZERO),
            ip_risk: non_empty(&self.ip_risk),
            email_risk: non_empty(&self.email_risk),
            device_fingerprint_risk: non_empty(&self.device_fingerprint_risk),
            user_reputation: non_empty(&self.user_reputation),
            customer_txn_30d: self.customer_txn_30d.unwrap_or(Decimal::ZERO),
            latency_ms: self.latency_ms.unwrap_or(Decimal::ZERO),
            bin_country: non_empty(&self.bin_country),
            ip_country: non_empty(&self.ip_country),
        }
    }
}

/// Transaction with defaults applied, borrowed from a [`Transaction`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTransaction<'a> {
    /// Amount in MXN
    pub amount_mxn: Decimal,
    /// Product type, `_default` when absent
    pub product_type: &'a str,
    /// Hour of day
    pub hour: i64,
    /// Chargebacks on record
    pub chargeback_count: Decimal,
    /// IP risk level
    pub ip_risk: Option<&'a str>,
    /// Email risk level
    pub email_risk: Option<&'a str>,
    /// Device fingerprint risk level
    pub device_fingerprint_risk: Option<&'a str>,
    /// User reputation
    pub user_reputation: Option<&'a str>,
    /// Customer transactions over the trailing 30 days
    pub customer_txn_30d: Decimal,
    /// Processing latency in milliseconds
    pub latency_ms: Decimal,
    /// Card BIN country
    pub bin_country: Option<&'a str>,
    /// IP country
    pub ip_country: Option<&'a str>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

// Accepts "23" as well as "23.0", which is how integer columns with gaps
// come out of most spreadsheet exports. Fractional hours stay absent.
fn parse_hour(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().or_else(|| {
        parse_decimal(value)
            .filter(|d| d.fract().is_zero())
            .and_then(|d| d.to_i64())
    })
}

/// Final decision for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Let the payment through
    Accepted,
    /// Hold for manual review
    InReview,
    /// Block the payment
    Rejected,
}

impl Decision {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "ACCEPTED",
            Decision::InReview => "IN_REVIEW",
            Decision::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome of assessing one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// Accumulated risk score
    pub risk_score: i32,

    /// Decision derived from the score
    pub decision: Decision,

    /// Fired rules, in evaluation order
    pub reasons: Vec<String>,
}

impl Assessment {
    /// Reasons flattened into a single `;`-separated string
    pub fn reasons_joined(&self) -> String {
        self.reasons.join(REASON_SEPARATOR)
    }
}
