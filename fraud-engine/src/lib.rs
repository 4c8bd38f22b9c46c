//! Fraud Engine for DelTran
//!
//! Deterministic, rule-based fraud scoring for card payments, plus the CSV
//! batch runner that feeds it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod types;
pub mod config;
pub mod scoring;
pub mod batch;

pub use error::{Error, Result};
pub use types::*;
pub use config::{load_config, Config, ConfigOverrides};
pub use scoring::{assess, RiskAssessor};
pub use batch::{run, BatchReport, DecisionSummary};
