//! CSV batch runner
//!
//! Reads a transaction table, assesses every row in file order, and writes
//! the table back out with `decision`, `risk_score` and `reasons` columns.

use crate::config::Config;
use crate::scoring::assess;
use crate::types::{Assessment, Decision, Transaction};
use crate::{Error, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

/// Output column holding the decision
pub const DECISION_COLUMN: &str = "decision";

/// Output column holding the risk score
pub const RISK_SCORE_COLUMN: &str = "risk_score";

/// Output column holding the joined reasons
pub const REASONS_COLUMN: &str = "reasons";

/// Raw input table
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    /// Header row
    pub headers: StringRecord,

    /// Data rows, in file order
    pub records: Vec<StringRecord>,
}

/// One input row with its assessment
#[derive(Debug, Clone)]
pub struct AssessedRow {
    /// Original cells
    pub record: StringRecord,

    /// Transaction parsed from the cells
    pub transaction: Transaction,

    /// Scoring outcome
    pub assessment: Assessment,
}

/// Result of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Input header row
    pub headers: StringRecord,

    /// Assessed rows, in input order
    pub rows: Vec<AssessedRow>,
}

impl BatchReport {
    /// Number of assessed rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the input had no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Count rows per decision
    pub fn summary(&self) -> DecisionSummary {
        let mut summary = DecisionSummary::default();
        for row in &self.rows {
            match row.assessment.decision {
                Decision::Accepted => summary.accepted += 1,
                Decision::InReview => summary.in_review += 1,
                Decision::Rejected => summary.rejected += 1,
            }
        }
        summary
    }

    /// Header row of the output table
    pub fn output_headers(&self) -> StringRecord {
        OutputLayout::new(&self.headers).headers
    }
}

/// Decision counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecisionSummary {
    /// Rows accepted
    pub accepted: usize,
    /// Rows sent to review
    pub in_review: usize,
    /// Rows rejected
    pub rejected: usize,
}

impl DecisionSummary {
    /// Rows counted
    pub fn total(&self) -> usize {
        self.accepted + self.in_review + self.rejected
    }
}

impl fmt::Display for DecisionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total: {} accepted, {} in review, {} rejected",
            self.total(),
            self.accepted,
            self.in_review,
            self.rejected
        )
    }
}

/// Where the three result columns land in the output.
///
/// Result columns already present in the input are overwritten in place,
/// the rest are appended.
struct OutputLayout {
    headers: StringRecord,
    input_width: usize,
    decision: usize,
    risk_score: usize,
    reasons: usize,
}

impl OutputLayout {
    fn new(input: &StringRecord) -> Self {
        let mut names: Vec<String> = input.iter().map(str::to_string).collect();
        let input_width = names.len();

        let mut column = |name: &str| match names.iter().position(|h| h == name) {
            Some(index) => index,
            None => {
                names.push(name.to_string());
                names.len() - 1
            }
        };

        let decision = column(DECISION_COLUMN);
        let risk_score = column(RISK_SCORE_COLUMN);
        let reasons = column(REASONS_COLUMN);

        Self {
            headers: StringRecord::from(names),
            input_width,
            decision,
            risk_score,
            reasons,
        }
    }

    fn row(&self, row: &AssessedRow) -> Vec<String> {
        let mut cells = vec![String::new(); self.headers.len()];
        for (cell, value) in cells.iter_mut().zip(row.record.iter().take(self.input_width)) {
            *cell = value.to_string();
        }

        cells[self.decision] = row.assessment.decision.to_string();
        cells[self.risk_score] = row.assessment.risk_score.to_string();
        cells[self.reasons] = row.assessment.reasons_joined();
        cells
    }
}

/// Read a CSV table with a header row.
///
/// Rows shorter than the header are accepted; their missing cells count as
/// blank.
pub fn read_transactions(path: impl AsRef<Path>) -> Result<InputTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::InputNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;

    let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }

    Ok(InputTable { headers, records })
}

/// Assess every row of `table`
pub fn assess_rows(table: InputTable, config: &Config) -> BatchReport {
    let InputTable { headers, records } = table;

    let rows = records
        .into_iter()
        .map(|record| {
            let transaction = Transaction::from_fields(headers.iter().zip(record.iter()));
            let assessment = assess(&transaction, config);
            AssessedRow {
                record,
                transaction,
                assessment,
            }
        })
        .collect();

    BatchReport { headers, rows }
}

/// Write the output table
pub fn write_decisions(report: &BatchReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| Error::OutputUnwritable {
        path: path.to_path_buf(),
        source,
    })?;

    let layout = OutputLayout::new(&report.headers);
    let mut writer = Writer::from_writer(file);
    writer.write_record(&layout.headers)?;

    for (index, row) in report.rows.iter().enumerate() {
        if row.record.len() > layout.input_width {
            warn!(
                "Row {} has {} cells for {} columns; extra cells dropped",
                index + 1,
                row.record.len(),
                layout.input_width
            );
        }
        writer.write_record(layout.row(row))?;
    }

    writer.flush()?;
    Ok(())
}

/// Read `input`, assess each row with `config`, write `output`
pub fn run(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &Config,
) -> Result<BatchReport> {
    let input = input.as_ref();
    let output = output.as_ref();

    let table = read_transactions(input)?;
    info!(
        "Loaded {} transactions from {}",
        table.records.len(),
        input.display()
    );

    let report = assess_rows(table, config);
    write_decisions(&report, output)?;

    info!(
        "Wrote decisions to {} ({})",
        output.display(),
        report.summary()
    );

    Ok(report)
}
