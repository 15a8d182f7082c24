// src/pipeline/quality.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::schema::Column;
use crate::transform::{Outcome, QualityFlag, RejectReason};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCounts {
    pub nulls: u64,
    pub invalid: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub seen: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Counters for one ingestion run.
///
/// Only sums are kept, so reports built over any partition of the rows and
/// merged in any order agree with a single sequential pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityReport {
    pub rows_seen: u64,
    pub rows_accepted: u64,
    pub rows_rejected: u64,
    pub rejections: BTreeMap<RejectReason, u64>,
    pub sources: BTreeMap<String, SourceCounts>,
    pub columns: BTreeMap<Column, ColumnCounts>,
    pub flags: BTreeMap<QualityFlag, u64>,
}

impl QualityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source: &str, outcome: &Outcome) {
        self.rows_seen += 1;
        let src = self.sources.entry(source.to_string()).or_default();
        src.seen += 1;
        match outcome {
            Outcome::Accepted(a) => {
                self.rows_accepted += 1;
                src.accepted += 1;
                for column in Column::ALL {
                    if a.loan.is_null(column) {
                        self.columns.entry(column).or_default().nulls += 1;
                    }
                }
                for column in &a.invalid {
                    self.columns.entry(*column).or_default().invalid += 1;
                }
                for flag in &a.flags {
                    *self.flags.entry(*flag).or_default() += 1;
                }
            }
            Outcome::Rejected(reason) => self.record_rejection(source, *reason, false),
        }
    }

    /// Count a rejected row. `new_row` is false when [`record`](Self::record)
    /// already counted the row as seen.
    pub fn record_rejection(&mut self, source: &str, reason: RejectReason, new_row: bool) {
        let src = self.sources.entry(source.to_string()).or_default();
        if new_row {
            self.rows_seen += 1;
            src.seen += 1;
        }
        src.rejected += 1;
        self.rows_rejected += 1;
        *self.rejections.entry(reason).or_default() += 1;
    }

    pub fn merge(mut self, other: QualityReport) -> QualityReport {
        self.rows_seen += other.rows_seen;
        self.rows_accepted += other.rows_accepted;
        self.rows_rejected += other.rows_rejected;
        for (k, v) in other.rejections {
            *self.rejections.entry(k).or_default() += v;
        }
        for (k, v) in other.sources {
            let s = self.sources.entry(k).or_default();
            s.seen += v.seen;
            s.accepted += v.accepted;
            s.rejected += v.rejected;
        }
        for (k, v) in other.columns {
            let c = self.columns.entry(k).or_default();
            c.nulls += v.nulls;
            c.invalid += v.invalid;
        }
        for (k, v) in other.flags {
            *self.flags.entry(k).or_default() += v;
        }
        self
    }

    pub fn column(&self, column: Column) -> ColumnCounts {
        self.columns.get(&column).copied().unwrap_or_default()
    }

    pub fn flag(&self, flag: QualityFlag) -> u64 {
        self.flags.get(&flag).copied().unwrap_or(0)
    }

    /// Percentages are relative to accepted rows.
    pub fn summary(&self) -> QualitySummary {
        let pct = |n: u64| {
            if self.rows_accepted == 0 {
                0.0
            } else {
                (n as f64 * 10_000.0 / self.rows_accepted as f64).round() / 100.0
            }
        };
        QualitySummary {
            rows_seen: self.rows_seen,
            rows_accepted: self.rows_accepted,
            rows_rejected: self.rows_rejected,
            rejections: self.rejections.clone(),
            sources: self.sources.clone(),
            columns: Column::ALL
                .iter()
                .map(|c| {
                    let counts = self.column(*c);
                    ColumnSummary {
                        column: *c,
                        nulls: counts.nulls,
                        null_pct: pct(counts.nulls),
                        invalid: counts.invalid,
                        invalid_pct: pct(counts.invalid),
                    }
                })
                .collect(),
            flags: self.flags.clone(),
        }
    }

    pub fn log_summary(&self) {
        info!(
            seen = self.rows_seen,
            accepted = self.rows_accepted,
            rejected = self.rows_rejected,
            "ingestion totals"
        );
        for (reason, n) in &self.rejections {
            warn!(%reason, count = n, "rows rejected");
        }
        for (flag, n) in &self.flags {
            info!(flag = ?flag, count = n, "quality flag");
        }
        for (column, counts) in &self.columns {
            if counts.invalid > 0 {
                warn!(
                    column = column.name(),
                    invalid = counts.invalid,
                    nulls = counts.nulls,
                    "unreadable values"
                );
            }
        }
    }
}

/// Serializable form of a finished [`QualityReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub rows_seen: u64,
    pub rows_accepted: u64,
    pub rows_rejected: u64,
    pub rejections: BTreeMap<RejectReason, u64>,
    pub sources: BTreeMap<String, SourceCounts>,
    pub columns: Vec<ColumnSummary>,
    pub flags: BTreeMap<QualityFlag, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: Column,
    pub nulls: u64,
    pub null_pct: f64,
    pub invalid: u64,
    pub invalid_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LoanRecord;
    use crate::transform::Accepted;

    fn accepted(invalid: Vec<Column>, flags: Vec<QualityFlag>) -> Outcome {
        Outcome::Accepted(Accepted {
            loan: LoanRecord {
                lender_location_id: "x".into(),
                business_name: Some("n".into()),
                ..Default::default()
            },
            invalid,
            flags,
        })
    }

    #[test]
    fn counts_accepted_and_rejected() {
        let mut r = QualityReport::new();
        r.record("a", &accepted(vec![Column::ApprovalDate], vec![QualityFlag::SbaExceedsGross]));
        r.record("a", &Outcome::Rejected(RejectReason::MissingIdentifier));
        r.record_rejection("b", RejectReason::MalformedRow, true);

        assert_eq!((r.rows_seen, r.rows_accepted, r.rows_rejected), (3, 1, 2));
        assert_eq!(r.rejections[&RejectReason::MissingIdentifier], 1);
        assert_eq!(r.rejections[&RejectReason::MalformedRow], 1);
        assert_eq!(r.sources["a"], SourceCounts { seen: 2, accepted: 1, rejected: 1 });
        assert_eq!(r.sources["b"], SourceCounts { seen: 1, accepted: 0, rejected: 1 });
        assert_eq!(r.column(Column::ApprovalDate), ColumnCounts { nulls: 1, invalid: 1 });
        assert_eq!(r.column(Column::BusinessName).nulls, 0);
        assert_eq!(r.flag(QualityFlag::SbaExceedsGross), 1);
    }

    #[test]
    fn merge_matches_sequential_counting() {
        let outcomes = vec![
            ("a", accepted(vec![], vec![])),
            ("a", Outcome::Rejected(RejectReason::MissingIdentifier)),
            ("b", accepted(vec![Column::TermMonths], vec![QualityFlag::FiscalYearMismatch])),
            ("b", accepted(vec![], vec![QualityFlag::FiscalYearMismatch])),
        ];

        let mut sequential = QualityReport::new();
        for (s, o) in &outcomes {
            sequential.record(s, o);
        }

        let mut left = QualityReport::new();
        let mut right = QualityReport::new();
        for (i, (s, o)) in outcomes.iter().enumerate() {
            if i % 2 == 0 {
                left.record(s, o);
            } else {
                right.record(s, o);
            }
        }
        assert_eq!(left.clone().merge(right.clone()), sequential);
        assert_eq!(right.merge(left), sequential);
    }

    #[test]
    fn summary_percentages() {
        let mut r = QualityReport::new();
        r.record("a", &accepted(vec![Column::ApprovalDate], vec![]));
        r.record("a", &accepted(vec![], vec![]));
        r.record("a", &accepted(vec![], vec![]));
        let s = r.summary();
        assert_eq!(s.columns.len(), Column::ALL.len());
        let date = s.columns.iter().find(|c| c.column == Column::ApprovalDate).unwrap();
        assert_eq!(date.nulls, 3);
        assert_eq!(date.null_pct, 100.0);
        assert_eq!(date.invalid, 1);
        assert_eq!(date.invalid_pct, 33.33);
    }

    #[test]
    fn summary_of_empty_report() {
        let s = QualityReport::new().summary();
        assert!(s.columns.iter().all(|c| c.null_pct == 0.0));
    }
}
