// src/metrics/mod.rs
//! Read-only attributes computed from a [`LoanRecord`].
//!
//! Every function here is a pure function of the record's fields; the
//! `loan_metrics` table is just these evaluated for each canonical loan.

pub mod batch;

use chrono::Datelike;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::schema::{LoanRecord, LoanStatus};

pub use batch::{metrics_schema, metrics_to_batch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanSizeBucket {
    Micro,
    Small,
    Medium,
    Large,
    Jumbo,
    Unknown,
}

impl LoanSizeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanSizeBucket::Micro => "Micro",
            LoanSizeBucket::Small => "Small",
            LoanSizeBucket::Medium => "Medium",
            LoanSizeBucket::Large => "Large",
            LoanSizeBucket::Jumbo => "Jumbo",
            LoanSizeBucket::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermCategory {
    Short,
    Medium,
    Long,
    Extended,
    Unknown,
}

impl TermCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermCategory::Short => "Short",
            TermCategory::Medium => "Medium",
            TermCategory::Long => "Long",
            TermCategory::Extended => "Extended",
            TermCategory::Unknown => "Unknown",
        }
    }
}

/// Calendar decomposition of the approval date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vintage {
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
}

fn round2(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    part.checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|p| p.checked_div(whole))
        .map(round2)
}

/// Each bucket includes its lower bound and excludes its upper bound.
pub fn categorize_loan_size(amount: Option<Decimal>) -> LoanSizeBucket {
    let Some(amount) = amount else {
        return LoanSizeBucket::Unknown;
    };
    if amount < Decimal::from(50_000) {
        LoanSizeBucket::Micro
    } else if amount < Decimal::from(150_000) {
        LoanSizeBucket::Small
    } else if amount < Decimal::from(350_000) {
        LoanSizeBucket::Medium
    } else if amount < Decimal::from(1_000_000) {
        LoanSizeBucket::Large
    } else {
        LoanSizeBucket::Jumbo
    }
}

pub fn categorize_term(term_months: Option<u32>) -> TermCategory {
    match term_months {
        None => TermCategory::Unknown,
        Some(t) if t <= 12 => TermCategory::Short,
        Some(t) if t <= 60 => TermCategory::Medium,
        Some(t) if t <= 120 => TermCategory::Long,
        Some(_) => TermCategory::Extended,
    }
}

/// Guaranteed share of the gross approval, in percent.
pub fn guarantee_pct(loan: &LoanRecord) -> Option<Decimal> {
    let gross = loan.gross_approved.filter(|g| !g.is_zero())?;
    percent_of(loan.sba_approved?, gross)
}

pub fn is_defaulted(loan: &LoanRecord) -> bool {
    loan.loan_status == LoanStatus::ChargedOff
}

pub fn is_paid_in_full(loan: &LoanRecord) -> bool {
    loan.loan_status == LoanStatus::PaidInFull
}

/// Charged-off share of the gross approval, in percent; 0 unless the loan
/// defaulted with a positive gross approval.
pub fn loss_severity_pct(loan: &LoanRecord) -> Decimal {
    if !is_defaulted(loan) {
        return Decimal::ZERO;
    }
    match loan.gross_approved {
        Some(gross) if gross > Decimal::ZERO => {
            let charged = loan.chargeoff_amount.unwrap_or(Decimal::ZERO);
            percent_of(charged, gross).unwrap_or(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    }
}

pub fn vintage(loan: &LoanRecord) -> Option<Vintage> {
    loan.approval_date.map(|d| Vintage {
        year: d.year(),
        quarter: (d.month() - 1) / 3 + 1,
        month: d.month(),
    })
}

pub fn naics_sector(loan: &LoanRecord) -> Option<&str> {
    loan.naics.as_deref().and_then(|n| n.get(..2))
}

/// Whole months from approval to charge-off, for defaulted loans carrying
/// both dates. Negative when the dates are out of order.
pub fn months_to_chargeoff(loan: &LoanRecord) -> Option<i32> {
    if !is_defaulted(loan) {
        return None;
    }
    let (start, end) = (loan.approval_date?, loan.chargeoff_date?);
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if months > 0 && end.day() < start.day() {
        months -= 1;
    } else if months < 0 && end.day() > start.day() {
        months += 1;
    }
    Some(months)
}

/// All derived attributes of one loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub guarantee_pct: Option<Decimal>,
    pub loan_size_bucket: LoanSizeBucket,
    pub term_category: TermCategory,
    pub is_defaulted: bool,
    pub is_paid_in_full: bool,
    pub loss_severity_pct: Decimal,
    pub vintage: Option<Vintage>,
    pub naics_sector: Option<String>,
    pub months_to_chargeoff: Option<i32>,
}

pub fn derive(loan: &LoanRecord) -> DerivedMetrics {
    DerivedMetrics {
        guarantee_pct: guarantee_pct(loan),
        loan_size_bucket: categorize_loan_size(loan.gross_approved),
        term_category: categorize_term(loan.term_months),
        is_defaulted: is_defaulted(loan),
        is_paid_in_full: is_paid_in_full(loan),
        loss_severity_pct: loss_severity_pct(loan),
        vintage: vintage(loan),
        naics_sector: naics_sector(loan).map(str::to_string),
        months_to_chargeoff: months_to_chargeoff(loan),
    }
}
