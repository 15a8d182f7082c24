// src/transform/checks.rs

use chrono::Datelike;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::schema::LoanRecord;

/// A data-quality observation on an accepted record. Flags are counted,
/// never used to reject or rewrite the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    DisbursementBeforeApproval,
    ChargeoffBeforeDisbursement,
    FiscalYearMismatch,
    SbaExceedsGross,
    UnknownStateCode,
    /// `EXEMPT` status mapped to paid in full.
    ExemptTreatedAsPaid,
    /// Jobs created/retained estimated as halves of a combined figure.
    JobsSplitFromSupported,
    /// No disbursement amount in the source; gross approval copied over.
    DisbursementGrossMirrored,
}

/// USPS state and territory codes.
static STATE_CODES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
        "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
        "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
        "VT", "VA", "WA", "WV", "WI", "WY", "AS", "GU", "MP", "PR", "VI", "UM", "FM", "MH", "PW",
        "AA", "AE", "AP",
    ]
    .into_iter()
    .collect()
});

pub fn is_known_state(code: &str) -> bool {
    STATE_CODES.contains(code)
}

/// Cross-field consistency checks on a normalized record.
pub fn cross_field_flags(loan: &LoanRecord) -> Vec<QualityFlag> {
    let mut flags = Vec::new();

    if let (Some(approved), Some(disbursed)) = (loan.approval_date, loan.disbursement_date) {
        if disbursed < approved {
            flags.push(QualityFlag::DisbursementBeforeApproval);
        }
    }
    if let (Some(disbursed), Some(charged)) = (loan.disbursement_date, loan.chargeoff_date) {
        if charged < disbursed {
            flags.push(QualityFlag::ChargeoffBeforeDisbursement);
        }
    }
    if let (Some(fy), Some(approved)) = (loan.approval_fiscal_year, loan.approval_date) {
        let year = approved.year();
        if fy != year && fy != year + 1 {
            flags.push(QualityFlag::FiscalYearMismatch);
        }
    }
    if let (Some(sba), Some(gross)) = (loan.sba_approved, loan.gross_approved) {
        if sba > gross {
            flags.push(QualityFlag::SbaExceedsGross);
        }
    }
    let unknown_state = [&loan.state, &loan.bank_state]
        .into_iter()
        .flatten()
        .any(|code| !is_known_state(code));
    if unknown_state {
        flags.push(QualityFlag::UnknownStateCode);
    }

    flags
}
