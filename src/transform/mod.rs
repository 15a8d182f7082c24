// src/transform/mod.rs
//! Turns one raw row into a normalized [`LoanRecord`] or a rejection.

pub mod checks;
pub mod rules;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{GenerationMapping, NormalizeSettings};
use crate::normalize::{
    classify, clean_str, parse_bounded_integer, parse_currency, parse_date, parse_integer,
    parse_naics, parse_positive_integer, parse_state_code, parse_text, Parsed,
};
use crate::schema::{BusinessType, Column, LoanField, LoanRecord, LoanStatus, RawRecord};

pub use checks::QualityFlag;

/// Why a row was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingIdentifier,
    MalformedRow,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingIdentifier => f.write_str("missing required identifier"),
            RejectReason::MalformedRow => f.write_str("malformed source row"),
        }
    }
}

/// An accepted row together with what went wrong while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub loan: LoanRecord,
    /// Columns whose raw text was present but unreadable.
    pub invalid: Vec<Column>,
    pub flags: Vec<QualityFlag>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted(Accepted),
    Rejected(RejectReason),
}

impl Outcome {
    pub fn accepted(self) -> Option<Accepted> {
        match self {
            Outcome::Accepted(a) => Some(a),
            Outcome::Rejected(_) => None,
        }
    }
}

/// Applies one generation's column mapping and the field normalizers.
pub struct RecordTransformer<'a> {
    columns: HashMap<LoanField, &'a str>,
    split_jobs: bool,
    settings: &'a NormalizeSettings,
}

/// Collects invalid columns while unwrapping parse results.
#[derive(Default)]
struct Tally {
    invalid: Vec<Column>,
}

impl Tally {
    fn take<T>(&mut self, column: Column, parsed: Parsed<T>) -> Option<T> {
        if parsed.is_invalid() {
            self.invalid.push(column);
        }
        parsed.value()
    }
}

impl<'a> RecordTransformer<'a> {
    pub fn new(mapping: &'a GenerationMapping, settings: &'a NormalizeSettings) -> Self {
        Self {
            columns: mapping.by_field(),
            split_jobs: mapping.maps(LoanField::JobsCreated) || mapping.maps(LoanField::JobsRetained),
            settings,
        }
    }

    /// Raw text for `field`, or `""` when the generation has no such column
    /// or the row lacks it.
    fn raw<'r>(&self, rec: &'r RawRecord, field: LoanField) -> &'r str {
        self.columns
            .get(&field)
            .and_then(|name| rec.get(name))
            .unwrap_or("")
    }

    pub fn transform(&self, rec: &RawRecord) -> Outcome {
        let s = self.settings;
        let lender_location_id =
            match parse_text(self.raw(rec, LoanField::LenderLocationId), s.name_max_len) {
                Parsed::Value(id) => id,
                _ => return Outcome::Rejected(RejectReason::MissingIdentifier),
            };

        let mut t = Tally::default();
        let mut flags = Vec::new();

        let borrower_state = parse_state_code(self.raw(rec, LoanField::BorrowerState));
        let project_state = parse_state_code(self.raw(rec, LoanField::ProjectState));
        let state_invalid = borrower_state.is_invalid() || project_state.is_invalid();
        let state = borrower_state.value().or(project_state.value());
        if state_invalid {
            t.invalid.push(Column::State);
        }

        let status_raw = self.raw(rec, LoanField::LoanStatus);
        let loan_status = t
            .take(Column::LoanStatus, classify(status_raw, rules::LOAN_STATUS_RULES))
            .unwrap_or(LoanStatus::Unknown);
        let exempt = clean_str(status_raw).is_some_and(|v| v.eq_ignore_ascii_case(rules::EXEMPT));
        if exempt {
            flags.push(QualityFlag::ExemptTreatedAsPaid);
        }

        let (jobs_created, jobs_retained) = self.jobs(rec, &mut t, &mut flags);

        let gross_approved = t.take(
            Column::GrossApproved,
            parse_currency(self.raw(rec, LoanField::GrossApproved)),
        );
        let disbursement_gross = match t.take(
            Column::DisbursementGross,
            parse_currency(self.raw(rec, LoanField::DisbursementGross)),
        ) {
            Some(amount) => Some(amount),
            None => {
                if gross_approved.is_some() {
                    flags.push(QualityFlag::DisbursementGrossMirrored);
                }
                gross_approved
            }
        };

        let fy_raw = self.raw(rec, LoanField::ApprovalFiscalYear);
        let loan = LoanRecord {
            lender_location_id,
            business_name: t.take(
                Column::BusinessName,
                parse_text(self.raw(rec, LoanField::BusinessName), s.name_max_len),
            ),
            city: t.take(
                Column::City,
                parse_text(self.raw(rec, LoanField::City), s.city_max_len),
            ),
            state,
            bank_name: t.take(
                Column::BankName,
                parse_text(self.raw(rec, LoanField::BankName), s.name_max_len),
            ),
            bank_state: t.take(
                Column::BankState,
                parse_state_code(self.raw(rec, LoanField::BankState)),
            ),
            naics: t.take(Column::Naics, parse_naics(self.raw(rec, LoanField::Naics))),
            approval_date: t.take(
                Column::ApprovalDate,
                parse_date(self.raw(rec, LoanField::ApprovalDate)),
            ),
            approval_fiscal_year: t.take(
                Column::ApprovalFiscalYear,
                parse_integer(fy_raw).and_then(fy_raw, |v| i32::try_from(v).ok()),
            ),
            disbursement_date: t.take(
                Column::DisbursementDate,
                parse_date(self.raw(rec, LoanField::DisbursementDate)),
            ),
            chargeoff_date: t.take(
                Column::ChargeoffDate,
                parse_date(self.raw(rec, LoanField::ChargeoffDate)),
            ),
            term_months: t.take(
                Column::TermMonths,
                parse_positive_integer(self.raw(rec, LoanField::TermMonths)),
            ),
            num_employees: t.take(
                Column::NumEmployees,
                parse_bounded_integer(self.raw(rec, LoanField::NumEmployees), s.employee_ceiling),
            ),
            business_type: t
                .take(
                    Column::BusinessType,
                    classify(self.raw(rec, LoanField::BusinessAge), rules::BUSINESS_TYPE_RULES),
                )
                .unwrap_or(BusinessType::Unknown),
            jobs_created,
            jobs_retained,
            gross_approved,
            sba_approved: t.take(
                Column::SbaApproved,
                parse_currency(self.raw(rec, LoanField::SbaApproved)),
            ),
            disbursement_gross,
            chargeoff_amount: t.take(
                Column::ChargeoffAmount,
                parse_currency(self.raw(rec, LoanField::ChargeoffAmount)),
            ),
            loan_status,
            revolving_line: t
                .take(
                    Column::RevolvingLine,
                    classify(self.raw(rec, LoanField::RevolvingLine), rules::FLAG_RULES),
                )
                .unwrap_or(false),
            low_doc: t
                .take(
                    Column::LowDoc,
                    classify(self.raw(rec, LoanField::LowDoc), rules::FLAG_RULES),
                )
                .unwrap_or(false),
        };

        flags.extend(checks::cross_field_flags(&loan));
        Outcome::Accepted(Accepted {
            loan,
            invalid: t.invalid,
            flags,
        })
    }

    /// Jobs created/retained. Generations that report them separately are
    /// read as-is; otherwise each is half the combined figure, rounded down,
    /// and both fall back to 0.
    fn jobs(&self, rec: &RawRecord, t: &mut Tally, flags: &mut Vec<QualityFlag>) -> (u32, u32) {
        let to_u32 = |v: i64| u32::try_from(v).unwrap_or(u32::MAX);
        if self.split_jobs {
            let created = t.take(
                Column::JobsCreated,
                parse_integer(self.raw(rec, LoanField::JobsCreated)),
            );
            let retained = t.take(
                Column::JobsRetained,
                parse_integer(self.raw(rec, LoanField::JobsRetained)),
            );
            return (created.map_or(0, to_u32), retained.map_or(0, to_u32));
        }

        match parse_integer(self.raw(rec, LoanField::JobsSupported)) {
            Parsed::Value(total) => {
                flags.push(QualityFlag::JobsSplitFromSupported);
                let half = to_u32(total / 2);
                (half, half)
            }
            Parsed::Missing => (0, 0),
            Parsed::Invalid(_) => {
                t.invalid.push(Column::JobsCreated);
                t.invalid.push(Column::JobsRetained);
                (0, 0)
            }
        }
    }
}
