// src/schema/types.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Logical input fields a raw column can be mapped to.
///
/// Each generation of the source data names these differently; the mapping
/// from raw header to `LoanField` lives in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanField {
    LenderLocationId,
    BusinessName,
    City,
    BorrowerState,
    ProjectState,
    BankName,
    BankState,
    Naics,
    ApprovalDate,
    ApprovalFiscalYear,
    DisbursementDate,
    ChargeoffDate,
    TermMonths,
    NumEmployees,
    BusinessAge,
    JobsSupported,
    JobsCreated,
    JobsRetained,
    GrossApproved,
    SbaApproved,
    DisbursementGross,
    ChargeoffAmount,
    LoanStatus,
    RevolvingLine,
    LowDoc,
}

/// Columns of the canonical table, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    LenderLocationId,
    BusinessName,
    City,
    State,
    BankName,
    BankState,
    Naics,
    ApprovalDate,
    ApprovalFiscalYear,
    DisbursementDate,
    ChargeoffDate,
    TermMonths,
    NumEmployees,
    BusinessType,
    JobsCreated,
    JobsRetained,
    GrossApproved,
    SbaApproved,
    DisbursementGross,
    ChargeoffAmount,
    LoanStatus,
    RevolvingLine,
    LowDoc,
}

impl Column {
    pub const ALL: [Column; 24] = [
        Column::Id,
        Column::LenderLocationId,
        Column::BusinessName,
        Column::City,
        Column::State,
        Column::BankName,
        Column::BankState,
        Column::Naics,
        Column::ApprovalDate,
        Column::ApprovalFiscalYear,
        Column::DisbursementDate,
        Column::ChargeoffDate,
        Column::TermMonths,
        Column::NumEmployees,
        Column::BusinessType,
        Column::JobsCreated,
        Column::JobsRetained,
        Column::GrossApproved,
        Column::SbaApproved,
        Column::DisbursementGross,
        Column::ChargeoffAmount,
        Column::LoanStatus,
        Column::RevolvingLine,
        Column::LowDoc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::LenderLocationId => "lender_location_id",
            Column::BusinessName => "business_name",
            Column::City => "city",
            Column::State => "state",
            Column::BankName => "bank_name",
            Column::BankState => "bank_state",
            Column::Naics => "naics",
            Column::ApprovalDate => "approval_date",
            Column::ApprovalFiscalYear => "approval_fiscal_year",
            Column::DisbursementDate => "disbursement_date",
            Column::ChargeoffDate => "chargeoff_date",
            Column::TermMonths => "term_months",
            Column::NumEmployees => "num_employees",
            Column::BusinessType => "business_type",
            Column::JobsCreated => "jobs_created",
            Column::JobsRetained => "jobs_retained",
            Column::GrossApproved => "gross_approved",
            Column::SbaApproved => "sba_approved",
            Column::DisbursementGross => "disbursement_gross",
            Column::ChargeoffAmount => "chargeoff_amount",
            Column::LoanStatus => "loan_status",
            Column::RevolvingLine => "revolving_line",
            Column::LowDoc => "low_doc",
        }
    }
}

/// Whether the borrower was a new or an existing business at approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BusinessType {
    New,
    Existing,
    #[default]
    Unknown,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessType::New => "New",
            BusinessType::Existing => "Existing",
            BusinessType::Unknown => "Unknown",
        }
    }
}

/// Terminal repayment state of a loan. Active, cancelled and unmatched
/// statuses all land on `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoanStatus {
    PaidInFull,
    ChargedOff,
    #[default]
    Unknown,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::PaidInFull => "PaidInFull",
            LoanStatus::ChargedOff => "ChargedOff",
            LoanStatus::Unknown => "Unknown",
        }
    }
}

/// A normalized loan that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoanRecord {
    pub lender_location_id: String,
    pub business_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub bank_name: Option<String>,
    pub bank_state: Option<String>,
    pub naics: Option<String>,
    pub approval_date: Option<NaiveDate>,
    pub approval_fiscal_year: Option<i32>,
    pub disbursement_date: Option<NaiveDate>,
    pub chargeoff_date: Option<NaiveDate>,
    pub term_months: Option<u32>,
    pub num_employees: Option<u32>,
    pub business_type: BusinessType,
    pub jobs_created: u32,
    pub jobs_retained: u32,
    pub gross_approved: Option<Decimal>,
    pub sba_approved: Option<Decimal>,
    pub disbursement_gross: Option<Decimal>,
    pub chargeoff_amount: Option<Decimal>,
    pub loan_status: LoanStatus,
    pub revolving_line: bool,
    pub low_doc: bool,
}

impl LoanRecord {
    /// Returns `true` if `column` holds no value for this record.
    pub fn is_null(&self, column: Column) -> bool {
        match column {
            Column::Id
            | Column::LenderLocationId
            | Column::BusinessType
            | Column::JobsCreated
            | Column::JobsRetained
            | Column::LoanStatus
            | Column::RevolvingLine
            | Column::LowDoc => false,
            Column::BusinessName => self.business_name.is_none(),
            Column::City => self.city.is_none(),
            Column::State => self.state.is_none(),
            Column::BankName => self.bank_name.is_none(),
            Column::BankState => self.bank_state.is_none(),
            Column::Naics => self.naics.is_none(),
            Column::ApprovalDate => self.approval_date.is_none(),
            Column::ApprovalFiscalYear => self.approval_fiscal_year.is_none(),
            Column::DisbursementDate => self.disbursement_date.is_none(),
            Column::ChargeoffDate => self.chargeoff_date.is_none(),
            Column::TermMonths => self.term_months.is_none(),
            Column::NumEmployees => self.num_employees.is_none(),
            Column::GrossApproved => self.gross_approved.is_none(),
            Column::SbaApproved => self.sba_approved.is_none(),
            Column::DisbursementGross => self.disbursement_gross.is_none(),
            Column::ChargeoffAmount => self.chargeoff_amount.is_none(),
        }
    }
}

/// A row of the canonical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalLoan {
    pub id: String,
    #[serde(flatten)]
    pub loan: LoanRecord,
}

/// One untyped source row: raw column name → raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
