// src/schema/arrow.rs

use anyhow::{bail, Context, Result};
use arrow::{
    array::{ArrayRef, BooleanArray, Date32Array, Decimal128Array, Int32Array, StringArray, UInt32Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::sync::Arc;

use super::{CanonicalLoan, Column};

pub const MONEY_PRECISION: u8 = 38;
pub const MONEY_SCALE: i8 = 2;

fn money() -> DataType {
    DataType::Decimal128(MONEY_PRECISION, MONEY_SCALE)
}

/// Arrow type of each canonical column; only `id` and the always-populated
/// columns are non-nullable.
pub fn column_field(column: Column) -> Field {
    let (ty, nullable) = match column {
        Column::Id | Column::LenderLocationId => (DataType::Utf8, false),
        Column::BusinessName
        | Column::City
        | Column::State
        | Column::BankName
        | Column::BankState
        | Column::Naics => (DataType::Utf8, true),
        Column::ApprovalDate | Column::DisbursementDate | Column::ChargeoffDate => {
            (DataType::Date32, true)
        }
        Column::ApprovalFiscalYear => (DataType::Int32, true),
        Column::TermMonths | Column::NumEmployees => (DataType::UInt32, true),
        Column::JobsCreated | Column::JobsRetained => (DataType::UInt32, false),
        Column::BusinessType | Column::LoanStatus => (DataType::Utf8, false),
        Column::GrossApproved
        | Column::SbaApproved
        | Column::DisbursementGross
        | Column::ChargeoffAmount => (money(), true),
        Column::RevolvingLine | Column::LowDoc => (DataType::Boolean, false),
    };
    Field::new(column.name(), ty, nullable)
}

pub fn canonical_schema() -> Arc<Schema> {
    Arc::new(Schema::new(
        Column::ALL.iter().map(|c| column_field(*c)).collect::<Vec<_>>(),
    ))
}

/// Days from 0001-01-01 to 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Days since 1970-01-01, as Arrow's Date32 stores them.
pub fn date32(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Fixed-point cents for a `Decimal128(38, 2)` column. Fails when the
/// amount cannot be represented at that scale.
pub fn money_units(d: Decimal) -> Result<i128> {
    let mut scaled = d;
    scaled.rescale(MONEY_SCALE as u32);
    if scaled.scale() != MONEY_SCALE as u32 {
        bail!("amount {} does not fit at {} decimal places", d, MONEY_SCALE);
    }
    Ok(scaled.mantissa())
}

pub fn money_array<I>(values: I) -> Result<ArrayRef>
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    let units = values
        .into_iter()
        .map(|v| v.map(money_units).transpose())
        .collect::<Result<Vec<_>>>()?;
    let arr = Decimal128Array::from(units)
    .with_precision_and_scale(MONEY_PRECISION, MONEY_SCALE)
    .context("building decimal column")?;
    Ok(Arc::new(arr))
}

pub fn date_array<I>(values: I) -> ArrayRef
where
    I: IntoIterator<Item = Option<NaiveDate>>,
{
    Arc::new(Date32Array::from(
        values.into_iter().map(|v| v.map(date32)).collect::<Vec<_>>(),
    ))
}

fn column_array(loans: &[CanonicalLoan], column: Column) -> Result<ArrayRef> {
    let arr: ArrayRef = match column {
        Column::Id => Arc::new(StringArray::from_iter_values(loans.iter().map(|l| &l.id))),
        Column::LenderLocationId => Arc::new(StringArray::from_iter_values(
            loans.iter().map(|l| &l.loan.lender_location_id),
        )),
        Column::BusinessName => Arc::new(StringArray::from_iter(
            loans.iter().map(|l| l.loan.business_name.as_deref()),
        )),
        Column::City => Arc::new(StringArray::from_iter(loans.iter().map(|l| l.loan.city.as_deref()))),
        Column::State => Arc::new(StringArray::from_iter(loans.iter().map(|l| l.loan.state.as_deref()))),
        Column::BankName => Arc::new(StringArray::from_iter(
            loans.iter().map(|l| l.loan.bank_name.as_deref()),
        )),
        Column::BankState => Arc::new(StringArray::from_iter(
            loans.iter().map(|l| l.loan.bank_state.as_deref()),
        )),
        Column::Naics => Arc::new(StringArray::from_iter(loans.iter().map(|l| l.loan.naics.as_deref()))),
        Column::ApprovalDate => date_array(loans.iter().map(|l| l.loan.approval_date)),
        Column::ApprovalFiscalYear => Arc::new(Int32Array::from(
            loans.iter().map(|l| l.loan.approval_fiscal_year).collect::<Vec<_>>(),
        )),
        Column::DisbursementDate => date_array(loans.iter().map(|l| l.loan.disbursement_date)),
        Column::ChargeoffDate => date_array(loans.iter().map(|l| l.loan.chargeoff_date)),
        Column::TermMonths => Arc::new(UInt32Array::from(
            loans.iter().map(|l| l.loan.term_months).collect::<Vec<_>>(),
        )),
        Column::NumEmployees => Arc::new(UInt32Array::from(
            loans.iter().map(|l| l.loan.num_employees).collect::<Vec<_>>(),
        )),
        Column::BusinessType => Arc::new(StringArray::from_iter_values(
            loans.iter().map(|l| l.loan.business_type.as_str()),
        )),
        Column::JobsCreated => Arc::new(UInt32Array::from_iter_values(
            loans.iter().map(|l| l.loan.jobs_created),
        )),
        Column::JobsRetained => Arc::new(UInt32Array::from_iter_values(
            loans.iter().map(|l| l.loan.jobs_retained),
        )),
        Column::GrossApproved => money_array(loans.iter().map(|l| l.loan.gross_approved))?,
        Column::SbaApproved => money_array(loans.iter().map(|l| l.loan.sba_approved))?,
        Column::DisbursementGross => money_array(loans.iter().map(|l| l.loan.disbursement_gross))?,
        Column::ChargeoffAmount => money_array(loans.iter().map(|l| l.loan.chargeoff_amount))?,
        Column::LoanStatus => Arc::new(StringArray::from_iter_values(
            loans.iter().map(|l| l.loan.loan_status.as_str()),
        )),
        Column::RevolvingLine => Arc::new(BooleanArray::from(
            loans.iter().map(|l| l.loan.revolving_line).collect::<Vec<_>>(),
        )),
        Column::LowDoc => Arc::new(BooleanArray::from(
            loans.iter().map(|l| l.loan.low_doc).collect::<Vec<_>>(),
        )),
    };
    Ok(arr)
}

/// Build one RecordBatch of the canonical table.
pub fn loans_to_batch(loans: &[CanonicalLoan]) -> Result<RecordBatch> {
    let columns = Column::ALL
        .iter()
        .map(|c| column_array(loans, *c).with_context(|| format!("building column {}", c.name())))
        .collect::<Result<Vec<_>>>()?;
    RecordBatch::try_new(canonical_schema(), columns).context("building canonical record batch")
}
