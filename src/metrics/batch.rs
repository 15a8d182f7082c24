use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, BooleanArray, Int32Array, StringArray, UInt32Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use rayon::prelude::*;
use std::sync::Arc;

use super::{derive, DerivedMetrics};
use crate::schema::arrow::{money_array, MONEY_PRECISION, MONEY_SCALE};
use crate::schema::CanonicalLoan;

pub fn metrics_schema() -> Arc<Schema> {
    let pct = DataType::Decimal128(MONEY_PRECISION, MONEY_SCALE);
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("guarantee_pct", pct.clone(), true),
        Field::new("loan_size_bucket", DataType::Utf8, false),
        Field::new("term_category", DataType::Utf8, false),
        Field::new("is_defaulted", DataType::Boolean, false),
        Field::new("is_paid_in_full", DataType::Boolean, false),
        Field::new("loss_severity_pct", pct, false),
        Field::new("vintage_year", DataType::Int32, true),
        Field::new("vintage_quarter", DataType::UInt32, true),
        Field::new("vintage_month", DataType::UInt32, true),
        Field::new("naics_sector", DataType::Utf8, true),
        Field::new("months_to_chargeoff", DataType::Int32, true),
    ]))
}

/// One row of derived metrics per canonical loan, in the same order.
pub fn metrics_to_batch(loans: &[CanonicalLoan]) -> Result<RecordBatch> {
    let metrics: Vec<DerivedMetrics> = loans.par_iter().map(|l| derive(&l.loan)).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(loans.iter().map(|l| &l.id))),
        money_array(metrics.iter().map(|m| m.guarantee_pct))?,
        Arc::new(StringArray::from_iter_values(
            metrics.iter().map(|m| m.loan_size_bucket.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            metrics.iter().map(|m| m.term_category.as_str()),
        )),
        Arc::new(BooleanArray::from(
            metrics.iter().map(|m| m.is_defaulted).collect::<Vec<_>>(),
        )),
        Arc::new(BooleanArray::from(
            metrics.iter().map(|m| m.is_paid_in_full).collect::<Vec<_>>(),
        )),
        money_array(metrics.iter().map(|m| Some(m.loss_severity_pct)))?,
        Arc::new(Int32Array::from(
            metrics.iter().map(|m| m.vintage.map(|v| v.year)).collect::<Vec<_>>(),
        )),
        Arc::new(UInt32Array::from(
            metrics.iter().map(|m| m.vintage.map(|v| v.quarter)).collect::<Vec<_>>(),
        )),
        Arc::new(UInt32Array::from(
            metrics.iter().map(|m| m.vintage.map(|v| v.month)).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from_iter(
            metrics.iter().map(|m| m.naics_sector.as_deref()),
        )),
        Arc::new(Int32Array::from(
            metrics.iter().map(|m| m.months_to_chargeoff).collect::<Vec<_>>(),
        )),
    ];

    RecordBatch::try_new(metrics_schema(), columns).context("building loan_metrics record batch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LoanRecord, LoanStatus};
    use arrow::array::{Array, Decimal128Array};
    use rust_decimal::Decimal;

    #[test]
    fn metrics_rows_follow_loans() -> Result<()> {
        let loans = vec![
            CanonicalLoan {
                id: "X-1".into(),
                loan: LoanRecord {
                    gross_approved: Some(Decimal::from(100_000)),
                    sba_approved: Some(Decimal::from(50_000)),
                    loan_status: LoanStatus::ChargedOff,
                    chargeoff_amount: Some(Decimal::from(10_000)),
                    ..Default::default()
                },
            },
            CanonicalLoan {
                id: "X-2".into(),
                loan: LoanRecord::default(),
            },
        ];
        let batch = metrics_to_batch(&loans)?;
        assert_eq!(batch.num_rows(), 2);

        let ids = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(ids.value(1), "X-2");

        let pct = batch
            .column_by_name("guarantee_pct")
            .unwrap()
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(pct.value(0), 5_000);
        assert!(pct.is_null(1));

        let severity = batch
            .column_by_name("loss_severity_pct")
            .unwrap()
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(severity.value(0), 1_000);
        assert_eq!(severity.value(1), 0);
        Ok(())
    }
}
