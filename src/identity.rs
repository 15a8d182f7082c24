// src/identity.rs
//! Dense, ordered ids for the accepted records of one run.
//!
//! Ids depend on the business ordering of the *whole* accepted set, so this
//! runs only after every row has been transformed.

use rayon::prelude::*;
use std::cmp::Ordering;

use crate::config::IdentityConfig;
use crate::schema::{CanonicalLoan, LoanRecord};

/// `Some` before `None`, so records missing a key component sort last.
fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Fiscal year, then approval date, then business name.
pub fn ordering_key(a: &LoanRecord, b: &LoanRecord) -> Ordering {
    nulls_last(&a.approval_fiscal_year, &b.approval_fiscal_year)
        .then_with(|| nulls_last(&a.approval_date, &b.approval_date))
        .then_with(|| nulls_last(&a.business_name, &b.business_name))
}

/// Stable sort by [`ordering_key`]; equal keys keep their input order.
pub fn sort_for_assignment(records: &mut [LoanRecord]) {
    records.par_sort_by(ordering_key);
}

pub fn format_id(cfg: &IdentityConfig, seq: usize) -> String {
    format!("{}-{:0width$}", cfg.prefix, seq, width = cfg.width)
}

/// Number an already sorted sequence from 1 upward.
pub fn assign_ids(cfg: &IdentityConfig, sorted: Vec<LoanRecord>) -> Vec<CanonicalLoan> {
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, loan)| CanonicalLoan {
            id: format_id(cfg, i + 1),
            loan,
        })
        .collect()
}
