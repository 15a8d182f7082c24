pub mod arrow;
pub mod types;
pub mod write;

pub use arrow::{canonical_schema, loans_to_batch};
pub use types::{BusinessType, CanonicalLoan, Column, LoanField, LoanRecord, LoanStatus, RawRecord};
pub use write::{write_json, write_parquet};
