// src/transform/rules.rs
//! Ordered classification tables. Rules overlap, so order is load-bearing:
//! the first match wins.

use crate::normalize::{Matcher, Rule};
use crate::schema::{BusinessType, LoanStatus};

use Matcher::{Contains, ContainsAll, Exact, NumberAtLeast, NumberBelow};

pub const BUSINESS_TYPE_RULES: &[Rule<BusinessType>] = &[
    Rule::new(Exact("NEW BUSINESS"), BusinessType::New),
    Rule::new(Exact("STARTUP"), BusinessType::New),
    Rule::new(Exact("NEW"), BusinessType::New),
    Rule::new(Exact("2"), BusinessType::New),
    Rule::new(Exact("EXISTING BUSINESS"), BusinessType::Existing),
    Rule::new(Exact("EXISTING"), BusinessType::Existing),
    Rule::new(Exact("1"), BusinessType::Existing),
    Rule::new(Contains("NEW"), BusinessType::New),
    Rule::new(Contains("EXIST"), BusinessType::Existing),
    Rule::new(NumberBelow(2.0), BusinessType::New),
    Rule::new(NumberAtLeast(2.0), BusinessType::Existing),
];

/// `COMMIT` and `CANCLD` are deliberate `Unknown`s (still active or never
/// funded), and `EXEMPT` counts as paid in full. Both are policy choices
/// that move default rates downstream.
pub const LOAN_STATUS_RULES: &[Rule<LoanStatus>] = &[
    Rule::new(Contains("PIF"), LoanStatus::PaidInFull),
    Rule::new(Exact("P I F"), LoanStatus::PaidInFull),
    Rule::new(ContainsAll(&["PAID", "FULL"]), LoanStatus::PaidInFull),
    Rule::new(Contains("CHGOFF"), LoanStatus::ChargedOff),
    Rule::new(ContainsAll(&["CHARGE", "OFF"]), LoanStatus::ChargedOff),
    Rule::new(Exact("COMMIT"), LoanStatus::Unknown),
    Rule::new(Exact("CANCLD"), LoanStatus::Unknown),
    Rule::new(Exact(EXEMPT), LoanStatus::PaidInFull),
];

pub const EXEMPT: &str = "EXEMPT";

pub const FLAG_RULES: &[Rule<bool>] = &[
    Rule::new(Exact("Y"), true),
    Rule::new(Exact("YES"), true),
    Rule::new(Exact("T"), true),
    Rule::new(Exact("TRUE"), true),
    Rule::new(Exact("1"), true),
    Rule::new(Exact("N"), false),
    Rule::new(Exact("NO"), false),
    Rule::new(Exact("F"), false),
    Rule::new(Exact("FALSE"), false),
    Rule::new(Exact("0"), false),
];
