//! Typed payroll records extracted from object-file nodes

pub mod date;
pub mod extractor;

use chrono::NaiveDate;
use dono_common::CurrencySign;
use serde::Serialize;

pub use date::parse_date;
pub use extractor::{NodeKind, RecordConsumer, RecordExtractor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentRecord {
    pub id: i64,
    pub name: String,
}

/// One salary statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalaryRecord {
    pub id: i64,
    /// `None` when the source date could not be read
    pub date: Option<NaiveDate>,
    pub amount: f64,
}

/// A donation in its original currency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationRecord {
    pub id: i64,
    pub date: Option<NaiveDate>,
    pub amount: f64,
    pub currency_sign: CurrencySign,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeRecord {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub department: DepartmentRecord,
    pub salaries: Vec<SalaryRecord>,
    pub donations: Vec<DonationRecord>,
}

/// Value of one unit of `sign` in the base currency on `date`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRecord {
    pub date: NaiveDate,
    pub sign: CurrencySign,
    pub value: f64,
}

impl RateRecord {
    /// Whether this rate converts a donation made in `sign` on `date`
    ///
    /// Undated donations never match.
    pub fn applies_to(&self, date: Option<NaiveDate>, sign: &CurrencySign) -> bool {
        date == Some(self.date) && self.sign == *sign
    }

    /// Two rates are the same rate when they share day and currency
    pub fn same_rate(&self, other: &RateRecord) -> bool {
        self.date == other.date && self.sign == other.sign
    }
}
