//! Persistence interface for extracted records
//!
//! A [`Sink`] stores rows by their source id with insert-or-update
//! semantics, so re-ingesting a file converges to the same state. Writes are
//! atomic per call; there is no run-wide transaction.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::records::DepartmentRecord;

pub use memory::{MemorySink, SinkOp};
#[cfg(feature = "database")]
pub use postgres::PgSink;

/// Tables whose ids are generated by the store when not given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Department,
    Employee,
    Salary,
    Donation,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Department, Table::Employee, Table::Salary, Table::Donation];

    pub fn name(self) -> &'static str {
        match self {
            Table::Department => "department",
            Table::Employee => "employee",
            Table::Salary => "salary",
            Table::Donation => "donation",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a persisted employee, as returned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EmployeeId(pub i64);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeRow {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub department_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalaryRow {
    pub id: i64,
    pub date: Option<NaiveDate>,
    pub amount: f64,
    pub employee_id: EmployeeId,
}

/// A donation ready to store, amount already in the base currency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationRow {
    pub id: i64,
    pub date: Option<NaiveDate>,
    pub amount: f64,
    pub employee_id: EmployeeId,
}

/// Rows per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub departments: u64,
    pub employees: u64,
    pub salaries: u64,
    pub donations: u64,
}

impl RowCounts {
    pub fn get(&self, table: Table) -> u64 {
        match table {
            Table::Department => self.departments,
            Table::Employee => self.employees,
            Table::Salary => self.salaries,
            Table::Donation => self.donations,
        }
    }
}

impl fmt::Display for RowCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} departments, {} employees, {} salaries, {} donations",
            self.departments, self.employees, self.salaries, self.donations
        )
    }
}

/// Record store used by ingestion runs
///
/// Shared by concurrent runs, so implementations must be `Send + Sync`.
/// Every upsert replaces the row with the same id if one exists.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn upsert_department(&self, department: &DepartmentRecord) -> Result<()>;

    /// Store an employee and return the identity later rows should link to
    async fn upsert_employee(&self, employee: &EmployeeRow) -> Result<EmployeeId>;

    async fn upsert_salaries(&self, salaries: &[SalaryRow]) -> Result<()>;

    async fn upsert_donations(&self, donations: &[DonationRow]) -> Result<()>;

    /// Move the id generator of `table` past the largest stored id
    async fn resync_id_sequence(&self, table: Table) -> Result<()>;

    async fn row_counts(&self) -> Result<RowCounts>;
}
