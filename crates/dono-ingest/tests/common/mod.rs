//! Shared fixtures for ingestion integration tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use dono_ingest::records::DepartmentRecord;
use dono_ingest::sink::{DonationRow, EmployeeId, EmployeeRow, MemorySink, RowCounts, SalaryRow, Sink, Table};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One employee giving 100 AUD, with the rate only after the donation
pub const ANN_LEE: &str = "\
E-List
  Employee
    id: 1
    name: Ann
    surname: Lee
    Department
      id: 10
      name: Kids
    Salary
      Statement
        id: 100
        amount: 1000
        date: Jan 1 2021
    Donation
      id: 200
      date: Sun Feb 28 2021
      amount: 100 AUD
Rates
  Rate
    date: Sun Feb 28 2021
    sign: AUD
    value: 0.77
";

/// Employee with a single donation and no rates
pub fn single_donation(employee_id: i64, donation_id: i64, amount: &str, date: &str) -> String {
    format!(
        "\
Employee
  id: {employee_id}
  name: Test
  surname: Person{employee_id}
  Department
    id: 1
    name: General
  Donation
    id: {donation_id}
    date: {date}
    amount: {amount}
"
    )
}

pub fn rate(date: &str, sign: &str, value: f64) -> String {
    format!("Rate\n  date: {date}\n  sign: {sign}\n  value: {value}\n")
}

/// Sink that delegates to a [`MemorySink`] and fails the nth write to one table
pub struct FailingSink {
    pub inner: MemorySink,
    table: Table,
    fail_at: usize,
    writes: AtomicUsize,
}

impl FailingSink {
    /// Fail the `fail_at`-th (1-based) write to `table`
    pub fn new(table: Table, fail_at: usize) -> Self {
        Self {
            inner: MemorySink::new(),
            table,
            fail_at,
            writes: AtomicUsize::new(0),
        }
    }

    fn check(&self, table: Table) -> Result<()> {
        if table == self.table && self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
            bail!("connection reset while writing {table}");
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for FailingSink {
    async fn upsert_department(&self, department: &DepartmentRecord) -> Result<()> {
        self.check(Table::Department)?;
        self.inner.upsert_department(department).await
    }

    async fn upsert_employee(&self, employee: &EmployeeRow) -> Result<EmployeeId> {
        self.check(Table::Employee)?;
        self.inner.upsert_employee(employee).await
    }

    async fn upsert_salaries(&self, salaries: &[SalaryRow]) -> Result<()> {
        self.check(Table::Salary)?;
        self.inner.upsert_salaries(salaries).await
    }

    async fn upsert_donations(&self, donations: &[DonationRow]) -> Result<()> {
        self.check(Table::Donation)?;
        self.inner.upsert_donations(donations).await
    }

    async fn resync_id_sequence(&self, table: Table) -> Result<()> {
        self.inner.resync_id_sequence(table).await
    }

    async fn row_counts(&self) -> Result<RowCounts> {
        self.inner.row_counts().await
    }
}
