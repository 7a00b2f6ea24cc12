//! In-memory sink for dry runs and tests

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::{DonationRow, EmployeeId, EmployeeRow, RowCounts, SalaryRow, Sink, Table};
use crate::records::DepartmentRecord;

/// A write applied to a [`MemorySink`], in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOp {
    Department(i64),
    Employee(i64),
    Salaries(Vec<i64>),
    Donations(Vec<i64>),
    Resync(Table),
}

#[derive(Debug, Default)]
struct State {
    departments: BTreeMap<i64, DepartmentRecord>,
    employees: BTreeMap<i64, EmployeeRow>,
    salaries: BTreeMap<i64, SalaryRow>,
    donations: BTreeMap<i64, DonationRow>,
    /// Next generated id per table; a missing entry means 1
    next_ids: BTreeMap<Table, i64>,
    journal: Vec<SinkOp>,
}

impl State {
    fn max_id(&self, table: Table) -> Option<i64> {
        match table {
            Table::Department => self.departments.keys().next_back().copied(),
            Table::Employee => self.employees.keys().next_back().copied(),
            Table::Salary => self.salaries.keys().next_back().copied(),
            Table::Donation => self.donations.keys().next_back().copied(),
        }
    }

    fn require_employee(&self, id: EmployeeId, what: &str, row: i64) -> Result<()> {
        if !self.employees.contains_key(&id.0) {
            bail!("{what} {row} references unknown employee {id}");
        }
        Ok(())
    }
}

/// Sink keeping every table in ordered maps
///
/// Enforces the same foreign keys as the database schema and simulates
/// identity sequences, which explicit-id upserts do not advance.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<State>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn departments(&self) -> Vec<DepartmentRecord> {
        self.state.lock().await.departments.values().cloned().collect()
    }

    pub async fn employees(&self) -> Vec<EmployeeRow> {
        self.state.lock().await.employees.values().cloned().collect()
    }

    pub async fn salaries(&self) -> Vec<SalaryRow> {
        self.state.lock().await.salaries.values().cloned().collect()
    }

    pub async fn donations(&self) -> Vec<DonationRow> {
        self.state.lock().await.donations.values().cloned().collect()
    }

    pub async fn donation(&self, id: i64) -> Option<DonationRow> {
        self.state.lock().await.donations.get(&id).cloned()
    }

    /// Id the store would generate next for `table`
    pub async fn next_id(&self, table: Table) -> i64 {
        self.state.lock().await.next_ids.get(&table).copied().unwrap_or(1)
    }

    /// Every write so far, oldest first
    pub async fn journal(&self) -> Vec<SinkOp> {
        self.state.lock().await.journal.clone()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn upsert_department(&self, department: &DepartmentRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.departments.insert(department.id, department.clone());
        state.journal.push(SinkOp::Department(department.id));
        Ok(())
    }

    async fn upsert_employee(&self, employee: &EmployeeRow) -> Result<EmployeeId> {
        let mut state = self.state.lock().await;
        if !state.departments.contains_key(&employee.department_id) {
            bail!(
                "employee {} references unknown department {}",
                employee.id,
                employee.department_id
            );
        }
        state.employees.insert(employee.id, employee.clone());
        state.journal.push(SinkOp::Employee(employee.id));
        Ok(EmployeeId(employee.id))
    }

    async fn upsert_salaries(&self, salaries: &[SalaryRow]) -> Result<()> {
        let mut state = self.state.lock().await;
        for salary in salaries {
            state.require_employee(salary.employee_id, "salary", salary.id)?;
        }
        for salary in salaries {
            state.salaries.insert(salary.id, salary.clone());
        }
        state.journal.push(SinkOp::Salaries(salaries.iter().map(|s| s.id).collect()));
        Ok(())
    }

    async fn upsert_donations(&self, donations: &[DonationRow]) -> Result<()> {
        let mut state = self.state.lock().await;
        for donation in donations {
            state.require_employee(donation.employee_id, "donation", donation.id)?;
        }
        for donation in donations {
            state.donations.insert(donation.id, donation.clone());
        }
        state.journal.push(SinkOp::Donations(donations.iter().map(|d| d.id).collect()));
        Ok(())
    }

    async fn resync_id_sequence(&self, table: Table) -> Result<()> {
        let mut state = self.state.lock().await;
        let next = state.max_id(table).map_or(1, |max| max + 1);
        state.next_ids.insert(table, next);
        state.journal.push(SinkOp::Resync(table));
        debug!(%table, next, "Resynced id sequence");
        Ok(())
    }

    async fn row_counts(&self) -> Result<RowCounts> {
        let state = self.state.lock().await;
        Ok(RowCounts {
            departments: state.departments.len() as u64,
            employees: state.employees.len() as u64,
            salaries: state.salaries.len() as u64,
            donations: state.donations.len() as u64,
        })
    }
}
