//! PostgreSQL sink
//!
//! Rows are written with `INSERT ... ON CONFLICT (id) DO UPDATE`, batched
//! through [`QueryBuilder::push_values`]. Schema migrations live in the
//! workspace `migrations/` directory and are embedded at compile time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use super::{DonationRow, EmployeeId, EmployeeRow, RowCounts, SalaryRow, Sink, Table};
use crate::config::DatabaseConfig;
use crate::records::DepartmentRecord;

/// Rows per INSERT statement (4 binds each, well under the 65535 limit)
const BATCH_SIZE: usize = 1000;

pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(url)
            .await
            .context("Failed to connect to database")?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool created"
        );
        Ok(Self { pool })
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Keep the last row per id; Postgres rejects a statement touching the same
/// row twice
fn dedupe_by_id<T>(rows: &[T], id: impl Fn(&T) -> i64) -> Vec<&T> {
    let mut latest: BTreeMap<i64, &T> = BTreeMap::new();
    for row in rows {
        latest.insert(id(row), row);
    }
    latest.into_values().collect()
}

#[async_trait]
impl Sink for PgSink {
    async fn upsert_department(&self, department: &DepartmentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO department (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(department.id)
        .bind(&department.name)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert department {}", department.id))?;
        Ok(())
    }

    async fn upsert_employee(&self, employee: &EmployeeRow) -> Result<EmployeeId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO employee (id, name, surname, department_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                surname = EXCLUDED.surname,
                department_id = EXCLUDED.department_id
            RETURNING id
            "#,
        )
        .bind(employee.id)
        .bind(&employee.name)
        .bind(&employee.surname)
        .bind(employee.department_id)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert employee {}", employee.id))?;
        Ok(EmployeeId(id))
    }

    async fn upsert_salaries(&self, salaries: &[SalaryRow]) -> Result<()> {
        let rows = dedupe_by_id(salaries, |s| s.id);
        for chunk in rows.chunks(BATCH_SIZE) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(r#"INSERT INTO salary (id, "date", amount, employee_id) "#);
            query_builder.push_values(chunk, |mut b, salary| {
                b.push_bind(salary.id)
                    .push_bind(salary.date)
                    .push_bind(salary.amount)
                    .push_bind(salary.employee_id.0);
            });
            query_builder.push(
                r#" ON CONFLICT (id) DO UPDATE SET
                    "date" = EXCLUDED."date",
                    amount = EXCLUDED.amount,
                    employee_id = EXCLUDED.employee_id"#,
            );
            query_builder
                .build()
                .execute(&self.pool)
                .await
                .context("Failed to upsert salaries")?;
        }
        debug!(count = rows.len(), "Upserted salaries");
        Ok(())
    }

    async fn upsert_donations(&self, donations: &[DonationRow]) -> Result<()> {
        let rows = dedupe_by_id(donations, |d| d.id);
        for chunk in rows.chunks(BATCH_SIZE) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(r#"INSERT INTO donation (id, "date", amount, employee_id) "#);
            query_builder.push_values(chunk, |mut b, donation| {
                b.push_bind(donation.id)
                    .push_bind(donation.date)
                    .push_bind(donation.amount)
                    .push_bind(donation.employee_id.0);
            });
            query_builder.push(
                r#" ON CONFLICT (id) DO UPDATE SET
                    "date" = EXCLUDED."date",
                    amount = EXCLUDED.amount,
                    employee_id = EXCLUDED.employee_id"#,
            );
            query_builder
                .build()
                .execute(&self.pool)
                .await
                .context("Failed to upsert donations")?;
        }
        debug!(count = rows.len(), "Upserted donations");
        Ok(())
    }

    async fn resync_id_sequence(&self, table: Table) -> Result<()> {
        // Table names come from a closed enum, never from input
        let sql = format!(
            "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
             COALESCE((SELECT MAX(id) FROM {table}), 0) + 1, false)"
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to resync id sequence of {table}"))?;
        Ok(())
    }

    async fn row_counts(&self) -> Result<RowCounts> {
        let (departments, employees, salaries, donations): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM department),
                (SELECT COUNT(*) FROM employee),
                (SELECT COUNT(*) FROM salary),
                (SELECT COUNT(*) FROM donation)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count rows")?;

        Ok(RowCounts {
            departments: departments.max(0) as u64,
            employees: employees.max(0) as u64,
            salaries: salaries.max(0) as u64,
            donations: donations.max(0) as u64,
        })
    }
}
