//! Ingestion run coordinator
//!
//! One [`IngestionCoordinator`] drives a single object file into a [`Sink`].
//! Employees and their departments and salaries are written as soon as they
//! are extracted. Donations are held until they can be expressed in the base
//! currency: immediately for base-currency donations, otherwise once a rate
//! for the same day and currency has been seen, which may be later in the
//! file. Anything still waiting when the file ends fails the run.

use async_trait::async_trait;
use dono_common::CurrencySign;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestError, Result};
use crate::object_file::{LineSource, ObjectFileParser};
use crate::records::{EmployeeRecord, RateRecord, RecordConsumer, RecordExtractor};
use crate::sink::{DonationRow, EmployeeRow, SalaryRow, Sink, Table};

/// A donation waiting for its exchange rate
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDonation {
    /// Row with the amount still in `sign`
    pub row: DonationRow,
    pub sign: CurrencySign,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub employees: usize,
    /// One per employee, so a shared department counts once per employee
    pub department_writes: usize,
    pub salaries: usize,
    pub donations_converted: usize,
    pub donations_in_base: usize,
    pub rates: usize,
    pub lines: usize,
    pub nodes: usize,
}

impl RunStats {
    pub fn donations(&self) -> usize {
        self.donations_converted + self.donations_in_base
    }
}

/// State of one ingestion run
pub struct IngestionCoordinator<'s, S: Sink + ?Sized> {
    sink: &'s S,
    pending: Vec<PendingDonation>,
    rates: Vec<RateRecord>,
    stats: RunStats,
}

impl<'s, S: Sink + ?Sized> IngestionCoordinator<'s, S> {
    pub fn new(sink: &'s S) -> Self {
        Self {
            sink,
            pending: Vec::new(),
            rates: Vec::new(),
            stats: RunStats::default(),
        }
    }

    /// Parse `source` to the end and settle the run
    #[instrument(skip_all, fields(indent_unit = indent_unit))]
    pub async fn ingest(mut self, source: LineSource, indent_unit: usize) -> Result<RunStats> {
        let summary = {
            let mut extractor = RecordExtractor::new(&mut self);
            ObjectFileParser::new(indent_unit).parse(source, &mut extractor).await?
        };
        self.stats.lines = summary.lines;
        self.stats.nodes = summary.nodes;
        self.finish().await
    }

    /// Close the run
    ///
    /// Resyncs every id sequence, then fails with
    /// [`IngestError::Integrity`] naming the oldest donation that never got
    /// a rate. Rows already written stay written.
    pub async fn finish(self) -> Result<RunStats> {
        for table in Table::ALL {
            self.sink
                .resync_id_sequence(table)
                .await
                .map_err(IngestError::Persistence)?;
        }

        if let Some(oldest) = self.pending.first() {
            warn!(
                unresolved = self.pending.len(),
                sign = %oldest.sign,
                donation = oldest.row.id,
                "Donations left without an exchange rate"
            );
            return Err(IngestError::Integrity {
                sign: oldest.sign.clone(),
                date: oldest.row.date,
            });
        }

        info!(
            employees = self.stats.employees,
            salaries = self.stats.salaries,
            donations = self.stats.donations(),
            rates = self.stats.rates,
            "Run finished"
        );
        Ok(self.stats)
    }

    pub fn pending(&self) -> &[PendingDonation] {
        &self.pending
    }

    pub fn rates(&self) -> &[RateRecord] {
        &self.rates
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Write every pending donation that can now be converted
    ///
    /// The first rate seen for a day and currency is the one used.
    async fn reconcile(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut resolved = Vec::new();
        let mut in_base = 0;
        let mut waiting = Vec::with_capacity(self.pending.len());
        for mut entry in std::mem::take(&mut self.pending) {
            if entry.sign.is_base() {
                in_base += 1;
                resolved.push(entry.row);
                continue;
            }
            match self.rates.iter().find(|rate| rate.applies_to(entry.row.date, &entry.sign)) {
                Some(rate) => {
                    entry.row.amount *= rate.value;
                    resolved.push(entry.row);
                }
                None => waiting.push(entry),
            }
        }
        self.pending = waiting;

        if resolved.is_empty() {
            return Ok(());
        }
        self.sink
            .upsert_donations(&resolved)
            .await
            .map_err(IngestError::Persistence)?;

        self.stats.donations_in_base += in_base;
        self.stats.donations_converted += resolved.len() - in_base;
        debug!(
            written = resolved.len(),
            still_pending = self.pending.len(),
            "Reconciled donations"
        );
        Ok(())
    }
}

#[async_trait]
impl<'s, S> RecordConsumer for IngestionCoordinator<'s, S>
where
    S: Sink + ?Sized,
{
    async fn employee(&mut self, record: EmployeeRecord) -> Result<()> {
        let EmployeeRecord { id, name, surname, department, salaries, donations } = record;

        self.sink
            .upsert_department(&department)
            .await
            .map_err(IngestError::Persistence)?;
        let employee_id = self
            .sink
            .upsert_employee(&EmployeeRow { id, name, surname, department_id: department.id })
            .await
            .map_err(IngestError::Persistence)?;

        let salary_rows: Vec<SalaryRow> = salaries
            .into_iter()
            .map(|salary| SalaryRow {
                id: salary.id,
                date: salary.date,
                amount: salary.amount,
                employee_id,
            })
            .collect();
        if !salary_rows.is_empty() {
            self.sink
                .upsert_salaries(&salary_rows)
                .await
                .map_err(IngestError::Persistence)?;
        }

        self.stats.employees += 1;
        self.stats.department_writes += 1;
        self.stats.salaries += salary_rows.len();

        self.pending.extend(donations.into_iter().map(|donation| PendingDonation {
            row: DonationRow {
                id: donation.id,
                date: donation.date,
                amount: donation.amount,
                employee_id,
            },
            sign: donation.currency_sign,
        }));
        self.reconcile().await
    }

    async fn rate(&mut self, record: RateRecord) -> Result<()> {
        if self.rates.iter().any(|known| known.same_rate(&record)) {
            debug!(sign = %record.sign, date = %record.date, "Duplicate rate, first one stays in effect");
        }
        self.rates.push(record);
        self.stats.rates += 1;
        self.reconcile().await
    }
}

/// Ingest an in-memory document
pub async fn ingest_str<S: Sink + ?Sized>(sink: &S, text: &str, indent_unit: usize) -> Result<RunStats> {
    IngestionCoordinator::new(sink)
        .ingest(LineSource::from_text(text), indent_unit)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::records::{DepartmentRecord, DonationRecord};
    use crate::sink::{MemorySink, SinkOp};
    use chrono::NaiveDate;

    fn feb(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 2, day).unwrap()
    }

    fn employee(id: i64, donations: Vec<DonationRecord>) -> EmployeeRecord {
        EmployeeRecord {
            id,
            name: "Ann".to_string(),
            surname: "Lee".to_string(),
            department: DepartmentRecord { id: 10, name: "Kids".to_string() },
            salaries: Vec::new(),
            donations,
        }
    }

    fn donation(id: i64, day: u32, amount: f64, sign: &str) -> DonationRecord {
        DonationRecord {
            id,
            date: Some(feb(day)),
            amount,
            currency_sign: sign.parse().unwrap(),
        }
    }

    fn rate(day: u32, sign: &str, value: f64) -> RateRecord {
        RateRecord { date: feb(day), sign: sign.parse().unwrap(), value }
    }

    #[tokio::test]
    async fn test_base_currency_resolves_without_rates() {
        let sink = MemorySink::new();
        let mut run = IngestionCoordinator::new(&sink);
        run.employee(employee(1, vec![donation(5, 1, 40.0, "USD")])).await.unwrap();

        assert!(run.pending().is_empty());
        assert_eq!(sink.donation(5).await.unwrap().amount, 40.0);
        assert_eq!(run.finish().await.unwrap().donations_in_base, 1);
    }

    #[tokio::test]
    async fn test_rate_after_donation() {
        let sink = MemorySink::new();
        let mut run = IngestionCoordinator::new(&sink);
        run.employee(employee(1, vec![donation(5, 28, 100.0, "AUD")])).await.unwrap();
        assert_eq!(run.pending().len(), 1);
        assert!(sink.donation(5).await.is_none());

        run.rate(rate(27, "AUD", 0.5)).await.unwrap();
        assert_eq!(run.pending().len(), 1);

        run.rate(rate(28, "AUD", 0.77)).await.unwrap();
        assert!(run.pending().is_empty());
        assert!((sink.donation(5).await.unwrap().amount - 77.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_first_matching_rate_wins() {
        let sink = MemorySink::new();
        let mut run = IngestionCoordinator::new(&sink);
        run.rate(rate(28, "AUD", 0.5)).await.unwrap();
        run.rate(rate(28, "AUD", 0.9)).await.unwrap();
        run.employee(employee(1, vec![donation(5, 28, 100.0, "AUD")])).await.unwrap();

        assert_eq!(run.rates().len(), 2);
        assert!((sink.donation(5).await.unwrap().amount - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unresolved_keeps_order_and_fails_finish() {
        let sink = MemorySink::new();
        let mut run = IngestionCoordinator::new(&sink);
        run.employee(employee(
            1,
            vec![donation(5, 1, 10.0, "EUR"), donation(6, 2, 10.0, "AUD"), donation(7, 3, 10.0, "USD")],
        ))
        .await
        .unwrap();

        let waiting: Vec<i64> = run.pending().iter().map(|p| p.row.id).collect();
        assert_eq!(waiting, vec![5, 6]);

        let err = run.finish().await.unwrap_err();
        assert_eq!(err.to_string(), "No conversion rate for EUR on 2021-02-01");
        assert_eq!(sink.row_counts().await.unwrap().donations, 1);
        // Sequences are resynced before the failure is reported
        assert_eq!(sink.next_id(Table::Donation).await, 8);
    }

    #[tokio::test]
    async fn test_write_order_per_employee() {
        let sink = MemorySink::new();
        let mut record = employee(1, vec![donation(5, 1, 10.0, "USD")]);
        record.salaries.push(crate::records::SalaryRecord { id: 3, date: None, amount: 1000.0 });

        let mut run = IngestionCoordinator::new(&sink);
        run.employee(record).await.unwrap();
        assert_eq!(
            sink.journal().await,
            vec![
                SinkOp::Department(10),
                SinkOp::Employee(1),
                SinkOp::Salaries(vec![3]),
                SinkOp::Donations(vec![5]),
            ]
        );
        let stats = run.stats();
        assert_eq!((stats.employees, stats.salaries, stats.donations()), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_shared_department_written_per_employee() {
        let sink = MemorySink::new();
        let mut run = IngestionCoordinator::new(&sink);
        run.employee(employee(1, Vec::new())).await.unwrap();
        run.employee(employee(2, Vec::new())).await.unwrap();

        assert_eq!(run.stats().department_writes, 2);
        assert_eq!(sink.row_counts().await.unwrap().departments, 1);
    }

    #[tokio::test]
    async fn test_ingest_str_counts_lines_and_nodes() {
        let sink = MemorySink::new();
        let text = "Rates\n  Rate\n    date: Feb 28 2021\n    sign: AUD\n    value: 0.77\n";
        let stats = ingest_str(&sink, text, 2).await.unwrap();
        assert_eq!(stats.rates, 1);
        assert_eq!(stats.lines, 5);
        assert_eq!(stats.nodes, 2);
    }
}
