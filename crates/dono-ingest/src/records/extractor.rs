//! Turning closed nodes into payroll records
//!
//! `Employee` and `Rate` nodes become records handed to a
//! [`RecordConsumer`]. Their parts (`Department`, `Salary`, `Donation`,
//! `Statement`) are pushed back onto the still-open parent so the owning
//! employee finds them among its children when it closes. Everything else is
//! a wrapper (`E-List`, `Rates`, ...) and is dropped.

use async_trait::async_trait;
use std::str::FromStr;
use tracing::{debug, trace};

use super::{parse_date, DepartmentRecord, DonationRecord, EmployeeRecord, RateRecord, SalaryRecord};
use crate::error::{FormatError, Result};
use crate::object_file::{CompositeNode, NodeHandler};
use dono_common::CurrencySign;

/// Receives records in source order
#[async_trait]
pub trait RecordConsumer: Send {
    async fn employee(&mut self, record: EmployeeRecord) -> Result<()>;

    async fn rate(&mut self, record: RateRecord) -> Result<()>;
}

/// How a closed node is treated, decided by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Employee,
    Rate,
    /// Component of an employee, kept for its aggregate
    Part,
    Other,
}

impl NodeKind {
    pub fn of(name: &str) -> Self {
        match name {
            "Employee" => NodeKind::Employee,
            "Rate" => NodeKind::Rate,
            "Department" | "Salary" | "Donation" | "Statement" => NodeKind::Part,
            _ => NodeKind::Other,
        }
    }
}

/// [`NodeHandler`] that extracts records and forwards them to a consumer
pub struct RecordExtractor<'c, C: ?Sized> {
    consumer: &'c mut C,
}

impl<'c, C: RecordConsumer + ?Sized> RecordExtractor<'c, C> {
    pub fn new(consumer: &'c mut C) -> Self {
        Self { consumer }
    }
}

#[async_trait]
impl<'c, C> NodeHandler for RecordExtractor<'c, C>
where
    C: RecordConsumer + ?Sized,
{
    async fn node_closed(&mut self, parent: Option<&mut CompositeNode>, node: CompositeNode) -> Result<()> {
        match NodeKind::of(&node.name) {
            NodeKind::Employee => {
                let record = parse_employee(&node)?;
                debug!(
                    employee = record.id,
                    line = node.line,
                    salaries = record.salaries.len(),
                    donations = record.donations.len(),
                    "Extracted employee"
                );
                self.consumer.employee(record).await
            }
            NodeKind::Rate => {
                let record = parse_rate(&node)?;
                debug!(sign = %record.sign, date = %record.date, value = record.value, "Extracted rate");
                self.consumer.rate(record).await
            }
            NodeKind::Part => {
                match parent {
                    Some(parent) => parent.children.push(node),
                    None => debug!(name = %node.name, line = node.line, "Ignoring top-level record part"),
                }
                Ok(())
            }
            NodeKind::Other => {
                trace!(name = %node.name, line = node.line, "Skipping wrapper object");
                Ok(())
            }
        }
    }
}

/// Build an employee from its node and re-attached parts
pub fn parse_employee(node: &CompositeNode) -> std::result::Result<EmployeeRecord, FormatError> {
    let mut departments = node.children_named("Department");
    let department = match (departments.next(), departments.next()) {
        (Some(department), None) => parse_department(department)?,
        (None, _) => return Err(record_error(node, "missing Department")),
        (Some(_), Some(_)) => return Err(record_error(node, "more than one Department")),
    };

    // A later Salary block replaces an earlier one
    let mut salaries = Vec::new();
    for salary in node.children_named("Salary") {
        salaries = parse_salaries(salary)?;
    }

    let donations = node
        .children_named("Donation")
        .map(parse_donation)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(EmployeeRecord {
        id: parse_field(node, "id")?,
        name: text_field(node, "name")?.to_string(),
        surname: text_field(node, "surname")?.to_string(),
        department,
        salaries,
        donations,
    })
}

pub fn parse_department(node: &CompositeNode) -> std::result::Result<DepartmentRecord, FormatError> {
    Ok(DepartmentRecord {
        id: parse_field(node, "id")?,
        name: text_field(node, "name")?.to_string(),
    })
}

/// Statements of one `Salary` block
pub fn parse_salaries(node: &CompositeNode) -> std::result::Result<Vec<SalaryRecord>, FormatError> {
    node.children
        .iter()
        .map(|statement| {
            if statement.name != "Statement" {
                return Err(record_error(
                    statement,
                    format!("Salary must contain only Statement objects, found {}", statement.name),
                ));
            }
            Ok(SalaryRecord {
                id: parse_field(statement, "id")?,
                date: statement.attribute("date").and_then(parse_date),
                amount: amount_field(statement, "amount", text_field(statement, "amount")?)?,
            })
        })
        .collect()
}

/// A donation whose amount reads `<number> <SIGN>`
pub fn parse_donation(node: &CompositeNode) -> std::result::Result<DonationRecord, FormatError> {
    let raw = text_field(node, "amount")?;
    let parts: Vec<&str> = raw.split_whitespace().collect();
    let [value, sign] = parts.as_slice() else {
        return Err(record_error(node, format!("malformed amount field {raw:?}")));
    };
    let currency_sign = CurrencySign::from_str(sign).map_err(|e| record_error(node, e.to_string()))?;

    Ok(DonationRecord {
        id: parse_field(node, "id")?,
        date: node.attribute("date").and_then(parse_date),
        amount: amount_field(node, "amount", value)?,
        currency_sign,
    })
}

pub fn parse_rate(node: &CompositeNode) -> std::result::Result<RateRecord, FormatError> {
    let date = text_field(node, "date")?;
    let date = parse_date(date).ok_or_else(|| record_error(node, format!("invalid rate date {date:?}")))?;
    let sign = CurrencySign::from_str(text_field(node, "sign")?).map_err(|e| record_error(node, e.to_string()))?;
    let value = amount_field(node, "value", text_field(node, "value")?)?;

    Ok(RateRecord { date, sign, value })
}

fn record_error(node: &CompositeNode, reason: impl Into<String>) -> FormatError {
    FormatError::Record {
        object: node.name.clone(),
        line: node.line,
        reason: reason.into(),
    }
}

fn text_field<'n>(node: &'n CompositeNode, key: &str) -> std::result::Result<&'n str, FormatError> {
    node.attribute(key).ok_or_else(|| record_error(node, format!("missing {key}")))
}

fn parse_field<T: FromStr>(node: &CompositeNode, key: &str) -> std::result::Result<T, FormatError> {
    let raw = text_field(node, key)?;
    raw.trim()
        .parse()
        .map_err(|_| record_error(node, format!("invalid {key} {raw:?}")))
}

fn amount_field(node: &CompositeNode, key: &str, raw: &str) -> std::result::Result<f64, FormatError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(record_error(node, format!("invalid {key} {raw:?}"))),
    }
}
