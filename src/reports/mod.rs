// Tabular fleet reports: one query per report kind, rendered to JSON rows,
// an Excel workbook or a PDF.

pub mod excel;
pub mod pdf;

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, MySqlPool};

use crate::database::models::report::ReportFilters;
use crate::permissions::RowScope;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid report type: {0}")]
    InvalidType(String),
    #[error("start date is after end date")]
    InvalidRange,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("excel rendering failed: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),
    #[error("pdf rendering failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    FuelAnalysis,
    MaintenanceCosts,
    VehicleAssignments,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [
        ReportKind::FuelAnalysis,
        ReportKind::MaintenanceCosts,
        ReportKind::VehicleAssignments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::FuelAnalysis => "fuel_analysis",
            ReportKind::MaintenanceCosts => "maintenance_costs",
            ReportKind::VehicleAssignments => "vehicle_assignments",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::FuelAnalysis => "Fuel Analysis",
            ReportKind::MaintenanceCosts => "Maintenance Costs",
            ReportKind::VehicleAssignments => "Vehicle Assignments",
        }
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ReportError::InvalidType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Excel,
    Pdf,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Excel => "excel",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Excel => "xlsx",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ReportFormat::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ReportFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excel" => Ok(ReportFormat::Excel),
            "pdf" => Ok(ReportFormat::Pdf),
            other => Err(format!("Unknown report format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Cell::Number(n) => format!("{:.2}", n),
            Cell::Empty => String::new(),
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<Option<String>> for Cell {
    fn from(s: Option<String>) -> Self {
        s.map(Cell::Text).unwrap_or(Cell::Empty)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n as f64)
    }
}

impl From<Option<i64>> for Cell {
    fn from(n: Option<i64>) -> Self {
        n.map(Cell::from).unwrap_or(Cell::Empty)
    }
}

impl From<Decimal> for Cell {
    fn from(d: Decimal) -> Self {
        d.to_f64().map(Cell::Number).unwrap_or(Cell::Empty)
    }
}

impl From<Option<Decimal>> for Cell {
    fn from(d: Option<Decimal>) -> Self {
        d.map(Cell::from).unwrap_or(Cell::Empty)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(t: NaiveDateTime) -> Self {
        Cell::Text(t.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

impl From<Option<NaiveDateTime>> for Cell {
    fn from(t: Option<NaiveDateTime>) -> Self {
        t.map(Cell::from).unwrap_or(Cell::Empty)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Cell::Text(d.format("%Y-%m-%d").to_string())
    }
}

/// Column names plus rows of cells, in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

/// "Month dd, yyyy - Month dd, yyyy"
pub fn period_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("Period: {} - {}", start.format("%B %d, %Y"), end.format("%B %d, %Y"))
}

#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub kind: ReportKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub filters: ReportFilters,
    pub scope: RowScope,
}

impl ReportQuery {
    pub fn new(kind: ReportKind, start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidRange);
        }
        Ok(Self {
            kind,
            start,
            end,
            filters: ReportFilters::default(),
            scope: RowScope::All,
        })
    }

    pub fn with_filters(mut self, filters: ReportFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_scope(mut self, scope: RowScope) -> Self {
        self.scope = scope;
        self
    }

    /// SQL for this query and the ids to bind after the two dates
    fn build_sql(&self) -> (String, Vec<i64>) {
        let (mut sql, date_column, vehicle_column, employee_column) = match self.kind {
            ReportKind::FuelAnalysis => (
                String::from(
                    "SELECT fr.fuel_date, v.vehicle_number, CONCAT(v.make, ' ', v.model) AS vehicle, \
                     e.username AS filled_by, fr.fuel_amount, fr.fuel_cost, \
                     ROUND(fr.fuel_cost / fr.fuel_amount, 2) AS price_per_liter, \
                     fr.odometer_reading, fr.station_name \
                     FROM fuel_records fr \
                     JOIN vehicles v ON fr.vehicle_id = v.id \
                     LEFT JOIN employees e ON fr.employee_id = e.id",
                ),
                "fr.fuel_date",
                "fr.vehicle_id",
                Some("fr.employee_id"),
            ),
            ReportKind::MaintenanceCosts => (
                String::from(
                    "SELECT sm.service_date, v.vehicle_number, CONCAT(v.make, ' ', v.model) AS vehicle, \
                     sm.service_type, sm.description, sm.cost, sm.status, sm.performed_by \
                     FROM service_maintenance sm \
                     JOIN vehicles v ON sm.vehicle_id = v.id",
                ),
                "sm.service_date",
                "sm.vehicle_id",
                None,
            ),
            ReportKind::VehicleAssignments => (
                String::from(
                    "SELECT va.assignment_date, va.return_date, v.vehicle_number, \
                     CONCAT(v.make, ' ', v.model) AS vehicle, e.username AS assigned_to, \
                     ea.username AS assigned_by, va.purpose, va.status, va.mileage_at_assignment, \
                     va.mileage_at_return, (va.mileage_at_return - va.mileage_at_assignment) AS distance \
                     FROM vehicle_assignments va \
                     JOIN vehicles v ON va.vehicle_id = v.id \
                     JOIN employees e ON va.employee_id = e.id \
                     LEFT JOIN employees ea ON va.assigned_by = ea.id",
                ),
                "va.assignment_date",
                "va.vehicle_id",
                Some("va.employee_id"),
            ),
        };

        let mut binds = Vec::new();
        sql.push_str(&format!(" WHERE DATE({}) BETWEEN ? AND ?", date_column));

        if !self.filters.vehicle_ids.is_empty() {
            sql.push_str(&format!(" AND {} IN ({})", vehicle_column, placeholders(self.filters.vehicle_ids.len())));
            binds.extend(&self.filters.vehicle_ids);
        }
        match employee_column {
            Some(column) => {
                if !self.filters.employee_ids.is_empty() {
                    sql.push_str(&format!(" AND {} IN ({})", column, placeholders(self.filters.employee_ids.len())));
                    binds.extend(&self.filters.employee_ids);
                }
                binds.extend(self.scope.restrict(&mut sql, column));
            }
            // Service records belong to vehicles; "own" means vehicles the caller has driven
            None => match self.scope {
                RowScope::All => {}
                RowScope::Own(id) => {
                    sql.push_str(&format!(
                        " AND {} IN (SELECT vehicle_id FROM vehicle_assignments WHERE employee_id = ?)",
                        vehicle_column
                    ));
                    binds.push(id);
                }
                RowScope::Nothing => sql.push_str(" AND 1 = 0"),
            },
        }

        sql.push_str(&format!(" ORDER BY {} DESC", date_column));
        (sql, binds)
    }

    pub async fn fetch(&self, pool: &MySqlPool) -> Result<ReportTable, ReportError> {
        let (sql, binds) = self.build_sql();
        let table = match self.kind {
            ReportKind::FuelAnalysis => {
                let rows: Vec<FuelRow> = fetch_rows(pool, &sql, self, &binds).await?;
                let mut table = ReportTable::new(&[
                    "fuel_date",
                    "vehicle_number",
                    "vehicle",
                    "filled_by",
                    "fuel_amount",
                    "fuel_cost",
                    "price_per_liter",
                    "odometer_reading",
                    "station_name",
                ]);
                for (date, number, vehicle, by, amount, cost, ppl, odometer, station) in rows {
                    table.push(vec![
                        date.into(),
                        number.into(),
                        vehicle.into(),
                        by.into(),
                        amount.into(),
                        cost.into(),
                        ppl.into(),
                        odometer.into(),
                        station.into(),
                    ]);
                }
                table
            }
            ReportKind::MaintenanceCosts => {
                let rows: Vec<MaintenanceRow> = fetch_rows(pool, &sql, self, &binds).await?;
                let mut table = ReportTable::new(&[
                    "service_date",
                    "vehicle_number",
                    "vehicle",
                    "service_type",
                    "description",
                    "cost",
                    "status",
                    "performed_by",
                ]);
                for (date, number, vehicle, kind, description, cost, status, by) in rows {
                    table.push(vec![
                        date.into(),
                        number.into(),
                        vehicle.into(),
                        kind.into(),
                        description.into(),
                        cost.into(),
                        status.into(),
                        by.into(),
                    ]);
                }
                table
            }
            ReportKind::VehicleAssignments => {
                let rows: Vec<AssignmentRow> = fetch_rows(pool, &sql, self, &binds).await?;
                let mut table = ReportTable::new(&[
                    "assignment_date",
                    "return_date",
                    "vehicle_number",
                    "vehicle",
                    "assigned_to",
                    "assigned_by",
                    "purpose",
                    "status",
                    "mileage_at_assignment",
                    "mileage_at_return",
                    "distance",
                ]);
                for (assigned, returned, number, vehicle, to, by, purpose, status, start, end, distance) in rows {
                    table.push(vec![
                        assigned.into(),
                        returned.into(),
                        number.into(),
                        vehicle.into(),
                        to.into(),
                        by.into(),
                        purpose.into(),
                        status.into(),
                        start.into(),
                        end.into(),
                        distance.into(),
                    ]);
                }
                table
            }
        };
        tracing::debug!("{} report: {} rows", self.kind.as_str(), table.len());
        Ok(table)
    }
}

type FuelRow = (
    NaiveDateTime,
    String,
    String,
    Option<String>,
    Decimal,
    Decimal,
    Option<Decimal>,
    Option<i64>,
    Option<String>,
);

type MaintenanceRow = (NaiveDate, String, String, String, Option<String>, Decimal, String, Option<String>);

type AssignmentRow = (
    NaiveDateTime,
    Option<NaiveDateTime>,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    i64,
    Option<i64>,
    Option<i64>,
);

async fn fetch_rows<T>(pool: &MySqlPool, sql: &str, query: &ReportQuery, binds: &[i64]) -> Result<Vec<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let mut q = sqlx::query_as::<_, T>(sql).bind(query.start).bind(query.end);
    for id in binds {
        q = q.bind(*id);
    }
    q.fetch_all(pool).await
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Attachment/download name: spaces become underscores, then a timestamp
pub fn file_name(title: &str, format: ReportFormat, at: NaiveDateTime) -> String {
    format!(
        "{}_{}.{}",
        title.trim().replace(' ', "_"),
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn report_kinds_parse_by_name() {
        assert_eq!("fuel_analysis".parse::<ReportKind>().unwrap(), ReportKind::FuelAnalysis);
        assert!(matches!("payroll".parse::<ReportKind>(), Err(ReportError::InvalidType(_))));
        assert_eq!("pdf".parse::<ReportFormat>().unwrap().extension(), "pdf");
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(matches!(
            ReportQuery::new(ReportKind::FuelAnalysis, day(2024, 5, 2), day(2024, 5, 1)),
            Err(ReportError::InvalidRange)
        ));
    }

    #[test]
    fn filters_and_scope_add_placeholders_in_bind_order() {
        let query = ReportQuery::new(ReportKind::VehicleAssignments, day(2024, 1, 1), day(2024, 1, 31))
            .unwrap()
            .with_filters(ReportFilters {
                vehicle_ids: vec![3, 4],
                employee_ids: vec![9],
            })
            .with_scope(RowScope::Own(9));
        let (sql, binds) = query.build_sql();
        assert!(sql.contains("va.vehicle_id IN (?, ?)"));
        assert!(sql.contains("va.employee_id IN (?)"));
        assert!(sql.contains("AND va.employee_id = ?"));
        assert!(sql.ends_with("ORDER BY va.assignment_date DESC"));
        assert_eq!(binds, vec![3, 4, 9, 9]);
    }

    #[test]
    fn maintenance_own_scope_goes_through_assignments() {
        let query = ReportQuery::new(ReportKind::MaintenanceCosts, day(2024, 1, 1), day(2024, 1, 31))
            .unwrap()
            .with_scope(RowScope::Own(5));
        let (sql, binds) = query.build_sql();
        assert!(sql.contains("SELECT vehicle_id FROM vehicle_assignments WHERE employee_id = ?"));
        assert_eq!(binds, vec![5]);
    }

    #[test]
    fn records_are_keyed_by_column() {
        let mut table = ReportTable::new(&["vehicle_number", "cost"]);
        table.push(vec![Cell::from("KAA 001A".to_string()), Cell::Number(12.5)]);
        let records = table.to_records();
        assert_eq!(records[0]["vehicle_number"], "KAA 001A");
        assert_eq!(records[0]["cost"], 12.5);
    }

    #[test]
    fn file_names_are_timestamped() {
        let at = day(2024, 3, 9).and_hms_opt(8, 5, 0).unwrap();
        assert_eq!(file_name("Weekly Fuel", ReportFormat::Excel, at), "Weekly_Fuel_20240309_080500.xlsx");
        assert_eq!(
            period_label(day(2024, 3, 1), day(2024, 3, 9)),
            "Period: March 01, 2024 - March 09, 2024"
        );
    }
}
