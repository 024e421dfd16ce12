use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of `service_maintenance`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceRecord {
    pub id: i64,
    pub vehicle_id: i64,
    pub service_type: String,
    pub service_date: NaiveDate,
    pub service_provider: Option<String>,
    pub cost: Decimal,
    pub odometer_reading: Option<i64>,
    pub next_service_date: Option<NaiveDate>,
    pub next_service_mileage: Option<i64>,
    pub description: Option<String>,
    pub parts_replaced: Option<String>,
    pub invoice_path: Option<String>,
    pub status: String,
    pub performed_by: Option<String>,
    pub job_card_id: Option<i64>,
    pub requisition_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}
