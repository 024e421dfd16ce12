use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FuelRecord {
    pub id: i64,
    pub vehicle_id: i64,
    pub employee_id: Option<i64>,
    pub fuel_date: NaiveDateTime,
    pub fuel_amount: Decimal,
    pub fuel_cost: Decimal,
    pub odometer_reading: Option<i64>,
    pub fuel_type: Option<String>,
    pub station_name: Option<String>,
    pub receipt_path: Option<String>,
    pub notes: Option<String>,
    pub vehicle_number: Option<String>,
    pub employee_username: Option<String>,
}
