use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: i64,
    pub vehicle_number: String,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub vehicle_type: Option<String>,
    pub status: String,
    pub mileage: i64,
    pub last_service_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub added_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const VEHICLE_STATUSES: &[&str] = &["available", "in_use", "maintenance", "inactive"];
