use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobCard {
    pub id: i64,
    pub job_card_number: String,
    pub vehicle_id: i64,
    pub requisition_id: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub date_in: NaiveDateTime,
    pub expected_completion: Option<NaiveDateTime>,
    pub date_out: Option<NaiveDateTime>,
    pub odometer_in: Option<i64>,
    pub odometer_out: Option<i64>,
    pub fuel_level: Option<String>,
    pub reported_issues: Option<String>,
    pub diagnosis: Option<String>,
    pub recommended_services: Option<String>,
    pub assigned_technician: Option<String>,
    pub status: String,
    pub priority: String,
    pub total_cost: Decimal,
    pub labor_cost: Decimal,
    pub parts_cost: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobCardItem {
    pub id: i64,
    pub job_card_id: i64,
    /// "part" or "labor"
    pub item_type: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub status: String,
    pub notes: Option<String>,
}

pub const JOB_CARD_STATUSES: &[&str] = &["open", "in_progress", "waiting_parts", "completed", "cancelled"];
pub const JOB_CARD_PRIORITIES: &[&str] = &["low", "normal", "high", "urgent"];
