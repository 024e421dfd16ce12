use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Assignment joined with vehicle and employee display fields
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: i64,
    pub vehicle_id: i64,
    pub employee_id: i64,
    pub assigned_by: Option<i64>,
    pub assignment_date: NaiveDateTime,
    pub return_date: Option<NaiveDateTime>,
    pub status: String,
    pub mileage_at_assignment: i64,
    pub mileage_at_return: Option<i64>,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub vehicle_number: Option<String>,
    pub employee_username: Option<String>,
}
