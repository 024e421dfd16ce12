use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of `service_requisitions`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Requisition {
    pub id: i64,
    pub requisition_number: String,
    pub date_requested: NaiveDateTime,
    pub vehicle_id: i64,
    pub vehicle_reg_number: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub current_mileage: Option<i64>,
    pub work_description: String,
    pub requested_by: i64,
    pub service_history: Option<String>,
    pub line_manager_id: Option<i64>,
    pub line_manager_status: String,
    pub line_manager_comments: Option<String>,
    pub line_manager_reviewed_at: Option<NaiveDateTime>,
    pub director_id: Option<i64>,
    pub director_status: String,
    pub director_comments: Option<String>,
    pub director_approved_at: Option<NaiveDateTime>,
    pub overall_status: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
