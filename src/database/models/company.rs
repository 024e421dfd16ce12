use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of `companies` in the main database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub subdomain: String,
    pub custom_domain: Option<String>,
    pub database_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub plan: String,
    pub status: String,
    pub max_users: i32,
    pub max_vehicles: i32,
    pub trial_ends_at: Option<NaiveDateTime>,
    pub subscription_ends_at: Option<NaiveDateTime>,
    pub primary_color: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const COMPANY_COLUMNS: &str = "id, name, subdomain, custom_domain, database_name, email, phone, address, \
     plan, status, max_users, max_vehicles, trial_ends_at, subscription_ends_at, primary_color, \
     created_at, updated_at";
