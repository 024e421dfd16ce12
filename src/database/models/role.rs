use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub role_key: String,
    pub role_name: String,
    pub description: Option<String>,
    pub is_system_role: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i64,
    pub permission_key: String,
    pub permission_name: String,
    pub description: Option<String>,
    pub module: String,
}
