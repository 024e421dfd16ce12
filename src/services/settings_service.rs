use std::collections::BTreeMap;

use sqlx::MySqlPool;

use super::{ServiceError, ServiceResult};

pub struct SettingsService {
    pool: MySqlPool,
}

impl SettingsService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn all(&self) -> ServiceResult<BTreeMap<String, String>> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT setting_key, setting_value FROM tenant_settings ORDER BY setting_key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(k, v)| (k, v.unwrap_or_default())).collect())
    }

    pub async fn get(&self, key: &str) -> ServiceResult<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT setting_value FROM tenant_settings WHERE setting_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(v,)| v))
    }

    /// Numeric setting, `default` when missing or unparsable
    pub async fn get_f64(&self, key: &str, default: f64) -> ServiceResult<f64> {
        Ok(self
            .get(key)
            .await?
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(default))
    }

    pub async fn upsert_many(&self, values: &BTreeMap<String, String>) -> ServiceResult<usize> {
        if let Some(key) = values.keys().find(|k| !valid_key(k)) {
            return Err(ServiceError::field(key, "Invalid setting key"));
        }

        let mut tx = self.pool.begin().await?;
        for (key, value) in values {
            sqlx::query(
                "INSERT INTO tenant_settings (setting_key, setting_value) VALUES (?, ?) \
                 ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value)",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(values.len())
    }
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 100 && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_keys_are_snake_case() {
        assert!(valid_key("fuel_price_alert_threshold"));
        assert!(!valid_key(""));
        assert!(!valid_key("Company Name"));
        assert!(!valid_key("key;drop"));
    }
}
