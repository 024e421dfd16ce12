// Default roles, permissions and settings for a tenant database.
// Every statement upserts, so re-running against an existing tenant is safe.

use sqlx::MySqlPool;
use tracing::info;

use crate::permissions::catalog::{DEFAULT_PERMISSIONS, DEFAULT_ROLES};

pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("company_name", ""),
    ("company_email", ""),
    ("company_phone", ""),
    ("company_address", ""),
    ("default_fuel_consumption_threshold", "18"),
    ("fuel_price_alert_threshold", "5.0"),
    ("currency", "USD"),
    ("date_format", "Y-m-d"),
    ("timezone", "UTC"),
    ("email_notifications", "1"),
];

pub async fn seed_tenant(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for &(key, name, description, module) in DEFAULT_PERMISSIONS {
        sqlx::query(
            r#"
            INSERT INTO permissions (permission_key, permission_name, description, module)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                permission_name = VALUES(permission_name),
                description = VALUES(description),
                module = VALUES(module)
            "#,
        )
        .bind(key)
        .bind(name)
        .bind(description)
        .bind(module)
        .execute(&mut *tx)
        .await?;
    }

    for role in DEFAULT_ROLES {
        sqlx::query(
            r#"
            INSERT INTO roles (role_key, role_name, description, is_system_role)
            VALUES (?, ?, ?, TRUE)
            ON DUPLICATE KEY UPDATE
                role_name = VALUES(role_name),
                description = VALUES(description)
            "#,
        )
        .bind(role.key)
        .bind(role.name)
        .bind(role.description)
        .execute(&mut *tx)
        .await?;

        let (role_id,): (i64,) = sqlx::query_as("SELECT id FROM roles WHERE role_key = ?")
            .bind(role.key)
            .fetch_one(&mut *tx)
            .await?;

        let grants: Vec<&str> = match role.permissions {
            Some(keys) => keys.to_vec(),
            None => DEFAULT_PERMISSIONS.iter().map(|(k, ..)| *k).collect(),
        };

        for key in grants {
            sqlx::query(
                r#"
                INSERT IGNORE INTO role_permissions (role_id, permission_id)
                SELECT ?, id FROM permissions WHERE permission_key = ?
                "#,
            )
            .bind(role_id)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        }
    }

    for &(key, value) in DEFAULT_SETTINGS {
        sqlx::query("INSERT IGNORE INTO tenant_settings (setting_key, setting_value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!(
        "Seeded {} permissions, {} roles, {} settings",
        DEFAULT_PERMISSIONS.len(),
        DEFAULT_ROLES.len(),
        DEFAULT_SETTINGS.len()
    );
    Ok(())
}
