use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};

use super::{conflict_on_duplicate, ServiceError, ServiceResult};
use crate::database::models::role::{Permission, Role};
use crate::permissions::catalog::is_known_permission;

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub role_key: String,
    pub role_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleUpdate {
    pub role_name: Option<String>,
    pub description: Option<String>,
    /// Replaces every grant when present
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoleSummary {
    pub id: i64,
    pub role_key: String,
    pub role_name: String,
    pub description: Option<String>,
    pub is_system_role: bool,
    pub permission_count: i64,
    pub employee_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}

fn valid_role_key(key: &str) -> bool {
    key.len() >= 3 && key.len() <= 50 && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn check_grants(keys: &[String]) -> ServiceResult<()> {
    match keys.iter().find(|k| !is_known_permission(k)) {
        Some(unknown) => Err(ServiceError::field("permissions", format!("Unknown permission '{}'", unknown))),
        None => Ok(()),
    }
}

pub struct RoleService {
    pool: MySqlPool,
}

impl RoleService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> ServiceResult<Vec<RoleSummary>> {
        Ok(sqlx::query_as::<_, RoleSummary>(
            r#"
            SELECT r.id, r.role_key, r.role_name, r.description, r.is_system_role,
                   (SELECT COUNT(*) FROM role_permissions rp WHERE rp.role_id = r.id) AS permission_count,
                   (SELECT COUNT(*) FROM employees e WHERE e.role = r.role_key) AS employee_count
            FROM roles r
            ORDER BY r.is_system_role DESC, r.role_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<RoleDetail> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, role_key, role_name, description, is_system_role FROM roles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Role"))?;

        let keys: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT p.permission_key FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = ?
            ORDER BY p.permission_key
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(RoleDetail {
            role,
            permissions: keys.into_iter().map(|(k,)| k).collect(),
        })
    }

    pub async fn create(&self, input: &NewRole) -> ServiceResult<RoleDetail> {
        if !valid_role_key(&input.role_key) {
            return Err(ServiceError::field(
                "role_key",
                "Role key must be 3-50 characters of lowercase letters, digits and underscores",
            ));
        }
        if input.role_name.trim().is_empty() {
            return Err(ServiceError::field("role_name", "Role name is required"));
        }
        check_grants(&input.permissions)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT INTO roles (role_key, role_name, description, is_system_role) VALUES (?, ?, ?, FALSE)")
            .bind(&input.role_key)
            .bind(input.role_name.trim())
            .bind(&input.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_duplicate(e, format!("Role '{}' already exists", input.role_key)))?;
        let id = result.last_insert_id() as i64;

        replace_grants(&mut tx, id, &input.permissions).await?;
        tx.commit().await?;
        self.get(id).await
    }

    pub async fn update(&self, id: i64, input: &RoleUpdate) -> ServiceResult<RoleDetail> {
        if let Some(keys) = &input.permissions {
            check_grants(keys)?;
        }
        self.get(id).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE roles SET role_name = COALESCE(?, role_name), description = COALESCE(?, description) WHERE id = ?")
            .bind(&input.role_name)
            .bind(&input.description)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if let Some(keys) = &input.permissions {
            replace_grants(&mut tx, id, keys).await?;
        }
        tx.commit().await?;
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let detail = self.get(id).await?;
        if detail.role.is_system_role {
            return Err(ServiceError::invalid("System roles cannot be deleted"));
        }
        let (assigned,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM employees WHERE role = ?")
            .bind(&detail.role.role_key)
            .fetch_one(&self.pool)
            .await?;
        if assigned > 0 {
            return Err(ServiceError::invalid(format!(
                "Cannot delete role: {} employee(s) are assigned to it",
                assigned
            )));
        }

        sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The permission catalog grouped by module
    pub async fn catalog(&self) -> ServiceResult<BTreeMap<String, Vec<Permission>>> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT id, permission_key, permission_name, description, module FROM permissions ORDER BY module, permission_name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
        for p in permissions {
            grouped.entry(p.module.clone()).or_default().push(p);
        }
        Ok(grouped)
    }
}

async fn replace_grants(tx: &mut Transaction<'_, MySql>, role_id: i64, keys: &[String]) -> ServiceResult<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;
    for key in keys {
        sqlx::query(
            "INSERT IGNORE INTO role_permissions (role_id, permission_id) \
             SELECT ?, id FROM permissions WHERE permission_key = ?",
        )
        .bind(role_id)
        .bind(key)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_keys_are_lower_snake() {
        assert!(valid_role_key("fleet_lead"));
        assert!(!valid_role_key("ab"));
        assert!(!valid_role_key("Fleet Lead"));
    }

    #[test]
    fn grants_must_exist_in_catalog() {
        assert!(check_grants(&["view_vehicles".to_string()]).is_ok());
        assert!(matches!(
            check_grants(&["launch_rockets".to_string()]),
            Err(ServiceError::Fields(_))
        ));
    }
}
