pub mod catalog;

use serde::Serialize;
use sqlx::MySqlPool;
use std::collections::BTreeSet;

use crate::error::ApiError;

/// Permission keys granted to one role in one tenant.
///
/// Loaded once per request by the user-validation middleware and shared by
/// every check the handlers of that request make.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionSet {
    role: String,
    keys: BTreeSet<String>,
}

impl PermissionSet {
    pub fn new(role: impl Into<String>, keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            role: role.into(),
            keys: keys.into_iter().collect(),
        }
    }

    /// Set used when the role tables cannot be read
    pub fn fallback(role: &str) -> Self {
        let keys = if role == "employee" {
            vec!["view_dashboard".to_string()]
        } else {
            Vec::new()
        };
        Self::new(role, keys)
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn has(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has(k))
    }

    pub fn require(&self, key: &str) -> Result<(), ApiError> {
        if self.has(key) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Permission denied: {}", key)))
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Which report rows the holder may see
    pub fn report_scope(&self, employee_id: i64) -> RowScope {
        if self.has_any(&["view_all_reports", "view_team_reports"]) {
            RowScope::All
        } else if self.has("view_own_reports") {
            RowScope::Own(employee_id)
        } else {
            RowScope::Nothing
        }
    }

    /// Row scope for a listing gated by an "all" and an "own" permission
    pub fn listing_scope(&self, all: &str, own: &str, employee_id: i64) -> Option<RowScope> {
        if self.has(all) {
            Some(RowScope::All)
        } else if self.has(own) {
            Some(RowScope::Own(employee_id))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowScope {
    All,
    Own(i64),
    Nothing,
}

impl RowScope {
    /// Append the scope to a WHERE clause that is already open.
    /// Returns the employee id to bind, if any.
    pub fn restrict(&self, sql: &mut String, column: &str) -> Option<i64> {
        match self {
            RowScope::All => None,
            RowScope::Own(id) => {
                sql.push_str(&format!(" AND {} = ?", column));
                Some(*id)
            }
            RowScope::Nothing => {
                sql.push_str(" AND 1 = 0");
                None
            }
        }
    }
}

/// Load the permission keys granted to `role_key`.
pub async fn load_permissions(pool: &MySqlPool, role_key: &str) -> Result<PermissionSet, sqlx::Error> {
    let keys: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT p.permission_key
        FROM permissions p
        INNER JOIN role_permissions rp ON p.id = rp.permission_id
        INNER JOIN roles r ON r.id = rp.role_id
        WHERE r.role_key = ?
        "#,
    )
    .bind(role_key)
    .fetch_all(pool)
    .await?;

    Ok(PermissionSet::new(role_key, keys.into_iter().map(|(k,)| k)))
}

/// Like `load_permissions`, but never fails: lookup errors degrade to the
/// fallback set.
pub async fn load_permissions_or_fallback(pool: &MySqlPool, role_key: &str) -> PermissionSet {
    match load_permissions(pool, role_key).await {
        Ok(set) => set,
        Err(e) => {
            tracing::error!("Error fetching permissions for role '{}': {}", role_key, e);
            PermissionSet::fallback(role_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> PermissionSet {
        PermissionSet::new("custom", keys.iter().map(|k| k.to_string()))
    }

    #[test]
    fn fallback_only_grants_employees_the_dashboard() {
        assert!(PermissionSet::fallback("employee").has("view_dashboard"));
        assert!(PermissionSet::fallback("manager").is_empty());
    }

    #[test]
    fn require_reports_missing_key() {
        let perms = set(&["view_vehicles"]);
        assert!(perms.require("view_vehicles").is_ok());
        let err = perms.require("add_vehicle").unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(err.message().contains("add_vehicle"));
    }

    #[test]
    fn report_scope_follows_strongest_grant() {
        assert_eq!(set(&["view_all_reports", "view_own_reports"]).report_scope(7), RowScope::All);
        assert_eq!(set(&["view_team_reports"]).report_scope(7), RowScope::All);
        assert_eq!(set(&["view_own_reports"]).report_scope(7), RowScope::Own(7));
        assert_eq!(set(&[]).report_scope(7), RowScope::Nothing);
    }

    #[test]
    fn restrict_appends_scope_condition() {
        let mut sql = "SELECT * FROM fuel_records WHERE 1 = 1".to_string();
        assert_eq!(RowScope::Own(3).restrict(&mut sql, "employee_id"), Some(3));
        assert!(sql.ends_with(" AND employee_id = ?"));

        let mut sql = "SELECT * FROM fuel_records WHERE 1 = 1".to_string();
        assert_eq!(RowScope::Nothing.restrict(&mut sql, "employee_id"), None);
        assert!(sql.ends_with(" AND 1 = 0"));
    }

    #[test]
    fn listing_scope_requires_one_of_the_grants() {
        let perms = set(&["view_own_fuel_records"]);
        assert_eq!(
            perms.listing_scope("view_all_fuel_records", "view_own_fuel_records", 9),
            Some(RowScope::Own(9))
        );
        assert_eq!(set(&[]).listing_scope("a", "b", 9), None);
    }
}
