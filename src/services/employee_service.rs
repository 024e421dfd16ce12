use serde::Deserialize;
use sqlx::MySqlPool;
use std::collections::HashMap;

use super::{check_fields, conflict_on_duplicate, ServiceError, ServiceResult};
use crate::auth;
use crate::database::models::employee::Employee;

#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
    pub employee_id: Option<String>,
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub phone: Option<String>,
    /// Resets the password when present
    pub password: Option<String>,
}

pub const EMPLOYEE_STATUSES: &[&str] = &["active", "inactive", "suspended"];

const SELECT: &str = "SELECT id, employee_id, username, email, password_hash, full_name, department, position, \
     role, status, phone, created_at, updated_at FROM employees";

fn validate_new(input: &NewEmployee) -> ServiceResult<()> {
    let mut errors = HashMap::new();
    if input.username.trim().len() < 3 {
        errors.insert("username".to_string(), "Username must be at least 3 characters".to_string());
    }
    if !input.email.contains('@') {
        errors.insert("email".to_string(), "Valid email is required".to_string());
    }
    if input.password.len() < 6 {
        errors.insert("password".to_string(), "Password must be at least 6 characters".to_string());
    }
    check_fields(errors)
}

pub struct EmployeeService {
    pool: MySqlPool,
}

impl EmployeeService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Employee>> {
        Ok(sqlx::query_as::<_, Employee>(&format!("{} ORDER BY username", SELECT))
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Employee> {
        sqlx::query_as::<_, Employee>(&format!("{} WHERE id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Employee"))
    }

    pub async fn find_by_username(&self, username: &str) -> ServiceResult<Option<Employee>> {
        Ok(sqlx::query_as::<_, Employee>(&format!("{} WHERE username = ?", SELECT))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn role_exists(&self, role_key: &str) -> ServiceResult<bool> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles WHERE role_key = ?")
            .bind(role_key)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    pub async fn create(&self, input: &NewEmployee, max_users: i32) -> ServiceResult<Employee> {
        validate_new(input)?;

        let role = input.role.as_deref().unwrap_or("employee");
        if !self.role_exists(role).await? {
            return Err(ServiceError::field("role", format!("Unknown role '{}'", role)));
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM employees WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await?;
        if count >= i64::from(max_users) {
            return Err(ServiceError::LimitReached(format!(
                "User limit reached ({}). Upgrade your plan to add more employees.",
                max_users
            )));
        }

        let password_hash = auth::hash_password(&input.password).map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            ServiceError::invalid("Password could not be processed")
        })?;
        let code = input
            .employee_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(auth::new_employee_code);

        let result = sqlx::query(
            r#"
            INSERT INTO employees (employee_id, username, email, password_hash, full_name, department, position, role, phone)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code)
        .bind(input.username.trim())
        .bind(input.email.trim())
        .bind(&password_hash)
        .bind(&input.full_name)
        .bind(&input.department)
        .bind(&input.position)
        .bind(role)
        .bind(&input.phone)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Username, email or employee ID already exists"))?;

        self.get(result.last_insert_id() as i64).await
    }

    pub async fn update(&self, id: i64, input: &EmployeeUpdate) -> ServiceResult<Employee> {
        if let Some(status) = &input.status {
            if !EMPLOYEE_STATUSES.contains(&status.as_str()) {
                return Err(ServiceError::field("status", format!("Unknown status '{}'", status)));
            }
        }
        if let Some(role) = &input.role {
            if !self.role_exists(role).await? {
                return Err(ServiceError::field("role", format!("Unknown role '{}'", role)));
            }
        }
        let password_hash = match &input.password {
            Some(p) if p.len() < 6 => {
                return Err(ServiceError::field("password", "Password must be at least 6 characters"))
            }
            Some(p) => Some(auth::hash_password(p).map_err(|e| {
                tracing::error!("Password hashing failed: {}", e);
                ServiceError::invalid("Password could not be processed")
            })?),
            None => None,
        };
        self.get(id).await?;

        sqlx::query(
            r#"
            UPDATE employees SET
                email = COALESCE(?, email),
                full_name = COALESCE(?, full_name),
                department = COALESCE(?, department),
                position = COALESCE(?, position),
                role = COALESCE(?, role),
                status = COALESCE(?, status),
                phone = COALESCE(?, phone),
                password_hash = COALESCE(?, password_hash)
            WHERE id = ?
            "#,
        )
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(&input.department)
        .bind(&input.position)
        .bind(&input.role)
        .bind(&input.status)
        .bind(&input.phone)
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Email already exists"))?;

        self.get(id).await
    }

    pub async fn delete(&self, id: i64, acting_employee: i64) -> ServiceResult<()> {
        if id == acting_employee {
            return Err(ServiceError::invalid("You cannot delete your own account"));
        }
        let (active,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM vehicle_assignments WHERE employee_id = ? AND status = 'active'")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if active > 0 {
            return Err(ServiceError::invalid("Employee has an active vehicle assignment"));
        }

        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Employee"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_employee_validation_is_per_field() {
        let input = NewEmployee {
            employee_id: None,
            username: "al".into(),
            email: "al.example.com".into(),
            password: "123".into(),
            full_name: None,
            department: None,
            position: None,
            role: None,
            phone: None,
        };
        match validate_new(&input) {
            Err(ServiceError::Fields(f)) => {
                assert_eq!(f.len(), 3);
                assert!(f.contains_key("password"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
