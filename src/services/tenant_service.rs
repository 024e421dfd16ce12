use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::auth;
use crate::config;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::company::{Company, COMPANY_COLUMNS};
use crate::database::{schema, seed};

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Database manager error: {0}")]
    DatabaseManager(#[from] DatabaseError),
    #[error("Subdomain already exists: {0}")]
    AlreadyExists(String),
    #[error("Company not found: {0}")]
    NotFound(String),
    #[error("Invalid signup: {0:?}")]
    Invalid(HashMap<String, String>),
    #[error("Password hashing failed: {0}")]
    Password(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub company_name: String,
    pub subdomain: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub admin_username: String,
    #[serde(default)]
    pub admin_email: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupOutcome {
    pub company: Company,
    pub admin_employee_id: i64,
    pub admin_employee_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubdomainCheck {
    pub subdomain: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Fields an operator may change on a company
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyUpdate {
    pub status: Option<String>,
    pub plan: Option<String>,
    pub max_users: Option<i32>,
    pub max_vehicles: Option<i32>,
    pub custom_domain: Option<String>,
    pub subscription_ends_at: Option<NaiveDateTime>,
}

/// A concurrent signup that wins the unique key on subdomain surfaces as `AlreadyExists`
fn subdomain_taken_or(err: sqlx::Error, subdomain: &str) -> TenantError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => TenantError::AlreadyExists(subdomain.to_string()),
        _ => TenantError::Database(err),
    }
}

pub const COMPANY_STATUSES: &[&str] = &["active", "suspended", "trial", "expired"];
pub const COMPANY_PLANS: &[&str] = &["trial", "basic", "professional", "enterprise"];

/// `fleet_` + subdomain, with hyphens made identifier-safe
pub fn database_name_for(subdomain: &str) -> String {
    format!(
        "{}{}",
        config::config().database.tenant_prefix,
        subdomain.to_lowercase().replace('-', "_")
    )
}

pub fn validate_subdomain(subdomain: &str, reserved: &[String]) -> Result<(), String> {
    if subdomain.len() < 3 {
        return Err("Subdomain must be at least 3 characters".to_string());
    }
    if subdomain.len() > 50 {
        return Err("Subdomain must be at most 50 characters".to_string());
    }
    if !subdomain.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err("Subdomain can only contain lowercase letters, numbers, and hyphens".to_string());
    }
    if subdomain.starts_with('-') || subdomain.ends_with('-') {
        return Err("Subdomain cannot start or end with a hyphen".to_string());
    }
    if reserved.iter().any(|r| r == subdomain) {
        return Err("This subdomain is reserved".to_string());
    }
    Ok(())
}

/// Every problem with a signup form, keyed by field
pub fn validate_signup(req: &SignupRequest, reserved: &[String]) -> Result<(), HashMap<String, String>> {
    let mut errors = HashMap::new();

    if req.company_name.trim().len() < 3 {
        errors.insert("company_name".into(), "Company name must be at least 3 characters".into());
    }
    if let Err(msg) = validate_subdomain(req.subdomain.trim(), reserved) {
        errors.insert("subdomain".into(), msg);
    }
    if !req.email.contains('@') {
        errors.insert("email".into(), "Valid email is required".into());
    }
    if req.admin_username.trim().len() < 3 {
        errors.insert("admin_username".into(), "Username must be at least 3 characters".into());
    }
    if req.password.len() < 6 {
        errors.insert("password".into(), "Password must be at least 6 characters".into());
    } else if req.password != req.confirm_password {
        errors.insert("confirm_password".into(), "Passwords do not match".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Operations on the companies registry
pub struct TenantService {
    main_pool: MySqlPool,
}

impl TenantService {
    pub async fn new() -> Result<Self, TenantError> {
        let main_pool = DatabaseManager::main_pool().await?;
        Ok(Self { main_pool })
    }

    pub async fn check_subdomain(&self, subdomain: &str) -> Result<SubdomainCheck, TenantError> {
        let subdomain = subdomain.trim().to_lowercase();
        let reserved = &config::config().tenancy.reserved_subdomains;

        if let Err(reason) = validate_subdomain(&subdomain, reserved) {
            return Ok(SubdomainCheck { subdomain, available: false, reason: Some(reason) });
        }

        let taken = self.subdomain_exists(&subdomain).await?;
        Ok(SubdomainCheck {
            reason: taken.then(|| "Subdomain is already taken".to_string()),
            available: !taken,
            subdomain,
        })
    }

    async fn subdomain_exists(&self, subdomain: &str) -> Result<bool, TenantError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM companies WHERE subdomain = ?")
            .bind(subdomain)
            .fetch_one(&self.main_pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Register a company and build its database. Undone on any failure.
    pub async fn signup(&self, req: &SignupRequest) -> Result<SignupOutcome, TenantError> {
        let tenancy = &config::config().tenancy;
        validate_signup(req, &tenancy.reserved_subdomains).map_err(TenantError::Invalid)?;

        let subdomain = req.subdomain.trim().to_lowercase();
        if self.subdomain_exists(&subdomain).await? {
            return Err(TenantError::AlreadyExists(subdomain));
        }

        let database_name = database_name_for(&subdomain);
        let trial_ends_at = Utc::now().naive_utc() + Duration::days(tenancy.trial_days);

        let result = sqlx::query(
            r#"
            INSERT INTO companies
                (name, subdomain, database_name, email, phone, address, plan, status,
                 max_users, max_vehicles, trial_ends_at)
            VALUES (?, ?, ?, ?, ?, ?, 'trial', 'trial', ?, ?, ?)
            "#,
        )
        .bind(req.company_name.trim())
        .bind(&subdomain)
        .bind(&database_name)
        .bind(req.email.trim())
        .bind(&req.phone)
        .bind(&req.address)
        .bind(tenancy.default_max_users)
        .bind(tenancy.default_max_vehicles)
        .bind(trial_ends_at)
        .execute(&self.main_pool)
        .await
        .map_err(|e| subdomain_taken_or(e, &subdomain))?;
        let company_id = result.last_insert_id() as i64;

        info!("Registered company '{}' (id {}), provisioning {}", subdomain, company_id, database_name);

        match self.provision(company_id, &database_name, req).await {
            Ok((admin_employee_id, admin_employee_code)) => {
                let company = self
                    .get_company(company_id)
                    .await?
                    .ok_or_else(|| TenantError::NotFound(subdomain.clone()))?;
                info!("Company '{}' provisioned", subdomain);
                Ok(SignupOutcome { company, admin_employee_id, admin_employee_code })
            }
            Err(e) => {
                error!("Provisioning '{}' failed, rolling back: {}", subdomain, e);
                self.rollback(company_id, &database_name).await;
                Err(e)
            }
        }
    }

    async fn provision(
        &self,
        company_id: i64,
        database_name: &str,
        req: &SignupRequest,
    ) -> Result<(i64, String), TenantError> {
        DatabaseManager::create_database(database_name).await?;
        let pool = DatabaseManager::tenant_pool(database_name).await?;

        schema::apply_tenant_schema(&pool).await?;
        seed::seed_tenant(&pool).await?;

        for (key, value) in [
            ("company_name", req.company_name.trim()),
            ("company_email", req.email.trim()),
            ("company_phone", req.phone.as_deref().unwrap_or_default()),
            ("company_address", req.address.as_deref().unwrap_or_default()),
        ] {
            sqlx::query("UPDATE tenant_settings SET setting_value = ? WHERE setting_key = ?")
                .bind(value)
                .bind(key)
                .execute(&pool)
                .await?;
        }

        let password_hash = auth::hash_password(&req.password).map_err(TenantError::Password)?;
        let employee_code = auth::new_employee_code();
        let admin_email = req.admin_email.as_deref().unwrap_or(req.email.as_str()).trim().to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO employees (employee_id, username, email, password_hash, full_name, position, role, status)
            VALUES (?, ?, ?, ?, ?, 'Administrator', 'admin', 'active')
            "#,
        )
        .bind(&employee_code)
        .bind(req.admin_username.trim())
        .bind(&admin_email)
        .bind(&password_hash)
        .bind(req.admin_username.trim())
        .execute(&pool)
        .await?;
        let employee_id = result.last_insert_id() as i64;

        sqlx::query(
            r#"
            INSERT INTO tenant_users (company_id, employee_id, username, role, is_owner, is_active)
            VALUES (?, ?, ?, 'admin', TRUE, TRUE)
            "#,
        )
        .bind(company_id)
        .bind(employee_id)
        .bind(req.admin_username.trim())
        .execute(&self.main_pool)
        .await?;

        Ok((employee_id, employee_code))
    }

    async fn rollback(&self, company_id: i64, database_name: &str) {
        if let Err(e) = sqlx::query("DELETE FROM companies WHERE id = ?")
            .bind(company_id)
            .execute(&self.main_pool)
            .await
        {
            warn!("Rollback: failed to delete company {}: {}", company_id, e);
        }
        if let Err(e) = DatabaseManager::drop_database(database_name).await {
            warn!("Rollback: failed to drop {}: {}", database_name, e);
        }
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>, TenantError> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies ORDER BY created_at DESC",
            COMPANY_COLUMNS
        ))
        .fetch_all(&self.main_pool)
        .await?;
        Ok(companies)
    }

    pub async fn get_company(&self, id: i64) -> Result<Option<Company>, TenantError> {
        Ok(crate::tenant::find_by_id(&self.main_pool, id).await?)
    }

    pub async fn get_by_subdomain(&self, subdomain: &str) -> Result<Company, TenantError> {
        sqlx::query_as::<_, Company>(&format!("SELECT {} FROM companies WHERE subdomain = ?", COMPANY_COLUMNS))
            .bind(subdomain)
            .fetch_optional(&self.main_pool)
            .await?
            .ok_or_else(|| TenantError::NotFound(subdomain.to_string()))
    }

    /// Companies whose databases should be served and scheduled
    pub async fn usable_companies(&self) -> Result<Vec<Company>, TenantError> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE status IN ('active', 'trial') ORDER BY id",
            COMPANY_COLUMNS
        ))
        .fetch_all(&self.main_pool)
        .await?;
        Ok(companies)
    }

    pub async fn update_company(&self, id: i64, update: &CompanyUpdate) -> Result<Company, TenantError> {
        let mut errors = HashMap::new();
        if let Some(status) = &update.status {
            if !COMPANY_STATUSES.contains(&status.as_str()) {
                errors.insert("status".to_string(), format!("Unknown status '{}'", status));
            }
        }
        if let Some(plan) = &update.plan {
            if !COMPANY_PLANS.contains(&plan.as_str()) {
                errors.insert("plan".to_string(), format!("Unknown plan '{}'", plan));
            }
        }
        if update.max_users.is_some_and(|n| n < 1) {
            errors.insert("max_users".to_string(), "Must be at least 1".to_string());
        }
        if update.max_vehicles.is_some_and(|n| n < 1) {
            errors.insert("max_vehicles".to_string(), "Must be at least 1".to_string());
        }
        if !errors.is_empty() {
            return Err(TenantError::Invalid(errors));
        }

        let result = sqlx::query(
            r#"
            UPDATE companies SET
                status = COALESCE(?, status),
                plan = COALESCE(?, plan),
                max_users = COALESCE(?, max_users),
                max_vehicles = COALESCE(?, max_vehicles),
                custom_domain = COALESCE(?, custom_domain),
                subscription_ends_at = COALESCE(?, subscription_ends_at)
            WHERE id = ?
            "#,
        )
        .bind(&update.status)
        .bind(&update.plan)
        .bind(update.max_users)
        .bind(update.max_vehicles)
        .bind(update.custom_domain.as_deref().map(str::to_lowercase))
        .bind(update.subscription_ends_at)
        .bind(id)
        .execute(&self.main_pool)
        .await?;

        if result.rows_affected() == 0 && self.get_company(id).await?.is_none() {
            return Err(TenantError::NotFound(id.to_string()));
        }

        info!("Company {} updated: {:?}", id, update);
        let company = self.get_company(id).await?.ok_or_else(|| TenantError::NotFound(id.to_string()))?;
        if update.status.is_some() || update.subscription_ends_at.is_some() {
            crate::scheduler::refresh_company(&company).await;
        }
        Ok(company)
    }

    /// Apply the current schema and seed to every registered tenant database.
    /// One failing tenant does not stop the others.
    pub async fn migrate_all(&self) -> Result<Vec<(String, Result<(), String>)>, TenantError> {
        let mut outcomes = Vec::new();
        for company in self.list_companies().await? {
            let outcome = migrate_one(&company.database_name).await.map_err(|e| e.to_string());
            if let Err(e) = &outcome {
                warn!("Migration of {} failed: {}", company.database_name, e);
            }
            outcomes.push((company.subdomain, outcome));
        }
        Ok(outcomes)
    }
}

async fn migrate_one(database_name: &str) -> Result<(), TenantError> {
    let pool = DatabaseManager::tenant_pool(database_name).await?;
    schema::apply_tenant_schema(&pool).await?;
    seed::seed_tenant(&pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_key_failures_stay_database_errors() {
        assert!(matches!(
            subdomain_taken_or(sqlx::Error::RowNotFound, "acme"),
            TenantError::Database(_)
        ));
    }

    fn reserved() -> Vec<String> {
        config::config().tenancy.reserved_subdomains.clone()
    }

    fn request() -> SignupRequest {
        SignupRequest {
            company_name: "Acme Logistics".into(),
            subdomain: "acme-logistics".into(),
            email: "ops@acme.test".into(),
            phone: None,
            address: None,
            admin_username: "admin".into(),
            admin_email: None,
            password: "hunter22".into(),
            confirm_password: "hunter22".into(),
        }
    }

    #[test]
    fn database_name_replaces_hyphens() {
        assert_eq!(database_name_for("Acme-Logistics"), "fleet_acme_logistics");
        assert!(DatabaseManager::is_valid_db_name(&database_name_for("acme-logistics")));
    }

    #[test]
    fn valid_signup_passes() {
        assert!(validate_signup(&request(), &reserved()).is_ok());
    }

    #[test]
    fn signup_collects_every_field_error() {
        let mut req = request();
        req.company_name = "Ac".into();
        req.subdomain = "admin".into();
        req.email = "nope".into();
        req.admin_username = "jo".into();
        req.confirm_password = "different".into();

        let errors = validate_signup(&req, &reserved()).unwrap_err();
        assert_eq!(errors["subdomain"], "This subdomain is reserved");
        assert!(errors.contains_key("company_name"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("admin_username"));
        assert_eq!(errors["confirm_password"], "Passwords do not match");
    }

    #[test]
    fn subdomain_charset_is_enforced() {
        let reserved = reserved();
        assert!(validate_subdomain("acme_co", &reserved).is_err());
        assert!(validate_subdomain("Acme", &reserved).is_err());
        assert!(validate_subdomain("-acme", &reserved).is_err());
        assert!(validate_subdomain("ab", &reserved).is_err());
        assert!(validate_subdomain("acme-2", &reserved).is_ok());
    }
}
