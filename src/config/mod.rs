use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub tenancy: TenancyConfig,
    pub mail: MailConfig,
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// Registry of companies. Never a tenant database.
    pub main_database: String,
    /// Every tenant database name starts with this prefix.
    pub tenant_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    pub main_domain: String,
    pub reserved_subdomains: Vec<String>,
    pub trial_days: i64,
    pub allow_localhost_fallback: bool,
    pub default_max_users: i32,
    pub default_max_vehicles: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    #[serde(skip_serializing)]
    pub smtp_password: String,
    pub sender_email: String,
    pub sender_name: String,
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        !self.smtp_username.is_empty() && !self.smtp_password.is_empty()
    }

    /// Sender address, falling back to the SMTP login.
    pub fn from_address(&self) -> &str {
        if self.sender_email.is_empty() {
            &self.smtp_username
        } else {
            &self.sender_email
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    pub scheduler_enabled: bool,
    /// Hour of day (UTC) at which scheduled reports fire.
    pub send_hour: u32,
    /// Fallback when a tenant has no fuel_price_alert_threshold setting.
    pub fuel_price_alert: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("MAIN_DATABASE_NAME") {
            self.database.main_database = v;
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("MAIN_DOMAIN") {
            self.tenancy.main_domain = v.trim().to_lowercase();
        }
        if let Ok(v) = env::var("TENANT_TRIAL_DAYS") {
            self.tenancy.trial_days = v.parse().unwrap_or(self.tenancy.trial_days);
        }
        if let Ok(v) = env::var("TENANT_ALLOW_LOCALHOST_FALLBACK") {
            self.tenancy.allow_localhost_fallback = v.parse().unwrap_or(self.tenancy.allow_localhost_fallback);
        }

        // Mail overrides
        if let Ok(v) = env::var("SMTP_SERVER") {
            self.mail.smtp_server = v;
        }
        if let Ok(v) = env::var("SMTP_PORT") {
            self.mail.smtp_port = v.parse().unwrap_or(self.mail.smtp_port);
        }
        if let Ok(v) = env::var("SMTP_USERNAME") {
            self.mail.smtp_username = v;
        }
        if let Ok(v) = env::var("SMTP_PASSWORD") {
            self.mail.smtp_password = v;
        }
        if let Ok(v) = env::var("SENDER_EMAIL") {
            self.mail.sender_email = v;
        }
        if let Ok(v) = env::var("SENDER_NAME") {
            self.mail.sender_name = v;
        }

        // Report overrides
        if let Ok(v) = env::var("REPORTS_SCHEDULER_ENABLED") {
            self.reports.scheduler_enabled = v.parse().unwrap_or(self.reports.scheduler_enabled);
        }
        if let Ok(v) = env::var("REPORTS_SEND_HOUR") {
            self.reports.send_hour = v.parse::<u32>().ok().filter(|h| *h < 24).unwrap_or(self.reports.send_hour);
        }

        self
    }

    fn base_tenancy(allow_localhost_fallback: bool) -> TenancyConfig {
        TenancyConfig {
            main_domain: "fleetmanager.local".to_string(),
            reserved_subdomains: ["www", "admin", "api", "app", "dashboard", "support", "help"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trial_days: 30,
            allow_localhost_fallback,
            default_max_users: 5,
            default_max_vehicles: 10,
        }
    }

    fn base_mail() -> MailConfig {
        MailConfig {
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            sender_email: String::new(),
            sender_name: "Fleet Management System".to_string(),
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                main_database: "fleet_saas_main".to_string(),
                tenant_prefix: "fleet_".to_string(),
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                enable_audit_logging: true,
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            tenancy: Self::base_tenancy(true),
            mail: Self::base_mail(),
            reports: ReportsConfig {
                scheduler_enabled: true,
                send_hour: 8,
                fuel_price_alert: 5.0,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                main_database: "fleet_saas_main".to_string(),
                tenant_prefix: "fleet_".to_string(),
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.fleetmanager.local".to_string()],
                enable_audit_logging: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            tenancy: Self::base_tenancy(true),
            mail: Self::base_mail(),
            reports: ReportsConfig {
                scheduler_enabled: true,
                send_hour: 8,
                fuel_price_alert: 5.0,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                main_database: "fleet_saas_main".to_string(),
                tenant_prefix: "fleet_".to_string(),
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.fleetmanager.local".to_string()],
                enable_audit_logging: true,
                // Must come from JWT_SECRET
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
            },
            tenancy: Self::base_tenancy(false),
            mail: Self::base_mail(),
            reports: ReportsConfig {
                scheduler_enabled: true,
                send_hour: 8,
                fuel_price_alert: 5.0,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

// Helper macro for environment checks
#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.tenancy.allow_localhost_fallback);
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.database.main_database, "fleet_saas_main");
        assert_eq!(config.reports.send_hour, 8);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.tenancy.allow_localhost_fallback);
        assert!(config.security.jwt_secret.is_empty());
        assert!(!config.api.enable_request_logging);
    }

    #[test]
    fn reserved_subdomains_cover_platform_hosts() {
        let tenancy = AppConfig::development().tenancy;
        for name in ["www", "admin", "api"] {
            assert!(tenancy.reserved_subdomains.iter().any(|s| s == name));
        }
        assert_eq!(tenancy.main_domain, "fleetmanager.local");
    }

    #[test]
    fn mail_is_unconfigured_without_credentials() {
        let mut mail = AppConfig::development().mail;
        assert!(!mail.is_configured());
        mail.smtp_username = "reports@example.com".into();
        mail.smtp_password = "secret".into();
        assert!(mail.is_configured());
        assert_eq!(mail.from_address(), "reports@example.com");
    }
}
