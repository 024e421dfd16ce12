// Company resolution from the request host, plus the account-standing rules
// applied to every resolved company.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::MySqlPool;

use crate::database::models::company::{Company, COMPANY_COLUMNS};

/// How a Host header identifies a company
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostLookup {
    /// `acme.fleetmanager.local` → "acme"
    Subdomain(String),
    /// Any other host, matched against `companies.custom_domain`
    CustomDomain(String),
    /// localhost / 127.0.0.1
    Local,
}

impl HostLookup {
    pub fn from_host(host: &str, main_domain: &str) -> Option<Self> {
        let host = strip_port(host).trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }
        if host == "localhost" || host == "127.0.0.1" {
            return Some(HostLookup::Local);
        }

        let main_domain = main_domain.to_ascii_lowercase();
        let labels: Vec<&str> = host.split('.').collect();
        // Only a single label directly under the main domain names a company
        if labels.len() >= 2 && labels[1..].join(".") == main_domain {
            let sub = labels[0];
            // www.<main domain> is the marketing site, never a company
            if sub == "www" {
                return None;
            }
            return Some(HostLookup::Subdomain(sub.to_string()));
        }
        if host == main_domain {
            return None;
        }

        Some(HostLookup::CustomDomain(host))
    }
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their brackets; ports only follow the closing one
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Company stored in request extensions once resolved
#[derive(Debug, Clone, Serialize)]
pub struct CompanyContext {
    pub id: i64,
    pub name: String,
    pub subdomain: String,
    pub database_name: String,
    pub plan: String,
    pub status: String,
    pub max_users: i32,
    pub max_vehicles: i32,
}

impl From<Company> for CompanyContext {
    fn from(c: Company) -> Self {
        Self {
            id: c.id,
            name: c.name,
            subdomain: c.subdomain,
            database_name: c.database_name,
            plan: c.plan,
            status: c.status,
            max_users: c.max_users,
            max_vehicles: c.max_vehicles,
        }
    }
}

/// Whether a company may use the application at `now`
pub fn check_standing(company: &Company, now: NaiveDateTime) -> Result<(), String> {
    match company.status.as_str() {
        "trial" => match company.trial_ends_at {
            Some(ends) if ends < now => Err("Trial period expired".to_string()),
            _ => Ok(()),
        },
        "active" => match company.subscription_ends_at {
            Some(ends) if ends < now => Err("Subscription expired".to_string()),
            _ => Ok(()),
        },
        "suspended" => Err("Company account is suspended".to_string()),
        "expired" => Err("Company subscription has expired".to_string()),
        other => Err(format!("Company account is {}", other)),
    }
}

const USABLE: &str = "status IN ('active', 'trial')";

pub async fn find_by_subdomain(main: &MySqlPool, subdomain: &str) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE subdomain = ? AND {}",
        COMPANY_COLUMNS, USABLE
    ))
    .bind(subdomain)
    .fetch_optional(main)
    .await
}

pub async fn find_by_custom_domain(main: &MySqlPool, domain: &str) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE custom_domain = ? AND {}",
        COMPANY_COLUMNS, USABLE
    ))
    .bind(domain)
    .fetch_optional(main)
    .await
}

/// Any status; the caller decides what a suspended company means
pub async fn find_by_id(main: &MySqlPool, id: i64) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(&format!("SELECT {} FROM companies WHERE id = ?", COMPANY_COLUMNS))
        .bind(id)
        .fetch_optional(main)
        .await
}

/// Any status, looked up by the tenant database it owns
pub async fn find_by_database(main: &MySqlPool, database_name: &str) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(&format!("SELECT {} FROM companies WHERE database_name = ?", COMPANY_COLUMNS))
        .bind(database_name)
        .fetch_optional(main)
        .await
}

pub async fn first_usable(main: &MySqlPool) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE {} ORDER BY id LIMIT 1",
        COMPANY_COLUMNS, USABLE
    ))
    .fetch_optional(main)
    .await
}

/// Run the host lookup chain. `None` when the host names no company.
pub async fn resolve_host(
    main: &MySqlPool,
    lookup: &HostLookup,
    allow_localhost_fallback: bool,
) -> Result<Option<Company>, sqlx::Error> {
    match lookup {
        HostLookup::Subdomain(sub) => find_by_subdomain(main, sub).await,
        HostLookup::CustomDomain(domain) => find_by_custom_domain(main, domain).await,
        HostLookup::Local if allow_localhost_fallback => first_usable(main).await,
        HostLookup::Local => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const MAIN: &str = "fleetmanager.local";

    #[test]
    fn subdomain_hosts_resolve_by_label() {
        assert_eq!(
            HostLookup::from_host("acme.fleetmanager.local:5000", MAIN),
            Some(HostLookup::Subdomain("acme".into()))
        );
        assert_eq!(
            HostLookup::from_host("ACME.FleetManager.local", MAIN),
            Some(HostLookup::Subdomain("acme".into()))
        );
    }

    #[test]
    fn nested_labels_under_main_domain_are_custom_domains() {
        assert_eq!(
            HostLookup::from_host("a.b.fleetmanager.local", MAIN),
            Some(HostLookup::CustomDomain("a.b.fleetmanager.local".into()))
        );
        assert_eq!(
            HostLookup::from_host("acme.notfleetmanager.local", MAIN),
            Some(HostLookup::CustomDomain("acme.notfleetmanager.local".into()))
        );
    }

    #[test]
    fn www_and_bare_main_domain_are_not_companies() {
        assert_eq!(HostLookup::from_host("www.fleetmanager.local", MAIN), None);
        assert_eq!(HostLookup::from_host("fleetmanager.local", MAIN), None);
        assert_eq!(HostLookup::from_host("", MAIN), None);
    }

    #[test]
    fn foreign_hosts_are_custom_domains() {
        assert_eq!(
            HostLookup::from_host("fleet.acme.com", MAIN),
            Some(HostLookup::CustomDomain("fleet.acme.com".into()))
        );
        assert_eq!(HostLookup::from_host("localhost:3000", MAIN), Some(HostLookup::Local));
        assert_eq!(HostLookup::from_host("127.0.0.1", MAIN), Some(HostLookup::Local));
    }

    fn company(status: &str) -> Company {
        let now = Utc::now().naive_utc();
        Company {
            id: 1,
            name: "Acme".into(),
            subdomain: "acme".into(),
            custom_domain: None,
            database_name: "fleet_acme".into(),
            email: "ops@acme.test".into(),
            phone: None,
            address: None,
            plan: "trial".into(),
            status: status.into(),
            max_users: 5,
            max_vehicles: 10,
            trial_ends_at: None,
            subscription_ends_at: None,
            primary_color: "#556ee6".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn expired_trial_is_refused() {
        let now = Utc::now().naive_utc();
        let mut c = company("trial");
        c.trial_ends_at = Some(now + Duration::days(3));
        assert!(check_standing(&c, now).is_ok());
        c.trial_ends_at = Some(now - Duration::days(1));
        assert_eq!(check_standing(&c, now).unwrap_err(), "Trial period expired");
    }

    #[test]
    fn lapsed_subscription_and_suspension_are_refused() {
        let now = Utc::now().naive_utc();
        let mut c = company("active");
        assert!(check_standing(&c, now).is_ok());
        c.subscription_ends_at = Some(now - Duration::hours(1));
        assert_eq!(check_standing(&c, now).unwrap_err(), "Subscription expired");
        assert!(check_standing(&company("suspended"), now).is_err());
        assert!(check_standing(&company("expired"), now).is_err());
    }
}
