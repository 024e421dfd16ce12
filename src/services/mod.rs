pub mod assignment_service;
pub mod employee_service;
pub mod fuel_service;
pub mod job_card_service;
pub mod maintenance_service;
pub mod requisition_service;
pub mod role_service;
pub mod scheduled_report_service;
pub mod settings_service;
pub mod tenant_service;
pub mod vehicle_service;

use std::collections::HashMap;

use sqlx::{MySql, Transaction};

pub use tenant_service::{TenantError, TenantService};

/// Failure of a tenant-scoped domain operation
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("validation failed: {0:?}")]
    Fields(HashMap<String, String>),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    LimitReached(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::Invalid(msg.into())
    }

    pub fn field(field: &str, msg: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), msg.into());
        ServiceError::Fields(errors)
    }
}

/// Map a unique-key violation to a conflict with `msg`, pass anything else through
pub(crate) fn conflict_on_duplicate(err: sqlx::Error, msg: impl Into<String>) -> ServiceError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ServiceError::Conflict(msg.into()),
        _ => ServiceError::Database(err),
    }
}

/// Query for the highest numeric suffix issued under `prefix` in `table.column`.
/// Rows are locked so concurrent issuers serialize on the same value.
fn highest_sequence_sql(table: &str, column: &str, prefix: &str) -> String {
    format!(
        "SELECT CAST(COALESCE(MAX(CAST(SUBSTRING({column}, {start}) AS UNSIGNED)), 0) AS SIGNED) \
         FROM {table} WHERE {column} LIKE '{prefix}%' FOR UPDATE",
        column = column,
        start = prefix.len() + 1,
        table = table,
        prefix = prefix,
    )
}

/// Highest sequence already issued; deleted rows never lower it below a live number
pub(crate) async fn highest_sequence(
    tx: &mut Transaction<'_, MySql>,
    table: &str,
    column: &str,
    prefix: &str,
) -> ServiceResult<i64> {
    let (highest,): (i64,) = sqlx::query_as(&highest_sequence_sql(table, column, prefix))
        .fetch_one(&mut **tx)
        .await?;
    Ok(highest)
}

/// Append a line to a free-text notes column value
pub(crate) fn append_note(existing: Option<&str>, line: &str) -> String {
    match existing.map(str::trim).filter(|s| !s.is_empty()) {
        Some(prev) => format!("{}\n{}", prev, line),
        None => line.to_string(),
    }
}

/// Collect field errors; `Ok` when there are none
pub(crate) fn check_fields(errors: HashMap<String, String>) -> ServiceResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Fields(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_are_appended_on_new_lines() {
        assert_eq!(append_note(None, "Job Card Created: JC000001"), "Job Card Created: JC000001");
        assert_eq!(append_note(Some("  "), "x"), "x");
        assert_eq!(append_note(Some("urgent"), "Service Record Created: ID #4"), "urgent\nService Record Created: ID #4");
    }

    #[test]
    fn sequence_query_skips_the_prefix() {
        let sql = highest_sequence_sql("job_cards", "job_card_number", "JC");
        assert!(sql.contains("SUBSTRING(job_card_number, 3)"));
        assert!(sql.contains("LIKE 'JC%'"));
        assert!(sql.ends_with("FOR UPDATE"));

        let sql = highest_sequence_sql("service_requisitions", "requisition_number", "SR-");
        assert!(sql.contains("SUBSTRING(requisition_number, 4)"));
        assert!(sql.contains("FROM service_requisitions"));
    }

    #[test]
    fn empty_field_map_passes() {
        assert!(check_fields(HashMap::new()).is_ok());
        assert!(matches!(
            check_fields(HashMap::from([("a".to_string(), "b".to_string())])),
            Err(ServiceError::Fields(_))
        ));
    }
}
