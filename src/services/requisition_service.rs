use chrono::Utc;
use serde::Deserialize;
use sqlx::MySqlPool;

use super::{ServiceError, ServiceResult};
use crate::database::models::requisition::Requisition;

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequisition {
    pub vehicle_id: Option<i64>,
    pub work_description: Option<String>,
    pub current_mileage: Option<i64>,
    pub service_history: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub decision: Decision,
    pub comments: Option<String>,
}

/// Resulting (stage status, overall status) of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub stage: &'static str,
    pub overall: &'static str,
}

/// Number following the highest sequence already issued
pub fn requisition_number(highest: i64) -> String {
    format!("SR-{:05}", highest + 1)
}

pub fn line_manager_transition(current_overall: &str, decision: Decision) -> ServiceResult<Transition> {
    if current_overall != "pending" {
        return Err(ServiceError::invalid(format!(
            "Requisition already reviewed by line manager (status: {})",
            current_overall
        )));
    }
    Ok(match decision {
        Decision::Approve => Transition {
            stage: "approved",
            overall: "awaiting_director",
        },
        Decision::Reject => Transition {
            stage: "rejected",
            overall: "rejected",
        },
    })
}

pub fn director_transition(line_manager_status: &str, director_status: &str, decision: Decision) -> ServiceResult<Transition> {
    if line_manager_status != "approved" {
        return Err(ServiceError::invalid("Line manager must approve first!"));
    }
    if director_status != "pending" {
        return Err(ServiceError::invalid(format!("Director already decided (status: {})", director_status)));
    }
    let status = match decision {
        Decision::Approve => "approved",
        Decision::Reject => "rejected",
    };
    Ok(Transition {
        stage: status,
        overall: status,
    })
}

pub const OVERALL_STATUSES: &[&str] = &["pending", "awaiting_director", "approved", "rejected"];

const SELECT: &str = "SELECT id, requisition_number, date_requested, vehicle_id, vehicle_reg_number, vehicle_make, \
     vehicle_model, current_mileage, work_description, requested_by, service_history, line_manager_id, \
     line_manager_status, line_manager_comments, line_manager_reviewed_at, director_id, director_status, \
     director_comments, director_approved_at, overall_status, notes, created_at, updated_at \
     FROM service_requisitions";

pub struct RequisitionService {
    pool: MySqlPool,
}

impl RequisitionService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, overall_status: Option<&str>) -> ServiceResult<Vec<Requisition>> {
        let rows = match overall_status {
            Some(status) => {
                if !OVERALL_STATUSES.contains(&status) {
                    return Err(ServiceError::field("status", format!("Unknown status '{}'", status)));
                }
                sqlx::query_as::<_, Requisition>(&format!(
                    "{} WHERE overall_status = ? ORDER BY date_requested DESC, id DESC",
                    SELECT
                ))
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Requisition>(&format!("{} ORDER BY date_requested DESC, id DESC", SELECT))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Requisition> {
        sqlx::query_as::<_, Requisition>(&format!("{} WHERE id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Requisition"))
    }

    pub async fn create(&self, input: &NewRequisition, requested_by: i64) -> ServiceResult<Requisition> {
        let vehicle_id = input
            .vehicle_id
            .ok_or_else(|| ServiceError::field("vehicle_id", "Vehicle is required"))?;
        let work = input
            .work_description
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| ServiceError::field("work_description", "Work description is required"))?;

        let mut tx = self.pool.begin().await?;

        let vehicle: Option<(String, String, String, i64)> =
            sqlx::query_as("SELECT vehicle_number, make, model, mileage FROM vehicles WHERE id = ?")
                .bind(vehicle_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (reg, make, model, mileage) = vehicle.ok_or_else(|| ServiceError::not_found("Vehicle"))?;

        let highest = super::highest_sequence(&mut tx, "service_requisitions", "requisition_number", "SR-").await?;
        let number = requisition_number(highest);

        let result = sqlx::query(
            r#"
            INSERT INTO service_requisitions
                (requisition_number, date_requested, vehicle_id, vehicle_reg_number, vehicle_make, vehicle_model,
                 current_mileage, work_description, requested_by, service_history, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&number)
        .bind(Utc::now().naive_utc())
        .bind(vehicle_id)
        .bind(reg)
        .bind(make)
        .bind(model)
        .bind(input.current_mileage.unwrap_or(mileage))
        .bind(work)
        .bind(requested_by)
        .bind(&input.service_history)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| super::conflict_on_duplicate(e, "Requisition number already taken, retry"))?;

        tx.commit().await?;
        tracing::info!("Requisition {} raised by employee {}", number, requested_by);
        self.get(result.last_insert_id() as i64).await
    }

    /// Line-manager stage
    pub async fn review(&self, id: i64, reviewer: i64, review: &Review) -> ServiceResult<Requisition> {
        let current = self.get(id).await?;
        let t = line_manager_transition(&current.overall_status, review.decision)?;

        let mut sql = String::from(
            "UPDATE service_requisitions SET line_manager_id = ?, line_manager_status = ?, \
             line_manager_comments = ?, line_manager_reviewed_at = ?, overall_status = ?",
        );
        if t.overall == "rejected" {
            sql.push_str(", director_status = 'rejected'");
        }
        sql.push_str(" WHERE id = ? AND overall_status = 'pending'");

        let result = sqlx::query(&sql)
            .bind(reviewer)
            .bind(t.stage)
            .bind(&review.comments)
            .bind(Utc::now().naive_utc())
            .bind(t.overall)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::Conflict("Requisition was reviewed concurrently".into()));
        }
        self.get(id).await
    }

    /// Director stage
    pub async fn approve(&self, id: i64, director: i64, review: &Review) -> ServiceResult<Requisition> {
        let current = self.get(id).await?;
        let t = director_transition(&current.line_manager_status, &current.director_status, review.decision)?;

        let result = sqlx::query(
            r#"
            UPDATE service_requisitions
            SET director_id = ?, director_status = ?, director_comments = ?, director_approved_at = ?, overall_status = ?
            WHERE id = ? AND director_status = 'pending'
            "#,
        )
        .bind(director)
        .bind(t.stage)
        .bind(&review.comments)
        .bind(Utc::now().naive_utc())
        .bind(t.overall)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::Conflict("Requisition was decided concurrently".into()));
        }
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_have_five_digits() {
        assert_eq!(requisition_number(0), "SR-00001");
        assert_eq!(requisition_number(1233), "SR-01234");
    }

    #[test]
    fn line_manager_approval_waits_for_director() {
        let t = line_manager_transition("pending", Decision::Approve).unwrap();
        assert_eq!((t.stage, t.overall), ("approved", "awaiting_director"));
        let t = line_manager_transition("pending", Decision::Reject).unwrap();
        assert_eq!((t.stage, t.overall), ("rejected", "rejected"));
        assert!(line_manager_transition("approved", Decision::Approve).is_err());
    }

    #[test]
    fn director_needs_line_manager_first() {
        match director_transition("pending", "pending", Decision::Approve) {
            Err(ServiceError::Invalid(msg)) => assert_eq!(msg, "Line manager must approve first!"),
            other => panic!("unexpected {:?}", other),
        }
        let t = director_transition("approved", "pending", Decision::Reject).unwrap();
        assert_eq!(t.overall, "rejected");
        assert!(director_transition("approved", "approved", Decision::Approve).is_err());
    }
}
