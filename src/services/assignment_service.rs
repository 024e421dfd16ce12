use chrono::Utc;
use serde::Deserialize;
use sqlx::MySqlPool;

use super::{ServiceError, ServiceResult};
use crate::database::models::assignment::Assignment;
use crate::permissions::RowScope;

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub vehicle_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub mileage_at_assignment: Option<i64>,
    pub purpose: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnVehicle {
    pub mileage_at_return: Option<i64>,
    pub notes: Option<String>,
}

const SELECT: &str = "SELECT a.id, a.vehicle_id, a.employee_id, a.assigned_by, a.assignment_date, a.return_date, \
     a.status, a.mileage_at_assignment, a.mileage_at_return, a.purpose, a.notes, \
     v.vehicle_number, e.username AS employee_username \
     FROM vehicle_assignments a \
     LEFT JOIN vehicles v ON v.id = a.vehicle_id \
     LEFT JOIN employees e ON e.id = a.employee_id";

/// Return mileage can never run the odometer backwards
fn check_return_mileage(at_assignment: i64, at_return: i64) -> ServiceResult<()> {
    if at_return < at_assignment {
        return Err(ServiceError::field(
            "mileage_at_return",
            format!("Return mileage cannot be less than assignment mileage ({})", at_assignment),
        ));
    }
    Ok(())
}

pub struct AssignmentService {
    pool: MySqlPool,
}

impl AssignmentService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, status: Option<&str>, scope: RowScope) -> ServiceResult<Vec<Assignment>> {
        let mut sql = format!("{} WHERE 1 = 1", SELECT);
        if status.is_some() {
            sql.push_str(" AND a.status = ?");
        }
        let own = scope.restrict(&mut sql, "a.employee_id");
        sql.push_str(" ORDER BY a.assignment_date DESC");

        let mut query = sqlx::query_as::<_, Assignment>(&sql);
        if let Some(status) = status {
            query = query.bind(status);
        }
        if let Some(id) = own {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Assignment> {
        sqlx::query_as::<_, Assignment>(&format!("{} WHERE a.id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Assignment"))
    }

    pub async fn assign(&self, input: &NewAssignment, assigned_by: i64) -> ServiceResult<Assignment> {
        let (vehicle_id, employee_id) = match (input.vehicle_id, input.employee_id) {
            (Some(v), Some(e)) => (v, e),
            _ => return Err(ServiceError::invalid("vehicle_id and employee_id are required")),
        };

        let mut tx = self.pool.begin().await?;

        let vehicle: Option<(String, i64)> =
            sqlx::query_as("SELECT status, mileage FROM vehicles WHERE id = ? FOR UPDATE")
                .bind(vehicle_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (status, mileage) = vehicle.ok_or_else(|| ServiceError::not_found("Vehicle"))?;
        if status != "available" {
            return Err(ServiceError::invalid(format!("Vehicle is not available (status: {})", status)));
        }

        // Locked so two assignments for the same employee serialize before the busy check
        let employee: Option<(String,)> = sqlx::query_as("SELECT status FROM employees WHERE id = ? FOR UPDATE")
            .bind(employee_id)
            .fetch_optional(&mut *tx)
            .await?;
        match employee {
            None => return Err(ServiceError::not_found("Employee")),
            Some((s,)) if s != "active" => return Err(ServiceError::invalid("Employee is not active")),
            Some(_) => {}
        }

        let (busy,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM vehicle_assignments WHERE employee_id = ? AND status = 'active'")
                .bind(employee_id)
                .fetch_one(&mut *tx)
                .await?;
        if busy > 0 {
            return Err(ServiceError::invalid("Employee already has an active vehicle assignment"));
        }

        let start_mileage = input.mileage_at_assignment.unwrap_or(mileage);
        let result = sqlx::query(
            r#"
            INSERT INTO vehicle_assignments
                (vehicle_id, employee_id, assigned_by, assignment_date, status, mileage_at_assignment, purpose, notes)
            VALUES (?, ?, ?, ?, 'active', ?, ?, ?)
            "#,
        )
        .bind(vehicle_id)
        .bind(employee_id)
        .bind(assigned_by)
        .bind(Utc::now().naive_utc())
        .bind(start_mileage)
        .bind(&input.purpose)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE vehicles SET status = 'in_use', mileage = ? WHERE id = ?")
            .bind(start_mileage)
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Vehicle {} assigned to employee {}", vehicle_id, employee_id);

        self.get(result.last_insert_id() as i64).await
    }

    pub async fn return_vehicle(&self, id: i64, input: &ReturnVehicle) -> ServiceResult<Assignment> {
        let return_mileage = input
            .mileage_at_return
            .ok_or_else(|| ServiceError::field("mileage_at_return", "Return mileage is required"))?;

        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, String, i64)> = sqlx::query_as(
            "SELECT vehicle_id, status, mileage_at_assignment FROM vehicle_assignments WHERE id = ? FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let (vehicle_id, status, start_mileage) = row.ok_or_else(|| ServiceError::not_found("Assignment"))?;
        if status != "active" {
            return Err(ServiceError::invalid("Assignment is not active"));
        }
        check_return_mileage(start_mileage, return_mileage)?;

        sqlx::query(
            r#"
            UPDATE vehicle_assignments
            SET status = 'completed', return_date = ?, mileage_at_return = ?, notes = COALESCE(?, notes)
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().naive_utc())
        .bind(return_mileage)
        .bind(&input.notes)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE vehicles SET status = 'available', mileage = ? WHERE id = ?")
            .bind(return_mileage)
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Assignment {} returned at {} km", id, return_mileage);

        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_mileage_must_not_decrease() {
        assert!(check_return_mileage(12_000, 12_000).is_ok());
        assert!(check_return_mileage(12_000, 12_450).is_ok());
        match check_return_mileage(12_000, 11_999) {
            Err(ServiceError::Fields(f)) => assert!(f["mileage_at_return"].contains("12000")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
