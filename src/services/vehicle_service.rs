use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;

use super::{conflict_on_duplicate, ServiceError, ServiceResult};
use crate::database::models::vehicle::{Vehicle, VEHICLE_STATUSES};

#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub vehicle_number: String,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub vehicle_type: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub mileage: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleUpdate {
    pub vehicle_number: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub vehicle_type: Option<String>,
    pub status: Option<String>,
    pub mileage: Option<i64>,
    pub last_service_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

const SELECT: &str = "SELECT id, vehicle_number, make, model, year, color, vehicle_type, status, mileage, \
     last_service_date, notes, added_by, created_at, updated_at FROM vehicles";

fn check_status(status: Option<&str>) -> ServiceResult<()> {
    match status {
        Some(s) if !VEHICLE_STATUSES.contains(&s) => {
            Err(ServiceError::field("status", format!("Unknown vehicle status '{}'", s)))
        }
        _ => Ok(()),
    }
}

pub struct VehicleService {
    pool: MySqlPool,
}

impl VehicleService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, status: Option<&str>) -> ServiceResult<Vec<Vehicle>> {
        let vehicles = match status {
            Some(status) => {
                sqlx::query_as::<_, Vehicle>(&format!("{} WHERE status = ? ORDER BY vehicle_number", SELECT))
                    .bind(status)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Vehicle>(&format!("{} ORDER BY vehicle_number", SELECT))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(vehicles)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Vehicle> {
        sqlx::query_as::<_, Vehicle>(&format!("{} WHERE id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Vehicle"))
    }

    /// Insert, refusing once the company's plan allowance is used up
    pub async fn create(&self, input: &NewVehicle, added_by: i64, max_vehicles: i32) -> ServiceResult<Vehicle> {
        if input.vehicle_number.trim().is_empty() || input.make.trim().is_empty() || input.model.trim().is_empty() {
            return Err(ServiceError::invalid("vehicle_number, make and model are required"));
        }
        if input.mileage < 0 {
            return Err(ServiceError::field("mileage", "Mileage cannot be negative"));
        }
        check_status(input.status.as_deref())?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicles")
            .fetch_one(&self.pool)
            .await?;
        if count >= i64::from(max_vehicles) {
            return Err(ServiceError::LimitReached(format!(
                "Vehicle limit reached ({}). Upgrade your plan to add more vehicles.",
                max_vehicles
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO vehicles (vehicle_number, make, model, year, color, vehicle_type, status, mileage, notes, added_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.vehicle_number.trim())
        .bind(input.make.trim())
        .bind(input.model.trim())
        .bind(input.year)
        .bind(&input.color)
        .bind(&input.vehicle_type)
        .bind(input.status.as_deref().unwrap_or("available"))
        .bind(input.mileage)
        .bind(&input.notes)
        .bind(added_by)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Vehicle number already exists"))?;

        self.get(result.last_insert_id() as i64).await
    }

    pub async fn update(&self, id: i64, input: &VehicleUpdate) -> ServiceResult<Vehicle> {
        check_status(input.status.as_deref())?;
        if input.mileage.is_some_and(|m| m < 0) {
            return Err(ServiceError::field("mileage", "Mileage cannot be negative"));
        }
        self.get(id).await?;

        sqlx::query(
            r#"
            UPDATE vehicles SET
                vehicle_number = COALESCE(?, vehicle_number),
                make = COALESCE(?, make),
                model = COALESCE(?, model),
                year = COALESCE(?, year),
                color = COALESCE(?, color),
                vehicle_type = COALESCE(?, vehicle_type),
                status = COALESCE(?, status),
                mileage = COALESCE(?, mileage),
                last_service_date = COALESCE(?, last_service_date),
                notes = COALESCE(?, notes)
            WHERE id = ?
            "#,
        )
        .bind(&input.vehicle_number)
        .bind(&input.make)
        .bind(&input.model)
        .bind(input.year)
        .bind(&input.color)
        .bind(&input.vehicle_type)
        .bind(&input.status)
        .bind(input.mileage)
        .bind(input.last_service_date)
        .bind(&input.notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Vehicle number already exists"))?;

        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let (active,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM vehicle_assignments WHERE vehicle_id = ? AND status = 'active'")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if active > 0 {
            return Err(ServiceError::invalid("Vehicle is currently assigned; return it first"));
        }

        let result = sqlx::query("DELETE FROM vehicles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Vehicle"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_a_field_error() {
        assert!(check_status(None).is_ok());
        assert!(check_status(Some("in_use")).is_ok());
        match check_status(Some("stolen")) {
            Err(ServiceError::Fields(f)) => assert!(f["status"].contains("stolen")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
