use chrono::{NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

use super::{ServiceError, ServiceResult};
use crate::database::models::fuel::FuelRecord;
use crate::permissions::RowScope;

#[derive(Debug, Clone, Deserialize)]
pub struct NewFuelRecord {
    pub vehicle_id: i64,
    pub employee_id: Option<i64>,
    pub fuel_date: Option<NaiveDateTime>,
    pub fuel_amount: Decimal,
    pub fuel_cost: Decimal,
    pub odometer_reading: Option<i64>,
    pub fuel_type: Option<String>,
    pub station_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FuelFilter {
    pub vehicle_id: Option<i64>,
    pub employee_id: Option<i64>,
}

/// A stored record plus the price check made when it was logged
#[derive(Debug, Clone, Serialize)]
pub struct FuelEntry {
    pub record: FuelRecord,
    pub price_per_liter: f64,
    pub price_alert: bool,
    pub alert_threshold: f64,
}

const SELECT: &str = "SELECT f.id, f.vehicle_id, f.employee_id, f.fuel_date, f.fuel_amount, f.fuel_cost, \
     f.odometer_reading, f.fuel_type, f.station_name, f.receipt_path, f.notes, \
     v.vehicle_number, e.username AS employee_username \
     FROM fuel_records f \
     LEFT JOIN vehicles v ON v.id = f.vehicle_id \
     LEFT JOIN employees e ON e.id = f.employee_id";

pub fn price_per_liter(amount: Decimal, cost: Decimal) -> f64 {
    if amount.is_zero() {
        return 0.0;
    }
    (cost / amount).round_dp(2).to_f64().unwrap_or(0.0)
}

fn validate(input: &NewFuelRecord) -> ServiceResult<()> {
    if input.fuel_amount <= Decimal::ZERO {
        return Err(ServiceError::field("fuel_amount", "Fuel amount must be greater than zero"));
    }
    if input.fuel_cost < Decimal::ZERO {
        return Err(ServiceError::field("fuel_cost", "Fuel cost cannot be negative"));
    }
    if input.odometer_reading.is_some_and(|o| o < 0) {
        return Err(ServiceError::field("odometer_reading", "Odometer reading cannot be negative"));
    }
    Ok(())
}

pub struct FuelService {
    pool: MySqlPool,
}

impl FuelService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &FuelFilter, scope: RowScope) -> ServiceResult<Vec<FuelRecord>> {
        let mut sql = format!("{} WHERE 1 = 1", SELECT);
        let mut binds = Vec::new();
        if let Some(v) = filter.vehicle_id {
            sql.push_str(" AND f.vehicle_id = ?");
            binds.push(v);
        }
        if let Some(e) = filter.employee_id {
            sql.push_str(" AND f.employee_id = ?");
            binds.push(e);
        }
        binds.extend(scope.restrict(&mut sql, "f.employee_id"));
        sql.push_str(" ORDER BY f.fuel_date DESC, f.id DESC");

        let mut query = sqlx::query_as::<_, FuelRecord>(&sql);
        for b in binds {
            query = query.bind(b);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<FuelRecord> {
        sqlx::query_as::<_, FuelRecord>(&format!("{} WHERE f.id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fuel record"))
    }

    /// Log a fill-up; `alert_threshold` is the tenant's price-per-liter ceiling
    pub async fn create(&self, input: &NewFuelRecord, caller: i64, alert_threshold: f64) -> ServiceResult<FuelEntry> {
        validate(input)?;

        let (exists,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicles WHERE id = ?")
            .bind(input.vehicle_id)
            .fetch_one(&self.pool)
            .await?;
        if exists == 0 {
            return Err(ServiceError::not_found("Vehicle"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO fuel_records
                (vehicle_id, employee_id, fuel_date, fuel_amount, fuel_cost, odometer_reading, fuel_type, station_name, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.vehicle_id)
        .bind(input.employee_id.unwrap_or(caller))
        .bind(input.fuel_date.unwrap_or_else(|| Utc::now().naive_utc()))
        .bind(input.fuel_amount)
        .bind(input.fuel_cost)
        .bind(input.odometer_reading)
        .bind(&input.fuel_type)
        .bind(&input.station_name)
        .bind(&input.notes)
        .execute(&self.pool)
        .await?;

        let record = self.get(result.last_insert_id() as i64).await?;
        let ppl = price_per_liter(record.fuel_amount, record.fuel_cost);
        let price_alert = ppl > alert_threshold;
        if price_alert {
            tracing::warn!(
                "Fuel price alert on vehicle {}: {:.2}/l exceeds {:.2}",
                record.vehicle_id,
                ppl,
                alert_threshold
            );
        }

        Ok(FuelEntry {
            record,
            price_per_liter: ppl,
            price_alert,
            alert_threshold,
        })
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM fuel_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Fuel record"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn price_per_liter_rounds_to_cents() {
        assert_eq!(price_per_liter(dec("40"), dec("210")), 5.25);
        assert_eq!(price_per_liter(dec("3"), dec("10")), 3.33);
        assert_eq!(price_per_liter(Decimal::ZERO, dec("10")), 0.0);
    }

    #[test]
    fn zero_amount_is_rejected() {
        let input = NewFuelRecord {
            vehicle_id: 1,
            employee_id: None,
            fuel_date: None,
            fuel_amount: Decimal::ZERO,
            fuel_cost: dec("10"),
            odometer_reading: None,
            fuel_type: None,
            station_name: None,
            notes: None,
        };
        assert!(matches!(validate(&input), Err(ServiceError::Fields(_))));
    }
}
