use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

use super::{append_note, ServiceError, ServiceResult};
use crate::database::models::maintenance::ServiceRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceRecord {
    pub vehicle_id: i64,
    pub service_type: String,
    pub service_date: Option<NaiveDate>,
    pub service_provider: Option<String>,
    #[serde(default)]
    pub cost: Decimal,
    pub odometer_reading: Option<i64>,
    pub next_service_date: Option<NaiveDate>,
    pub next_service_mileage: Option<i64>,
    pub description: Option<String>,
    pub parts_replaced: Option<String>,
    pub status: Option<String>,
    pub performed_by: Option<String>,
    pub job_card_id: Option<i64>,
    pub requisition_id: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Overdue,
    DueSoon,
    Upcoming,
    NoData,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Overdue => "overdue",
            Urgency::DueSoon => "due_soon",
            Urgency::Upcoming => "upcoming",
            Urgency::NoData => "no_data",
        }
    }
}

/// Distance and time left before the next service decide how urgent it is
pub fn categorize(km_until: Option<i64>, days_until: Option<i64>) -> Urgency {
    if km_until.is_none() && days_until.is_none() {
        return Urgency::NoData;
    }
    if km_until.is_some_and(|k| k <= 0) || days_until.is_some_and(|d| d <= 0) {
        return Urgency::Overdue;
    }
    if km_until.is_some_and(|k| k <= 1000) || days_until.is_some_and(|d| d <= 7) {
        return Urgency::DueSoon;
    }
    Urgency::Upcoming
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceNotification {
    pub vehicle_id: i64,
    pub vehicle_number: String,
    pub make: String,
    pub model: String,
    pub service_type: String,
    pub last_service_date: NaiveDate,
    pub next_service_date: Option<NaiveDate>,
    pub next_service_mileage: Option<i64>,
    pub current_odometer: Option<i64>,
    pub km_until: Option<i64>,
    pub days_until: Option<i64>,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationReport {
    pub notifications: Vec<ServiceNotification>,
    pub counts: BTreeMap<&'static str, usize>,
}

type NotificationRow = (
    i64,
    String,
    String,
    String,
    String,
    NaiveDate,
    Option<NaiveDate>,
    Option<i64>,
    Option<i64>,
);

const SELECT: &str = "SELECT id, vehicle_id, service_type, service_date, service_provider, cost, odometer_reading, \
     next_service_date, next_service_mileage, description, parts_replaced, invoice_path, status, performed_by, \
     job_card_id, requisition_id, notes, created_at FROM service_maintenance";

pub struct MaintenanceService {
    pool: MySqlPool,
}

impl MaintenanceService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, vehicle_id: Option<i64>) -> ServiceResult<Vec<ServiceRecord>> {
        let records = match vehicle_id {
            Some(v) => {
                sqlx::query_as::<_, ServiceRecord>(&format!(
                    "{} WHERE vehicle_id = ? ORDER BY service_date DESC, id DESC",
                    SELECT
                ))
                .bind(v)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ServiceRecord>(&format!("{} ORDER BY service_date DESC, id DESC", SELECT))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(records)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<ServiceRecord> {
        sqlx::query_as::<_, ServiceRecord>(&format!("{} WHERE id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Service record"))
    }

    pub async fn create(&self, input: &NewServiceRecord) -> ServiceResult<ServiceRecord> {
        if input.service_type.trim().is_empty() {
            return Err(ServiceError::field("service_type", "Service type is required"));
        }
        if input.cost < Decimal::ZERO {
            return Err(ServiceError::field("cost", "Cost cannot be negative"));
        }
        let service_date = input.service_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.pool.begin().await?;

        let (exists,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicles WHERE id = ?")
            .bind(input.vehicle_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(ServiceError::not_found("Vehicle"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO service_maintenance
                (vehicle_id, service_type, service_date, service_provider, cost, odometer_reading,
                 next_service_date, next_service_mileage, description, parts_replaced, status,
                 performed_by, job_card_id, requisition_id, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.vehicle_id)
        .bind(input.service_type.trim())
        .bind(service_date)
        .bind(&input.service_provider)
        .bind(input.cost)
        .bind(input.odometer_reading)
        .bind(input.next_service_date)
        .bind(input.next_service_mileage)
        .bind(&input.description)
        .bind(&input.parts_replaced)
        .bind(input.status.as_deref().unwrap_or("completed"))
        .bind(&input.performed_by)
        .bind(input.job_card_id)
        .bind(input.requisition_id)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_id() as i64;

        match input.odometer_reading {
            Some(odometer) => {
                sqlx::query("UPDATE vehicles SET last_service_date = ?, mileage = GREATEST(mileage, ?) WHERE id = ?")
                    .bind(service_date)
                    .bind(odometer)
                    .bind(input.vehicle_id)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                sqlx::query("UPDATE vehicles SET last_service_date = ? WHERE id = ?")
                    .bind(service_date)
                    .bind(input.vehicle_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        if let Some(requisition_id) = input.requisition_id {
            let notes: Option<(Option<String>,)> =
                sqlx::query_as("SELECT notes FROM service_requisitions WHERE id = ?")
                    .bind(requisition_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let (notes,) = notes.ok_or_else(|| ServiceError::not_found("Requisition"))?;
            sqlx::query("UPDATE service_requisitions SET notes = ? WHERE id = ?")
                .bind(append_note(notes.as_deref(), &format!("Service Record Created: ID #{}", id)))
                .bind(requisition_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM service_maintenance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Service record"));
        }
        Ok(())
    }

    /// Next-service status of every vehicle from its latest service record
    pub async fn notifications(&self, today: NaiveDate) -> ServiceResult<NotificationReport> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT v.id, v.vehicle_number, v.make, v.model, sm.service_type, sm.service_date,
                   sm.next_service_date, sm.next_service_mileage,
                   (SELECT MAX(f.odometer_reading) FROM fuel_records f WHERE f.vehicle_id = v.id) AS current_odometer
            FROM vehicles v
            JOIN service_maintenance sm ON sm.id = (
                SELECT s2.id FROM service_maintenance s2
                WHERE s2.vehicle_id = v.id
                ORDER BY s2.service_date DESC, s2.id DESC
                LIMIT 1
            )
            ORDER BY v.vehicle_number
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut notifications: Vec<ServiceNotification> = rows
            .into_iter()
            .map(
                |(vehicle_id, vehicle_number, make, model, service_type, service_date, next_date, next_km, odometer)| {
                    let km_until = match (next_km, odometer) {
                        (Some(next), Some(current)) => Some(next - current),
                        _ => None,
                    };
                    let days_until = next_date.map(|d| (d - today).num_days());
                    ServiceNotification {
                        vehicle_id,
                        vehicle_number,
                        make,
                        model,
                        service_type,
                        last_service_date: service_date,
                        next_service_date: next_date,
                        next_service_mileage: next_km,
                        current_odometer: odometer,
                        km_until,
                        days_until,
                        urgency: categorize(km_until, days_until),
                    }
                },
            )
            .collect();
        notifications.sort_by_key(|n| n.urgency);

        Ok(NotificationReport {
            counts: count_by_urgency(&notifications),
            notifications,
        })
    }
}

fn count_by_urgency(notifications: &[ServiceNotification]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = [Urgency::Overdue, Urgency::DueSoon, Urgency::Upcoming, Urgency::NoData]
        .iter()
        .map(|u| (u.as_str(), 0))
        .collect();
    for n in notifications {
        *counts.entry(n.urgency.as_str()).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_buckets() {
        assert_eq!(categorize(None, None), Urgency::NoData);
        assert_eq!(categorize(Some(0), None), Urgency::Overdue);
        assert_eq!(categorize(Some(5000), Some(-2)), Urgency::Overdue);
        assert_eq!(categorize(Some(1000), Some(60)), Urgency::DueSoon);
        assert_eq!(categorize(None, Some(7)), Urgency::DueSoon);
        assert_eq!(categorize(Some(1001), Some(8)), Urgency::Upcoming);
    }

    #[test]
    fn counts_include_empty_buckets() {
        let counts = count_by_urgency(&[]);
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|c| *c == 0));
    }
}
