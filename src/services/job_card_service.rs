use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};

use super::{append_note, ServiceError, ServiceResult};
use crate::database::models::job_card::{JobCard, JobCardItem, JOB_CARD_PRIORITIES, JOB_CARD_STATUSES};

/// Interval added to the odometer for the follow-up service
pub const SERVICE_INTERVAL_KM: i64 = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewJobCard {
    pub vehicle_id: i64,
    pub requisition_id: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub expected_completion: Option<NaiveDateTime>,
    pub odometer_in: Option<i64>,
    pub fuel_level: Option<String>,
    pub reported_issues: Option<String>,
    pub assigned_technician: Option<String>,
    pub priority: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobCardUpdate {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub diagnosis: Option<String>,
    pub recommended_services: Option<String>,
    pub assigned_technician: Option<String>,
    pub expected_completion: Option<NaiveDateTime>,
    pub date_out: Option<NaiveDateTime>,
    pub odometer_out: Option<i64>,
    pub fuel_level: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewJobCardItem {
    pub item_type: String,
    pub description: String,
    #[serde(default = "one")]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    pub notes: Option<String>,
}

fn one() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Serialize)]
pub struct JobCardDetail {
    #[serde(flatten)]
    pub card: JobCard,
    pub items: Vec<JobCardItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CostTotals {
    pub parts: Decimal,
    pub labor: Decimal,
    pub total: Decimal,
}

/// Number following the highest sequence already issued
pub fn job_card_number(highest: i64) -> String {
    format!("JC{:06}", highest + 1)
}

/// Service type from diagnosis keywords, first match wins
pub fn infer_service_type(diagnosis: Option<&str>) -> &'static str {
    let text = diagnosis.unwrap_or_default().to_lowercase();
    const RULES: &[(&[&str], &str)] = &[
        (&["oil", "change"], "Oil Change"),
        (&["brake"], "Brake Service"),
        (&["tire"], "Tire Rotation"),
        (&["engine", "tune"], "Engine Tune-up"),
        (&["inspection"], "Inspection"),
        (&["repair"], "Repair"),
    ];
    RULES
        .iter()
        .find(|(words, _)| words.iter().any(|w| text.contains(w)))
        .map(|(_, kind)| *kind)
        .unwrap_or("General Service")
}

pub fn cost_totals(items: &[JobCardItem]) -> CostTotals {
    let mut totals = CostTotals::default();
    for item in items {
        match item.item_type.as_str() {
            "part" => totals.parts += item.total_price,
            "labor" => totals.labor += item.total_price,
            _ => {}
        }
    }
    totals.total = totals.parts + totals.labor;
    totals
}

pub fn parts_replaced(items: &[JobCardItem]) -> Option<String> {
    let lines: Vec<String> = items
        .iter()
        .filter(|i| i.item_type == "part")
        .map(|i| format!("- {} (Qty: {})", i.description, i.quantity.normalize()))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn check_choice(field: &str, value: Option<&str>, allowed: &[&str]) -> ServiceResult<()> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(ServiceError::field(field, format!("Unknown {} '{}'", field, v))),
        _ => Ok(()),
    }
}

const SELECT: &str = "SELECT id, job_card_number, vehicle_id, requisition_id, customer_name, customer_phone, \
     customer_email, date_in, expected_completion, date_out, odometer_in, odometer_out, fuel_level, \
     reported_issues, diagnosis, recommended_services, assigned_technician, status, priority, total_cost, \
     labor_cost, parts_cost, notes, created_by, created_at, updated_at FROM job_cards";

const SELECT_ITEMS: &str = "SELECT id, job_card_id, item_type, description, quantity, unit_price, total_price, \
     status, notes FROM job_card_items";

pub struct JobCardService {
    pool: MySqlPool,
}

impl JobCardService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, status: Option<&str>) -> ServiceResult<Vec<JobCard>> {
        let cards = match status {
            Some(status) => {
                sqlx::query_as::<_, JobCard>(&format!("{} WHERE status = ? ORDER BY date_in DESC, id DESC", SELECT))
                    .bind(status)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, JobCard>(&format!("{} ORDER BY date_in DESC, id DESC", SELECT))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(cards)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<JobCardDetail> {
        let card = sqlx::query_as::<_, JobCard>(&format!("{} WHERE id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Job card"))?;
        let items = sqlx::query_as::<_, JobCardItem>(&format!("{} WHERE job_card_id = ? ORDER BY id", SELECT_ITEMS))
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(JobCardDetail { card, items })
    }

    pub async fn create(&self, input: &NewJobCard, created_by: i64) -> ServiceResult<JobCardDetail> {
        check_choice("priority", input.priority.as_deref(), JOB_CARD_PRIORITIES)?;

        let mut tx = self.pool.begin().await?;

        let (exists,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicles WHERE id = ?")
            .bind(input.vehicle_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(ServiceError::not_found("Vehicle"));
        }

        let requisition_notes = match input.requisition_id {
            Some(requisition_id) => {
                let row: Option<(String, Option<String>)> =
                    sqlx::query_as("SELECT overall_status, notes FROM service_requisitions WHERE id = ? FOR UPDATE")
                        .bind(requisition_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                let (status, notes) = row.ok_or_else(|| ServiceError::not_found("Requisition"))?;
                if status != "approved" {
                    return Err(ServiceError::invalid("Requisition must be fully approved before a job card is opened"));
                }
                Some((requisition_id, notes))
            }
            None => None,
        };

        // The unique index on job_card_number still catches a concurrent duplicate
        let highest = super::highest_sequence(&mut tx, "job_cards", "job_card_number", "JC").await?;
        let number = job_card_number(highest);

        let result = sqlx::query(
            r#"
            INSERT INTO job_cards
                (job_card_number, vehicle_id, requisition_id, customer_name, customer_phone, customer_email,
                 date_in, expected_completion, odometer_in, fuel_level, reported_issues, assigned_technician,
                 status, priority, notes, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'open', ?, ?, ?)
            "#,
        )
        .bind(&number)
        .bind(input.vehicle_id)
        .bind(input.requisition_id)
        .bind(&input.customer_name)
        .bind(&input.customer_phone)
        .bind(&input.customer_email)
        .bind(Utc::now().naive_utc())
        .bind(input.expected_completion)
        .bind(input.odometer_in)
        .bind(&input.fuel_level)
        .bind(&input.reported_issues)
        .bind(&input.assigned_technician)
        .bind(input.priority.as_deref().unwrap_or("normal"))
        .bind(&input.notes)
        .bind(created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| super::conflict_on_duplicate(e, "Job card number already taken, retry"))?;

        if let Some((requisition_id, notes)) = requisition_notes {
            sqlx::query("UPDATE service_requisitions SET notes = ? WHERE id = ?")
                .bind(append_note(notes.as_deref(), &format!("Job Card Created: {}", number)))
                .bind(requisition_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!("Job card {} opened for vehicle {}", number, input.vehicle_id);
        self.get(result.last_insert_id() as i64).await
    }

    pub async fn add_item(&self, job_card_id: i64, input: &NewJobCardItem) -> ServiceResult<JobCardDetail> {
        check_choice("item_type", Some(input.item_type.as_str()), &["part", "labor"])?;
        if input.description.trim().is_empty() {
            return Err(ServiceError::field("description", "Description is required"));
        }
        if input.quantity <= Decimal::ZERO || input.unit_price < Decimal::ZERO {
            return Err(ServiceError::invalid("Quantity must be positive and unit price non-negative"));
        }

        let mut tx = self.pool.begin().await?;
        self.lock_card(&mut tx, job_card_id).await?;

        sqlx::query(
            r#"
            INSERT INTO job_card_items (job_card_id, item_type, description, quantity, unit_price, total_price, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job_card_id)
        .bind(&input.item_type)
        .bind(input.description.trim())
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind((input.quantity * input.unit_price).round_dp(2))
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        recompute_costs(&mut tx, job_card_id).await?;
        tx.commit().await?;
        self.get(job_card_id).await
    }

    pub async fn delete_item(&self, job_card_id: i64, item_id: i64) -> ServiceResult<JobCardDetail> {
        let mut tx = self.pool.begin().await?;
        self.lock_card(&mut tx, job_card_id).await?;

        let result = sqlx::query("DELETE FROM job_card_items WHERE id = ? AND job_card_id = ?")
            .bind(item_id)
            .bind(job_card_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Job card item"));
        }

        recompute_costs(&mut tx, job_card_id).await?;
        tx.commit().await?;
        self.get(job_card_id).await
    }

    async fn lock_card(&self, tx: &mut Transaction<'_, MySql>, id: i64) -> ServiceResult<()> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM job_cards WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        row.map(|_| ()).ok_or_else(|| ServiceError::not_found("Job card"))
    }

    /// Apply an update. Moving to `completed` records the service history.
    pub async fn update(&self, id: i64, input: &JobCardUpdate) -> ServiceResult<JobCardDetail> {
        check_choice("status", input.status.as_deref(), JOB_CARD_STATUSES)?;
        check_choice("priority", input.priority.as_deref(), JOB_CARD_PRIORITIES)?;

        let mut tx = self.pool.begin().await?;
        let (current,): (String,) = sqlx::query_as("SELECT status FROM job_cards WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("Job card"))?;
        let completing = completion_pending(&current, input.status.as_deref());

        sqlx::query(
            r#"
            UPDATE job_cards SET
                status = COALESCE(?, status),
                priority = COALESCE(?, priority),
                diagnosis = COALESCE(?, diagnosis),
                recommended_services = COALESCE(?, recommended_services),
                assigned_technician = COALESCE(?, assigned_technician),
                expected_completion = COALESCE(?, expected_completion),
                date_out = COALESCE(?, date_out),
                odometer_out = COALESCE(?, odometer_out),
                fuel_level = COALESCE(?, fuel_level),
                notes = COALESCE(?, notes)
            WHERE id = ?
            "#,
        )
        .bind(&input.status)
        .bind(&input.priority)
        .bind(&input.diagnosis)
        .bind(&input.recommended_services)
        .bind(&input.assigned_technician)
        .bind(input.expected_completion)
        .bind(input.date_out)
        .bind(input.odometer_out)
        .bind(&input.fuel_level)
        .bind(&input.notes)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if completing {
            let card = sqlx::query_as::<_, JobCard>(&format!("{} WHERE id = ?", SELECT))
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            let items = sqlx::query_as::<_, JobCardItem>(&format!("{} WHERE job_card_id = ? ORDER BY id", SELECT_ITEMS))
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
            record_completion(&mut tx, &card, &items).await?;
        }

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM job_cards WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Job card"));
        }
        Ok(())
    }
}

/// Whether an update moves a card into `completed` for the first time
pub fn completion_pending(current: &str, requested: Option<&str>) -> bool {
    requested == Some("completed") && current != "completed"
}

async fn recompute_costs(tx: &mut Transaction<'_, MySql>, job_card_id: i64) -> ServiceResult<CostTotals> {
    let items = sqlx::query_as::<_, JobCardItem>(&format!("{} WHERE job_card_id = ?", SELECT_ITEMS))
        .bind(job_card_id)
        .fetch_all(&mut **tx)
        .await?;
    let totals = cost_totals(&items);
    sqlx::query("UPDATE job_cards SET parts_cost = ?, labor_cost = ?, total_cost = ? WHERE id = ?")
        .bind(totals.parts)
        .bind(totals.labor)
        .bind(totals.total)
        .bind(job_card_id)
        .execute(&mut **tx)
        .await?;
    Ok(totals)
}

async fn record_completion(tx: &mut Transaction<'_, MySql>, card: &JobCard, items: &[JobCardItem]) -> ServiceResult<()> {
    let now = Utc::now().naive_utc();
    let date_out = match card.date_out {
        Some(d) => d,
        None => {
            sqlx::query("UPDATE job_cards SET date_out = ? WHERE id = ?")
                .bind(now)
                .bind(card.id)
                .execute(&mut **tx)
                .await?;
            now
        }
    };
    let service_date = date_out.date();
    let next_service_mileage = card.odometer_out.map(|o| o + SERVICE_INTERVAL_KM);

    sqlx::query(
        r#"
        INSERT INTO service_maintenance
            (vehicle_id, service_type, service_date, service_provider, cost, odometer_reading,
             next_service_mileage, description, parts_replaced, status, performed_by,
             job_card_id, requisition_id, notes)
        VALUES (?, ?, ?, 'In-house Workshop', ?, ?, ?, ?, ?, 'completed', ?, ?, ?, ?)
        "#,
    )
    .bind(card.vehicle_id)
    .bind(infer_service_type(card.diagnosis.as_deref()))
    .bind(service_date)
    .bind(card.total_cost)
    .bind(card.odometer_out)
    .bind(next_service_mileage)
    .bind(card.diagnosis.as_deref().or(card.reported_issues.as_deref()))
    .bind(parts_replaced(items))
    .bind(&card.assigned_technician)
    .bind(card.id)
    .bind(card.requisition_id)
    .bind(format!("Auto-generated from Job Card: {}", card.job_card_number))
    .execute(&mut **tx)
    .await?;

    match card.odometer_out {
        Some(odometer) => {
            sqlx::query("UPDATE vehicles SET last_service_date = ?, mileage = GREATEST(mileage, ?) WHERE id = ?")
                .bind(service_date)
                .bind(odometer)
                .bind(card.vehicle_id)
                .execute(&mut **tx)
                .await?;
        }
        None => {
            sqlx::query("UPDATE vehicles SET last_service_date = ? WHERE id = ?")
                .bind(service_date)
                .bind(card.vehicle_id)
                .execute(&mut **tx)
                .await?;
        }
    }

    tracing::info!("Job card {} completed; service record written", card.job_card_number);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: &str, desc: &str, qty: i64, total: i64) -> JobCardItem {
        JobCardItem {
            id: 0,
            job_card_id: 1,
            item_type: kind.into(),
            description: desc.into(),
            quantity: Decimal::from(qty),
            unit_price: Decimal::ZERO,
            total_price: Decimal::from(total),
            status: "pending".into(),
            notes: None,
        }
    }

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(job_card_number(0), "JC000001");
        assert_eq!(job_card_number(41), "JC000042");
    }

    #[test]
    fn numbering_continues_after_the_highest_issued() {
        // JC000001 deleted, JC000002 still live: the next card must not reuse JC000002
        assert_eq!(job_card_number(2), "JC000003");
    }

    #[test]
    fn completion_fires_once() {
        assert!(completion_pending("in_progress", Some("completed")));
        assert!(!completion_pending("completed", Some("completed")));
        assert!(!completion_pending("in_progress", Some("on_hold")));
        assert!(!completion_pending("in_progress", None));
    }

    #[test]
    fn service_type_follows_keyword_order() {
        assert_eq!(infer_service_type(Some("Oil leak near brake line")), "Oil Change");
        assert_eq!(infer_service_type(Some("Front BRAKE pads worn")), "Brake Service");
        assert_eq!(infer_service_type(Some("tire wear")), "Tire Rotation");
        assert_eq!(infer_service_type(Some("needs a tune")), "Engine Tune-up");
        assert_eq!(infer_service_type(Some("annual inspection")), "Inspection");
        assert_eq!(infer_service_type(Some("body repair")), "Repair");
        assert_eq!(infer_service_type(Some("wipers")), "General Service");
        assert_eq!(infer_service_type(None), "General Service");
    }

    #[test]
    fn totals_split_parts_and_labor() {
        let items = [item("part", "Filter", 2, 30), item("labor", "Fitting", 1, 45), item("part", "Oil", 4, 60)];
        let totals = cost_totals(&items);
        assert_eq!(totals.parts, Decimal::from(90));
        assert_eq!(totals.labor, Decimal::from(45));
        assert_eq!(totals.total, Decimal::from(135));
    }

    #[test]
    fn parts_list_skips_labor() {
        let items = [item("part", "Filter", 2, 30), item("labor", "Fitting", 1, 45)];
        assert_eq!(parts_replaced(&items).as_deref(), Some("- Filter (Qty: 2)"));
        assert_eq!(parts_replaced(&items[1..]), None);
    }
}
