// Dashboard statistics and fleet KPIs.

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::MySqlPool;

use crate::permissions::RowScope;

#[derive(Debug, Clone, Serialize)]
pub struct VehicleCounts {
    pub total: i64,
    pub in_use: i64,
    pub available: i64,
    pub maintenance: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FuelStats {
    pub total_records: i64,
    pub total_liters: f64,
    pub total_cost: f64,
    pub avg_price_per_liter: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceStats {
    pub total_services: i64,
    pub total_cost: f64,
    pub pending: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UtilizedVehicle {
    pub id: i64,
    pub make: String,
    pub model: String,
    pub vehicle_number: String,
    pub assignment_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub vehicles: VehicleCounts,
    pub fuel: FuelStats,
    pub active_assignments: i64,
    pub maintenance: MaintenanceStats,
    pub top_utilized: Vec<UtilizedVehicle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Kpis {
    pub cost_per_km: f64,
    pub avg_fuel_efficiency: f64,
    pub vehicle_downtime_pct: f64,
    pub utilization_rate: f64,
}

/// A fill-up used for efficiency: (vehicle, date, odometer, liters)
pub type FillUp = (i64, NaiveDateTime, i64, Decimal);

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

pub fn cost_per_km(total_cost: f64, total_km: f64) -> f64 {
    if total_km > 0.0 {
        round2(total_cost / total_km)
    } else {
        0.0
    }
}

/// Mean km per liter between consecutive fill-ups of the same vehicle.
/// Rows must be ordered by vehicle, then date. Values outside (0, 50) are
/// treated as bad odometer entries and skipped.
pub fn average_efficiency(fill_ups: &[FillUp]) -> f64 {
    let mut samples = Vec::new();
    for pair in fill_ups.windows(2) {
        let (prev_vehicle, _, prev_odometer, _) = pair[0];
        let (vehicle, _, odometer, liters) = pair[1];
        if vehicle != prev_vehicle || liters <= Decimal::ZERO {
            continue;
        }
        let km_per_liter = (odometer - prev_odometer) as f64 / to_f64(liters);
        if km_per_liter > 0.0 && km_per_liter < 50.0 {
            samples.push(km_per_liter);
        }
    }
    if samples.is_empty() {
        return 0.0;
    }
    round2(samples.iter().sum::<f64>() / samples.len() as f64)
}

pub async fn dashboard(pool: &MySqlPool, scope: RowScope) -> Result<DashboardStats, sqlx::Error> {
    let (total, in_use, available, maintenance): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               CAST(COALESCE(SUM(CASE WHEN status = 'in_use' THEN 1 ELSE 0 END), 0) AS SIGNED),
               CAST(COALESCE(SUM(CASE WHEN status = 'available' THEN 1 ELSE 0 END), 0) AS SIGNED),
               CAST(COALESCE(SUM(CASE WHEN status = 'maintenance' THEN 1 ELSE 0 END), 0) AS SIGNED)
        FROM vehicles
        "#,
    )
    .fetch_one(pool)
    .await?;

    let mut fuel_sql = String::from(
        "SELECT COUNT(*), COALESCE(SUM(fuel_amount), 0), COALESCE(SUM(fuel_cost), 0), \
         CAST(COALESCE(AVG(fuel_cost / NULLIF(fuel_amount, 0)), 0) AS DOUBLE) \
         FROM fuel_records WHERE fuel_date >= DATE_SUB(CURDATE(), INTERVAL 30 DAY)",
    );
    let fuel_owner = scope.restrict(&mut fuel_sql, "employee_id");
    let mut fuel_query = sqlx::query_as::<_, (i64, Decimal, Decimal, f64)>(&fuel_sql);
    if let Some(id) = fuel_owner {
        fuel_query = fuel_query.bind(id);
    }
    let (records, liters, fuel_cost, avg_price) = fuel_query.fetch_one(pool).await?;

    let mut assignment_sql = String::from("SELECT COUNT(*) FROM vehicle_assignments WHERE status = 'active'");
    let assignment_owner = scope.restrict(&mut assignment_sql, "employee_id");
    let mut assignment_query = sqlx::query_as::<_, (i64,)>(&assignment_sql);
    if let Some(id) = assignment_owner {
        assignment_query = assignment_query.bind(id);
    }
    let (active_assignments,) = assignment_query.fetch_one(pool).await?;

    let (services, service_cost, pending, completed): (i64, Decimal, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(cost), 0),
               CAST(COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS SIGNED),
               CAST(COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS SIGNED)
        FROM service_maintenance
        WHERE service_date >= DATE_SUB(CURDATE(), INTERVAL 90 DAY)
        "#,
    )
    .fetch_one(pool)
    .await?;

    let top_utilized = sqlx::query_as::<_, UtilizedVehicle>(
        r#"
        SELECT v.id, v.make, v.model, v.vehicle_number, COUNT(va.id) AS assignment_count
        FROM vehicles v
        LEFT JOIN vehicle_assignments va ON v.id = va.vehicle_id
            AND va.assignment_date >= DATE_SUB(CURDATE(), INTERVAL 30 DAY)
        GROUP BY v.id, v.make, v.model, v.vehicle_number
        HAVING assignment_count > 0
        ORDER BY assignment_count DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(DashboardStats {
        vehicles: VehicleCounts {
            total,
            in_use,
            available,
            maintenance,
        },
        fuel: FuelStats {
            total_records: records,
            total_liters: to_f64(liters),
            total_cost: to_f64(fuel_cost),
            avg_price_per_liter: round2(avg_price),
        },
        active_assignments,
        maintenance: MaintenanceStats {
            total_services: services,
            total_cost: to_f64(service_cost),
            pending,
            completed,
        },
        top_utilized,
    })
}

pub async fn kpis(pool: &MySqlPool) -> Result<Kpis, sqlx::Error> {
    let (fuel_cost,): (Decimal,) = sqlx::query_as(
        "SELECT COALESCE(SUM(fuel_cost), 0) FROM fuel_records WHERE fuel_date >= DATE_SUB(CURDATE(), INTERVAL 30 DAY)",
    )
    .fetch_one(pool)
    .await?;
    let (service_cost,): (Decimal,) = sqlx::query_as(
        "SELECT COALESCE(SUM(cost), 0) FROM service_maintenance WHERE service_date >= DATE_SUB(CURDATE(), INTERVAL 30 DAY)",
    )
    .fetch_one(pool)
    .await?;
    let (km,): (i64,) = sqlx::query_as(
        r#"
        SELECT CAST(COALESCE(SUM(mileage_at_return - mileage_at_assignment), 0) AS SIGNED)
        FROM vehicle_assignments
        WHERE mileage_at_return IS NOT NULL
          AND assignment_date >= DATE_SUB(CURDATE(), INTERVAL 30 DAY)
        "#,
    )
    .fetch_one(pool)
    .await?;

    let fill_ups: Vec<FillUp> = sqlx::query_as(
        r#"
        SELECT vehicle_id, fuel_date, odometer_reading, fuel_amount
        FROM fuel_records
        WHERE odometer_reading IS NOT NULL
          AND fuel_amount > 0
          AND fuel_date >= DATE_SUB(CURDATE(), INTERVAL 90 DAY)
        ORDER BY vehicle_id, fuel_date, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let (vehicles_down, total_vehicles): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(DISTINCT vehicle_id) FROM service_maintenance WHERE status IN ('pending', 'in_progress')),
            (SELECT COUNT(*) FROM vehicles)
        "#,
    )
    .fetch_one(pool)
    .await?;

    let (vehicles_used, active_vehicles): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(DISTINCT vehicle_id) FROM vehicle_assignments
             WHERE assignment_date >= DATE_SUB(CURDATE(), INTERVAL 30 DAY)),
            (SELECT COUNT(*) FROM vehicles WHERE status != 'inactive')
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(Kpis {
        cost_per_km: cost_per_km(to_f64(fuel_cost + service_cost), km as f64),
        avg_fuel_efficiency: average_efficiency(&fill_ups),
        vehicle_downtime_pct: percentage(vehicles_down, total_vehicles),
        utilization_rate: percentage(vehicles_used, active_vehicles),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fill(vehicle: i64, day: u32, odometer: i64, liters: i64) -> FillUp {
        (
            vehicle,
            NaiveDate::from_ymd_opt(2024, 4, day).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            odometer,
            Decimal::from(liters),
        )
    }

    #[test]
    fn efficiency_uses_consecutive_fill_ups_per_vehicle() {
        let rows = [
            fill(1, 1, 10_000, 40),
            fill(1, 8, 10_500, 40), // 12.5 km/l
            fill(2, 2, 50_000, 30),
            fill(2, 9, 50_300, 20), // 15 km/l
        ];
        assert_eq!(average_efficiency(&rows), 13.75);
    }

    #[test]
    fn implausible_efficiency_is_dropped() {
        let rows = [fill(1, 1, 10_000, 40), fill(1, 2, 9_000, 40), fill(1, 3, 19_000, 10)];
        assert_eq!(average_efficiency(&rows), 0.0);
        assert_eq!(average_efficiency(&[]), 0.0);
    }

    #[test]
    fn ratios_guard_against_empty_fleets() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(4, 0), 0.0);
        assert_eq!(cost_per_km(150.0, 0.0), 0.0);
        assert_eq!(cost_per_km(150.0, 1200.0), 0.13);
    }
}
