// End-to-end flows against a live MySQL server. Each test signs up its own
// company, so tests never share tenant rows.

mod common;

use anyhow::Result;
use common::Tenant;
use fleet_api_rust::auth::{generate_jwt, Claims};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn vehicle(tenant: &Tenant, number: &str, mileage: i64) -> Result<i64> {
    let data = tenant
        .create(
            "/api/vehicles",
            json!({ "vehicle_number": number, "make": "Toyota", "model": "Hilux", "mileage": mileage }),
        )
        .await?;
    Ok(data["id"].as_i64().expect("vehicle id"))
}

async fn employee(tenant: &Tenant, username: &str) -> Result<i64> {
    let data = tenant
        .create(
            "/api/employees",
            json!({
                "username": username,
                "email": format!("{}@{}.test", username, tenant.subdomain),
                "password": "driver-pass-1",
                "full_name": "Test Driver"
            }),
        )
        .await?;
    Ok(data["id"].as_i64().expect("employee id"))
}

async fn data_of(res: reqwest::Response) -> Result<Value> {
    let body: Value = res.json().await?;
    Ok(body["data"].clone())
}

#[tokio::test]
async fn returned_mileage_cannot_go_backwards() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let tenant = Tenant::signup(server, "ret").await?;
    let vehicle_id = vehicle(&tenant, "KAA 100A", 1_000).await?;
    let employee_id = employee(&tenant, "driver1").await?;

    let assignment = tenant
        .create("/api/assignments", json!({ "vehicle_id": vehicle_id, "employee_id": employee_id }))
        .await?;
    assert_eq!(assignment["mileage_at_assignment"], 1_000);
    let assignment_id = assignment["id"].as_i64().expect("assignment id");

    let v = data_of(tenant.get(&format!("/api/vehicles/{}", vehicle_id)).await?).await?;
    assert_eq!(v["status"], "in_use");

    // The vehicle is taken
    let res = tenant
        .post("/api/assignments", json!({ "vehicle_id": vehicle_id, "employee_id": employee_id }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = tenant
        .post(
            &format!("/api/assignments/{}/return", assignment_id),
            json!({ "mileage_at_return": 900 }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert!(body["field_errors"]["mileage_at_return"].is_string(), "{}", body);

    let res = tenant
        .post(
            &format!("/api/assignments/{}/return", assignment_id),
            json!({ "mileage_at_return": 1_450 }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let returned = data_of(res).await?;
    assert_eq!(returned["status"], "completed");
    assert_eq!(returned["mileage_at_return"], 1_450);

    let v = data_of(tenant.get(&format!("/api/vehicles/{}", vehicle_id)).await?).await?;
    assert_eq!(v["status"], "available");
    assert_eq!(v["mileage"], 1_450);
    Ok(())
}

#[tokio::test]
async fn employee_holds_one_active_assignment() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let tenant = Tenant::signup(server, "one").await?;
    let first = vehicle(&tenant, "KAA 200A", 0).await?;
    let second = vehicle(&tenant, "KAA 200B", 0).await?;
    let employee_id = employee(&tenant, "driver2").await?;

    // Both requests race for the same employee; only one may win
    let (a, b) = tokio::join!(
        tenant.post("/api/assignments", json!({ "vehicle_id": first, "employee_id": employee_id })),
        tenant.post("/api/assignments", json!({ "vehicle_id": second, "employee_id": employee_id })),
    );
    let mut statuses = vec![a?.status(), b?.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    let active = data_of(tenant.get("/api/assignments?status=active").await?).await?;
    assert_eq!(active.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn assigned_vehicle_and_driver_cannot_be_deleted() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let tenant = Tenant::signup(server, "del").await?;
    let vehicle_id = vehicle(&tenant, "KAA 300A", 500).await?;
    let employee_id = employee(&tenant, "driver3").await?;
    let assignment = tenant
        .create("/api/assignments", json!({ "vehicle_id": vehicle_id, "employee_id": employee_id }))
        .await?;

    let res = tenant.delete(&format!("/api/vehicles/{}", vehicle_id)).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = tenant.delete(&format!("/api/employees/{}", employee_id)).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = tenant
        .post(
            &format!("/api/assignments/{}/return", assignment["id"]),
            json!({ "mileage_at_return": 600 }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = tenant.delete(&format!("/api/vehicles/{}", vehicle_id)).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn vehicle_limit_follows_the_plan() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let tenant = Tenant::signup(server, "lim").await?;

    let root = generate_jwt(&Claims::root("operator".into(), 1))?;
    let res = reqwest::Client::new()
        .put(format!("{}/api/root/companies/{}", server.base_url, tenant.company_id))
        .bearer_auth(root)
        .json(&json!({ "max_vehicles": 1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    vehicle(&tenant, "KAA 400A", 0).await?;
    let res = tenant
        .post(
            "/api/vehicles",
            json!({ "vehicle_number": "KAA 400B", "make": "Isuzu", "model": "D-Max" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn completing_a_job_card_writes_one_service_record() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let tenant = Tenant::signup(server, "jc").await?;
    let vehicle_id = vehicle(&tenant, "KAA 500A", 5_000).await?;

    let card = tenant
        .create(
            "/api/job-cards",
            json!({ "vehicle_id": vehicle_id, "odometer_in": 5_000, "reported_issues": "Squealing when braking" }),
        )
        .await?;
    let card_id = card["id"].as_i64().expect("job card id");
    tenant
        .create(
            &format!("/api/job-cards/{}/items", card_id),
            json!({ "item_type": "part", "description": "Brake pads", "quantity": "2", "unit_price": "45.50" }),
        )
        .await?;

    let complete = json!({ "status": "completed", "odometer_out": 5_200, "diagnosis": "Brake pads worn" });
    let res = tenant.put(&format!("/api/job-cards/{}", card_id), complete.clone()).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let detail = data_of(res).await?;
    assert_eq!(detail["status"], "completed");
    assert!(detail["date_out"].is_string());

    // A second completion is a plain update
    let res = tenant.put(&format!("/api/job-cards/{}", card_id), complete).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let records = data_of(tenant.get(&format!("/api/maintenance?vehicle_id={}", vehicle_id)).await?).await?;
    let records = records.as_array().expect("service records");
    assert_eq!(records.len(), 1, "{:?}", records);
    assert_eq!(records[0]["service_type"], "Brake Service");
    assert_eq!(records[0]["next_service_mileage"], 15_200);
    assert_eq!(records[0]["job_card_id"], card_id);
    assert_eq!(records[0]["parts_replaced"], "- Brake pads (Qty: 2)");

    let v = data_of(tenant.get(&format!("/api/vehicles/{}", vehicle_id)).await?).await?;
    assert_eq!(v["mileage"], 5_200);
    assert!(v["last_service_date"].is_string());
    Ok(())
}

#[tokio::test]
async fn job_card_numbers_are_not_reused_after_delete() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let tenant = Tenant::signup(server, "num").await?;
    let vehicle_id = vehicle(&tenant, "KAA 600A", 0).await?;

    let first = tenant.create("/api/job-cards", json!({ "vehicle_id": vehicle_id })).await?;
    let second = tenant.create("/api/job-cards", json!({ "vehicle_id": vehicle_id })).await?;
    assert_eq!(first["job_card_number"], "JC000001");
    assert_eq!(second["job_card_number"], "JC000002");

    let res = tenant.delete(&format!("/api/job-cards/{}", first["id"])).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let third = tenant.create("/api/job-cards", json!({ "vehicle_id": vehicle_id })).await?;
    assert_eq!(third["job_card_number"], "JC000003");
    Ok(())
}

#[tokio::test]
async fn manual_report_run_records_its_execution() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let tenant = Tenant::signup(server, "rep").await?;

    let report = tenant
        .create(
            "/api/scheduled-reports",
            json!({
                "report_name": "Daily fuel",
                "report_type": "fuel_analysis",
                "frequency": "daily",
                "recipients": format!("ops@{}.test", tenant.subdomain)
            }),
        )
        .await?;
    let report_id = report["id"].as_i64().expect("report id");
    assert_eq!(report["execution_count"], 0);

    // No fuel records yet, so nothing is mailed
    let res = tenant.post(&format!("/api/scheduled-reports/{}/run", report_id), json!({})).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome = data_of(res).await?;
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["records_count"], 0);

    let reports = data_of(tenant.get("/api/scheduled-reports").await?).await?;
    let stored = reports
        .as_array()
        .and_then(|all| all.iter().find(|r| r["id"] == report_id))
        .expect("report listed");
    assert_eq!(stored["execution_count"], 1);
    assert!(stored["last_run_date"].is_string());
    assert!(stored["next_run_date"].is_string());

    let history = data_of(tenant.get(&format!("/api/scheduled-reports/{}/history", report_id)).await?).await?;
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    Ok(())
}
