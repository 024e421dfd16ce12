use std::collections::BTreeMap;

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::mail::{self, looks_like_email, Mailer, SmtpMailer};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::settings_service::SettingsService;

/// GET /api/settings
pub async fn settings_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<BTreeMap<String, String>> {
    user.require("view_settings")?;
    Ok(ApiResponse::success(SettingsService::new(pool).all().await?))
}

/// PUT /api/settings - upsert the given keys, returns the full set
pub async fn settings_put(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<BTreeMap<String, String>>,
) -> ApiResult<BTreeMap<String, String>> {
    user.require("edit_settings")?;
    let service = SettingsService::new(pool);
    let changed = service.upsert_many(&body).await?;
    tracing::info!("{} settings updated by {}", changed, user.employee.username);
    Ok(ApiResponse::success(service.all().await?))
}

#[derive(Debug, Deserialize)]
pub struct TestEmailRequest {
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct TestEmailResult {
    pub sent_to: String,
}

/// POST /api/settings/test-email
pub async fn settings_test_email(
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<TestEmailRequest>,
) -> ApiResult<TestEmailResult> {
    user.require("edit_settings")?;
    let to = body.to.trim();
    if !looks_like_email(to) {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    SmtpMailer::from_config().send(mail::test_email(to)).await?;
    Ok(ApiResponse::success(TestEmailResult { sent_to: to.to_string() }))
}
