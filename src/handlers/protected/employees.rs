use axum::{extract::Path, Extension, Json};

use crate::database::models::Employee;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::employee_service::{EmployeeService, EmployeeUpdate, NewEmployee};
use crate::tenant::CompanyContext;

/// GET /api/employees
pub async fn employee_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<Vec<Employee>> {
    user.require("view_employees")?;
    Ok(ApiResponse::success(EmployeeService::new(pool).list().await?))
}

/// GET /api/employees/:id
pub async fn employee_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<Employee> {
    user.require("view_employees")?;
    Ok(ApiResponse::success(EmployeeService::new(pool).get(id).await?))
}

/// POST /api/employees - subject to the company's user limit
pub async fn employee_create(
    Extension(user): Extension<CurrentUser>,
    Extension(company): Extension<CompanyContext>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewEmployee>,
) -> ApiResult<Employee> {
    user.require("add_employee")?;
    let employee = EmployeeService::new(pool).create(&body, company.max_users).await?;
    tracing::info!("Employee '{}' created by '{}'", employee.username, user.employee.username);
    Ok(ApiResponse::created(employee))
}

/// PUT /api/employees/:id
pub async fn employee_update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
    Json(body): Json<EmployeeUpdate>,
) -> ApiResult<Employee> {
    user.require("edit_employee")?;
    if body.role.is_some() {
        // Changing someone's role is a grant of permissions
        user.require("manage_roles")?;
    }
    Ok(ApiResponse::success(EmployeeService::new(pool).update(id, &body).await?))
}

/// DELETE /api/employees/:id
pub async fn employee_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require("delete_employee")?;
    EmployeeService::new(pool).delete(id, user.id()).await?;
    Ok(ApiResponse::no_content())
}
