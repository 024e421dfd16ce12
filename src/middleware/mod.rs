pub mod auth;
pub mod response;
pub mod validate_tenant;
pub mod validate_user;

pub use auth::{jwt_auth_middleware, root_auth_middleware, AuthUser};
pub use response::{ApiResponse, ApiResult, FileDownload};
pub use validate_tenant::{resolve_company, validate_tenant_middleware, SessionHint, TenantPool};
pub use validate_user::{validate_user_middleware, CurrentUser};
