// Protected tier: /api/*, behind JWT, tenant and user validation.
// Every handler receives the tenant pool, the resolved company and the
// current employee with their permission set as request extensions.

pub mod analytics;
pub mod assignments;
pub mod audit;
pub mod auth;
pub mod employees;
pub mod fuel;
pub mod job_cards;
pub mod maintenance;
pub mod requisitions;
pub mod roles;
pub mod scheduled_reports;
pub mod settings;
pub mod vehicles;
