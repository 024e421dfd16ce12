pub mod assignment;
pub mod audit;
pub mod company;
pub mod employee;
pub mod fuel;
pub mod job_card;
pub mod maintenance;
pub mod report;
pub mod requisition;
pub mod role;
pub mod vehicle;

pub use assignment::Assignment;
pub use audit::AuditEntry;
pub use company::Company;
pub use employee::Employee;
pub use fuel::FuelRecord;
pub use job_card::{JobCard, JobCardItem};
pub use maintenance::ServiceRecord;
pub use report::{ReportExecution, ScheduledReport};
pub use requisition::Requisition;
pub use role::{Permission, Role};
pub use vehicle::Vehicle;
