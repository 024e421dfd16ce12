pub mod manager;
pub mod models;
pub mod schema;
pub mod seed;

pub use manager::{DatabaseError, DatabaseManager};
