pub mod analytics;
pub mod app;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod middleware;
pub mod permissions;
pub mod reports;
pub mod scheduler;
pub mod services;
pub mod tenant;
