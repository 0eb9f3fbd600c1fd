pub mod auth;
pub mod cache;
pub mod config;
pub mod engine;
pub mod http;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod payment;
pub mod records;
pub mod scheduler;
pub mod tables;
