pub mod dashboard;
pub mod health;
pub mod logger;
pub mod metrics;
