pub mod config;
pub mod db;
pub mod error;
pub mod monitoring;
pub mod prediction;
pub mod stats;
pub mod tracking;
