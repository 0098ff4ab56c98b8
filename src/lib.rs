pub mod alerts;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod feed;
pub mod history;
pub mod sensors;
pub mod thresholds;
pub mod weather;
