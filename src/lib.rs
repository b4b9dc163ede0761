pub mod analytics;
pub mod api;
pub mod clock;
pub mod config;
pub mod models;
pub mod storage;
