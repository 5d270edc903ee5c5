pub mod api;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod gateway;
pub mod history;
