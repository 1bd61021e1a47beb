pub mod app;
pub mod config;
pub mod error;
pub mod models;
