// src/lib.rs
pub mod api;
pub mod cache;
pub mod cgrates;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod traits;
