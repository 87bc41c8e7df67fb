// src/api/mod.rs
pub mod handlers;
pub mod registry;
pub mod routes;

pub use registry::{MethodRegistry, REQUIRED_METHODS};
