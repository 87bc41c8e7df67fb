// src/database/mod.rs
pub mod pool;
pub mod cdr_store;

pub use pool::{create_pool, DbPool};
pub use cdr_store::{MemoryCdrStore, PostgresCdrStore};
