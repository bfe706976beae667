//! Postgres job status store.
//!
//! This crate provides:
//! - Connection pool configuration
//! - Job lookup joined with the owner's email
//! - Transactional status updates with an append-only history

pub mod client;
pub mod error;
pub mod metrics;
pub mod repo;

pub use client::{connect, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use repo::JobRepository;
