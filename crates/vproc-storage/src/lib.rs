//! S3 artifact storage client.
//!
//! This crate provides:
//! - Input video download from the upload bucket
//! - Archive upload to the output bucket

pub mod client;
pub mod error;

pub use client::{S3Client, S3Config, StaticCredentials};
pub use error::{StorageError, StorageResult};
