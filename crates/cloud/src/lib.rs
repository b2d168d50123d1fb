//! Hosted storage backends.

pub mod s3;

pub use s3::{S3BlobStore, S3Config};
