//! Domain logic for the school website builder.
//!
//! Everything here is free of database and HTTP concerns: theme schemas and
//! their validator, snapshot traversal, image normalization and the blob
//! storage contract.

pub mod content;
pub mod error;
pub mod imaging;
pub mod roles;
pub mod storage;
pub mod theme;
pub mod types;
pub mod validation;
