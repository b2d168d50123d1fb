//! Authentication primitives.
//!
//! - [`jwt`] -- validation of HS256 access tokens issued by the account service.

pub mod jwt;
