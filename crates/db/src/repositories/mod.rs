//! Repository layer.
//!
//! Each repository is a zero-sized struct whose async methods take a
//! `&PgPool` and return `Result<_, sqlx::Error>`.

pub mod asset_repo;
pub mod site_version_repo;
pub mod website_repo;

pub use asset_repo::AssetRepo;
pub use site_version_repo::SiteVersionRepo;
pub use website_repo::WebsiteRepo;
