//! Well-known role name constants.
//!
//! Tokens are issued by the account service; these are the role names it
//! places in the `role` claim.

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_USER: &str = "user";
