pub mod admin;
pub mod assets;
pub mod downloads;
pub mod preview;
pub mod themes;
pub mod uploads;
pub mod versions;
pub mod websites;

use schoolsite_core::types::DbId;
use schoolsite_db::models::website::Website;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Load website `id`, rejecting callers who neither own it nor are super-admins.
pub(crate) async fn managed_website(
    state: &AppState,
    user: &AuthUser,
    id: DbId,
) -> AppResult<Website> {
    let website = state.orchestrator.website(id).await?;
    user.ensure_can_manage(&website)?;
    Ok(website)
}
