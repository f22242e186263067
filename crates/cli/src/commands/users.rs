//! Account bootstrap.

use emporium_api::services::auth::{AuthService, JwtKeys};
use emporium_core::Role;

use super::{CliError, Context};

/// Create an account with any role. This is the only way to create the first
/// `SUPER_ADMIN`.
///
/// # Errors
///
/// Returns `CliError::Auth` for an invalid email, a weak password or an
/// already registered address.
pub async fn create(
    ctx: &Context,
    email: &str,
    name: &str,
    role: Role,
    password: &str,
) -> Result<(), CliError> {
    let keys = JwtKeys::new(&ctx.config.jwt);
    let user = AuthService::new(&ctx.pool, &keys)
        .create_user(email, password, name, role)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}
