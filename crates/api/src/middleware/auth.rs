//! Bearer-token authentication extractors and role guards.
//!
//! ```rust,ignore
//! async fn me(AuthUser(user): AuthUser) -> Json<CurrentUser> { Json(user) }
//!
//! async fn create(Require { user, .. }: Require<ManageCatalog>, ...) { ... }
//! ```

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use emporium_core::Role;

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthService, Claims};
use crate::state::AppState;

/// Pull the token out of `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn claims(parts: &Parts, state: &AppState) -> Result<Claims, AppError> {
    let token = bearer_token(&parts.headers)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_owned()))?;
    Ok(state.jwt().verify(token)?)
}

/// Load the account behind `claims`, once per request.
async fn resolve(
    parts: &mut Parts,
    state: &AppState,
    claims: &Claims,
) -> Result<CurrentUser, AppError> {
    if let Some(user) = parts.extensions.get::<CurrentUser>() {
        return Ok(user.clone());
    }

    let user: CurrentUser = AuthService::new(state.pool(), state.jwt())
        .current_user(claims)
        .await?
        .into();

    Span::current().record("user_id", user.id.as_i32());
    set_sentry_user(user.id.as_i32(), user.email.as_str());
    parts.extensions.insert(user.clone());
    Ok(user)
}

/// Any signed-in, active account. Rejects with 401 (missing or bad token) or
/// 403 (deactivated account).
pub struct AuthUser(pub CurrentUser);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims(parts, state)?;
        resolve(parts, state, &claims).await.map(Self)
    }
}

/// The caller if a token was sent. A token that is present but invalid is
/// still rejected.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(Self(None));
        }
        let claims = claims(parts, state)?;
        resolve(parts, state, &claims).await.map(|u| Self(Some(u)))
    }
}

impl OptionalAuth {
    /// Whether inactive catalog entries should be visible to this caller.
    #[must_use]
    pub fn sees_inactive_catalog(&self) -> bool {
        self.0.as_ref().is_some_and(|u| u.role.can_manage_catalog())
    }
}

/// A capability checked against the caller's role.
pub trait Permission {
    const DENIED: &'static str;

    fn allows(role: Role) -> bool;
}

macro_rules! permission {
    ($(#[$meta:meta])* $name:ident, $check:ident, $denied:literal) => {
        $(#[$meta])*
        pub struct $name;

        impl Permission for $name {
            const DENIED: &'static str = $denied;

            fn allows(role: Role) -> bool {
                role.$check()
            }
        }
    };
}

permission!(
    /// `SUPER_ADMIN`, `ADMIN`.
    ManageUsers, can_manage_users, "user management requires an admin role"
);
permission!(
    /// Admins and content managers.
    ManageCatalog, can_manage_catalog, "catalog management requires a catalog role"
);
permission!(ManageContent, can_manage_content, "content management requires a content role");
permission!(
    /// Admins and moderators.
    Moderate, can_moderate, "review moderation requires a moderator role"
);
permission!(HandleSupport, can_handle_support, "support access requires a support role");
permission!(ManageOrders, can_manage_orders, "order management requires an admin role");
permission!(ViewAllOrders, can_view_all_orders, "viewing all orders requires a staff role");

/// A signed-in account whose role grants `P`. Rejects with 403 otherwise.
///
/// The role in the token is checked first so a plainly unauthorized caller is
/// turned away without a database round trip; the stored role is checked
/// again after the account is loaded.
pub struct Require<P> {
    pub user: CurrentUser,
    permission: PhantomData<P>,
}

impl<P: Permission> FromRequestParts<AppState> for Require<P> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims(parts, state)?;
        if !P::allows(claims.role) {
            return Err(AppError::forbidden(P::DENIED));
        }
        let user = resolve(parts, state, &claims).await?;
        if !P::allows(user.role) {
            return Err(AppError::forbidden(P::DENIED));
        }
        Ok(Self {
            user,
            permission: PhantomData,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer  abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic dXNlcg==")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_permissions_follow_roles() {
        assert!(ManageCatalog::allows(Role::ContentManager));
        assert!(!ManageCatalog::allows(Role::Moderator));
        assert!(Moderate::allows(Role::Admin));
        assert!(!Moderate::allows(Role::Support));
        assert!(HandleSupport::allows(Role::Support));
        assert!(!ManageUsers::allows(Role::ContentManager));
        assert!(ViewAllOrders::allows(Role::Support));
        assert!(!ManageOrders::allows(Role::Support));
    }
}
