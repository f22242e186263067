//! User administration.

use sqlx::PgPool;
use tracing::instrument;

use emporium_core::UserId;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::user::{CurrentUser, User, UserFilter, UserUpdate};
use crate::models::{Paginated, Pagination, optional_text, require_text};

pub struct UserService<'a> {
    users: UserRepository<'a>,
}

impl<'a> UserService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<Paginated<User>, AppError> {
        let (items, total) = self.users.list(filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist.
    pub async fn get(&self, id: UserId) -> Result<User, AppError> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Edit a profile, role or active flag.
    ///
    /// Role changes need `actor.role.can_assign` for both the current and the
    /// new role. Nobody changes their own role or deactivates themselves.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` when the role rules are broken.
    #[instrument(skip(self, actor, update), fields(actor_id = %actor.id))]
    pub async fn update(
        &self,
        actor: &CurrentUser,
        id: UserId,
        mut update: UserUpdate,
    ) -> Result<User, AppError> {
        let target = self.get(id).await?;

        if let Some(name) = update.name.as_deref() {
            update.name = Some(require_text("name", name, 120).map_err(AppError::BadRequest)?);
        }
        update.phone = update
            .phone
            .map(|phone| phone.and_then(|p| optional_text(Some(&p))));

        check_update_rules(actor, &target, &update)?;

        let user = self.users.update(id, &update).await?;
        if update.role.is_some_and(|r| r != target.role) {
            tracing::info!(user_id = %id, from = %target.role, to = %user.role, "Role changed");
        }
        Ok(user)
    }

    /// Delete an account. Super admins only; never yourself.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden`, `AppError::NotFound`, or
    /// `AppError::Conflict` when orders reference the account.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete(&self, actor: &CurrentUser, id: UserId) -> Result<(), AppError> {
        if actor.role != emporium_core::Role::SuperAdmin {
            return Err(AppError::forbidden("only a super admin can delete accounts"));
        }
        if actor.id == id {
            return Err(AppError::bad_request("you cannot delete your own account"));
        }
        self.users.delete(id).await?;
        Ok(())
    }
}

fn check_update_rules(
    actor: &CurrentUser,
    target: &User,
    update: &UserUpdate,
) -> Result<(), AppError> {
    let is_self = actor.id == target.id;

    if let Some(role) = update.role
        && role != target.role
    {
        if is_self {
            return Err(AppError::forbidden("you cannot change your own role"));
        }
        if !actor.role.can_assign(target.role) || !actor.role.can_assign(role) {
            return Err(AppError::forbidden(format!(
                "{} cannot change a {} account to {role}",
                actor.role, target.role
            )));
        }
    }

    if update.is_active == Some(false) && is_self {
        return Err(AppError::forbidden("you cannot deactivate your own account"));
    }

    // Admins may not edit peers or superiors at all.
    if !is_self && !actor.role.can_assign(target.role) {
        return Err(AppError::forbidden(format!(
            "{} cannot edit a {} account",
            actor.role, target.role
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use emporium_core::{Email, Role};

    use super::*;

    fn actor(id: i32, role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("actor@shop.test").unwrap(),
            name: "Actor".into(),
            role,
        }
    }

    fn target(id: i32, role: Role) -> User {
        User {
            id: UserId::new(id),
            email: Email::parse("target@shop.test").unwrap(),
            name: "Target".into(),
            phone: None,
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn role_change(role: Role) -> UserUpdate {
        UserUpdate {
            role: Some(role),
            ..UserUpdate::default()
        }
    }

    #[test]
    fn test_admin_can_promote_to_moderator() {
        let res = check_update_rules(
            &actor(1, Role::Admin),
            &target(2, Role::User),
            &role_change(Role::Moderator),
        );
        assert!(res.is_ok());
    }

    #[test]
    fn test_admin_cannot_grant_admin() {
        let err = check_update_rules(
            &actor(1, Role::Admin),
            &target(2, Role::User),
            &role_change(Role::Admin),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_admin_cannot_touch_super_admin() {
        let update = UserUpdate {
            name: Some("Renamed".into()),
            ..UserUpdate::default()
        };
        let err =
            check_update_rules(&actor(1, Role::Admin), &target(2, Role::SuperAdmin), &update)
                .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_super_admin_grants_admin() {
        assert!(
            check_update_rules(
                &actor(1, Role::SuperAdmin),
                &target(2, Role::Support),
                &role_change(Role::Admin),
            )
            .is_ok()
        );
    }

    #[test]
    fn test_no_self_demotion_or_deactivation() {
        let me = actor(1, Role::SuperAdmin);
        let myself = target(1, Role::SuperAdmin);
        assert!(check_update_rules(&me, &myself, &role_change(Role::User)).is_err());
        let deactivate = UserUpdate {
            is_active: Some(false),
            ..UserUpdate::default()
        };
        assert!(check_update_rules(&me, &myself, &deactivate).is_err());
        let rename = UserUpdate {
            name: Some("Still me".into()),
            ..UserUpdate::default()
        };
        assert!(check_update_rules(&me, &myself, &rename).is_ok());
    }
}
