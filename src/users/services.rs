use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepo,
        repo_types::{User, UserChanges, UserLookup},
        services::{is_valid_email, normalize_email},
    },
    error::{AppError, AppResult, AuthFailure},
    query::{Direction, FieldKind, FieldSpec, QueryScope},
    users::dto::{AdminUpdateUserRequest, UpdateMeRequest},
};

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("name", "name", FieldKind::Text),
    FieldSpec::new("email", "email", FieldKind::Text),
    FieldSpec::new("role", "role", FieldKind::Text),
    FieldSpec::new("photo", "photo", FieldKind::Text),
    FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp),
];

/// Admin listing; asking for a page past the end is a 404.
pub const USER_SCOPE: QueryScope = QueryScope::new(
    FIELDS,
    FieldSpec::new("id", "id", FieldKind::Id),
    &[("createdAt", Direction::Desc)],
)
.strict();

fn refuse_password(password: Option<&str>, confirm: Option<&str>) -> AppResult<()> {
    if password.is_some() || confirm.is_some() {
        return Err(AppError::validation(
            "This route is not for password updates. Please use /updateMyPassword.",
        ));
    }
    Ok(())
}

/// Name and email edits shared by the self-service and admin updates.
fn profile_changes(user: &User, name: Option<String>, email: Option<String>) -> AppResult<UserChanges> {
    let mut changes = UserChanges::default();
    if let Some(name) = name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("Please tell us your name"));
        }
        changes.name = Some(name);
    }
    if let Some(email) = email {
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(AppError::validation("Please provide a valid email"));
        }
        if email != user.email {
            changes.email = Some(email);
        }
    }
    Ok(changes)
}

pub async fn update_me(users: &dyn UserRepo, user: &User, patch: UpdateMeRequest) -> AppResult<User> {
    refuse_password(patch.password.as_deref(), patch.password_confirm.as_deref())?;
    let changes = profile_changes(user, patch.name, patch.email)?;
    users
        .update_fields(user.id, changes)
        .await?
        .ok_or(AppError::Authentication(AuthFailure::UserGone))
}

fn user_not_found() -> AppError {
    AppError::NotFound("No user found with that ID".into())
}

/// Soft delete: the row stays, the account can no longer log in.
pub async fn deactivate(users: &dyn UserRepo, user: &User) -> AppResult<()> {
    users
        .update_fields(user.id, UserChanges { active: Some(false), ..Default::default() })
        .await?
        .ok_or(AppError::Authentication(AuthFailure::UserGone))?;
    Ok(())
}

pub async fn find_active(users: &dyn UserRepo, id: Uuid) -> AppResult<User> {
    users
        .find_by(&UserLookup::Id(id))
        .await?
        .filter(|u| u.active)
        .ok_or_else(user_not_found)
}

/// Admin edit of another account: name, email and role only.
pub async fn admin_update(users: &dyn UserRepo, id: Uuid, patch: AdminUpdateUserRequest) -> AppResult<User> {
    refuse_password(patch.password.as_deref(), patch.password_confirm.as_deref())?;
    let target = find_active(users, id).await?;
    let mut changes = profile_changes(&target, patch.name, patch.email)?;
    changes.role = patch.role;
    users.update_fields(id, changes).await?.ok_or_else(user_not_found)
}

/// Removes the row for good. Deactivated accounts count as already gone.
pub async fn delete_user(users: &dyn UserRepo, id: Uuid) -> AppResult<()> {
    find_active(users, id).await?;
    if !users.delete(id).await? {
        return Err(user_not_found());
    }
    Ok(())
}
