use anyhow::Context;
use axum::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User, UserChanges, UserLookup, UserRow, DEFAULT_PHOTO},
    error::{AppError, AppResult},
    query::{sql, QueryDescriptor},
};

/// Credential store used by the auth service and the admin user endpoints.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Inactive users are returned too; callers decide what that means.
    async fn find_by(&self, lookup: &UserLookup) -> AppResult<Option<User>>;

    /// Fails with `AppError::Conflict` when the email is taken.
    async fn insert(&self, user: NewUser) -> AppResult<User>;

    /// Returns `None` when no user has `id`.
    async fn update_fields(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>>;

    /// Active users matching the descriptor, plus the total match count.
    async fn list(&self, scope: &QueryDescriptor) -> AppResult<(Vec<User>, u64)>;

    /// Hard delete. Returns `false` when no user has `id`.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

const USER_COLUMNS: &str = "id, name, email, photo, role, password_hash, password_changed_at, \
                            password_reset_token, password_reset_expires, active, created_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn email_taken(e: sqlx::Error, what: &'static str) -> AppError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Email already registered".into())
        }
        other => AppError::Internal(anyhow::Error::new(other).context(what)),
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by(&self, lookup: &UserLookup) -> AppResult<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE "));
        match lookup {
            UserLookup::Id(id) => qb.push("id = ").push_bind(*id),
            UserLookup::Email(email) => qb.push("email = ").push_bind(email.clone()),
            UserLookup::ResetToken(hash) => qb.push("password_reset_token = ").push_bind(hash.clone()),
        };
        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.db)
            .await
            .context("find user")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role, photo, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(DEFAULT_PHOTO)
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| email_taken(e, "insert user"))?;
        Ok(User::try_from(row)?)
    }

    async fn update_fields(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        let mut set = qb.separated(", ");
        // Always touch one column so an empty change set is still a valid statement.
        set.push("id = id");
        if let Some(name) = changes.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(email) = changes.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(hash) = changes.password_hash {
            set.push("password_hash = ").push_bind_unseparated(hash);
        }
        if let Some(at) = changes.password_changed_at {
            set.push("password_changed_at = ").push_bind_unseparated(at);
        }
        match changes.password_reset {
            Some(Some((token_hash, expires))) => {
                set.push("password_reset_token = ").push_bind_unseparated(token_hash);
                set.push("password_reset_expires = ").push_bind_unseparated(expires);
            }
            Some(None) => {
                set.push("password_reset_token = NULL");
                set.push("password_reset_expires = NULL");
            }
            None => {}
        }
        if let Some(active) = changes.active {
            set.push("active = ").push_bind_unseparated(active);
        }
        if let Some(role) = changes.role {
            set.push("role = ").push_bind_unseparated(role.as_str());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {USER_COLUMNS}"));

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.db)
            .await
            .map_err(|e| email_taken(e, "update user"))?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn list(&self, scope: &QueryDescriptor) -> AppResult<(Vec<User>, u64)> {
        const BASE: &str = "active = TRUE";
        let mut page = sql::select_page(&format!("SELECT {USER_COLUMNS} FROM users"), BASE, scope);
        let rows = page
            .build_query_as::<UserRow>()
            .fetch_all(&self.db)
            .await
            .context("list users")?;
        let mut count = sql::count("users", BASE, scope);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .context("count users")?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((users, total as u64))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(done.rows_affected() > 0)
    }
}
