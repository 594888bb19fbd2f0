use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::Duration;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{generate_reset_token, hash_reset_token, Hasher, MIN_PASSWORD_LEN},
        repo::UserRepo,
        repo_types::{NewUser, Role, User, UserChanges, UserLookup},
    },
    clock::Clock,
    error::{AppError, AppResult, AuthFailure},
    mail::Mailer,
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_new_password(password: &str, confirm: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirm {
        return Err(AppError::validation("Passwords are not the same"));
    }
    Ok(())
}

/// A freshly issued session token and the user it belongs to.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// What the client should overwrite its token with on logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnd {
    pub placeholder: &'static str,
    pub expires_in: Duration,
}

pub struct SignUp {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepo>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    keys: JwtKeys,
    hasher: Hasher,
    reset_ttl: Duration,
    public_url: String,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            mailer: state.mailer.clone(),
            clock: state.clock.clone(),
            keys: JwtKeys::from_ref(state),
            hasher: state.hasher.clone(),
            reset_ttl: Duration::minutes(state.config.reset_ttl_minutes),
            public_url: state.config.public_url.trim_end_matches('/').to_string(),
        }
    }
}

impl AuthService {
    fn issue(&self, user: User) -> AppResult<Session> {
        let token = self.keys.sign(user.id, self.clock.now())?;
        Ok(Session { token, user })
    }

    pub async fn sign_up(&self, input: SignUp) -> AppResult<Session> {
        let name = input.name.trim().to_string();
        let email = normalize_email(&input.email);
        if name.is_empty() {
            return Err(AppError::validation("Please tell us your name"));
        }
        if !is_valid_email(&email) {
            return Err(AppError::validation("Please provide a valid email"));
        }
        check_new_password(&input.password, &input.password_confirm)?;

        if self.users.find_by(&UserLookup::Email(email.clone())).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = self
            .users
            .insert(NewUser {
                name,
                email,
                password_hash,
                role: Role::User,
                created_at: self.clock.now(),
            })
            .await?;
        self.issue(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("Please provide email and password"));
        }
        let found = self.users.find_by(&UserLookup::Email(normalize_email(email))).await?;
        let user = match found {
            Some(user) if user.active => user,
            _ => {
                self.hasher.verify_dummy(password);
                return Err(AppError::Authentication(AuthFailure::InvalidCredentials));
            }
        };
        if !self.hasher.verify(password, &user.password_hash)? {
            return Err(AppError::Authentication(AuthFailure::InvalidCredentials));
        }
        self.issue(user)
    }

    /// Tokens are stateless: the server cannot revoke one, only tell the
    /// client to drop it.
    pub fn logout(&self) -> SessionEnd {
        SessionEnd { placeholder: "loggedout", expires_in: Duration::seconds(10) }
    }

    pub async fn protect(&self, token: Option<&str>) -> AppResult<User> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Authentication(AuthFailure::NotLoggedIn))?;

        let claims = self
            .keys
            .verify(token, self.clock.now())
            .map_err(|_| AppError::Authentication(AuthFailure::InvalidToken))?;

        let user = self
            .users
            .find_by(&UserLookup::Id(claims.sub))
            .await?
            .ok_or(AppError::Authentication(AuthFailure::UserGone))?;

        if !user.active {
            return Err(AppError::Authentication(AuthFailure::Inactive));
        }
        if let Some(changed) = user.password_changed_at {
            if claims.iat < changed.unix_timestamp() {
                return Err(AppError::Authentication(AuthFailure::PasswordChanged));
            }
        }
        Ok(user)
    }

    /// Same outcome whether or not the email belongs to anyone.
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        let user = match self.users.find_by(&UserLookup::Email(email)).await? {
            Some(user) if user.active => user,
            _ => return Ok(()),
        };

        let (raw, hashed) = generate_reset_token();
        let expires = self.clock.now() + self.reset_ttl;
        self.users
            .update_fields(
                user.id,
                UserChanges { password_reset: Some(Some((hashed, expires))), ..Default::default() },
            )
            .await?;

        let url = format!("{}/api/v1/users/resetPassword/{raw}", self.public_url);
        if let Err(send_err) = self.mailer.send_password_reset(&user.email, &user.name, &url).await {
            self.users
                .update_fields(user.id, UserChanges { password_reset: Some(None), ..Default::default() })
                .await
                .map_err(|rollback| {
                    anyhow::anyhow!("reset token rollback failed after mail error ({send_err}): {rollback}")
                })?;
            return Err(AppError::Service(
                "There was an error sending the email. Try again later!".into(),
            ));
        }
        Ok(())
    }

    pub async fn reset_password(&self, raw_token: &str, password: &str, confirm: &str) -> AppResult<Session> {
        let now = self.clock.now();
        let user = self
            .users
            .find_by(&UserLookup::ResetToken(hash_reset_token(raw_token)))
            .await?
            .filter(|u| u.active && u.password_reset_expires.is_some_and(|exp| exp > now))
            .ok_or(AppError::Authentication(AuthFailure::ResetTokenInvalid))?;

        check_new_password(password, confirm)?;
        let changes = UserChanges {
            password_hash: Some(self.hasher.hash(password)?),
            password_changed_at: Some(now),
            password_reset: Some(None),
            ..Default::default()
        };
        let user = self
            .users
            .update_fields(user.id, changes)
            .await?
            .ok_or(AppError::Authentication(AuthFailure::UserGone))?;
        self.issue(user)
    }

    pub async fn update_password(
        &self,
        current_user: &User,
        current_password: &str,
        password: &str,
        confirm: &str,
    ) -> AppResult<Session> {
        if !self.hasher.verify(current_password, &current_user.password_hash)? {
            return Err(AppError::Authentication(AuthFailure::InvalidCredentials));
        }
        check_new_password(password, confirm)?;

        let changes = UserChanges {
            password_hash: Some(self.hasher.hash(password)?),
            password_changed_at: Some(self.clock.now()),
            ..Default::default()
        };
        let user = self
            .users
            .update_fields(current_user.id, changes)
            .await?
            .ok_or(AppError::Authentication(AuthFailure::UserGone))?;
        self.issue(user)
    }
}
