use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, ResetPasswordRequest,
            SignupRequest, UpdatePasswordRequest,
        },
        extractors::{CurrentUser, JWT_COOKIE},
        services::{AuthService, Session, SignUp},
    },
    config::JwtConfig,
    error::AppResult,
    extract::ValidJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/logout", get(logout))
        .route("/users/forgotPassword", post(forgot_password))
        .route("/users/resetPassword/:token", patch(reset_password))
        .route("/users/updateMyPassword", patch(update_my_password))
}

/// The `jwt` cookie, with the same attributes whether it carries a session or
/// the logout placeholder.
fn jwt_cookie(value: String, max_age: time::Duration, cfg: &JwtConfig) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(cfg.cookie_secure)
        .max_age(max_age)
        .build()
}

fn session_cookie(token: String, cfg: &JwtConfig) -> Cookie<'static> {
    jwt_cookie(token, time::Duration::days(cfg.cookie_ttl_days), cfg)
}

/// Sets the session cookie and echoes the token in the body.
fn send_session(state: &AppState, jar: CookieJar, session: Session) -> (CookieJar, Json<AuthResponse>) {
    let jar = jar.add(session_cookie(session.token.clone(), &state.config.jwt));
    (jar, Json(AuthResponse::from(session)))
}

#[instrument(skip(state, jar, payload))]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(payload): ValidJson<SignupRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let session = AuthService::from_ref(&state)
        .sign_up(SignUp {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            password_confirm: payload.password_confirm,
        })
        .await?;
    info!(user_id = %session.user.id, email = %session.user.email, "user registered");
    let (jar, body) = send_session(&state, jar, session);
    Ok((StatusCode::CREATED, jar, body))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = AuthService::from_ref(&state)
        .login(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            if e.auth_failure().is_some() {
                warn!(email = %payload.email.trim(), "login rejected");
            }
            e
        })?;
    info!(user_id = %session.user.id, "user logged in");
    Ok(send_session(&state, jar, session))
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let end = AuthService::from_ref(&state).logout();
    let cookie = jwt_cookie(end.placeholder.to_string(), end.expires_in, &state.config.jwt);
    (jar.add(cookie), Json(MessageResponse::success("Logged out")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    AuthService::from_ref(&state).forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse::success(
        "If that email is registered, a reset link has been sent",
    )))
}

#[instrument(skip(state, jar, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    ValidJson(payload): ValidJson<ResetPasswordRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = AuthService::from_ref(&state)
        .reset_password(&token, &payload.password, &payload.password_confirm)
        .await?;
    info!(user_id = %session.user.id, "password reset");
    Ok(send_session(&state, jar, session))
}

#[instrument(skip(state, user, jar, payload), fields(user_id = %user.id))]
pub async fn update_my_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    ValidJson(payload): ValidJson<UpdatePasswordRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = AuthService::from_ref(&state)
        .update_password(&user, &payload.password_current, &payload.password, &payload.password_confirm)
        .await?;
    info!(user_id = %session.user.id, "password updated");
    Ok(send_session(&state, jar, session))
}
