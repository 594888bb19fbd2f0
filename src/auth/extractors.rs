use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::{repo_types::User, services::AuthService};
use crate::{error::AppError, state::AppState};

/// Name of the cookie carrying the session token.
pub const JWT_COOKIE: &str = "jwt";

/// The authenticated, active user behind the request.
pub struct CurrentUser(pub User);

/// `Authorization: Bearer <token>` wins over the `jwt` cookie.
fn session_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")));
    match bearer {
        Some(token) => Some(token.to_string()),
        None => CookieJar::from_headers(&parts.headers)
            .get(JWT_COOKIE)
            .map(|c| c.value().to_string()),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts);
        let user = AuthService::from_ref(state).protect(token.as_deref()).await?;
        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: (&str, &str)) -> Parts {
        let (parts, _) = Request::builder().header(header.0, header.1).body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn bearer_header() {
        assert_eq!(session_token(&parts(("authorization", "Bearer abc"))).as_deref(), Some("abc"));
        assert_eq!(session_token(&parts(("authorization", "Basic abc"))), None);
    }

    #[test]
    fn cookie_fallback() {
        assert_eq!(session_token(&parts(("cookie", "theme=dark; jwt=xyz"))).as_deref(), Some("xyz"));
    }
}
