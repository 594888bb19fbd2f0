//! Request body extraction that reports failures in the API's error envelope.
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Like [`Json`], but a missing field, bad JSON or a wrong content type is an
/// `AppError::Validation` instead of axum's plain-text rejection.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::header};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Confirm {
        password_confirm: String,
    }

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_field_is_a_validation_error() {
        let err = ValidJson::<Confirm>::from_request(json_request("{}"), &()).await.unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("passwordConfirm")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_content_type_is_a_validation_error() {
        let req = Request::builder().method("POST").body(Body::from("{}")).unwrap();
        let err = ValidJson::<Confirm>::from_request(req, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn well_formed_body_passes_through() {
        let ValidJson(body) = ValidJson::<Confirm>::from_request(json_request(r#"{"passwordConfirm":"x"}"#), &())
            .await
            .unwrap();
        assert_eq!(body.password_confirm, "x");
    }
}
