use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::AppError;

/// `Json<T>` whose rejection is an [`AppError::Validation`], so malformed or
/// incomplete bodies are answered like any other invalid input.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(validation_from(rejection)),
        }
    }
}

fn validation_from(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            AppError::Validation("expected a JSON request body".into())
        }
        other => AppError::Validation(other.body_text()),
    }
}

/// Path ids that are not UUIDs cannot name a user.
pub fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request as HttpRequest},
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Creds {
        email: String,
    }

    #[tokio::test]
    async fn missing_field_becomes_validation_error() {
        let req = HttpRequest::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"password":"x"}"#))
            .unwrap();
        let err = match JsonBody::<Creds>::from_request(req, &()).await {
            Err(err) => err,
            Ok(JsonBody(c)) => panic!("unexpected body {}", c.email),
        };
        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("email")));
    }

    #[tokio::test]
    async fn wrong_content_type_is_rejected() {
        let req = HttpRequest::builder()
            .body(Body::from(r#"{"email":"a@b.com"}"#))
            .unwrap();
        let res = JsonBody::<Creds>::from_request(req, &()).await;
        assert!(matches!(res, Err(AppError::Validation(_))));
    }

    #[test]
    fn non_uuid_path_is_not_found() {
        assert!(matches!(parse_user_id("42"), Err(AppError::NotFound)));
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
    }
}
