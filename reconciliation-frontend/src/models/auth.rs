use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use service_core::error::AppError;
use service_core::observability::REQUEST_ID_HEADER;

/// Caller identity forwarded to the ERP backend.
///
/// Built per request and handed to every outbound call; nothing reads it
/// from global state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub access_token: String,
    pub user_id: Option<String>,
    pub request_id: Option<String>,
}

impl AuthContext {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user_id: None,
            request_id: None,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let access_token = header(AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer ").map(|t| t.trim().to_string()))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing bearer token")))?;

        Ok(Self {
            access_token,
            user_id: header("x-user-id"),
            request_id: header(REQUEST_ID_HEADER),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<AuthContext, AppError> {
        let (mut parts, _) = request.into_parts();
        AuthContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_bearer_token_and_ids() {
        let request = Request::builder()
            .header("authorization", "Bearer tok-1")
            .header("x-user-id", "u-7")
            .header("x-request-id", "r-9")
            .body(())
            .unwrap();

        let auth = extract(request).await.unwrap();
        assert_eq!(auth.access_token, "tok-1");
        assert_eq!(auth.user_id.as_deref(), Some("u-7"));
        assert_eq!(auth.request_id.as_deref(), Some("r-9"));
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let request = Request::builder().body(()).unwrap();
        let err = extract(request).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let request = Request::builder()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap();
        assert!(extract(request).await.is_err());
    }
}
