// HTTP calls to the validation and login endpoints

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{
    DevTokenResponse, DevTokenTerm, ErrorBody, LegacyCredentials, LoginResponse, ValidateResponse,
};
use crate::error::{AuthError, Result};

pub const VALIDATE_PATH: &str = "/swagger-dev/token/validate";
pub const TEST_LOGIN_PATH: &str = "/swagger-dev/test-login";
pub const LEGACY_LOGIN_PATH: &str = "/api/v1/auth/login";
pub const DEV_TOKEN_PATH: &str = "/dev/token";

/// Remote collaborators of the token lifecycle
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `GET /swagger-dev/token/validate?token=...`
    async fn validate(&self, token: &str) -> Result<ValidateResponse>;

    /// `POST /swagger-dev/test-login`
    async fn test_login(&self) -> Result<LoginResponse>;

    /// `POST /api/v1/auth/login`
    async fn legacy_login(&self, creds: &LegacyCredentials) -> Result<LoginResponse>;

    /// `GET /dev/token/{long-term|short-term}`
    async fn dev_token(&self, term: DevTokenTerm) -> Result<LoginResponse>;
}

/// reqwest-backed `AuthApi`
pub struct HttpAuthApi {
    client: Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: &str, request_timeout: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into an error, preferring the `error` field of the body
    async fn reject(response: Response, what: &str) -> AuthError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| format!("{} failed", what));

        tracing::warn!(
            status = status.as_u16(),
            response_body = %text,
            "{} rejected",
            what
        );

        AuthError::server(status.as_u16(), message)
    }

    /// Read a login body of shape `T`, insisting on a non-empty token
    async fn read_login<T>(response: Response, what: &str) -> Result<LoginResponse>
    where
        T: DeserializeOwned + Into<LoginResponse>,
    {
        if !response.status().is_success() {
            return Err(Self::reject(response, what).await);
        }

        let data: LoginResponse = response.json::<T>().await?.into();
        match data.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(data),
            _ => {
                tracing::warn!("{} response does not contain a token", what);
                Err(AuthError::NoTokenAvailable)
            }
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn validate(&self, token: &str) -> Result<ValidateResponse> {
        let url = self.url(VALIDATE_PATH);
        tracing::debug!(url = %url, "Validating token");

        let response = self
            .client
            .get(&url)
            .query(&[("token", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response, "Token validation").await);
        }

        Ok(response.json().await?)
    }

    async fn test_login(&self) -> Result<LoginResponse> {
        tracing::info!("Logging in via test-login endpoint...");

        let response = self.client.post(self.url(TEST_LOGIN_PATH)).send().await?;
        Self::read_login::<LoginResponse>(response, "Test login").await
    }

    async fn legacy_login(&self, creds: &LegacyCredentials) -> Result<LoginResponse> {
        tracing::info!("Logging in via legacy login endpoint as {}...", creds.email);

        let response = self
            .client
            .post(self.url(LEGACY_LOGIN_PATH))
            .json(creds)
            .send()
            .await?;
        Self::read_login::<LoginResponse>(response, "Legacy login").await
    }

    async fn dev_token(&self, term: DevTokenTerm) -> Result<LoginResponse> {
        tracing::info!("Requesting {} dev token...", term.path_segment());

        let url = format!("{}/{}", self.url(DEV_TOKEN_PATH), term.path_segment());
        let response = self.client.get(&url).send().await?;
        Self::read_login::<DevTokenResponse>(response, "Dev token").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_validate_sends_token_as_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", VALIDATE_PATH)
            .match_query(Matcher::UrlEncoded("token".into(), "Bearer a.b.c".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"valid":true,"expiresInMinutes":12,"email":"a@b.com"}"#)
            .create_async()
            .await;

        let api = HttpAuthApi::new(&server.url(), 5).unwrap();
        let data = api.validate("Bearer a.b.c").await.unwrap();

        mock.assert_async().await;
        assert!(data.valid);
        assert_eq!(data.expires_in_minutes, Some(12));
        assert_eq!(data.email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_validate_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", VALIDATE_PATH)
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let api = HttpAuthApi::new(&server.url(), 5).unwrap();
        let err = api.validate("x").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::NetworkOrServer {
                status: Some(503),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_validate_unparseable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", VALIDATE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>login</html>")
            .create_async()
            .await;

        let api = HttpAuthApi::new(&server.url(), 5).unwrap();
        let err = api.validate("x").await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkOrServer { .. }));
    }

    #[tokio::test]
    async fn test_test_login_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", TEST_LOGIN_PATH)
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"login failed: bad credentials"}"#)
            .create_async()
            .await;

        let api = HttpAuthApi::new(&server.url(), 5).unwrap();
        let err = api.test_login().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Network or server error: 400 - login failed: bad credentials"
        );
    }

    #[tokio::test]
    async fn test_test_login_missing_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", TEST_LOGIN_PATH)
            .with_status(200)
            .with_body(r#"{"email":"a@b.com"}"#)
            .create_async()
            .await;

        let api = HttpAuthApi::new(&server.url(), 5).unwrap();
        let err = api.test_login().await.unwrap_err();
        assert!(matches!(err, AuthError::NoTokenAvailable));
    }

    #[tokio::test]
    async fn test_legacy_login_posts_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", LEGACY_LOGIN_PATH)
            .match_body(Matcher::Json(serde_json::json!({
                "email": "test@autocoin.com",
                "password": "Test1234!"
            })))
            .with_status(200)
            .with_body(r#"{"token":"legacy-token"}"#)
            .create_async()
            .await;

        let api = HttpAuthApi::new(&format!("{}/", server.url()), 5).unwrap();
        let creds = LegacyCredentials {
            email: "test@autocoin.com".to_string(),
            password: "Test1234!".to_string(),
        };
        let data = api.legacy_login(&creds).await.unwrap();

        mock.assert_async().await;
        assert_eq!(data.token.as_deref(), Some("legacy-token"));
        assert_eq!(data.email, None);
    }

    #[tokio::test]
    async fn test_dev_token_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/dev/token/short-term")
            .with_status(200)
            .with_body(
                r#"{"token":"dev","type":"short-term","expires":"30 minutes",
                    "user":{"id":7,"email":"dev@autocoin.com","username":"dev","role":"USER"}}"#,
            )
            .create_async()
            .await;

        let api = HttpAuthApi::new(&server.url(), 5).unwrap();
        let data = api.dev_token(DevTokenTerm::ShortTerm).await.unwrap();

        mock.assert_async().await;
        assert_eq!(data.token.as_deref(), Some("dev"));
        assert_eq!(data.email.as_deref(), Some("dev@autocoin.com"));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Port 9 (discard) is not expected to accept HTTP
        let api = HttpAuthApi::new("http://127.0.0.1:9", 2).unwrap();
        let err = api.validate("x").await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkOrServer { status: None, .. }));
    }
}
