// Authentication types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remaining minutes below which a token counts as expiring soon
pub const EXPIRING_SOON_MINUTES: i64 = 5;

/// Display name used when neither the validator nor the claims carry an email
pub const UNKNOWN_USER: &str = "user";

/// Status of the stored token, derived on every check and never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// Nothing stored
    Absent,

    /// Rejected by the validator or undecodable
    Invalid,

    /// No remaining validity
    Expired,

    /// Valid for less than five more minutes
    ExpiringSoon {
        minutes: i64,
        email: Option<String>,
    },

    /// Valid
    Valid {
        minutes: i64,
        email: Option<String>,
    },
}

impl TokenStatus {
    /// Classify remaining validity: `<= 0` expired, `< 5` expiring soon, otherwise valid
    pub fn from_minutes(minutes: i64, email: Option<String>) -> Self {
        if minutes <= 0 {
            TokenStatus::Expired
        } else if minutes < EXPIRING_SOON_MINUTES {
            TokenStatus::ExpiringSoon { minutes, email }
        } else {
            TokenStatus::Valid { minutes, email }
        }
    }

    /// Whether the token may still be pushed into the documentation UI
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            TokenStatus::Valid { .. } | TokenStatus::ExpiringSoon { .. }
        )
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            TokenStatus::Valid { email, .. } | TokenStatus::ExpiringSoon { email, .. } => {
                email.as_deref()
            }
            _ => None,
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenStatus::Absent => write!(f, "No token"),
            TokenStatus::Invalid => write!(f, "Invalid token"),
            TokenStatus::Expired => write!(f, "Token expired"),
            TokenStatus::ExpiringSoon { minutes, email } => write!(
                f,
                "Expiring soon - {} (expires in {} min)",
                email.as_deref().unwrap_or(UNKNOWN_USER),
                minutes
            ),
            TokenStatus::Valid { minutes, email } => write!(
                f,
                "Valid - {} (expires in {} min)",
                email.as_deref().unwrap_or(UNKNOWN_USER),
                minutes
            ),
        }
    }
}

/// Token validation response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    #[serde(default)]
    pub valid: bool,
    pub expires_in_minutes: Option<i64>,
    pub email: Option<String>,
    /// Validator's reason for `valid: false`
    pub error: Option<String>,
}

impl ValidateResponse {
    pub fn status(&self) -> TokenStatus {
        if !self.valid {
            return TokenStatus::Invalid;
        }
        TokenStatus::from_minutes(self.expires_in_minutes.unwrap_or(0), self.email.clone())
    }
}

/// Login response, shared by the convenience, legacy and dev-token endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: Option<String>,
    pub email: Option<String>,
}

/// Development token body: `{ token, type, expires, user: { id, email, username, role } }`
#[derive(Debug, Clone, Deserialize)]
pub struct DevTokenResponse {
    pub token: Option<String>,
    pub user: Option<DevTokenUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevTokenUser {
    pub email: Option<String>,
}

impl From<DevTokenResponse> for LoginResponse {
    fn from(data: DevTokenResponse) -> Self {
        LoginResponse {
            token: data.token,
            email: data.user.and_then(|user| user.email),
        }
    }
}

/// Error body returned by the login endpoints on non-2xx
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

/// Legacy login request
#[derive(Debug, Clone, Serialize)]
pub struct LegacyCredentials {
    pub email: String,
    pub password: String,
}

/// Lifetime of a development token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevTokenTerm {
    /// One year
    LongTerm,
    /// Thirty minutes
    ShortTerm,
}

impl DevTokenTerm {
    pub fn path_segment(&self) -> &'static str {
        match self {
            DevTokenTerm::LongTerm => "long-term",
            DevTokenTerm::ShortTerm => "short-term",
        }
    }
}

/// Claims read from the payload segment during local decode
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub exp: i64,
    pub email: Option<String>,
    pub user_id: Option<i64>,
    pub roles: Option<Vec<String>>,
}

/// Which endpoint produced a login result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRoute {
    Primary,
    Legacy,
    DevToken(DevTokenTerm),
}

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Token persisted and applied
    Success {
        route: LoginRoute,
        email: Option<String>,
    },
    /// Both login routes failed
    Failed { message: String },
    /// Another login was still running
    AlreadyInProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(TokenStatus::from_minutes(-3, None), TokenStatus::Expired);
        assert_eq!(TokenStatus::from_minutes(0, None), TokenStatus::Expired);
        for minutes in 1..5 {
            assert!(matches!(
                TokenStatus::from_minutes(minutes, None),
                TokenStatus::ExpiringSoon { .. }
            ));
        }
        assert!(matches!(
            TokenStatus::from_minutes(5, None),
            TokenStatus::Valid { minutes: 5, .. }
        ));
    }

    #[test]
    fn test_validate_response_status() {
        let data: ValidateResponse = serde_json::from_str(
            r#"{"valid":true,"expiresInMinutes":42,"email":"a@b.com","userId":7}"#,
        )
        .unwrap();
        assert_eq!(
            data.status(),
            TokenStatus::Valid {
                minutes: 42,
                email: Some("a@b.com".to_string())
            }
        );

        let data: ValidateResponse =
            serde_json::from_str(r#"{"valid":false,"error":"JWT expired"}"#).unwrap();
        assert_eq!(data.status(), TokenStatus::Invalid);
    }

    #[test]
    fn test_valid_without_minutes_is_expired() {
        let data: ValidateResponse = serde_json::from_str(r#"{"valid":true}"#).unwrap();
        assert_eq!(data.status(), TokenStatus::Expired);
    }

    #[test]
    fn test_status_display() {
        let status = TokenStatus::Valid {
            minutes: 30,
            email: Some("a@b.com".to_string()),
        };
        assert_eq!(status.to_string(), "Valid - a@b.com (expires in 30 min)");

        let status = TokenStatus::ExpiringSoon {
            minutes: 2,
            email: None,
        };
        assert_eq!(status.to_string(), "Expiring soon - user (expires in 2 min)");
    }

    #[test]
    fn test_legacy_credentials_body() {
        let creds = LegacyCredentials {
            email: "test@autocoin.com".to_string(),
            password: "Test1234!".to_string(),
        };
        let body = serde_json::to_value(&creds).unwrap();
        assert_eq!(body["email"], "test@autocoin.com");
        assert_eq!(body["password"], "Test1234!");
    }

    #[test]
    fn test_dev_token_email_comes_from_user() {
        let body = r#"{
            "token": "dev",
            "type": "long-term",
            "expires": "1 year",
            "user": {"id": 1, "email": "dev@autocoin.com", "username": "dev", "role": "USER"}
        }"#;
        let data: LoginResponse = serde_json::from_str::<DevTokenResponse>(body)
            .unwrap()
            .into();
        assert_eq!(data.token.as_deref(), Some("dev"));
        assert_eq!(data.email.as_deref(), Some("dev@autocoin.com"));

        let data: LoginResponse = serde_json::from_str::<DevTokenResponse>(r#"{"token":"dev"}"#)
            .unwrap()
            .into();
        assert_eq!(data.email, None);
    }
}
