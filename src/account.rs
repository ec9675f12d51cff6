//! Account collaborator: sign-in, verification codes, and the user's
//! token balance. The application never stores passwords or issues
//! verification codes itself; both live behind the account API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Could not reach the account service at {0}")]
    Connection(String),

    #[error("Account service did not respond within {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Sign-in rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Could not parse account service response: {0}")]
    ResponseParsing(String),
}

impl AccountError {
    /// Transport-level failures are worth retrying; a rejection is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_) | Self::Http(_))
    }
}

/// A signed-in user as the account service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Processing credits remaining on the account.
    pub token_balance: i64,
}

/// The credential shapes the sign-in dialog can produce.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum Credentials {
    EmailPassword { email: String, password: String },
    /// Code must be the one delivered out of band for this sign-in
    /// attempt; there is no fixed fallback code.
    Phone { number: String, code: String },
    GoogleToken { id_token: String },
}

/// Account API contract. Every call is a remote verification; nothing
/// here can succeed without the service agreeing.
pub trait AccountService: Send + Sync {
    fn sign_in(&self, credentials: &Credentials) -> Result<UserRecord, AccountError>;

    fn fetch_user(&self, user_id: &str) -> Result<UserRecord, AccountError>;

    /// Ask the service to deliver a verification code to a phone number.
    fn request_code(&self, number: &str) -> Result<(), AccountError>;
}

// ═══════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════

#[derive(Deserialize)]
struct RejectionPayload {
    message: String,
}

#[derive(Serialize)]
struct CodeRequest<'a> {
    number: &'a str,
}

pub struct HttpAccountClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpAccountClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    pub fn from_config() -> Self {
        Self::new(&config::account_api_url(), config::ACCOUNT_TIMEOUT_SECS)
    }

    fn map_send_error(&self, e: reqwest::Error) -> AccountError {
        if e.is_connect() {
            AccountError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            AccountError::Timeout(self.timeout_secs)
        } else {
            AccountError::Http(e.to_string())
        }
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, AccountError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<RejectionPayload>(&body)
            .map(|p| p.message)
            .unwrap_or(body);
        Err(AccountError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

impl AccountService for HttpAccountClient {
    fn sign_in(&self, credentials: &Credentials) -> Result<UserRecord, AccountError> {
        let url = format!("{}/v1/session", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(credentials)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        Self::check_status(response)?
            .json()
            .map_err(|e| AccountError::ResponseParsing(e.to_string()))
    }

    fn fetch_user(&self, user_id: &str) -> Result<UserRecord, AccountError> {
        let url = format!("{}/v1/users/{}", self.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        Self::check_status(response)?
            .json()
            .map_err(|e| AccountError::ResponseParsing(e.to_string()))
    }

    fn request_code(&self, number: &str) -> Result<(), AccountError> {
        let url = format!("{}/v1/verification", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CodeRequest { number })
            .send()
            .map_err(|e| self.map_send_error(e))?;

        Self::check_status(response).map(|_| ())
    }
}

// ═══════════════════════════════════════════
// Mock service
// ═══════════════════════════════════════════

/// Mock account service for tests. The accepted phone code is whatever
/// the test configures per instance, mirroring a code the service just
/// delivered.
pub struct MockAccountService {
    user: UserRecord,
    accepted_code: Option<String>,
    reject_all: bool,
}

impl MockAccountService {
    pub fn new(user: UserRecord) -> Self {
        Self {
            user,
            accepted_code: None,
            reject_all: false,
        }
    }

    pub fn with_delivered_code(mut self, code: &str) -> Self {
        self.accepted_code = Some(code.to_string());
        self
    }

    pub fn rejecting() -> Self {
        let mut mock = Self::new(UserRecord {
            id: "none".into(),
            display_name: None,
            token_balance: 0,
        });
        mock.reject_all = true;
        mock
    }

    pub fn set_balance(&mut self, balance: i64) {
        self.user.token_balance = balance;
    }
}

impl AccountService for MockAccountService {
    fn sign_in(&self, credentials: &Credentials) -> Result<UserRecord, AccountError> {
        if self.reject_all {
            return Err(AccountError::Rejected {
                status: 401,
                message: "invalid credentials".into(),
            });
        }
        if let Credentials::Phone { code, .. } = credentials {
            match &self.accepted_code {
                Some(expected) if expected == code => {}
                _ => {
                    return Err(AccountError::Rejected {
                        status: 401,
                        message: "verification code mismatch".into(),
                    })
                }
            }
        }
        Ok(self.user.clone())
    }

    fn fetch_user(&self, user_id: &str) -> Result<UserRecord, AccountError> {
        if self.reject_all || user_id != self.user.id {
            return Err(AccountError::Rejected {
                status: 404,
                message: "unknown user".into(),
            });
        }
        Ok(self.user.clone())
    }

    fn request_code(&self, _number: &str) -> Result<(), AccountError> {
        if self.reject_all {
            return Err(AccountError::Rejected {
                status: 400,
                message: "delivery failed".into(),
            });
        }
        Ok(())
    }
}
