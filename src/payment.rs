//! Token purchase flow against the order collaborator.
//!
//! The application only creates orders and polls their status; pricing,
//! charging, and balance crediting all happen server-side. After a paid
//! order the balance shown to the user is re-fetched from the account
//! service, never computed locally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{AccountError, AccountService, UserRecord};
use crate::config;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Unknown token package: {0}")]
    UnknownPackage(String),

    #[error("Could not reach the order service at {0}")]
    Connection(String),

    #[error("Order service did not respond within {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Order rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Could not parse order service response: {0}")]
    ResponseParsing(String),

    #[error("Order is not paid (status: {0})")]
    NotPaid(OrderStatus),

    #[error(transparent)]
    Account(#[from] AccountError),
}

/// Server-side order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Paid,
    Failed,
    Expired,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// A freshly created order: the id to poll and the token the checkout
/// page needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub order_id: String,
    pub checkout_token: String,
}

/// Order API contract.
pub trait OrderService: Send + Sync {
    fn create_order(&self, package_id: &str) -> Result<CheckoutSession, PaymentError>;

    fn order_status(&self, order_id: &str) -> Result<OrderStatus, PaymentError>;
}

/// Confirm a paid order and return the authoritative user record.
///
/// The returned balance is whatever the account service reports; a
/// pending or failed order surfaces as `NotPaid` so the shell can keep
/// polling or show the failure.
pub fn settle_order(
    orders: &dyn OrderService,
    accounts: &dyn AccountService,
    order_id: &str,
    user_id: &str,
) -> Result<UserRecord, PaymentError> {
    let status = orders.order_status(order_id)?;
    if status != OrderStatus::Paid {
        return Err(PaymentError::NotPaid(status));
    }
    tracing::info!(order_id, "Order paid, refreshing balance");
    Ok(accounts.fetch_user(user_id)?)
}

// ═══════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    package_id: &'a str,
}

#[derive(Deserialize)]
struct OrderStatusResponse {
    status: OrderStatus,
}

#[derive(Deserialize)]
struct RejectionPayload {
    message: String,
}

pub struct HttpOrderClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpOrderClient {
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
        Self::new(&config::order_api_url(), config::ACCOUNT_TIMEOUT_SECS)
    }

    fn map_send_error(&self, e: reqwest::Error) -> PaymentError {
        if e.is_connect() {
            PaymentError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            PaymentError::Timeout(self.timeout_secs)
        } else {
            PaymentError::Http(e.to_string())
        }
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<RejectionPayload>(&body)
            .map(|p| p.message)
            .unwrap_or(body);
        Err(PaymentError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

impl OrderService for HttpOrderClient {
    fn create_order(&self, package_id: &str) -> Result<CheckoutSession, PaymentError> {
        // Reject unknown packages before going to the network.
        if config::token_package(package_id).is_none() {
            return Err(PaymentError::UnknownPackage(package_id.to_string()));
        }

        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CreateOrderRequest { package_id })
            .send()
            .map_err(|e| self.map_send_error(e))?;

        Self::check_status(response)?
            .json()
            .map_err(|e| PaymentError::ResponseParsing(e.to_string()))
    }

    fn order_status(&self, order_id: &str) -> Result<OrderStatus, PaymentError> {
        let url = format!("{}/v1/orders/{}", self.base_url, order_id);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let parsed: OrderStatusResponse = Self::check_status(response)?
            .json()
            .map_err(|e| PaymentError::ResponseParsing(e.to_string()))?;
        Ok(parsed.status)
    }
}

// ═══════════════════════════════════════════
// Mock service
// ═══════════════════════════════════════════

/// Mock order service with a scripted status per order id.
pub struct MockOrderService {
    status: OrderStatus,
}

impl MockOrderService {
    pub fn with_status(status: OrderStatus) -> Self {
        Self { status }
    }
}

impl OrderService for MockOrderService {
    fn create_order(&self, package_id: &str) -> Result<CheckoutSession, PaymentError> {
        if config::token_package(package_id).is_none() {
            return Err(PaymentError::UnknownPackage(package_id.to_string()));
        }
        Ok(CheckoutSession {
            order_id: format!("order-{package_id}"),
            checkout_token: "tok-mock".into(),
        })
    }

    fn order_status(&self, _order_id: &str) -> Result<OrderStatus, PaymentError> {
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::MockAccountService;

    fn user(balance: i64) -> UserRecord {
        UserRecord {
            id: "u-1".into(),
            display_name: None,
            token_balance: balance,
        }
    }

    #[test]
    fn create_order_validates_package_locally() {
        let orders = MockOrderService::with_status(OrderStatus::Created);
        let err = orders.create_order("mega-9000").unwrap_err();
        assert!(matches!(err, PaymentError::UnknownPackage(_)));

        let session = orders.create_order("plus-500").unwrap();
        assert_eq!(session.order_id, "order-plus-500");
    }

    #[test]
    fn settle_paid_order_returns_server_balance() {
        let orders = MockOrderService::with_status(OrderStatus::Paid);
        let accounts = MockAccountService::new(user(600));

        let record = settle_order(&orders, &accounts, "order-1", "u-1").unwrap();
        assert_eq!(record.token_balance, 600);
    }

    #[test]
    fn unpaid_order_is_not_settled() {
        let accounts = MockAccountService::new(user(100));
        for status in [OrderStatus::Created, OrderStatus::Failed, OrderStatus::Expired] {
            let orders = MockOrderService::with_status(status);
            let err = settle_order(&orders, &accounts, "order-1", "u-1").unwrap_err();
            assert!(matches!(err, PaymentError::NotPaid(s) if s == status));
        }
    }

    #[test]
    fn order_status_parses_snake_case() {
        let parsed: OrderStatusResponse =
            serde_json::from_str("{\"status\":\"paid\"}").unwrap();
        assert_eq!(parsed.status, OrderStatus::Paid);
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = HttpOrderClient::new("http://localhost:9820/", 30);
        assert_eq!(client.base_url, "http://localhost:9820");
    }
}
