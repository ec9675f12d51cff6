use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Pixlift";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "pixlift=info"
}

/// Upload ceiling per image (30MB). Larger files are rejected at validation.
pub const MAX_UPLOAD_BYTES: u64 = 30 * 1024 * 1024;

/// Bounded timeout for one remote render call, in seconds.
/// The source behavior enforced none; a hung call would stall the whole queue.
pub const RENDER_TIMEOUT_SECS: u64 = 120;

/// Timeout for auth/order calls, which are small JSON exchanges.
pub const ACCOUNT_TIMEOUT_SECS: u64 = 30;

/// Session inactivity timeout (30 minutes of no user actions signs out).
pub const INACTIVITY_TIMEOUT_SECS: u64 = 30 * 60;

/// Base URL of the image-processing backend.
/// `PIXLIFT_API_URL` overrides for staging/self-hosted deployments.
pub fn render_api_url() -> String {
    std::env::var("PIXLIFT_API_URL").unwrap_or_else(|_| "https://api.pixlift.app".to_string())
}

/// Base URL of the auth/session service.
pub fn account_api_url() -> String {
    std::env::var("PIXLIFT_ACCOUNT_URL").unwrap_or_else(|_| "https://account.pixlift.app".to_string())
}

/// Base URL of the order/payment service.
pub fn order_api_url() -> String {
    std::env::var("PIXLIFT_ORDER_URL").unwrap_or_else(|_| "https://pay.pixlift.app".to_string())
}

/// Get the application data directory
/// ~/Pixlift/ on all platforms (user-visible, results land here by default)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Pixlift")
}

/// Directory where exported results are written.
pub fn exports_dir() -> PathBuf {
    app_data_dir().join("exports")
}

/// A purchasable token package (checkout handled by the order collaborator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPackage {
    pub id: &'static str,
    pub tokens: u32,
}

/// Catalog shown on the top-up screen. Prices live server-side.
pub const TOKEN_PACKAGES: &[TokenPackage] = &[
    TokenPackage { id: "starter-100", tokens: 100 },
    TokenPackage { id: "plus-500", tokens: 500 },
    TokenPackage { id: "studio-2000", tokens: 2000 },
];

/// Look up a package by its identifier.
pub fn token_package(id: &str) -> Option<TokenPackage> {
    TOKEN_PACKAGES.iter().copied().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Pixlift"));
    }

    #[test]
    fn exports_dir_under_app_data() {
        let exports = exports_dir();
        let app = app_data_dir();
        assert!(exports.starts_with(app));
        assert!(exports.ends_with("exports"));
    }

    #[test]
    fn app_name_is_pixlift() {
        assert_eq!(APP_NAME, "Pixlift");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.4.0");
    }

    #[test]
    fn package_lookup() {
        let p = token_package("plus-500").unwrap();
        assert_eq!(p.tokens, 500);
        assert!(token_package("nonexistent").is_none());
    }

    #[test]
    fn default_urls_are_https() {
        assert!(render_api_url().starts_with("http"));
        assert!(account_api_url().starts_with("http"));
        assert!(order_api_url().starts_with("http"));
    }
}
