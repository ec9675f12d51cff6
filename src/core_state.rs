//! Application state shared across the shell: the signed-in session,
//! an inactivity timer, and the processing gate.
//!
//! Transport-agnostic by design: nothing in here knows about windows or
//! HTTP, so every transition is testable without a UI.

use std::sync::{Mutex, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::account::{AccountError, AccountService, UserRecord};
use crate::config;
use crate::processing_service::ProcessingService;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("State lock poisoned")]
    LockPoisoned,

    #[error("No active session")]
    NoActiveSession,

    #[error(transparent)]
    Account(#[from] AccountError),
}

/// A signed-in user plus when they signed in.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user: UserRecord,
    pub signed_in_at: DateTime<Utc>,
}

/// Top-level shared state. One instance lives for the whole process.
pub struct AppState {
    session: RwLock<Option<UserSession>>,
    last_activity: Mutex<Instant>,
    inactivity_timeout_secs: u64,
    processing: ProcessingService,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_timeout(config::INACTIVITY_TIMEOUT_SECS)
    }

    pub fn with_timeout(inactivity_timeout_secs: u64) -> Self {
        Self {
            session: RwLock::new(None),
            last_activity: Mutex::new(Instant::now()),
            inactivity_timeout_secs,
            processing: ProcessingService::new(),
        }
    }

    /// The global at-most-one-operation gate.
    pub fn processing(&self) -> &ProcessingService {
        &self.processing
    }

    // ── Session ─────────────────────────────────────────────

    pub fn set_session(&self, user: UserRecord) -> Result<(), CoreError> {
        let mut session = self.session.write().map_err(|_| CoreError::LockPoisoned)?;
        info!(user_id = %user.id, "Session started");
        *session = Some(UserSession {
            user,
            signed_in_at: Utc::now(),
        });
        drop(session);
        self.update_activity()?;
        Ok(())
    }

    pub fn clear_session(&self) -> Result<(), CoreError> {
        let mut session = self.session.write().map_err(|_| CoreError::LockPoisoned)?;
        if session.take().is_some() {
            info!("Session cleared");
        }
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.read().map(|s| s.is_some()).unwrap_or(false)
    }

    pub fn user(&self) -> Result<UserRecord, CoreError> {
        let session = self.session.read().map_err(|_| CoreError::LockPoisoned)?;
        session
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(CoreError::NoActiveSession)
    }

    pub fn token_balance(&self) -> Result<i64, CoreError> {
        Ok(self.user()?.token_balance)
    }

    /// Overwrite the cached balance with a server-reported value.
    pub fn set_token_balance(&self, balance: i64) -> Result<(), CoreError> {
        let mut session = self.session.write().map_err(|_| CoreError::LockPoisoned)?;
        let session = session.as_mut().ok_or(CoreError::NoActiveSession)?;
        session.user.token_balance = balance;
        Ok(())
    }

    /// Re-fetch the signed-in user from the account service and replace
    /// the cached record. Used after payments and on app focus.
    pub fn refresh_user(&self, accounts: &dyn AccountService) -> Result<UserRecord, CoreError> {
        let user_id = self.user()?.id;
        let fresh = accounts.fetch_user(&user_id)?;
        let mut session = self.session.write().map_err(|_| CoreError::LockPoisoned)?;
        if let Some(session) = session.as_mut() {
            session.user = fresh.clone();
        }
        Ok(fresh)
    }

    // ── Inactivity ──────────────────────────────────────────

    /// Record a user action.
    pub fn update_activity(&self) -> Result<(), CoreError> {
        let mut last = self
            .last_activity
            .lock()
            .map_err(|_| CoreError::LockPoisoned)?;
        *last = Instant::now();
        Ok(())
    }

    pub fn idle_secs(&self) -> Result<u64, CoreError> {
        let last = self
            .last_activity
            .lock()
            .map_err(|_| CoreError::LockPoisoned)?;
        Ok(last.elapsed().as_secs())
    }

    /// Sign out if the session has been idle past the timeout. Returns
    /// whether the session was ended. Idle time is measured with a
    /// monotonic clock, so system sleep does not count double.
    pub fn check_timeout(&self) -> Result<bool, CoreError> {
        if !self.is_signed_in() {
            return Ok(false);
        }
        if self.idle_secs()? < self.inactivity_timeout_secs {
            return Ok(false);
        }
        warn!(
            idle_secs = self.idle_secs()?,
            "Inactivity timeout reached, signing out"
        );
        self.clear_session()?;
        Ok(true)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
