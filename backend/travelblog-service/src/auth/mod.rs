/// Session handling
///
/// - `AuthProvider`: sign-in / sign-up / sign-out / token verification against
///   the backing identity service
/// - `SessionProvider`: an observable "current user / loading" view over one
///   session, consumed by the HTTP layer as an identity source
/// - `password`: Argon2id hashing used by the local provider
pub mod local;
pub mod password;

pub use local::LocalAuthProvider;

use crate::models::UserIdentity;
use crate::store::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use validator::Validate;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Email/password pair from the login form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Registration form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub confirm_password: String,
    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    pub display_name: String,
    /// Profile photo as a URL or `data:` URL
    pub photo_url: String,
}

impl SignUpRequest {
    /// Form checks in the order the registration page reports them.
    pub fn check(&self) -> Result<(), AuthError> {
        let fields = [
            &self.photo_url,
            &self.display_name,
            &self.email,
            &self.password,
            &self.confirm_password,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AuthError::Validation("Please fill in all fields.".to_string()));
        }

        if self.password != self.confirm_password {
            return Err(AuthError::Validation("Passwords do not match.".to_string()));
        }

        self.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))
    }
}

impl SignInRequest {
    pub fn check(&self) -> Result<(), AuthError> {
        self.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))
    }
}

/// An authenticated session: bearer token plus the identity it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: UserIdentity,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, credentials: SignInRequest) -> Result<Session, AuthError>;

    async fn sign_up(&self, profile: SignUpRequest) -> Result<Session, AuthError>;

    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    /// Resolve a bearer token to its identity.
    async fn verify(&self, token: &str) -> Result<UserIdentity, AuthError>;
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub loading: bool,
    pub user: Option<UserIdentity>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            loading: true,
            user: None,
        }
    }
}

/// Current-user view over a single session.
///
/// Starts out loading; `restore`, `sign_in` and `sign_up` settle it.
/// Subscribers are notified on every transition.
pub struct SessionProvider {
    auth: Arc<dyn AuthProvider>,
    state: watch::Sender<SessionState>,
    token: Mutex<Option<String>>,
}

impl SessionProvider {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            auth,
            state,
            token: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn token(&self) -> Option<String> {
        self.token_slot().clone()
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("session token lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn settle(&self, token: Option<String>, user: Option<UserIdentity>) {
        *self.token_slot() = token;
        self.state.send_replace(SessionState {
            loading: false,
            user,
        });
    }

    /// Resolve an existing bearer token.
    ///
    /// Invalid, expired and revoked tokens settle to "signed out"; only
    /// store failures are returned as errors.
    pub async fn restore(&self, token: Option<&str>) -> Result<Option<UserIdentity>, AuthError> {
        let Some(token) = token else {
            self.settle(None, None);
            return Ok(None);
        };

        match self.auth.verify(token).await {
            Ok(user) => {
                self.settle(Some(token.to_string()), Some(user.clone()));
                Ok(Some(user))
            }
            Err(AuthError::InvalidToken | AuthError::TokenRevoked) => {
                tracing::debug!("session token rejected");
                self.settle(None, None);
                Ok(None)
            }
            Err(e) => {
                self.settle(None, None);
                Err(e)
            }
        }
    }

    pub async fn sign_in(&self, credentials: SignInRequest) -> Result<Session, AuthError> {
        match self.auth.sign_in(credentials).await {
            Ok(session) => {
                self.settle(Some(session.token.clone()), Some(session.user.clone()));
                Ok(session)
            }
            Err(e) => {
                self.settle(self.token(), self.current_user());
                Err(e)
            }
        }
    }

    pub async fn sign_up(&self, profile: SignUpRequest) -> Result<Session, AuthError> {
        match self.auth.sign_up(profile).await {
            Ok(session) => {
                self.settle(Some(session.token.clone()), Some(session.user.clone()));
                Ok(session)
            }
            Err(e) => {
                self.settle(self.token(), self.current_user());
                Err(e)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(token) = self.token() {
            self.auth.sign_out(&token).await?;
        }
        self.settle(None, None);
        Ok(())
    }
}
