//! Access-token session lifecycle.
//!
//! [`SessionManager`] is the only component that mutates the token. Everyone
//! else reads it through a [`TokenSnapshot`] taken per request. The snapshot
//! carries the session *epoch*: a counter bumped on every establish/teardown,
//! used to make the 401-recovery refresh single-flight - when N requests fail
//! with an authorization error concurrently, exactly one refresh call goes
//! out and the rest observe the bumped epoch and simply retry.
//!
//! The refresh endpoint authenticates with an HTTP-only cookie (the shared
//! `reqwest` client carries the cookie store), so the manager can mint a new
//! access token even when the old one has expired.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use clovemart_core::CustomerId;

use crate::error::ApiError;
use crate::gateway::{Envelope, REFRESH_PATH};

/// Interval at which an embedding application may proactively renew the
/// token. Renewal on this timer is an optimization; the reactive 401 path is
/// what keeps the session correct.
const RENEWAL_INTERVAL: Duration = Duration::from_secs(10 * 60 * 60);

// ─────────────────────────────────────────────────────────────────────────────
// Durable token storage
// ─────────────────────────────────────────────────────────────────────────────

/// Durable storage for the access token (the local-storage analogue).
///
/// Presence of a stored token at startup means "assume authenticated until a
/// request says otherwise".
pub trait TokenStore: Send + Sync {
    /// Load the persisted token, if any.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the backing storage is unreadable.
    fn load(&self) -> io::Result<Option<String>>;

    /// Persist the token.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the token cannot be written.
    fn save(&self, token: &str) -> io::Result<()>;

    /// Remove any persisted token.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if removal fails for a reason other than the
    /// token already being absent.
    fn clear(&self) -> io::Result<()>;
}

/// Token storage backed by a plain file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store at the given path. Parent directories are created on
    /// first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token.to_string()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory token storage, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: std::sync::Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

/// The authenticated customer, as returned by the profile endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    #[serde(default)]
    pub id: Option<CustomerId>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Point-in-time view of the held token, taken once per request.
pub struct TokenSnapshot {
    /// The bearer token, if one is held.
    pub token: Option<SecretString>,
    /// Session epoch at snapshot time; stale epochs skip duplicate refreshes.
    pub epoch: u64,
}

#[derive(Default)]
struct SessionState {
    token: Option<SecretString>,
    profile: Option<CustomerProfile>,
    epoch: u64,
}

/// Owns the access-token value, its persistence, and renewal on expiry.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    http: reqwest::Client,
    refresh_url: Url,
    store: Box<dyn TokenStore>,
    state: RwLock<SessionState>,
    refresh_gate: Mutex<()>,
}

#[derive(Deserialize)]
struct RefreshData {
    #[serde(rename = "accessToken")]
    access_token: String,
}

impl SessionManager {
    /// Create a session manager sharing the client's HTTP connection pool.
    ///
    /// Restores a previously persisted token from `store`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh URL cannot be built or the store is
    /// unreadable.
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        store: Box<dyn TokenStore>,
    ) -> crate::error::Result<Self> {
        let refresh_url = base_url.join(REFRESH_PATH)?;

        let mut state = SessionState::default();
        if let Some(token) = store.load()? {
            debug!("restored persisted access token");
            state.token = Some(SecretString::from(token));
        }

        Ok(Self {
            inner: Arc::new(SessionInner {
                http,
                refresh_url,
                store,
                state: RwLock::new(state),
                refresh_gate: Mutex::new(()),
            }),
        })
    }

    /// Take a point-in-time view of the token without a network call.
    #[must_use]
    pub fn snapshot(&self) -> TokenSnapshot {
        let state = self.read_state();
        TokenSnapshot {
            token: state.token.clone(),
            epoch: state.epoch,
        }
    }

    /// True iff a token is currently held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read_state().token.is_some()
    }

    /// The customer profile cached from the last auth/profile response.
    #[must_use]
    pub fn profile(&self) -> Option<CustomerProfile> {
        self.read_state().profile.clone()
    }

    /// Store a token, persist it, and mark the session authenticated.
    ///
    /// `profile: None` keeps any previously cached profile (used when a
    /// refresh re-establishes the session).
    pub fn establish(&self, token: &str, profile: Option<CustomerProfile>) {
        if let Err(e) = self.inner.store.save(token) {
            // A failed disk write must not lose an otherwise valid login.
            warn!(error = %e, "failed to persist access token");
        }

        let mut state = self.write_state();
        state.token = Some(SecretString::from(token));
        if profile.is_some() {
            state.profile = profile;
        }
        state.epoch += 1;
    }

    /// Replace the cached customer profile.
    pub fn set_profile(&self, profile: CustomerProfile) {
        self.write_state().profile = Some(profile);
    }

    /// Clear in-memory and durable token state unconditionally.
    ///
    /// Used on logout and on irrecoverable refresh failure, independent of
    /// network outcome.
    pub fn teardown(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "failed to clear persisted access token");
        }

        let mut state = self.write_state();
        state.token = None;
        state.profile = None;
        state.epoch += 1;
    }

    /// Exchange the current session for a new access token.
    ///
    /// Single-flight: concurrent callers that observed the same expired token
    /// (same `seen_epoch`) share one refresh call. Whoever loses the race for
    /// the gate finds the epoch already bumped and returns without a second
    /// network call.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Auth` if the exchange fails; the session has been
    /// torn down by the time the error is returned.
    pub async fn refresh(&self, seen_epoch: u64) -> crate::error::Result<()> {
        let _gate = self.inner.refresh_gate.lock().await;

        if self.read_state().epoch != seen_epoch {
            debug!("token already renewed by a concurrent caller");
            return Ok(());
        }

        debug!("exchanging session for a fresh access token");
        match self.request_new_token().await {
            Ok(token) => {
                self.establish(&token, None);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, tearing down session");
                self.teardown();
                Err(ApiError::Auth(format!("token refresh failed: {e}")))
            }
        }
    }

    /// Interval at which proactive background renewal may run.
    #[must_use]
    pub const fn renewal_interval() -> Duration {
        RENEWAL_INTERVAL
    }

    async fn request_new_token(&self) -> crate::error::Result<String> {
        let mut request = self.inner.http.post(self.inner.refresh_url.clone());
        if let Some(token) = self.read_state().token.clone() {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        let envelope: Envelope<RefreshData> = serde_json::from_str(&text)?;
        Ok(envelope.into_result()?.access_token)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
