//! Single entry point for all customer API calls.
//!
//! The gateway attaches the bearer token from a per-request session
//! snapshot (no mutable default headers), serializes write bodies as
//! URL-encoded forms, and unwraps the `{ success, data, message? }` response
//! envelope. A 401 from any endpoint except the refresh endpoint itself
//! triggers the session manager's single-flight refresh and exactly one
//! replay of the original request.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::ApiError;
use crate::session::SessionManager;

/// Refresh endpoint, relative to the base URL. A 401 from this path is never
/// recovered - it is the recovery.
pub(crate) const REFRESH_PATH: &str = "auth/refresh-token";

// ─────────────────────────────────────────────────────────────────────────────
// Response envelope
// ─────────────────────────────────────────────────────────────────────────────

/// The customer API's JSON response envelope.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub(crate) struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, mapping `success: false` to a business error
    /// carrying the server message verbatim.
    pub fn into_result(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Business(
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| ApiError::Business("response contained no data".to_string()))
    }

    /// Like [`Self::into_result`] for endpoints whose payload we discard.
    pub fn into_ack(self) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(ApiError::Business(
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable request context over a shared HTTP client.
#[derive(Clone)]
pub struct RequestGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    http: reqwest::Client,
    base_url: Url,
    session: SessionManager,
}

impl RequestGateway {
    /// Create a gateway over the shared HTTP client.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: Url, session: SessionManager) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                http,
                base_url,
                session,
            }),
        }
    }

    /// The session manager backing this gateway.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed entry points
    // ─────────────────────────────────────────────────────────────────────────

    /// GET `path`, expecting a data payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> crate::error::Result<T> {
        self.execute(path, |http, url| http.get(url)).await
    }

    /// GET `path` with query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn get_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> crate::error::Result<T> {
        self.execute(path, |http, url| http.get(url).query(query))
            .await
    }

    /// POST `path` with no body, expecting a data payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> crate::error::Result<T> {
        self.execute(path, |http, url| http.post(url)).await
    }

    /// POST `path` with no body, discarding any payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn post_ack(&self, path: &str) -> crate::error::Result<()> {
        self.execute_ack(path, |http, url| http.post(url)).await
    }

    /// POST a URL-encoded form, expecting a data payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn post_form<T: DeserializeOwned, F: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &F,
    ) -> crate::error::Result<T> {
        self.execute(path, |http, url| http.post(url).form(form))
            .await
    }

    /// POST a URL-encoded form, discarding any payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn post_form_ack<F: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &F,
    ) -> crate::error::Result<()> {
        self.execute_ack(path, |http, url| http.post(url).form(form))
            .await
    }

    /// PATCH a URL-encoded form, expecting a data payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn patch_form<T: DeserializeOwned, F: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &F,
    ) -> crate::error::Result<T> {
        self.execute(path, |http, url| http.patch(url).form(form))
            .await
    }

    /// PATCH a URL-encoded form, discarding any payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn patch_form_ack<F: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &F,
    ) -> crate::error::Result<()> {
        self.execute_ack(path, |http, url| http.patch(url).form(form))
            .await
    }

    /// PATCH `path` with no body, discarding any payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn patch_ack(&self, path: &str) -> crate::error::Result<()> {
        self.execute_ack(path, |http, url| http.patch(url)).await
    }

    /// DELETE `path`, discarding any payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn delete_ack(&self, path: &str) -> crate::error::Result<()> {
        self.execute_ack(path, |http, url| http.delete(url)).await
    }

    /// DELETE `path` with a URL-encoded form body, discarding any payload.
    ///
    /// # Errors
    ///
    /// Returns an error per the crate taxonomy; see [`ApiError`].
    pub async fn delete_form_ack<F: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &F,
    ) -> crate::error::Result<()> {
        self.execute_ack(path, |http, url| http.delete(url).form(form))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch with 401 recovery
    // ─────────────────────────────────────────────────────────────────────────

    async fn execute<T, B>(&self, path: &str, build: B) -> crate::error::Result<T>
    where
        T: DeserializeOwned,
        B: Fn(&reqwest::Client, Url) -> reqwest::RequestBuilder,
    {
        let response = self.dispatch(path, &build).await?;
        Self::decode(response).await
    }

    async fn execute_ack<B>(&self, path: &str, build: B) -> crate::error::Result<()>
    where
        B: Fn(&reqwest::Client, Url) -> reqwest::RequestBuilder,
    {
        let response = self.dispatch(path, &build).await?;
        Self::decode_ack(response).await
    }

    /// Send the request; on a 401 (outside the refresh endpoint), run the
    /// single-flight refresh and replay exactly once.
    async fn dispatch<B>(&self, path: &str, build: &B) -> crate::error::Result<reqwest::Response>
    where
        B: Fn(&reqwest::Client, Url) -> reqwest::RequestBuilder,
    {
        let relative = path.trim_start_matches('/');
        let url = self.inner.base_url.join(relative)?;
        let snapshot = self.inner.session.snapshot();

        let response = self
            .send(build(&self.inner.http, url.clone()), snapshot.token.as_ref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || relative == REFRESH_PATH {
            return Ok(response);
        }

        debug!(path = relative, "authorization failed, refreshing token");
        self.inner.session.refresh(snapshot.epoch).await?;

        let retry_token = self.inner.session.snapshot().token;
        let retry = self
            .send(build(&self.inner.http, url), retry_token.as_ref())
            .await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(path = relative, "authorization failed again after refresh");
            self.inner.session.teardown();
            return Err(ApiError::Auth("session expired".to_string()));
        }

        Ok(retry)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        token: Option<&SecretString>,
    ) -> crate::error::Result<reqwest::Response> {
        let builder = match token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        };
        Ok(builder.send().await?)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> crate::error::Result<T> {
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(envelope) => envelope.into_result(),
            Err(e) if status.is_success() => Err(ApiError::Parse(e)),
            Err(_) => Err(ApiError::Server {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            }),
        }
    }

    async fn decode_ack(response: reqwest::Response) -> crate::error::Result<()> {
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<Envelope<serde_json::Value>>(&text) {
            Ok(envelope) => envelope.into_ack(),
            Err(e) if status.is_success() => Err(ApiError::Parse(e)),
            Err(_) => Err(ApiError::Server {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            }),
        }
    }
}
