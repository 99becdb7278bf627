//! Authentication endpoints.
//!
//! Login, OTP verification, and registration all establish the session on
//! success: the access token is persisted and the customer profile cached.
//! Logout tears local session state down even when the network call fails.

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::gateway::RequestGateway;
use crate::session::{CustomerProfile, SessionManager};

/// Payload returned by the session-creating auth endpoints.
#[derive(Debug, Deserialize)]
struct AuthPayload {
    #[serde(rename = "accessToken")]
    access_token: String,
    user: CustomerProfile,
}

/// Form for creating a new customer account.
#[derive(Debug, Serialize)]
pub struct RegistrationForm {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
}

/// Partial profile update; only set fields are sent.
#[derive(Debug, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Auth endpoint group (`/auth/*`, `/profile`).
#[derive(Clone)]
pub struct AuthApi {
    gateway: RequestGateway,
}

impl AuthApi {
    pub(crate) fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    fn session(&self) -> &SessionManager {
        self.gateway.session()
    }

    /// Request an OTP to be sent to a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn send_otp(&self, phone: &str) -> crate::error::Result<()> {
        self.gateway
            .post_form_ack("auth/send-otp", &[("phone", phone)])
            .await
    }

    /// Verify an OTP and establish the session. `name`/`email` are supplied
    /// on first login, when the account is created on the fly.
    ///
    /// # Errors
    ///
    /// Returns an error if verification fails.
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(
        &self,
        phone: &str,
        otp: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> crate::error::Result<CustomerProfile> {
        let mut form = vec![("phone", phone), ("otp", otp)];
        if let Some(name) = name {
            form.push(("name", name));
        }
        if let Some(email) = email {
            form.push(("email", email));
        }

        let payload: AuthPayload = self.gateway.post_form("auth/verify-otp", &form).await?;
        self.session()
            .establish(&payload.access_token, Some(payload.user.clone()));
        Ok(payload.user)
    }

    /// Log in with email and password; establishes the session on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> crate::error::Result<CustomerProfile> {
        let payload: AuthPayload = self
            .gateway
            .post_form("auth/login", &[("email", email), ("password", password)])
            .await?;
        self.session()
            .establish(&payload.access_token, Some(payload.user.clone()));
        Ok(payload.user)
    }

    /// Create an account; establishes the session on success.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails.
    #[instrument(skip(self, form))]
    pub async fn register(&self, form: &RegistrationForm) -> crate::error::Result<CustomerProfile> {
        let payload: AuthPayload = self.gateway.post_form("auth/register", form).await?;
        self.session()
            .establish(&payload.access_token, Some(payload.user.clone()));
        Ok(payload.user)
    }

    /// Log out. Local session state is torn down regardless of whether the
    /// server call succeeds.
    ///
    /// # Errors
    ///
    /// Returns the network error, if any, after local teardown has already
    /// happened.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> crate::error::Result<()> {
        let result = self.gateway.post_ack("auth/logout").await;
        if let Err(e) = &result {
            warn!(error = %e, "logout request failed, clearing local session anyway");
        }
        self.session().teardown();
        result
    }

    /// Fetch the current customer profile and cache it on the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn current_profile(&self) -> crate::error::Result<CustomerProfile> {
        let profile: CustomerProfile = self.gateway.get("profile").await?;
        self.session().set_profile(profile.clone());
        Ok(profile)
    }

    /// Update the profile; the cached copy follows the server response.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(
        &self,
        patch: &ProfilePatch,
    ) -> crate::error::Result<CustomerProfile> {
        let profile: CustomerProfile = self.gateway.patch_form("profile", patch).await?;
        self.session().set_profile(profile.clone());
        Ok(profile)
    }

    /// Change the account password.
    ///
    /// # Errors
    ///
    /// Returns an error if the current password is rejected or the request
    /// fails.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> crate::error::Result<()> {
        self.gateway
            .post_form_ack(
                "auth/change-password",
                &[
                    ("current_password", current_password),
                    ("new_password", new_password),
                ],
            )
            .await
    }
}
