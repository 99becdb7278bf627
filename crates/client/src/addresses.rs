//! Delivery address endpoint group.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use clovemart_core::AddressId;

use crate::error::Result;
use crate::gateway::RequestGateway;

/// A saved delivery address.
#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pincode: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Fields for creating or updating an address.
#[derive(Debug, Clone, Serialize)]
pub struct AddressInput {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pincode: String,
}

/// Address endpoint group. All operations require an authenticated session.
#[derive(Clone)]
pub struct AddressApi {
    gateway: RequestGateway,
}

impl AddressApi {
    pub(crate) fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    /// All saved addresses for the signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Address>> {
        self.gateway.get("addresses").await
    }

    /// A single address by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not found or the request fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: AddressId) -> Result<Address> {
        self.gateway.get(&format!("addresses/{id}")).await
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the address.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: &AddressInput) -> Result<Address> {
        self.gateway.post_form("addresses", input).await
    }

    /// Update an existing address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not found or the API rejects it.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: AddressId, input: &AddressInput) -> Result<Address> {
        self.gateway
            .patch_form(&format!("addresses/{id}"), input)
            .await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not found.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: AddressId) -> Result<()> {
        self.gateway.delete_ack(&format!("addresses/{id}")).await
    }

    /// The customer's default address, if one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn default_address(&self) -> Result<Option<Address>> {
        self.gateway.get("addresses/default").await
    }

    /// Mark an address as the default for future orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not found.
    #[instrument(skip(self))]
    pub async fn set_default(&self, id: AddressId) -> Result<()> {
        self.gateway
            .patch_ack(&format!("addresses/set-default/{id}"))
            .await
    }
}
