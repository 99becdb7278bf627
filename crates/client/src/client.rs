//! The top-level client handle wiring every endpoint group to one shared
//! HTTP stack and session.

use std::sync::Arc;

use tracing::instrument;

use crate::addresses::AddressApi;
use crate::auth::AuthApi;
use crate::cart::CartSynchronizer;
use crate::catalog::CatalogApi;
use crate::checkout::{CheckoutOrchestrator, CheckoutStart};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::gateway::RequestGateway;
use crate::orders::OrderApi;
use crate::pricing::PricingEngine;
use crate::session::{FileTokenStore, MemoryTokenStore, SessionManager, TokenStore};

struct ClientInner {
    config: ClientConfig,
    session: SessionManager,
    auth: AuthApi,
    catalog: CatalogApi,
    addresses: AddressApi,
    orders: OrderApi,
    cart: CartSynchronizer,
    pricing: PricingEngine,
}

/// A handle to the customer API.
///
/// Cheap to clone; all clones share one connection pool, session, and cart
/// mirror. Construct once per process and pass by reference to consumers.
#[derive(Clone)]
pub struct CustomerClient {
    inner: Arc<ClientInner>,
}

impl CustomerClient {
    /// Build a client from configuration. Tokens persist to
    /// `config.token_path` when set, otherwise in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed or a
    /// persisted token cannot be read.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()?;

        let store: Box<dyn TokenStore> = match &config.token_path {
            Some(path) => Box::new(FileTokenStore::new(path)),
            None => Box::new(MemoryTokenStore::new()),
        };

        let session = SessionManager::new(http.clone(), &config.base_url, store)?;
        let gateway = RequestGateway::new(http, config.base_url.clone(), session.clone());

        let inner = ClientInner {
            auth: AuthApi::new(gateway.clone()),
            catalog: CatalogApi::new(gateway.clone()),
            addresses: AddressApi::new(gateway.clone()),
            orders: OrderApi::new(gateway.clone()),
            cart: CartSynchronizer::new(gateway),
            pricing: PricingEngine::default(),
            session,
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Build a client configured from `CLOVEMART_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env().map_err(|e| {
            crate::error::ApiError::Validation(e.to_string())
        })?;
        Self::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    #[must_use]
    pub fn auth(&self) -> &AuthApi {
        &self.inner.auth
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogApi {
        &self.inner.catalog
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressApi {
        &self.inner.addresses
    }

    #[must_use]
    pub fn orders(&self) -> &OrderApi {
        &self.inner.orders
    }

    #[must_use]
    pub fn cart(&self) -> &CartSynchronizer {
        &self.inner.cart
    }

    #[must_use]
    pub fn pricing(&self) -> &PricingEngine {
        &self.inner.pricing
    }

    /// Open a checkout for the current cart.
    ///
    /// The cart mirror is refreshed first so the gate sees current contents.
    /// An unauthenticated session or an empty cart redirects instead of
    /// erroring.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cart refresh itself fails.
    #[instrument(skip(self))]
    pub async fn begin_checkout(&self) -> Result<CheckoutStart> {
        if !self.inner.session.is_authenticated() {
            return Ok(CheckoutStart::NeedsLogin);
        }

        self.inner.cart.fetch_cart().await?;
        if self.inner.cart.is_empty() {
            return Ok(CheckoutStart::EmptyCart);
        }

        Ok(CheckoutStart::Ready(Box::new(CheckoutOrchestrator::new(
            self.inner.cart.clone(),
            self.inner.addresses.clone(),
            self.inner.catalog.clone(),
            self.inner.orders.clone(),
            self.inner.pricing.clone(),
        ))))
    }
}
