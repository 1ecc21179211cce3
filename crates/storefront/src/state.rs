//! Application state shared by every storefront entry point.

use std::sync::Arc;

use crate::asaas::{AsaasClient, GatewayError, WebhookHandler};
use crate::config::StorefrontConfig;
use crate::db::{FileStore, Storage, StorageError};
use crate::services::admin::AdminService;
use crate::services::auth::AuthService;
use crate::services::cart::CartStore;
use crate::services::checkout::CheckoutFlow;

/// Error assembling the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to open data directory: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to build payment client: {0}")]
    Gateway(#[from] GatewayError),
}

/// Application state.
///
/// Cheaply cloneable via `Arc`; clones share storage and the gateway
/// client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    storage: Storage,
    asaas: Option<AsaasClient>,
    auth: AuthService,
    admin: AdminService,
    webhooks: WebhookHandler,
}

impl AppState {
    /// Open the data directory and build the services.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Storage` if the data directory cannot be created
    /// and `StateError::Gateway` if the gateway client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let storage = Storage::new(FileStore::open(&config.data_dir)?);
        Self::with_storage(config, storage)
    }

    /// Build the services over an existing storage handle.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Gateway` if an API key is configured but the
    /// gateway client cannot be built.
    pub fn with_storage(config: StorefrontConfig, storage: Storage) -> Result<Self, StateError> {
        let asaas = config
            .asaas
            .api_key
            .is_some()
            .then(|| AsaasClient::new(&config.asaas))
            .transpose()?;
        let auth = AuthService::new(storage.clone(), config.auth_latency);
        let admin = AdminService::new(storage.clone());
        let webhooks = WebhookHandler::new(storage.clone(), config.asaas.webhook_token.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                asaas,
                auth,
                admin,
                webhooks,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the storage handle.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    /// Get a reference to the Asaas API client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` when the state was built without an
    /// API key.
    pub fn asaas(&self) -> Result<&AsaasClient, GatewayError> {
        self.inner
            .asaas
            .as_ref()
            .ok_or_else(GatewayError::missing_api_key)
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn admin(&self) -> &AdminService {
        &self.inner.admin
    }

    #[must_use]
    pub fn webhooks(&self) -> &WebhookHandler {
        &self.inner.webhooks
    }

    /// A cart persisted in the data directory.
    #[must_use]
    pub fn cart(&self) -> CartStore {
        CartStore::persistent(self.inner.storage.clone())
    }

    /// A fresh checkout flow using the configured due days and grace.
    #[must_use]
    pub fn checkout(&self) -> CheckoutFlow {
        CheckoutFlow::from_config(&self.inner.config)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("storage", &self.inner.storage)
            .finish_non_exhaustive()
    }
}
