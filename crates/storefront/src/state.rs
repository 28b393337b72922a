//! Application state shared by every consumer.

use std::sync::Arc;

use tracing::instrument;

use crate::api::{ApiError, HttpStoreApi, StoreApi};
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::models::{Cart, FileSessionStore, Session, SessionStore, SessionStoreError};
use crate::services::{
    AuthService, CartManager, CatalogService, CheckoutService, InvoiceRenderer, Notifier,
    PaymentGateway, SignInForm, SignUpForm, TextInvoiceRenderer,
};

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to load session: {0}")]
    Session(#[from] SessionStoreError),
    #[error("failed to create API client: {0}")]
    Api(#[from] ApiError),
}

/// Application state.
///
/// Cheaply cloneable via `Arc`. Owns the session and every service; the
/// Cart Manager inside is the only writer of the cart.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    session: Arc<Session>,
    auth: AuthService,
    catalog: CatalogService,
    cart: Arc<CartManager>,
    checkout: CheckoutService,
    notifier: Notifier,
}

impl AppState {
    /// Wire the services around the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be read.
    pub fn new(
        config: StorefrontConfig,
        api: Arc<dyn StoreApi>,
        store: Arc<dyn SessionStore>,
        renderer: Arc<dyn InvoiceRenderer>,
        notifier: Notifier,
    ) -> std::result::Result<Self, StateError> {
        let session = Arc::new(Session::load(store)?);
        let cart = Arc::new(CartManager::new(api.clone(), session.clone(), notifier.clone()));
        let checkout = CheckoutService::new(
            api.clone(),
            session.clone(),
            cart.clone(),
            PaymentGateway::new(config.payment.clone()),
            renderer,
            notifier.clone(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                auth: AuthService::new(api.clone(), session.clone(), notifier.clone()),
                catalog: CatalogService::new(api, notifier.clone()),
                config,
                session,
                cart,
                checkout,
                notifier,
            }),
        })
    }

    /// State backed by the HTTP API, the session file and the text invoice
    /// renderer.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the session
    /// file cannot be read.
    pub fn from_config(
        config: StorefrontConfig,
        notifier: Notifier,
    ) -> std::result::Result<Self, StateError> {
        let api = Arc::new(HttpStoreApi::new(&config.api)?);
        let store = Arc::new(FileSessionStore::new(&config.session_file));
        Self::new(config, api, store, Arc::new(TextInvoiceRenderer), notifier)
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartManager {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Startup validation of a stored token.
    ///
    /// Returns `Ok(true)` when the token was accepted and the cart loaded,
    /// `Ok(false)` when there was no token. A rejected token is dropped, the
    /// cart and any confirmed order are cleared, and a single expiry notice
    /// is raised.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::SessionExpired` if the token was rejected.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) -> Result<bool> {
        match self.auth().validate_stored_token().await {
            Ok(false) => {
                self.cart().reset().await;
                Ok(false)
            }
            Ok(true) => {
                // A failed fetch has already been surfaced by the cart.
                if let Err(e) = self.cart().reload().await {
                    tracing::debug!(error = %e, "Cart unavailable after session restore");
                }
                Ok(true)
            }
            Err(err) => {
                let first = self.cart().expire_session().await;
                self.checkout().reset().await;
                if first {
                    self.notifier().report(&err);
                }
                Err(err)
            }
        }
    }

    /// Sign in, then load the new user's cart.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError` if signing in or loading the cart fails.
    pub async fn sign_in(&self, form: &SignInForm) -> Result<Cart> {
        self.auth().sign_in(form).await?;
        self.checkout().reset().await;
        self.cart().reload().await
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError` if validation or the request fails.
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<()> {
        self.auth().sign_up(form).await
    }

    /// Sign out: drop the token, the cart and any confirmed order.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Session` if the stored token cannot be
    /// removed. Local state is cleared regardless.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.auth().sign_out();
        self.cart().reset().await;
        self.checkout().reset().await;
        result
    }
}
