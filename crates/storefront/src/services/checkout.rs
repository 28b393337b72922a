//! Checkout and order flow.
//!
//! ```text
//! Idle ──submit──▶ Submitting ──200──▶ Confirmed ──invoice──▶ Idle (cart reset)
//!                      │
//!                      └──failure──▶ Idle
//! ```
//!
//! Submission validates the cart and the address before any network call and
//! is serialized: a second submit while one is outstanding is dropped
//! without a request.

use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::RwLock;
use tracing::instrument;

use spaza_core::{PaymentMethod, Price};

use super::cart::CartManager;
use super::guard::InFlight;
use super::invoice::{Invoice, InvoiceRenderer, RenderedInvoice};
use super::notices::Notifier;
use super::payment::{PaymentGateway, PaymentRedirect};
use crate::api::{OrderDetails, OrderPayload, StoreApi};
use crate::error::{
    LOG_IN_AGAIN, Operation, PreconditionError, Result, StorefrontError, ValidationError,
    add_breadcrumb,
};
use crate::models::{AddressForm, Cart, Session, ShippingAddress};

/// Address and payment choice collected before submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftOrder {
    pub address: AddressForm,
    pub payment: PaymentMethod,
}

/// A created order awaiting its invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub details: OrderDetails,
    pub payment: PaymentMethod,
    pub address: ShippingAddress,
    pub total: Price,
    /// Gateway form, for online payment only.
    pub redirect: Option<PaymentRedirect>,
}

/// Where the checkout currently stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CheckoutState {
    #[default]
    Idle,
    Submitting,
    Confirmed(Confirmation),
}

impl CheckoutState {
    /// Details of the confirmed order, if there is one.
    #[must_use]
    pub const fn order_details(&self) -> Option<&OrderDetails> {
        match self {
            Self::Confirmed(confirmation) => Some(&confirmation.details),
            _ => None,
        }
    }
}

/// Drives a cart through order creation and invoicing.
pub struct CheckoutService {
    api: Arc<dyn StoreApi>,
    session: Arc<Session>,
    cart: Arc<CartManager>,
    gateway: PaymentGateway,
    renderer: Arc<dyn InvoiceRenderer>,
    notifier: Notifier,
    state: RwLock<CheckoutState>,
    submitting: InFlight,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        api: Arc<dyn StoreApi>,
        session: Arc<Session>,
        cart: Arc<CartManager>,
        gateway: PaymentGateway,
        renderer: Arc<dyn InvoiceRenderer>,
        notifier: Notifier,
    ) -> Self {
        Self {
            api,
            session,
            cart,
            gateway,
            renderer,
            notifier,
            state: RwLock::new(CheckoutState::Idle),
            submitting: InFlight::new(Operation::SubmitOrder),
        }
    }

    pub async fn state(&self) -> CheckoutState {
        self.state.read().await.clone()
    }

    pub async fn order_details(&self) -> Option<OrderDetails> {
        self.state.read().await.order_details().cloned()
    }

    /// Whether a submission is outstanding, for disabling controls.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.is_busy()
    }

    /// Record the customer's payment choice.
    pub fn choose_payment_method(&self, method: PaymentMethod) -> PaymentMethod {
        self.notifier.success(format!("Chosen: {}", method.label()));
        method
    }

    /// Submit the cart as an order.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::InFlight` (without a notice) if a submission
    /// is already outstanding, `Precondition` if an order already awaits its
    /// invoice, `Validation` for an empty cart or a bad address,
    /// `AuthRequired` without a token, and `Remote` if the server does not
    /// answer 200.
    #[instrument(skip(self, draft), fields(payment = %draft.payment))]
    pub async fn submit(&self, draft: &DraftOrder) -> Result<Confirmation> {
        let result = self.try_submit(draft).await;
        self.settle(result).await
    }

    /// Render the invoice for the confirmed order, then start a new cart.
    ///
    /// On refusal the checkout state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Precondition` without a confirmed order, a
    /// complete address or any cart lines, and `Render` if the document
    /// cannot be produced.
    #[instrument(skip(self))]
    pub async fn generate_invoice(&self) -> Result<RenderedInvoice> {
        let result = self.try_generate_invoice().await;
        self.settle(result).await
    }

    /// Forget any confirmed order.
    pub async fn reset(&self) {
        *self.state.write().await = CheckoutState::Idle;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn try_submit(&self, draft: &DraftOrder) -> Result<Confirmation> {
        let _guard = self.submitting.try_begin()?;

        if matches!(*self.state.read().await, CheckoutState::Confirmed(_)) {
            return Err(PreconditionError::OrderAlreadyConfirmed.into());
        }

        let cart = self.cart.snapshot().await;
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let address = draft.address.validate().map_err(ValidationError::from)?;
        let token = self
            .session
            .token()
            .ok_or(StorefrontError::AuthRequired { hint: LOG_IN_AGAIN })?;

        *self.state.write().await = CheckoutState::Submitting;

        let payload = order_payload(&cart, address.clone());
        let details = match self.api.create_order(&token, &payload).await {
            Ok(details) => details,
            Err(e) => {
                self.reset().await;
                return Err(StorefrontError::from_authorized(e, failure_message(draft.payment)));
            }
        };

        let redirect = match draft.payment {
            PaymentMethod::Online => Some(self.gateway.redirect(payload.total_price, Utc::now())),
            PaymentMethod::Cash => None,
        };
        let confirmation = Confirmation {
            details,
            payment: draft.payment,
            address,
            total: payload.total_price,
            redirect,
        };
        *self.state.write().await = CheckoutState::Confirmed(confirmation.clone());

        let total = payload.total_price.to_fixed();
        add_breadcrumb(
            "checkout",
            "Order created",
            Some(&[("payment", draft.payment.to_string().as_str()), ("total", total.as_str())]),
        );
        tracing::info!(payment = %draft.payment, total = %payload.total_price, "Order created");
        self.notifier.success(match draft.payment {
            PaymentMethod::Cash => "Order created successfully",
            PaymentMethod::Online => "Order created, proceeding to PayFast",
        });
        Ok(confirmation)
    }

    async fn try_generate_invoice(&self) -> Result<RenderedInvoice> {
        let address = match &*self.state.read().await {
            CheckoutState::Confirmed(confirmation) => AddressForm::from(&confirmation.address),
            _ => return Err(PreconditionError::NoConfirmedOrder.into()),
        };

        let cart = self.cart.snapshot().await;
        let invoice = Invoice::build(
            &address,
            cart.lines(),
            cart.subtotal(),
            Local::now().date_naive(),
        )?;
        let rendered = self.renderer.render(&invoice)?;

        self.reset().await;
        self.cart.reset().await;

        add_breadcrumb("checkout", "Invoice generated", None);
        self.notifier.success("Your invoice has been created!");
        Ok(rendered)
    }

    async fn settle<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if matches!(err, StorefrontError::SessionExpired) {
                self.cart.expire_session().await;
                self.reset().await;
            }
            self.notifier.report(err);
        }
        result
    }
}

fn order_payload(cart: &Cart, address: ShippingAddress) -> OrderPayload {
    OrderPayload {
        total_price: cart.subtotal(),
        prod_ids: cart.lines().iter().map(|l| l.product.id.clone()).collect(),
        quantities: cart.lines().iter().map(|l| l.quantity).collect(),
        address,
    }
}

const fn failure_message(payment: PaymentMethod) -> &'static str {
    match payment {
        PaymentMethod::Cash => "Failed to create order",
        PaymentMethod::Online => "Failed to initiate PayFast payment",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use secrecy::SecretString;
    use tokio::sync::Notify;

    use spaza_core::{CartLineId, OrderId, ProductId};

    use super::*;
    use crate::api::{
        ApiError, MockStoreApi, SignInRequest, SignInResponse, SignUpRequest,
    };
    use crate::config::StorefrontConfig;
    use crate::models::address::tests::valid_form;
    use crate::models::cart::tests::line;
    use crate::models::{CartLine, MemorySessionStore, Product};
    use crate::services::invoice::TextInvoiceRenderer;
    use crate::services::notices::{self, Notice, NoticeReceiver};

    fn sample_lines() -> Vec<CartLine> {
        vec![line("l1", "p1", 5000, 2), line("l2", "p2", 1999, 1)]
    }

    fn draft(payment: PaymentMethod) -> DraftOrder {
        DraftOrder {
            address: valid_form(),
            payment,
        }
    }

    fn created(id: &str) -> OrderDetails {
        OrderDetails {
            id: Some(OrderId::new(id)),
            ..OrderDetails::default()
        }
    }

    /// Build a checkout whose cart has been loaded from `api`.
    async fn checkout(api: impl StoreApi + 'static) -> (CheckoutService, NoticeReceiver) {
        let api: Arc<dyn StoreApi> = Arc::new(api);
        let (notifier, mut notices) = notices::channel();
        let session = Session::load(Arc::new(MemorySessionStore::with_token("t-1"))).unwrap();
        session.mark_authenticated();
        let session = Arc::new(session);

        let cart = Arc::new(CartManager::new(api.clone(), session.clone(), notifier.clone()));
        let _ = cart.reload().await;
        notices.drain();

        let config = StorefrontConfig::for_base_url("http://localhost:8089").unwrap();
        let service = CheckoutService::new(
            api,
            session,
            cart,
            PaymentGateway::new(config.payment),
            Arc::new(TextInvoiceRenderer),
            notifier,
        );
        (service, notices)
    }

    fn mock_with_cart(lines: Vec<CartLine>) -> MockStoreApi {
        let mut api = MockStoreApi::new();
        api.expect_cart().returning(move |_| Ok(lines.clone()));
        api
    }

    #[tokio::test]
    async fn test_cash_submission_confirms_order() {
        let mut api = mock_with_cart(sample_lines());
        api.expect_create_order()
            .withf(|_, order| {
                order.total_price == Price::from_cents(11999)
                    && order.prod_ids == vec![ProductId::new("p1"), ProductId::new("p2")]
                    && order.quantities == vec![2, 1]
                    && order.address.area_code == "2001"
            })
            .times(1)
            .returning(|_, _| Ok(created("o-1")));
        let (checkout, mut notices) = checkout(api).await;

        let confirmation = checkout.submit(&draft(PaymentMethod::Cash)).await.unwrap();

        assert!(confirmation.redirect.is_none());
        assert_eq!(checkout.order_details().await, Some(created("o-1")));
        assert_eq!(notices.drain(), vec![Notice::success("Order created successfully")]);
    }

    #[tokio::test]
    async fn test_online_submission_builds_redirect() {
        let mut api = mock_with_cart(sample_lines());
        api.expect_create_order()
            .times(1)
            .returning(|_, _| Ok(created("o-2")));
        let (checkout, mut notices) = checkout(api).await;

        let confirmation = checkout.submit(&draft(PaymentMethod::Online)).await.unwrap();

        let redirect = confirmation.redirect.unwrap();
        assert_eq!(redirect.field("amount"), Some("119.99"));
        assert!(redirect.field("m_payment_id").unwrap().starts_with("ORDER_"));
        assert_eq!(
            notices.drain(),
            vec![Notice::success("Order created, proceeding to PayFast")]
        );
    }

    #[tokio::test]
    async fn test_invalid_address_blocks_submission() {
        let mut api = mock_with_cart(sample_lines());
        api.expect_create_order().times(0);
        let (checkout, mut notices) = checkout(api).await;

        for payment in [PaymentMethod::Cash, PaymentMethod::Online] {
            let order = DraftOrder {
                address: AddressForm {
                    country: String::new(),
                    province: "X".to_string(),
                    suburb: "X".to_string(),
                    city: "X".to_string(),
                    street_name: "X".to_string(),
                    area_code: "12A".to_string(),
                },
                payment,
            };
            let err = checkout.submit(&order).await.unwrap_err();

            assert!(matches!(
                err,
                StorefrontError::Validation(ValidationError::Address(ref e)) if e.0.len() == 2
            ));
            assert_eq!(
                notices.drain(),
                vec![
                    Notice::error("Country is required"),
                    Notice::error("Area code must be numeric")
                ]
            );
            assert_eq!(checkout.state().await, CheckoutState::Idle);
        }
    }

    #[tokio::test]
    async fn test_empty_cart_blocks_submission() {
        let mut api = mock_with_cart(Vec::new());
        api.expect_create_order().times(0);
        let (checkout, mut notices) = checkout(api).await;

        checkout.submit(&draft(PaymentMethod::Cash)).await.unwrap_err();
        assert_eq!(notices.drain(), vec![Notice::error("Cart is empty")]);
    }

    #[tokio::test]
    async fn test_failure_returns_to_idle_with_fallback_per_method() {
        let mut api = mock_with_cart(sample_lines());
        // 201 is not accepted for order creation.
        api.expect_create_order().times(2).returning(|_, _| {
            Err(ApiError::Status {
                status: 201,
                message: None,
            })
        });
        let (checkout, mut notices) = checkout(api).await;

        checkout.submit(&draft(PaymentMethod::Cash)).await.unwrap_err();
        assert_eq!(checkout.state().await, CheckoutState::Idle);
        checkout.submit(&draft(PaymentMethod::Online)).await.unwrap_err();
        assert_eq!(checkout.state().await, CheckoutState::Idle);

        assert_eq!(
            notices.drain(),
            vec![
                Notice::error("Failed to create order"),
                Notice::error("Failed to initiate PayFast payment")
            ]
        );
    }

    #[tokio::test]
    async fn test_second_order_needs_invoice_first() {
        let mut api = mock_with_cart(sample_lines());
        api.expect_create_order()
            .times(1)
            .returning(|_, _| Ok(created("o-1")));
        let (checkout, _notices) = checkout(api).await;

        checkout.submit(&draft(PaymentMethod::Cash)).await.unwrap();
        let err = checkout.submit(&draft(PaymentMethod::Cash)).await.unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Precondition(PreconditionError::OrderAlreadyConfirmed)
        ));
    }

    #[tokio::test]
    async fn test_invoice_totals_and_resets() {
        let mut api = mock_with_cart(sample_lines());
        api.expect_create_order()
            .times(1)
            .returning(|_, _| Ok(created("o-1")));
        let (checkout, mut notices) = checkout(api).await;

        checkout.submit(&draft(PaymentMethod::Cash)).await.unwrap();
        notices.drain();

        let rendered = checkout.generate_invoice().await.unwrap();
        let text = String::from_utf8(rendered.bytes).unwrap();

        assert!(text.contains("Total: R119.99"));
        assert_eq!(checkout.state().await, CheckoutState::Idle);
        assert!(checkout.cart.snapshot().await.is_empty());
        assert_eq!(notices.drain(), vec![Notice::success("Your invoice has been created!")]);
    }

    #[tokio::test]
    async fn test_invoice_refused_with_empty_cart_keeps_order() {
        let mut api = mock_with_cart(sample_lines());
        api.expect_create_order()
            .times(1)
            .returning(|_, _| Ok(created("o-1")));
        let (checkout, mut notices) = checkout(api).await;

        checkout.submit(&draft(PaymentMethod::Cash)).await.unwrap();
        checkout.cart.reset().await;
        notices.drain();

        let err = checkout.generate_invoice().await.unwrap_err();

        assert!(matches!(
            err,
            StorefrontError::Precondition(PreconditionError::EmptyCart)
        ));
        assert_eq!(checkout.order_details().await, Some(created("o-1")));
        assert_eq!(
            notices.drain(),
            vec![Notice::error("Invalid order data for invoice generation")]
        );
    }

    #[tokio::test]
    async fn test_invoice_without_order_is_refused() {
        let (checkout, mut notices) = checkout(mock_with_cart(sample_lines())).await;

        let err = checkout.generate_invoice().await.unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Precondition(PreconditionError::NoConfirmedOrder)
        ));
        assert_eq!(notices.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_choose_payment_method_notice() {
        let (checkout, mut notices) = checkout(mock_with_cart(Vec::new())).await;

        checkout.choose_payment_method(PaymentMethod::Online);
        checkout.choose_payment_method(PaymentMethod::Cash);
        assert_eq!(
            notices.drain(),
            vec![
                Notice::success("Chosen: Online Payment with PayFast"),
                Notice::success("Chosen: Pay With Cash on Delivery")
            ]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_order_expires_session() {
        let mut api = mock_with_cart(sample_lines());
        api.expect_create_order().times(1).returning(|_, _| {
            Err(ApiError::Status {
                status: 401,
                message: None,
            })
        });
        let (checkout, mut notices) = checkout(api).await;

        let err = checkout.submit(&draft(PaymentMethod::Cash)).await.unwrap_err();

        assert!(matches!(err, StorefrontError::SessionExpired));
        assert!(checkout.session.token().is_none());
        assert!(checkout.cart.snapshot().await.is_empty());
        assert_eq!(
            notices.drain(),
            vec![Notice::error("Session expired. Please log in again.")]
        );
    }

    // =========================================================================
    // Overlapping submissions
    // =========================================================================

    /// Holds `create_order` open until released.
    #[derive(Default)]
    struct GatedApi {
        entered: Notify,
        release: Notify,
        orders: AtomicUsize,
    }

    fn not_used() -> ApiError {
        ApiError::Status {
            status: 501,
            message: None,
        }
    }

    #[async_trait]
    impl StoreApi for GatedApi {
        async fn validate_session(&self, _: &SecretString) -> std::result::Result<(), ApiError> {
            Err(not_used())
        }

        async fn products(&self) -> std::result::Result<Vec<Product>, ApiError> {
            Err(not_used())
        }

        async fn product(&self, _: &ProductId) -> std::result::Result<Product, ApiError> {
            Err(not_used())
        }

        async fn cart(&self, _: &SecretString) -> std::result::Result<Vec<CartLine>, ApiError> {
            Ok(sample_lines())
        }

        async fn add_to_cart(
            &self,
            _: &SecretString,
            _: &ProductId,
            _: u32,
        ) -> std::result::Result<(), ApiError> {
            Err(not_used())
        }

        async fn remove_from_cart(
            &self,
            _: &SecretString,
            _: &CartLineId,
        ) -> std::result::Result<(), ApiError> {
            Err(not_used())
        }

        async fn update_quantity(
            &self,
            _: &SecretString,
            _: &CartLineId,
            _: u32,
        ) -> std::result::Result<(), ApiError> {
            Err(not_used())
        }

        async fn create_order(
            &self,
            _: &SecretString,
            _: &OrderPayload,
        ) -> std::result::Result<OrderDetails, ApiError> {
            self.orders.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            Ok(created("o-gated"))
        }

        async fn sign_up(&self, _: &SignUpRequest) -> std::result::Result<(), ApiError> {
            Err(not_used())
        }

        async fn sign_in(
            &self,
            _: &SignInRequest,
        ) -> std::result::Result<SignInResponse, ApiError> {
            Err(not_used())
        }
    }

    #[tokio::test]
    async fn test_overlapping_submit_issues_one_request() {
        let api = Arc::new(GatedApi::default());
        let (notifier, mut notices) = notices::channel();
        let session = Session::load(Arc::new(MemorySessionStore::with_token("t-1"))).unwrap();
        session.mark_authenticated();
        let session = Arc::new(session);
        let cart = Arc::new(CartManager::new(api.clone(), session.clone(), notifier.clone()));
        cart.reload().await.unwrap();
        let config = StorefrontConfig::for_base_url("http://localhost:8089").unwrap();
        let checkout = CheckoutService::new(
            api.clone(),
            session,
            cart,
            PaymentGateway::new(config.payment),
            Arc::new(TextInvoiceRenderer),
            notifier,
        );
        let order = draft(PaymentMethod::Cash);

        let (first, second) = tokio::join!(checkout.submit(&order), async {
            api.entered.notified().await;
            assert!(checkout.is_submitting());
            assert_eq!(checkout.state().await, CheckoutState::Submitting);
            let second = checkout.submit(&order).await;
            api.release.notify_one();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(StorefrontError::InFlight(Operation::SubmitOrder))
        ));
        assert_eq!(api.orders.load(Ordering::SeqCst), 1);
        assert!(!checkout.is_submitting());
        // Only the first submission speaks.
        assert_eq!(notices.drain(), vec![Notice::success("Order created successfully")]);
    }
}
