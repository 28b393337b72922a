//! Request and response bodies of the remote shop API.

use serde::{Deserialize, Serialize};

use spaza_core::{OrderId, Price, ProductId};

use crate::models::{CartLine, ShippingAddress};

/// Body of `POST /cart/add`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartBody<'a> {
    pub product_id: &'a ProductId,
    pub quantity: u32,
}

/// Body of `PATCH /cart/update/{id}`.
#[derive(Debug, Serialize)]
pub struct UpdateQuantityBody {
    pub quantity: u32,
}

/// Body of `GET /cart/`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    #[serde(default)]
    pub cart_items: Option<Vec<CartLine>>,
}

/// Order contents sent to `POST /order/create-checkout-session`.
///
/// `prod_ids` and `quantities` are parallel arrays in cart order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub total_price: Price,
    #[serde(rename = "prodIDs")]
    pub prod_ids: Vec<ProductId>,
    pub quantities: Vec<u32>,
    #[serde(flatten)]
    pub address: ShippingAddress,
}

/// Wire body of the order request: the payload plus the session token,
/// which the endpoint also expects inline.
#[derive(Serialize)]
pub(crate) struct CreateOrderBody<'a> {
    pub token: &'a str,
    #[serde(flatten)]
    pub order: &'a OrderPayload,
}

/// Server confirmation of a created order.
///
/// The endpoint's response shape is loose; known fields are lifted out and
/// everything else is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(default, alias = "orderId", skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST /user/signin`.
#[derive(Clone, Serialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Response of `POST /user/signin`.
#[derive(Debug, Default, Deserialize)]
pub struct SignInResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// Body of `POST /user/signup`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Error body returned by the API on failures.
#[derive(Debug, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
}
