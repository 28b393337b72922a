//! reqwest implementation of [`StoreApi`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use spaza_core::{CartLineId, ProductId};

use super::types::{
    AddToCartBody, ApiMessage, CartResponse, CreateOrderBody, OrderDetails, OrderPayload,
    SignInRequest, SignInResponse, SignUpRequest, UpdateQuantityBody,
};
use super::{ApiError, StoreApi};
use crate::config::ApiConfig;
use crate::models::{CartLine, Product};

/// Statuses an operation treats as success.
#[derive(Debug, Clone, Copy)]
enum Accept {
    /// Any 2xx.
    Success,
    /// Only the listed codes.
    Only(&'static [u16]),
}

impl Accept {
    fn allows(self, status: StatusCode) -> bool {
        match self {
            Self::Success => status.is_success(),
            Self::Only(codes) => codes.contains(&status.as_u16()),
        }
    }
}

// =============================================================================
// HttpStoreApi
// =============================================================================

/// Client for the remote shop REST API.
#[derive(Clone)]
pub struct HttpStoreApi {
    inner: Arc<HttpStoreApiInner>,
}

struct HttpStoreApiInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpStoreApi {
    /// Create a client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            inner: Arc::new(HttpStoreApiInner {
                client: builder.build()?,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Endpoint URL below the base path.
    ///
    /// Each segment is percent-encoded on its own, so an ID can never reach
    /// another endpoint. A trailing `""` segment yields a trailing slash.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(dots) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(ApiError::PathSegment((*dots).to_string()));
        }

        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        token: Option<&SecretString>,
    ) -> Result<RequestBuilder, ApiError> {
        let request = self.inner.client.request(method, self.url(segments)?);
        Ok(match token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        })
    }

    /// Send a request and return the raw body of an accepted response.
    async fn send(&self, request: RequestBuilder, accept: Accept) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if accept.allows(status) {
            return Ok(body);
        }

        // Only error responses carry a message worth surfacing.
        let message = if status.is_success() {
            None
        } else {
            serde_json::from_str::<ApiMessage>(&body)
                .ok()
                .and_then(|m| m.message)
        };

        tracing::warn!(
            status = %status,
            body = %body.chars().take(200).collect::<String>(),
            "Shop API returned unexpected status"
        );

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        accept: Accept,
    ) -> Result<T, ApiError> {
        let body = self.send(request, accept).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse shop API response"
            );
            ApiError::Parse(e)
        })
    }
}

#[async_trait]
impl StoreApi for HttpStoreApi {
    #[instrument(skip(self, token))]
    async fn validate_session(&self, token: &SecretString) -> Result<(), ApiError> {
        let request = self.request(Method::GET, &["auth", "validate"], Some(token))?;
        self.send(request, Accept::Success).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn products(&self) -> Result<Vec<Product>, ApiError> {
        let request = self.request(Method::GET, &["product", ""], None)?;
        let products: Option<Vec<Product>> = self.send_json(request, Accept::Success).await?;
        let products = products.unwrap_or_default();
        debug!(count = products.len(), "Fetched products");
        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let request = self.request(Method::GET, &["product", id.as_str()], None)?;
        self.send_json(request, Accept::Success).await
    }

    #[instrument(skip(self, token))]
    async fn cart(&self, token: &SecretString) -> Result<Vec<CartLine>, ApiError> {
        let request = self.request(Method::GET, &["cart", ""], Some(token))?;
        let body: Option<CartResponse> = self.send_json(request, Accept::Success).await?;
        let lines = body.and_then(|b| b.cart_items).unwrap_or_default();
        debug!(lines = lines.len(), "Fetched cart");
        Ok(lines)
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn add_to_cart(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, &["cart", "add"], Some(token))?
            .json(&AddToCartBody {
                product_id,
                quantity,
            });
        self.send(request, Accept::Only(&[200, 201])).await?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(line_id = %line_id))]
    async fn remove_from_cart(
        &self,
        token: &SecretString,
        line_id: &CartLineId,
    ) -> Result<(), ApiError> {
        let request =
            self.request(Method::DELETE, &["cart", "delete", line_id.as_str()], Some(token))?;
        self.send(request, Accept::Only(&[200, 204])).await?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(line_id = %line_id))]
    async fn update_quantity(
        &self,
        token: &SecretString,
        line_id: &CartLineId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let request = self
            .request(Method::PATCH, &["cart", "update", line_id.as_str()], Some(token))?
            .json(&UpdateQuantityBody { quantity });
        self.send(request, Accept::Only(&[200, 201])).await?;
        Ok(())
    }

    #[instrument(skip(self, token, order), fields(lines = order.prod_ids.len()))]
    async fn create_order(
        &self,
        token: &SecretString,
        order: &OrderPayload,
    ) -> Result<OrderDetails, ApiError> {
        let body = CreateOrderBody {
            token: token.expose_secret(),
            order,
        };
        let request = self
            .request(Method::POST, &["order", "create-checkout-session"], Some(token))?
            .json(&body);
        // The endpoint signals a created order with exactly 200.
        let raw = self.send(request, Accept::Only(&[200])).await?;
        if raw.trim().is_empty() {
            return Ok(OrderDetails::default());
        }
        Ok(serde_json::from_str::<Option<OrderDetails>>(&raw)?.unwrap_or_default())
    }

    #[instrument(skip(self, request))]
    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, &["user", "signup"], None)?
            .json(request);
        self.send(request, Accept::Success).await?;
        Ok(())
    }

    #[instrument(skip(self, request))]
    async fn sign_in(&self, request: &SignInRequest) -> Result<SignInResponse, ApiError> {
        let request = self
            .request(Method::POST, &["user", "signin"], None)?
            .json(request);
        self.send_json(request, Accept::Success).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpStoreApi {
        HttpStoreApi::new(&ApiConfig {
            base_url: Url::parse(base).unwrap(),
            timeout: None,
        })
        .unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        assert_eq!(
            client("http://localhost:8089").url(&["cart", ""]).unwrap().as_str(),
            "http://localhost:8089/cart/"
        );
        assert_eq!(
            client("https://shop.example.com/api/")
                .url(&["product", "p1"])
                .unwrap()
                .as_str(),
            "https://shop.example.com/api/product/p1"
        );
    }

    #[test]
    fn test_ids_stay_in_their_segment() {
        let api = client("http://localhost:8089");

        let delete = api.url(&["cart", "delete", "line-7#x"]).unwrap();
        assert_eq!(delete.path(), "/cart/delete/line-7%23x");
        assert_eq!(delete.fragment(), None);

        let product = api.url(&["product", "../cart/"]).unwrap();
        assert_eq!(product.path(), "/product/..%2Fcart%2F");

        let query = api.url(&["product", "p1?admin=1"]).unwrap();
        assert_eq!(query.path(), "/product/p1%3Fadmin=1");
        assert_eq!(query.query(), None);
    }

    #[test]
    fn test_dot_segments_are_refused() {
        let api = client("http://localhost:8089");
        assert!(matches!(
            api.url(&["cart", "delete", ".."]),
            Err(ApiError::PathSegment(ref s)) if s == ".."
        ));
        assert!(matches!(api.url(&["product", "."]), Err(ApiError::PathSegment(_))));
    }

    #[test]
    fn test_accept() {
        assert!(Accept::Success.allows(StatusCode::NO_CONTENT));
        assert!(!Accept::Success.allows(StatusCode::UNAUTHORIZED));
        assert!(Accept::Only(&[200, 204]).allows(StatusCode::NO_CONTENT));
        assert!(!Accept::Only(&[200]).allows(StatusCode::CREATED));
    }
}
