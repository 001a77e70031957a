//! URLs handed to off-site payment services, and the result page URL.

use crate::error::{CheckoutError, CheckoutResult};
use url::Url;
use uuid::Uuid;

/// Query parameter naming the return type
pub const RETURN_PARAM: &str = "return";
/// Query parameter carrying the attempt token
pub const PAYMENT_ID_PARAM: &str = "payment_id";

/// Return, fail and cancel URLs for one payment attempt.
///
/// All three point back to the same endpoint and carry the attempt token,
/// which is checked against the session when the customer comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    endpoint: Url,
    token: String,
}

impl CallbackUrls {
    pub fn new(endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            endpoint,
            token: token.into(),
        }
    }

    /// Parse the endpoint from a string
    pub fn parse(endpoint: &str, token: impl Into<String>) -> CheckoutResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            CheckoutError::Configuration(format!("Invalid return endpoint '{}': {}", endpoint, e))
        })?;
        Ok(Self::new(endpoint, token))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn return_url(&self) -> String {
        self.url_for("return")
    }

    pub fn fail_url(&self) -> String {
        self.url_for("fail")
    }

    pub fn cancel_url(&self) -> String {
        self.url_for("cancel")
    }

    fn url_for(&self, return_type: &str) -> String {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair(RETURN_PARAM, return_type)
            .append_pair(PAYMENT_ID_PARAM, &self.token);
        url.to_string()
    }
}

/// `<page>?result=<result>&cart=<cart id>`; `cart` is left out when unknown
pub fn result_url(page: &Url, result: &str, cart_id: Option<Uuid>) -> String {
    let mut url = page.clone();
    {
        let mut query = url.query_pairs_mut();
        query.clear().append_pair("result", result);
        if let Some(id) = cart_id {
            query.append_pair("cart", &id.to_string());
        }
    }
    url.to_string()
}
