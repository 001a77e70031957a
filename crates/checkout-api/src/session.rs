//! # Browser Session
//!
//! Identifies the browser by the `checkout_session` cookie. Requests
//! without a usable cookie get a fresh id; handlers send the cookie back
//! with every response.

use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use tracing::debug;
use uuid::Uuid;

pub const COOKIE_NAME: &str = "checkout_session";

#[derive(Debug, Clone)]
pub struct BrowserSession {
    pub id: String,
    secure: bool,
}

impl BrowserSession {
    /// `Set-Cookie` value for this session
    pub fn cookie(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
            COOKIE_NAME,
            self.id,
            if self.secure { "; Secure" } else { "" }
        )
    }
}

/// Session id from the `Cookie` headers, if well-formed
fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|value| is_valid_id(value))
}

/// 32 hex digits, the simple form of a v4 uuid
fn is_valid_id(value: &str) -> bool {
    value.len() == 32 && value.chars().all(|c| c.is_ascii_hexdigit())
}

impl FromRequestParts<AppState> for BrowserSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = session_id(&parts.headers).unwrap_or_else(|| {
            let id = Uuid::new_v4().simple().to_string();
            debug!("New browser session");
            id
        });

        Ok(Self {
            id,
            secure: state.config.is_production(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const ID: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_reads_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; checkout_session={}; lang=en", ID)).unwrap(),
        );

        assert_eq!(session_id(&headers).as_deref(), Some(ID));
    }

    #[test]
    fn test_rejects_malformed_ids() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("checkout_session=../../etc"));
        assert_eq!(session_id(&headers), None);

        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_flags() {
        let session = BrowserSession {
            id: ID.to_string(),
            secure: true,
        };
        assert_eq!(
            session.cookie(),
            format!("checkout_session={}; Path=/; HttpOnly; SameSite=Lax; Secure", ID)
        );
    }
}
