//! Admin gate in front of every `/reports` route.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;

use crate::api::{ApiError, AppState};

type HmacSha256 = Hmac<Sha256>;

pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";
pub const API_AUTHORIZATION_HEADER: &str = "x-api-authorization";

const TAG_KEY: &[u8] = b"report-service/internal-secret";

/// Admits either the trusted gateway hop or a caller carrying a bearer
/// token. Token verification itself happens at the gateway.
pub struct AdminGate {
    /// HMAC tag of the configured internal secret.
    secret_tag: Option<Vec<u8>>,
}

impl AdminGate {
    pub fn new(internal_secret: Option<&SecretString>) -> Self {
        let secret_tag = internal_secret
            .map(|s| s.expose_secret())
            .filter(|s| !s.is_empty())
            .map(tag);
        Self { secret_tag }
    }

    fn is_trusted_hop(&self, headers: &HeaderMap) -> bool {
        let (Some(expected), Some(presented)) = (
            self.secret_tag.as_deref(),
            header_str(headers, INTERNAL_SECRET_HEADER),
        ) else {
            return false;
        };
        let mut mac = mac();
        mac.update(presented.as_bytes());
        mac.verify_slice(expected).is_ok()
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if self.is_trusted_hop(headers) {
            return Ok(());
        }

        let token = header_str(headers, "authorization")
            .or_else(|| header_str(headers, API_AUTHORIZATION_HEADER));
        match token {
            Some(_) => Ok(()),
            None => {
                debug!("Rejected request without credentials");
                Err(ApiError::Unauthorized("Missing Authorization".to_string()))
            }
        }
    }
}

fn mac() -> HmacSha256 {
    // HMAC accepts keys of any length
    HmacSha256::new_from_slice(TAG_KEY).unwrap()
}

fn tag(secret: &str) -> Vec<u8> {
    let mut mac = mac();
    mac.update(secret.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Non-blank header value.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.gate.check(request.headers())?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn gate(secret: Option<&str>) -> AdminGate {
        let secret = secret.map(|s| SecretString::from(s.to_string()));
        AdminGate::new(secret.as_ref())
    }

    #[test]
    fn test_internal_secret_admits() {
        let gate = gate(Some("s3cret"));
        assert!(gate.check(&headers(&[("x-internal-secret", "s3cret")])).is_ok());
    }

    #[test]
    fn test_wrong_secret_falls_back_to_token() {
        let gate = gate(Some("s3cret"));
        assert!(gate.check(&headers(&[("x-internal-secret", "guess")])).is_err());
        assert!(gate
            .check(&headers(&[("x-internal-secret", "guess"), ("authorization", "Bearer t")]))
            .is_ok());
    }

    #[test]
    fn test_secret_header_ignored_when_unconfigured() {
        let gate = gate(None);
        assert!(gate.check(&headers(&[("x-internal-secret", "")])).is_err());
        assert!(gate.check(&headers(&[("x-internal-secret", "anything")])).is_err());
    }

    #[test]
    fn test_api_authorization_counts_as_token() {
        let gate = gate(None);
        assert!(gate.check(&headers(&[("x-api-authorization", "Bearer t")])).is_ok());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let gate = gate(None);
        let err = gate.check(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert!(gate.check(&headers(&[("authorization", "  ")])).is_err());
    }
}
