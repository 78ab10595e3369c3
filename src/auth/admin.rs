use actix_web::http::StatusCode;
use actix_web::{HttpRequest, ResponseError};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

use crate::auth::lockout::{LockoutStore, LockoutStoreError};

type HmacSha256 = Hmac<Sha256>;

/// Guard for /api/admin routes: a shared bearer key checked against config,
/// with failed attempts tracked per client IP in the lockout store.
#[derive(Clone)]
pub struct AdminGuard {
    api_key: Secret<String>,
    lockout: LockoutStore,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("missing or malformed Authorization header")]
    MissingCredentials,
    #[error("invalid admin API key")]
    InvalidKey,
    #[error("too many failed attempts, try again later")]
    LockedOut,
    #[error(transparent)]
    Store(#[from] LockoutStoreError),
}

impl ResponseError for AdminAuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdminAuthError::MissingCredentials | AdminAuthError::InvalidKey => {
                StatusCode::UNAUTHORIZED
            }
            AdminAuthError::LockedOut => StatusCode::TOO_MANY_REQUESTS,
            AdminAuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl AdminGuard {
    pub fn new(api_key: Secret<String>, lockout: LockoutStore) -> AdminGuard {
        AdminGuard { api_key, lockout }
    }

    #[tracing::instrument(name = "Validating an admin request", skip(self, request))]
    pub async fn validate(&self, request: &HttpRequest) -> Result<(), AdminAuthError> {
        let identifier = request
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| String::from("unknown"));

        if self.lockout.is_locked_out(&identifier).await? {
            return Err(AdminAuthError::LockedOut);
        }

        let supplied = extract_bearer_key(request).ok_or_else(|| {
            tracing::warn!("Admin request without credentials from {}", identifier);
            AdminAuthError::MissingCredentials
        })?;

        if !keys_match(self.api_key.expose_secret(), supplied) {
            self.lockout.register_failure(&identifier).await?;
            tracing::warn!("Invalid admin API key from {}", identifier);
            return Err(AdminAuthError::InvalidKey);
        }

        self.lockout.clear(&identifier).await?;

        Ok(())
    }
}

fn extract_bearer_key(request: &HttpRequest) -> Option<&str> {
    request
        .headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Compares the supplied key against the configured one in constant time:
/// both sides are run through a keyed MAC and the tags are checked with
/// `verify_slice`, so a byte-wise `==` never touches the secret itself.
fn keys_match(expected: &str, supplied: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(expected.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(b"admin-api-key");
    let expected_tag = mac.finalize().into_bytes();

    let mut mac = match HmacSha256::new_from_slice(supplied.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(b"admin-api-key");
    mac.verify_slice(&expected_tag).is_ok()
}
