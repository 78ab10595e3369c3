use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

use crate::domain::subscriber_email::SubscriberEmail;

type HmacSha256 = Hmac<Sha256>;

/// Placeholder values shipped in sample configs. A deployment still carrying
/// one of these would mint tokens anyone could forge, so key construction
/// refuses them and the application fails at startup instead.
const INSECURE_PLACEHOLDERS: [&str; 3] = ["changeme", "your-secret-here", "replace-me"];

#[derive(Debug, thiserror::Error)]
pub enum TokenConfigError {
    #[error("token secret is not set")]
    MissingSecret,
    #[error("token secret is an insecure placeholder value")]
    PlaceholderSecret,
}

#[derive(Debug, thiserror::Error)]
#[error("supplied token does not match the expected token for this email")]
pub struct InvalidToken;

/// A secret-keyed token factory for unsubscribe and preferences links.
///
/// Tokens are deterministic HMAC-SHA256 digests of the recipient address,
/// hex-encoded. Nothing is persisted: possession of a valid token is proof
/// of having received an email we sent to that address.
#[derive(Clone, Debug)]
pub struct TokenKey {
    secret: Secret<String>,
}

impl TokenKey {
    pub fn new(secret: Secret<String>) -> Result<TokenKey, TokenConfigError> {
        let exposed = secret.expose_secret();

        if exposed.trim().is_empty() {
            return Err(TokenConfigError::MissingSecret);
        }
        if INSECURE_PLACEHOLDERS.contains(&exposed.to_lowercase().as_str()) {
            return Err(TokenConfigError::PlaceholderSecret);
        }

        Ok(TokenKey { secret })
    }

    pub fn generate(&self, email: &SubscriberEmail) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(email.as_ref().as_bytes());

        hex::encode(mac.finalize().into_bytes())
    }

    pub fn verify(&self, email: &SubscriberEmail, supplied: &str) -> Result<(), InvalidToken> {
        let supplied_bytes = hex::decode(supplied).map_err(|_| InvalidToken)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(email.as_ref().as_bytes());

        // verify_slice performs a constant-time comparison.
        mac.verify_slice(&supplied_bytes).map_err(|_| InvalidToken)
    }
}
