mod admin_analytics;
mod admin_newsletter;
mod health_check;
mod newsletter;
mod preferences;
mod unsubscribe;

pub use admin_analytics::{get_campaign_analytics, get_growth_analytics};
pub use admin_newsletter::send_admin_newsletter;
pub use health_check::health_check;
pub use newsletter::handle_subscribe;
pub use preferences::{get_preferences, update_preferences};
pub use unsubscribe::handle_unsubscribe;

/// Uniform response envelope for the public endpoints. The message is the
/// only detail the UI shows verbatim, so it must never carry internals.
#[derive(Debug, serde::Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> ApiMessage {
        ApiMessage {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> ApiMessage {
        ApiMessage {
            success: false,
            message: message.into(),
        }
    }
}
