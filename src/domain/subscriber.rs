use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::preferences::Preferences;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscription_source::SubscriptionSource;

#[derive(Debug, serde::Serialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub name: Option<SubscriberName>,
    pub active: bool,
    pub source: SubscriptionSource,
    pub subscribed_at: DateTime<Utc>,
    pub preferences: Preferences,
}
