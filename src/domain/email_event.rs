use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Append-only delivery event. `campaign_id` is NULL for events with no real
/// campaign context (the synthetic "unsubscribe" pseudo-campaign).
#[derive(Debug, serde::Serialize)]
pub struct EmailEvent {
    pub id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub subscriber_email: String,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EventType {
    Opened,
    Clicked,
    Bounced,
    Unsubscribed,
}

impl EventType {
    pub fn parse(event_type: String) -> Result<EventType, String> {
        match event_type.as_str() {
            "opened" => Ok(EventType::Opened),
            "clicked" => Ok(EventType::Clicked),
            "bounced" => Ok(EventType::Bounced),
            "unsubscribed" => Ok(EventType::Unsubscribed),
            _ => Err(format!("{} is not a valid email event type", event_type)),
        }
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        match self {
            EventType::Opened => "opened",
            EventType::Clicked => "clicked",
            EventType::Bounced => "bounced",
            EventType::Unsubscribed => "unsubscribed",
        }
    }
}
