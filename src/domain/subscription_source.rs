/// Where a subscriber signed up from. Stored as a plain tag on the
/// subscribers table and surfaced by the growth analytics as "top sources".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SubscriptionSource {
    Website,
    Popup,
    Landing,
    Admin,
}

impl SubscriptionSource {
    pub fn parse(source: String) -> Result<SubscriptionSource, String> {
        match source.as_str() {
            "website" => Ok(SubscriptionSource::Website),
            "popup" => Ok(SubscriptionSource::Popup),
            "landing" => Ok(SubscriptionSource::Landing),
            "admin" => Ok(SubscriptionSource::Admin),
            _ => Err(format!("{} is not a valid subscription source", source)),
        }
    }
}

impl Default for SubscriptionSource {
    fn default() -> Self {
        SubscriptionSource::Website
    }
}

impl AsRef<str> for SubscriptionSource {
    fn as_ref(&self) -> &str {
        match self {
            SubscriptionSource::Website => "website",
            SubscriptionSource::Popup => "popup",
            SubscriptionSource::Landing => "landing",
            SubscriptionSource::Admin => "admin",
        }
    }
}
