use std::collections::BTreeMap;

/// How often a subscriber wants to hear from us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn parse(frequency: String) -> Result<Frequency, String> {
        match frequency.as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(format!("{} is not a valid frequency", frequency)),
        }
    }
}

impl AsRef<str> for Frequency {
    fn as_ref(&self) -> &str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

/// Notification preferences a subscriber manages through tokenized links.
/// Category toggles are an open-ended map (firm reviews, promotions, market
/// news, ...) so adding a category does not require a migration.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Preferences {
    pub frequency: Frequency,
    pub categories: BTreeMap<String, bool>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            frequency: Frequency::Weekly,
            categories: BTreeMap::new(),
        }
    }
}
