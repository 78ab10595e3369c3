use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One audit row per completed send attempt, bulk or individual. Written
/// exactly once after the transport call resolves; the recipient count is
/// the audience actually attempted, never a pre-send estimate.
#[derive(Debug, serde::Serialize)]
pub struct Campaign {
    pub id: Uuid,
    pub subject: String,
    pub body: String,
    pub campaign_type: CampaignType,
    pub sent_to: i32,
    pub status: CampaignStatus,
    pub opened: i32,
    pub clicked: i32,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CampaignType {
    Welcome,
    Newsletter,
    Promotional,
    Custom,
    Support,
}

impl CampaignType {
    pub fn parse(campaign_type: String) -> Result<CampaignType, String> {
        match campaign_type.as_str() {
            "welcome" => Ok(CampaignType::Welcome),
            "newsletter" => Ok(CampaignType::Newsletter),
            "promotional" => Ok(CampaignType::Promotional),
            "custom" => Ok(CampaignType::Custom),
            "support" => Ok(CampaignType::Support),
            _ => Err(format!("{} is not a valid campaign type", campaign_type)),
        }
    }
}

impl AsRef<str> for CampaignType {
    fn as_ref(&self) -> &str {
        match self {
            CampaignType::Welcome => "welcome",
            CampaignType::Newsletter => "newsletter",
            CampaignType::Promotional => "promotional",
            CampaignType::Custom => "custom",
            CampaignType::Support => "support",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CampaignStatus {
    Sent,
    Pending,
    Failed,
}

impl CampaignStatus {
    pub fn parse(status: String) -> Result<CampaignStatus, String> {
        match status.as_str() {
            "sent" => Ok(CampaignStatus::Sent),
            "pending" => Ok(CampaignStatus::Pending),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("{} is not a valid campaign status", status)),
        }
    }
}

impl AsRef<str> for CampaignStatus {
    fn as_ref(&self) -> &str {
        match self {
            CampaignStatus::Sent => "sent",
            CampaignStatus::Pending => "pending",
            CampaignStatus::Failed => "failed",
        }
    }
}
