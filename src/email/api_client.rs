use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::email::{split_primary_bcc, Channel, ChannelError, Delivery};

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// Transactional HTTP API channel. Carries welcome emails and bulk
/// newsletters where deliverability matters more than reply threading.
pub struct ApiMailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
struct SendEmailBody {
    personalizations: Vec<Personalization>,
    from: MailAddress,
    subject: String,
    content: Vec<MailContent>,
}

#[derive(serde::Serialize)]
struct MailAddress {
    email: String,
}

#[derive(serde::Serialize)]
struct Personalization {
    to: Vec<MailAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bcc: Option<Vec<MailAddress>>,
}

#[derive(serde::Serialize)]
struct MailContent {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

impl ApiMailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> ApiMailClient {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()
            .expect("Failed to build the API mail HTTP client");

        ApiMailClient {
            http_client,
            base_url,
            sender,
            api_key,
        }
    }

    /// Sends one message to one or many recipients. The first address is the
    /// primary "to"; the rest go out as BCC so recipients never see each
    /// other's addresses.
    pub async fn send(
        &self,
        recipients: &[SubscriberEmail],
        subject: &str,
        html_content: &str,
    ) -> Result<Delivery, ChannelError> {
        let (primary, bcc) = split_primary_bcc(recipients)?;
        let url = format!("{}/mail/send", self.base_url);
        let bcc = if bcc.is_empty() {
            None
        } else {
            Some(
                bcc.iter()
                    .map(|email| MailAddress {
                        email: String::from(email.as_ref()),
                    })
                    .collect(),
            )
        };
        let body = SendEmailBody {
            from: MailAddress {
                email: String::from(self.sender.as_ref()),
            },
            personalizations: vec![Personalization {
                to: vec![MailAddress {
                    email: String::from(primary.as_ref()),
                }],
                bcc,
            }],
            subject: String::from(subject),
            content: vec![MailContent {
                content_type: String::from("text/html"),
                value: String::from(html_content),
            }],
        };

        self.http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?
            // Return an error when server response status code is 4xx or 5xx
            .error_for_status()?;

        Ok(Delivery {
            channel: Channel::Api,
            recipients: recipients.len(),
        })
    }
}
