use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, Secret};

use crate::domain::subscriber_email::SubscriberEmail;
use crate::email::{split_primary_bcc, Channel, ChannelError, Delivery};

/// Whether the relay connection is upgraded with STARTTLS. Local relays and
/// test doubles speak plain SMTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTlsMode {
    Starttls,
    None,
}

/// SMTP relay channel. Carries admin alerts and support replies, where
/// landing in a real mailbox thread matters more than bulk deliverability.
pub struct SmtpMailClient {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: SubscriberEmail,
}

impl SmtpMailClient {
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: Secret<String>,
        sender: SubscriberEmail,
        tls_mode: SmtpTlsMode,
    ) -> Result<SmtpMailClient, ChannelError> {
        let credentials = Credentials::new(username, password.expose_secret().clone());
        let builder = match tls_mode {
            SmtpTlsMode::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpTlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let mailer = builder.port(port).credentials(credentials).build();

        Ok(SmtpMailClient { mailer, sender })
    }

    /// Same contract as the API channel: first address is the primary "to",
    /// the rest are attached as BCC headers.
    pub async fn send(
        &self,
        recipients: &[SubscriberEmail],
        subject: &str,
        html_content: &str,
    ) -> Result<Delivery, ChannelError> {
        let (primary, bcc) = split_primary_bcc(recipients)?;

        let mut builder = Message::builder()
            .from(parse_mailbox(&self.sender)?)
            .to(parse_mailbox(primary)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML);

        for recipient in bcc {
            builder = builder.bcc(parse_mailbox(recipient)?);
        }

        let message = builder.body(String::from(html_content))?;

        self.mailer.send(message).await?;

        Ok(Delivery {
            channel: Channel::Smtp,
            recipients: recipients.len(),
        })
    }
}

fn parse_mailbox(email: &SubscriberEmail) -> Result<Mailbox, ChannelError> {
    email
        .as_ref()
        .parse()
        .map_err(|_| ChannelError::Address(String::from(email.as_ref())))
}
