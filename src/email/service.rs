use crate::domain::subscriber_email::SubscriberEmail;
use crate::email::api_client::ApiMailClient;
use crate::email::smtp_client::SmtpMailClient;
use crate::email::{Channel, ChannelError, Delivery};

const BRAND_COLOR: &str = "#1a73e8";
const BRAND_NAME: &str = "PropCompare";

/// Why a message is being sent. The purpose alone decides which channel
/// carries it and which branded shell wraps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Welcome,
    Newsletter,
    Promotional,
    AdminAlert,
    SupportReply,
}

impl Purpose {
    /// Pure routing: reader-facing mail goes through the transactional API
    /// for deliverability; admin alerts and support replies go through SMTP
    /// so replies land in a real mailbox thread.
    pub fn channel(&self) -> Channel {
        match self {
            Purpose::Welcome | Purpose::Newsletter | Purpose::Promotional => Channel::Api,
            Purpose::AdminAlert | Purpose::SupportReply => Channel::Smtp,
        }
    }
}

/// Transport Selector: renders the final HTML document and hands it to the
/// channel the purpose maps to. No retry and no cross-channel fallback; if
/// the chosen channel fails, the send fails and the caller decides what to
/// record.
pub struct EmailService {
    api: ApiMailClient,
    smtp: SmtpMailClient,
    public_base_url: String,
}

impl EmailService {
    pub fn new(api: ApiMailClient, smtp: SmtpMailClient, public_base_url: String) -> EmailService {
        EmailService {
            api,
            smtp,
            public_base_url,
        }
    }

    pub async fn send(
        &self,
        purpose: Purpose,
        recipients: &[SubscriberEmail],
        subject: &str,
        body_html: &str,
    ) -> Result<Delivery, ChannelError> {
        let html = match purpose {
            Purpose::SupportReply => self.render_support(body_html),
            _ => self.render_branded(subject, body_html),
        };

        match purpose.channel() {
            Channel::Api => self.api.send(recipients, subject, &html).await,
            Channel::Smtp => self.smtp.send(recipients, subject, &html).await,
        }
    }

    /// Raw channel access for callers that batch themselves (bulk dispatch).
    /// The body must already have been rendered.
    pub async fn send_rendered_via_api(
        &self,
        recipients: &[SubscriberEmail],
        subject: &str,
        html: &str,
    ) -> Result<Delivery, ChannelError> {
        self.api.send(recipients, subject, html).await
    }

    /// Wraps caller body HTML in the shared branded shell. Pure string
    /// assembly; the body is embedded untouched.
    pub fn render_branded(&self, subject: &str, body_html: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<body style="margin:0;padding:0;background:#f4f4f4;font-family:Arial,sans-serif;">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0">
    <tr><td align="center">
      <table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;">
        <tr><td style="background:{brand_color};padding:24px;color:#ffffff;font-size:22px;font-weight:bold;">
          {brand_name}
        </td></tr>
        <tr><td style="padding:24px;color:#333333;font-size:15px;">
          <h1 style="font-size:18px;margin-top:0;">{subject}</h1>
          {body}
        </td></tr>
        <tr><td style="padding:16px 24px;background:#fafafa;color:#999999;font-size:12px;">
          You are receiving this because you subscribed to {brand_name}.<br/>
          <a href="{base_url}/unsubscribe" style="color:{brand_color};">Unsubscribe</a> &middot;
          <a href="{base_url}/preferences" style="color:{brand_color};">Manage preferences</a>
        </td></tr>
      </table>
    </td></tr>
  </table>
</body>
</html>"#,
            brand_color = BRAND_COLOR,
            brand_name = BRAND_NAME,
            subject = subject,
            body = body_html,
            base_url = self.public_base_url,
        )
    }

    /// Variant used for direct support replies: a "Support Team" header and
    /// no subscription footer, since the recipient may not be a subscriber.
    pub fn render_support(&self, body_html: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<body style="margin:0;padding:0;background:#f4f4f4;font-family:Arial,sans-serif;">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0">
    <tr><td align="center">
      <table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;">
        <tr><td style="background:{brand_color};padding:24px;color:#ffffff;font-size:22px;font-weight:bold;">
          {brand_name} Support Team
        </td></tr>
        <tr><td style="padding:24px;color:#333333;font-size:15px;">
          {body}
        </td></tr>
      </table>
    </td></tr>
  </table>
</body>
</html>"#,
            brand_color = BRAND_COLOR,
            brand_name = BRAND_NAME,
            body = body_html,
        )
    }
}
