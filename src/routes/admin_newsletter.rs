use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::Deserialize;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::auth::admin::{AdminAuthError, AdminGuard};
use crate::campaigns::record_campaign;
use crate::domain::campaign::{CampaignStatus, CampaignType};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email::dispatch::send_bulk;
use crate::email::service::{EmailService, Purpose};
use crate::routes::ApiMessage;

#[derive(Deserialize, Debug)]
pub struct AdminNewsletterBody {
    pub subject: String,
    pub content: String,
    #[serde(rename = "type")]
    pub campaign_type: Option<String>,
    pub individual_email: Option<String>,
}

#[derive(serde::Serialize)]
pub struct SendSummary {
    pub success: bool,
    pub message: String,
    pub recipients: usize,
    pub batches: usize,
    pub failed_batches: Vec<usize>,
}

#[derive(thiserror::Error)]
pub enum AdminNewsletterError {
    #[error(transparent)]
    AuthError(#[from] AdminAuthError),
    #[error("{0}")]
    ValidationError(String),
    #[error("Failed to get subscribers from the database.")]
    GetSubscribersError(#[source] sqlx::Error),
    #[error("Failed to record the campaign.")]
    RecordCampaignError(#[source] sqlx::Error),
}

impl std::fmt::Debug for AdminNewsletterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

impl ResponseError for AdminNewsletterError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdminNewsletterError::AuthError(err) => err.status_code(),
            AdminNewsletterError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AdminNewsletterError::GetSubscribersError(_)
            | AdminNewsletterError::RecordCampaignError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiMessage::fail(self.to_string()))
    }
}

/// POST /api/admin/newsletter — sends a campaign to one address or to every
/// active subscriber, then records exactly one campaign row. The row is
/// written only after the transport calls resolve, so the recipient count is
/// the audience actually attempted and the status reflects the real outcome.
#[tracing::instrument(
    name = "Sending an admin newsletter",
    skip(request, body, db_pool, email_service, admin_guard),
    fields(subject = %body.subject)
)]
pub async fn send_admin_newsletter(
    request: HttpRequest,
    body: web::Json<AdminNewsletterBody>,
    db_pool: web::Data<PgPool>,
    email_service: web::Data<EmailService>,
    admin_guard: web::Data<AdminGuard>,
) -> Result<HttpResponse, AdminNewsletterError> {
    admin_guard.validate(&request).await?;

    // Validation happens before any transport call is attempted.
    if body.subject.trim().is_empty() {
        return Err(AdminNewsletterError::ValidationError(
            "Subject cannot be empty.".to_string(),
        ));
    }
    if body.content.trim().is_empty() {
        return Err(AdminNewsletterError::ValidationError(
            "Content cannot be empty.".to_string(),
        ));
    }

    let campaign_type = match &body.campaign_type {
        Some(campaign_type) => CampaignType::parse(campaign_type.clone())
            .map_err(AdminNewsletterError::ValidationError)?,
        None => CampaignType::Newsletter,
    };

    let summary = match &body.individual_email {
        Some(individual_email) => {
            let recipient = SubscriberEmail::parse(individual_email.clone())
                .map_err(AdminNewsletterError::ValidationError)?;

            send_individual(
                &email_service,
                &db_pool,
                recipient,
                &body.subject,
                &body.content,
                campaign_type,
            )
            .await?
        }
        None => {
            send_to_all_active(
                &email_service,
                &db_pool,
                &body.subject,
                &body.content,
                campaign_type,
            )
            .await?
        }
    };

    Ok(HttpResponse::Ok().json(summary))
}

async fn send_individual(
    email_service: &EmailService,
    db_pool: &PgPool,
    recipient: SubscriberEmail,
    subject: &str,
    content: &str,
    campaign_type: CampaignType,
) -> Result<SendSummary, AdminNewsletterError> {
    let outcome = email_service
        .send(purpose_for(campaign_type), &[recipient], subject, content)
        .await;

    let status = match &outcome {
        Ok(_) => CampaignStatus::Sent,
        Err(err) => {
            tracing::error!("Individual send failed: {:?}", err);
            CampaignStatus::Failed
        }
    };

    record_campaign(db_pool, subject, content, campaign_type, 1, status)
        .await
        .map_err(AdminNewsletterError::RecordCampaignError)?;

    Ok(SendSummary {
        success: status == CampaignStatus::Sent,
        message: match status {
            CampaignStatus::Sent => "Email sent.".to_string(),
            _ => "The mail channel rejected the send.".to_string(),
        },
        recipients: 1,
        batches: 1,
        failed_batches: if status == CampaignStatus::Sent {
            vec![]
        } else {
            vec![0]
        },
    })
}

async fn send_to_all_active(
    email_service: &EmailService,
    db_pool: &PgPool,
    subject: &str,
    content: &str,
    campaign_type: CampaignType,
) -> Result<SendSummary, AdminNewsletterError> {
    let recipients = get_active_subscriber_emails(db_pool).await?;

    if recipients.is_empty() {
        record_campaign(db_pool, subject, content, campaign_type, 0, CampaignStatus::Sent)
            .await
            .map_err(AdminNewsletterError::RecordCampaignError)?;

        return Ok(SendSummary {
            success: true,
            message: "No active subscribers to send to.".to_string(),
            recipients: 0,
            batches: 0,
            failed_batches: vec![],
        });
    }

    // Render once per campaign, not once per batch.
    let html = email_service.render_branded(subject, content);
    let report = send_bulk(email_service, &recipients, subject, &html).await;

    let status = if report.all_sent() {
        CampaignStatus::Sent
    } else {
        CampaignStatus::Failed
    };

    record_campaign(
        db_pool,
        subject,
        content,
        campaign_type,
        report.total_recipients as i32,
        status,
    )
    .await
    .map_err(AdminNewsletterError::RecordCampaignError)?;

    Ok(SendSummary {
        success: report.all_sent(),
        message: if report.all_sent() {
            format!(
                "Newsletter sent to {} subscribers in {} batches.",
                report.total_recipients, report.batches
            )
        } else {
            format!(
                "{} of {} batches failed; see failed_batches.",
                report.failed_batches.len(),
                report.batches
            )
        },
        recipients: report.total_recipients,
        batches: report.batches,
        failed_batches: report.failed_batches,
    })
}

/// Bulk newsletters always travel over the API channel; a campaign stamped
/// "support" renders with the support shell and goes over SMTP instead.
fn purpose_for(campaign_type: CampaignType) -> Purpose {
    match campaign_type {
        CampaignType::Welcome => Purpose::Welcome,
        CampaignType::Promotional => Purpose::Promotional,
        CampaignType::Support => Purpose::SupportReply,
        CampaignType::Newsletter | CampaignType::Custom => Purpose::Newsletter,
    }
}

async fn get_active_subscriber_emails(
    db_pool: &PgPool,
) -> Result<Vec<SubscriberEmail>, AdminNewsletterError> {
    sqlx::query(
        r#"
        SELECT email
        FROM subscribers
        WHERE active = true
        ORDER BY subscribed_at
        "#,
    )
    .map(|row: PgRow| SubscriberEmail::parse(row.get("email")).unwrap())
    .fetch_all(db_pool)
    .await
    .map_err(AdminNewsletterError::GetSubscribersError)
}
