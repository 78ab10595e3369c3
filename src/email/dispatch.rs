use std::time;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::email::service::EmailService;

/// Provider-friendly chunk size for bulk sends.
pub const BATCH_SIZE: usize = 50;

/// Pause between consecutive batches to stay under provider rate limits.
const BATCH_DELAY: time::Duration = time::Duration::from_millis(500);

/// Aggregate outcome of one bulk send. Earlier successful batches are not
/// rolled back or retried when a later batch fails; the report says exactly
/// which batch indices failed so the operator can act on them.
#[derive(Debug)]
pub struct BulkReport {
    pub total_recipients: usize,
    pub batches: usize,
    pub failed_batches: Vec<usize>,
}

impl BulkReport {
    pub fn all_sent(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

/// Fans one rendered message out to a recipient list in fixed-size chunks
/// through the API channel.
///
/// Batches go out strictly sequentially: batch N+1 is not started until
/// batch N has resolved, so a provider rate limit tripped by one batch is
/// never compounded by a parallel one. Within a batch, the channel's
/// primary/BCC split keeps recipient addresses hidden from each other.
#[tracing::instrument(
    name = "Dispatching a bulk send in batches",
    skip(email_service, recipients, html),
    fields(recipient_count = recipients.len(), subject = %subject)
)]
pub async fn send_bulk(
    email_service: &EmailService,
    recipients: &[SubscriberEmail],
    subject: &str,
    html: &str,
) -> BulkReport {
    let mut failed_batches = Vec::new();
    let mut batches = 0;

    for (index, batch) in recipients.chunks(BATCH_SIZE).enumerate() {
        if index > 0 {
            tokio::time::sleep(BATCH_DELAY).await;
        }

        batches += 1;

        if let Err(err) = email_service
            .send_rendered_via_api(batch, subject, html)
            .await
        {
            tracing::error!("Batch {} of bulk send failed: {:?}", index, err);
            failed_batches.push(index);
        }
    }

    BulkReport {
        total_recipients: recipients.len(),
        batches,
        failed_batches,
    }
}
