use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::domain::campaign::{Campaign, CampaignStatus, CampaignType};
use crate::domain::email_event::EventType;
use crate::domain::subscriber_email::SubscriberEmail;

/// Inserts the single audit row for a resolved send attempt. Callers must
/// only invoke this after the transport call returns, so `sent_to` reflects
/// the audience actually attempted.
#[tracing::instrument(
    name = "Recording a campaign",
    skip(db_pool, body),
    fields(subject = %subject, sent_to = sent_to, status = status.as_ref())
)]
pub async fn record_campaign(
    db_pool: &PgPool,
    subject: &str,
    body: &str,
    campaign_type: CampaignType,
    sent_to: i32,
    status: CampaignStatus,
) -> Result<Campaign, sqlx::Error> {
    let sent_at = match status {
        CampaignStatus::Sent | CampaignStatus::Failed => Some(Utc::now()),
        CampaignStatus::Pending => None,
    };

    sqlx::query(
        r#"
        INSERT INTO campaigns (id, subject, body, campaign_type, sent_to, status, created_at, sent_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, subject, body, campaign_type, sent_to, status, opened, clicked, created_at, sent_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subject)
    .bind(body)
    .bind(campaign_type.as_ref())
    .bind(sent_to)
    .bind(status.as_ref())
    .bind(Utc::now())
    .bind(sent_at)
    .map(map_campaign_row)
    .fetch_one(db_pool)
    .await
    .map_err(|err| {
        tracing::error!("Failed to insert campaign row: {:?}", err);
        err
    })
}

pub async fn get_campaigns(db_pool: &PgPool) -> Result<Vec<Campaign>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, subject, body, campaign_type, sent_to, status, opened, clicked, created_at, sent_at
        FROM campaigns
        ORDER BY created_at DESC
        "#,
    )
    .map(map_campaign_row)
    .fetch_all(db_pool)
    .await
}

fn map_campaign_row(row: PgRow) -> Campaign {
    Campaign {
        id: row.get("id"),
        subject: row.get("subject"),
        body: row.get("body"),
        campaign_type: CampaignType::parse(row.get("campaign_type")).unwrap(),
        sent_to: row.get("sent_to"),
        status: CampaignStatus::parse(row.get("status")).unwrap(),
        opened: row.get("opened"),
        clicked: row.get("clicked"),
        created_at: row.get("created_at"),
        sent_at: row.get("sent_at"),
    }
}

/// Best-effort append to the event log. `campaign_id` is None for the
/// synthetic unsubscribe pseudo-campaign.
#[tracing::instrument(
    name = "Recording an email event",
    skip(db_pool),
    fields(subscriber_email = %subscriber_email, event_type = event_type.as_ref())
)]
pub async fn record_email_event(
    db_pool: &PgPool,
    campaign_id: Option<Uuid>,
    subscriber_email: &SubscriberEmail,
    event_type: EventType,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO email_events (id, campaign_id, subscriber_email, event_type, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(campaign_id)
    .bind(subscriber_email.as_ref())
    .bind(event_type.as_ref())
    .bind(Utc::now())
    .execute(db_pool)
    .await?;

    Ok(())
}

/// Per-event-type tallies for one campaign, counted at query time.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventCounts {
    pub opened: i64,
    pub clicked: i64,
    pub bounced: i64,
}

#[derive(Debug, serde::Serialize)]
pub struct CampaignStats {
    pub opened: i64,
    pub clicked: i64,
    pub bounced: i64,
    pub open_rate: f64,
    pub click_rate: f64,
}

/// Derived, read-only stats. Rates are percentages of the recorded audience
/// size; a campaign that reached nobody has zero rates rather than NaN.
pub fn compute_campaign_stats(sent_to: i32, events: EventCounts) -> CampaignStats {
    let rate = |count: i64| {
        if sent_to == 0 {
            0.0
        } else {
            count as f64 / sent_to as f64 * 100.0
        }
    };

    CampaignStats {
        opened: events.opened,
        clicked: events.clicked,
        bounced: events.bounced,
        open_rate: rate(events.opened),
        click_rate: rate(events.clicked),
    }
}

pub async fn get_event_counts(
    db_pool: &PgPool,
    campaign_id: Uuid,
) -> Result<EventCounts, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT event_type, COUNT(*) as count
        FROM email_events
        WHERE campaign_id = $1
        GROUP BY event_type
        "#,
    )
    .bind(campaign_id)
    .fetch_all(db_pool)
    .await?;

    let mut counts = EventCounts::default();
    for row in rows {
        let event_type: String = row.get("event_type");
        let count: i64 = row.get("count");
        match event_type.as_str() {
            "opened" => counts.opened = count,
            "clicked" => counts.clicked = count,
            "bounced" => counts.bounced = count,
            _ => {}
        }
    }

    Ok(counts)
}

#[derive(Debug, serde::Serialize)]
pub struct SubscriberGrowth {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub growth_percent: f64,
    pub top_sources: Vec<SourceCount>,
}

#[derive(Debug, serde::Serialize)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}

/// Growth compares new-subscriber counts between the current window and the
/// immediately preceding window of equal length. An empty previous window
/// reports 100 when the current window has sign-ups and 0 when it does not,
/// instead of an undefined ratio.
pub fn compute_growth_percent(current_window: i64, previous_window: i64) -> f64 {
    if previous_window == 0 {
        if current_window > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current_window - previous_window) as f64 / previous_window as f64 * 100.0
    }
}

#[tracing::instrument(name = "Computing subscriber growth", skip(db_pool))]
pub async fn compute_subscriber_growth(
    db_pool: &PgPool,
    period: Duration,
) -> Result<SubscriberGrowth, sqlx::Error> {
    let now = Utc::now();
    let window_start = now - period;
    let previous_window_start = window_start - period;

    let totals = sqlx::query(
        r#"
        SELECT
          COUNT(*) as total,
          COUNT(*) FILTER (WHERE active) as active
        FROM subscribers
        "#,
    )
    .fetch_one(db_pool)
    .await?;
    let total: i64 = totals.get("total");
    let active: i64 = totals.get("active");

    let current_window = count_signups_between(db_pool, window_start, now).await?;
    let previous_window =
        count_signups_between(db_pool, previous_window_start, window_start).await?;

    let top_sources = sqlx::query(
        r#"
        SELECT source, COUNT(*) as count
        FROM subscribers
        GROUP BY source
        ORDER BY count DESC
        LIMIT 5
        "#,
    )
    .map(|row: PgRow| SourceCount {
        source: row.get("source"),
        count: row.get("count"),
    })
    .fetch_all(db_pool)
    .await?;

    Ok(SubscriberGrowth {
        total,
        active,
        inactive: total - active,
        growth_percent: compute_growth_percent(current_window, previous_window),
        top_sources,
    })
}

async fn count_signups_between(
    db_pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) as count
        FROM subscribers
        WHERE subscribed_at >= $1 AND subscribed_at < $2
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(db_pool)
    .await?;

    Ok(row.get("count"))
}
