use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use chrono::Duration;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::admin::{AdminAuthError, AdminGuard};
use crate::campaigns::{
    compute_campaign_stats, compute_subscriber_growth, get_campaigns, get_event_counts,
    CampaignStats,
};
use crate::routes::ApiMessage;

#[derive(thiserror::Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    AuthError(#[from] AdminAuthError),
    #[error("Failed to load analytics data.")]
    DatabaseError(#[source] sqlx::Error),
}

impl std::fmt::Debug for AnalyticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

impl ResponseError for AnalyticsError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalyticsError::AuthError(err) => err.status_code(),
            AnalyticsError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiMessage::fail(self.to_string()))
    }
}

#[derive(serde::Serialize)]
struct CampaignReport {
    id: Uuid,
    subject: String,
    campaign_type: String,
    status: String,
    sent_to: i32,
    stats: CampaignStats,
}

/// GET /api/admin/analytics/campaigns — per-campaign delivery stats,
/// aggregated from the event log at query time.
#[tracing::instrument(name = "Loading campaign analytics", skip(request, db_pool, admin_guard))]
pub async fn get_campaign_analytics(
    request: HttpRequest,
    db_pool: web::Data<PgPool>,
    admin_guard: web::Data<AdminGuard>,
) -> Result<HttpResponse, AnalyticsError> {
    admin_guard.validate(&request).await?;

    let campaigns = get_campaigns(&db_pool)
        .await
        .map_err(AnalyticsError::DatabaseError)?;

    let mut reports = Vec::with_capacity(campaigns.len());
    for campaign in campaigns {
        let events = get_event_counts(&db_pool, campaign.id)
            .await
            .map_err(AnalyticsError::DatabaseError)?;

        reports.push(CampaignReport {
            id: campaign.id,
            subject: campaign.subject,
            campaign_type: String::from(campaign.campaign_type.as_ref()),
            status: String::from(campaign.status.as_ref()),
            sent_to: campaign.sent_to,
            stats: compute_campaign_stats(campaign.sent_to, events),
        });
    }

    Ok(HttpResponse::Ok().json(reports))
}

#[derive(Deserialize, Debug)]
pub struct GrowthQuery {
    pub days: Option<i64>,
}

/// GET /api/admin/analytics/growth?days=N — subscriber growth over the last
/// N days (default 30) against the preceding window of equal length.
#[tracing::instrument(name = "Loading growth analytics", skip(request, db_pool, admin_guard))]
pub async fn get_growth_analytics(
    request: HttpRequest,
    query: web::Query<GrowthQuery>,
    db_pool: web::Data<PgPool>,
    admin_guard: web::Data<AdminGuard>,
) -> Result<HttpResponse, AnalyticsError> {
    admin_guard.validate(&request).await?;

    let days = query.days.unwrap_or(30).max(1);
    let growth = compute_subscriber_growth(&db_pool, Duration::days(days))
        .await
        .map_err(AnalyticsError::DatabaseError)?;

    Ok(HttpResponse::Ok().json(growth))
}
