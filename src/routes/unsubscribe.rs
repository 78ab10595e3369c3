use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Deserialize;
use sqlx::PgPool;

use crate::campaigns::record_email_event;
use crate::domain::email_event::EventType;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::routes::ApiMessage;
use crate::startup::TokenKeys;

#[derive(Deserialize, Debug)]
pub struct UnsubscribeBody {
    pub email: String,
    pub token: Option<String>,
}

#[derive(thiserror::Error)]
pub enum UnsubscribeError {
    #[error("{0}")]
    ValidationError(String),
    #[error("The unsubscribe token is not valid.")]
    InvalidToken,
    #[error("No subscription exists for this email address.")]
    UnknownEmail,
    #[error("Could not process the unsubscribe request.")]
    DatabaseError(#[source] sqlx::Error),
}

impl std::fmt::Debug for UnsubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

impl ResponseError for UnsubscribeError {
    fn status_code(&self) -> StatusCode {
        match self {
            UnsubscribeError::ValidationError(_) | UnsubscribeError::InvalidToken => {
                StatusCode::BAD_REQUEST
            }
            UnsubscribeError::UnknownEmail => StatusCode::NOT_FOUND,
            UnsubscribeError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiMessage::fail(self.to_string()))
    }
}

/// POST /api/unsubscribe — flips the subscriber inactive. The token is
/// optional (a support agent can unsubscribe someone by address alone), but
/// when one is supplied it must verify against the unsubscribe secret.
#[tracing::instrument(
    name = "Unsubscribing a subscriber",
    skip(body, db_pool, token_keys),
    fields(subscriber_email = %body.email, token_supplied = body.token.is_some())
)]
pub async fn handle_unsubscribe(
    body: web::Json<UnsubscribeBody>,
    db_pool: web::Data<PgPool>,
    token_keys: web::Data<TokenKeys>,
) -> Result<HttpResponse, UnsubscribeError> {
    let email = SubscriberEmail::parse(body.email.clone())
        .map_err(UnsubscribeError::ValidationError)?;

    if let Some(token) = &body.token {
        token_keys
            .unsubscribe
            .verify(&email, token)
            .map_err(|_| UnsubscribeError::InvalidToken)?;
    }

    deactivate_subscriber(&email, &db_pool).await?;

    // The event log is best-effort bookkeeping; a failed insert must not
    // undo an unsubscribe the subscriber asked for.
    if let Err(err) = record_email_event(&db_pool, None, &email, EventType::Unsubscribed).await {
        tracing::warn!("Failed to record unsubscribe event: {:?}", err);
    }

    Ok(HttpResponse::Ok().json(ApiMessage::ok(
        "You have been unsubscribed. Sorry to see you go!",
    )))
}

#[tracing::instrument(name = "Marking a subscriber inactive", skip(db_pool))]
async fn deactivate_subscriber(
    email: &SubscriberEmail,
    db_pool: &PgPool,
) -> Result<(), UnsubscribeError> {
    let result = sqlx::query(
        r#"
        UPDATE subscribers
        SET active = false
        WHERE email = $1
        "#,
    )
    .bind(email.as_ref())
    .execute(db_pool)
    .await
    .map_err(|err| {
        tracing::error!("Failed to execute query: {:?}", err);
        UnsubscribeError::DatabaseError(err)
    })?;

    if result.rows_affected() == 0 {
        return Err(UnsubscribeError::UnknownEmail);
    }

    Ok(())
}
