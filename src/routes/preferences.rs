use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Deserialize;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::domain::preferences::{Frequency, Preferences};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::routes::ApiMessage;
use crate::startup::TokenKeys;

#[derive(Deserialize, Debug)]
pub struct PreferencesQuery {
    pub email: String,
    pub token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UpdatePreferencesBody {
    pub email: String,
    pub token: Option<String>,
    pub frequency: Option<String>,
    pub categories: Option<BTreeMap<String, bool>>,
}

#[derive(thiserror::Error)]
pub enum PreferencesError {
    #[error("{0}")]
    ValidationError(String),
    #[error("The preferences token is not valid.")]
    InvalidToken,
    #[error("No subscription exists for this email address.")]
    UnknownEmail,
    #[error("Could not process the preferences request.")]
    DatabaseError(#[source] sqlx::Error),
}

impl std::fmt::Debug for PreferencesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

impl ResponseError for PreferencesError {
    fn status_code(&self) -> StatusCode {
        match self {
            PreferencesError::ValidationError(_) | PreferencesError::InvalidToken => {
                StatusCode::BAD_REQUEST
            }
            PreferencesError::UnknownEmail => StatusCode::NOT_FOUND,
            PreferencesError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiMessage::fail(self.to_string()))
    }
}

#[derive(serde::Serialize)]
struct PreferencesResponse {
    email: String,
    frequency: String,
    categories: BTreeMap<String, bool>,
}

/// GET /api/preferences — reads a subscriber's notification preferences.
/// Token policy mirrors unsubscribe: optional, but must verify if present.
#[tracing::instrument(
    name = "Reading subscriber preferences",
    skip(query, db_pool, token_keys),
    fields(subscriber_email = %query.email)
)]
pub async fn get_preferences(
    query: web::Query<PreferencesQuery>,
    db_pool: web::Data<PgPool>,
    token_keys: web::Data<TokenKeys>,
) -> Result<HttpResponse, PreferencesError> {
    let email = verify_request(&query.email, query.token.as_deref(), &token_keys)?;
    let preferences = fetch_preferences(&email, &db_pool).await?;

    Ok(HttpResponse::Ok().json(PreferencesResponse {
        email: String::from(email.as_ref()),
        frequency: String::from(preferences.frequency.as_ref()),
        categories: preferences.categories,
    }))
}

/// PUT /api/preferences — updates frequency and/or category toggles.
#[tracing::instrument(
    name = "Updating subscriber preferences",
    skip(body, db_pool, token_keys),
    fields(subscriber_email = %body.email)
)]
pub async fn update_preferences(
    body: web::Json<UpdatePreferencesBody>,
    db_pool: web::Data<PgPool>,
    token_keys: web::Data<TokenKeys>,
) -> Result<HttpResponse, PreferencesError> {
    let email = verify_request(&body.email, body.token.as_deref(), &token_keys)?;

    let frequency = match &body.frequency {
        Some(frequency) => Some(
            Frequency::parse(frequency.clone()).map_err(PreferencesError::ValidationError)?,
        ),
        None => None,
    };

    store_preferences(&email, frequency, body.categories.as_ref(), &db_pool).await?;

    Ok(HttpResponse::Ok().json(ApiMessage::ok("Your preferences have been updated.")))
}

fn verify_request(
    email: &str,
    token: Option<&str>,
    token_keys: &TokenKeys,
) -> Result<SubscriberEmail, PreferencesError> {
    let email = SubscriberEmail::parse(email.to_string())
        .map_err(PreferencesError::ValidationError)?;

    if let Some(token) = token {
        token_keys
            .preferences
            .verify(&email, token)
            .map_err(|_| PreferencesError::InvalidToken)?;
    }

    Ok(email)
}

#[tracing::instrument(name = "Fetching preferences from the database", skip(db_pool))]
async fn fetch_preferences(
    email: &SubscriberEmail,
    db_pool: &PgPool,
) -> Result<Preferences, PreferencesError> {
    sqlx::query(
        r#"
        SELECT frequency, categories
        FROM subscribers
        WHERE email = $1
        "#,
    )
    .bind(email.as_ref())
    .map(|row: PgRow| {
        let categories: serde_json::Value = row.get("categories");

        Preferences {
            frequency: Frequency::parse(row.get("frequency")).unwrap(),
            categories: serde_json::from_value(categories).unwrap_or_default(),
        }
    })
    .fetch_optional(db_pool)
    .await
    .map_err(|err| {
        tracing::error!("Failed to execute query: {:?}", err);
        PreferencesError::DatabaseError(err)
    })?
    .ok_or(PreferencesError::UnknownEmail)
}

#[tracing::instrument(name = "Storing preferences in the database", skip(db_pool, categories))]
async fn store_preferences(
    email: &SubscriberEmail,
    frequency: Option<Frequency>,
    categories: Option<&BTreeMap<String, bool>>,
    db_pool: &PgPool,
) -> Result<(), PreferencesError> {
    let categories_json = match categories {
        Some(categories) => {
            Some(serde_json::to_value(categories).expect("BTreeMap serialization cannot fail"))
        }
        None => None,
    };

    let result = sqlx::query(
        r#"
        UPDATE subscribers
        SET frequency = COALESCE($2, frequency),
            categories = COALESCE($3, categories)
        WHERE email = $1
        "#,
    )
    .bind(email.as_ref())
    .bind(frequency.map(|frequency| String::from(frequency.as_ref())))
    .bind(categories_json)
    .execute(db_pool)
    .await
    .map_err(|err| {
        tracing::error!("Failed to execute query: {:?}", err);
        PreferencesError::DatabaseError(err)
    })?;

    if result.rows_affected() == 0 {
        return Err(PreferencesError::UnknownEmail);
    }

    Ok(())
}
