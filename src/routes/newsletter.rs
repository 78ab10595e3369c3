use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::domain::new_subscriber::{NewSubscriber, NewSubscriberBody};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email::service::{EmailService, Purpose};
use crate::routes::ApiMessage;
use crate::startup::{AdminRecipient, ApplicationBaseUrl, TokenKeys};

/// POST /api/newsletter — sign a reader up (or reactivate them), then send
/// the welcome email over the API channel and notify the admin over SMTP.
/// Both sends are best-effort: mail-channel trouble must not block sign-ups.
#[tracing::instrument(
    name = "Creating a newsletter subscription",
    skip(body, db_pool, email_service, base_url, token_keys, admin_recipient),
    fields(subscriber_email = %body.email)
)]
pub async fn handle_subscribe(
    body: web::Json<NewSubscriberBody>,
    db_pool: web::Data<PgPool>,
    email_service: web::Data<EmailService>,
    base_url: web::Data<ApplicationBaseUrl>,
    token_keys: web::Data<TokenKeys>,
    admin_recipient: web::Data<AdminRecipient>,
) -> impl Responder {
    let new_subscriber: NewSubscriber = match body.try_into() {
        Ok(subscriber) => subscriber,
        Err(err) => {
            tracing::warn!("Validation error: {:?}", err);
            return HttpResponse::BadRequest().json(ApiMessage::fail(err));
        }
    };

    let reactivated = match upsert_subscriber(&new_subscriber, &db_pool).await {
        Ok(reactivated) => reactivated,
        Err(err) => {
            tracing::error!("Failed to upsert subscriber: {:?}", err);
            return HttpResponse::InternalServerError()
                .json(ApiMessage::fail("Could not complete the subscription."));
        }
    };

    if let Err(err) = send_welcome_email(
        &email_service,
        &new_subscriber.email,
        &base_url.0,
        &token_keys,
    )
    .await
    {
        tracing::warn!(
            "Failed to send welcome email to {}: {:?}",
            new_subscriber.email,
            err
        );
    }

    if let Err(err) = send_admin_notification(
        &email_service,
        &admin_recipient.0,
        &new_subscriber,
        reactivated,
    )
    .await
    {
        tracing::warn!("Failed to send admin notification: {:?}", err);
    }

    let message = if reactivated {
        "Welcome back! Your subscription is active again."
    } else {
        "Thanks for subscribing! Check your inbox for a welcome email."
    };

    HttpResponse::Ok().json(ApiMessage::ok(message))
}

/// Inserts the subscriber, or reactivates the existing row when the address
/// is already known. Returns whether an existing row was touched.
#[tracing::instrument(name = "Upserting a subscriber", skip(new_subscriber, db_pool))]
async fn upsert_subscriber(
    new_subscriber: &NewSubscriber,
    db_pool: &PgPool,
) -> Result<bool, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO subscribers (id, email, name, active, source, subscribed_at)
        VALUES ($1, $2, $3, true, $4, $5)
        ON CONFLICT (email) DO UPDATE SET active = true
        RETURNING (xmax <> 0) AS existed
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_subscriber.email.as_ref())
    .bind(new_subscriber.name.as_ref().map(|name| name.as_ref()))
    .bind(new_subscriber.source.as_ref())
    .bind(Utc::now())
    .map(|row: PgRow| row.get("existed"))
    .fetch_one(db_pool)
    .await
    .map_err(|err| {
        tracing::error!("Failed to execute query: {:?}", err);
        err
    })
}

#[tracing::instrument(
    name = "Sending the welcome email",
    skip(email_service, token_keys),
    fields(recipient = %recipient)
)]
async fn send_welcome_email(
    email_service: &EmailService,
    recipient: &SubscriberEmail,
    base_url: &str,
    token_keys: &TokenKeys,
) -> Result<(), crate::email::ChannelError> {
    let unsubscribe_link = format!(
        "{}/unsubscribe?email={}&token={}",
        base_url,
        recipient.as_ref(),
        token_keys.unsubscribe.generate(recipient)
    );
    let preferences_link = format!(
        "{}/preferences?email={}&token={}",
        base_url,
        recipient.as_ref(),
        token_keys.preferences.generate(recipient)
    );
    let html_body = format!(
        r#"
            <p>Welcome aboard! You will now receive our prop-firm comparisons,
            reviews and deals straight to your inbox.</p>
            <p><a href="{}">Manage your preferences</a> or
            <a href="{}">unsubscribe</a> at any time with one click.</p>
        "#,
        preferences_link, unsubscribe_link
    );

    email_service
        .send(
            Purpose::Welcome,
            std::slice::from_ref(recipient),
            "Welcome to PropCompare",
            &html_body,
        )
        .await
        .map(|_| ())
}

#[tracing::instrument(
    name = "Sending the admin sign-up notification",
    skip(email_service, new_subscriber)
)]
async fn send_admin_notification(
    email_service: &EmailService,
    admin_recipient: &SubscriberEmail,
    new_subscriber: &NewSubscriber,
    reactivated: bool,
) -> Result<(), crate::email::ChannelError> {
    let action = if reactivated {
        "resubscribed"
    } else {
        "subscribed"
    };
    let html_body = format!(
        "<p>{} just {} (source: {}).</p>",
        new_subscriber.email.as_ref(),
        action,
        new_subscriber.source.as_ref(),
    );

    email_service
        .send(
            Purpose::AdminAlert,
            std::slice::from_ref(admin_recipient),
            "New newsletter subscriber",
            &html_body,
        )
        .await
        .map(|_| ())
}
