use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::auth::admin::AdminGuard;
use crate::auth::lockout::LockoutStore;
use crate::config::{DatabaseSettings, Settings};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email::api_client::ApiMailClient;
use crate::email::service::EmailService;
use crate::email::smtp_client::SmtpMailClient;
use crate::routes::{
    get_campaign_analytics, get_growth_analytics, get_preferences, handle_subscribe,
    handle_unsubscribe, health_check, send_admin_newsletter, update_preferences,
};
use crate::token::TokenKey;

/// Public base URL, used to build unsubscribe/preferences links in sent mail.
pub struct ApplicationBaseUrl(pub String);

/// Address that receives admin sign-up notifications.
pub struct AdminRecipient(pub SubscriberEmail);

/// The two token keys, built once at startup. Construction fails on missing
/// or placeholder secrets, so a misconfigured deployment never boots.
pub struct TokenKeys {
    pub unsubscribe: TokenKey,
    pub preferences: TokenKey,
}

pub struct Application {
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let db_pool = get_connection_db_pool(&config.database);

        let api_sender = config
            .get_email_api_sender()
            .expect("API sender email is not valid");
        let api_client = ApiMailClient::new(
            config.get_email_api_base_url(),
            api_sender,
            config.get_email_api_key(),
            None,
        );

        let smtp_sender = config
            .get_smtp_sender()
            .expect("SMTP sender email is not valid");
        let smtp_client = SmtpMailClient::new(
            &config.smtp.host,
            config.smtp.port,
            config.smtp.username.clone(),
            config.smtp.password.clone(),
            smtp_sender,
            config.smtp.tls_mode,
        )
        .expect("Failed to build the SMTP relay client");

        let email_service = EmailService::new(
            api_client,
            smtp_client,
            config.get_app_base_url(),
        );

        let token_keys = TokenKeys {
            unsubscribe: TokenKey::new(config.tokens.unsubscribe_secret.clone())
                .expect("Unsubscribe token secret is missing or insecure"),
            preferences: TokenKey::new(config.tokens.preferences_secret.clone())
                .expect("Preferences token secret is missing or insecure"),
        };

        let admin_recipient = AdminRecipient(
            config
                .get_admin_notification_email()
                .expect("Admin notification email is not valid"),
        );

        let redis_client = redis::Client::open(config.get_redis_address())
            .expect("Failed to build the Redis client");
        let admin_guard = AdminGuard::new(
            config.get_admin_api_key(),
            LockoutStore::new(redis_client, config.get_redis_key_prefix()),
        );

        let listener =
            TcpListener::bind(config.get_address()).expect("Failed to bind the address.");
        let port = listener.local_addr().unwrap().port();
        let server = run(
            listener,
            db_pool,
            email_service,
            ApplicationBaseUrl(config.get_app_base_url()),
            token_keys,
            admin_recipient,
            admin_guard,
        )?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    email_service: EmailService,
    base_url: ApplicationBaseUrl,
    token_keys: TokenKeys,
    admin_recipient: AdminRecipient,
    admin_guard: AdminGuard,
) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(db_pool);
    let email_service = web::Data::new(email_service);
    let base_url = web::Data::new(base_url);
    let token_keys = web::Data::new(token_keys);
    let admin_recipient = web::Data::new(admin_recipient);
    let admin_guard = web::Data::new(admin_guard);

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/api/newsletter", web::post().to(handle_subscribe))
            .route("/api/unsubscribe", web::post().to(handle_unsubscribe))
            .route("/api/preferences", web::get().to(get_preferences))
            .route("/api/preferences", web::put().to(update_preferences))
            .route(
                "/api/admin/newsletter",
                web::post().to(send_admin_newsletter),
            )
            .route(
                "/api/admin/analytics/campaigns",
                web::get().to(get_campaign_analytics),
            )
            .route(
                "/api/admin/analytics/growth",
                web::get().to(get_growth_analytics),
            )
            .app_data(db_pool.clone())
            .app_data(email_service.clone())
            .app_data(base_url.clone())
            .app_data(token_keys.clone())
            .app_data(admin_recipient.clone())
            .app_data(admin_guard.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
