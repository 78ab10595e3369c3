use config::{Config, ConfigError, File};
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::{
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions,
};

use crate::domain::subscriber_email::SubscriberEmail;
use crate::email::smtp_client::SmtpTlsMode;

#[derive(Debug)]
pub enum Environment {
    Development,
    Production,
}

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email_api: EmailApiSettings,
    pub smtp: SmtpSettings,
    pub admin: AdminSettings,
    pub tokens: TokenSettings,
    pub redis: RedisSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    /// Public base URL used to build unsubscribe and preferences links.
    pub base_url: String,
}

/// Transactional API channel (welcome mails, newsletters, promotions).
#[derive(serde::Deserialize, Clone)]
pub struct EmailApiSettings {
    pub base_url: String,
    pub sender_email: String,
    pub api_key: Secret<String>,
}

/// SMTP relay channel (admin alerts, support replies).
#[derive(serde::Deserialize, Clone)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub sender_email: String,
    pub tls_mode: SmtpTlsMode,
}

#[derive(serde::Deserialize, Clone)]
pub struct AdminSettings {
    pub api_key: Secret<String>,
    /// Where sign-up notifications land.
    pub notification_email: String,
}

/// Secrets for the HMAC-derived unsubscribe/preferences tokens. Validated at
/// startup by TokenKey::new; a missing or placeholder value aborts boot.
#[derive(serde::Deserialize, Clone)]
pub struct TokenSettings {
    pub unsubscribe_secret: Secret<String>,
    pub preferences_secret: Secret<String>,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    // secrecy protects secret information and prevents them to be exposed (eg: via logs)
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub name: String,
    pub require_ssl: bool,
}

#[derive(serde::Deserialize, Clone)]
pub struct RedisSettings {
    pub port: u16,
    pub host: String,
    /// Namespace prepended to every redis key, so several instances can share
    /// one redis without stepping on each other's counters.
    pub key_prefix: String,
}

impl Settings {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    pub fn get_app_base_url(&self) -> String {
        self.application.base_url.clone()
    }

    pub fn get_db_options(&self) -> PgConnectOptions {
        self.database.get_db_options()
    }

    pub fn get_email_api_sender(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.email_api.sender_email.clone())
    }

    pub fn get_email_api_base_url(&self) -> String {
        self.email_api.base_url.clone()
    }

    pub fn get_email_api_key(&self) -> Secret<String> {
        self.email_api.api_key.clone()
    }

    pub fn get_smtp_sender(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.smtp.sender_email.clone())
    }

    pub fn get_admin_notification_email(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.admin.notification_email.clone())
    }

    pub fn get_admin_api_key(&self) -> Secret<String> {
        self.admin.api_key.clone()
    }

    pub fn get_redis_address(&self) -> String {
        self.redis.get_address()
    }

    pub fn get_redis_key_prefix(&self) -> String {
        self.redis.key_prefix.clone()
    }

    pub fn set_email_api_base_url(&mut self, new_base_url: String) {
        self.email_api.base_url = new_base_url
    }

    pub fn set_app_port(&mut self, port: u16) {
        self.application.port = port;
    }

    pub fn set_smtp_address(&mut self, host: String, port: u16, tls_mode: SmtpTlsMode) {
        self.smtp.host = host;
        self.smtp.port = port;
        self.smtp.tls_mode = tls_mode;
    }

    pub fn set_redis_key_prefix(&mut self, key_prefix: String) {
        self.redis.key_prefix = key_prefix;
    }
}

impl DatabaseSettings {
    pub fn get_name(&self) -> String {
        self.name.clone()
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn get_db_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        let mut db_options = PgConnectOptions::new()
            .host(&self.host)
            .password(self.password.expose_secret())
            .username(&self.username)
            .port(self.port)
            .database(&self.name)
            .ssl_mode(ssl_mode);

        db_options.log_statements(tracing::log::LevelFilter::Trace);

        db_options
    }
}

impl RedisSettings {
    pub fn get_address(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            unknown_env => Err(format!(
                "{} is not supported environment. Use either 'development' or 'production'.",
                unknown_env
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let root_path = std::env::current_dir().expect("Failed to determine the current directory");
    let config_directory = root_path.join("config");
    // Uses development environment by default
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "development".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT");
    let config_base_filepath = config_directory.join("base");
    let config_env_filepath = config_directory.join(environment.as_str());

    // It merges the base configuration file with the one from the specific environment (development or production)
    let settings = Config::builder()
        .add_source(File::from(config_base_filepath).required(true))
        .add_source(File::from(config_env_filepath).required(true))
        // Merge settings from environment variables with a prefix of APP and "__" separator
        // E.g APP_APPLICATION__PORT would set Settings.application.port
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?;

    tracing::info!("Application environment = {:?}", environment);

    // Try to convert the value from the configuration file into a Settings type
    settings.try_deserialize()
}
