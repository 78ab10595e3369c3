use std::sync::{Arc, Mutex};

use reqwest::Response;
use sqlx::{migrate, Connection, Executor, PgConnection, PgPool};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;
use wiremock::MockServer;

use propfirm_newsletter::{
    config::{get_configuration, DatabaseSettings, Settings},
    domain::subscriber_email::SubscriberEmail,
    email::smtp_client::SmtpTlsMode,
    startup::{get_connection_db_pool, Application},
    token::TokenKey,
};

pub struct TestApp {
    pub config: Settings,
    pub address: String,
    pub db_pool: PgPool,
    pub email_server: MockServer,
    pub smtp_server: SmtpStub,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        let mut config = get_configuration().expect("Missing configuration file.");
        let db_test_name = format!("db_{}", Uuid::new_v4().to_string().replace('-', "_"));
        let email_server = MockServer::start().await;
        let smtp_server = SmtpStub::start().await;

        // We are using port 0 as way to define a different port per each test. Port 0 is a special case that operating systems
        // take into account: when port is 0, the OS will search for the first available port
        config.set_app_port(0);
        config.set_email_api_base_url(email_server.uri());
        // The stub speaks plain SMTP and records RCPT TO addresses, so tests
        // can assert on deliveries over the relay channel.
        config.set_smtp_address("127.0.0.1".to_string(), smtp_server.port, SmtpTlsMode::None);
        // Admin lockout counters live in a shared redis; namespacing them per
        // test keeps one test's failed attempts from locking out another.
        config.set_redis_key_prefix(db_test_name.clone());

        let db_pool = configure_db(&mut config.database, db_test_name).await;

        let application = Application::build(config.clone())
            .await
            .expect("Failed to build application.");

        let address = format!("http://127.0.0.1:{}", application.get_port());

        tokio::spawn(application.run_until_stop());

        TestApp {
            address,
            config: config.clone(),
            db_pool,
            email_server,
            smtp_server,
        }
    }

    pub async fn post_subscription(&self, body: serde_json::Value) -> Response {
        let client = reqwest::Client::new();
        let url = format!("{}/api/newsletter", self.address);

        client
            .post(&url)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_unsubscribe(&self, body: serde_json::Value) -> Response {
        let client = reqwest::Client::new();
        let url = format!("{}/api/unsubscribe", self.address);

        client
            .post(&url)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_preferences(&self, email: &str, token: Option<&str>) -> Response {
        let client = reqwest::Client::new();
        let mut url = format!("{}/api/preferences?email={}", self.address, email);
        if let Some(token) = token {
            url = format!("{}&token={}", url, token);
        }

        client
            .get(&url)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put_preferences(&self, body: serde_json::Value) -> Response {
        let client = reqwest::Client::new();
        let url = format!("{}/api/preferences", self.address);

        client
            .put(&url)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_admin_newsletter(&self, body: serde_json::Value) -> Response {
        use secrecy::ExposeSecret;

        let api_key = self.config.get_admin_api_key();

        self.post_admin_newsletter_with_key(api_key.expose_secret(), body)
            .await
    }

    pub async fn post_admin_newsletter_with_key(
        &self,
        api_key: &str,
        body: serde_json::Value,
    ) -> Response {
        let client = reqwest::Client::new();
        let url = format!("{}/api/admin/newsletter", self.address);

        client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub fn unsubscribe_token(&self, email: &str) -> String {
        let key = TokenKey::new(self.config.tokens.unsubscribe_secret.clone())
            .expect("Test config carries a valid unsubscribe secret");

        key.generate(&SubscriberEmail::parse(email.to_string()).unwrap())
    }

    pub fn preferences_token(&self, email: &str) -> String {
        let key = TokenKey::new(self.config.tokens.preferences_secret.clone())
            .expect("Test config carries a valid preferences secret");

        key.generate(&SubscriberEmail::parse(email.to_string()).unwrap())
    }

    /// Pulls the HTML body out of a request captured by the email server and
    /// returns every link it contains.
    pub fn extract_links(&self, request: &wiremock::Request) -> Vec<String> {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let html = body["content"][0]["value"].as_str().unwrap();

        linkify::LinkFinder::new()
            .links(html)
            .filter(|link| *link.kind() == linkify::LinkKind::Url)
            .map(|link| link.as_str().to_string())
            .collect()
    }
}

async fn configure_db(db_config: &mut DatabaseSettings, db_test_name: String) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect_with(&db_config.get_db_options())
        .await
        .expect("Failed to connect to Postgres.");

    db_config.set_name(db_test_name);

    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, db_config.get_name()))
        .await
        .expect("Failed to create database.");

    connection
        .close()
        .await
        .expect("Failed to close connection.");

    // Execute migrations
    let db_pool = get_connection_db_pool(db_config);

    migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run migrations.");

    db_pool
}

/// Plain-SMTP test double. Accepts connections, walks the usual
/// EHLO/AUTH/MAIL/RCPT/DATA exchange and records every RCPT TO address, so
/// tests can assert which mailboxes a relay send targeted.
pub struct SmtpStub {
    pub port: u16,
    recipients: Arc<Mutex<Vec<String>>>,
}

impl SmtpStub {
    pub async fn start() -> SmtpStub {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind the SMTP stub listener.");
        let port = listener
            .local_addr()
            .expect("Failed to read the SMTP stub address.")
            .port();
        let recipients = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&recipients);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_smtp_connection(stream, Arc::clone(&recorded)));
            }
        });

        SmtpStub { port, recipients }
    }

    pub fn recorded_recipients(&self) -> Vec<String> {
        self.recipients.lock().unwrap().clone()
    }
}

async fn handle_smtp_connection(stream: TcpStream, recorded: Arc<Mutex<Vec<String>>>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    if write_half.write_all(b"220 smtp-stub ESMTP\r\n").await.is_err() {
        return;
    }

    let mut line = String::new();
    let mut in_data = false;
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        if in_data {
            // The message body ends with a lone dot.
            if line.trim_end() == "." {
                in_data = false;
                if write_half.write_all(b"250 Ok\r\n").await.is_err() {
                    break;
                }
            }
            continue;
        }

        let command = line.trim_end();
        let upper = command.to_uppercase();
        let response: &[u8] = if upper.starts_with("EHLO") || upper.starts_with("HELO") {
            b"250-smtp-stub\r\n250 AUTH PLAIN LOGIN\r\n"
        } else if upper.starts_with("AUTH") {
            b"235 Authentication succeeded\r\n"
        } else if upper.starts_with("RCPT TO") {
            if let Some(address) = command.split(['<', '>']).nth(1) {
                recorded.lock().unwrap().push(address.to_string());
            }
            b"250 Ok\r\n"
        } else if upper.starts_with("DATA") {
            in_data = true;
            b"354 End data with <CRLF>.<CRLF>\r\n"
        } else if upper.starts_with("QUIT") {
            let _ = write_half.write_all(b"221 Bye\r\n").await;
            break;
        } else {
            // MAIL FROM, RSET, NOOP and anything else we do not care about.
            b"250 Ok\r\n"
        };

        if write_half.write_all(response).await.is_err() {
            break;
        }
    }
}
