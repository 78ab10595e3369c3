use sqlx::{postgres::PgRow, Row};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;
use propfirm_newsletter::domain::{
    preferences::{Frequency, Preferences},
    subscriber::Subscriber,
    subscriber_email::SubscriberEmail,
    subscriber_name::SubscriberName,
    subscription_source::SubscriptionSource,
};

#[tokio::test]
async fn subscribe_returns_200_with_success_true_when_body_is_valid() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let body = serde_json::json!({ "email": "a@x.com" });
    let response = test_app.post_subscription(body).await;

    assert_eq!(200, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn subscribe_persists_the_new_subscriber() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let body = serde_json::json!({ "email": "a@x.com", "name": "Alex" });
    test_app.post_subscription(body).await;

    let subscriber: Subscriber = sqlx::query(
        "SELECT id, email, name, active, source, frequency, categories, subscribed_at FROM subscribers;",
    )
    .map(|row: PgRow| Subscriber {
        id: row.get("id"),
        email: SubscriberEmail::parse(row.get("email")).unwrap(),
        name: row
            .get::<Option<String>, _>("name")
            .map(|name| SubscriberName::parse(name).unwrap()),
        active: row.get("active"),
        source: SubscriptionSource::parse(row.get("source")).unwrap(),
        subscribed_at: row.get("subscribed_at"),
        preferences: Preferences {
            frequency: Frequency::parse(row.get("frequency")).unwrap(),
            categories: serde_json::from_value(row.get("categories")).unwrap(),
        },
    })
    .fetch_one(&test_app.db_pool)
    .await
    .expect("Query to fetch subscribers failed.");

    assert_eq!(subscriber.email.as_ref(), "a@x.com");
    assert_eq!(subscriber.name.as_ref().map(|name| name.as_ref()), Some("Alex"));
    assert!(subscriber.active);
    assert_eq!(subscriber.source, SubscriptionSource::Website);
    assert_eq!(subscriber.preferences.frequency, Frequency::Weekly);
}

#[tokio::test]
async fn subscribe_returns_400_when_body_is_invalid() {
    let test_app = TestApp::spawn_app().await;

    // Table-driven: each body must be rejected before any send is attempted.
    let test_cases = vec![
        (serde_json::json!({}), "missing email"),
        (serde_json::json!({ "email": "" }), "empty email"),
        (
            serde_json::json!({ "email": "not-an-email" }),
            "malformed email",
        ),
        (
            serde_json::json!({ "email": "a@x.com", "name": "{Alex}" }),
            "invalid name",
        ),
        (
            serde_json::json!({ "email": "a@x.com", "source": "billboard" }),
            "unknown source",
        ),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_subscription(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }
}

#[tokio::test]
async fn subscribe_sends_a_welcome_email_with_tokenized_links() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let body = serde_json::json!({ "email": "a@x.com" });
    test_app.post_subscription(body).await;

    let received_requests = &test_app.email_server.received_requests().await.unwrap();
    assert_eq!(received_requests.len(), 1);

    let links = test_app.extract_links(&received_requests[0]);
    let unsubscribe_link = links
        .iter()
        .find(|link| link.contains("/unsubscribe"))
        .expect("Welcome email carries no unsubscribe link");

    let expected_token = test_app.unsubscribe_token("a@x.com");
    assert!(unsubscribe_link.contains(&expected_token));

    let preferences_link = links
        .iter()
        .find(|link| link.contains("/preferences"))
        .expect("Welcome email carries no preferences link");
    assert!(preferences_link.contains(&test_app.preferences_token("a@x.com")));
}

#[tokio::test]
async fn subscribe_sends_an_admin_notification_over_the_relay_channel() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let body = serde_json::json!({ "email": "a@x.com" });
    let response = test_app.post_subscription(body).await;

    assert_eq!(200, response.status().as_u16());

    // One welcome email over the API channel (asserted by the mock above)
    // and one notification to the configured admin mailbox over SMTP.
    let admin_email = test_app.config.admin.notification_email.clone();
    assert_eq!(test_app.smtp_server.recorded_recipients(), vec![admin_email]);
}

#[tokio::test]
async fn resubscribing_reactivates_instead_of_duplicating() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app
        .post_subscription(serde_json::json!({ "email": "a@x.com" }))
        .await;
    test_app
        .post_unsubscribe(serde_json::json!({ "email": "a@x.com" }))
        .await;
    let response = test_app
        .post_subscription(serde_json::json!({ "email": "a@x.com" }))
        .await;

    assert_eq!(200, response.status().as_u16());

    let rows = sqlx::query("SELECT active FROM subscribers WHERE email = 'a@x.com';")
        .map(|row: PgRow| -> bool { row.get("active") })
        .fetch_all(&test_app.db_pool)
        .await
        .expect("Query to fetch subscribers failed.");

    assert_eq!(rows.len(), 1);
    assert!(rows[0]);
}

#[tokio::test]
async fn resubscribing_an_active_subscriber_is_a_no_op_success() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app
        .post_subscription(serde_json::json!({ "email": "a@x.com" }))
        .await;
    let response = test_app
        .post_subscription(serde_json::json!({ "email": "a@x.com" }))
        .await;

    assert_eq!(200, response.status().as_u16());

    let rows = sqlx::query("SELECT active FROM subscribers;")
        .map(|row: PgRow| -> bool { row.get("active") })
        .fetch_all(&test_app.db_pool)
        .await
        .expect("Query to fetch subscribers failed.");

    assert_eq!(rows.len(), 1);
    assert!(rows[0]);
}

#[tokio::test]
async fn subscribe_stores_emails_case_normalized() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app
        .post_subscription(serde_json::json!({ "email": "Trader@X.com" }))
        .await;
    test_app
        .post_subscription(serde_json::json!({ "email": "trader@x.com" }))
        .await;

    let rows = sqlx::query("SELECT email FROM subscribers;")
        .map(|row: PgRow| -> String { row.get("email") })
        .fetch_all(&test_app.db_pool)
        .await
        .expect("Query to fetch subscribers failed.");

    assert_eq!(rows, vec!["trader@x.com".to_string()]);
}
