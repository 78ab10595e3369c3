use sqlx::{postgres::PgRow, Row};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;
use propfirm_newsletter::domain::email_event::{EmailEvent, EventType};

async fn create_subscriber(test_app: &TestApp, email: &str) {
    let _mock_guard = Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .named("Create subscriber")
        .mount_as_scoped(&test_app.email_server)
        .await;

    test_app
        .post_subscription(serde_json::json!({ "email": email }))
        .await;
}

async fn is_active(test_app: &TestApp, email: &str) -> bool {
    sqlx::query("SELECT active FROM subscribers WHERE email = $1;")
        .bind(email)
        .map(|row: PgRow| -> bool { row.get("active") })
        .fetch_one(&test_app.db_pool)
        .await
        .expect("Query to fetch subscriber failed.")
}

#[tokio::test]
async fn unsubscribe_without_a_token_deactivates_the_subscriber() {
    let test_app = TestApp::spawn_app().await;
    create_subscriber(&test_app, "a@x.com").await;

    let response = test_app
        .post_unsubscribe(serde_json::json!({ "email": "a@x.com" }))
        .await;

    assert_eq!(200, response.status().as_u16());
    assert!(!is_active(&test_app, "a@x.com").await);
}

#[tokio::test]
async fn unsubscribe_with_a_valid_token_deactivates_the_subscriber() {
    let test_app = TestApp::spawn_app().await;
    create_subscriber(&test_app, "a@x.com").await;

    let token = test_app.unsubscribe_token("a@x.com");
    let response = test_app
        .post_unsubscribe(serde_json::json!({ "email": "a@x.com", "token": token }))
        .await;

    assert_eq!(200, response.status().as_u16());
    assert!(!is_active(&test_app, "a@x.com").await);
}

#[tokio::test]
async fn unsubscribe_with_a_wrong_token_returns_400_and_changes_nothing() {
    let test_app = TestApp::spawn_app().await;
    create_subscriber(&test_app, "a@x.com").await;

    let response = test_app
        .post_unsubscribe(serde_json::json!({
            "email": "a@x.com",
            "token": "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
        }))
        .await;

    assert_eq!(400, response.status().as_u16());
    assert!(is_active(&test_app, "a@x.com").await);
}

#[tokio::test]
async fn unsubscribe_rejects_a_token_minted_for_another_email() {
    let test_app = TestApp::spawn_app().await;
    create_subscriber(&test_app, "a@x.com").await;
    create_subscriber(&test_app, "b@x.com").await;

    let token_for_b = test_app.unsubscribe_token("b@x.com");
    let response = test_app
        .post_unsubscribe(serde_json::json!({ "email": "a@x.com", "token": token_for_b }))
        .await;

    assert_eq!(400, response.status().as_u16());
    assert!(is_active(&test_app, "a@x.com").await);
}

#[tokio::test]
async fn unsubscribe_returns_404_for_an_unknown_email() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .post_unsubscribe(serde_json::json!({ "email": "ghost@x.com" }))
        .await;

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn unsubscribe_appends_an_event_with_no_campaign_context() {
    let test_app = TestApp::spawn_app().await;
    create_subscriber(&test_app, "a@x.com").await;

    test_app
        .post_unsubscribe(serde_json::json!({ "email": "a@x.com" }))
        .await;

    let event: EmailEvent = sqlx::query(
        "SELECT id, campaign_id, subscriber_email, event_type, created_at FROM email_events;",
    )
    .map(|row: PgRow| EmailEvent {
        id: row.get("id"),
        campaign_id: row.get("campaign_id"),
        subscriber_email: row.get("subscriber_email"),
        event_type: EventType::parse(row.get("event_type")).unwrap(),
        created_at: row.get("created_at"),
    })
    .fetch_one(&test_app.db_pool)
    .await
    .expect("Query to fetch email events failed.");

    assert!(event.campaign_id.is_none());
    assert_eq!(event.subscriber_email, "a@x.com");
    assert_eq!(event.event_type, EventType::Unsubscribed);
}

#[tokio::test]
async fn unsubscribing_twice_is_idempotent() {
    let test_app = TestApp::spawn_app().await;
    create_subscriber(&test_app, "a@x.com").await;

    let first = test_app
        .post_unsubscribe(serde_json::json!({ "email": "a@x.com" }))
        .await;
    let second = test_app
        .post_unsubscribe(serde_json::json!({ "email": "a@x.com" }))
        .await;

    assert_eq!(200, first.status().as_u16());
    assert_eq!(200, second.status().as_u16());
    assert!(!is_active(&test_app, "a@x.com").await);
}
