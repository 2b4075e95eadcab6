//! Session manager driven through the HTTP identity client against a mock server.

use std::sync::Arc;
use std::time::Duration;

use authkeep_core::storage::MemoryStore;
use authkeep_core::{ApiError, BearerAuth, HttpIdentityClient, SessionManager, SessionState, Transport};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_json() -> Value {
    json!({
        "id": "u1",
        "email": "a@b.com",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "kycStatus": "VERIFIED",
        "kycLevel": 2,
        "riskScore": 4.5,
        "mfaEnabled": true,
        "createdAt": "2024-01-01T00:00:00Z",
        "lastLoginAt": "2024-06-01T12:00:00Z"
    })
}

fn setup(server: &MockServer) -> (Transport, SessionManager) {
    let auth = BearerAuth::new();
    let transport = Transport::new(server.uri(), Duration::from_secs(5), auth.clone())
        .unwrap()
        .with_initial_backoff(Duration::from_millis(10));
    let client = Arc::new(HttpIdentityClient::new(transport.clone()));
    let manager = SessionManager::new(client, Arc::new(MemoryStore::new()), auth);
    (transport, manager)
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "a@b.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user_json(),
            "token": "T1",
            "refreshToken": "R1"
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn authorization_of(request: &wiremock::Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_login_attaches_bearer_to_later_requests() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accounts": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, manager) = setup(&server);
    let user = manager.login("a@b.com", "pw", None).await.unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.email, "a@b.com");
    assert_eq!(manager.access_token().as_deref(), Some("T1"));

    let body: Value = transport.get("/accounts").await.unwrap();
    assert_eq!(body, json!({"accounts": []}));

    let requests = server.received_requests().await.unwrap();
    // The login request itself went out before any credential was held
    assert_eq!(authorization_of(&requests[0]), None);
}

#[tokio::test]
async fn test_logout_notifies_with_old_bearer_then_clears() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let (transport, manager) = setup(&server);
    manager.login("a@b.com", "pw", None).await.unwrap();
    manager.logout().await;

    assert_eq!(manager.state(), SessionState::Unauthenticated);
    let _: Value = transport.get("/public").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.url.path(), "/public");
    assert_eq!(authorization_of(last), None);
}

#[tokio::test]
async fn test_logout_succeeds_when_service_errors() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (transport, manager) = setup(&server);
    manager.login("a@b.com", "pw", None).await.unwrap();
    manager.logout().await;

    assert_eq!(manager.session(), authkeep_core::Session::default());
    assert_eq!(transport.auth().credential(), None);
}

#[tokio::test]
async fn test_refresh_success_over_http() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T2"})))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, manager) = setup(&server);
    manager.login("a@b.com", "pw", None).await.unwrap();
    let identity_before = manager.identity();

    manager.refresh_session().await;

    assert_eq!(manager.identity(), identity_before);
    assert_eq!(manager.session().refresh_token.as_deref(), Some("R1"));
    assert_eq!(transport.auth().header_value().as_deref(), Some("Bearer T2"));
}

#[tokio::test]
async fn test_refresh_expired_token_logs_out() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Refresh token expired"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (transport, manager) = setup(&server);
    manager.login("a@b.com", "pw", None).await.unwrap();
    manager.refresh_session().await;

    let session = manager.session();
    assert!(!session.authenticated);
    assert!(session.user.is_none());
    assert!(session.access_token.is_none());
    assert!(session.refresh_token.is_none());
    assert_eq!(transport.auth().header_value(), None);
}

#[tokio::test]
async fn test_mfa_required_is_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": "MFA code required", "code": "MFA_REQUIRED"})),
        )
        .mount(&server)
        .await;

    let (transport, manager) = setup(&server);
    let err = manager.login("a@b.com", "pw", None).await.unwrap_err();

    assert!(matches!(err, ApiError::MfaRequired));
    assert_eq!(manager.state(), SessionState::Unauthenticated);
    assert!(!manager.session().in_flight);
    assert_eq!(transport.auth().credential(), None);
}

#[tokio::test]
async fn test_rate_limited_login_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_login(&server).await;

    let (_transport, manager) = setup(&server);
    manager.login("a@b.com", "pw", None).await.unwrap();

    assert!(manager.is_authenticated());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
