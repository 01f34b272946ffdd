use std::sync::Arc;
use std::time::Duration;

use easy_block::credentials::CookieJar;
use easy_block::dom::{ControlState, Document, NodeId, ReadyState, Selector, CONTROL_CLASS};
use easy_block::transport::{HeaderSink, HttpTransport, ReqwestTransport};
use easy_block::{install_with_transport, ActivationOutcome, AgentError, Config, Installation};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "Bearer AAAAAAAAAAAAAAAAAAAAAMLheAAAAAAA0%2BuSeid%2BULvsea4JtiGRiSDSJSI";

fn config_for(server: &MockServer) -> Config {
    Config {
        poll_attempts: 3,
        poll_delay_ms: 10,
        debounce_ms: 20,
        feedback_ms: 100,
        profile_lookup_url: format!("{}/graphql/lookup", server.uri()),
        block_create_url: format!("{}/1.1/blocks/create.json", server.uri()),
        ..Config::default()
    }
}

fn setup(server: &MockServer, cookies: &str) -> (Installation, Arc<Document>) {
    let document = Arc::new(Document::new());
    document.set_attribute(document.root(), "lang", "fr").unwrap();
    let installation = install_with_transport(
        document.clone(),
        Arc::new(CookieJar::new(cookies)),
        config_for(server),
        ReqwestTransport::new(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        ),
    )
    .unwrap();
    (installation, document)
}

fn add_card(doc: &Document, handle: &str) {
    let card = doc.create_element("article");
    doc.set_attribute(card, "data-testid", "tweet").unwrap();
    let link = doc.create_element("a");
    doc.set_attribute(link, "href", &format!("/{}", handle)).unwrap();
    doc.append_child(card, link).unwrap();
    let group = doc.create_element("div");
    let caret = doc.create_element("button");
    doc.set_attribute(caret, "data-testid", "caret").unwrap();
    doc.append_child(group, caret).unwrap();
    doc.append_child(card, group).unwrap();
    doc.append_child(doc.body(), card).unwrap();
}

fn controls(doc: &Document) -> Vec<NodeId> {
    doc.query_all(doc.root(), &Selector::any().with_class(CONTROL_CLASS))
}

/// The host page's own authenticated request, made before the user clicks.
async fn host_request(installation: &Installation, server: &MockServer) {
    let mut request = Request::new(
        Method::GET,
        format!("{}/i/api/home", server.uri()).parse().unwrap(),
    );
    request
        .headers_mut()
        .insert(AUTHORIZATION, HeaderValue::from_static(TOKEN));
    let response = installation.transport.execute(request).await.unwrap();
    assert!(response.is_success());
}

async fn mount_home(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/i/api/home"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_block_from_captured_credentials() {
    let server = MockServer::start().await;
    mount_home(&server).await;

    Mock::given(method("GET"))
        .and(path("/graphql/lookup"))
        .and(query_param("variables", r#"{"screenName":"alice"}"#))
        .and(header("authorization", TOKEN))
        .and(header("x-csrf-token", "csrf-1"))
        .and(header("x-twitter-auth-type", "OAuth2Session"))
        .and(header("x-twitter-client-language", "fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"user_result_by_screen_name": {"result": {"rest_id": "VXNlcjo5OTk="}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/1.1/blocks/create.json"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("user_id=999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id_str": "999"})))
        .expect(1)
        .mount(&server)
        .await;

    let (installation, document) = setup(&server, "guest_id=1; ct0=csrf-1");
    host_request(&installation, &server).await;
    assert_eq!(installation.credentials.get().as_deref(), Some(TOKEN));

    add_card(&document, "alice");
    installation.agent.scan();
    let button = controls(&document)[0];

    let outcome = installation.agent.activate(button).await;
    assert!(matches!(
        outcome,
        ActivationOutcome::Blocked { ref user_id, .. } if user_id == "999"
    ));

    let control = installation.agent.control(button).unwrap();
    assert_eq!(control.state(), ControlState::Success);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(control.state(), ControlState::Idle);
}

#[tokio::test]
async fn test_missing_csrf_cookie_sends_nothing() {
    let server = MockServer::start().await;
    mount_home(&server).await;
    Mock::given(path("/graphql/lookup"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (installation, document) = setup(&server, "guest_id=1");
    host_request(&installation, &server).await;

    add_card(&document, "alice");
    installation.agent.scan();
    let button = controls(&document)[0];

    let outcome = installation.agent.activate(button).await;
    assert!(matches!(
        outcome,
        ActivationOutcome::Failed(AgentError::MissingCsrfToken)
    ));
    assert!(document.has_class(button, "error"));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn test_missing_bearer_token_gives_up() {
    let server = MockServer::start().await;
    let (installation, document) = setup(&server, "ct0=csrf-1");

    add_card(&document, "alice");
    installation.agent.scan();
    let button = controls(&document)[0];

    let outcome = installation.agent.activate(button).await;
    assert!(matches!(
        outcome,
        ActivationOutcome::Failed(AgentError::MissingBearerToken)
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lookup_failure_skips_block() {
    let server = MockServer::start().await;
    Mock::given(path("/graphql/lookup"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/1.1/blocks/create.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let (installation, document) = setup(&server, "ct0=csrf-1");
    let mut xhr_headers = installation.interceptor.wrap_header_sink(HeaderMap::new());
    xhr_headers.set_request_header("Authorization", TOKEN);

    add_card(&document, "alice");
    installation.agent.scan();
    let button = controls(&document)[0];

    let outcome = installation.agent.activate(button).await;
    assert!(matches!(
        outcome,
        ActivationOutcome::Failed(AgentError::RemoteQueryFailed(_))
    ));
}

#[tokio::test]
async fn test_agent_attaches_to_cards_rendered_later() {
    let server = MockServer::start().await;
    let (installation, document) = setup(&server, "ct0=csrf-1");
    add_card(&document, "alice");

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(installation.agent.clone().run(shutdown.clone()));

    document.set_ready_state(ReadyState::Interactive);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(controls(&document).len(), 1);

    add_card(&document, "bob");
    add_card(&document, "carol");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(controls(&document).len(), 3);
    assert_eq!(installation.agent.scan_count(), 2);

    shutdown.cancel();
    task.await.unwrap();
}
