//! End-to-end triage passes against mocked Gmail and Vertex endpoints, with
//! file-backed history and catalog.

use base64::engine::general_purpose::URL_SAFE as BASE64_URL_SAFE;
use base64::Engine;
use gmail_module::GmailClient;
use google_auth_module::{GoogleAuth, GoogleAuthConfig};
use mockito::{Matcher, Server, ServerGuard};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use triage_module::catalog::JsonFileCatalog;
use triage_module::history_store::JsonFileHistoryStore;
use triage_module::service::{
    CatalogBackend, DeliveryMode, HistoryBackend, ServiceConfig, TriageService,
};
use triage_module::{HistoryStore, PassOutcome, DEFAULT_REPLY};
use vertex_module::VertexClient;

const GENERATE_PATH: &str = "/v1/projects/test-project/locations/us-central1/publishers/google/models/gemini-2.0-flash-001:generateContent";

struct EnvGuard {
    key: &'static str,
    original: Option<String>,
}

impl EnvGuard {
    fn set(key: &'static str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        let original = env::var(key).ok();
        env::set_var(key, value);
        Self { key, original }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => env::set_var(self.key, value),
            None => env::remove_var(self.key),
        }
    }
}

fn test_config(temp: &TempDir, delivery_mode: DeliveryMode) -> ServiceConfig {
    ServiceConfig {
        gcp_project: "test-project".to_string(),
        gcp_location: "us-central1".to_string(),
        model: "gemini-2.0-flash-001".to_string(),
        gmail_label: "INBOX".to_string(),
        delivery_mode,
        history_backend: HistoryBackend::File,
        history_path: temp.path().join("conversation_history.json"),
        history_collection: "conversations".to_string(),
        catalog_backend: CatalogBackend::File,
        catalog_path: temp.path().join("properties.json"),
        catalog_collection: "properties".to_string(),
        history_cap: 5,
        visible_exchanges: 3,
        poll_interval: Duration::from_secs(60),
        run_once: true,
        persona_name: "Pandora".to_string(),
    }
}

fn test_service(config: ServiceConfig) -> TriageService {
    let auth = GoogleAuth::new(GoogleAuthConfig {
        access_token: Some("test-token".to_string()),
        ..Default::default()
    })
    .expect("auth config");

    let gmail = GmailClient::new(auth.clone());
    let vertex = VertexClient::new(
        auth,
        &config.gcp_project,
        &config.gcp_location,
        &config.model,
    );
    let store = Box::new(
        JsonFileHistoryStore::new(&config.history_path).with_cap(config.history_cap),
    );
    let catalog = Box::new(JsonFileCatalog::new(&config.catalog_path));
    TriageService::new(config, gmail, vertex, store, catalog)
}

fn write_catalog(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("properties.json");
    fs::write(
        &path,
        r#"[{"Address": "12 Elm St", "Rent": "1800", "Bedrooms": "2"}]"#,
    )
    .unwrap();
    path
}

fn mock_inbound_message(server: &mut ServerGuard, id: &str, sender: &str, subject: &str, body: &str) {
    server
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"messages":[{{"id":"{id}"}}]}}"#))
        .create();

    let encoded_body = BASE64_URL_SAFE.encode(body.as_bytes());
    server
        .mock("GET", format!("/users/me/messages/{id}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"id":"{id}","payload":{{"mimeType":"text/plain","headers":[{{"name":"Subject","value":"{subject}"}},{{"name":"From","value":"{sender}"}}],"body":{{"data":"{encoded_body}"}}}}}}"#,
        ))
        .create();
}

#[test]
#[serial]
fn first_contact_records_one_exchange_and_drafts() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let _guard_gmail = EnvGuard::set("GMAIL_API_BASE_URL", server.url());
    let _guard_vertex = EnvGuard::set("VERTEX_API_BASE_URL", server.url());

    let temp = TempDir::new()?;
    write_catalog(&temp);
    let config = test_config(&temp, DeliveryMode::Draft);

    mock_inbound_message(
        &mut server,
        "m1",
        "Jane Doe <a@example.com>",
        "Unit 4B",
        "When is the unit available?",
    );

    let generate_mock = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("PROPERTY INFORMATION".to_string()),
            Matcher::Regex("12 Elm St".to_string()),
            Matcher::Regex("When is the unit available".to_string()),
            Matcher::Regex("Email from prospective tenant".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hi Jane, the unit is available June 1."}]}}]}"#,
        )
        .expect(1)
        .create();

    let draft_mock = server
        .mock("POST", "/users/me/drafts")
        .match_body(Matcher::Regex("\"raw\"".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"draft-1"}"#)
        .expect(1)
        .create();

    let modify_mock = server
        .mock("POST", "/users/me/messages/m1/modify")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"m1"}"#)
        .expect(1)
        .create();

    let service = test_service(config.clone());
    let outcome = service.process_next_unread()?;

    match outcome {
        PassOutcome::Processed {
            correspondent,
            draft_id,
        } => {
            assert_eq!(correspondent, "a@example.com");
            assert_eq!(draft_id.as_deref(), Some("draft-1"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let store = JsonFileHistoryStore::new(&config.history_path);
    let history = store.load("a@example.com")?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].incoming, "When is the unit available?");
    assert_eq!(history[0].outgoing, "Hi Jane, the unit is available June 1.");

    generate_mock.assert();
    draft_mock.assert();
    modify_mock.assert();
    Ok(())
}

#[test]
#[serial]
fn second_message_grows_history_oldest_first() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let _guard_gmail = EnvGuard::set("GMAIL_API_BASE_URL", server.url());
    let _guard_vertex = EnvGuard::set("VERTEX_API_BASE_URL", server.url());

    let temp = TempDir::new()?;
    write_catalog(&temp);
    let config = test_config(&temp, DeliveryMode::Draft);

    server
        .mock("POST", "/users/me/drafts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"draft-x"}"#)
        .create();
    server
        .mock("POST", Matcher::Regex("/users/me/messages/.+/modify".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{}"#)
        .create();
    server
        .mock("POST", GENERATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"First reply."}]}}]}"#)
        .create();

    mock_inbound_message(
        &mut server,
        "m1",
        "a@example.com",
        "Unit 4B",
        "When is the unit available?",
    );

    let service = test_service(config.clone());
    service.process_next_unread()?;

    // second pass: the follow-up question; the prompt must now carry history
    mock_inbound_message(
        &mut server,
        "m2",
        "a@example.com",
        "Re: Unit 4B",
        "Is parking included?",
    );
    let generate_with_history = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("PREVIOUS CONVERSATION HISTORY".to_string()),
            Matcher::Regex("Tenant: When is the unit available".to_string()),
            Matcher::Regex("Pandora: First reply".to_string()),
            Matcher::Regex("Is parking included".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Yes, one spot."}]}}]}"#)
        .expect(1)
        .create();

    service.process_next_unread()?;

    let store = JsonFileHistoryStore::new(&config.history_path);
    let history = store.load("a@example.com")?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].incoming, "When is the unit available?");
    assert_eq!(history[0].outgoing, "First reply.");
    assert_eq!(history[1].incoming, "Is parking included?");
    assert_eq!(history[1].outgoing, "Yes, one spot.");

    generate_with_history.assert();
    Ok(())
}

#[test]
#[serial]
fn generation_failure_falls_back_to_default_reply() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let _guard_gmail = EnvGuard::set("GMAIL_API_BASE_URL", server.url());
    let _guard_vertex = EnvGuard::set("VERTEX_API_BASE_URL", server.url());

    let temp = TempDir::new()?;
    write_catalog(&temp);
    let config = test_config(&temp, DeliveryMode::Draft);

    mock_inbound_message(&mut server, "m1", "a@example.com", "Unit 4B", "Hello?");
    server
        .mock("POST", GENERATE_PATH)
        .with_status(500)
        .with_body("model unavailable")
        .create();
    let draft_mock = server
        .mock("POST", "/users/me/drafts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"draft-2"}"#)
        .expect(1)
        .create();
    server
        .mock("POST", "/users/me/messages/m1/modify")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{}"#)
        .create();

    let service = test_service(config.clone());
    service.process_next_unread()?;

    let store = JsonFileHistoryStore::new(&config.history_path);
    let history = store.load("a@example.com")?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outgoing, DEFAULT_REPLY);

    draft_mock.assert();
    Ok(())
}

#[test]
#[serial]
fn send_mode_sends_instead_of_drafting() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let _guard_gmail = EnvGuard::set("GMAIL_API_BASE_URL", server.url());
    let _guard_vertex = EnvGuard::set("VERTEX_API_BASE_URL", server.url());

    let temp = TempDir::new()?;
    write_catalog(&temp);
    let config = test_config(&temp, DeliveryMode::Send);

    mock_inbound_message(&mut server, "m1", "a@example.com", "Unit 4B", "Hello?");
    server
        .mock("POST", GENERATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Hi!"}]}}]}"#)
        .create();
    let send_mock = server
        .mock("POST", "/users/me/messages/send")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"sent-1"}"#)
        .expect(1)
        .create();
    server
        .mock("POST", "/users/me/messages/m1/modify")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{}"#)
        .create();

    let service = test_service(config);
    let outcome = service.process_next_unread()?;
    match outcome {
        PassOutcome::Processed { draft_id, .. } => assert!(draft_id.is_none()),
        other => panic!("unexpected outcome: {:?}", other),
    }

    send_mock.assert();
    Ok(())
}

#[test]
#[serial]
fn listing_failure_degrades_to_no_unread() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let _guard_gmail = EnvGuard::set("GMAIL_API_BASE_URL", server.url());
    let _guard_vertex = EnvGuard::set("VERTEX_API_BASE_URL", server.url());

    let temp = TempDir::new()?;
    let config = test_config(&temp, DeliveryMode::Draft);

    server
        .mock("GET", "/users/me/messages")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("backend unavailable")
        .create();

    let service = test_service(config);
    let outcome = service.process_next_unread()?;
    assert!(matches!(outcome, PassOutcome::NoUnread));
    Ok(())
}

#[test]
#[serial]
fn missing_catalog_still_produces_a_reply_with_placeholder() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let _guard_gmail = EnvGuard::set("GMAIL_API_BASE_URL", server.url());
    let _guard_vertex = EnvGuard::set("VERTEX_API_BASE_URL", server.url());

    let temp = TempDir::new()?;
    // no catalog file written
    let config = test_config(&temp, DeliveryMode::Draft);

    mock_inbound_message(&mut server, "m1", "a@example.com", "Unit 4B", "Hello?");
    let generate_mock = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::Regex(
            "No property information available".to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Hi!"}]}}]}"#)
        .expect(1)
        .create();
    server
        .mock("POST", "/users/me/drafts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"draft-3"}"#)
        .create();
    server
        .mock("POST", "/users/me/messages/m1/modify")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{}"#)
        .create();

    let service = test_service(config);
    service.process_next_unread()?;

    generate_mock.assert();
    Ok(())
}
