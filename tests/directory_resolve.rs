use claim::{assert_err, assert_none, assert_ok, assert_some};
use mockito::Matcher;
use portal_desk::core::config::DirectoryConfig;
use portal_desk::core::DirectoryClient;
use serde_json::json;

fn client_for_mock_server() -> DirectoryClient {
    let configuration = DirectoryConfig {
        base_url: mockito::server_url(),
        request_timeout_seconds: 2,
    };
    DirectoryClient::new(&configuration).expect("Failed to build directory client")
}

// Mocks are matched on the request body as well as the path, so each test
// uses a distinct email and the shared mock server stays unambiguous.
fn lookup_mock(email: &str) -> mockito::Mock {
    mockito::mock("POST", "/directory/lookup").match_body(Matcher::PartialJson(json!({
        "email": email,
    })))
}

#[tokio::test]
async fn known_user_resolves_with_roles() {
    let _mock = lookup_mock("amina@example.org")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "email": "amina@example.org",
                "username": "amina",
                "roles": ["project-manager", "requestor"]
            }"#,
        )
        .create();

    let client = client_for_mock_server();
    let resolved = client.resolve("amina@example.org", "s3cret").await;

    let identity = assert_ok!(resolved);
    let identity = assert_some!(identity);
    assert_eq!(identity.email, "amina@example.org");
    assert_eq!(identity.username, "amina");
    assert_eq!(
        identity.roles,
        vec!["project-manager".to_string(), "requestor".to_string()]
    );
}

#[tokio::test]
async fn unknown_user_falls_back_to_local_check() {
    let _mock = lookup_mock("nobody@example.org").with_status(404).create();

    let client = client_for_mock_server();
    let resolved = client.resolve("nobody@example.org", "whatever").await;

    assert_none!(assert_ok!(resolved));
}

#[tokio::test]
async fn directory_outage_never_locks_users_out() {
    let configuration = DirectoryConfig {
        // Nothing is listening here.
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_seconds: 1,
    };
    let client = DirectoryClient::new(&configuration).expect("Failed to build directory client");

    let resolved = client.resolve("amina@example.org", "s3cret").await;

    assert_none!(assert_ok!(resolved));
}

#[tokio::test]
async fn malformed_directory_response_is_an_error() {
    let _mock = lookup_mock("garbled@example.org")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("not json at all")
        .create();

    let client = client_for_mock_server();
    let resolved = client.resolve("garbled@example.org", "s3cret").await;

    assert_err!(resolved);
}
