//! RdapClient against a local mock RDAP service
//!
//! The client is blocking, so every call runs on a blocking thread while the
//! mock server keeps answering from the test runtime.

use std::net::IpAddr;
use std::time::Duration;

use geotrace::rdap::{resolve_ownership, DEFAULT_REDIRECTOR};
use geotrace::{Directory, Error, Lookup, RdapClient};
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOOGLE: &str = r#"{
    "objectClassName": "ip network",
    "handle": "NET-8-8-8-0-2",
    "entities": [
        {"roles": ["abuse"], "vcardArray": ["vcard", [["fn", {}, "text", "Abuse"]]]},
        {"roles": ["registrant"], "vcardArray": ["vcard", [
            ["version", {}, "text", "4.0"],
            ["fn", {}, "text", "Google LLC"]
        ]]}
    ]
}"#;

fn rdap_json(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/rdap+json")
}

fn ip(text: &str) -> IpAddr {
    text.parse().unwrap()
}

/// Helper running `f` with a client that queries `server` directly
async fn with_fixed_server<T, F>(server: String, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce(RdapClient) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let client = RdapClient::new(Some(server), Duration::from_secs(5)).unwrap();
        f(client)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_registrant_from_server() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip/8.8.8.8"))
        .and(header_regex("accept", r"application/rdap\+json"))
        .respond_with(rdap_json(GOOGLE))
        .expect(1)
        .mount(&mock_server)
        .await;

    // trailing slash on the configured server is not doubled
    let server = format!("{}/", mock_server.uri());
    let result = with_fixed_server(server, |client| resolve_ownership(&client, ip("8.8.8.8"))).await;

    assert_eq!(result, Lookup::Found("Google LLC".to_string()));
}

#[tokio::test]
async fn test_not_found_is_failed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip/203.0.113.9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (lookup, err) = with_fixed_server(mock_server.uri(), |client| {
        (
            resolve_ownership(&client, ip("203.0.113.9")),
            client.query_ip(ip("203.0.113.9")).unwrap_err(),
        )
    })
    .await;

    assert_eq!(lookup, Lookup::Failed);
    assert!(matches!(err, Error::Rdap { .. }));
    assert!(err.to_string().contains("203.0.113.9"), "{err}");
}

#[tokio::test]
async fn test_malformed_body_is_failed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip/198.51.100.1"))
        .respond_with(rdap_json("<html>rate limited</html>"))
        .mount(&mock_server)
        .await;

    let err = with_fixed_server(mock_server.uri(), |client| {
        client.query_ip(ip("198.51.100.1")).unwrap_err()
    })
    .await;

    assert!(matches!(err, Error::Rdap { .. }));
}

#[tokio::test]
async fn test_bootstrap_selects_registry() {
    let mock_server = MockServer::start().await;
    let registry = format!("{}/registry/", mock_server.uri());
    let bootstrap = serde_json::json!({
        "version": "1.0",
        "services": [
            [["8.0.0.0/8"], [registry, "http://unused.example/"]],
            [["9.0.0.0/8"], ["http://other.example/"]]
        ]
    });

    Mock::given(method("GET"))
        .and(path("/ipv4.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bootstrap))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/registry/ip/8.8.8.8"))
        .respond_with(rdap_json(GOOGLE))
        .expect(2)
        .mount(&mock_server)
        .await;

    let base = mock_server.uri();
    let (first, second) = tokio::task::spawn_blocking(move || {
        let client = RdapClient::new(None, Duration::from_secs(5))
            .unwrap()
            .with_bootstrap(base);
        (
            resolve_ownership(&client, ip("8.8.8.8")),
            resolve_ownership(&client, ip("8.8.8.8")),
        )
    })
    .await
    .unwrap();

    // the bootstrap file is fetched once for both queries
    assert_eq!(first, Lookup::Found("Google LLC".to_string()));
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_bootstrap_unavailable_falls_back_to_redirector() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ipv4.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ipv6.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let base = mock_server.uri();
    let (v4, v6) = tokio::task::spawn_blocking(move || {
        let client = RdapClient::new(None, Duration::from_secs(5))
            .unwrap()
            .with_bootstrap(base);
        (
            client.base_url(ip("8.8.8.8")),
            client.base_url(ip("2001:4860::8888")),
        )
    })
    .await
    .unwrap();

    assert_eq!(v4, DEFAULT_REDIRECTOR);
    assert_eq!(v6, DEFAULT_REDIRECTOR);
}
