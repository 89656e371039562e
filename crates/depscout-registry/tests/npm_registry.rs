//! HTTP-level tests for the npm registry client

use depscout_registry::{NpmRegistry, RegistryClient, RegistryConfig, RegistryError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> NpmRegistry {
    let config = RegistryConfig::default()
        .with_base_url(server.uri())
        .without_retries();
    NpmRegistry::new(config).unwrap()
}

#[tokio::test]
async fn test_package_exists_and_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/react"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "react"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/internal-ui-kit"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.package_exists("react").await.unwrap());
    assert!(!client.package_exists("internal-ui-kit").await.unwrap());
}

#[tokio::test]
async fn test_version_exists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lodash/4.17.21"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "4.17.21"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lodash/9.9.9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.version_exists("lodash", "4.17.21").await.unwrap());
    assert!(!client.version_exists("lodash", "9.9.9").await.unwrap());
}

#[tokio::test]
async fn test_latest_version_for_scoped_package() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/@emotion%2Freact/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "@emotion/react",
            "version": "11.11.4"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.latest_version("@emotion/react").await.unwrap(),
        Some("11.11.4".to_string())
    );
}

#[tokio::test]
async fn test_package_metadata_reads_peer_ranges() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/react-dom"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "react-dom",
            "dist-tags": { "latest": "18.2.0" },
            "versions": {
                "17.0.2": { "peerDependencies": { "react": "17.0.2" } },
                "18.2.0": { "peerDependencies": { "react": "^18.2.0" } }
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let meta = client.package_metadata("react-dom").await.unwrap().unwrap();
    assert_eq!(meta.versions.len(), 2);
    assert_eq!(meta.latest(), Some("18.2.0"));
    assert_eq!(meta.versions["17.0.2"].peer_dependencies["react"], "17.0.2");
}

#[tokio::test]
async fn test_server_error_surfaces_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.package_exists("flaky").await;
    assert!(matches!(
        result,
        Err(RegistryError::RetryLimitExceeded { attempts: 1 })
    ));
}
