use gestor_net::{Fetcher, LoaderConfig, NetError, Request, RequestMode, ResourceLoader, ResponseType};
use http::StatusCode;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_with(route: &str, template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn same_origin_response_is_basic() {
    let server = server_with(
        "/static/manifest.json",
        ResponseTemplate::new(200).set_body_raw(r#"{"name":"Gestor"}"#, "application/json"),
    )
    .await;
    let origin = Url::parse(&server.uri()).unwrap();
    let loader = ResourceLoader::new(LoaderConfig::for_origin(origin.clone())).unwrap();

    let request = Request::get(origin.join("/static/manifest.json").unwrap());
    let response = loader.fetch(&request).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.response_type, ResponseType::Basic);
    assert_eq!(response.content_type, Some(mime::APPLICATION_JSON));
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["name"], "Gestor");
}

#[tokio::test]
async fn foreign_origin_response_is_cors() {
    let server = server_with("/chart.js", ResponseTemplate::new(200).set_body_string("x")).await;
    let home = Url::parse("http://gestor.invalid/").unwrap();
    let loader = ResourceLoader::new(LoaderConfig::for_origin(home)).unwrap();

    let url = Url::parse(&server.uri()).unwrap().join("/chart.js").unwrap();
    let cors = loader.fetch(&Request::get(url.clone())).await.unwrap();
    assert_eq!(cors.response_type, ResponseType::Cors);

    let opaque = loader
        .fetch(&Request::get(url).mode(RequestMode::NoCors))
        .await
        .unwrap();
    assert_eq!(opaque.response_type, ResponseType::Opaque);
}

#[tokio::test]
async fn error_status_is_not_a_fetch_failure() {
    let server = server_with("/missing", ResponseTemplate::new(404)).await;
    let origin = Url::parse(&server.uri()).unwrap();
    let loader = ResourceLoader::new(LoaderConfig::for_origin(origin.clone())).unwrap();

    let response = loader
        .fetch(&Request::get(origin.join("/missing").unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!response.ok());
}

#[tokio::test]
async fn unreachable_host_is_an_error() {
    // Port 9 (discard) on localhost is closed on any sane test machine.
    let url = Url::parse("http://127.0.0.1:9/").unwrap();
    let loader = ResourceLoader::new(LoaderConfig::default()).unwrap();

    let err = loader.fetch(&Request::navigate(url)).await.unwrap_err();
    assert!(matches!(err, NetError::HttpError(_) | NetError::Timeout(_)));
}
