//! HTTP artifact source against a local server

mod common;

use axum::{http::StatusCode, routing::get, Router};
use installation_operator::controller::artifact::{
    ArtifactSource, FetchFailure, HttpArtifactSource, UrlTemplate,
};
use std::time::Duration;
use tokio::net::TcpListener;

async fn serve() -> String {
    let app = Router::new()
        .route(
            "/master/fis-image-streams.json",
            get(|| async { r#"{"kind":"List","apiVersion":"v1","items":[]}"# }),
        )
        .route(
            "/master/quickstarts/karaf-cxf-rest-template.json",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn test_ok_response_returns_body() {
    common::init_rustls();
    let template = UrlTemplate::new(serve().await);
    let source = HttpArtifactSource::new(Duration::from_secs(5)).unwrap();

    let body = source
        .fetch(&template.render("master", "fis-image-streams.json"))
        .await
        .unwrap();
    assert!(String::from_utf8(body).unwrap().contains("\"kind\":\"List\""));
}

#[tokio::test]
async fn test_non_ok_status_is_a_failure() {
    common::init_rustls();
    let template = UrlTemplate::new(serve().await);
    let source = HttpArtifactSource::new(Duration::from_secs(5)).unwrap();

    let err = source
        .fetch(&template.render("master", "quickstarts/karaf-cxf-rest-template.json"))
        .await
        .unwrap_err();
    assert_eq!(err, FetchFailure::Status(500));

    let err = source
        .fetch(&template.render("master", "missing.json"))
        .await
        .unwrap_err();
    assert_eq!(err, FetchFailure::Status(404));
}

#[tokio::test]
async fn test_unreachable_host_is_a_transport_failure() {
    common::init_rustls();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let source = HttpArtifactSource::new(Duration::from_secs(5)).unwrap();

    let err = source
        .fetch(&format!("http://{addr}/master/fis-image-streams.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchFailure::Transport(_)), "{err:?}");
}
