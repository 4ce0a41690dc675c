//! S3 storage against a wiremock endpoint (path-style addressing), both
//! directly and through the HTTP router.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::json;
use slide_relay::{
    server, ObjectStore, PresentationConverter, RasterOutput, RelayError, RenderedSlide,
    S3Store, ServiceConfig, SlideRasteriser, SlideService, StorageBackend,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "decks";

const INVALID_KEY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>InvalidAccessKeyId</Code><Message>The AWS Access Key Id you provided does not exist in our records.</Message><RequestId>4442587FB7D0A2F9</RequestId></Error>"#;

async fn store(server: &MockServer) -> S3Store {
    S3Store::connect(&StorageBackend::S3 {
        bucket: BUCKET.into(),
        region: "us-east-1".into(),
        endpoint_url: Some(server.uri()),
        public_base_url: Some(format!("{}/{}", server.uri(), BUCKET)),
        access_key_id: Some("AKIDEXAMPLE".into()),
        secret_access_key: Some("wJalrXUtnFEMI".into()),
    })
    .await
    .unwrap()
}

async fn mount_head(server: &MockServer, key: &str, status: u16) {
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/{key}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn head_404_means_missing() {
    let server = MockServer::start().await;
    mount_head(&server, "gone.pdf", 404).await;

    assert!(!store(&server).await.exists("gone.pdf").await.unwrap());
}

#[tokio::test]
async fn head_200_means_present() {
    let server = MockServer::start().await;
    mount_head(&server, "here.pdf", 200).await;

    assert!(store(&server).await.exists("here.pdf").await.unwrap());
}

#[tokio::test]
async fn bare_head_403_means_missing() {
    let server = MockServer::start().await;
    mount_head(&server, "hidden.pdf", 403).await;

    assert!(!store(&server).await.exists("hidden.pdf").await.unwrap());
}

#[tokio::test]
async fn put_returns_the_public_url() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("/{BUCKET}/abc/slide_abc_1.jpg")))
        .and(header("content-type", "image/jpeg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = store(&server)
        .await
        .put("abc/slide_abc_1.jpg", vec![0xFF, 0xD8], "image/jpeg")
        .await
        .unwrap();
    assert_eq!(url, format!("{}/{BUCKET}/abc/slide_abc_1.jpg", server.uri()));
}

#[tokio::test]
async fn rejected_access_key_is_a_credentials_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("content-type", "application/xml")
                .set_body_string(INVALID_KEY_XML),
        )
        .mount(&server)
        .await;

    let err = store(&server)
        .await
        .put("abc.pdf", b"%PDF".to_vec(), "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::CredentialsUnavailable), "{err:?}");
}

// ── Through the router ───────────────────────────────────────────────────────

struct FakeConverter;

#[async_trait]
impl PresentationConverter for FakeConverter {
    async fn to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, RelayError> {
        let stem = input.file_stem().unwrap().to_string_lossy().into_owned();
        let pdf = out_dir.join(format!("{stem}.pdf"));
        tokio::fs::write(&pdf, b"%PDF-1.7\n").await.unwrap();
        Ok(pdf)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct OneSlide;

#[async_trait]
impl SlideRasteriser for OneSlide {
    async fn rasterise(&self, _pdf: &Path) -> Result<RasterOutput, RelayError> {
        Ok(RasterOutput {
            slides: vec![RenderedSlide {
                number: 1,
                bytes: vec![0xFF, 0xD8],
                content_type: "image/jpeg".into(),
            }],
            errors: vec![],
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

async fn router_over(server: &MockServer) -> TestServer {
    let config = ServiceConfig::builder().build().unwrap();
    let service = SlideService::new(
        config,
        Arc::new(FakeConverter),
        Arc::new(OneSlide),
        Arc::new(store(server).await),
    );
    TestServer::new(server::router(service)).unwrap()
}

#[tokio::test]
async fn upload_with_rejected_credentials_is_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("content-type", "application/xml")
                .set_body_string(INVALID_KEY_XML),
        )
        .mount(&server)
        .await;
    let app = router_over(&server).await;

    let form = MultipartForm::new()
        .add_part("file", Part::bytes(b"PK\x03\x04".to_vec()).file_name("deck.pptx"));
    let response = app.post("/upload").multipart(form).await;
    response.assert_status(StatusCode::FORBIDDEN);
    response.assert_json(&json!({ "error": "Credentials not available" }));
}

#[tokio::test]
async fn lookup_of_missing_pdf_is_not_found() {
    let server = MockServer::start().await;
    mount_head(&server, "gone.pdf", 404).await;
    mount_head(&server, "hidden.pdf", 403).await;
    let app = router_over(&server).await;

    app.get("/pdf/gone.pdf").await.assert_status_not_found();
    app.get("/pdf/hidden.pdf").await.assert_status_not_found();
}

#[tokio::test]
async fn lookup_of_stored_pdf_returns_its_url() {
    let server = MockServer::start().await;
    mount_head(&server, "here.pdf", 200).await;
    let app = router_over(&server).await;

    let response = app.get("/pdf/here.pdf").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "url": format!("{}/{BUCKET}/here.pdf", server.uri()) }));
}

#[tokio::test]
async fn storage_failures_do_not_leak_sdk_detail() {
    let server = MockServer::start().await;
    mount_head(&server, "odd.pdf", 400).await;
    let app = router_over(&server).await;

    let response = app.get("/pdf/odd.pdf").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "error": "Storage backend is unavailable" }));
}
