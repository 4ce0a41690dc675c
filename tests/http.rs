//! HTTP-level tests: the real router over fake converter/rasteriser/generator
//! backends and a local store in a temp dir.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use slide_relay::{
    server, GenerationRequest, Generated, LocalStore, PresentationConverter, RasterOutput,
    RelayError, RenderedSlide, ServiceConfig, SlideError, SlideRasteriser, SlideService,
    TextGenerator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct FakeConverter;

#[async_trait]
impl PresentationConverter for FakeConverter {
    async fn to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, RelayError> {
        let stem = input.file_stem().unwrap().to_string_lossy().into_owned();
        let pdf = out_dir.join(format!("{stem}.pdf"));
        tokio::fs::write(&pdf, b"%PDF-1.7\n%fake\n").await.unwrap();
        Ok(pdf)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeRasteriser {
    slides: usize,
    failing: Vec<usize>,
}

#[async_trait]
impl SlideRasteriser for FakeRasteriser {
    async fn rasterise(&self, _pdf: &Path) -> Result<RasterOutput, RelayError> {
        let mut out = RasterOutput::default();
        for n in 1..=self.slides {
            if self.failing.contains(&n) {
                out.errors.push(SlideError::RenderFailed {
                    slide: n,
                    detail: "bad page".into(),
                });
            } else {
                out.slides.push(RenderedSlide {
                    number: n,
                    bytes: vec![0xFF, 0xD8, 0xFF, n as u8],
                    content_type: "image/jpeg".into(),
                });
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct CannedGenerator(String);

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<Generated, RelayError> {
        Ok(Generated {
            text: self.0.clone(),
            ..Default::default()
        })
    }

    fn describe(&self) -> String {
        "canned".into()
    }
}

async fn service(dir: &TempDir, slides: usize, failing: Vec<usize>) -> SlideService {
    let config = ServiceConfig::builder()
        .work_dir(dir.path().join("work"))
        .max_upload_bytes(64 * 1024)
        .build()
        .unwrap();
    let store = LocalStore::new(dir.path().join("store"), "http://relay.test")
        .await
        .unwrap();
    SlideService::new(
        config,
        Arc::new(FakeConverter),
        Arc::new(FakeRasteriser { slides, failing }),
        Arc::new(store),
    )
}

fn server_for(service: SlideService) -> TestServer {
    TestServer::new(server::router(service)).unwrap()
}

fn pptx_form(filename: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(b"PK\x03\x04 fake pptx".to_vec()).file_name(filename),
    )
}

#[tokio::test]
async fn upload_returns_folder_pdf_and_slide_urls() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 3, vec![]).await);

    let response = server.post("/upload").multipart(pptx_form("Lecture 1.pptx")).await;
    response.assert_status_ok();

    let body: Value = response.json();
    let folder = body["folder"].as_str().unwrap().to_string();
    assert_eq!(body["pdf"], json!(format!("http://relay.test/files/{folder}.pdf")));

    let slides = body["slides"].as_array().unwrap();
    assert_eq!(slides.len(), 3);
    assert_eq!(
        slides[0],
        json!(format!("http://relay.test/files/{folder}/slide_{folder}_1.jpg"))
    );
    assert!(dir.path().join("store").join(&folder).join(format!("slide_{folder}_3.jpg")).is_file());
}

#[tokio::test]
async fn upload_skips_failed_slides() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 4, vec![1, 3]).await);

    let body: Value = server.post("/upload").multipart(pptx_form("deck.pptx")).await.json();
    let slides = body["slides"].as_array().unwrap();
    assert_eq!(slides.len(), 2);
    assert!(slides[0].as_str().unwrap().ends_with("_2.jpg"));
    assert!(slides[1].as_str().unwrap().ends_with("_4.jpg"));
}

#[tokio::test]
async fn upload_with_every_slide_failing_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 2, vec![1, 2]).await);

    let response = server.post("/upload").multipart(pptx_form("deck.pptx")).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "No images were generated from the PDF.");
}

#[tokio::test]
async fn upload_without_file_part_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 1, vec![]).await);

    let form = MultipartForm::new().add_text("note", "no file here");
    let response = server.post("/upload").multipart(form).await;
    response.assert_status_bad_request();
    response.assert_json(&json!({ "error": "No file part" }));
}

#[tokio::test]
async fn upload_without_filename_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 1, vec![]).await);

    let form = MultipartForm::new().add_part("file", Part::bytes(b"PK".to_vec()));
    let response = server.post("/upload").multipart(form).await;
    response.assert_status_bad_request();
    response.assert_json(&json!({ "error": "No selected file" }));
}

#[tokio::test]
async fn upload_with_wrong_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 1, vec![]).await);

    let response = server.post("/upload").multipart(pptx_form("notes.docx")).await;
    response.assert_status_bad_request();
    response.assert_json(&json!({ "error": "Invalid file type. Only .pptx allowed" }));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 1, vec![]).await);

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(vec![0u8; 65 * 1024]).file_name("big.pptx"),
    );
    let response = server.post("/upload").multipart(form).await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn stored_objects_can_be_located_and_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 2, vec![]).await);

    let body: Value = server.post("/upload").multipart(pptx_form("deck.pptx")).await.json();
    let folder = body["folder"].as_str().unwrap();

    let slide = server
        .get(&format!("/slides/{folder}/slide_{folder}_2.jpg"))
        .await;
    slide.assert_status_ok();
    slide.assert_json(&json!({ "url": body["slides"][1] }));

    let pdf = server.get(&format!("/pdf/{folder}.pdf")).await;
    pdf.assert_status_ok();
    pdf.assert_json(&json!({ "url": body["pdf"] }));

    let file = server.get(&format!("/files/{folder}/slide_{folder}_1.jpg")).await;
    file.assert_status_ok();
    assert_eq!(file.as_bytes().as_ref(), &[0xFF, 0xD8, 0xFF, 1]);

    let pdf_bytes = server.get(&format!("/files/{folder}.pdf")).await;
    assert!(pdf_bytes.as_bytes().starts_with(b"%PDF"));
}

#[tokio::test]
async fn lookups_of_missing_or_malformed_keys() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 1, vec![]).await);
    let folder = uuid::Uuid::new_v4().to_string();

    server
        .get(&format!("/slides/{folder}/slide_{folder}_1.jpg"))
        .await
        .assert_status_not_found();
    server
        .get("/pdf/missing.pdf")
        .await
        .assert_status_not_found();
    server
        .get("/slides/not-a-folder/slide_1.jpg")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn quiz_without_generator_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 1, vec![]).await);

    let response = server
        .post("/trans_quiz/get_questions")
        .json(&json!({ "transcript": "Photosynthesis converts light to sugar." }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn quiz_returns_parsed_questions() {
    let dir = tempfile::tempdir().unwrap();
    let answer = r#"Here you go:
```json
{"questions": [{"question": "What does photosynthesis produce?", "options": ["Sugar", "Salt"], "answer": "Sugar"}]}
```"#;
    let svc = service(&dir, 1, vec![])
        .await
        .with_generator(Arc::new(CannedGenerator(answer.into())));
    let server = server_for(svc);

    let response = server
        .post("/trans_quiz/get_questions")
        .json(&json!({ "transcript": "Photosynthesis converts light to sugar." }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["questions"][0]["answer"], "Sugar");
    assert_eq!(body["questions"][0]["options"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn quiz_rejects_malformed_body() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 1, vec![]).await);

    server
        .post("/trans_quiz/get_questions")
        .json(&json!({ "text": "wrong field" }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn screenshot_is_stored_and_transcribed() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir, 1, vec![])
        .await
        .with_generator(Arc::new(CannedGenerator("Cell membrane\n\n\n\nNucleus  ".into())));
    let server = server_for(svc);

    let form = MultipartForm::new()
        .add_part("file", Part::bytes(b"\x89PNG\r\n".to_vec()).file_name("board.png"))
        .add_text("prompt", "List the labels.");
    let response = server.post("/screenshot").multipart(form).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["text"], "Cell membrane\n\nNucleus");
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("http://relay.test/files/screenshots/"));

    let key = url.trim_start_matches("http://relay.test/files/");
    server.get(&format!("/files/{key}")).await.assert_status_ok();
}

#[tokio::test]
async fn health_reports_backends() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_for(service(&dir, 1, vec![]).await);

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_json(&json!({
        "status": "ok",
        "storage": "local",
        "rasteriser": "fake",
        "generation": false,
    }));
}
