//! `POST /api/ask`: multipart image + question in, answer + audio URL out

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use bytes::Bytes;
use seesay_core::Answer;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default)]
struct AskForm {
    question: Option<String>,
    image: Option<Bytes>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub audio: String,
}

pub async fn ask(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::internal(e.body_text()))?;
    let form = read_form(&mut multipart).await?;

    let image = form
        .image
        .ok_or_else(|| ApiError::internal("Missing form field 'image'"))?;
    // An absent question is asked as the empty string
    let question = form.question.unwrap_or_default();

    info!(
        "Ask request: {}-char question, {} byte image",
        question.chars().count(),
        image.len()
    );

    let service = state.service.clone();
    let answer = tokio::task::spawn_blocking(move || -> seesay_core::Result<Answer> {
        let image = seesay_core::decode_rgb(&image)?;
        service.answer(&image, &question)
    })
    .await??;

    Ok(Json(AskResponse {
        answer: answer.text,
        audio: answer.audio.url,
    }))
}

async fn read_form(multipart: &mut Multipart) -> Result<AskForm, ApiError> {
    let mut form = AskForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::internal(format!("Failed reading multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "question" => {
                let text = field.text().await.map_err(|e| {
                    ApiError::internal(format!("Failed reading multipart 'question' field: {}", e))
                })?;
                form.question = Some(text);
            }
            "image" => {
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::internal(format!("Failed reading multipart 'image' field: {}", e))
                })?;
                form.image = Some(bytes);
            }
            other => debug!("Ignoring form field '{}'", other),
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use seesay_core::{
        AudioStore, ModelInputs, ServerConfig, SpeechSynthesizer, VisionLanguageModel,
        VqaService, AUDIO_URL_PREFIX,
    };
    use serde_json::Value;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const BOUNDARY: &str = "seesay-test-boundary";

    /// Answers by counting pixels, remembering every question it was asked
    #[derive(Default)]
    struct CountingModel {
        questions: Mutex<Vec<String>>,
    }

    impl VisionLanguageModel for CountingModel {
        fn model_id(&self) -> &str {
            "test/counting-vqa"
        }

        fn preprocess(&self, image: &RgbImage, question: &str) -> seesay_core::Result<ModelInputs> {
            self.questions.lock().unwrap().push(question.to_string());
            Ok(ModelInputs {
                pixel_values: Vec::new(),
                image_height: image.height(),
                image_width: image.width(),
                input_ids: Vec::new(),
                attention_mask: Vec::new(),
            })
        }

        fn generate(&self, inputs: &ModelInputs) -> seesay_core::Result<Vec<u32>> {
            Ok(vec![inputs.image_width * inputs.image_height])
        }

        fn decode(&self, token_ids: &[u32]) -> seesay_core::Result<String> {
            Ok(format!("{} pixels", token_ids[0]))
        }
    }

    struct FakeSpeech;

    impl SpeechSynthesizer for FakeSpeech {
        fn synthesize(&self, text: &str) -> seesay_core::Result<Vec<u8>> {
            Ok(format!("ID3 {}", text).into_bytes())
        }
    }

    fn test_app(static_dir: &Path) -> (Router, Arc<CountingModel>) {
        test_app_with(static_dir, &ServerConfig::default())
    }

    fn test_app_with(static_dir: &Path, server: &ServerConfig) -> (Router, Arc<CountingModel>) {
        let model = Arc::new(CountingModel::default());
        let service = VqaService::new(
            model.clone(),
            Arc::new(FakeSpeech),
            AudioStore::new(static_dir.join("audio"), AUDIO_URL_PREFIX, 0),
        );
        let router = create_router(AppState::new(service), server, static_dir);
        (router, model)
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 10, 10])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn multipart(question: Option<&str>, image: Option<&[u8]>) -> Request<Body> {
        let mut body = Vec::new();
        if let Some(q) = question {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"question\"\r\n\r\n{}\r\n",
                    BOUNDARY, q
                )
                .as_bytes(),
            );
        }
        if let Some(img) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"photo.png\"\r\nContent-Type: image/png\r\n\r\n",
                    BOUNDARY
                )
                .as_bytes(),
            );
            body.extend_from_slice(img);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/ask")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn answers_with_text_and_served_audio() {
        let dir = tempfile::tempdir().unwrap();
        let (app, model) = test_app(dir.path());

        let (status, json) =
            send_json(&app, multipart(Some("how big is it?"), Some(&png(4, 3)[..]))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["answer"], "12 pixels");
        let audio = json["audio"].as_str().unwrap();
        assert!(audio.starts_with("/static/audio/"));
        assert!(audio.ends_with(".mp3"));
        assert_eq!(*model.questions.lock().unwrap(), vec!["how big is it?"]);

        let on_disk = dir.path().join(audio.trim_start_matches("/static/"));
        assert!(std::fs::metadata(&on_disk).unwrap().len() > 0);

        let get = Request::builder().uri(audio).body(Body::empty()).unwrap();
        let (status, served) = send(&app, get).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(served, b"ID3 12 pixels");
    }

    #[tokio::test]
    async fn missing_image_is_a_500() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let (status, json) = send_json(&app, multipart(Some("what is this?"), None)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!json["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_question_is_asked_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (app, model) = test_app(dir.path());

        let (status, json) = send_json(&app, multipart(None, Some(&png(2, 2)[..]))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["answer"], "4 pixels");
        assert_eq!(*model.questions.lock().unwrap(), vec![""]);
    }

    #[tokio::test]
    async fn non_image_upload_reports_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (app, model) = test_app(dir.path());

        let (status, json) =
            send_json(&app, multipart(Some("what?"), Some(&b"%PDF-1.4 not an image"[..]))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("decode"));
        assert!(model.questions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn identical_requests_give_identical_answers() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());
        let image = png(5, 5);

        let (_, first) = send_json(&app, multipart(Some("size?"), Some(&image[..]))).await;
        let (_, second) = send_json(&app, multipart(Some("size?"), Some(&image[..]))).await;

        assert_eq!(first["answer"], second["answer"]);
        assert_ne!(first["audio"], second["audio"]);
    }

    #[tokio::test]
    async fn upload_over_the_limit_is_a_500_with_error_json() {
        let dir = tempfile::tempdir().unwrap();
        let server = ServerConfig {
            upload_limit_bytes: 1024,
            ..Default::default()
        };
        let (app, model) = test_app_with(dir.path(), &server);
        let oversized = vec![0u8; 8 * 1024];

        let (status, json) = send_json(&app, multipart(Some("big?"), Some(&oversized[..]))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("multipart"));
        assert!(model.questions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_multipart_body_is_a_500_with_error_json() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let request = Request::builder()
            .method("POST")
            .uri("/api/ask")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"question": "hi"}"#))
            .unwrap();
        let (status, json) = send_json(&app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn cross_origin_requests_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let mut request = multipart(Some("size?"), Some(&png(1, 1)[..]));
        request
            .headers_mut()
            .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn health_reports_model() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send_json(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "test/counting-vqa");
    }
}
