use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::config::DEFAULT_MAX_CONCURRENT_SCANS;
use crate::context::AppContext;
use crate::error::AppError;
use crate::food::config::parse_bool;
use crate::food::labels;
use crate::providers::ImagePart;
use crate::scan::{run_scan, ScanReport, ScanRequest};

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Clone)]
pub struct AppState {
    ctx: Arc<AppContext>,
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    gemini_enabled: bool,
    nutrition_records: usize,
}

#[derive(Serialize)]
struct LabelsResponse {
    labels: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NoInput | AppError::NoMethodSelected | AppError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Analysis { .. } => StatusCode::BAD_GATEWAY,
            AppError::Initialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("Scan request rejected: {}", self);
        (status, Json(ApiResponse { status: self.to_string() })).into_response()
    }
}

fn multipart_error(e: MultipartError) -> Response {
    warn!("Failed to read multipart upload: {}", e);
    (e.status(), Json(ApiResponse { status: e.body_text() })).into_response()
}

/// Create and configure the API router
pub fn create_api(ctx: AppContext) -> Router {
    create_api_with_limit(ctx, DEFAULT_MAX_CONCURRENT_SCANS)
}

/// At most `limit` scans run at once; further scans wait for a slot. The page,
/// health and label routes are never limited.
pub fn create_api_with_limit(ctx: AppContext, limit: usize) -> Router {
    let max_upload_bytes = ctx.max_upload_bytes;
    let state = AppState { ctx: Arc::new(ctx) };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/labels", get(list_labels))
        .route(
            "/scan",
            post(scan_handler).layer(ConcurrencyLimitLayer::new(limit.max(1))),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Server is running and healthy".to_string(),
        gemini_enabled: state.ctx.vision.is_some(),
        nutrition_records: state.ctx.pipeline.table().len(),
    })
}

async fn list_labels() -> Json<LabelsResponse> {
    Json(LabelsResponse {
        labels: labels::all_canonical(),
    })
}

async fn scan_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let request = match read_scan_request(multipart).await {
        Ok(request) => request,
        Err(response) => return response,
    };

    match run_scan(&state.ctx, request).await {
        Ok(report) => {
            log_report(&report);
            Json(report).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Fields: `image` (file), `prompt`, `use_gemini`, `use_custom`. Absent
/// toggles keep their defaults.
async fn read_scan_request(mut multipart: Multipart) -> Result<ScanRequest, Response> {
    let mut request = ScanRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                if !data.is_empty() {
                    request.image = Some(ImagePart::new(mime_type, data.to_vec()));
                }
            }
            "prompt" => {
                request.prompt = field.text().await.map_err(multipart_error)?;
            }
            "use_gemini" | "use_custom" => {
                let value = field.text().await.map_err(multipart_error)?;
                let enabled = parse_bool(&value).ok_or_else(|| {
                    AppError::InvalidRequest(format!("{} must be true or false", name)).into_response()
                })?;
                if name == "use_gemini" {
                    request.use_gemini = enabled;
                } else {
                    request.use_custom = enabled;
                }
            }
            _ => {}
        }
    }

    Ok(request)
}

fn log_report(report: &ScanReport) {
    info!(
        "Scan {} finished in {} ms (gemini: {}, custom: {})",
        report.id,
        report.elapsed_ms,
        report.gemini.as_ref().map_or("skipped", |r| if r.is_ok() { "ok" } else { "error" }),
        report.custom.as_ref().map_or("skipped", |r| if r.is_ok() { "ok" } else { "error" }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{context, pizza_context, MockVision};
    use crate::error::ProviderError;
    use crate::food::analysis::nutrition::mock::FixedClassifier;
    use crate::providers::VisionProvider;
    use crate::scan::png_bytes;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    const BOUNDARY: &str = "food-scan-test-boundary";

    enum Field<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, Vec<u8>),
    }

    fn multipart_body(fields: Vec<Field>) -> Vec<u8> {
        let mut body = Vec::new();
        for field in fields {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match field {
                Field::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n", name, value)
                            .as_bytes(),
                    );
                }
                Field::File(name, mime, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"food.png\"\r\nContent-Type: {}\r\n\r\n",
                            name, mime
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&data);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn scan_request(fields: Vec<Field>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/scan")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields)))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn router() -> (Router, Arc<MockVision>) {
        let vision = Arc::new(MockVision::replying("Looks like pizza"));
        let (ctx, _) = pizza_context(vision.clone());
        (create_api(ctx), vision)
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = router();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["geminiEnabled"], true);
        assert_eq!(body["nutritionRecords"], 2);
    }

    #[tokio::test]
    async fn test_labels() {
        let (router, _) = router();
        let request = Request::builder().uri("/labels").body(Body::empty()).unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["labels"].as_array().unwrap().len(), 101);
        assert_eq!(body["labels"][19], "Chicken Quesadilla");
    }

    #[tokio::test]
    async fn test_index_page() {
        let (router, _) = router();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Food Scan"));
    }

    #[tokio::test]
    async fn test_scan_both_pathways() {
        let (router, vision) = router();
        let request = scan_request(vec![
            Field::File("image", "image/png", png_bytes(64, 64)),
            Field::Text("prompt", "is this healthy?"),
            Field::Text("use_gemini", "true"),
            Field::Text("use_custom", "on"),
        ]);

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gemini"]["ok"], "Looks like pizza [is this healthy?]");
        assert_eq!(body["custom"]["ok"]["status"], "found");
        assert_eq!(body["custom"]["ok"]["predictedFood"], "Pizza");
        assert_eq!(body["custom"]["ok"]["nutrition"]["Protein"], "12g");
        assert_eq!(vision.calls(), 1);
    }

    #[tokio::test]
    async fn test_scan_without_image() {
        let (router, vision) = router();
        let request = scan_request(vec![Field::Text("prompt", "hello")]);
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "Please upload an image first");
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn test_scan_without_method() {
        let (router, vision) = router();
        let request = scan_request(vec![
            Field::File("image", "image/png", png_bytes(8, 8)),
            Field::Text("use_gemini", "false"),
            Field::Text("use_custom", "false"),
        ]);
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "Please select at least one analysis method");
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn test_scan_rejects_bad_toggle() {
        let (router, _) = router();
        let request = scan_request(vec![
            Field::File("image", "image/png", png_bytes(8, 8)),
            Field::Text("use_custom", "sometimes"),
        ]);
        let (status, _) = send(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scan_rejects_oversized_upload() {
        let vision = Arc::new(MockVision::replying("pizza"));
        let (mut ctx, _) = pizza_context(vision);
        ctx.max_upload_bytes = 1024;
        let router = create_api(ctx);
        let request = scan_request(vec![Field::File("image", "image/png", vec![0u8; 4096])]);
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    /// Holds every analysis until permits are added to `gate`.
    struct GatedVision {
        gate: Semaphore,
        entered: AtomicUsize,
    }

    impl GatedVision {
        fn entered(&self) -> usize {
            self.entered.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionProvider for GatedVision {
        async fn analyze(
            &self,
            _instruction: &str,
            _image: &ImagePart,
            _prompt: &str,
        ) -> Result<String, ProviderError> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ProviderError::Api(e.to_string()))?;
            Ok("pizza".to_string())
        }

        fn get_model_info(&self) -> String {
            "gated".to_string()
        }
    }

    #[tokio::test]
    async fn test_scans_beyond_the_limit_wait_for_a_slot() {
        let vision = Arc::new(GatedVision {
            gate: Semaphore::new(0),
            entered: AtomicUsize::new(0),
        });
        let ctx = context(
            Arc::new(FixedClassifier::peaking_at("pizza")),
            Some(vision.clone() as Arc<dyn VisionProvider>),
        );
        let router = create_api_with_limit(ctx, 1);
        let gemini_scan = || {
            scan_request(vec![
                Field::File("image", "image/png", png_bytes(8, 8)),
                Field::Text("use_gemini", "true"),
            ])
        };

        let first = tokio::spawn(router.clone().oneshot(gemini_scan()));
        tokio::time::timeout(Duration::from_secs(5), async {
            while vision.entered() < 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let second = tokio::spawn(router.clone().oneshot(gemini_scan()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(vision.entered(), 1);

        // Other routes answer while the scan slot is taken.
        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = tokio::time::timeout(Duration::from_secs(1), router.clone().oneshot(health))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        vision.gate.add_permits(2);
        assert_eq!(first.await.unwrap().unwrap().status(), StatusCode::OK);
        assert_eq!(second.await.unwrap().unwrap().status(), StatusCode::OK);
        assert_eq!(vision.entered(), 2);
    }
}
