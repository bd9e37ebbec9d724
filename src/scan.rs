//! One user action: an uploaded image run through whichever analysis
//! pathways were switched on. The two pathways never affect each other; a
//! failure in one is reported next to the other's result.

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat};
use log::{error, info};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

use crate::context::AppContext;
use crate::error::AppError;
use crate::food::PredictionOutcome;
use crate::providers::ImagePart;

pub const GEMINI_PATHWAY: &str = "Gemini";
pub const CUSTOM_PATHWAY: &str = "custom model";

pub const ANALYSIS_INSTRUCTION: &str = "You have to identify different types of food in images. \
The system should accurately detect and label various foods displayed in the image, providing the name \
of the food and its location within the image (e.g., bottom left, right corner, etc.). Additionally, \
the system should extract nutritional information and categorize the type of food (e.g., fruits, vegetables, grains, etc.) \
based on the detected items. The output should include a comprehensive report or display showing the \
identified foods, their positions, names, and corresponding nutritional details.";

#[derive(Debug, Clone, Validate)]
pub struct ScanRequest {
    pub image: Option<ImagePart>,
    #[validate(length(max = 2000))]
    pub prompt: String,
    pub use_gemini: bool,
    pub use_custom: bool,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            image: None,
            prompt: String::new(),
            use_gemini: true,
            use_custom: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathwayResult<T> {
    Ok(T),
    Error(String),
}

impl<T> PathwayResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, PathwayResult::Ok(_))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<PathwayResult<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<PathwayResult<PredictionOutcome>>,
}

/// Only JPEG and PNG uploads are analyzed. The declared mime type is replaced
/// by the one sniffed from the bytes.
pub fn decode_upload(upload: &ImagePart) -> Result<(ImagePart, DynamicImage), AppError> {
    let format = image::guess_format(&upload.data)
        .map_err(|_| AppError::InvalidRequest("upload is not a recognized image".to_string()))?;
    let mime_type = match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        other => {
            return Err(AppError::InvalidRequest(format!(
                "{:?} images are not supported, use jpg, jpeg or png",
                other
            )))
        }
    };
    let decoded = image::load_from_memory_with_format(&upload.data, format)
        .map_err(|e| AppError::InvalidRequest(format!("could not read image: {}", e)))?;
    Ok((ImagePart::new(mime_type, upload.data.clone()), decoded))
}

pub async fn run_scan(ctx: &AppContext, request: ScanRequest) -> Result<ScanReport, AppError> {
    let upload = match &request.image {
        Some(upload) if !upload.data.is_empty() => upload,
        _ => return Err(AppError::NoInput),
    };
    if !(request.use_gemini || request.use_custom) {
        return Err(AppError::NoMethodSelected);
    }
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let started = Instant::now();
    let (image, decoded) = decode_upload(upload)?;
    info!(
        "Scanning {} byte {} upload (gemini: {}, custom: {})",
        image.data.len(),
        image.mime_type,
        request.use_gemini,
        request.use_custom
    );

    let gemini = async {
        if !request.use_gemini {
            return None;
        }
        Some(run_gemini(ctx, &image, &request.prompt).await)
    };
    let custom = async {
        if !request.use_custom {
            return None;
        }
        Some(run_custom(ctx, decoded).await)
    };
    let (gemini, custom) = tokio::join!(gemini, custom);

    Ok(ScanReport {
        id: Uuid::new_v4(),
        analyzed_at: Utc::now(),
        elapsed_ms: started.elapsed().as_millis() as u64,
        gemini,
        custom,
    })
}

async fn run_gemini(ctx: &AppContext, image: &ImagePart, prompt: &str) -> PathwayResult<String> {
    let Some(vision) = &ctx.vision else {
        return pathway_error(GEMINI_PATHWAY, "hosted model is disabled");
    };
    match vision.analyze(ANALYSIS_INSTRUCTION, image, prompt).await {
        Ok(text) => PathwayResult::Ok(text),
        Err(e) => pathway_error(GEMINI_PATHWAY, e),
    }
}

async fn run_custom(ctx: &AppContext, image: DynamicImage) -> PathwayResult<PredictionOutcome> {
    let pipeline = ctx.pipeline.clone();
    match tokio::task::spawn_blocking(move || pipeline.resolve_prediction(&image)).await {
        Ok(Ok(outcome)) => PathwayResult::Ok(outcome),
        Ok(Err(e)) => pathway_error(CUSTOM_PATHWAY, e),
        Err(e) => pathway_error(CUSTOM_PATHWAY, e),
    }
}

fn pathway_error<T>(pathway: &'static str, err: impl std::fmt::Display) -> PathwayResult<T> {
    let err = AppError::analysis(pathway, err);
    error!("{}", err);
    PathwayResult::Error(err.to_string())
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageOutputFormat::Png)
}

#[cfg(test)]
pub(crate) fn encode(width: u32, height: u32, format: image::ImageOutputFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([180, 90, 40])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}
