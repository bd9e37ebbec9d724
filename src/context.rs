use log::{info, warn};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{AppError, FoodError};
use crate::food::labels;
use crate::food::{NutritionPipeline, NutritionTable, OnnxClassifier};
use crate::providers::{GeminiProvider, VisionProvider};

/// Everything a scan needs, built once before the first request and never
/// mutated afterwards.
#[derive(Clone)]
pub struct AppContext {
    pub pipeline: NutritionPipeline,
    pub vision: Option<Arc<dyn VisionProvider>>,
    pub max_upload_bytes: usize,
}

impl AppContext {
    pub fn new(
        pipeline: NutritionPipeline,
        vision: Option<Arc<dyn VisionProvider>>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            pipeline,
            vision,
            max_upload_bytes,
        }
    }

    /// Loads the nutrition table, the classifier and the hosted-model client.
    /// Any failure here names the dependency and is fatal for the session.
    pub fn initialize(config: &AppConfig) -> Result<Self, AppError> {
        let food = &config.food;

        let table = NutritionTable::load(&food.nutrition_path)
            .map_err(|e| AppError::init("nutrition table", e))?;
        check_coverage(&table, food.strict_coverage)?;

        let classifier = OnnxClassifier::load(&food.model_path, food.layout)
            .map_err(|e| AppError::init("classifier", e))?;

        let vision: Option<Arc<dyn VisionProvider>> = if config.gemini_enabled {
            let provider = GeminiProvider::new(&config.gemini)
                .map_err(|e| AppError::init("Gemini client", e))?;
            info!("Gemini client configured for model {}", provider.get_model_info());
            Some(Arc::new(provider))
        } else {
            warn!("Gemini pathway disabled by configuration");
            None
        };

        let pipeline = NutritionPipeline::new(Arc::new(classifier), Arc::new(table));
        Ok(Self::new(pipeline, vision, config.max_upload_bytes))
    }
}

fn check_coverage(table: &NutritionTable, strict: bool) -> Result<(), AppError> {
    let missing = table.missing_labels(labels::all_canonical());
    if missing.is_empty() {
        return Ok(());
    }
    let err = FoodError::MissingCoverage(missing);
    if strict {
        return Err(AppError::init("nutrition table", err));
    }
    warn!("{}; those dishes will report missing nutrition data", err);
    Ok(())
}
