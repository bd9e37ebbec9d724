pub mod nutrition;

pub use nutrition::{argmax, NutritionPipeline, PredictionOutcome, PredictionResult, NOT_FOUND_MESSAGE};
