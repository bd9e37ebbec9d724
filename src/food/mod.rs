pub mod analysis;
pub mod classifier;
pub mod config;
pub mod labels;
pub mod table;

pub use analysis::{NutritionPipeline, PredictionOutcome, PredictionResult};
pub use classifier::{FoodClassifier, OnnxClassifier, TensorLayout};
pub use config::FoodConfig;
pub use table::{NutritionFacts, NutritionRecord, NutritionTable};
