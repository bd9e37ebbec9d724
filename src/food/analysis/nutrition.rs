use crate::error::FoodError;
use crate::food::classifier::{prepare_input, FoodClassifier};
use crate::food::labels;
use crate::food::table::{NutritionFacts, NutritionTable};
use image::DynamicImage;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;

pub const NOT_FOUND_MESSAGE: &str = "Nutrition data not found for this dish";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub predicted_food: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<String>,
    pub nutrition: NutritionFacts,
}

/// What the classifier pathway tells the user. A dish missing from the table
/// is an expected answer, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    Found(PredictionResult),
    NotFound {
        #[serde(rename = "predictedFood")]
        predicted_food: String,
        error: String,
    },
}

impl PredictionOutcome {
    pub fn predicted_food(&self) -> &str {
        match self {
            PredictionOutcome::Found(result) => &result.predicted_food,
            PredictionOutcome::NotFound { predicted_food, .. } => predicted_food,
        }
    }
}

/// Index and value of the highest score. Ties go to the lowest index and NaN
/// scores never win.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .fold(None, |best, (index, score)| match best {
            Some((_, best_score)) if score <= best_score => best,
            _ => Some((index, score)),
        })
}

/// Classifier -> label -> nutrition table, built once at startup and shared
/// read-only across requests.
#[derive(Clone)]
pub struct NutritionPipeline {
    classifier: Arc<dyn FoodClassifier>,
    table: Arc<NutritionTable>,
}

impl NutritionPipeline {
    pub fn new(classifier: Arc<dyn FoodClassifier>, table: Arc<NutritionTable>) -> Self {
        Self { classifier, table }
    }

    pub fn table(&self) -> &NutritionTable {
        &self.table
    }

    pub fn resolve_prediction(&self, image: &DynamicImage) -> Result<PredictionOutcome, FoodError> {
        let input = prepare_input(image, self.classifier.input_size());
        let scores = self.classifier.classify(&input)?;
        if scores.len() != labels::NUM_CLASSES {
            return Err(FoodError::OutputShape {
                expected: labels::NUM_CLASSES,
                actual: scores.len(),
            });
        }
        let (class_index, confidence) = argmax(&scores).ok_or(FoodError::EmptyScores)?;
        let predicted_food = labels::resolve(class_index)?;
        debug!(
            "Predicted class {} ({}) with score {:.4}",
            class_index, predicted_food, confidence
        );
        Ok(self.lookup(predicted_food, confidence))
    }

    pub fn lookup(&self, predicted_food: String, confidence: f32) -> PredictionOutcome {
        match self.table.get(&predicted_food) {
            Some(record) => PredictionOutcome::Found(PredictionResult {
                nutrition: NutritionFacts::from_daily_value(&record.daily_value),
                calories: record.calories.clone(),
                predicted_food,
                confidence,
            }),
            None => {
                info!("No nutrition record for predicted dish '{}'", predicted_food);
                PredictionOutcome::NotFound {
                    predicted_food,
                    error: NOT_FOUND_MESSAGE.to_string(),
                }
            }
        }
    }
}
