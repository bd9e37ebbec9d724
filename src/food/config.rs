use crate::config::{parse_var, Lookup};
use crate::food::classifier::TensorLayout;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FoodConfig {
    pub model_path: PathBuf,
    pub layout: TensorLayout,
    pub nutrition_path: PathBuf,
    /// Refuse to start when a classifier label has no nutrition record.
    pub strict_coverage: bool,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model/food101.onnx"),
            layout: TensorLayout::Nchw,
            nutrition_path: PathBuf::from("data/nutrition.json"),
            strict_coverage: true,
        }
    }
}

impl FoodConfig {
    pub fn from_lookup(lookup: Lookup) -> Result<Self, String> {
        let defaults = Self::default();

        let strict_coverage = match lookup("NUTRITION_STRICT_COVERAGE") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| format!("NUTRITION_STRICT_COVERAGE must be true or false, got '{}'", value))?,
            None => defaults.strict_coverage,
        };

        Ok(Self {
            model_path: lookup("CLASSIFIER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            layout: parse_var(lookup, "CLASSIFIER_LAYOUT", defaults.layout)?,
            nutrition_path: lookup("NUTRITION_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.nutrition_path),
            strict_coverage,
        })
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
