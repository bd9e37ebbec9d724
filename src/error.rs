use thiserror::Error;

#[derive(Error, Debug)]
pub enum FoodError {
    #[error("Failed to load classifier model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("Classifier inference failed: {0}")]
    Inference(String),
    #[error("Classifier returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
    #[error("Classifier returned an empty score vector")]
    EmptyScores,
    #[error("Class index {0} is outside the label table")]
    LabelOutOfRange(usize),
    #[error("Failed to read nutrition data: {0}")]
    NutritionIo(#[from] std::io::Error),
    #[error("Failed to parse nutrition data: {0}")]
    NutritionParse(#[from] serde_json::Error),
    #[error("Duplicate nutrition record for '{0}'")]
    DuplicateRecord(String),
    #[error("Nutrition record '{name}' has an empty {field} value")]
    BlankField { name: String, field: &'static str },
    #[error("Nutrition data has no record for {} classifier label(s): {}", .0.len(), .0.join(", "))]
    MissingCoverage(Vec<String>),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0} environment variable not set")]
    MissingApiKey(&'static str),
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API request failed: Status {status}, Body: {body}")]
    Status { status: u16, body: String },
    #[error("API returned error: {0}")]
    Api(String),
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors surfaced to whoever drives a scan: the web page, the JSON API or the CLI.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to initialize {dependency}: {reason}")]
    Initialization { dependency: &'static str, reason: String },
    #[error("Please upload an image first")]
    NoInput,
    #[error("Please select at least one analysis method")]
    NoMethodSelected,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Error analyzing image with {pathway}: {reason}")]
    Analysis { pathway: &'static str, reason: String },
}

impl AppError {
    pub fn init(dependency: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Initialization {
            dependency,
            reason: err.to_string(),
        }
    }

    pub fn analysis(pathway: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Analysis {
            pathway,
            reason: err.to_string(),
        }
    }
}
