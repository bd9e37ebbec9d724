pub mod api;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod food;
pub mod providers;
pub mod scan;

// Re-export commonly used items
pub use config::AppConfig;
pub use context::AppContext;
pub use error::{AppError, FoodError, ProviderError};
pub use scan::{run_scan, ScanReport, ScanRequest};
