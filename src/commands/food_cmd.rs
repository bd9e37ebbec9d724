use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::context::AppContext;
use crate::food::PredictionOutcome;
use crate::providers::ImagePart;
use crate::scan::{run_scan, PathwayResult, ScanReport, ScanRequest};

pub async fn scan_file(
    ctx: &AppContext,
    path: &str,
    prompt: &str,
    use_gemini: bool,
    use_custom: bool,
) -> Result<ScanReport, String> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path, e))?;

    let request = ScanRequest {
        image: Some(ImagePart::new("application/octet-stream", data)),
        prompt: prompt.to_string(),
        use_gemini,
        use_custom,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(match (use_gemini, use_custom) {
        (true, true) => "Analyzing with Gemini and the custom model...",
        (true, false) => "Analyzing with Gemini...",
        _ => "Analyzing with the custom model...",
    });

    let result = run_scan(ctx, request).await;
    spinner.finish_and_clear();
    result.map_err(|e| e.to_string())
}

pub fn render_report(report: &ScanReport) -> String {
    let mut lines = Vec::new();

    if let Some(gemini) = &report.gemini {
        lines.push(format!("\n{}", "🔍 Gemini API Analysis".bold()));
        match gemini {
            PathwayResult::Ok(text) => lines.push(text.truecolor(255, 236, 179).to_string()),
            PathwayResult::Error(message) => lines.push(message.red().to_string()),
        }
    }

    if let Some(custom) = &report.custom {
        lines.push(format!("\n{}", "🧠 Custom Model Analysis".bold()));
        match custom {
            PathwayResult::Ok(PredictionOutcome::Found(result)) => {
                lines.push(format!("Predicted Food: {}", result.predicted_food.bright_yellow()));
                lines.push("Nutrition Information (per serving):".to_string());
                for (nutrient, amount) in result.nutrition.rows() {
                    lines.push(format!("  {:<15} {}", nutrient, amount.cyan()));
                }
            }
            PathwayResult::Ok(PredictionOutcome::NotFound { predicted_food, error }) => {
                lines.push(format!("Predicted Food: {}", predicted_food.bright_yellow()));
                lines.push(error.yellow().to_string());
            }
            PathwayResult::Error(message) => lines.push(message.red().to_string()),
        }
    }

    lines.push(format!(
        "\n✅ Analysis complete! ({} ms)",
        report.elapsed_ms.to_string().cyan()
    ));
    lines.join("\n")
}
