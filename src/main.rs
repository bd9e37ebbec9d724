use anyhow::{anyhow, Context};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use food_scan::api;
use food_scan::commands::CommandHandler;
use food_scan::config::AppConfig;
use food_scan::context::AppContext;
use log::info;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Identify dishes in food photos and look up their nutrition", long_about = None)]
struct Args {
    /// Google API key, overrides GOOGLE_API_KEY
    #[arg(short, long)]
    api_key: Option<String>,

    /// Serve the HTTP interface instead of the interactive prompt
    #[arg(long)]
    api: bool,

    #[arg(long, default_value = "3000")]
    port: u16,

    /// Path to the Food-101 ONNX model
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Path to the nutrition JSON table
    #[arg(long)]
    nutrition_path: Option<PathBuf>,

    /// Skip configuring the Gemini client
    #[arg(long)]
    no_gemini: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize colored output
    colored::control::set_override(true);

    // Load environment variables
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let ctx = AppContext::initialize(&config).context("Startup failed")?;

    if args.api {
        run_api_server(ctx, args.port, config.max_concurrent_scans).await
    } else {
        run_cli_mode(ctx).await
    }
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::from_env().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    if let Some(key) = &args.api_key {
        config.gemini.api_key = Some(key.clone());
    }
    if let Some(path) = &args.model_path {
        config.food.model_path = path.clone();
    }
    if let Some(path) = &args.nutrition_path {
        config.food.nutrition_path = path.clone();
    }
    if args.no_gemini {
        config.gemini_enabled = false;
    }

    Ok(config)
}

async fn run_cli_mode(ctx: AppContext) -> anyhow::Result<()> {
    println!("\n{}", "🍽️ Food Scan with Multiple Models".bold());
    let mut command_handler = CommandHandler::new(ctx);

    // Show initial help menu
    command_handler
        .handle_command("help")
        .await
        .map_err(|e| anyhow!(e))?;

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("🍴 ") {
            Ok(line) => {
                let input = line.trim();
                rl.add_history_entry(input).ok();

                if let Err(e) = command_handler.handle_command(input).await {
                    println!("{}", e.red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

async fn run_api_server(ctx: AppContext, port: u16, max_concurrent_scans: usize) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = api::create_api_with_limit(ctx, max_concurrent_scans);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
