use colored::Colorize;

use crate::context::AppContext;
use crate::food::config::parse_bool;
use crate::food::labels;

mod food_cmd;
mod system;

pub use food_cmd::render_report;

/// Interactive session state: the toggles and prompt persist between scans.
pub struct CommandHandler {
    ctx: AppContext,
    use_gemini: bool,
    use_custom: bool,
    prompt: String,
}

impl CommandHandler {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            use_gemini: ctx.vision.is_some(),
            use_custom: false,
            prompt: String::new(),
            ctx,
        }
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<(), String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }

        let (command, rest) = match input.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (input, ""),
        };

        match command.to_lowercase().as_str() {
            "help" | "exit" | "quit" => system::handle_command(command),
            "status" => {
                self.print_status();
                Ok(())
            }
            "labels" => {
                for (index, name) in labels::all_canonical().iter().enumerate() {
                    println!("  {:>3}  {}", index, name);
                }
                Ok(())
            }
            "gemini" => {
                self.use_gemini = parse_toggle("gemini", rest)?;
                self.print_status();
                Ok(())
            }
            "custom" => {
                self.use_custom = parse_toggle("custom", rest)?;
                self.print_status();
                Ok(())
            }
            "prompt" => {
                self.prompt = rest.to_string();
                if self.prompt.is_empty() {
                    println!("Prompt cleared.");
                } else {
                    println!("Prompt set to: {}", self.prompt.cyan());
                }
                Ok(())
            }
            "scan" => {
                if rest.is_empty() {
                    println!("Please specify an image to scan.");
                    println!("Usage: scan <path to jpg or png>");
                    return Ok(());
                }
                let report = food_cmd::scan_file(
                    &self.ctx,
                    rest,
                    &self.prompt,
                    self.use_gemini,
                    self.use_custom,
                )
                .await?;
                println!("{}", render_report(&report));
                Ok(())
            }
            _ => Err(format!(
                "Unknown command: {}. Type 'help' for available commands.",
                command
            )),
        }
    }

    fn print_status(&self) {
        let on_off = |enabled: bool| if enabled { "on".green() } else { "off".red() };
        println!("\n⚙️ Analysis methods:");
        println!("  Gemini API    - {}", on_off(self.use_gemini));
        println!("  Custom Model  - {}", on_off(self.use_custom));
        if !self.prompt.is_empty() {
            println!("  Prompt        - {}", self.prompt.cyan());
        }
        println!();
    }
}

fn parse_toggle(name: &str, value: &str) -> Result<bool, String> {
    parse_bool(value).ok_or_else(|| format!("Usage: {} on|off", name))
}
