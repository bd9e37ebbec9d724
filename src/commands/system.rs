pub fn handle_command(input: &str) -> Result<(), String> {
    match input.to_lowercase().as_str() {
        "help" => {
            println!("\n🍎 Food Scan Commands:");
            println!("  scan <image>      - Analyze a jpg/png photo of food");
            println!("  prompt <text>     - Extra question sent to Gemini with each scan");
            println!("  prompt            - Clear the prompt");
            println!();

            println!("⚙️ Method Commands:");
            println!("  gemini on|off     - Toggle the Gemini API analysis");
            println!("  custom on|off     - Toggle the local classifier + nutrition table");
            println!("  status            - Show which methods are enabled");
            println!("  labels            - List the dishes the classifier knows");
            println!();

            println!("🛠️ System Commands:");
            println!("  help  - Show this help menu");
            println!("  exit  - Exit the program");
            Ok(())
        }
        "exit" | "quit" => {
            println!("👋 Goodbye!");
            std::process::exit(0);
        }
        _ => Err("Unknown system command. Type 'help' for available commands.".to_string()),
    }
}
