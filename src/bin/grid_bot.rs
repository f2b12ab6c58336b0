//! Grid Basket Bot Binary
//!
//! Runs one dynamic grid basket per configured symbol against the paper
//! venue.
//!
//! ## Setup
//!
//! 1. Optionally create a `.env` file in the project root to override
//!    settings:
//!    ```
//!    RUST_LOG=debug
//!    APP__BASKET__SIZE_USD=25
//!    ```
//!
//! 2. Run the bot:
//!    ```bash
//!    cargo run --bin grid_bot -- --config config.toml
//!    ```

use std::env;

use grid_basket::runner::BotRunner;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Loaded before the logger exists; a missing file is fine
    let dotenv = dotenvy::dotenv();

    let args: Vec<String> = env::args().collect();
    let config_path = if args.len() > 2 && args[1] == "--config" {
        args[2].clone()
    } else {
        "config.toml".to_string()
    };

    let runner = BotRunner::new(&config_path)?;
    if let Ok(path) = dotenv {
        eprintln!("Loaded environment from: {}", path.display());
    }
    runner.run().await
}
