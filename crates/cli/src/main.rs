//! loadscope CLI entry point.

use clap::Parser;

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = loadscope_cli::Cli::parse();
    if let Err(e) = loadscope_cli::run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
