use clap::Parser;

use actuary_job_board::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // `serve` installs its own stderr + board.log subscriber
    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    }

    if let Err(e) = cli::dispatch(&cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
