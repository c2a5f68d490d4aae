pub mod jobs;
pub mod scrape;

use std::path::Path;

use clap::{Parser, Subcommand};
use serde_json::Value;

/// Actuarial Job Board - scrape, dedupe and serve actuarial job postings
#[derive(Parser, Debug)]
#[command(
    name = "ajb",
    version,
    about = "Actuarial Job Board - scrape, dedupe and serve actuarial job postings"
)]
pub struct Cli {
    /// Server host
    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Server port [default: 5000]; for `serve`, overrides the config
    #[arg(short = 'p', long, global = true)]
    pub port: Option<u16>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the job board server in the foreground
    Serve {
        /// Path to configuration file
        #[arg(short = 'c', long = "config")]
        config: Option<String>,

        /// Data directory path
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },

    /// Control the ActuaryList scraper
    Scrape {
        #[command(subcommand)]
        action: ScrapeAction,
    },

    /// List stored job postings
    List {
        /// Case-insensitive search over title, company and description
        #[arg(short = 's', long)]
        search: Option<String>,

        /// Job type (e.g. Full-time, Internship)
        #[arg(long = "job-type")]
        job_type: Option<String>,

        /// Location substring
        #[arg(long)]
        location: Option<String>,

        /// Experience level (e.g. Entry-Level)
        #[arg(long = "experience-level")]
        experience_level: Option<String>,

        /// Only remote-friendly postings
        #[arg(long)]
        remote: bool,

        /// Comma-separated tags; every tag must match
        #[arg(long)]
        tags: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScrapeAction {
    /// Start a scrape run
    Start {
        /// Upper bound on postings to process
        #[arg(short = 'n', long = "max-jobs")]
        max_jobs: Option<u32>,

        /// Ask the source for a visible browser session
        #[arg(long = "no-headless")]
        no_headless: bool,

        /// Poll progress until the run finishes
        #[arg(short = 'f', long)]
        follow: bool,
    },

    /// Request cancellation of the running scrape
    Stop,

    /// Show the current scrape status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub const DEFAULT_PORT: u16 = 5000;

impl Cli {
    /// Port the client commands talk to.
    pub fn client_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Build the base URL for the board HTTP API.
pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Format a connection error message for when the server is not reachable.
pub fn connection_error_message(host: &str, port: u16) -> String {
    format!(
        "Could not connect to the job board at {}:{}. Is it running? (try: ajb serve)",
        host, port
    )
}

/// Map a reqwest error to a user-facing error.
pub(crate) fn handle_request_error(err: reqwest::Error, host: &str, port: u16) -> anyhow::Error {
    if err.is_connect() || err.is_timeout() {
        anyhow::anyhow!("{}", connection_error_message(host, port))
    } else {
        anyhow::anyhow!("Request failed: {}", err)
    }
}

/// Pull the `message` out of an `{error, message}` body.
pub(crate) fn api_error_message(body: &Value) -> String {
    body["message"]
        .as_str()
        .unwrap_or("Unknown error")
        .to_string()
}

/// Dispatch the CLI command to the appropriate handler.
pub async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    let port = cli.client_port();
    match &cli.command {
        Some(Commands::Serve { config, data_dir }) => {
            crate::daemon::run_server(
                config.as_deref().map(Path::new),
                data_dir.as_deref().map(Path::new),
                cli.port,
            )
            .await
        }
        Some(Commands::Scrape { action }) => match action {
            ScrapeAction::Start {
                max_jobs,
                no_headless,
                follow,
            } => scrape::cmd_start(&cli.host, port, *max_jobs, !*no_headless, *follow).await,
            ScrapeAction::Stop => scrape::cmd_stop(&cli.host, port).await,
            ScrapeAction::Status { json } => scrape::cmd_status(&cli.host, port, *json).await,
        },
        Some(Commands::List {
            search,
            job_type,
            location,
            experience_level,
            remote,
            tags,
            json,
        }) => {
            let filter = crate::models::JobFilter {
                search: search.clone(),
                job_type: job_type.clone(),
                location: location.clone(),
                experience_level: experience_level.clone(),
                remote_allowed: remote.then(|| "true".to_string()),
                tags: tags.clone(),
            };
            jobs::cmd_list(&cli.host, port, &filter, *json).await
        }
        None => {
            // No subcommand provided -- print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
