//! Command-line harness for the Gestor de Streaming offline cache proxy.
//!
//! Runs the proxy in-process against a live origin, with in-memory cache
//! storage, notifications and windows.
//!
//! ## Usage
//!
//! ```bash
//! # Precache, activate, then request pages twice (network, then cache)
//! gestor-offline run --origin http://localhost:5000/ /templates/index.html /static/js/app.js
//!
//! # Simulate a push message and a click on its "explore" action
//! gestor-offline push --origin http://localhost:5000/ --text "Tu cuenta vence mañana"
//!
//! # Print the effective configuration
//! gestor-offline config --config sw.json
//! ```

use clap::{Parser, Subcommand};
use gestor_common::{init_logging, GestorError, LogConfig, LogFormat};
use gestor_net::Request;
use gestor_sw::{FetchEvent, NotificationClickEvent, PushEvent};
use std::path::PathBuf;
use url::Url;

mod session;

use session::{load_config, Session};

#[derive(Parser)]
#[command(name = "gestor-offline")]
#[command(about = "Run the Gestor de Streaming offline cache proxy against a live origin")]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install, activate, then request each path twice
    Run {
        /// Origin the worker is registered on
        #[arg(long)]
        origin: Option<Url>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Treat requests as page navigations
        #[arg(long)]
        navigate: bool,
        /// Paths to request
        paths: Vec<String>,
    },

    /// Install, activate, deliver a push and click one of its actions
    Push {
        /// Origin the worker is registered on
        #[arg(long)]
        origin: Option<Url>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Push payload text; omitted means a push without data
        #[arg(long)]
        text: Option<String>,
        /// Action to click ("" for the notification body)
        #[arg(long, default_value = "explore")]
        action: String,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Origin the worker is registered on
        #[arg(long)]
        origin: Option<Url>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), GestorError> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::default()
    };
    if cli.json_logs {
        log_config = log_config.with_format(LogFormat::Json);
    }
    init_logging(log_config)?;

    match cli.command {
        Commands::Run {
            origin,
            config,
            navigate,
            paths,
        } => {
            let config = load_config(config.as_deref(), origin)?;
            let session = Session::start(config).await?;
            session.print_lifecycle();

            for path in &paths {
                let url = session.worker.config().resolve(path)?;
                for attempt in 1..=2 {
                    let request = if navigate {
                        Request::navigate(url.clone())
                    } else {
                        Request::get(url.clone())
                    };
                    match session.worker.handle_fetch(FetchEvent::new(request)).await {
                        Ok(response) => println!(
                            "  [{attempt}] {path}: {} {} ({} bytes, {})",
                            response.status,
                            response.status_text,
                            response.body.len(),
                            if response.from_cache { "cache" } else { "network" }
                        ),
                        Err(e) => println!("  [{attempt}] {path}: failed: {e}"),
                    }
                }
            }

            if !session.install.precached {
                std::process::exit(1);
            }
        }

        Commands::Push {
            origin,
            config,
            text,
            action,
        } => {
            let config = load_config(config.as_deref(), origin)?;
            let session = Session::start(config).await?;
            session.print_lifecycle();

            let push = match text {
                Some(ref text) => PushEvent::with_text(text),
                None => PushEvent::empty(),
            };
            let shown = session.worker.handle_push(push).await?;
            println!("Notification shown:");
            println!("{}", serde_json::to_string_pretty(&shown)?);

            let report = session
                .worker
                .handle_notification_click(NotificationClickEvent::new(shown, action.clone()))
                .await?;
            println!("Clicked {:?}; notification closed", action);
            match report.opened {
                Some(client) => println!("  Opened window {} at {}", client.id, client.url),
                None => println!("  No window opened"),
            }
            println!(
                "  Notifications still displayed: {}",
                session.notifications.displayed().await.len()
            );
        }

        Commands::Config { origin, config } => {
            let config = load_config(config.as_deref(), origin)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
