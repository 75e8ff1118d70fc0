use std::sync::Arc;

use clap::Parser;

use kanban_sync::{
    board::Board,
    cli::{self, RootCommand},
    gateway::HttpTaskGateway,
    logging::init_logging,
    notification::{BufferedNotifier, notifier_for_backend},
    settings::Settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "kanban-sync",
    about = "Task board client that keeps a local board in step with the task service",
    long_about = "Shows the To Do / Doing / Done board of a task service and moves tasks between lanes, applying drops locally first and confirming them over HTTP.",
    version = env!("KANBAN_SYNC_BUILD_VERSION"),
    author
)]
struct Cli {
    /// Task service root, e.g. http://127.0.0.1:8000. Overrides settings.toml.
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<RootCommand>,
}

#[tokio::main]
async fn main() {
    let log_session = match init_logging() {
        Ok(session) => Some(session),
        Err(err) => {
            eprintln!("warning: failed to initialize logging: {err:#}");
            None
        }
    };

    let cli = Cli::parse();
    let settings = Settings::load().with_base_url_override(cli.base_url.as_deref());

    let gateway = match HttpTaskGateway::new(settings.gateway_config()) {
        Ok(gateway) => gateway,
        Err(err) => {
            eprintln!("error[RUNTIME_ERROR]: {err:#}");
            std::process::exit(6);
        }
    };
    let console = Arc::new(BufferedNotifier::new());
    let notifier = notifier_for_backend(
        settings.notification_backend(),
        Arc::clone(&console),
        settings.notification_duration_ms,
    );
    let board = Board::new(Arc::new(gateway), notifier, settings.rollback_policy());

    let command = cli.command.unwrap_or(RootCommand::Board);
    let log_file = log_session.as_ref().map(|session| session.path());
    let code = cli::run(&board, &console, command, cli.json, cli.quiet, log_file).await;
    // process::exit skips destructors; flush the log writer first.
    drop(log_session);
    std::process::exit(code);
}
