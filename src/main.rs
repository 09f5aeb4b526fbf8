//! relaybus CLI - run the message bus gateway and inspect its state.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use relaybus::config::Config;
use relaybus::cron::{FileJobStorage, Job, JobSchedule, JobStorage, Scheduler};
use relaybus::error::{DisplayError, Result};
use relaybus::gateway::Gateway;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// relaybus - multi-channel bot-routing message bus
#[derive(Parser)]
#[command(name = "relaybus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "RELAYBUS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bus, registered channels, typing coordinator, and scheduler
    Gateway,

    /// Show bus metrics, channel statuses, and environment status
    Status,

    /// Manage configuration
    Config(ConfigArgs),

    /// Manage scheduler jobs
    Job(JobArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration file
    Show,
    /// Print the configuration file path
    Path,
    /// Edit configuration in `$EDITOR`
    Edit,
}

#[derive(Args)]
struct JobArgs {
    #[command(subcommand)]
    command: JobCommands,
}

#[derive(Subcommand)]
enum JobCommands {
    /// List every stored job
    List,
    /// Remove a job by id
    Remove {
        /// Job id
        id: String,
    },
    /// Add a one-shot `send_message` job
    AddOnce {
        /// Job id
        id: String,
        /// Target session id, e.g. `telegram:12345`
        session: String,
        /// Message text to send
        message: String,
        /// Seconds from now to fire
        #[arg(long, default_value_t = 0)]
        in_secs: i64,
    },
    /// Add a recurring `send_message` job
    AddCron {
        /// Job id
        id: String,
        /// Six-field cron expression (seconds minutes hours dom month dow)
        expression: String,
        /// Target session id, e.g. `telegram:12345`
        session: String,
        /// Message text to send
        message: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", DisplayError(&e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("relaybus={level}")));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(verbosity >= 2).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref()).await?;
    match cli.command {
        Commands::Gateway => cmd_gateway(config).await,
        Commands::Status => cmd_status(config).await,
        Commands::Config(args) => cmd_config(args, config).await,
        Commands::Job(args) => cmd_job(args, config).await,
    }
}

async fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path).await?),
        None => Ok(Config::load_default().await),
    }
}

async fn cmd_gateway(config: Config) -> Result<()> {
    let gateway = Gateway::new(config)?;
    println!("Gateway running. Press Ctrl+C to stop.\n");
    tokio::select! {
        result = gateway.run(std::future::pending()) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            Ok(())
        }
    }
}

async fn cmd_status(config: Config) -> Result<()> {
    println!("relaybus status\n");
    println!("Configuration:");
    println!("  Path: {}", relaybus::config::config_path().display());

    println!();
    println!("Telegram:");
    let telegram = config.telegram();
    println!("  Token configured: {}", telegram.resolve_bot_token().is_some());
    println!("  Allowed users:    {}", telegram.allowed_users.len());
    println!("  Allowed chats:    {}", telegram.allowed_chats.len());
    println!("  Quiet mode:       {}", telegram.quiet_mode);

    println!();
    println!("Scheduler:");
    let storage = FileJobStorage::new(config.scheduler_storage_path());
    storage.init().await?;
    println!("  Storage: {}", config.scheduler_storage_path().display());
    println!("  Jobs:    {}", storage.list().await?.len());

    println!();
    println!("Environment:");
    print_env_status("TELEGRAM_BOT_TOKEN");

    Ok(())
}

fn print_env_status(var: &str) {
    match std::env::var(var) {
        Ok(_) => println!("  {var}: set"),
        Err(_) => println!("  {var}: not set"),
    }
}

async fn cmd_config(args: ConfigArgs, config: Config) -> Result<()> {
    let path = relaybus::config::config_path();
    match args.command {
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Edit => {
            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
            if !path.exists() {
                config.save(&path).await?;
            }
            std::process::Command::new(&editor).arg(&path).status().map_err(relaybus::error::ConfigError::Io)?;
        }
    }
    Ok(())
}

async fn cmd_job(args: JobArgs, config: Config) -> Result<()> {
    let storage = std::sync::Arc::new(FileJobStorage::new(config.scheduler_storage_path()));
    storage.init().await?;
    let bus = std::sync::Arc::new(relaybus::bus::MessageBus::new(
        relaybus::bus::BusConfig {
            topic_capacity: config.bus_topic_capacity(),
            subscriber_capacity: config.bus_subscriber_capacity(),
        },
        std::sync::Arc::new(relaybus::tracker::ResultTracker::new()),
    )?);
    let scheduler = Scheduler::new(storage, bus);

    match args.command {
        JobCommands::List => {
            for job in scheduler.list_jobs().await? {
                println!("{} tool={} session={:?} executed={}", job.id, job.tool, job.session_id, job.executed);
            }
        }
        JobCommands::Remove { id } => {
            scheduler.remove_job(&id).await?;
            println!("removed {id}");
        }
        JobCommands::AddOnce { id, session, message, in_secs } => {
            let job = Job::builder(
                id.clone(),
                JobSchedule::OneShot {
                    execute_at: chrono::Utc::now() + chrono::Duration::seconds(in_secs),
                },
            )
            .tool("send_message")
            .message(message)
            .session_id(session)
            .build()
            .map_err(relaybus::error::Error::Scheduler)?;
            scheduler.add_job(job).await?;
            println!("added {id}");
        }
        JobCommands::AddCron { id, expression, session, message } => {
            let job = Job::builder(id.clone(), JobSchedule::Recurring { expression })
                .tool("send_message")
                .message(message)
                .session_id(session)
                .build()
                .map_err(relaybus::error::Error::Scheduler)?;
            scheduler.add_job(job).await?;
            println!("added {id}");
        }
    }
    Ok(())
}
