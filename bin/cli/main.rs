use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use topicctl::{
    admin::TopicAdmin,
    config::{DirLoader, Properties, PropertiesLoader},
    controller::TopicController,
    error::AdminError,
    poll::PollSettings,
    session::{NatsSessionFactory, SessionFactory},
    OperationOutcome, ADMIN_SOURCE,
};

const EXIT_REJECTED: u8 = 2;
const EXIT_TIMED_OUT: u8 = 3;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(author, version, about = "Create and delete topics, waiting until the cluster sees the change", long_about = None)]
struct Cli {
    /// Directory holding the `<source>.properties` files
    #[arg(
        long = "config-dir",
        default_value = ".",
        env = "TOPICCTL_CONFIG_DIR"
    )]
    config_dir: PathBuf,

    /// The property source with the admin connection settings
    #[arg(
        long = "admin-source",
        default_value = ADMIN_SOURCE,
        env = "TOPICCTL_ADMIN_SOURCE"
    )]
    admin_source: String,

    /// Extra admin connection settings given as key=value, overriding the admin source (can repeat)
    #[arg(long = "admin-property", value_parser = parse_key_value)]
    admin_properties: Vec<(String, String)>,

    /// How long to wait for a change to become visible, in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 10_000, env = "TOPICCTL_TIMEOUT_MS")]
    timeout_ms: u64,

    /// How long to wait between visibility checks, in milliseconds
    #[arg(
        long = "poll-interval-ms",
        default_value_t = 1_000,
        value_parser = clap::value_parser!(u64).range(1..),
        env = "TOPICCTL_POLL_INTERVAL_MS"
    )]
    poll_interval_ms: u64,

    /// The kind of broker to talk to
    #[arg(long = "backend", value_enum, default_value_t = Backend::Nats, env = "TOPICCTL_BACKEND")]
    backend: Backend,

    /// Use json formatted logs
    #[arg(short = 'j', long = "json", env = "TOPICCTL_LOG_FORMAT")]
    json_logs: bool,

    /// How to print the result
    #[arg(long = "output", value_enum, default_value_t = Output::Text)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Backend {
    /// NATS JetStream, each topic is a stream
    Nats,
    /// Kafka, through librdkafka
    #[cfg(feature = "kafka")]
    Kafka,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Output {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a topic
    Create {
        name: String,
        /// Topic configuration given as key=value (can repeat)
        #[arg(long = "config", value_parser = parse_key_value)]
        config: Vec<(String, String)>,
    },
    /// Create a topic in the pack namespace, using the pack topic defaults
    CreatePack {
        name: String,
        /// Overrides for the pack topic defaults given as key=value (can repeat)
        #[arg(long = "config", value_parser = parse_key_value)]
        config: Vec<(String, String)>,
    },
    /// Delete a topic
    Delete { name: String },
    /// Delete a topic in the pack namespace
    DeletePack { name: String },
    /// List all topics
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.pretty().init();
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling");
            signal_token.cancel();
        }
    });

    let controller = TopicController::new(DirLoader::new(&cli.config_dir))
        .with_poll_settings(PollSettings {
            timeout: Duration::from_millis(cli.timeout_ms),
            interval: Duration::from_millis(cli.poll_interval_ms),
        })
        .with_cancellation(cancel);

    match cli.backend {
        Backend::Nats => run(&cli, controller, NatsSessionFactory).await,
        #[cfg(feature = "kafka")]
        Backend::Kafka => run(&cli, controller, topicctl::session::KafkaSessionFactory).await,
    }
}

async fn run<L: PropertiesLoader, F: SessionFactory>(
    cli: &Cli,
    controller: TopicController<L>,
    factory: F,
) -> anyhow::Result<ExitCode> {
    let admin = TopicAdmin::new(controller, factory)
        .with_admin_source(cli.admin_source.clone())
        .with_admin_overrides(cli.admin_properties.iter().cloned().collect());

    let res = match &cli.command {
        Commands::Create { name, config } => {
            let config: Properties = config.iter().cloned().collect();
            admin.create_topic(name, &config).await
        }
        Commands::CreatePack { name, config } => {
            let config: Properties = config.iter().cloned().collect();
            admin.create_pack_topic(name, &config).await
        }
        Commands::Delete { name } => admin.delete_topic(name).await,
        Commands::DeletePack { name } => admin.delete_pack_topic(name).await,
        Commands::List => {
            let topics = admin
                .list_topics()
                .await
                .context("Unable to load admin settings")?
                .context("Unable to list topics")?;
            match cli.output {
                Output::Text => topics.iter().for_each(|t| println!("{t}")),
                Output::Json => println!("{}", serde_json::to_string(&topics)?),
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    let outcome = match res {
        Ok(outcome) => outcome,
        Err(AdminError::Interrupted) => {
            warn!("Operation was interrupted before it could be confirmed");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(err) => return Err(err).context("Operation aborted"),
    };

    match cli.output {
        Output::Text => match &outcome {
            OperationOutcome::Succeeded(topic) => println!("{topic}"),
            OperationOutcome::Rejected(reason) => eprintln!("Rejected: {reason}"),
            OperationOutcome::TimedOut(topic, budget) => eprintln!(
                "Timed out after {}ms waiting for topic {topic}. The change may still be applied",
                budget.as_millis()
            ),
        },
        Output::Json => println!("{}", serde_json::to_string(&outcome.report())?),
    }
    info!(success = outcome.is_success(), "Done");

    Ok(match outcome {
        OperationOutcome::Succeeded(_) => ExitCode::SUCCESS,
        OperationOutcome::Rejected(_) => ExitCode::from(EXIT_REJECTED),
        OperationOutcome::TimedOut(..) => ExitCode::from(EXIT_TIMED_OUT),
    })
}

fn parse_key_value(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Key must not be empty in '{raw}'");
    }
    Ok((key.to_owned(), value.trim().to_owned()))
}
