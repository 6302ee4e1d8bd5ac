use anyhow::Result;
use bedrock_client::BedrockAgentsClient;
use bedrock_config::BedrockAgentsConfig;
use bedrock_hello_world::{run, HelloWorldOptions, Outcome};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hello-world-agent")]
#[command(about = "Hello world supervisor/sub-agent collaboration on Amazon Bedrock", long_about = None)]
struct Cli {
    /// false if reusing existing agents.
    #[arg(long = "recreate_agents", default_value = "true")]
    recreate_agents: String,

    /// The level of trace, 'core', 'outline', 'all'.
    #[arg(long = "trace_level", default_value = "core")]
    trace_level: String,

    /// Cleanup all infrastructure.
    #[arg(long = "clean_up", default_value = "false")]
    clean_up: String,

    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    if cli.config.exists() {
        info!("Loading configuration from: {:?}", cli.config);
    } else {
        info!("Using default configuration");
    }
    let config = BedrockAgentsConfig::load_or_default(&cli.config)?;

    let backend = Arc::new(BedrockAgentsClient::new(config).await?);
    let options = HelloWorldOptions {
        recreate_agents: cli.recreate_agents,
        trace_level: cli.trace_level,
        clean_up: cli.clean_up,
    };

    let mut stdout = std::io::stdout();
    let outcome = run(backend, &options, &mut stdout).await?;
    match outcome {
        Outcome::CleanedUp => info!("Hello world agents deleted"),
        Outcome::Recreated => {
            info!("Agents recreated; run again with --recreate_agents false to invoke them")
        }
        Outcome::Invoked { query, tasks } => info!(
            "Invocations finished in {:?} and {:?}",
            query.elapsed, tasks.elapsed
        ),
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
