/// Payscope - identity and permission diagnostics
///
/// Runs the identity and permission core against the configured database,
/// cache and identity provider, one operation per invocation, or keeps it
/// running with its background jobs under `serve`.
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use payscope::{
    config::ServiceConfig,
    context::AppContext,
    identity::Credential,
    jobs::{tasks, JobScheduler},
    metrics,
    permission::{capabilities, CapabilityContext, Principal},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "payscope", version, about = "Payscope identity and permission core")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "PAYSCOPE_JSON_LOGS")]
    json_logs: bool,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a bearer credential to its user
    Resolve {
        #[arg(long, env = "PAYSCOPE_CREDENTIAL", hide_env_values = true)]
        credential: String,
    },
    /// Check whether an identity holds a capability
    Authorize {
        /// Identity type, e.g. facebook
        #[arg(long = "type")]
        identity_type: String,
        /// Identity id within that type
        #[arg(long)]
        id: String,
        #[arg(
            long,
            default_value = capabilities::BROWSE_RECORDS,
            value_parser = CapabilityContext::parse
        )]
        capability: CapabilityContext,
    },
    /// Check database and cache connectivity
    Health,
    /// Run the background jobs until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = ServiceConfig::from_env().context("loading configuration")?;

    // Initialize logging
    let filter = config.logging.env_filter();
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Create application context
    let ctx = Arc::new(
        AppContext::new(config)
            .await
            .context("initializing services")?,
    );

    let outcome = run(&ctx, cli.command).await;

    if cli.metrics {
        print!("{}", metrics::render_metrics());
    }

    // A denial is a clean answer but still a non-zero exit
    if !outcome? {
        std::process::exit(1);
    }

    Ok(())
}

/// Run one command, returning false on a denial
async fn run(ctx: &Arc<AppContext>, command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Resolve { credential } => {
            let credential = Credential::from(credential);
            let user = ctx.identity.resolve(credential.as_str()).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Authorize {
            identity_type,
            id,
            capability,
        } => {
            let principal = Principal::new(identity_type, id);
            let granted = ctx.permission.authorize(&principal, &capability).await?;
            println!(
                "{} {} {}",
                principal,
                if granted { "granted" } else { "denied" },
                capability.capability()
            );
            return Ok(granted);
        }
        Command::Health => {
            tasks::health_check(ctx).await?;
            println!("ok (cache: {})", ctx.cache.name());
        }
        Command::Serve => {
            let scheduler = Arc::new(JobScheduler::new(Arc::clone(ctx)));
            let handles = scheduler.start();

            tokio::signal::ctrl_c()
                .await
                .context("waiting for shutdown signal")?;

            info!("Shutting down background jobs");
            for handle in handles {
                handle.abort();
            }
        }
    }

    Ok(true)
}
