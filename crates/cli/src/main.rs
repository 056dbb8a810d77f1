//! kx - command-line client for the Kubernetes extension
//!
//! Lists discovered containers and deployments, tails cluster events
//! and runs pod-count and node-count checks against a running extension.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{checks, discovery, events, status};

/// Kubernetes extension CLI
#[derive(Parser)]
#[command(name = "kx")]
#[command(author, version, about = "CLI for the Kubernetes extension", long_about = None)]
pub struct Cli {
    /// Extension endpoint URL (falls back to ~/.config/kx/config.json)
    #[arg(long, env = "KX_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List container enrichment records
    Containers {
        /// Filter by namespace
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// List deployment enrichment records
    Deployments {
        /// Filter by namespace
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Show cluster events
    Events {
        /// Relative window (e.g. 30s, 15m, 2h, 1d) or RFC 3339 timestamp
        #[arg(long, default_value = "1h")]
        since: String,
    },

    /// Run a check and wait for its verdict
    #[command(subcommand)]
    Check(CheckCommands),

    /// Show extension health and readiness
    Status,
}

#[derive(Subcommand)]
pub enum CheckCommands {
    /// Compare ready pods of a workload against its desired count
    Pods {
        /// Workload namespace
        #[arg(long, short)]
        namespace: String,

        /// Workload kind (deployment, statefulset, daemonset, replicaset)
        #[arg(long, default_value = "deployment")]
        kind: String,

        /// Workload name
        name: String,

        /// Check mode (ready-at-least-one, ready-equals-desired, ready-less-than-desired)
        #[arg(long, default_value = "ready-equals-desired")]
        mode: String,

        /// How long the check runs (e.g. 500ms, 10s, 2m)
        #[arg(long, default_value = "10s")]
        duration: String,
    },

    /// Compare ready nodes against an expected count
    Nodes {
        /// Cluster name (falls back to the config file)
        #[arg(long)]
        cluster: Option<String>,

        /// Expected node count
        #[arg(long)]
        count: i32,

        /// Check mode (ready-at-least-one, ready-equals-desired, ready-less-than-desired)
        #[arg(long, default_value = "ready-equals-desired")]
        mode: String,

        /// How long the check runs (e.g. 500ms, 10s, 2m)
        #[arg(long, default_value = "10s")]
        duration: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let api_url = config.resolve_api_url(cli.api_url);
    if cli.verbose {
        output::print_info(&format!("Using extension at {}", api_url));
    }

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Containers { namespace } => {
            discovery::list_containers(&client, namespace, cli.format).await?;
        }
        Commands::Deployments { namespace } => {
            discovery::list_deployments(&client, namespace, cli.format).await?;
        }
        Commands::Events { since } => {
            events::show_events(&client, &since, cli.format).await?;
        }
        Commands::Check(check_cmd) => match check_cmd {
            CheckCommands::Pods {
                namespace,
                kind,
                name,
                mode,
                duration,
            } => {
                let workload = checks::Workload {
                    namespace,
                    kind,
                    name,
                };
                checks::check_pods(&client, workload, &mode, &duration, cli.verbose, cli.format)
                    .await?;
            }
            CheckCommands::Nodes {
                cluster,
                count,
                mode,
                duration,
            } => {
                let cluster = cluster
                    .or(config.cluster_name)
                    .ok_or_else(|| anyhow::anyhow!("--cluster is required (or set cluster_name in the config file)"))?;
                checks::check_nodes(&client, &cluster, count, &mode, &duration, cli.verbose, cli.format)
                    .await?;
            }
        },
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
