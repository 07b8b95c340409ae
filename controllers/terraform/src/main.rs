//! TFOps
//!
//! Terraform controllers for Kubernetes. One binary, two subcommands:
//! - `manager` runs the controller manager watching the
//!   TerraformConfiguration, TerraformPlan and TerraformState CRDs
//! - `backend` runs the terraform HTTP state backend, used as a sidecar
//!   next to a running terraform process

mod error;
mod manager;
mod reconcile_helpers;
mod reconciler;
mod resources;
#[cfg(test)]
mod test_utils;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tfops")]
#[command(about = "Terraform controllers for Kubernetes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the controller manager that watches and acts over the
    /// TerraformConfiguration, TerraformPlan and TerraformState CRDs
    Manager {
        /// The address the diagnostic endpoint binds to
        #[arg(long, default_value = ":8080")]
        metrics_addr: String,

        /// Enable leader election for the controller manager
        #[arg(short = 'l', long)]
        enable_leader_election: bool,

        /// Namespace to watch over
        #[arg(long, default_value = "tfops-system")]
        namespace: String,

        /// Development logging
        #[arg(short, long)]
        debug: bool,
    },

    /// Launch the terraform HTTP backend. Runs as a sidecar next to a
    /// terraform process and proxies its state to a TerraformState object
    Backend {
        /// Name of the terraform state object to use
        #[arg(short, long)]
        name: String,

        /// Namespace where the terraform state object is located
        #[arg(short = 's', long)]
        namespace: String,

        /// Listen address
        #[arg(short = 'l', long, default_value = "localhost:8081")]
        listen: String,

        /// Development logging
        #[arg(long)]
        debug: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Manager {
            metrics_addr,
            enable_leader_election,
            namespace,
            debug,
        } => {
            init_tracing(debug, cli.verbose);
            manager::launch(manager::Options {
                metrics_addr,
                leader_election: enable_leader_election,
                namespace,
            })
            .await?;
        }
        Commands::Backend {
            name,
            namespace,
            listen,
            debug,
        } => {
            init_tracing(debug, cli.verbose);
            state_backend::listen_and_serve(state_backend::Options {
                name,
                namespace,
                listen,
            })
            .await?;
        }
    }

    Ok(())
}

fn init_tracing(debug: bool, verbose: bool) {
    let default_filter = if debug {
        "debug,kube=debug"
    } else if verbose {
        "info,kube=info"
    } else {
        "info,kube=warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
