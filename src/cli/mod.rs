//! # MCCTL CLI
//!
//! Command-line interface for the media configuration controller.
//!
//! ## Usage
//!
//! ```bash
//! # List all SonarrConfig resources
//! mcctl list sonarr
//!
//! # Show status of a RadarrConfig
//! mcctl status radarr movies --namespace media
//!
//! # Suspend / resume reconciliation
//! mcctl suspend prowlarr indexers
//! mcctl resume prowlarr indexers
//!
//! # Trigger an immediate reconciliation
//! mcctl reconcile sonarr tv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kube::Client;
use media_config_controller::crd::{
    LidarrConfig, ProwlarrConfig, RadarrConfig, ReadarrConfig, SonarrConfig,
};

mod list;
mod reconcile;
mod status;
mod suspend;

/// Media Configuration Controller CLI
#[derive(Parser)]
#[command(name = "mcctl")]
#[command(
    about = "Media Configuration Controller CLI",
    long_about = None,
    after_help = "\
Available resource kinds:
  sonarr, radarr, lidarr, readarr, prowlarr

Examples:
  mcctl list sonarr
  mcctl reconcile radarr movies
  mcctl status prowlarr indexers --namespace media
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to "default" for single-resource commands)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger reconciliation for a resource
    Reconcile {
        #[arg(value_enum, value_name = "KIND")]
        kind: ServiceKind,

        #[arg(value_name = "NAME")]
        name: String,
    },
    /// List resources of a kind
    List {
        #[arg(value_enum, value_name = "KIND")]
        kind: ServiceKind,
    },
    /// Show status of a resource
    Status {
        #[arg(value_enum, value_name = "KIND")]
        kind: ServiceKind,

        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Suspend reconciliation for a resource
    Suspend {
        #[arg(value_enum, value_name = "KIND")]
        kind: ServiceKind,

        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Resume reconciliation for a resource
    Resume {
        #[arg(value_enum, value_name = "KIND")]
        kind: ServiceKind,

        #[arg(value_name = "NAME")]
        name: String,
    },
}

/// Resource kinds managed by the controller
#[derive(Clone, Copy, ValueEnum)]
enum ServiceKind {
    #[value(name = "sonarr", alias = "sonarrcfg")]
    Sonarr,
    #[value(name = "radarr", alias = "radarrcfg")]
    Radarr,
    #[value(name = "lidarr", alias = "lidarrcfg")]
    Lidarr,
    #[value(name = "readarr", alias = "readarrcfg")]
    Readarr,
    #[value(name = "prowlarr", alias = "prowlarrcfg")]
    Prowlarr,
}

/// Run a generic command against the concrete resource type of `kind`
macro_rules! for_kind {
    ($kind:expr, $module:ident::$func:ident($($arg:expr),*)) => {
        match $kind {
            ServiceKind::Sonarr => $module::$func::<SonarrConfig>($($arg),*).await,
            ServiceKind::Radarr => $module::$func::<RadarrConfig>($($arg),*).await,
            ServiceKind::Lidarr => $module::$func::<LidarrConfig>($($arg),*).await,
            ServiceKind::Readarr => $module::$func::<ReadarrConfig>($($arg),*).await,
            ServiceKind::Prowlarr => $module::$func::<ProwlarrConfig>($($arg),*).await,
        }
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider FIRST, before any other operations
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::Reconcile { kind, name } => {
            for_kind!(kind, reconcile::reconcile_command(client, name, cli.namespace))
        }
        Commands::List { kind } => for_kind!(kind, list::list_command(client, cli.namespace)),
        Commands::Status { kind, name } => {
            for_kind!(kind, status::status_command(client, name, cli.namespace))
        }
        Commands::Suspend { kind, name } => {
            for_kind!(kind, suspend::set_suspended(client, name, cli.namespace, true))
        }
        Commands::Resume { kind, name } => {
            for_kind!(kind, suspend::set_suspended(client, name, cli.namespace, false))
        }
    }
}
