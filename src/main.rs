//! IBM Licensing operator - main entry point

use std::time::Duration;

use clap::{Args, Parser};
use kube::{Client, CustomResourceExt};

use licensing_operator::config::{ControllerConfig, ReconcileTimings};
use licensing_operator::crd::IBMLicensing;
use licensing_operator::telemetry::{self, LogFormat};
use licensing_operator::{controller, DEFAULT_OPERAND_VERSION};

/// Kubernetes operator deploying and converging IBM License Service
#[derive(Parser, Debug)]
#[command(name = "licensing-operator", version, about, long_about = None)]
struct Cli {
    /// Print the IBMLicensing CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    run: RunArgs,
}

/// Controller settings
#[derive(Args, Debug)]
struct RunArgs {
    /// Namespace to watch; empty or unset watches all namespaces
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// License Service version stamped onto IBMLicensing resources
    #[arg(long, env = "OPERAND_VERSION", default_value = DEFAULT_OPERAND_VERSION)]
    operand_version: String,

    /// Log output format (json or text)
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,

    /// Requeue delay after creating a resource, in seconds
    #[arg(long, default_value = "1")]
    create_requeue_secs: u64,

    /// Pause after creating a resource, in seconds
    #[arg(long, default_value = "5")]
    post_create_settle_secs: u64,

    /// Requeue delay after deleting a resource, in seconds
    #[arg(long, default_value = "30")]
    delete_requeue_secs: u64,

    /// Resync interval once everything has converged, in seconds
    #[arg(long, default_value = "600")]
    resync_secs: u64,

    /// Retry delay after a failed reconciliation, in seconds
    #[arg(long, default_value = "30")]
    error_requeue_secs: u64,
}

impl RunArgs {
    fn into_config(self) -> ControllerConfig {
        ControllerConfig {
            watch_namespace: self.watch_namespace.filter(|ns| !ns.is_empty()),
            operand_version: self.operand_version,
            timings: ReconcileTimings {
                create_requeue: Duration::from_secs(self.create_requeue_secs),
                post_create_settle: Duration::from_secs(self.post_create_settle_secs),
                delete_requeue: Duration::from_secs(self.delete_requeue_secs),
                resync: Duration::from_secs(self.resync_secs),
                error_requeue: Duration::from_secs(self.error_requeue_secs),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        print!("{}", serde_yaml::to_string(&IBMLicensing::crd())?);
        return Ok(());
    }

    telemetry::init(cli.run.log_format)?;
    let config = cli.run.into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        operand_version = %config.operand_version,
        "IBM Licensing operator starting"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    controller::run(client, config).await?;
    Ok(())
}
