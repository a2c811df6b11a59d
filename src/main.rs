use anyhow::Result;
use clap::{Parser, Subcommand};
use cloud_asset_count::config::{Config, Overrides};
use cloud_asset_count::gcp::client::GcpClient;
use cloud_asset_count::logging::setup_logging;
use cloud_asset_count::provider::azure::AzureCli;
use cloud_asset_count::provider::gcp::{GcloudCli, GcpApi, GcpBackend};
use cloud_asset_count::{run, AssetSource, RunOutcome, RunSettings};
use std::path::PathBuf;
use std::sync::Arc;

/// Count cloud assets by type and write a report
#[derive(Parser, Debug)]
#[command(name = "cloud-asset-count", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug output for more verbose information
    #[arg(long, global = true)]
    debug: bool,

    /// Number of asset counts run at the same time
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Report file, overwritten on every run
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Log file, appended to
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Seconds to wait after the first rate-limited call
    #[arg(long, global = true)]
    retry_delay: Option<u64>,

    /// Retries per asset type before giving up on a rate limit
    #[arg(long, global = true, conflicts_with = "retry_forever")]
    max_retries: Option<u32>,

    /// Keep retrying rate-limited calls with a fixed delay, never give up
    #[arg(long, global = true)]
    retry_forever: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count assets across all subscriptions and resource groups in Azure
    Azure {
        /// File containing asset types to be checked
        asset_file: PathBuf,
    },
    /// Count assets across all projects in a GCP organization
    Gcp {
        /// Organization ID to check assets within
        org_id: String,

        /// File containing asset types to be checked
        asset_file: PathBuf,

        /// Query through the gcloud CLI or the REST APIs
        #[arg(long, value_enum)]
        backend: Option<GcpBackend>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let backend = match &args.command {
        Command::Gcp { backend, .. } => *backend,
        Command::Azure { .. } => None,
    };
    // logging is not up yet, a bad config file is reported once it is
    let (file_config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let config = file_config.merge(Overrides {
        concurrency: args.concurrency,
        retry_delay_secs: args.retry_delay,
        max_retries: args.max_retries,
        retry_forever: args.retry_forever,
        report_path: args.report.clone(),
        log_path: args.log_file.clone(),
        gcp_backend: backend,
    });

    let log_session = setup_logging(args.debug, &config.effective_log_path())?;
    if let Some(e) = config_error {
        tracing::warn!("Ignoring config file, using defaults: {:#}", e);
    }

    let (source, asset_file) = match args.command {
        Command::Azure { asset_file } => {
            let source: Arc<dyn AssetSource> =
                Arc::new(AzureCli::new().with_concurrency(config.effective_concurrency()));
            (source, asset_file)
        }
        Command::Gcp {
            org_id, asset_file, ..
        } => {
            let source: Arc<dyn AssetSource> = match config.effective_gcp_backend() {
                GcpBackend::Cli => Arc::new(GcloudCli::new(&org_id)),
                GcpBackend::Api => Arc::new(GcpApi::new(&org_id, GcpClient::new().await?)),
            };
            (source, asset_file)
        }
    };

    let provider = source.provider();
    let settings = RunSettings {
        asset_file,
        report_path: config.effective_report_path(),
        concurrency: config.effective_concurrency(),
        retry: config.effective_retry_policy(),
        // with --debug the log already mirrors to stderr
        show_progress: !args.debug,
    };

    match run(source, &settings).await? {
        RunOutcome::Completed(summary) => {
            print!("{}", summary.render(provider, &settings.report_path));
        }
        RunOutcome::NoScopes(err) => {
            eprintln!("No {}s found or accessible: {}", provider.scope_label(), err);
            eprintln!("See {} for details", log_session.path.display());
        }
        RunOutcome::AssetFileUnreadable(message) => {
            eprintln!("{}", message);
        }
    }

    Ok(())
}
