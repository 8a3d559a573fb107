//! ensure-indexes: create composite indexes and block until they are ready
//!
//! # Usage
//!
//! ```bash
//! # From a manifest
//! ensure-indexes --manifest indexes.yaml
//!
//! # Inline, against a local emulator (no authentication)
//! ensure-indexes \
//!     --parent "projects/project-id/databases/(default)/collectionGroups/people" \
//!     --index name,location --index name,employer \
//!     --endpoint http://localhost:8080
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use index_provisioner::gateway::rest::DEFAULT_ENDPOINT;
use index_provisioner::{
    ensure_indexes, AdminGateway, CollectionScope, IndexBatch, IndexManifest, IndexSpec,
    ProvisionConfig, RestAdminGateway,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ensure-indexes")]
#[command(about = "Create composite indexes and wait until every one is ready", long_about = None)]
struct Cli {
    /// YAML manifest describing the batch
    #[arg(short, long, conflicts_with_all = ["parent", "index"])]
    manifest: Option<PathBuf>,

    /// Collection scope: <database-scope>/collectionGroups/<collection-id>
    #[arg(long, requires = "index")]
    parent: Option<String>,

    /// Comma-separated fields, e.g. `name,location:desc` (repeatable)
    #[arg(short, long)]
    index: Vec<String>,

    /// Admin endpoint; a custom endpoint is used without authentication
    #[arg(long)]
    endpoint: Option<String>,

    /// Environment variable holding a bearer access token
    #[arg(long, default_value = "INDEX_PROVISIONER_TOKEN")]
    token_env: String,

    /// Seconds between status polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Give up after this many poll rounds (0 = never)
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Give up after this many seconds of polling
    #[arg(long)]
    deadline: Option<u64>,

    /// Status queries in flight per round
    #[arg(long)]
    concurrency: Option<usize>,
}

impl Cli {
    fn batch_and_config(&self) -> anyhow::Result<(IndexBatch, ProvisionConfig)> {
        let (batch, mut config) = match (&self.manifest, &self.parent) {
            (Some(path), _) => {
                let manifest = IndexManifest::from_yaml(path)
                    .with_context(|| format!("loading manifest {}", path.display()))?;
                (manifest.batch(), manifest.settings)
            }
            (None, Some(parent)) => {
                let parent = CollectionScope::parse(parent.as_str())?;
                let specs = self
                    .index
                    .iter()
                    .map(|s| s.parse::<IndexSpec>().with_context(|| format!("parsing --index {s}")))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                (IndexBatch::new(parent, specs), ProvisionConfig::default())
            }
            (None, None) => bail!("either --manifest or --parent with --index is required"),
        };

        if let Some(secs) = self.poll_interval {
            config = config.poll_interval_secs(secs);
        }
        if let Some(rounds) = self.max_rounds {
            config = config.max_poll_rounds(rounds);
        }
        if let Some(secs) = self.deadline {
            config = config.deadline_secs(secs);
        }
        if let Some(concurrency) = self.concurrency {
            config = config.poll_concurrency(concurrency);
        }
        config.validate()?;

        Ok((batch, config))
    }

    fn gateway(&self) -> anyhow::Result<Arc<dyn AdminGateway>> {
        let gateway = match &self.endpoint {
            Some(endpoint) => {
                info!(%endpoint, "Using custom endpoint without authentication");
                RestAdminGateway::emulator(endpoint.as_str())?
            }
            None => {
                let token = std::env::var(&self.token_env).ok();
                if token.is_none() {
                    warn!(
                        "{} is not set; requests to {} will be unauthenticated",
                        self.token_env, DEFAULT_ENDPOINT
                    );
                }
                RestAdminGateway::new(DEFAULT_ENDPOINT, token)?
            }
        };
        Ok(Arc::new(gateway))
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (batch, config) = cli.batch_and_config()?;
    let gateway = cli.gateway()?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let report = ensure_indexes(gateway, &batch, &config, &cancel).await?;

    println!(
        "{} indexes ready ({} built, {} already existed) after {} poll rounds in {:.1}s",
        batch.len() - report.duplicates.len(),
        report.became_ready.len() + report.completed_immediately.len(),
        report.already_existed.len(),
        report.poll_rounds,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".into()),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
