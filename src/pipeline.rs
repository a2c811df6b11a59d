//! Run pipeline
//!
//! enumerate scopes → read asset types → dispatch → report

use crate::dispatch::{plan, Dispatcher};
use crate::error::ScopeError;
use crate::progress::{progress_bar, PROGRESS_MESSAGE};
use crate::provider::AssetSource;
use crate::report::{Layout, Report, Summary};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a run needs besides the provider
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub asset_file: PathBuf,
    pub report_path: PathBuf,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub show_progress: bool,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed(Summary),
    /// Scope enumeration failed or found nothing; the report was not touched
    NoScopes(ScopeError),
    /// The asset-type file could not be read; the report was not touched
    AssetFileUnreadable(String),
}

/// Read asset types, one per line, trimmed. Blank lines are kept.
pub async fn read_asset_types(path: &Path) -> std::io::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content.lines().map(|line| line.trim().to_string()).collect())
}

pub async fn run(source: Arc<dyn AssetSource>, settings: &RunSettings) -> Result<RunOutcome> {
    let provider = source.provider();

    let scopes = match source.list_scopes().await {
        Ok(scopes) => scopes,
        Err(e) => {
            tracing::error!("No {}s found or accessible: {}", provider.scope_label(), e);
            return Ok(RunOutcome::NoScopes(e));
        }
    };

    let asset_types = match read_asset_types(&settings.asset_file).await {
        Ok(types) => types,
        Err(e) => {
            let message = format!(
                "Failed to read asset types file {}: {}",
                settings.asset_file.display(),
                e
            );
            tracing::error!("{}", message);
            return Ok(RunOutcome::AssetFileUnreadable(message));
        }
    };

    let tasks = plan(&scopes, &asset_types);
    let tasks_total = tasks.len();
    tracing::info!(
        "{}: {} scopes x {} asset types = {} tasks",
        provider,
        scopes.len(),
        asset_types.len(),
        tasks.len()
    );

    let file = File::create(&settings.report_path)
        .with_context(|| format!("Failed to create report {}", settings.report_path.display()))?;
    let mut report = Report::new(
        BufWriter::new(file),
        Layout::from(provider),
        &scopes,
        asset_types.len(),
    );
    let progress = progress_bar(tasks_total, settings.show_progress)?;

    Dispatcher::new(settings.concurrency, settings.retry.clone())
        .run(source, tasks, |event| {
            report.record(&event).context("Failed to write report")?;
            progress.inc(1);
            Ok(())
        })
        .await?;

    progress.finish();
    tracing::info!(
        "{}: {}/{} done",
        PROGRESS_MESSAGE,
        progress.position(),
        tasks_total
    );
    let summary = report.finish().context("Failed to finish report")?;
    tracing::info!("Grand Total of All Assets: {}", summary.grand_total());

    Ok(RunOutcome::Completed(summary))
}
