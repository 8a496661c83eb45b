//! `rmai ingest`: pull recent PubMed abstracts into the study index.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use rmai_core::ingest::{IngestPipeline, IngestProgress};
use rmai_infra::config::pubmed_api_key;
use rmai_infra::pubmed::PubmedClient;
use rmai_infra::sqlite::SqliteCheckpointStore;

use crate::state::AppState;

/// Progress bar over the articles handled so far.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} articles {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message("searching PubMed...");
        Self { bar }
    }
}

impl IngestProgress for BarProgress {
    fn started(&mut self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message("");
    }

    fn advanced(&mut self, n: usize) {
        self.bar.inc(n as u64);
    }

    fn uploaded(&mut self, total: usize) {
        self.bar.set_message(format!("({total} indexed)"));
    }
}

/// Run one ingest over the configured (or overridden) look-back window.
pub async fn ingest(
    state: &AppState,
    days: Option<u32>,
    retmax: Option<u32>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let retrieval = state.require_retrieval()?;
    let pubmed = &state.config.pubmed;

    let mut client = PubmedClient::new(pubmed, pubmed_api_key())?;
    if let Some(days) = days {
        client = client.with_reldays(days);
    }
    let retmax = retmax.unwrap_or(pubmed.retmax).max(1) as usize;

    let pipeline = IngestPipeline::new(
        client,
        SqliteCheckpointStore::new(state.db_pool.clone()),
        retrieval.embedder.clone(),
        retrieval.index.clone(),
        retmax,
        pubmed.upsert_chunk,
    );

    let mut progress = BarProgress::new(json || quiet);
    let report = pipeline.run(&mut progress).await;
    progress.bar.finish_and_clear();
    let report = report.context("ingest failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} Ingest complete ({} days)",
        style("✓").green().bold(),
        days.unwrap_or(pubmed.reldays)
    );
    println!();
    println!("  Found:             {}", style(report.found).bold());
    println!("  Indexed:           {}", style(report.uploaded).green());
    println!("  Already processed: {}", report.already_processed);
    println!("  Without abstract:  {}", style(report.without_abstract).dim());
    println!();
    Ok(())
}
