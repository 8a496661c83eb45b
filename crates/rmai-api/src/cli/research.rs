//! Literature and assistant commands: search, references, digest, ask.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use rmai_core::assistant::AskRequest;
use rmai_core::text::clip_with_ellipsis;
use rmai_types::study::Study;

use crate::state::AppState;

const TITLE_WIDTH: usize = 60;

fn spinner(message: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

fn study_table(studies: &[Study]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("PMID").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Published").fg(Color::White),
        Cell::new("Score").fg(Color::White),
    ]);
    for study in studies {
        table.add_row(vec![
            Cell::new(study.pmid.map(|p| p.to_string()).unwrap_or_default()).fg(Color::DarkGrey),
            Cell::new(clip_with_ellipsis(&study.title, TITLE_WIDTH)).fg(Color::Cyan),
            Cell::new(study.pub_date.as_deref().unwrap_or("-")),
            Cell::new(study.score.map(|s| format!("{s:.3}")).unwrap_or_default()),
        ]);
    }
    table
}

/// `rmai search <query>`: nearest indexed studies, no LLM involved.
pub async fn search(state: &AppState, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let retrieval = state.require_retrieval()?;
    let top_k = top_k.unwrap_or(state.config.retrieval.top_k).max(1);
    let found = retrieval.retriever.find_similar(query, top_k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&found.studies)?);
        return Ok(());
    }

    if found.studies.is_empty() {
        println!();
        println!(
            "  {} No studies matched. Populate the index with: {}",
            style("i").blue().bold(),
            style("rmai ingest").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", study_table(&found.studies));
    println!(
        "  {} ({} ms)",
        style(format!("{} studies", found.studies.len())).bold(),
        found.latency_ms
    );
    println!();
    Ok(())
}

/// `rmai references <query>`: retrieved studies with per-study summaries.
pub async fn references(
    state: &AppState,
    query: &str,
    top_k: Option<usize>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let rag = state.require_rag()?;
    let spinner = spinner("Summarizing studies...", json || quiet);
    let answer = rag.ask(query, top_k).await;
    spinner.finish_and_clear();
    let answer = answer?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    if answer.results.is_empty() {
        println!("  {} No relevant studies found.", style("i").blue().bold());
        return Ok(());
    }

    println!();
    for (i, result) in answer.results.iter().enumerate() {
        println!("  {} {}", style(format!("{}.", i + 1)).dim(), style(&result.title).cyan().bold());
        println!("     {}", result.summary);
        if let Some(link) = &result.link {
            println!("     {}", style(link).underlined().dim());
        }
        println!();
    }
    Ok(())
}

/// `rmai digest <term>`.
pub async fn digest(state: &AppState, term: &str, json: bool, quiet: bool) -> Result<()> {
    let rag = state.require_rag()?;
    let spinner = spinner(&format!("Reading up on {term}..."), json || quiet);
    let digest = rag.digest(term.trim()).await;
    spinner.finish_and_clear();
    let digest = digest?;

    if json {
        println!("{}", serde_json::to_string_pretty(&digest)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&digest.term).cyan().bold());
    println!();
    println!("  {}", style("── Summary ──").dim());
    println!("  {}", digest.term_summary);
    println!();
    println!("  {}", style("── Latest findings ──").dim());
    println!("  {}", digest.latest_findings);
    println!();
    if !digest.references.is_empty() {
        println!("{}", study_table(&digest.references));
        println!();
    }
    Ok(())
}

/// Options for `rmai ask`.
pub struct AskOptions {
    pub web: bool,
    pub no_web: bool,
    pub results: usize,
    pub explore: bool,
    pub transcript: Option<PathBuf>,
}

/// `rmai ask <prompt>`.
pub async fn ask(state: &AppState, prompt: &str, options: AskOptions, json: bool, quiet: bool) -> Result<()> {
    let assistant = state.require_assistant()?;
    let transcript = match &options.transcript {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read transcript {}", path.display()))?,
        ),
        None => None,
    };

    let mut request = AskRequest::new(prompt);
    request.use_web_search = match (options.web, options.no_web) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    request.num_search_results = options.results.max(1);
    request.explore_pages = options.explore;
    request.transcript = transcript;

    let spinner = spinner("Thinking...", json || quiet);
    let reply = assistant.ask(&request).await;
    spinner.finish_and_clear();
    let reply = reply?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    println!();
    println!("{}", reply.reply);
    if !reply.sources.is_empty() {
        println!();
        println!("  {}", style("── Sources ──").dim());
        for (i, source) in reply.sources.iter().enumerate() {
            println!("  [{}] {} {}", i + 1, source.title, style(&source.url).dim());
        }
    }
    println!();
    Ok(())
}
