//! Status dashboard and server stop.

use std::path::Path;

use anyhow::Result;
use console::style;

use rmai_core::ingest::CheckpointStore;
use rmai_infra::process;
use rmai_infra::sqlite::SqliteCheckpointStore;
use rmai_types::session::SessionStatus;

use crate::state::AppState;

/// Sessions counted by the dashboard.
const STATUS_SESSION_LIMIT: i64 = 10_000;

/// Display data directory, server, session and index status.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let sessions = state.meetings.list(Some(STATUS_SESSION_LIMIT)).await?;
    let active = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Active)
        .count();

    let indexed = SqliteCheckpointStore::new(state.db_pool.clone())
        .load()
        .await
        .map(|pmids| pmids.len())
        .unwrap_or_default();

    let server_pid = process::running_server_pid(&state.data_dir);
    let stt_ready = state.stt.is_some();
    let llm_ready = state.assistant.is_some();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "server": {
                "running": server_pid.is_some(),
                "pid": server_pid,
            },
            "sessions": {
                "total": sessions.len(),
                "active": active,
            },
            "indexed_studies": indexed,
            "llm_model": state.config.llm.model,
            "llm": llm_ready,
            "speech_to_text": stt_ready,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Research Meeting AI v{}",
        style("●").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Server ──").dim());
    match server_pid {
        Some(pid) => println!("  Running:  {} (pid {pid})", style("yes").green()),
        None => println!("  Running:  {}", style("no").dim()),
    }
    println!();

    println!("  {}", style("── Sessions ──").dim());
    println!("  Total:    {}", style(sessions.len()).bold());
    println!("  Active:   {}", style(active).green());
    println!();

    println!("  {}", style("── Literature ──").dim());
    println!("  Indexed studies: {}", style(indexed).bold());
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir:       {}", style(state.data_dir.display()).dim());
    println!(
        "  LLM model:      {} {}",
        style(&state.config.llm.model).dim(),
        if llm_ready {
            style("(ready)").green()
        } else {
            style("(unavailable)").yellow()
        }
    );
    println!(
        "  Speech-to-text: {}",
        if stt_ready {
            style("configured").green()
        } else {
            style("not configured").yellow()
        }
    );
    println!();

    Ok(())
}

/// Terminate the running server.
pub fn stop(data_dir: &Path, json: bool) -> Result<()> {
    let signalled = process::stop_server(data_dir);

    if json {
        println!("{}", serde_json::json!({ "stopped": signalled }));
        return Ok(());
    }

    if signalled == 0 {
        println!("  {} No running server found.", style("i").blue().bold());
    } else {
        println!(
            "  {} Stopped {} server process{}.",
            style("✓").green().bold(),
            signalled,
            if signalled == 1 { "" } else { "es" }
        );
    }
    Ok(())
}
