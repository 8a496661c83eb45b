//! Meeting session CLI commands.
//!
//! Session browsing with tables, plain-text export, notes and deletion
//! with a confirmation prompt.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use rmai_core::text::clip_with_ellipsis;
use rmai_types::session::{MeetingSession, RetentionPolicy, SessionStatus};

use super::{SessionCommand, parse_session_id};
use crate::state::AppState;

pub async fn run(state: &AppState, action: SessionCommand, json: bool) -> Result<()> {
    match action {
        SessionCommand::Start { title, opt_out } => {
            let retention = if opt_out {
                RetentionPolicy::OptOut
            } else {
                RetentionPolicy::Keep
            };
            start_session(state, title, retention, json).await
        }
        SessionCommand::List { limit } => list_sessions(state, limit, json).await,
        SessionCommand::Show { id } => show_session(state, &id, json).await,
        SessionCommand::End { id } => end_session(state, &id, json).await,
        SessionCommand::Export { id, output } => export_session(state, &id, output.as_deref()).await,
        SessionCommand::Delete { id, force } => delete_session(state, &id, force, json).await,
        SessionCommand::Notes { id, notes } => update_notes(state, &id, notes, json).await,
    }
}

async fn start_session(
    state: &AppState,
    title: Option<String>,
    retention: RetentionPolicy,
    json: bool,
) -> Result<()> {
    let session = state.meetings.start(title, retention).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }
    println!();
    println!("  {} Session started", style("✓").green().bold());
    println!("  {}  {}", style("ID:").bold(), style(session.id).cyan());
    if retention == RetentionPolicy::OptOut {
        println!(
            "  {}",
            style("Opted out: transcript and Q&A will not be saved.").yellow()
        );
    }
    println!();
    Ok(())
}

fn status_cell(session: &MeetingSession) -> Cell {
    match session.status {
        SessionStatus::Active => Cell::new("active").fg(Color::Green),
        SessionStatus::Ended => Cell::new("ended").fg(Color::DarkGrey),
    }
}

async fn list_sessions(state: &AppState, limit: i64, json: bool) -> Result<()> {
    let sessions = state.meetings.list(Some(limit)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions yet. Start one with: {}",
            style("i").blue().bold(),
            style("rmai session start").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Started").fg(Color::White),
        Cell::new("Duration").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for session in &sessions {
        let title = clip_with_ellipsis(session.title.as_deref().unwrap_or("(untitled)"), 40);
        let duration = match session.ended_at {
            Some(ended) => format_duration(ended - session.started_at),
            None => "ongoing".to_string(),
        };
        table.add_row(vec![
            Cell::new(session.id.to_string()).fg(Color::DarkGrey),
            Cell::new(title).fg(Color::Cyan),
            Cell::new(session.started_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(duration).fg(Color::DarkGrey),
            status_cell(session),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

async fn show_session(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_session_id(id)?;
    let history = state.meetings.history(&id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    let session = &history.session;
    println!();
    println!(
        "  {} {}",
        style(session.title.as_deref().unwrap_or("Untitled session")).cyan().bold(),
        style(format!("({})", session.status)).dim()
    );
    println!(
        "  Started {}",
        session.started_at.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(ended) = session.ended_at {
        println!("  Duration {}", format_duration(ended - session.started_at));
    }
    println!();

    if !session.notes.trim().is_empty() {
        println!("  {}", style("── Notes ──").dim());
        println!("  {}", session.notes.trim());
        println!();
    }

    println!("  {}", style("── Transcript ──").dim());
    if history.transcript.is_empty() {
        println!("  {}", style("(empty)").dim());
    } else {
        println!("{}", history.transcript);
    }
    println!();

    if !history.exchanges.is_empty() {
        println!("  {}", style("── Q&A ──").dim());
        for exchange in &history.exchanges {
            println!("  {} {}", style("Q:").bold(), exchange.question);
            println!("  {} {}", style("A:").bold(), exchange.answer);
            println!();
        }
    }

    if !history.studies.is_empty() {
        println!("  {}", style("── Studies ──").dim());
        for study in &history.studies {
            println!(
                "  {} {} {}",
                style("•").dim(),
                study.title,
                style(study.link_or_pubmed().unwrap_or_default()).dim()
            );
        }
        println!();
    }
    Ok(())
}

async fn end_session(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_session_id(id)?;
    let session = state.meetings.end(&id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!("  {} Session {} ended.", style("✓").green().bold(), style(id).dim());
    }
    Ok(())
}

async fn export_session(state: &AppState, id: &str, output: Option<&Path>) -> Result<()> {
    let id = parse_session_id(id)?;
    let text = state.meetings.export_txt(&id).await?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &text)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "  {} Exported to {}",
                style("✓").green().bold(),
                style(path.display()).cyan()
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}

async fn delete_session(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let id = parse_session_id(id)?;
    let session = state.meetings.get(&id).await?;
    let title = session.title.as_deref().unwrap_or("(untitled)").to_string();

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete session '{}' and its transcript?",
                style(&title).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.meetings.delete(&id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"deleted": true, "session_id": id.to_string()})
        );
    } else {
        println!("  {} Session '{}' deleted.", style("x").red().bold(), title);
    }
    Ok(())
}

async fn update_notes(state: &AppState, id: &str, notes: String, json: bool) -> Result<()> {
    let id = parse_session_id(id)?;
    let session = state.meetings.update_notes(&id, notes).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!("  {} Notes saved.", style("✓").green().bold());
    }
    Ok(())
}

fn format_duration(duration: chrono::TimeDelta) -> String {
    let total_secs = duration.num_seconds().max(0);
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;

    if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m")
    } else {
        format!("{total_secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(chrono::TimeDelta::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::TimeDelta::seconds(125)), "2m");
        assert_eq!(format_duration(chrono::TimeDelta::seconds(3_720)), "1h 2m");
        assert_eq!(format_duration(chrono::TimeDelta::seconds(-5)), "0s");
    }
}
