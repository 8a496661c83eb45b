//! `rmai transcribe`: transcribe a WAV recording.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use rmai_core::transcript::transcribe_recording;
use rmai_infra::stt::read_wav_mono;

use super::parse_session_id;
use crate::state::AppState;

/// Length of each piece sent to the speech-to-text backend.
const RECORDING_PIECE_SECS: f64 = 30.0;

pub async fn transcribe(
    state: &AppState,
    file: &Path,
    session: Option<&str>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let stt = state
        .stt
        .as_ref()
        .context("speech-to-text is not configured (set STT_API_KEY or OPENAI_API_KEY)")?;
    let session_id = session.map(parse_session_id).transpose()?;
    if let Some(id) = &session_id {
        // Fail before spending time on the backend.
        state.meetings.get(id).await?;
    }

    let (samples, sample_rate) = read_wav_mono(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let duration = samples.len() as f64 / f64::from(sample_rate.max(1));

    let spinner = if json || quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Transcribing {duration:.0}s of audio..."));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let text = transcribe_recording(stt.as_ref(), &samples, sample_rate, RECORDING_PIECE_SECS).await;
    spinner.finish_and_clear();
    let text = text?;

    if let Some(id) = &session_id {
        if !text.is_empty() {
            state.meetings.append_transcript(id, &text, duration).await?;
        }
    }

    if json {
        let out = serde_json::json!({
            "file": file.display().to_string(),
            "duration_secs": duration,
            "session_id": session_id,
            "text": text,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{text}");
    if let Some(id) = session_id {
        if !quiet {
            eprintln!(
                "  {} Appended to session {}",
                style("✓").green().bold(),
                style(id).dim()
            );
        }
    }
    Ok(())
}
