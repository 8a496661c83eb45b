//! CLI command definitions and dispatch for the `rmai` binary.
//!
//! Uses clap derive macros for argument parsing. Most commands act on the
//! local data directory directly; `serve` exposes the same operations over
//! HTTP for the web UI.

pub mod ingest;
pub mod research;
pub mod session;
pub mod status;
pub mod transcribe;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Research meeting assistant: live transcripts, literature lookup and Q&A.
#[derive(Parser)]
#[command(name = "rmai", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export traces to stdout via OpenTelemetry.
    #[arg(long, global = true, hide = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server (API, live transcription and web UI).
    Serve {
        /// Port to listen on (defaults to [server].port).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to [server].host).
        #[arg(long)]
        host: Option<String>,
    },

    /// Stop a running server.
    Stop,

    /// Show data directory, server and index status.
    Status,

    /// Pull recent PubMed abstracts into the study index.
    Ingest {
        /// Look back this many days (defaults to [pubmed].reldays).
        #[arg(long)]
        days: Option<u32>,

        /// Articles fetched per request (defaults to [pubmed].retmax).
        #[arg(long)]
        retmax: Option<u32>,
    },

    /// List the indexed studies closest to a query.
    Search {
        query: String,

        /// Number of studies to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Retrieve matching studies and summarize each one.
    References {
        query: String,

        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Literature digest for a term: what it is and recent findings.
    Digest { term: String },

    /// Ask the assistant a question.
    Ask {
        prompt: String,

        /// Always search the web.
        #[arg(long, conflicts_with = "no_web")]
        web: bool,

        /// Never search the web.
        #[arg(long)]
        no_web: bool,

        /// Number of web results to use.
        #[arg(long, default_value = "3")]
        results: usize,

        /// Also read each result page.
        #[arg(long)]
        explore: bool,

        /// Transcript file to answer from.
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Transcribe a WAV recording.
    Transcribe {
        file: PathBuf,

        /// Append the text to this meeting session.
        #[arg(long)]
        session: Option<String>,
    },

    /// Manage meeting sessions.
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Commands {
    /// Whether the command needs the embedder and study index loaded.
    pub fn needs_retrieval(&self) -> bool {
        matches!(
            self,
            Commands::Serve { .. }
                | Commands::Ingest { .. }
                | Commands::Search { .. }
                | Commands::References { .. }
                | Commands::Digest { .. }
        )
    }
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Start a meeting session.
    Start {
        #[arg(long)]
        title: Option<String>,

        /// Keep only the session row; transcript and Q&A stay in memory.
        #[arg(long)]
        opt_out: bool,
    },

    /// List recent sessions.
    #[command(alias = "ls")]
    List {
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Show a session with its transcript, Q&A and studies.
    Show { id: String },

    /// End a session.
    End { id: String },

    /// Print the plain-text export of a session.
    Export {
        id: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a session and everything stored for it.
    #[command(alias = "rm")]
    Delete {
        id: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Replace the notes of a session.
    Notes { id: String, notes: String },
}

/// Parse a session id argument.
pub fn parse_session_id(id: &str) -> anyhow::Result<uuid::Uuid> {
    id.parse()
        .map_err(|_| anyhow::anyhow!("'{id}' is not a valid session id"))
}
