//! Research Meeting AI CLI and web server entry point.
//!
//! Binary name: `rmai`
//!
//! Parses CLI arguments, sets up tracing, initializes the database and
//! services, then dispatches to a command handler or starts the server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use console::style;

use cli::{Cli, Commands};
use rmai_infra::config::{load_dotenv, resolve_data_dir};
use rmai_infra::process;
use rmai_observe::tracing_setup::{Verbosity, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before tracing, so RUST_LOG from .env takes effect.
    load_dotenv();
    init_tracing(Verbosity::from_flags(cli.quiet, cli.verbose), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't need app state
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "rmai", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Stop => return cli::status::stop(&resolve_data_dir(), cli.json),
        _ => {}
    }

    let state = AppState::init(cli.command.needs_retrieval()).await?;
    let (json, quiet) = (cli.json, cli.quiet);

    match cli.command {
        Commands::Serve { port, host } => serve(state, host, port).await?,

        Commands::Status => cli::status::status(&state, json).await?,

        Commands::Ingest { days, retmax } => {
            cli::ingest::ingest(&state, days, retmax, json, quiet).await?;
        }

        Commands::Search { query, top_k } => {
            cli::research::search(&state, &query, top_k, json).await?;
        }

        Commands::References { query, top_k } => {
            cli::research::references(&state, &query, top_k, json, quiet).await?;
        }

        Commands::Digest { term } => cli::research::digest(&state, &term, json, quiet).await?,

        Commands::Ask {
            prompt,
            web,
            no_web,
            results,
            explore,
            transcript,
        } => {
            let options = cli::research::AskOptions {
                web,
                no_web,
                results,
                explore,
                transcript,
            };
            cli::research::ask(&state, &prompt, options, json, quiet).await?;
        }

        Commands::Transcribe { file, session } => {
            cli::transcribe::transcribe(&state, &file, session.as_deref(), json, quiet).await?;
        }

        Commands::Session { action } => cli::session::run(&state, action, json).await?,

        Commands::Completions { .. } | Commands::Stop => unreachable!("handled above"),
    }

    Ok(())
}

/// Serve the API until Ctrl+C or SIGTERM, holding the PID file meanwhile.
async fn serve(state: AppState, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let data_dir = state.data_dir.clone();
    process::write_pid_file(&data_dir)?;

    println!(
        "  {} Research Meeting AI listening on {}",
        style("●").cyan().bold(),
        style(format!("http://{addr}")).cyan()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    let live_sessions = state.live_sessions.clone();
    let router = http::router::build_router(state);
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Let open live streams flush and close.
            for entry in live_sessions.iter() {
                entry.value().cancel();
            }
        })
        .await;

    process::remove_pid_file(&data_dir);
    served?;
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
