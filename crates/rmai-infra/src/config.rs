//! Configuration loading, data directory and environment secrets.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use rmai_types::config::GlobalConfig;

pub const DATA_DIR_ENV: &str = "RMAI_DATA_DIR";
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const STT_KEY_ENV: &str = "STT_API_KEY";
pub const PUBMED_KEY_ENV: &str = "PUBMED_API_KEY";

/// Load `.env` from the working directory, if any. Existing variables win.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("failed to load .env: {e}"),
    }
}

/// Data directory: `RMAI_DATA_DIR`, else `~/.rmai`, else `./.rmai`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".rmai"))
        .unwrap_or_else(|| PathBuf::from(".rmai"))
}

/// Load `{data_dir}/config.toml`, falling back to defaults when the file is
/// missing (quietly) or unreadable/malformed (with a warning).
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config.toml at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    toml::from_str::<GlobalConfig>(&content).unwrap_or_else(|err| {
        tracing::warn!("failed to parse {}: {err}, using defaults", config_path.display());
        GlobalConfig::default()
    })
}

fn secret_from_env(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

/// Key for chat completions and OpenAI embeddings.
pub fn openai_api_key() -> Option<SecretString> {
    secret_from_env(OPENAI_KEY_ENV)
}

/// Key for speech-to-text: `STT_API_KEY`, falling back to `OPENAI_API_KEY`.
pub fn stt_api_key() -> Option<SecretString> {
    secret_from_env(STT_KEY_ENV).or_else(openai_api_key)
}

pub fn pubmed_api_key() -> Option<SecretString> {
    secret_from_env(PUBMED_KEY_ENV)
}
