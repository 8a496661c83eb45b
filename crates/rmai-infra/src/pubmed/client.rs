//! esearch/efetch client.

use std::time::Duration;

use chrono::Datelike;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use rmai_core::ingest::{ArticleSource, SearchHandle};
use rmai_types::config::PubmedConfig;
use rmai_types::error::IngestError;
use rmai_types::study::PubmedArticle;

use super::parse::parse_articles;

/// NCBI allows ~10 requests/s with an API key and ~3/s without.
const DELAY_WITH_KEY: Duration = Duration::from_millis(110);
const DELAY_WITHOUT_KEY: Duration = Duration::from_millis(340);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct PubmedClient {
    http: reqwest::Client,
    base_url: String,
    tool: String,
    email: String,
    datetype: String,
    reldays: u32,
    api_key: Option<SecretString>,
}

#[derive(Deserialize)]
struct ESearchEnvelope {
    esearchresult: ESearchResult,
}

#[derive(Deserialize)]
struct ESearchResult {
    count: String,
    webenv: String,
    querykey: String,
}

/// Count, WebEnv and query key out of an esearch JSON body.
pub fn parse_search_handle(body: &str) -> Result<SearchHandle, IngestError> {
    let envelope: ESearchEnvelope = serde_json::from_str(body)
        .map_err(|e| IngestError::Parse(format!("invalid esearch response: {e}")))?;
    let result = envelope.esearchresult;
    let count = result
        .count
        .trim()
        .parse::<usize>()
        .map_err(|e| IngestError::Parse(format!("invalid esearch count '{}': {e}", result.count)))?;
    Ok(SearchHandle {
        count,
        webenv: result.webenv,
        query_key: result.querykey,
    })
}

impl PubmedClient {
    pub fn new(config: &PubmedConfig, api_key: Option<SecretString>) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IngestError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tool: config.tool.clone(),
            email: config.email.clone(),
            datetype: config.datetype.clone(),
            reldays: config.reldays,
            api_key,
        })
    }

    /// Override the look-back window (days).
    pub fn with_reldays(mut self, days: u32) -> Self {
        self.reldays = days;
        self
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", self.tool.clone())];
        if !self.email.is_empty() {
            params.push(("email", self.email.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.expose_secret().to_string()));
        }
        params
    }

    pub fn search_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", "all[sb]".to_string()),
            ("retmode", "json".to_string()),
            ("usehistory", "y".to_string()),
            ("datetype", self.datetype.clone()),
            ("reldate", self.reldays.to_string()),
            ("retmax", "0".to_string()),
        ];
        params.extend(self.common_params());
        params
    }

    pub fn fetch_params(
        &self,
        handle: &SearchHandle,
        retstart: usize,
        retmax: usize,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("WebEnv", handle.webenv.clone()),
            ("query_key", handle.query_key.clone()),
            ("retstart", retstart.to_string()),
            ("retmax", retmax.to_string()),
            ("retmode", "xml".to_string()),
        ];
        params.extend(self.common_params());
        params
    }

    async fn get_text(&self, endpoint: &str, params: &[(&'static str, String)]) -> Result<String, IngestError> {
        let url = format!("{}/{endpoint}", self.base_url);
        self.http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| IngestError::Http(format!("{endpoint} request failed: {e}")))?
            .error_for_status()
            .map_err(|e| IngestError::Http(e.to_string()))?
            .text()
            .await
            .map_err(|e| IngestError::Http(format!("{endpoint} body read failed: {e}")))
    }
}

impl ArticleSource for PubmedClient {
    #[tracing::instrument(name = "pubmed_search", skip(self), fields(reldays = self.reldays))]
    async fn search(&self) -> Result<SearchHandle, IngestError> {
        let body = self.get_text("esearch.fcgi", &self.search_params()).await?;
        let handle = parse_search_handle(&body)?;
        tracing::info!(count = handle.count, "pubmed search complete");
        Ok(handle)
    }

    async fn fetch(
        &self,
        handle: &SearchHandle,
        retstart: usize,
        retmax: usize,
    ) -> Result<Vec<PubmedArticle>, IngestError> {
        let body = self
            .get_text("efetch.fcgi", &self.fetch_params(handle, retstart, retmax))
            .await?;
        let current_month = chrono::Utc::now().month();
        let articles = parse_articles(&body, current_month)?;
        tracing::debug!(retstart, parsed = articles.len(), "efetch page parsed");
        Ok(articles)
    }

    fn polite_delay(&self) -> Duration {
        if self.api_key.is_some() {
            DELAY_WITH_KEY
        } else {
            DELAY_WITHOUT_KEY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(key: Option<&str>) -> PubmedClient {
        PubmedClient::new(
            &PubmedConfig::default(),
            key.map(|k| SecretString::from(k.to_string())),
        )
        .unwrap()
    }

    fn value<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_search_params() {
        let params = client(None).with_reldays(7).search_params();
        assert_eq!(value(&params, "term"), Some("all[sb]"));
        assert_eq!(value(&params, "usehistory"), Some("y"));
        assert_eq!(value(&params, "datetype"), Some("edat"));
        assert_eq!(value(&params, "reldate"), Some("7"));
        assert_eq!(value(&params, "retmax"), Some("0"));
        assert_eq!(value(&params, "tool"), Some("research-ai"));
        assert!(value(&params, "api_key").is_none());
    }

    #[test]
    fn test_fetch_params_carry_history() {
        let handle = SearchHandle {
            count: 10,
            webenv: "MCID_abc".into(),
            query_key: "1".into(),
        };
        let params = client(Some("k")).fetch_params(&handle, 400, 400);
        assert_eq!(value(&params, "WebEnv"), Some("MCID_abc"));
        assert_eq!(value(&params, "query_key"), Some("1"));
        assert_eq!(value(&params, "retstart"), Some("400"));
        assert_eq!(value(&params, "retmode"), Some("xml"));
        assert_eq!(value(&params, "api_key"), Some("k"));
    }

    #[test]
    fn test_parse_search_handle() {
        let body = r#"{"header":{},"esearchresult":{"count":"1520","retmax":"0","retstart":"0","querykey":"1","webenv":"MCID_x","idlist":[]}}"#;
        let handle = parse_search_handle(body).unwrap();
        assert_eq!(handle.count, 1520);
        assert_eq!(handle.webenv, "MCID_x");
        assert_eq!(handle.query_key, "1");

        assert!(matches!(parse_search_handle("{}"), Err(IngestError::Parse(_))));
    }

    #[test]
    fn test_polite_delay_depends_on_key() {
        assert_eq!(client(Some("k")).polite_delay(), Duration::from_millis(110));
        assert_eq!(client(None).polite_delay(), Duration::from_millis(340));
    }
}
