//! Web search port and result formatting.

use rmai_types::error::SearchError;
use rmai_types::search::WebSearchResult;

use crate::text::take_chars;

/// Extra results requested so that unreachable pages can be skipped.
const SEARCH_BUFFER_MULTIPLIER: usize = 2;

/// Trait for web search backends.
///
/// Implementations live in rmai-infra (e.g., `DuckDuckGoSearch`).
pub trait WebSearchProvider: Send + Sync {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<WebSearchResult>, SearchError>> + Send;

    /// Visible text of the page at `url`.
    fn fetch_page(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<String, SearchError>> + Send;
}

/// Search and optionally fetch each result's page.
///
/// Requests twice `max_results` as a buffer. With `fetch_content`, a result
/// whose page cannot be fetched is still kept with `content = None`.
pub async fn gather_results<P: WebSearchProvider>(
    provider: &P,
    query: &str,
    max_results: usize,
    fetch_content: bool,
) -> Result<Vec<WebSearchResult>, SearchError> {
    let mut results = provider
        .search(query, max_results * SEARCH_BUFFER_MULTIPLIER)
        .await?;

    if !fetch_content {
        results.truncate(max_results);
        return Ok(results);
    }

    let mut gathered = Vec::with_capacity(max_results);
    for mut result in results {
        if result.url.is_empty() {
            continue;
        }
        match provider.fetch_page(&result.url).await {
            Ok(content) => result.content = Some(content),
            Err(err) => {
                tracing::debug!(url = %result.url, error = %err, "page fetch failed");
                result.content = None;
            }
        }
        gathered.push(result);
        if gathered.len() >= max_results {
            break;
        }
    }
    Ok(gathered)
}

/// Numbered search results for inclusion in a prompt.
pub fn format_search_context(
    results: &[WebSearchResult],
    include_pages: bool,
    page_chars: usize,
) -> String {
    let mut out = String::from("Web search results:\n");
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, result.title));
        out.push_str(&format!("    URL: {}\n", result.url));
        out.push_str(&format!("    {}\n", result.snippet));
        if include_pages {
            if let Some(content) = result.content.as_deref().filter(|c| !c.is_empty()) {
                out.push_str(&format!(
                    "    Page content: {}...\n",
                    take_chars(content, page_chars)
                ));
            }
        }
        out.push('\n');
    }
    out
}
