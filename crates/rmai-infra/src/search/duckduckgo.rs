//! DuckDuckGo HTML search plus plain-text page fetching.

use std::time::Duration;

use scraper::{Html, Selector};

use rmai_core::search::WebSearchProvider;
use rmai_types::config::WebSearchConfig;
use rmai_types::error::SearchError;
use rmai_types::search::WebSearchResult;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) research-meeting-ai/0.1";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);
const PAGE_TIMEOUT: Duration = Duration::from_secs(15);

struct Selectors {
    result: Selector,
    title: Selector,
    snippet: Selector,
    body: Selector,
}

impl Selectors {
    fn new() -> Result<Self, SearchError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| SearchError::Parse(format!("bad selector {css}: {e}")))
        };
        Ok(Self {
            result: parse("div.result")?,
            title: parse("a.result__a")?,
            snippet: parse(".result__snippet")?,
            body: parse("body")?,
        })
    }
}

pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    endpoint: String,
    selectors: Selectors,
}

/// Result links go through a `/l/?uddg=` redirect; return the target.
pub fn resolve_result_url(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let url = reqwest::Url::parse(&absolute).ok()?;
    if url.path().starts_with("/l/") {
        return url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl DuckDuckGoSearch {
    pub fn new(config: &WebSearchConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            selectors: Selectors::new()?,
        })
    }

    /// Organic results from a DuckDuckGo HTML results page. Ads are skipped.
    pub fn parse_results(&self, html: &str, limit: usize) -> Vec<WebSearchResult> {
        let doc = Html::parse_document(html);
        doc.select(&self.selectors.result)
            .filter(|el| {
                !el.value()
                    .attr("class")
                    .is_some_and(|c| c.contains("result--ad"))
            })
            .filter_map(|el| {
                let link = el.select(&self.selectors.title).next()?;
                let url = resolve_result_url(link.value().attr("href")?)?;
                let title = squash_whitespace(&link.text().collect::<String>());
                let snippet = el
                    .select(&self.selectors.snippet)
                    .next()
                    .map(|s| squash_whitespace(&s.text().collect::<String>()))
                    .unwrap_or_default();
                Some(WebSearchResult {
                    title,
                    url,
                    snippet,
                    content: None,
                })
            })
            .take(limit)
            .collect()
    }

    /// Visible text of a page's `<body>` with whitespace collapsed.
    pub fn extract_page_text(&self, html: &str) -> String {
        let doc = Html::parse_document(html);
        let text = doc
            .select(&self.selectors.body)
            .next()
            .map(|body| body.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        squash_whitespace(&text)
    }
}

impl WebSearchProvider for DuckDuckGoSearch {
    #[tracing::instrument(name = "web_search", skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSearchResult>, SearchError> {
        let html = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query)])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("search request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Http(e.to_string()))?
            .text()
            .await
            .map_err(|e| SearchError::Http(format!("search body read failed: {e}")))?;

        let results = self.parse_results(&html, limit);
        tracing::debug!(found = results.len(), "web search complete");
        Ok(results)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, SearchError> {
        let body = self
            .http
            .get(url)
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("fetch {url} failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Http(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| SearchError::Http(format!("read {url} failed: {e}")))?;
        Ok(self.extract_page_text(&String::from_utf8_lossy(&body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r##"<html><body>
      <div class="result results_links results_links_deep result--ad">
        <a class="result__a" href="https://ads.example/x">Sponsored</a>
      </div>
      <div class="result results_links results_links_deep web-result">
        <h2 class="result__title">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.nature.com%2Farticles%2Fp53&amp;rut=abc">The <b>p53</b> pathway</a>
        </h2>
        <a class="result__snippet" href="#">Tumour   suppressor overview.</a>
      </div>
      <div class="result results_links web-result">
        <a class="result__a" href="https://example.org/direct">Direct link</a>
      </div>
    </body></html>"##;

    fn search() -> DuckDuckGoSearch {
        DuckDuckGoSearch::new(&WebSearchConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_results_skips_ads_and_unwraps_redirects() {
        let results = search().parse_results(RESULTS_PAGE, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "The p53 pathway");
        assert_eq!(results[0].url, "https://www.nature.com/articles/p53");
        assert_eq!(results[0].snippet, "Tumour suppressor overview.");
        assert_eq!(results[1].url, "https://example.org/direct");
        assert_eq!(results[1].snippet, "");
    }

    #[test]
    fn test_parse_results_respects_limit() {
        assert_eq!(search().parse_results(RESULTS_PAGE, 1).len(), 1);
    }

    #[test]
    fn test_resolve_result_url_rejects_other_schemes() {
        assert!(resolve_result_url("javascript:void(0)").is_none());
    }

    #[test]
    fn test_extract_page_text() {
        let html = "<html><head><title>T</title></head><body><h1>Hello</h1>\n<p>world   again</p></body></html>";
        assert_eq!(search().extract_page_text(html), "Hello world again");
    }
}
