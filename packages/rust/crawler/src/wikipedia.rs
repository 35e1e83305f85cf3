//! MediaWiki Action API client.
//!
//! Resolves keyword searches to page titles and titles to full pages
//! (plain-text body, lead summary, image URLs, canonical URL). Every request
//! is built from typed query pairs and spaced by the configured rate limit.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use coachkb_shared::{CoachKbError, Result, SourceConfig, SourcePage};

use crate::PageSource;

/// User-Agent string for source requests (MediaWiki asks clients to identify themselves).
const USER_AGENT: &str = concat!("coachkb/", env!("CARGO_PKG_VERSION"));

/// Upper bound on image continuation rounds for a single page.
const MAX_IMAGE_PAGES: usize = 20;

// ---------------------------------------------------------------------------
// WikipediaClient
// ---------------------------------------------------------------------------

/// Page source backed by a MediaWiki installation.
pub struct WikipediaClient {
    client: Client,
    api_url: Url,
    rate_limit: Duration,
}

impl WikipediaClient {
    /// Build the HTTP client for the configured endpoint.
    pub fn open(config: &SourceConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            CoachKbError::config(format!("invalid source api_url '{}': {e}", config.api_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoachKbError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            rate_limit: Duration::from_millis(config.rate_limit_ms),
        })
    }

    /// Issue one `action=query` request and decode the JSON body.
    async fn query<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        if !self.rate_limit.is_zero() {
            tokio::time::sleep(self.rate_limit).await;
        }

        let response = self
            .client
            .get(self.api_url.clone())
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| CoachKbError::Network(format!("{}: {e}", self.api_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoachKbError::Network(format!("{}: HTTP {status}", self.api_url)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CoachKbError::Network(format!("{}: body read failed: {e}", self.api_url)))?;

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)
            .map_err(|e| CoachKbError::parse(format!("unexpected MediaWiki response: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(CoachKbError::Network(format!(
                "MediaWiki error {}: {}",
                err.code, err.info
            )));
        }

        Ok(envelope.inner)
    }

    /// Fetch title, body, canonical URL and disambiguation flag (following redirects).
    async fn fetch_body(&self, title: &str) -> Result<ApiPage> {
        let response: PagesResponse = self
            .query(&[
                ("prop", "extracts|info|pageprops"),
                ("explaintext", "1"),
                ("inprop", "url"),
                ("ppprop", "disambiguation"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        let page = response
            .query
            .and_then(|q| q.pages.into_iter().next())
            .ok_or_else(|| CoachKbError::PageNotFound {
                title: title.to_string(),
            })?;

        if page.missing || page.invalid {
            return Err(CoachKbError::PageNotFound {
                title: title.to_string(),
            });
        }
        if page
            .pageprops
            .as_ref()
            .is_some_and(|props| props.contains_key("disambiguation"))
        {
            return Err(CoachKbError::AmbiguousTitle {
                title: title.to_string(),
            });
        }

        Ok(page)
    }

    /// Fetch the plain-text lead section.
    async fn fetch_summary(&self, title: &str) -> Result<String> {
        let response: PagesResponse = self
            .query(&[
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("titles", title),
            ])
            .await?;

        Ok(response
            .query
            .and_then(|q| q.pages.into_iter().next())
            .and_then(|page| page.extract)
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    /// Fetch the URLs of every image used on the page, following continuations.
    async fn fetch_images(&self, title: &str) -> Result<Vec<String>> {
        let mut images = Vec::new();
        let mut continuation: HashMap<String, String> = HashMap::new();

        for _ in 0..MAX_IMAGE_PAGES {
            let mut params: Vec<(&str, &str)> = vec![
                ("generator", "images"),
                ("gimlimit", "max"),
                ("prop", "imageinfo"),
                ("iiprop", "url"),
                ("titles", title),
            ];
            params.extend(continuation.iter().map(|(k, v)| (k.as_str(), v.as_str())));

            let response: PagesResponse = self.query(&params).await?;

            if let Some(query) = response.query {
                images.extend(
                    query
                        .pages
                        .into_iter()
                        .flat_map(|page| page.imageinfo.unwrap_or_default())
                        .filter_map(|info| info.url),
                );
            }

            match response.continuation {
                Some(next) if !next.is_empty() => continuation = next,
                _ => break,
            }
        }

        Ok(images)
    }
}

#[async_trait]
impl PageSource for WikipediaClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let response: SearchResponse = self
            .query(&[
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("srprop", ""),
            ])
            .await?;

        let titles: Vec<String> = response
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default();

        debug!(count = titles.len(), "search complete");
        Ok(titles)
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, title: &str) -> Result<SourcePage> {
        let page = self.fetch_body(title).await?;
        let resolved = page.title.clone();

        let summary = self.fetch_summary(&resolved).await?;
        let images = self.fetch_images(&resolved).await?;
        let url = match page.fullurl {
            Some(url) => url,
            None => canonical_url(&self.api_url, &resolved),
        };

        debug!(%resolved, images = images.len(), "page fetched");

        Ok(SourcePage {
            title: resolved,
            content: page.extract.unwrap_or_default(),
            summary,
            images,
            url,
        })
    }
}

/// Build `<origin>/wiki/<Title_With_Underscores>` when the API omits `fullurl`.
fn canonical_url(api_url: &Url, title: &str) -> String {
    let mut url = api_url.clone();
    url.set_query(None);
    url.set_path(&format!("/wiki/{}", title.replace(' ', "_")));
    url.to_string()
}

// ---------------------------------------------------------------------------
// Wire types (formatversion=2)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(flatten)]
    inner: T,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHitTitle>,
}

#[derive(Debug, Deserialize)]
struct SearchHitTitle {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    query: Option<PagesQuery>,
    #[serde(default, rename = "continue")]
    continuation: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    pageprops: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    imageinfo: Option<Vec<ImageInfo>>,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    #[serde(default)]
    url: Option<String>,
}

#[cfg(test)]
mod wikipedia_tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WikipediaClient {
        let config = SourceConfig {
            api_url: format!("{}/w/api.php", server.uri()),
            rate_limit_ms: 0,
            ..SourceConfig::default()
        };
        WikipediaClient::open(&config).unwrap()
    }

    async fn mount_json(server: &MockServer, key: &str, value: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(query_param(key, value))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_open_rejects_bad_url() {
        let config = SourceConfig {
            api_url: "not a url".into(),
            ..SourceConfig::default()
        };
        assert!(matches!(
            WikipediaClient::open(&config),
            Err(CoachKbError::Config { .. })
        ));
    }

    #[test]
    fn test_canonical_url() {
        let api = Url::parse("https://en.wikipedia.org/w/api.php?x=1").unwrap();
        assert_eq!(
            canonical_url(&api, "Great Red Spot"),
            "https://en.wikipedia.org/wiki/Great_Red_Spot"
        );
    }

    #[tokio::test]
    async fn test_search_returns_titles_in_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("list", "search"))
            .and(query_param("srsearch", "Jupiter"))
            .and(query_param("srlimit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"search": [
                    {"ns": 0, "title": "Jupiter"},
                    {"ns": 0, "title": "Jupiter (disambiguation)"},
                    {"ns": 0, "title": "Moons of Jupiter"}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let titles = client.search("Jupiter", 5).await.unwrap();
        assert_eq!(
            titles,
            vec!["Jupiter", "Jupiter (disambiguation)", "Moons of Jupiter"]
        );
    }

    #[tokio::test]
    async fn test_fetch_page_assembles_all_parts() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "prop",
            "extracts|info|pageprops",
            serde_json::json!({"query": {"pages": [{
                "pageid": 38930,
                "title": "Jupiter",
                "extract": "Jupiter is the fifth planet from the Sun.",
                "fullurl": "https://en.wikipedia.org/wiki/Jupiter"
            }]}}),
        )
        .await;

        Mock::given(method("GET"))
            .and(query_param("prop", "extracts"))
            .and(query_param("exintro", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"pages": [{"title": "Jupiter", "extract": " A gas giant. "}]}
            })))
            .mount(&server)
            .await;

        mount_json(
            &server,
            "generator",
            "images",
            serde_json::json!({"query": {"pages": [
                {"title": "File:Jupiter.jpg", "imageinfo": [{"url": "https://upload.example.org/Jupiter.jpg"}]},
                {"title": "File:Io.png", "imageinfo": [{"url": "https://upload.example.org/Io.png"}]}
            ]}}),
        )
        .await;

        let client = client_for(&server);
        let page = client.fetch_page("Jupiter").await.unwrap();

        assert_eq!(page.title, "Jupiter");
        assert_eq!(page.content, "Jupiter is the fifth planet from the Sun.");
        assert_eq!(page.summary, "A gas giant.");
        assert_eq!(page.url, "https://en.wikipedia.org/wiki/Jupiter");
        assert_eq!(page.images.len(), 2);
        assert_eq!(page.images[0], "https://upload.example.org/Jupiter.jpg");
    }

    #[tokio::test]
    async fn test_fetch_page_missing() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "prop",
            "extracts|info|pageprops",
            serde_json::json!({"query": {"pages": [{"ns": 0, "title": "Nowhere", "missing": true}]}}),
        )
        .await;

        let client = client_for(&server);
        let err = client.fetch_page("Nowhere").await.unwrap_err();
        assert!(matches!(err, CoachKbError::PageNotFound { ref title } if title == "Nowhere"));
    }

    #[tokio::test]
    async fn test_fetch_page_disambiguation() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "prop",
            "extracts|info|pageprops",
            serde_json::json!({"query": {"pages": [{
                "title": "Mercury",
                "extract": "Mercury may refer to:",
                "pageprops": {"disambiguation": ""}
            }]}}),
        )
        .await;

        let client = client_for(&server);
        let err = client.fetch_page("Mercury").await.unwrap_err();
        assert!(matches!(err, CoachKbError::AmbiguousTitle { .. }));
    }

    #[tokio::test]
    async fn test_images_follow_continuation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("generator", "images"))
            .and(query_param("gimcontinue", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"pages": [{"title": "File:B.png", "imageinfo": [{"url": "https://u/B.png"}]}]}
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("generator", "images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "continue": {"gimcontinue": "next", "continue": "gimcontinue||"},
                "query": {"pages": [{"title": "File:A.png", "imageinfo": [{"url": "https://u/A.png"}]}]}
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let images = client.fetch_images("Jupiter").await.unwrap();
        assert_eq!(images, vec!["https://u/A.png", "https://u/B.png"]);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "list",
            "search",
            serde_json::json!({"error": {"code": "maxlag", "info": "Waiting for a database server"}}),
        )
        .await;

        let client = client_for(&server);
        let err = client.search("Jupiter", 5).await.unwrap_err();
        assert!(err.to_string().contains("maxlag"));
    }
}
